//! The service worker: precache on install, purge stale buckets on activate,
//! and answer intercepted fetches cache first.

use std::mem;
use std::sync::{Arc, Mutex};

use futures::future::{join_all, try_join_all};
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use super::bucket::CacheStorage;
use super::error::{OfflineError, Result};
use super::fetch::{Fetch, Request, Response};

/// Bucket name of the current deployment.
pub const DEFAULT_CACHE_VERSION: &str = "hospital-hospital-v1";

/// Page served for navigations that fail while offline.
pub const OFFLINE_PAGE: &str = "/offline.html";

/// Static assets every install must cache before the worker can activate.
pub const PRECACHE_MANIFEST: &[&str] = &[
    "/",
    "/index.html",
    "/manifest.json",
    "/icons/favicon.ico",
    "/icons/icon-192x192.png",
    "/icons/icon-512x512.png",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    Parsed,
    Installing,
    Installed,
    Activating,
    Activated,
    Redundant,
}

/// Messages a controlled client can post to its worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerMessage {
    GetVersion,
    ListCached,
    ClearCache,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkerReply {
    Version(String),
    Cached(Vec<String>),
    Cleared(usize),
}

pub struct ServiceWorker<F> {
    storage: Arc<CacheStorage>,
    fetcher: F,
    version: String,
    manifest: Vec<String>,
    offline_page: String,
    state: WorkerState,
    skip_waiting_on_install: bool,
    skip_waiting: bool,
    clients_claimed: bool,
    // Fire-and-forget cache writes; drained by settle()
    pending_writes: Mutex<JoinSet<()>>,
}

impl<F: Fetch> ServiceWorker<F> {
    pub fn new(storage: Arc<CacheStorage>, fetcher: F, version: impl Into<String>) -> Self {
        Self {
            storage,
            fetcher,
            version: version.into(),
            manifest: PRECACHE_MANIFEST.iter().map(|s| s.to_string()).collect(),
            offline_page: OFFLINE_PAGE.to_string(),
            state: WorkerState::Parsed,
            skip_waiting_on_install: true,
            skip_waiting: false,
            clients_claimed: false,
            pending_writes: Mutex::new(JoinSet::new()),
        }
    }

    pub fn with_manifest(mut self, manifest: Vec<String>) -> Self {
        self.manifest = manifest;
        self
    }

    /// Keep the installed worker waiting instead of activating it right away.
    pub fn wait_for_clients(mut self) -> Self {
        self.skip_waiting_on_install = false;
        self
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn state(&self) -> WorkerState {
        self.state
    }

    pub fn skip_waiting_requested(&self) -> bool {
        self.skip_waiting
    }

    pub fn controls_clients(&self) -> bool {
        self.clients_claimed
    }

    /// Manifest plus the offline page, without duplicates.
    pub fn precache_urls(&self) -> Vec<&str> {
        let mut urls: Vec<&str> = self.manifest.iter().map(String::as_str).collect();
        if !urls.contains(&self.offline_page.as_str()) {
            urls.push(&self.offline_page);
        }
        urls
    }

    pub fn skip_waiting(&mut self) {
        self.skip_waiting = true;
    }

    /// Cache every precache URL in the current bucket, then skip waiting.
    ///
    /// All-or-nothing: if any asset fails to download or is not a 200, nothing
    /// is written and the worker becomes redundant.
    pub async fn install(&mut self) -> Result<()> {
        self.state = WorkerState::Installing;
        info!(version = %self.version, "Installing service worker");

        match self.precache().await {
            Ok(count) => {
                info!(version = %self.version, count, "Precached static assets");
                self.state = WorkerState::Installed;
                if self.skip_waiting_on_install {
                    self.skip_waiting();
                }
                Ok(())
            }
            Err(e) => {
                warn!(version = %self.version, error = %e, "Service worker install failed");
                self.state = WorkerState::Redundant;
                Err(e)
            }
        }
    }

    async fn precache(&self) -> Result<usize> {
        let bucket = self.storage.open(&self.version)?;
        let requests: Vec<Request> = self.precache_urls().into_iter().map(Request::get).collect();

        let responses = try_join_all(requests.iter().map(|request| async move {
            let response = self.fetcher.fetch(request).await?;
            if !response.is_cacheable() {
                return Err(OfflineError::PrecacheFailed {
                    url: request.url.clone(),
                    status: response.status,
                });
            }
            Ok(response)
        }))
        .await?;

        bucket.put_all(requests.iter().zip(responses.iter()))?;
        Ok(requests.len())
    }

    /// Delete every bucket except the current one, then claim all clients.
    /// Returns the names of the deleted buckets.
    pub async fn activate(&mut self) -> Result<Vec<String>> {
        self.state = WorkerState::Activating;

        match self.purge_stale_buckets().await {
            Ok(deleted) => {
                self.clients_claimed = true;
                self.state = WorkerState::Activated;
                info!(version = %self.version, purged = deleted.len(), "Service worker activated");
                Ok(deleted)
            }
            Err(e) => {
                warn!(version = %self.version, error = %e, "Service worker activation failed");
                self.state = WorkerState::Redundant;
                Err(e)
            }
        }
    }

    async fn purge_stale_buckets(&self) -> Result<Vec<String>> {
        let stale = self
            .storage
            .keys()?
            .into_iter()
            .filter(|name| *name != self.version);

        let deletions = stale.map(|name| {
            let storage = Arc::clone(&self.storage);
            tokio::task::spawn_blocking(move || storage.delete(&name).map(|_| name))
        });

        let mut deleted = Vec::new();
        for result in join_all(deletions).await {
            let name = result??;
            info!(bucket = %name, "Deleted stale cache bucket");
            deleted.push(name);
        }
        Ok(deleted)
    }

    /// Answer an intercepted request.
    ///
    /// Cache hit: the cached response, no network call. Miss: the network
    /// response, with 200s copied into the bucket in the background. Network
    /// failure: the offline page for navigations, a synthetic 503 otherwise.
    pub async fn handle_fetch(&self, request: &Request) -> Response {
        match self.cached(request).await {
            Ok(Some(response)) => {
                debug!(url = %request.url, "Cache hit");
                return response;
            }
            Ok(None) => debug!(url = %request.url, "Cache miss"),
            Err(e) => warn!(url = %request.url, error = %e, "Cache lookup failed, using network"),
        }

        match self.fetcher.fetch(request).await {
            Ok(response) => {
                if response.is_cacheable() && request.is_get() {
                    self.cache_in_background(request.clone(), response.clone());
                }
                response
            }
            Err(e) => {
                debug!(url = %request.url, error = %e, "Network fetch failed");
                self.offline_fallback(request).await
            }
        }
    }

    async fn cached(&self, request: &Request) -> Result<Option<Response>> {
        if !request.is_get() {
            return Ok(None);
        }
        let storage = Arc::clone(&self.storage);
        let version = self.version.clone();
        let url = request.url.clone();

        // Bucket reads are blocking file I/O behind the storage lock
        tokio::task::spawn_blocking(move || {
            // Lookups must not create the bucket
            if !storage.has(&version) {
                return Ok(None);
            }
            storage.open(&version)?.match_url(&url)
        })
        .await?
    }

    fn cache_in_background(&self, request: Request, response: Response) {
        let storage = Arc::clone(&self.storage);
        let version = self.version.clone();

        let Ok(mut pending) = self.pending_writes.lock() else {
            warn!(url = %request.url, "Pending write set poisoned, skipping cache write");
            return;
        };
        // Reap finished writes so the set does not grow without bound
        while pending.try_join_next().is_some() {}

        pending.spawn_blocking(move || {
            let result = storage
                .open(&version)
                .and_then(|bucket| bucket.put(&request, &response));
            match result {
                Ok(()) => debug!(url = %request.url, "Cached network response"),
                Err(e) => warn!(url = %request.url, error = %e, "Background cache write failed"),
            }
        });
    }

    async fn offline_fallback(&self, request: &Request) -> Response {
        if request.is_navigation() {
            match self.cached(&Request::get(self.offline_page.as_str())).await {
                Ok(Some(page)) => return page,
                Ok(None) => warn!(page = %self.offline_page, "Offline page is not cached"),
                Err(e) => warn!(page = %self.offline_page, error = %e, "Failed to read offline page"),
            }
        }
        Response::service_unavailable()
    }

    /// Wait for every background cache write started so far.
    pub async fn settle(&self) {
        let mut pending = match self.pending_writes.lock() {
            Ok(mut guard) => mem::take(&mut *guard),
            Err(_) => return,
        };
        while let Some(result) = pending.join_next().await {
            if let Err(e) = result {
                warn!(error = %e, "Background cache write panicked");
            }
        }
    }

    pub fn handle_message(&self, message: WorkerMessage) -> Result<WorkerReply> {
        match message {
            WorkerMessage::GetVersion => Ok(WorkerReply::Version(self.version.clone())),
            WorkerMessage::ListCached => {
                if !self.storage.has(&self.version) {
                    return Ok(WorkerReply::Cached(Vec::new()));
                }
                Ok(WorkerReply::Cached(self.storage.open(&self.version)?.keys()?))
            }
            WorkerMessage::ClearCache => {
                if !self.storage.has(&self.version) {
                    return Ok(WorkerReply::Cleared(0));
                }
                Ok(WorkerReply::Cleared(self.storage.open(&self.version)?.clear()?))
            }
        }
    }

    /// Stop controlling clients. Used when replaced or unregistered.
    pub(crate) fn retire(&mut self) {
        self.clients_claimed = false;
        self.state = WorkerState::Redundant;
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    /// In-memory network that counts every fetch.
    #[derive(Default)]
    pub(crate) struct MockNetwork {
        assets: Mutex<HashMap<String, Response>>,
        calls: AtomicUsize,
        offline: AtomicBool,
    }

    impl MockNetwork {
        pub(crate) fn with_app_shell() -> Arc<Self> {
            let network = Arc::new(Self::default());
            for url in PRECACHE_MANIFEST.iter().chain([&OFFLINE_PAGE]) {
                network.serve(url, Response::ok("text/html", format!("asset {}", url)));
            }
            network
        }

        pub(crate) fn serve(&self, url: &str, response: Response) {
            self.assets.lock().unwrap().insert(url.to_string(), response);
        }

        pub(crate) fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        pub(crate) fn reset_calls(&self) {
            self.calls.store(0, Ordering::SeqCst);
        }

        pub(crate) fn set_offline(&self, offline: bool) {
            self.offline.store(offline, Ordering::SeqCst);
        }
    }

    impl Fetch for MockNetwork {
        async fn fetch(&self, request: &Request) -> Result<Response> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.offline.load(Ordering::SeqCst) {
                return Err(OfflineError::Unreachable(request.url.clone()));
            }
            let found = self.assets.lock().unwrap().get(&request.url).cloned();
            Ok(found.unwrap_or_else(|| Response::new(404, "Not Found", "")))
        }
    }

    pub(crate) fn storage() -> (tempfile::TempDir, Arc<CacheStorage>) {
        let dir = tempfile::tempdir().unwrap();
        let storage = Arc::new(CacheStorage::new(dir.path().join("caches")).unwrap());
        (dir, storage)
    }

    async fn installed_worker() -> (
        tempfile::TempDir,
        Arc<CacheStorage>,
        Arc<MockNetwork>,
        ServiceWorker<Arc<MockNetwork>>,
    ) {
        let (dir, storage) = storage();
        let network = MockNetwork::with_app_shell();
        let mut worker =
            ServiceWorker::new(Arc::clone(&storage), Arc::clone(&network), DEFAULT_CACHE_VERSION);
        worker.install().await.unwrap();
        worker.activate().await.unwrap();
        network.reset_calls();
        (dir, storage, network, worker)
    }

    #[tokio::test]
    async fn test_install_precaches_manifest_and_offline_page() {
        let (_dir, storage) = storage();
        let network = MockNetwork::with_app_shell();
        let mut worker =
            ServiceWorker::new(Arc::clone(&storage), Arc::clone(&network), DEFAULT_CACHE_VERSION);

        worker.install().await.unwrap();

        assert_eq!(worker.state(), WorkerState::Installed);
        assert!(worker.skip_waiting_requested());
        let cached = storage.open(DEFAULT_CACHE_VERSION).unwrap().keys().unwrap();
        assert_eq!(cached.len(), PRECACHE_MANIFEST.len() + 1);
        assert!(cached.contains(&OFFLINE_PAGE.to_string()));
    }

    #[tokio::test]
    async fn test_install_is_all_or_nothing() {
        let (_dir, storage) = storage();
        let network = MockNetwork::with_app_shell();
        network.serve("/manifest.json", Response::new(500, "Internal Server Error", ""));
        let mut worker =
            ServiceWorker::new(Arc::clone(&storage), Arc::clone(&network), DEFAULT_CACHE_VERSION);

        let err = worker.install().await.unwrap_err();
        assert!(matches!(err, OfflineError::PrecacheFailed { status: 500, .. }));
        assert_eq!(worker.state(), WorkerState::Redundant);
        assert!(!worker.skip_waiting_requested());
        assert!(storage.open(DEFAULT_CACHE_VERSION).unwrap().keys().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_activate_keeps_only_current_bucket() {
        for stale_count in [0usize, 1, 5] {
            let (_dir, storage) = storage();
            for i in 0..stale_count {
                storage.open(&format!("hospital-hospital-v0.{}", i)).unwrap();
            }
            let network = MockNetwork::with_app_shell();
            let mut worker =
                ServiceWorker::new(Arc::clone(&storage), network, DEFAULT_CACHE_VERSION);
            worker.install().await.unwrap();

            let deleted = worker.activate().await.unwrap();

            assert_eq!(deleted.len(), stale_count);
            assert_eq!(storage.keys().unwrap(), vec![DEFAULT_CACHE_VERSION.to_string()]);
            assert_eq!(worker.state(), WorkerState::Activated);
            assert!(worker.controls_clients());
        }
    }

    #[tokio::test]
    async fn test_cached_asset_skips_network() {
        let (_dir, _storage, network, worker) = installed_worker().await;

        let response = worker.handle_fetch(&Request::get("/index.html")).await;

        assert_eq!(response.status, 200);
        assert_eq!(response.text(), "asset /index.html");
        assert_eq!(network.calls(), 0);
    }

    #[tokio::test]
    async fn test_miss_goes_to_network_and_is_cached() {
        let (_dir, _storage, network, worker) = installed_worker().await;
        network.serve("/assets/app.js", Response::ok("text/javascript", "console.log(1)"));

        let first = worker.handle_fetch(&Request::get("/assets/app.js")).await;
        assert_eq!(first.text(), "console.log(1)");
        assert_eq!(network.calls(), 1);

        worker.settle().await;
        network.set_offline(true);

        let second = worker.handle_fetch(&Request::get("/assets/app.js")).await;
        assert_eq!(second, first);
        assert_eq!(network.calls(), 1);
    }

    #[tokio::test]
    async fn test_non_200_is_returned_but_not_cached() {
        let (_dir, storage, network, worker) = installed_worker().await;

        let response = worker.handle_fetch(&Request::get("/missing.png")).await;
        assert_eq!(response.status, 404);

        worker.settle().await;
        let bucket = storage.open(DEFAULT_CACHE_VERSION).unwrap();
        assert_eq!(bucket.match_url("/missing.png").unwrap(), None);
        assert_eq!(network.calls(), 1);
    }

    #[tokio::test]
    async fn test_non_get_is_never_cached() {
        let (_dir, storage, network, worker) = installed_worker().await;
        network.serve("/api/sync", Response::ok("application/json", "{}"));

        let post = Request::get("/api/sync").with_method("POST");
        assert_eq!(worker.handle_fetch(&post).await.status, 200);
        worker.settle().await;

        let bucket = storage.open(DEFAULT_CACHE_VERSION).unwrap();
        assert_eq!(bucket.match_url("/api/sync").unwrap(), None);
    }

    #[tokio::test]
    async fn test_offline_navigation_gets_offline_page() {
        let (_dir, _storage, network, worker) = installed_worker().await;
        network.set_offline(true);

        let response = worker.handle_fetch(&Request::navigate("/citas")).await;

        assert_eq!(response.status, 200);
        assert_eq!(response.text(), format!("asset {}", OFFLINE_PAGE));
    }

    #[tokio::test]
    async fn test_offline_subresource_gets_503() {
        let (_dir, _storage, network, worker) = installed_worker().await;
        network.set_offline(true);

        let response = worker.handle_fetch(&Request::get("/assets/chart.js")).await;

        assert_eq!(response, Response::service_unavailable());
    }

    #[tokio::test]
    async fn test_offline_navigation_without_offline_page_gets_503() {
        let (_dir, storage) = storage();
        let network = Arc::new(MockNetwork::default());
        network.set_offline(true);
        let worker = ServiceWorker::new(storage, network, DEFAULT_CACHE_VERSION);

        let response = worker.handle_fetch(&Request::navigate("/")).await;
        assert_eq!(response.status, 503);
    }

    #[tokio::test]
    async fn test_messages() {
        let (_dir, _storage, _network, worker) = installed_worker().await;

        assert_eq!(
            worker.handle_message(WorkerMessage::GetVersion).unwrap(),
            WorkerReply::Version(DEFAULT_CACHE_VERSION.to_string())
        );
        let WorkerReply::Cached(urls) = worker.handle_message(WorkerMessage::ListCached).unwrap()
        else {
            panic!("expected cached urls");
        };
        assert_eq!(urls.len(), PRECACHE_MANIFEST.len() + 1);
        assert_eq!(
            worker.handle_message(WorkerMessage::ClearCache).unwrap(),
            WorkerReply::Cleared(PRECACHE_MANIFEST.len() + 1)
        );
    }

    #[test]
    fn test_precache_urls_do_not_duplicate_offline_page() {
        let (_dir, storage) = storage();
        let worker = ServiceWorker::new(storage, Arc::new(MockNetwork::default()), "v")
            .with_manifest(vec!["/".into(), "/offline.html".into()]);
        assert_eq!(worker.precache_urls(), vec!["/", "/offline.html"]);
    }
}
