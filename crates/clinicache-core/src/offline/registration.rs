// Registration lifecycle for the client side: which worker controls the
// page, update detection, and message posting.

use tracing::info;

use super::error::{OfflineError, Result};
use super::fetch::Fetch;
use super::worker::{ServiceWorker, WorkerMessage, WorkerReply};

/// What a successful install means for the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateStatus {
    /// First install: the app shell is now available offline.
    ContentCached,
    /// A newer worker replaced (or is waiting to replace) the controlling one.
    NewContentAvailable,
}

pub struct Registration<F> {
    active: Option<ServiceWorker<F>>,
    waiting: Option<ServiceWorker<F>>,
}

impl<F: Fetch> Default for Registration<F> {
    fn default() -> Self {
        Self {
            active: None,
            waiting: None,
        }
    }
}

impl<F: Fetch> Registration<F> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install `worker` and, if it skips waiting or nothing is active yet,
    /// activate it as the controller.
    pub async fn register(&mut self, mut worker: ServiceWorker<F>) -> Result<UpdateStatus> {
        worker.install().await?;

        let status = if self.controller().is_some() {
            info!(version = %worker.version(), "New content available");
            UpdateStatus::NewContentAvailable
        } else {
            info!(version = %worker.version(), "Content cached for offline use");
            UpdateStatus::ContentCached
        };

        if worker.skip_waiting_requested() || self.active.is_none() {
            self.promote(worker).await?;
        } else {
            info!(version = %worker.version(), "Installed worker waiting for clients to close");
            self.waiting = Some(worker);
        }
        Ok(status)
    }

    /// Install a newer worker version. Same lifecycle as `register`.
    pub async fn update(&mut self, worker: ServiceWorker<F>) -> Result<UpdateStatus> {
        self.register(worker).await
    }

    /// Activate the waiting worker, if any. Returns whether one was activated.
    pub async fn activate_waiting(&mut self) -> Result<bool> {
        match self.waiting.take() {
            Some(worker) => {
                self.promote(worker).await?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Make `worker` the controller. The current controller keeps control
    /// unless activation succeeds.
    async fn promote(&mut self, mut worker: ServiceWorker<F>) -> Result<()> {
        // Finish writes into the old bucket before activation purges it
        if let Some(previous) = &self.active {
            previous.settle().await;
        }
        worker.activate().await?;

        if let Some(mut previous) = self.active.take() {
            previous.retire();
        }
        self.waiting = None;
        self.active = Some(worker);
        Ok(())
    }

    /// The worker controlling the client, if any.
    pub fn controller(&self) -> Option<&ServiceWorker<F>> {
        self.active.as_ref().filter(|w| w.controls_clients())
    }

    pub fn waiting(&self) -> Option<&ServiceWorker<F>> {
        self.waiting.as_ref()
    }

    /// Drop every worker. Caches are left in place. Returns whether anything was registered.
    pub async fn unregister(&mut self) -> bool {
        let mut any = false;
        for mut worker in [self.active.take(), self.waiting.take()].into_iter().flatten() {
            worker.settle().await;
            worker.retire();
            any = true;
        }
        if any {
            info!("Service worker unregistered");
        }
        any
    }

    pub fn post_message(&self, message: WorkerMessage) -> Result<WorkerReply> {
        self.controller()
            .ok_or(OfflineError::NoController)?
            .handle_message(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::offline::worker::tests::{storage, MockNetwork};
    use crate::offline::{Request, WorkerState, DEFAULT_CACHE_VERSION};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_first_register_caches_content() {
        let (_dir, storage) = storage();
        let network = MockNetwork::with_app_shell();
        let mut registration = Registration::new();

        let status = registration
            .register(ServiceWorker::new(storage, network, DEFAULT_CACHE_VERSION))
            .await
            .unwrap();

        assert_eq!(status, UpdateStatus::ContentCached);
        assert_eq!(
            registration.controller().map(|w| w.version()),
            Some(DEFAULT_CACHE_VERSION)
        );
    }

    #[tokio::test]
    async fn test_update_replaces_controller_and_purges_old_bucket() {
        let (_dir, storage) = storage();
        let network = MockNetwork::with_app_shell();
        let mut registration = Registration::new();
        registration
            .register(ServiceWorker::new(Arc::clone(&storage), Arc::clone(&network), "v1"))
            .await
            .unwrap();

        let status = registration
            .update(ServiceWorker::new(Arc::clone(&storage), Arc::clone(&network), "v2"))
            .await
            .unwrap();

        assert_eq!(status, UpdateStatus::NewContentAvailable);
        assert_eq!(registration.controller().map(|w| w.version()), Some("v2"));
        assert_eq!(storage.keys().unwrap(), vec!["v2".to_string()]);
    }

    #[tokio::test]
    async fn test_waiting_worker_until_activated() {
        let (_dir, storage) = storage();
        let network = MockNetwork::with_app_shell();
        let mut registration = Registration::new();
        registration
            .register(ServiceWorker::new(Arc::clone(&storage), Arc::clone(&network), "v1"))
            .await
            .unwrap();

        registration
            .update(
                ServiceWorker::new(Arc::clone(&storage), Arc::clone(&network), "v2")
                    .wait_for_clients(),
            )
            .await
            .unwrap();

        assert_eq!(registration.controller().map(|w| w.version()), Some("v1"));
        assert_eq!(registration.waiting().map(|w| w.version()), Some("v2"));

        assert!(registration.activate_waiting().await.unwrap());
        assert_eq!(registration.controller().map(|w| w.version()), Some("v2"));
        assert!(registration.waiting().is_none());
    }

    #[tokio::test]
    async fn test_failed_install_keeps_current_controller() {
        let (_dir, storage) = storage();
        let network = MockNetwork::with_app_shell();
        let mut registration = Registration::new();
        registration
            .register(ServiceWorker::new(Arc::clone(&storage), Arc::clone(&network), "v1"))
            .await
            .unwrap();

        network.set_offline(true);
        let result = registration
            .update(ServiceWorker::new(Arc::clone(&storage), Arc::clone(&network), "v2"))
            .await;

        assert!(result.is_err());
        assert_eq!(registration.controller().map(|w| w.version()), Some("v1"));
    }

    #[tokio::test]
    async fn test_failed_activation_keeps_current_controller() {
        let (dir, storage) = storage();
        let network = MockNetwork::with_app_shell();
        let mut registration = Registration::new();
        registration
            .register(ServiceWorker::new(Arc::clone(&storage), Arc::clone(&network), "v1"))
            .await
            .unwrap();
        registration
            .update(
                ServiceWorker::new(Arc::clone(&storage), Arc::clone(&network), "v2")
                    .wait_for_clients(),
            )
            .await
            .unwrap();

        // Listing buckets fails once the storage root is no longer a directory
        std::fs::remove_dir_all(storage.root()).unwrap();
        std::fs::write(dir.path().join("caches"), "not a directory").unwrap();

        assert!(registration.activate_waiting().await.is_err());
        let controller = registration.controller().unwrap();
        assert_eq!(controller.version(), "v1");
        assert_eq!(controller.state(), WorkerState::Activated);
    }

    #[tokio::test]
    async fn test_post_message_requires_controller() {
        let (_dir, storage) = storage();
        let network = MockNetwork::with_app_shell();
        let mut registration = Registration::new();

        assert!(matches!(
            registration.post_message(WorkerMessage::GetVersion),
            Err(OfflineError::NoController)
        ));

        registration
            .register(ServiceWorker::new(storage, network, DEFAULT_CACHE_VERSION))
            .await
            .unwrap();
        assert_eq!(
            registration.post_message(WorkerMessage::GetVersion).unwrap(),
            WorkerReply::Version(DEFAULT_CACHE_VERSION.to_string())
        );

        assert!(registration.unregister().await);
        assert!(registration.controller().is_none());
        assert!(!registration.unregister().await);
    }

    #[tokio::test]
    async fn test_controller_serves_fetches() {
        let (_dir, storage) = storage();
        let network = MockNetwork::with_app_shell();
        let mut registration = Registration::new();
        registration
            .register(ServiceWorker::new(storage, Arc::clone(&network), DEFAULT_CACHE_VERSION))
            .await
            .unwrap();
        network.reset_calls();

        let controller = registration.controller().unwrap();
        let response = controller.handle_fetch(&Request::navigate("/")).await;
        assert_eq!(response.status, 200);
        assert_eq!(network.calls(), 0);
    }
}
