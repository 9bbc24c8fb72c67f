// Named response caches on disk.
//
// Layout: `<root>/<bucket>/index.json` maps URLs to stored entries, and each
// entry's body lives in its own `<n>.body` file next to the index.

use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::error::{OfflineError, Result};
use super::fetch::{Request, Response};
use crate::utils::write_atomic;

const INDEX_FILE: &str = "index.json";

#[derive(Debug, Default, Serialize, Deserialize)]
struct BucketIndex {
    next_body: u64,
    entries: BTreeMap<String, StoredEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredEntry {
    status: u16,
    status_text: String,
    headers: Vec<(String, String)>,
    body_file: String,
    cached_at: DateTime<Utc>,
}

/// All cache buckets of one origin.
pub struct CacheStorage {
    root: PathBuf,
    // Serializes index read-modify-write cycles across buckets
    lock: Mutex<()>,
}

impl CacheStorage {
    pub fn new(root: PathBuf) -> Result<Self> {
        fs::create_dir_all(&root)?;
        Ok(Self {
            root,
            lock: Mutex::new(()),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn validate_name(name: &str) -> Result<()> {
        let invalid = name.is_empty()
            || name.starts_with('.')
            || name.contains(['/', '\\'])
            || name.chars().any(char::is_control);
        if invalid {
            return Err(OfflineError::InvalidBucketName(name.to_string()));
        }
        Ok(())
    }

    fn guard(&self) -> Result<MutexGuard<'_, ()>> {
        self.lock.lock().map_err(|_| OfflineError::Poisoned)
    }

    /// Open a bucket, creating it if it does not exist.
    pub fn open(&self, name: &str) -> Result<Bucket<'_>> {
        Self::validate_name(name)?;
        let dir = self.root.join(name);
        fs::create_dir_all(&dir)?;
        Ok(Bucket {
            storage: self,
            name: name.to_string(),
            dir,
        })
    }

    pub fn has(&self, name: &str) -> bool {
        Self::validate_name(name).is_ok() && self.root.join(name).is_dir()
    }

    /// Names of every existing bucket, sorted.
    pub fn keys(&self) -> Result<Vec<String>> {
        let mut names = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            if entry.file_type()?.is_dir() {
                if let Some(name) = entry.file_name().to_str() {
                    names.push(name.to_string());
                }
            }
        }
        names.sort();
        Ok(names)
    }

    /// Delete a bucket and everything in it. Returns whether it existed.
    pub fn delete(&self, name: &str) -> Result<bool> {
        Self::validate_name(name)?;
        let _guard = self.guard()?;
        let dir = self.root.join(name);
        if !dir.is_dir() {
            return Ok(false);
        }
        fs::remove_dir_all(&dir)?;
        debug!(bucket = name, "Deleted cache bucket");
        Ok(true)
    }
}

/// One named bucket, borrowed from its `CacheStorage`.
pub struct Bucket<'a> {
    storage: &'a CacheStorage,
    name: String,
    dir: PathBuf,
}

impl Bucket<'_> {
    pub fn name(&self) -> &str {
        &self.name
    }

    fn load_index(&self) -> Result<BucketIndex> {
        let path = self.dir.join(INDEX_FILE);
        match fs::read_to_string(&path) {
            Ok(contents) => Ok(serde_json::from_str(&contents)?),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(BucketIndex::default()),
            Err(e) => Err(e.into()),
        }
    }

    fn save_index(&self, index: &BucketIndex) -> Result<()> {
        let contents = serde_json::to_string_pretty(index)?;
        write_atomic(&self.dir.join(INDEX_FILE), contents.as_bytes())?;
        Ok(())
    }

    /// Look up a request. Only GET requests ever match.
    pub fn match_request(&self, request: &Request) -> Result<Option<Response>> {
        if !request.is_get() {
            return Ok(None);
        }
        self.match_url(&request.url)
    }

    pub fn match_url(&self, url: &str) -> Result<Option<Response>> {
        let _guard = self.storage.guard()?;
        let index = self.load_index()?;
        let Some(entry) = index.entries.get(url) else {
            return Ok(None);
        };

        let body = match fs::read(self.dir.join(&entry.body_file)) {
            Ok(body) => body,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                warn!(bucket = %self.name, url, "Cache entry lost its body, treating as miss");
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        };

        Ok(Some(Response {
            status: entry.status,
            status_text: entry.status_text.clone(),
            headers: entry.headers.clone(),
            body,
        }))
    }

    pub fn put(&self, request: &Request, response: &Response) -> Result<()> {
        self.put_all([(request, response)])
    }

    /// Store several responses in one index update. Nothing is stored if any
    /// request is not a GET.
    pub fn put_all<'r>(
        &self,
        entries: impl IntoIterator<Item = (&'r Request, &'r Response)>,
    ) -> Result<()> {
        let entries: Vec<_> = entries.into_iter().collect();
        if let Some((request, _)) = entries.iter().find(|(request, _)| !request.is_get()) {
            return Err(OfflineError::UnsupportedMethod(request.method.clone()));
        }

        let _guard = self.storage.guard()?;
        let mut index = self.load_index()?;
        let mut replaced = Vec::new();

        for (request, response) in entries {
            let body_file = format!("{}.body", index.next_body);
            index.next_body += 1;
            write_atomic(&self.dir.join(&body_file), &response.body)?;

            let entry = StoredEntry {
                status: response.status,
                status_text: response.status_text.clone(),
                headers: response.headers.clone(),
                body_file,
                cached_at: Utc::now(),
            };
            if let Some(old) = index.entries.insert(request.url.clone(), entry) {
                replaced.push(old.body_file);
            }
        }

        self.save_index(&index)?;

        for body_file in replaced {
            if let Err(e) = fs::remove_file(self.dir.join(&body_file)) {
                debug!(bucket = %self.name, body_file, error = %e, "Failed to remove replaced body");
            }
        }
        Ok(())
    }

    /// Remove one cached URL. Returns whether it was present.
    pub fn delete(&self, url: &str) -> Result<bool> {
        let _guard = self.storage.guard()?;
        let mut index = self.load_index()?;
        let Some(entry) = index.entries.remove(url) else {
            return Ok(false);
        };
        self.save_index(&index)?;
        let _ = fs::remove_file(self.dir.join(entry.body_file));
        Ok(true)
    }

    /// Cached URLs, sorted.
    pub fn keys(&self) -> Result<Vec<String>> {
        let _guard = self.storage.guard()?;
        Ok(self.load_index()?.entries.into_keys().collect())
    }

    /// Remove every entry. Returns how many there were.
    pub fn clear(&self) -> Result<usize> {
        let _guard = self.storage.guard()?;
        let index = self.load_index()?;
        let count = index.entries.len();
        for entry in index.entries.values() {
            let _ = fs::remove_file(self.dir.join(&entry.body_file));
        }
        self.save_index(&BucketIndex {
            next_body: index.next_body,
            entries: BTreeMap::new(),
        })?;
        Ok(count)
    }
}
