//! Offline cache controller.
//!
//! This module models the service-worker cache lifecycle for the hospital
//! web client:
//!
//! - `CacheStorage` / `Bucket`: named, versioned response caches on disk
//! - `Fetch` / `HttpFetcher`: the network seam
//! - `ServiceWorker`: install (precache), activate (purge stale buckets),
//!   fetch interception (cache first, then network, then offline fallback)
//! - `Registration`: register / update / unregister and message posting
//!
//! Exactly one bucket name is current at a time; every other bucket is
//! deleted when a worker activates.

pub mod bucket;
pub mod error;
pub mod fetch;
pub mod registration;
pub mod worker;

pub use bucket::{Bucket, CacheStorage};
pub use error::{OfflineError, Result};
pub use fetch::{Fetch, HttpFetcher, Request, RequestMode, Response};
pub use registration::{Registration, UpdateStatus};
pub use worker::{
    ServiceWorker, WorkerMessage, WorkerReply, WorkerState, DEFAULT_CACHE_VERSION, OFFLINE_PAGE,
    PRECACHE_MANIFEST,
};
