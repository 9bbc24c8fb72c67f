//! Clinicache core library.
//!
//! Offline-first plumbing for a hospital doctors/appointments client:
//!
//! - [`offline`]: versioned response cache with a service-worker style
//!   install / activate / fetch lifecycle
//! - [`store`]: doctor and appointment collections with a doctor index
//! - [`prefs`]: user preferences and session data over a key-value backend
//! - [`api`]: openFDA drug label search

pub mod api;
pub mod config;
pub mod models;
pub mod offline;
pub mod prefs;
pub mod store;
pub mod utils;
