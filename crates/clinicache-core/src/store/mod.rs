//! Local data store for doctors and appointments.
//!
//! This module provides the `Database` that persists both collections as
//! JSON files in the data directory. Identifiers are auto-incremented and
//! never reused after deletion.
//!
//! - `Collection`: one file-backed, id-keyed record set
//! - `Database`: both collections, the doctor index on appointments, the
//!   guarded doctor delete and first-run seeding

pub mod collection;
pub mod database;
pub mod error;
pub mod seed;

pub use collection::{Collection, Record};
pub use database::{Database, StoreCounts};
pub use error::{Result, StoreError};
