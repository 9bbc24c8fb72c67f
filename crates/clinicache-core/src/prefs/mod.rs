//! User preferences and session state.
//!
//! This module provides:
//! - `KeyValueBackend`: string key-value storage, with a durable
//!   `FileBackend` and a session-scoped `MemoryBackend`
//! - `PreferencesService`: display preferences (theme, font size,
//!   notifications, language)
//! - `SessionService`: transient UI state (last page, search history,
//!   temporary view data)
//!
//! Both services are constructed once with an injected backend and passed
//! to the code that needs them. Reads never fail: missing or unreadable
//! values fall back to defaults.

pub mod backend;
pub mod error;
pub mod preferences;
pub mod session;

pub use backend::{FileBackend, KeyValueBackend, MemoryBackend};
pub use error::PrefsError;
pub use preferences::{FontSize, PreferencesService, Theme, UserPreferences};
pub use session::{SessionData, SessionService};
