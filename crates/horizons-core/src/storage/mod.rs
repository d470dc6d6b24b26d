//! Storage layer
//!
//! Local persistence for the task document and sync session state.
//!
//! All values are JSON-encoded strings behind the [`KeyValueStore`] trait,
//! so the same code runs against files on disk ([`FileStore`]) and against
//! an in-memory map ([`MemoryStore`]).

pub mod error;
pub mod local;

pub use error::{StorageError, StorageResult};
pub use local::{get_json, set_json, FileStore, KeyValueStore, MemoryStore};

/// Key holding the local task document
pub const DATA_KEY: &str = "data";
/// Key holding the current encoded session identifier
pub const SESSION_KEY: &str = "sync-session";
/// Key holding `{enabled, sessionId}` for auto-reconnect
pub const SYNC_CONFIG_KEY: &str = "sync-config";
