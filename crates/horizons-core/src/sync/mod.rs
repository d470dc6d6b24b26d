//! Cloud sync against free, keyless storage providers
//!
//! ## Layers
//!
//! 1. [`Transport`]: HTTP with timeouts and JSON/text coercion
//! 2. [`Backend`] adapters: Pantry, JSONBin and the legacy KVDB
//! 3. [`session`]: `"<provider>:<id>"` codes and their persistence
//! 4. [`merge`]: whole-document last-writer-wins on `lastSaved`
//! 5. [`SyncEngine`]: session lifecycle, fallback, polling
//!
//! ## Usage
//!
//! ```ignore
//! let engine = SyncEngine::from_settings(&config.sync, kv.clone());
//! engine.on_change(|remote| println!("remote saved at {:?}", remote.last_saved));
//! engine.resume().await?;
//!
//! let merged = engine.sync(local).await;
//! ```

pub mod backend;
pub mod engine;
pub mod error;
pub mod merge;
pub mod poller;
pub mod session;
pub mod transport;

pub use backend::{
    Backend, BackendRegistry, JsonBinBackend, KvdbBackend, MemoryBackend, PantryBackend, Provider,
};
pub use engine::{ChangeCallback, SyncEngine, SyncStatus, DEFAULT_POLL_INTERVAL};
pub use error::{SyncError, SyncResult, TransportError};
pub use merge::{merge, should_accept_remote};
pub use session::{classify, decode, encode, CodeKind, Session, SessionStore, SyncConfig};
pub use transport::{HttpResponse, RequestOptions, Transport};
