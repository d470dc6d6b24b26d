//! Horizons Core Library
//!
//! This crate provides the core functionality for Horizons, a task manager
//! that files tasks under cascading time horizons (hours to life) and keeps
//! them in sync across devices through free, keyless storage providers.
//!
//! # Architecture
//!
//! - **Local first**: the task document lives in local storage and every
//!   command works offline
//! - **Best-effort cloud sync**: one whole document per session, merged by
//!   last-writer-wins on its `lastSaved` stamp
//!
//! # Quick Start
//!
//! ```text
//! let config = Config::load()?;
//! let kv: Arc<dyn KeyValueStore> = Arc::new(FileStore::open(&config.data_dir)?);
//! let mut store = TaskStore::open(kv.clone())?;
//!
//! store.add_task(Task::new("Plan the week", Horizon::Weeks))?;
//!
//! let engine = SyncEngine::from_settings(&config.sync, kv);
//! engine.resume().await?;
//! let merged = engine.sync(store.document().clone()).await;
//! store.adopt(merged)?;
//! ```
//!
//! # Modules
//!
//! - `store`: Task CRUD over the local document (main entry point)
//! - `models`: Documents, tasks, horizons
//! - `storage`: Key-value persistence
//! - `sync`: Providers, session codes, merge, sync engine
//! - `config`: Application configuration

pub mod config;
pub mod models;
pub mod storage;
pub mod store;
pub mod sync;

pub use config::{Config, SyncSettings};
pub use models::{Document, Horizon, Priority, Task, TimeSettings};
pub use storage::{FileStore, KeyValueStore, MemoryStore, StorageError};
pub use store::TaskStore;
pub use sync::{Provider, SyncEngine, SyncError, SyncStatus};
