//! In-process backend
//!
//! Stores documents in a map. Share one instance between several engines
//! (via `Arc`) to simulate several clients talking to the same provider.
//! Failures can be switched on per operation to exercise fallback paths.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use super::{Backend, Provider};
use crate::models::Document;
use crate::sync::error::{SyncError, SyncResult};

/// Map-backed [`Backend`]
#[derive(Debug)]
pub struct MemoryBackend {
    provider: Provider,
    documents: Mutex<HashMap<String, Document>>,
    next_id: AtomicUsize,
    fail_create: AtomicBool,
    fail_fetch: AtomicBool,
    fail_save: AtomicBool,
    fetches: AtomicUsize,
    saves: AtomicUsize,
}

impl MemoryBackend {
    pub fn new(provider: Provider) -> Self {
        Self {
            provider,
            documents: Mutex::new(HashMap::new()),
            next_id: AtomicUsize::new(1),
            fail_create: AtomicBool::new(false),
            fail_fetch: AtomicBool::new(false),
            fail_save: AtomicBool::new(false),
            fetches: AtomicUsize::new(0),
            saves: AtomicUsize::new(0),
        }
    }

    /// Make every call fail (or succeed again)
    pub fn set_offline(&self, offline: bool) {
        self.set_fail_create(offline);
        self.set_fail_fetch(offline);
        self.set_fail_save(offline);
    }

    pub fn set_fail_create(&self, fail: bool) {
        self.fail_create.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_fetch(&self, fail: bool) {
        self.fail_fetch.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_save(&self, fail: bool) {
        self.fail_save.store(fail, Ordering::SeqCst);
    }

    /// Place a document directly, bypassing the failure switches
    pub fn insert(&self, id: impl Into<String>, document: Document) {
        self.lock().insert(id.into(), document);
    }

    /// Current stored document, bypassing the failure switches
    pub fn document(&self, id: &str) -> Option<Document> {
        self.lock().get(id).cloned()
    }

    /// Remove a stored document
    pub fn remove(&self, id: &str) -> Option<Document> {
        self.lock().remove(id)
    }

    /// Number of stored documents
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of `fetch` calls made so far
    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    /// Number of successful `save` calls made so far
    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, Document>> {
        self.documents
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn offline(&self, operation: &str) -> SyncError {
        SyncError::provider(self.provider, format!("{operation}: provider offline"))
    }
}

#[async_trait]
impl Backend for MemoryBackend {
    fn provider(&self) -> Provider {
        self.provider
    }

    async fn create_session(&self) -> SyncResult<String> {
        if self.fail_create.load(Ordering::SeqCst) {
            return Err(self.offline("create"));
        }
        let n = self.next_id.fetch_add(1, Ordering::SeqCst);
        let id = format!("{}-{}", self.provider, n);
        self.lock().insert(id.clone(), Document::empty());
        Ok(id)
    }

    async fn fetch(&self, id: &str) -> SyncResult<Option<Document>> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if self.fail_fetch.load(Ordering::SeqCst) {
            return Err(self.offline("fetch"));
        }
        Ok(self.lock().get(id).cloned())
    }

    async fn save(&self, id: &str, document: &Document) -> SyncResult<()> {
        if self.fail_save.load(Ordering::SeqCst) {
            return Err(self.offline("save"));
        }
        self.lock().insert(id.to_string(), document.clone());
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_create_seeds_empty_document() {
        let backend = MemoryBackend::new(Provider::Pantry);
        let id = backend.create_session().await.unwrap();

        assert_eq!(id, "pantry-1");
        let doc = backend.fetch(&id).await.unwrap().unwrap();
        assert!(doc.tasks.is_empty());
        assert!(doc.stamp().is_some());
    }

    #[tokio::test]
    async fn test_failure_switches() {
        let backend = MemoryBackend::new(Provider::JsonBin);
        backend.set_offline(true);

        assert!(backend.create_session().await.is_err());
        assert!(backend.fetch("x").await.is_err());
        assert!(backend.save("x", &Document::empty()).await.is_err());
        assert!(backend.is_empty());

        backend.set_offline(false);
        backend.save("x", &Document::empty()).await.unwrap();
        assert_eq!(backend.len(), 1);
        assert_eq!(backend.save_count(), 1);
        assert_eq!(backend.fetch_count(), 1);
    }
}
