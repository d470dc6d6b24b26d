//! Local task store
//!
//! The `TaskStore` owns the canonical in-memory [`Document`] and persists it
//! under the `data` key after every mutation.
//!
//! ## Change-stamps
//!
//! Local edits go through [`TaskStore::save`], which refreshes `lastSaved`.
//! Documents returned by sync or accepted from the poller go through
//! [`TaskStore::adopt`], which keeps their stamp so the next merge compares
//! like with like.
//!
//! ## Usage
//!
//! ```ignore
//! let store = TaskStore::open(kv)?;
//!
//! store.add_task(Task::new("Ship it", Horizon::Weeks))?;
//! let week = store.tasks_in(Horizon::Weeks);
//! ```

use std::fmt;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use tracing::warn;

use crate::models::{Document, Horizon, Task};
use crate::storage::{KeyValueStore, StorageError, DATA_KEY};
use crate::sync::merge;

/// The local task document and its persistence
pub struct TaskStore {
    kv: Arc<dyn KeyValueStore>,
    document: Document,
    /// Set when the stored document was unreadable and replaced
    recovered: Option<StorageError>,
}

impl fmt::Debug for TaskStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskStore")
            .field("tasks", &self.document.tasks.len())
            .field("last_saved", &self.document.last_saved)
            .finish_non_exhaustive()
    }
}

impl TaskStore {
    /// Load the document from `data`
    ///
    /// A missing document starts empty and unsaved, so the first sync adopts
    /// whatever the remote holds. A corrupt one is backed up and replaced the
    /// same way.
    pub fn open(kv: Arc<dyn KeyValueStore>) -> Result<Self> {
        let raw = kv.get(DATA_KEY).context("Failed to read local tasks")?;

        let (document, recovered) = match raw {
            None => (Document::unsaved(), None),
            Some(raw) => match Document::from_json_text(&raw) {
                Some(document) => (document, None),
                None => {
                    let backup_path = kv
                        .backup(DATA_KEY, &raw)
                        .context("Failed to back up corrupt local tasks")?;
                    let err = StorageError::CorruptValue {
                        key: DATA_KEY.to_string(),
                        backup_path,
                        details: "not a task document".to_string(),
                    };
                    warn!("{}", err);
                    (Document::unsaved(), Some(err))
                }
            },
        };

        Ok(Self {
            kv,
            document,
            recovered,
        })
    }

    /// The problem found while opening, if the stored document was replaced
    pub fn recovered_from(&self) -> Option<&StorageError> {
        self.recovered.as_ref()
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    pub fn tasks(&self) -> &[Task] {
        &self.document.tasks
    }

    /// Tasks shown under `horizon`, directly or by cascade
    pub fn tasks_in(&self, horizon: Horizon) -> Vec<&Task> {
        self.document
            .tasks
            .iter()
            .filter(|t| t.appears_in(&horizon))
            .collect()
    }

    // ==================== Task Operations ====================

    /// Add a new task
    pub fn add_task(&mut self, task: Task) -> Result<()> {
        if self.document.task(&task.id).is_some() {
            bail!("Task already exists: {}", task.id);
        }
        self.document.tasks.push(task);
        self.save()
    }

    /// Replace an existing task (matched by id)
    pub fn update_task(&mut self, mut task: Task) -> Result<()> {
        let slot = self
            .document
            .tasks
            .iter_mut()
            .find(|t| t.id == task.id)
            .ok_or_else(|| anyhow::anyhow!("Task not found: {}", task.id))?;
        task.touch();
        *slot = task;
        self.save()
    }

    /// Mark a task done
    pub fn complete_task(&mut self, id_or_prefix: &str) -> Result<Task> {
        let index = self.resolve(id_or_prefix)?;
        self.document.tasks[index].complete();
        let task = self.document.tasks[index].clone();
        self.save()?;
        Ok(task)
    }

    /// Mark a task not done
    pub fn reopen_task(&mut self, id_or_prefix: &str) -> Result<Task> {
        let index = self.resolve(id_or_prefix)?;
        self.document.tasks[index].reopen();
        let task = self.document.tasks[index].clone();
        self.save()?;
        Ok(task)
    }

    /// Delete a task
    pub fn delete_task(&mut self, id_or_prefix: &str) -> Result<Task> {
        let index = self.resolve(id_or_prefix)?;
        let task = self.document.tasks.remove(index);
        self.save()?;
        Ok(task)
    }

    /// Find a task by full id or unique id prefix
    pub fn find_task(&self, id_or_prefix: &str) -> Result<&Task> {
        let index = self.resolve(id_or_prefix)?;
        Ok(&self.document.tasks[index])
    }

    fn resolve(&self, id_or_prefix: &str) -> Result<usize> {
        let id = id_or_prefix.trim();
        if id.is_empty() {
            bail!("No task id given");
        }

        // Exact match first
        if let Some(index) = self.document.tasks.iter().position(|t| t.id == id) {
            return Ok(index);
        }

        let matches: Vec<usize> = self
            .document
            .tasks
            .iter()
            .enumerate()
            .filter(|(_, t)| t.id.starts_with(id))
            .map(|(i, _)| i)
            .collect();

        match matches.as_slice() {
            [] => bail!("No task found matching: {}", id),
            [index] => Ok(*index),
            _ => bail!(
                "Ambiguous ID '{}' matches {} tasks. Please provide more characters.",
                id,
                matches.len()
            ),
        }
    }

    // ==================== Persistence ====================

    /// Stamp the document as locally changed and persist it
    pub fn save(&mut self) -> Result<()> {
        self.document.touch();
        self.persist()
    }

    /// Replace the document with one from sync, keeping its stamp
    pub fn adopt(&mut self, document: Document) -> Result<()> {
        self.document = document;
        self.persist()
    }

    /// Whether a remote document is newer than the local one
    pub fn should_accept_remote(&self, remote: &Document) -> bool {
        merge::should_accept_remote(&self.document, remote)
    }

    fn persist(&self) -> Result<()> {
        let raw = serde_json::to_string(&self.document).context("Failed to encode tasks")?;
        self.kv
            .set(DATA_KEY, &raw)
            .context("Failed to save local tasks")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{FileStore, MemoryStore};
    use tempfile::TempDir;

    fn memory_store() -> (TaskStore, Arc<MemoryStore>) {
        let kv = Arc::new(MemoryStore::new());
        (TaskStore::open(kv.clone()).unwrap(), kv)
    }

    #[test]
    fn test_open_empty_is_unsaved() {
        let (store, _) = memory_store();
        assert!(store.tasks().is_empty());
        assert!(store.document().stamp().is_none());
        assert!(store.recovered_from().is_none());
    }

    #[test]
    fn test_add_task_persists_and_stamps() {
        let (mut store, kv) = memory_store();
        store.add_task(Task::with_id("t1", "Write", Horizon::Days)).unwrap();

        assert!(store.document().stamp().is_some());
        let reopened = TaskStore::open(kv).unwrap();
        assert_eq!(reopened.tasks().len(), 1);
        assert_eq!(reopened.document(), store.document());
    }

    #[test]
    fn test_duplicate_id_rejected() {
        let (mut store, _) = memory_store();
        store.add_task(Task::with_id("t1", "A", Horizon::Days)).unwrap();
        assert!(store.add_task(Task::with_id("t1", "B", Horizon::Days)).is_err());
    }

    #[test]
    fn test_complete_reopen_by_prefix() {
        let (mut store, _) = memory_store();
        store
            .add_task(Task::with_id("abc123", "Plan", Horizon::Weeks))
            .unwrap();

        let done = store.complete_task("abc").unwrap();
        assert!(done.completed);
        assert!(done.completed_at.is_some());

        let open = store.reopen_task("abc123").unwrap();
        assert!(!open.completed);
        assert!(open.completed_at.is_none());
    }

    #[test]
    fn test_ambiguous_and_missing_prefix() {
        let (mut store, _) = memory_store();
        store.add_task(Task::with_id("ab1", "One", Horizon::Days)).unwrap();
        store.add_task(Task::with_id("ab2", "Two", Horizon::Days)).unwrap();

        let err = store.find_task("ab").unwrap_err();
        assert!(err.to_string().contains("Ambiguous"));
        assert!(store.find_task("zz").is_err());
        assert_eq!(store.find_task("ab2").unwrap().title, "Two");
    }

    #[test]
    fn test_update_and_delete() {
        let (mut store, _) = memory_store();
        store.add_task(Task::with_id("t1", "Old", Horizon::Days)).unwrap();

        let mut task = store.find_task("t1").unwrap().clone();
        task.title = "New".to_string();
        store.update_task(task).unwrap();
        assert_eq!(store.find_task("t1").unwrap().title, "New");

        assert!(store
            .update_task(Task::with_id("nope", "x", Horizon::Days))
            .is_err());

        let removed = store.delete_task("t1").unwrap();
        assert_eq!(removed.title, "New");
        assert!(store.tasks().is_empty());
    }

    #[test]
    fn test_tasks_in_includes_cascades() {
        let (mut store, _) = memory_store();
        let mut yearly = Task::with_id("y", "Learn", Horizon::Years);
        yearly.cascades_to = vec![Horizon::Months];
        store.add_task(yearly).unwrap();
        store.add_task(Task::with_id("d", "Today", Horizon::Days)).unwrap();

        let months: Vec<_> = store.tasks_in(Horizon::Months).iter().map(|t| t.id.clone()).collect();
        assert_eq!(months, vec!["y"]);
        assert_eq!(store.tasks_in(Horizon::Days).len(), 1);
        assert!(store.tasks_in(Horizon::Life).is_empty());
    }

    #[test]
    fn test_adopt_keeps_remote_stamp() {
        let (mut store, kv) = memory_store();
        let mut remote = Document::unsaved();
        remote.last_saved = Some("2024-03-03T03:03:03.000Z".to_string());
        remote.tasks.push(Task::with_id("r", "Remote", Horizon::Life));

        store.adopt(remote.clone()).unwrap();
        assert_eq!(store.document(), &remote);
        assert_eq!(TaskStore::open(kv).unwrap().document(), &remote);
    }

    #[test]
    fn test_should_accept_remote() {
        let (mut store, _) = memory_store();
        let mut remote = Document::unsaved();
        remote.last_saved = Some("2020-01-01T00:00:00.000Z".to_string());

        // never saved locally: anything stamped is accepted
        assert!(store.should_accept_remote(&remote));

        store.save().unwrap();
        assert!(!store.should_accept_remote(&remote));
    }

    #[test]
    fn test_corrupt_document_is_backed_up() {
        let dir = TempDir::new().unwrap();
        let kv = Arc::new(FileStore::open(dir.path()).unwrap());
        kv.set(DATA_KEY, "{{{ not json").unwrap();

        let store = TaskStore::open(kv).unwrap();
        assert!(store.tasks().is_empty());
        let Some(StorageError::CorruptValue { backup_path, .. }) = store.recovered_from() else {
            panic!("expected a corrupt value report");
        };
        assert_eq!(
            std::fs::read_to_string(backup_path).unwrap(),
            "{{{ not json"
        );
    }

    #[test]
    fn test_foreign_tasks_are_not_treated_as_corrupt() {
        let dir = TempDir::new().unwrap();
        let kv = Arc::new(FileStore::open(dir.path()).unwrap());
        let raw = r#"{"lastSaved":"2030-06-01T09:00:00.000Z","tasks":[
            {"id":"a","title":"Mine","priority":"high"},
            {"id":"b","title":null,"priority":"urgent","horizon":"decades"}]}"#;
        kv.set(DATA_KEY, raw).unwrap();

        let store = TaskStore::open(kv).unwrap();
        assert!(store.recovered_from().is_none());
        assert_eq!(store.tasks().len(), 2);
        assert_eq!(store.document().stamp(), Some("2030-06-01T09:00:00.000Z"));
        assert_eq!(store.tasks()[1].priority.as_str(), "urgent");
    }
}
