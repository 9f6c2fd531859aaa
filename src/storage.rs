use crate::model::Task;
use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

pub const DEFAULT_STORAGE_KEY: &str = "taskflow_pro_todos_v1";

#[derive(thiserror::Error, Debug)]
pub enum StorageError {
    #[error("creating {path:?}: {source}")]
    CreateDir { path: PathBuf, source: io::Error },
    #[error("writing {path:?}: {source}")]
    Write { path: PathBuf, source: io::Error },
    #[error("serializing tasks: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Synchronous string key-value storage.
pub trait KeyValueStore {
    /// `None` when the key is absent or cannot be read.
    fn get(&self, key: &str) -> Option<String>;
    fn set(&mut self, key: &str, raw: &str) -> Result<(), StorageError>;
}

/// Keeps each key in `<dir>/<key>.json`.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        FileStore { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", key))
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Option<String> {
        let path = self.path_for(key);
        match fs::read_to_string(&path) {
            Ok(data) => Some(data),
            Err(err) if err.kind() == io::ErrorKind::NotFound => None,
            Err(err) => {
                warn!(?path, %err, "could not read stored tasks");
                None
            }
        }
    }

    fn set(&mut self, key: &str, raw: &str) -> Result<(), StorageError> {
        fs::create_dir_all(&self.dir).map_err(|source| StorageError::CreateDir {
            path: self.dir.clone(),
            source,
        })?;
        let path = self.path_for(key);
        fs::write(&path, raw).map_err(|source| StorageError::Write { path, source })
    }
}

#[cfg(test)]
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: std::collections::HashMap<String, String>,
}

#[cfg(test)]
impl MemoryStore {
    pub fn with_entry(key: &str, raw: &str) -> Self {
        let mut entries = std::collections::HashMap::new();
        entries.insert(key.to_string(), raw.to_string());
        MemoryStore { entries }
    }
}

#[cfg(test)]
impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.get(key).cloned()
    }

    fn set(&mut self, key: &str, raw: &str) -> Result<(), StorageError> {
        self.entries.insert(key.to_string(), raw.to_string());
        Ok(())
    }
}

/// Serves reads from an inner store and refuses every write.
#[cfg(test)]
#[derive(Debug, Clone, Default)]
pub struct ReadOnlyStore {
    pub inner: MemoryStore,
}

#[cfg(test)]
impl KeyValueStore for ReadOnlyStore {
    fn get(&self, key: &str) -> Option<String> {
        self.inner.get(key)
    }

    fn set(&mut self, key: &str, _raw: &str) -> Result<(), StorageError> {
        Err(StorageError::Write {
            path: PathBuf::from(key),
            source: io::Error::new(io::ErrorKind::PermissionDenied, "read-only"),
        })
    }
}

/// Owner of the task collection. Every change swaps in a new `Arc`, so two
/// snapshots are the same collection exactly when `Arc::ptr_eq` holds.
pub struct TaskStore<S> {
    backend: S,
    key: String,
    tasks: Arc<[Task]>,
}

impl<S: KeyValueStore> TaskStore<S> {
    /// Reads the stored collection, falling back to an empty one.
    pub fn load(backend: S, key: impl Into<String>) -> Self {
        let key = key.into();
        let tasks = match backend.get(&key) {
            Some(raw) => parse_tasks(&raw),
            None => {
                debug!(%key, "no stored tasks");
                Vec::new()
            }
        };
        TaskStore {
            backend,
            key,
            tasks: tasks.into(),
        }
    }

    pub fn tasks(&self) -> Arc<[Task]> {
        Arc::clone(&self.tasks)
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn backend(&self) -> &S {
        &self.backend
    }

    /// Writes `tasks` to the backend without touching the held collection.
    pub fn save(&mut self, tasks: &[Task]) -> Result<(), StorageError> {
        let raw = serde_json::to_string(tasks)?;
        self.backend.set(&self.key, &raw)?;
        debug!(count = tasks.len(), key = %self.key, "saved tasks");
        Ok(())
    }

    /// Persists `tasks`, then installs them. A failed write keeps the
    /// previous collection.
    pub fn replace(&mut self, tasks: Vec<Task>) -> Result<(), StorageError> {
        self.save(&tasks)?;
        self.tasks = tasks.into();
        Ok(())
    }
}

fn parse_tasks(raw: &str) -> Vec<Task> {
    let records: Vec<serde_json::Value> = match serde_json::from_str(raw) {
        Ok(records) => records,
        Err(err) => {
            warn!(%err, "stored tasks are not a list; starting empty");
            return Vec::new();
        }
    };
    let mut seen = HashSet::new();
    let mut tasks = Vec::with_capacity(records.len());
    for (idx, record) in records.into_iter().enumerate() {
        let task: Task = match serde_json::from_value(record) {
            Ok(task) => task,
            Err(err) => {
                warn!(idx, %err, "skipping malformed task record");
                continue;
            }
        };
        if task.title.trim().is_empty() {
            warn!(idx, id = %task.id, "skipping task with empty title");
            continue;
        }
        if !seen.insert(task.id.clone()) {
            warn!(idx, id = %task.id, "skipping task with duplicate id");
            continue;
        }
        tasks.push(task);
    }
    tasks
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{TaskInput, Urgency};
    use chrono::{NaiveDate, TimeZone, Utc};

    fn task(id: &str, completed: bool) -> Task {
        let mut t = Task::new(
            id.into(),
            TaskInput {
                title: format!("title {}", id),
                description: "details".into(),
                due_date: NaiveDate::from_ymd_opt(2024, 4, 2).unwrap(),
                urgency: Urgency::High,
                tags: vec!["Work".into(), "Ideas".into()],
            },
            Utc.timestamp_millis_opt(1_712_000_000_123).unwrap(),
        );
        t.completed = completed;
        t
    }

    #[test]
    fn absent_record_loads_empty() {
        let store = TaskStore::load(MemoryStore::default(), DEFAULT_STORAGE_KEY);
        assert!(store.tasks().is_empty());
    }

    #[test]
    fn garbage_loads_empty() {
        for raw in ["not json", "{\"id\":1}", "42", ""] {
            let store = TaskStore::load(MemoryStore::with_entry("k", raw), "k");
            assert!(store.tasks().is_empty(), "{}", raw);
        }
    }

    #[test]
    fn malformed_records_are_skipped() {
        let good = serde_json::to_value(task("a", false)).unwrap();
        let mut blank = serde_json::to_value(task("b", false)).unwrap();
        blank["title"] = "  ".into();
        let dup = serde_json::to_value(task("a", true)).unwrap();
        let raw = serde_json::json!([good, {"id": "x", "title": 3}, blank, dup, "oops"]).to_string();
        let store = TaskStore::load(MemoryStore::with_entry("k", &raw), "k");
        let tasks = store.tasks();
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].id, "a");
        assert!(!tasks[0].completed);
    }

    #[test]
    fn saved_collection_loads_back_equal() {
        let saved = vec![task("a", false), task("b", true), task("c", false)];
        let mut store = TaskStore::load(MemoryStore::default(), "k");
        store.replace(saved.clone()).unwrap();

        let reloaded = TaskStore::load(store.backend().clone(), "k");
        assert_eq!(&*reloaded.tasks(), saved.as_slice());
    }

    #[test]
    fn replace_hands_out_a_new_collection() {
        let mut store = TaskStore::load(MemoryStore::default(), "k");
        let before = store.tasks();
        store.replace(before.to_vec()).unwrap();
        let after = store.tasks();
        assert_eq!(before, after);
        assert!(!Arc::ptr_eq(&before, &after));
        assert!(Arc::ptr_eq(&after, &store.tasks()));
    }

    #[test]
    fn failed_write_keeps_previous_collection() {
        let seeded = serde_json::to_string(&[task("a", false)]).unwrap();
        let backend = ReadOnlyStore {
            inner: MemoryStore::with_entry("k", &seeded),
        };
        let mut store = TaskStore::load(backend, "k");
        let before = store.tasks();

        let err = store.replace(vec![task("a", true), task("b", false)]).unwrap_err();
        assert!(matches!(err, StorageError::Write { .. }));
        assert!(Arc::ptr_eq(&before, &store.tasks()));
        assert!(!store.tasks()[0].completed);
        assert_eq!(store.backend().get("k"), Some(seeded));
    }

    #[test]
    fn file_store_round_trips_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let backend = FileStore::new(dir.path().join("nested"));
        assert_eq!(backend.get("k"), None);

        let mut store = TaskStore::load(backend, "k");
        store.replace(vec![task("a", true)]).unwrap();
        assert!(dir.path().join("nested/k.json").exists());

        let reloaded = TaskStore::load(FileStore::new(dir.path().join("nested")), "k");
        assert_eq!(reloaded.tasks().len(), 1);
        assert!(reloaded.tasks()[0].completed);
    }

    #[test]
    fn persisted_layout_uses_camel_case_fields() {
        let mut store = TaskStore::load(MemoryStore::default(), "k");
        store.replace(vec![task("a", false)]).unwrap();
        let raw = store.backend().get("k").unwrap();
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(value[0]["dueDate"], "2024-04-02");
        assert_eq!(value[0]["createdAt"], 1_712_000_000_123_i64);
        assert_eq!(value[0]["tags"], serde_json::json!(["Work", "Ideas"]));
    }
}
