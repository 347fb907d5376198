//! Task persistence.
//!
//! [`TaskStore`] is the seam between the service and the backing store.
//! Lookups return tasks in ascending id order, which the reassignment flow
//! relies on to pick its primary task.

use std::collections::BTreeMap;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::lock::{FileLock, DEFAULT_LOCK_TIMEOUT_MS};
use crate::storage::Storage;
use crate::task::{Priority, ReferenceId, ReferenceType, Task, TaskId, UserId};

const TASKS_SCHEMA_VERSION: &str = "wfm.tasks.v1";
const FIRST_TASK_ID: TaskId = 1;

pub trait TaskStore {
    fn find(&self, id: TaskId) -> Result<Option<Task>>;

    fn find_by_reference(
        &self,
        reference_id: ReferenceId,
        reference_type: &ReferenceType,
    ) -> Result<Vec<Task>>;

    fn find_by_assignees(&self, assignee_ids: &[UserId]) -> Result<Vec<Task>>;

    fn find_by_priority(&self, priority: Priority) -> Result<Vec<Task>>;

    /// Insert or replace a task. Tasks without an id get the next free one.
    fn save(&mut self, task: Task) -> Result<Task>;

    /// Like [`TaskStore::find`], but a missing task is an error.
    fn get(&self, id: TaskId) -> Result<Task> {
        self.find(id)?.ok_or(Error::TaskNotFound(id))
    }
}

/// Ordered task map shared by both store implementations.
#[derive(Debug, Clone)]
struct TaskTable {
    tasks: BTreeMap<TaskId, Task>,
    next_id: TaskId,
}

impl Default for TaskTable {
    fn default() -> Self {
        Self {
            tasks: BTreeMap::new(),
            next_id: FIRST_TASK_ID,
        }
    }
}

fn id_after(id: TaskId) -> Result<TaskId> {
    id.checked_add(1)
        .ok_or_else(|| Error::OperationFailed("task id space exhausted".to_string()))
}

impl TaskTable {
    fn upsert(&mut self, mut task: Task) -> Result<Task> {
        let id = match task.id {
            Some(id) => id,
            None => self.next_id,
        };
        self.next_id = self.next_id.max(id_after(id)?);
        task.id = Some(id);
        self.tasks.insert(id, task.clone());
        Ok(task)
    }

    fn select(&self, predicate: impl Fn(&Task) -> bool) -> Vec<Task> {
        self.tasks
            .values()
            .filter(|task| predicate(task))
            .cloned()
            .collect()
    }
}

/// In-process store, lost when dropped.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    table: TaskTable,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.table.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.tasks.is_empty()
    }

    pub fn all(&self) -> Vec<Task> {
        self.table.select(|_| true)
    }
}

impl TaskStore for MemoryStore {
    fn find(&self, id: TaskId) -> Result<Option<Task>> {
        Ok(self.table.tasks.get(&id).cloned())
    }

    fn find_by_reference(
        &self,
        reference_id: ReferenceId,
        reference_type: &ReferenceType,
    ) -> Result<Vec<Task>> {
        Ok(self
            .table
            .select(|task| task.belongs_to(reference_id, reference_type)))
    }

    fn find_by_assignees(&self, assignee_ids: &[UserId]) -> Result<Vec<Task>> {
        Ok(self
            .table
            .select(|task| assignee_ids.contains(&task.assignee_id)))
    }

    fn find_by_priority(&self, priority: Priority) -> Result<Vec<Task>> {
        Ok(self.table.select(|task| task.priority == priority))
    }

    fn save(&mut self, task: Task) -> Result<Task> {
        self.table.upsert(task)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskSnapshot {
    pub schema_version: String,
    pub generated_at: DateTime<Utc>,
    pub next_id: TaskId,
    pub tasks: Vec<Task>,
}

impl TaskSnapshot {
    pub fn empty() -> Self {
        Self {
            schema_version: TASKS_SCHEMA_VERSION.to_string(),
            generated_at: Utc::now(),
            next_id: FIRST_TASK_ID,
            tasks: Vec::new(),
        }
    }

    fn into_table(self) -> Result<TaskTable> {
        let mut table = TaskTable {
            tasks: BTreeMap::new(),
            next_id: self.next_id.max(FIRST_TASK_ID),
        };
        for task in self.tasks {
            let id = task.id.ok_or_else(|| {
                Error::OperationFailed("task snapshot contains a task without an id".to_string())
            })?;
            table.next_id = table.next_id.max(id_after(id)?);
            table.tasks.insert(id, task);
        }
        Ok(table)
    }

    fn from_table(table: &TaskTable) -> Self {
        Self {
            schema_version: TASKS_SCHEMA_VERSION.to_string(),
            generated_at: Utc::now(),
            next_id: table.next_id,
            tasks: table.tasks.values().cloned().collect(),
        }
    }
}

/// Store backed by a JSON snapshot under `.wfm/tasks.json`.
///
/// Reads load the snapshot as-is; writes take the snapshot lock, reload,
/// apply the change and atomically replace the file.
#[derive(Debug, Clone)]
pub struct FileStore {
    storage: Storage,
}

impl FileStore {
    pub fn new(storage: Storage) -> Self {
        Self { storage }
    }

    pub fn storage(&self) -> &Storage {
        &self.storage
    }

    pub fn snapshot(&self) -> Result<TaskSnapshot> {
        self.load_snapshot(&self.storage.tasks_file())
    }

    fn load_snapshot(&self, path: &Path) -> Result<TaskSnapshot> {
        if !path.exists() {
            return Ok(TaskSnapshot::empty());
        }
        let snapshot: TaskSnapshot = self.storage.read_json(path)?;
        if snapshot.schema_version != TASKS_SCHEMA_VERSION {
            return Err(Error::OperationFailed(format!(
                "unsupported task snapshot schema '{}' in {}",
                snapshot.schema_version,
                path.display()
            )));
        }
        Ok(snapshot)
    }

    fn load_table(&self) -> Result<TaskTable> {
        self.snapshot()?.into_table()
    }
}

impl TaskStore for FileStore {
    fn find(&self, id: TaskId) -> Result<Option<Task>> {
        Ok(self.load_table()?.tasks.remove(&id))
    }

    fn find_by_reference(
        &self,
        reference_id: ReferenceId,
        reference_type: &ReferenceType,
    ) -> Result<Vec<Task>> {
        Ok(self
            .load_table()?
            .select(|task| task.belongs_to(reference_id, reference_type)))
    }

    fn find_by_assignees(&self, assignee_ids: &[UserId]) -> Result<Vec<Task>> {
        Ok(self
            .load_table()?
            .select(|task| assignee_ids.contains(&task.assignee_id)))
    }

    fn find_by_priority(&self, priority: Priority) -> Result<Vec<Task>> {
        Ok(self
            .load_table()?
            .select(|task| task.priority == priority))
    }

    fn save(&mut self, task: Task) -> Result<Task> {
        let path = self.storage.tasks_file();
        let _lock = FileLock::acquire(self.storage.tasks_lock_file(), DEFAULT_LOCK_TIMEOUT_MS)?;
        let mut table = self.load_snapshot(&path)?.into_table()?;
        let saved = table.upsert(task)?;
        self.storage
            .write_json(&path, &TaskSnapshot::from_table(&table))?;
        tracing::debug!(task_id = ?saved.id, path = %path.display(), "task saved");
        Ok(saved)
    }
}
