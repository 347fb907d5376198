//! Reference type to applicable task type lookup.
//!
//! The table is built from the `[references]` section of `.wfm.toml` and
//! handed to the service; there is no global registry.

use std::collections::BTreeMap;

use crate::error::{Error, Result};
use crate::task::{ReferenceType, TaskType};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReferenceTable {
    entries: BTreeMap<ReferenceType, Vec<TaskType>>,
}

impl ReferenceTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the task types expected for a reference type, replacing any
    /// previous entry. Duplicate task types are dropped, first one wins.
    pub fn insert(&mut self, reference_type: ReferenceType, task_types: Vec<TaskType>) {
        let mut unique: Vec<TaskType> = Vec::with_capacity(task_types.len());
        for task_type in task_types {
            if !unique.contains(&task_type) {
                unique.push(task_type);
            }
        }
        self.entries.insert(reference_type, unique);
    }

    pub fn with(mut self, reference_type: &str, task_types: &[&str]) -> Self {
        self.insert(
            ReferenceType::new(reference_type),
            task_types.iter().map(TaskType::new).collect(),
        );
        self
    }

    /// Task types expected for `reference_type`; empty when it is unknown.
    pub fn applicable_task_types(&self, reference_type: &ReferenceType) -> &[TaskType] {
        self.entries
            .get(reference_type)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ReferenceType, &[TaskType])> {
        self.entries
            .iter()
            .map(|(reference, tasks)| (reference, tasks.as_slice()))
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn resolve_reference_type(&self, raw: &str) -> Result<ReferenceType> {
        let reference_type: ReferenceType = raw.parse()?;
        if self.entries.contains_key(&reference_type) {
            Ok(reference_type)
        } else {
            Err(Error::UnknownReferenceType(reference_type.to_string()))
        }
    }

    /// Accepts any task type the table knows about, under any reference.
    pub fn resolve_task_type(&self, raw: &str) -> Result<TaskType> {
        let task_type: TaskType = raw.parse()?;
        let known = self
            .entries
            .values()
            .any(|task_types| task_types.contains(&task_type));
        if known {
            Ok(task_type)
        } else {
            Err(Error::UnknownTaskType(task_type.to_string()))
        }
    }
}
