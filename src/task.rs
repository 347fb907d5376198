//! Task records and their activity log.
//!
//! A task is attached to a reference entity (an order, a shipment, ...) and
//! carries an append-only list of activities describing every mutation.
//! Timestamps serialize as epoch milliseconds.

use std::fmt;
use std::str::FromStr;

use chrono::serde::ts_milliseconds;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

pub type TaskId = u64;
pub type UserId = u64;
pub type ReferenceId = u64;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStatus {
    Assigned,
    Started,
    Completed,
    Cancelled,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Assigned => "ASSIGNED",
            TaskStatus::Started => "STARTED",
            TaskStatus::Completed => "COMPLETED",
            TaskStatus::Cancelled => "CANCELLED",
        }
    }

    /// Still waiting on the assignee: assigned or started.
    pub fn is_pending(&self) -> bool {
        matches!(self, TaskStatus::Assigned | TaskStatus::Started)
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match normalize_name(s).as_str() {
            "ASSIGNED" => Ok(TaskStatus::Assigned),
            "STARTED" => Ok(TaskStatus::Started),
            "COMPLETED" => Ok(TaskStatus::Completed),
            "CANCELLED" | "CANCELED" => Ok(TaskStatus::Cancelled),
            _ => Err(Error::InvalidArgument(format!(
                "unknown task status '{}' (expected ASSIGNED|STARTED|COMPLETED|CANCELLED)",
                s.trim()
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Priority {
    Low,
    Medium,
    High,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Low => "LOW",
            Priority::Medium => "MEDIUM",
            Priority::High => "HIGH",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Priority {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match normalize_name(s).as_str() {
            "LOW" => Ok(Priority::Low),
            "MEDIUM" => Ok(Priority::Medium),
            "HIGH" => Ok(Priority::High),
            _ => Err(Error::InvalidArgument(format!(
                "unknown task priority '{}' (expected LOW|MEDIUM|HIGH)",
                s.trim()
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActivityKind {
    Created,
    StatusChanged,
    DescriptionChanged,
    Reassigned,
    Cancelled,
    Comment,
    PriorityChanged,
}

impl ActivityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActivityKind::Created => "CREATED",
            ActivityKind::StatusChanged => "STATUS_CHANGED",
            ActivityKind::DescriptionChanged => "DESCRIPTION_CHANGED",
            ActivityKind::Reassigned => "REASSIGNED",
            ActivityKind::Cancelled => "CANCELLED",
            ActivityKind::Comment => "COMMENT",
            ActivityKind::PriorityChanged => "PRIORITY_CHANGED",
        }
    }
}

impl fmt::Display for ActivityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Upper-case, underscore-separated form used for every enumerated name.
fn normalize_name(raw: &str) -> String {
    raw.trim().replace('-', "_").to_ascii_uppercase()
}

macro_rules! named_kind {
    ($(#[$meta:meta])* $name:ident, $label:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn new(raw: impl AsRef<str>) -> Self {
                Self(normalize_name(raw.as_ref()))
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl FromStr for $name {
            type Err = Error;

            fn from_str(s: &str) -> Result<Self> {
                if s.trim().is_empty() {
                    return Err(Error::InvalidArgument(format!(
                        "{} cannot be empty",
                        $label
                    )));
                }
                Ok(Self::new(s))
            }
        }
    };
}

named_kind!(
    /// Kind of external entity a task hangs off (ORDER, SHIPMENT, ...).
    ReferenceType,
    "reference type"
);

named_kind!(
    /// Kind of work a task represents (CREATE_INVOICE, ...).
    TaskType,
    "task type"
);

/// One entry in a task's activity log.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Activity {
    pub event_type: ActivityKind,
    pub comment: String,
    #[serde(with = "ts_milliseconds")]
    pub timestamp: DateTime<Utc>,
    pub user_id: UserId,
}

impl Activity {
    pub fn new(
        event_type: ActivityKind,
        comment: impl Into<String>,
        user_id: UserId,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            event_type,
            comment: comment.into(),
            timestamp,
            user_id,
        }
    }
}

/// Fields supplied by the caller when creating a task.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NewTask {
    pub reference_id: ReferenceId,
    pub reference_type: ReferenceType,
    pub task_type: TaskType,
    pub assignee_id: UserId,
    pub priority: Priority,
    #[serde(with = "ts_milliseconds")]
    pub deadline_time: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Task {
    /// Assigned by the store on first save.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<TaskId>,
    pub reference_id: ReferenceId,
    pub reference_type: ReferenceType,
    pub task_type: TaskType,
    pub assignee_id: UserId,
    pub status: TaskStatus,
    pub priority: Priority,
    pub description: String,
    #[serde(with = "ts_milliseconds")]
    pub deadline_time: DateTime<Utc>,
    #[serde(with = "ts_milliseconds")]
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub activities: Vec<Activity>,
}

impl Task {
    /// Build a freshly assigned task whose log starts with a CREATED entry
    /// attributed to the assignee.
    pub fn assigned(new: NewTask, description: impl Into<String>, now: DateTime<Utc>) -> Self {
        let created = Activity::new(
            ActivityKind::Created,
            format!("Task created by user {}", new.assignee_id),
            new.assignee_id,
            now,
        );
        Self {
            id: None,
            reference_id: new.reference_id,
            reference_type: new.reference_type,
            task_type: new.task_type,
            assignee_id: new.assignee_id,
            status: TaskStatus::Assigned,
            priority: new.priority,
            description: description.into(),
            deadline_time: new.deadline_time,
            created_at: now,
            activities: vec![created],
        }
    }

    pub fn record(&mut self, activity: Activity) {
        self.activities.push(activity);
    }

    /// Stable sort, entries with equal timestamps keep insertion order.
    pub fn sort_activities(&mut self) {
        self.activities.sort_by_key(|activity| activity.timestamp);
    }

    /// Anything not completed counts as active, cancelled included.
    pub fn is_active(&self) -> bool {
        self.status != TaskStatus::Completed
    }

    pub fn belongs_to(&self, reference_id: ReferenceId, reference_type: &ReferenceType) -> bool {
        self.reference_id == reference_id && &self.reference_type == reference_type
    }
}
