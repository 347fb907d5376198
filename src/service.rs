//! Task service: every business rule lives here.
//!
//! The service reads from a [`TaskStore`], applies the change, appends the
//! matching activity, and writes the task back. Batch operations run in
//! request order and stop at the first error; items already handled stay
//! persisted.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::clock::{Clock, DayZone, SystemClock, Window};
use crate::config::TaskPolicy;
use crate::error::Result;
use crate::reference::ReferenceTable;
use crate::store::TaskStore;
use crate::task::{
    Activity, ActivityKind, NewTask, Priority, ReferenceId, ReferenceType, Task, TaskId,
    TaskStatus, UserId,
};

/// Change request for a single task; absent fields are left untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct TaskUpdate {
    pub task_id: TaskId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<TaskStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AssignByReference {
    pub reference_id: ReferenceId,
    pub reference_type: ReferenceType,
    pub assignee_id: UserId,
}

/// What the reassignment flow did, per task id.
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct AssignmentReport {
    pub reference_id: ReferenceId,
    pub reference_type: Option<ReferenceType>,
    pub created: Vec<TaskId>,
    pub reassigned: Vec<TaskId>,
    pub cancelled: Vec<TaskId>,
}

impl AssignmentReport {
    pub fn message(&self) -> String {
        format!(
            "Tasks assigned successfully for reference {}",
            self.reference_id
        )
    }
}

/// Tasks of the given assignees whose deadline lies in `[start, end]`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DateRangeQuery {
    pub assignee_ids: Vec<UserId>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub start: DateTime<Utc>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub end: DateTime<Utc>,
}

/// Tasks the given assignees should see on a particular day.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct DailyQuery {
    pub assignee_ids: Vec<UserId>,
    /// Any instant within the target day; defaults to now.
    #[serde(default, with = "chrono::serde::ts_milliseconds_option")]
    pub date: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PriorityUpdate {
    pub task_id: TaskId,
    pub priority: Priority,
    pub user_id: UserId,
}

pub struct TaskService<S, C = SystemClock> {
    store: S,
    references: ReferenceTable,
    policy: TaskPolicy,
    zone: DayZone,
    clock: C,
}

impl<S: TaskStore> TaskService<S> {
    pub fn new(store: S, references: ReferenceTable) -> Self {
        Self {
            store,
            references,
            policy: TaskPolicy::default(),
            zone: DayZone::default(),
            clock: SystemClock,
        }
    }
}

impl<S: TaskStore, C: Clock> TaskService<S, C> {
    pub fn with_clock<C2: Clock>(self, clock: C2) -> TaskService<S, C2> {
        TaskService {
            store: self.store,
            references: self.references,
            policy: self.policy,
            zone: self.zone,
            clock,
        }
    }

    pub fn with_policy(mut self, policy: TaskPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_zone(mut self, zone: DayZone) -> Self {
        self.zone = zone;
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn references(&self) -> &ReferenceTable {
        &self.references
    }

    pub fn find_task(&self, id: TaskId) -> Result<Task> {
        tracing::debug!(task_id = id, "find task");
        self.store.get(id)
    }

    pub fn create_tasks(&mut self, requests: Vec<NewTask>) -> Result<Vec<Task>> {
        let mut created = Vec::with_capacity(requests.len());
        for request in requests {
            let task = Task::assigned(
                request,
                self.policy.default_description.clone(),
                self.clock.now(),
            );
            let task = self.store.save(task)?;
            tracing::info!(
                task_id = ?task.id,
                reference_id = task.reference_id,
                task_type = %task.task_type,
                "task created"
            );
            created.push(task);
        }
        Ok(created)
    }

    pub fn update_tasks(&mut self, requests: Vec<TaskUpdate>) -> Result<Vec<Task>> {
        let mut updated = Vec::with_capacity(requests.len());
        for request in requests {
            let mut task = self.store.get(request.task_id)?;
            let actor = task.assignee_id;

            if let Some(status) = request.status {
                task.record(Activity::new(
                    ActivityKind::StatusChanged,
                    format!("Status changed to {status} by user {actor}"),
                    actor,
                    self.clock.now(),
                ));
                task.status = status;
            }
            if let Some(description) = request.description {
                task.record(Activity::new(
                    ActivityKind::DescriptionChanged,
                    format!("Description updated by user {actor}"),
                    actor,
                    self.clock.now(),
                ));
                task.description = description;
            }

            let task = self.store.save(task)?;
            tracing::info!(task_id = request.task_id, status = %task.status, "task updated");
            updated.push(task);
        }
        Ok(updated)
    }

    /// Leave exactly one live task per applicable task type of a reference,
    /// owned by the new assignee.
    ///
    /// For each type the first non-completed task (store order) is reassigned
    /// and the other non-completed ones are cancelled; a type with none gets
    /// a fresh task. Each task is saved on its own, so a failure part way
    /// leaves earlier changes in place.
    pub fn assign_by_reference(&mut self, request: &AssignByReference) -> Result<AssignmentReport> {
        let assignee = request.assignee_id;
        let task_types = self
            .references
            .applicable_task_types(&request.reference_type)
            .to_vec();
        let existing = self
            .store
            .find_by_reference(request.reference_id, &request.reference_type)?;

        let mut report = AssignmentReport {
            reference_id: request.reference_id,
            reference_type: Some(request.reference_type.clone()),
            ..AssignmentReport::default()
        };

        for task_type in task_types {
            let mut active = existing
                .iter()
                .filter(|task| task.task_type == task_type && task.is_active())
                .cloned();

            let Some(mut primary) = active.next() else {
                let now = self.clock.now();
                let description = format!("New task created for {task_type}");
                let task = Task::assigned(
                    NewTask {
                        reference_id: request.reference_id,
                        reference_type: request.reference_type.clone(),
                        task_type: task_type.clone(),
                        assignee_id: assignee,
                        priority: self.policy.assignment_priority,
                        deadline_time: now + self.policy.assignment_deadline,
                    },
                    description,
                    now,
                );
                let task = self.store.save(task)?;
                report.created.extend(task.id);
                continue;
            };

            primary.assignee_id = assignee;
            primary.status = TaskStatus::Assigned;
            primary.record(Activity::new(
                ActivityKind::Reassigned,
                format!("Task reassigned to user {assignee}"),
                assignee,
                self.clock.now(),
            ));
            let primary = self.store.save(primary)?;
            report.reassigned.extend(primary.id);

            for mut duplicate in active {
                duplicate.status = TaskStatus::Cancelled;
                duplicate.record(Activity::new(
                    ActivityKind::Cancelled,
                    format!("Task cancelled due to reassignment by user {assignee}"),
                    assignee,
                    self.clock.now(),
                ));
                let duplicate = self.store.save(duplicate)?;
                report.cancelled.extend(duplicate.id);
            }
        }

        tracing::info!(
            reference_id = request.reference_id,
            reference_type = %request.reference_type,
            assignee_id = assignee,
            created = report.created.len(),
            reassigned = report.reassigned.len(),
            cancelled = report.cancelled.len(),
            "reference assigned"
        );
        Ok(report)
    }

    /// Non-cancelled tasks whose deadline falls inside the inclusive range.
    pub fn fetch_by_date(&self, query: &DateRangeQuery) -> Result<Vec<Task>> {
        let window = Window {
            start: query.start,
            end: query.end,
        };
        let tasks = self.store.find_by_assignees(&query.assignee_ids)?;
        let matched = due_within(tasks, window);
        tracing::debug!(matched = matched.len(), "fetch by date");
        Ok(matched)
    }

    /// Tasks created on the target day, plus older tasks still pending.
    pub fn fetch_daily(&self, query: &DailyQuery) -> Result<Vec<Task>> {
        let target = query.date.unwrap_or_else(|| self.clock.now());
        let window = self.zone.day_window(target);
        let tasks = self.store.find_by_assignees(&query.assignee_ids)?;
        let matched = daily_agenda(tasks, window);
        tracing::debug!(
            start = %window.start,
            end = %window.end,
            matched = matched.len(),
            "fetch daily"
        );
        Ok(matched)
    }

    pub fn add_comment(&mut self, task_id: TaskId, comment: &str, user_id: UserId) -> Result<Task> {
        let mut task = self.store.get(task_id)?;
        task.record(Activity::new(
            ActivityKind::Comment,
            comment,
            user_id,
            self.clock.now(),
        ));
        task.sort_activities();
        let task = self.store.save(task)?;
        tracing::info!(task_id, user_id, "comment added");
        Ok(task)
    }

    pub fn update_priority(&mut self, request: &PriorityUpdate) -> Result<Task> {
        let mut task = self.store.get(request.task_id)?;
        task.priority = request.priority;
        task.record(Activity::new(
            ActivityKind::PriorityChanged,
            format!(
                "Priority changed to {} by user {}",
                request.priority, request.user_id
            ),
            request.user_id,
            self.clock.now(),
        ));
        let task = self.store.save(task)?;
        tracing::info!(task_id = request.task_id, priority = %request.priority, "priority changed");
        Ok(task)
    }

    /// Every task with exactly this priority, whatever its status.
    pub fn fetch_by_priority(&self, priority: Priority) -> Result<Vec<Task>> {
        self.store.find_by_priority(priority)
    }
}

fn due_within(tasks: Vec<Task>, window: Window) -> Vec<Task> {
    tasks
        .into_iter()
        .filter(|task| task.status != TaskStatus::Cancelled)
        .filter(|task| window.contains(task.deadline_time))
        .collect()
}

fn daily_agenda(tasks: Vec<Task>, window: Window) -> Vec<Task> {
    tasks
        .into_iter()
        .filter(|task| task.status != TaskStatus::Cancelled)
        .filter(|task| {
            window.contains(task.created_at)
                || (task.created_at < window.start && task.status.is_pending())
        })
        .collect()
}
