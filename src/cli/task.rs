//! wfm task command implementations.

use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::clock::parse_instant;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::events::{Event, EventDestination, EventKind, EventSink};
use crate::output::{emit_success, HumanOutput, OutputOptions};
use crate::reference::ReferenceTable;
use crate::service::{
    AssignByReference, AssignmentReport, DailyQuery, DateRangeQuery, PriorityUpdate, TaskService,
    TaskUpdate,
};
use crate::storage::Storage;
use crate::store::FileStore;
use crate::task::{
    NewTask, Priority, ReferenceType, Task, TaskId, TaskStatus, TaskType, UserId,
};

/// Flags shared by every command.
pub struct GlobalOptions {
    pub dir: Option<PathBuf>,
    pub events: Option<String>,
    pub json: bool,
    pub quiet: bool,
}

pub struct NewOptions {
    pub reference_id: Option<u64>,
    pub reference_type: Option<String>,
    pub task_type: Option<String>,
    pub assignee: Option<UserId>,
    pub priority: String,
    pub deadline: Option<String>,
    pub batch: Option<PathBuf>,
}

pub struct UpdateOptions {
    pub id: Option<TaskId>,
    pub status: Option<String>,
    pub description: Option<String>,
    pub batch: Option<PathBuf>,
}

pub struct AssignOptions {
    pub reference_id: u64,
    pub reference_type: String,
    pub assignee: UserId,
}

pub struct CommentOptions {
    pub id: TaskId,
    pub text: String,
    pub user: UserId,
}

pub struct PriorityOptions {
    pub id: TaskId,
    pub priority: String,
    pub user: UserId,
}

pub struct ByDateOptions {
    pub assignees: Vec<UserId>,
    pub start: String,
    pub end: String,
}

pub struct DailyOptions {
    pub assignees: Vec<UserId>,
    pub date: Option<String>,
}

#[derive(Serialize)]
struct TaskListOutput {
    total: usize,
    tasks: Vec<Task>,
}

#[derive(Serialize)]
struct AssignOutput<'a> {
    message: String,
    #[serde(flatten)]
    report: &'a AssignmentReport,
}

#[derive(Serialize)]
struct ReferenceEntry {
    reference_type: String,
    task_types: Vec<String>,
}

#[derive(Serialize)]
struct ReferencesOutput {
    references: Vec<ReferenceEntry>,
}

struct TaskContext {
    service: TaskService<FileStore>,
}

impl TaskContext {
    fn references(&self) -> &ReferenceTable {
        self.service.references()
    }
}

/// Event sink plus whether it writes to stdout, which then owns stdout.
struct EventOutput {
    sink: Option<EventSink>,
    to_stdout: bool,
}

impl EventOutput {
    fn open(raw: Option<&str>) -> Result<Self> {
        let destination = EventDestination::parse(raw);
        let sink = destination.as_ref().map(|dest| dest.open()).transpose()?;
        Ok(Self {
            sink,
            to_stdout: matches!(destination, Some(EventDestination::Stdout)),
        })
    }

    fn is_enabled(&self) -> bool {
        self.sink.is_some()
    }

    /// Returns a warning instead of failing the command.
    fn emit(&mut self, kind: EventKind, task: &Task) -> Option<String> {
        let sink = self.sink.as_mut()?;
        let result = Event::for_task(kind, task).and_then(|event| sink.emit(&event));
        result.err().map(|err| format!("event output failed: {err}"))
    }

    fn output_options(&self, global: &GlobalOptions) -> OutputOptions {
        OutputOptions {
            json: global.json && !self.to_stdout,
            quiet: global.quiet || self.to_stdout,
        }
    }
}

pub fn run_new(options: NewOptions, global: GlobalOptions) -> Result<()> {
    let mut ctx = load_context(global.dir.as_deref())?;
    let mut events = EventOutput::open(global.events.as_deref())?;

    let requests = match options.batch.clone() {
        Some(path) => {
            let mut requests: Vec<NewTask> = read_batch(&path)?;
            for request in &mut requests {
                let (reference_type, task_type) = ensure_known_types(
                    ctx.references(),
                    request.reference_type.as_str(),
                    request.task_type.as_str(),
                )?;
                request.reference_type = reference_type;
                request.task_type = task_type;
            }
            requests
        }
        None => vec![single_new_task(ctx.references(), options)?],
    };

    let created = ctx.service.create_tasks(requests)?;

    let mut human = HumanOutput::new(if created.len() == 1 {
        "Task created".to_string()
    } else {
        format!("{} tasks created", created.len())
    });
    for task in &created {
        if let Some(warning) = events.emit(EventKind::TaskCreated, task) {
            human.push_warning(warning);
        }
        human.push_detail(task_line(task));
    }
    if let Some(id) = created.first().and_then(|task| task.id) {
        human.push_next_step(format!("wfm task show {id}"));
    }

    emit_success(
        events.output_options(&global),
        "task new",
        &TaskListOutput {
            total: created.len(),
            tasks: created,
        },
        Some(&human),
    )
}

pub fn run_update(options: UpdateOptions, global: GlobalOptions) -> Result<()> {
    let mut ctx = load_context(global.dir.as_deref())?;
    let mut events = EventOutput::open(global.events.as_deref())?;

    let requests = match (options.batch.as_deref(), options.id) {
        (Some(path), _) => read_batch(path)?,
        (None, Some(task_id)) => {
            let status = options
                .status
                .as_deref()
                .map(str::parse::<TaskStatus>)
                .transpose()?;
            if status.is_none() && options.description.is_none() {
                return Err(Error::InvalidArgument(
                    "task update requires --status or --description".to_string(),
                ));
            }
            vec![TaskUpdate {
                task_id,
                status,
                description: options.description,
            }]
        }
        (None, None) => {
            return Err(Error::InvalidArgument(
                "task update requires a task id or --batch".to_string(),
            ))
        }
    };

    let updated = ctx.service.update_tasks(requests)?;

    let mut human = HumanOutput::new(if updated.len() == 1 {
        "Task updated".to_string()
    } else {
        format!("{} tasks updated", updated.len())
    });
    for task in &updated {
        if let Some(warning) = events.emit(EventKind::TaskUpdated, task) {
            human.push_warning(warning);
        }
        human.push_detail(task_line(task));
    }

    emit_success(
        events.output_options(&global),
        "task update",
        &TaskListOutput {
            total: updated.len(),
            tasks: updated,
        },
        Some(&human),
    )
}

pub fn run_assign(options: AssignOptions, global: GlobalOptions) -> Result<()> {
    let mut ctx = load_context(global.dir.as_deref())?;
    let mut events = EventOutput::open(global.events.as_deref())?;
    let reference_type = ctx
        .references()
        .resolve_reference_type(&options.reference_type)?;

    let report = ctx.service.assign_by_reference(&AssignByReference {
        reference_id: options.reference_id,
        reference_type: reference_type.clone(),
        assignee_id: options.assignee,
    })?;

    let mut human = HumanOutput::new(report.message());
    human.push_summary("Reference", format!("{reference_type}:{}", options.reference_id));
    human.push_summary("Assignee", options.assignee.to_string());
    human.push_summary("Created", format_ids(&report.created));
    human.push_summary("Reassigned", format_ids(&report.reassigned));
    human.push_summary("Cancelled", format_ids(&report.cancelled));

    if events.is_enabled() {
        let touched = [
            (EventKind::TaskCreated, &report.created),
            (EventKind::TaskReassigned, &report.reassigned),
            (EventKind::TaskCancelled, &report.cancelled),
        ];
        for (kind, ids) in touched {
            for id in ids {
                let task = ctx.service.find_task(*id)?;
                if let Some(warning) = events.emit(kind, &task) {
                    human.push_warning(warning);
                }
            }
        }
    }

    emit_success(
        events.output_options(&global),
        "task assign",
        &AssignOutput {
            message: report.message(),
            report: &report,
        },
        Some(&human),
    )
}

pub fn run_show(id: TaskId, global: GlobalOptions) -> Result<()> {
    let ctx = load_context(global.dir.as_deref())?;
    let task = ctx.service.find_task(id)?;

    let mut human = HumanOutput::new(format!("Task {id}"));
    push_task_summary(&mut human, &task);
    for activity in &task.activities {
        human.push_detail(format!(
            "[{}] {} user {}: {}",
            activity.timestamp.to_rfc3339(),
            activity.event_type,
            activity.user_id,
            activity.comment
        ));
    }

    emit_success(
        OutputOptions {
            json: global.json,
            quiet: global.quiet,
        },
        "task show",
        &task,
        Some(&human),
    )
}

pub fn run_comment(options: CommentOptions, global: GlobalOptions) -> Result<()> {
    let mut ctx = load_context(global.dir.as_deref())?;
    let mut events = EventOutput::open(global.events.as_deref())?;
    if options.text.trim().is_empty() {
        return Err(Error::InvalidArgument("comment cannot be empty".to_string()));
    }

    let task = ctx
        .service
        .add_comment(options.id, &options.text, options.user)?;

    let mut human = HumanOutput::new("Comment added");
    if let Some(warning) = events.emit(EventKind::TaskCommented, &task) {
        human.push_warning(warning);
    }
    human.push_summary("ID", options.id.to_string());
    human.push_summary("User", options.user.to_string());
    human.push_summary("Activities", task.activities.len().to_string());

    emit_success(
        events.output_options(&global),
        "task comment",
        &task,
        Some(&human),
    )
}

pub fn run_priority(options: PriorityOptions, global: GlobalOptions) -> Result<()> {
    let mut ctx = load_context(global.dir.as_deref())?;
    let mut events = EventOutput::open(global.events.as_deref())?;
    let priority: Priority = options.priority.parse()?;

    let task = ctx.service.update_priority(&PriorityUpdate {
        task_id: options.id,
        priority,
        user_id: options.user,
    })?;

    let mut human = HumanOutput::new("Task priority updated");
    if let Some(warning) = events.emit(EventKind::TaskPriorityChanged, &task) {
        human.push_warning(warning);
    }
    human.push_summary("ID", options.id.to_string());
    human.push_summary("Priority", priority.to_string());

    emit_success(
        events.output_options(&global),
        "task priority",
        &task,
        Some(&human),
    )
}

pub fn run_by_date(options: ByDateOptions, global: GlobalOptions) -> Result<()> {
    let ctx = load_context(global.dir.as_deref())?;
    let start = parse_instant("start", &options.start)?;
    let end = parse_instant("end", &options.end)?;
    if start > end {
        return Err(Error::InvalidArgument(
            "--start must not be after --end".to_string(),
        ));
    }

    let tasks = ctx.service.fetch_by_date(&DateRangeQuery {
        assignee_ids: options.assignees,
        start,
        end,
    })?;

    let mut human = HumanOutput::new("Tasks due");
    human.push_summary("From", start.to_rfc3339());
    human.push_summary("To", end.to_rfc3339());
    emit_task_list(&global, "task by-date", tasks, human)
}

pub fn run_daily(options: DailyOptions, global: GlobalOptions) -> Result<()> {
    let ctx = load_context(global.dir.as_deref())?;
    let date = options
        .date
        .as_deref()
        .map(|raw| parse_instant("date", raw))
        .transpose()?;

    let tasks = ctx.service.fetch_daily(&DailyQuery {
        assignee_ids: options.assignees,
        date,
    })?;

    let mut human = HumanOutput::new("Daily tasks");
    if let Some(date) = date {
        human.push_summary("Day of", date.to_rfc3339());
    }
    emit_task_list(&global, "task daily", tasks, human)
}

pub fn run_by_priority(priority: String, global: GlobalOptions) -> Result<()> {
    let ctx = load_context(global.dir.as_deref())?;
    let priority: Priority = priority.parse()?;
    let tasks = ctx.service.fetch_by_priority(priority)?;

    let human = HumanOutput::new(format!("{priority} priority tasks"));
    emit_task_list(&global, "task by-priority", tasks, human)
}

pub fn run_references(global: GlobalOptions) -> Result<()> {
    let ctx = load_context(global.dir.as_deref())?;
    let table = ctx.references();

    let mut human = HumanOutput::new("Reference types");
    let mut references = Vec::new();
    for (reference_type, task_types) in table.iter() {
        let names: Vec<String> = task_types.iter().map(TaskType::to_string).collect();
        human.push_detail(format!("{reference_type}: {}", names.join(", ")));
        references.push(ReferenceEntry {
            reference_type: reference_type.to_string(),
            task_types: names,
        });
    }
    if references.is_empty() {
        human.push_warning("no reference types configured");
    }

    emit_success(
        OutputOptions {
            json: global.json,
            quiet: global.quiet,
        },
        "references",
        &ReferencesOutput { references },
        Some(&human),
    )
}

fn load_context(dir: Option<&Path>) -> Result<TaskContext> {
    let root = match dir {
        Some(path) => path.to_path_buf(),
        None => std::env::current_dir()?,
    };
    let storage = Storage::new(root);
    let config = load_config(&storage)?;

    let service = TaskService::new(FileStore::new(storage), config.reference_table()?)
        .with_policy(config.task_policy()?)
        .with_zone(config.day_zone()?);

    Ok(TaskContext { service })
}

/// Missing config means defaults; a broken one is reported, not skipped.
fn load_config(storage: &Storage) -> Result<Config> {
    let path = storage.config_file();
    if path.exists() {
        Config::load(&path)
    } else {
        tracing::debug!(path = %path.display(), "no config file, using defaults");
        Ok(Config::default())
    }
}

fn single_new_task(references: &ReferenceTable, options: NewOptions) -> Result<NewTask> {
    let missing = |flag: &str| Error::InvalidArgument(format!("task new requires --{flag}"));

    let reference_id = options.reference_id.ok_or_else(|| missing("reference-id"))?;
    let raw_reference = options
        .reference_type
        .ok_or_else(|| missing("reference-type"))?;
    let raw_task = options.task_type.ok_or_else(|| missing("task-type"))?;
    let assignee_id = options.assignee.ok_or_else(|| missing("assignee"))?;
    let raw_deadline = options.deadline.ok_or_else(|| missing("deadline"))?;

    let (reference_type, task_type) = ensure_known_types(references, &raw_reference, &raw_task)?;
    Ok(NewTask {
        reference_id,
        reference_type,
        task_type,
        assignee_id,
        priority: options.priority.parse()?,
        deadline_time: parse_instant("deadline", &raw_deadline)?,
    })
}

fn ensure_known_types(
    references: &ReferenceTable,
    reference_type: &str,
    task_type: &str,
) -> Result<(ReferenceType, TaskType)> {
    let reference_type = references.resolve_reference_type(reference_type)?;
    let task_type = references.resolve_task_type(task_type)?;
    Ok((reference_type, task_type))
}

fn read_batch<T: serde::de::DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    let content = std::fs::read_to_string(path)?;
    serde_json::from_str(&content).map_err(|err| {
        Error::InvalidArgument(format!("invalid batch file {}: {err}", path.display()))
    })
}

fn emit_task_list(
    global: &GlobalOptions,
    command: &str,
    tasks: Vec<Task>,
    mut human: HumanOutput,
) -> Result<()> {
    human.push_summary("Total", tasks.len().to_string());
    for task in &tasks {
        human.push_detail(task_line(task));
    }

    emit_success(
        OutputOptions {
            json: global.json,
            quiet: global.quiet,
        },
        command,
        &TaskListOutput {
            total: tasks.len(),
            tasks,
        },
        Some(&human),
    )
}

fn task_line(task: &Task) -> String {
    let id = task
        .id
        .map(|id| id.to_string())
        .unwrap_or_else(|| "-".to_string());
    format!(
        "[{}][{}] {} {} ({}:{}) user {} due {}",
        task.status,
        task.priority,
        id,
        task.task_type,
        task.reference_type,
        task.reference_id,
        task.assignee_id,
        task.deadline_time.to_rfc3339()
    )
}

fn push_task_summary(human: &mut HumanOutput, task: &Task) {
    human.push_summary("Type", task.task_type.to_string());
    human.push_summary(
        "Reference",
        format!("{}:{}", task.reference_type, task.reference_id),
    );
    human.push_summary("Assignee", task.assignee_id.to_string());
    human.push_summary("Status", task.status.to_string());
    human.push_summary("Priority", task.priority.to_string());
    human.push_summary("Deadline", task.deadline_time.to_rfc3339());
    human.push_summary("Created", task.created_at.to_rfc3339());
    human.push_summary("Description", task.description.clone());
}

fn format_ids(ids: &[TaskId]) -> String {
    if ids.is_empty() {
        return "none".to_string();
    }
    ids.iter()
        .map(|id| id.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}
