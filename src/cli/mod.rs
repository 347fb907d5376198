//! Command-line interface for wfm
//!
//! This module defines the CLI structure using clap derive macros.
//! Command implementations live in the submodules.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::error::Result;

mod init;
mod task;

/// wfm - workforce task assignment
///
/// Track operational tasks attached to orders, shipments and other
/// reference entities, and hand them between assignees.
#[derive(Parser, Debug)]
#[command(name = "wfm")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Directory holding `.wfm/` and `.wfm.toml` (defaults to current directory)
    #[arg(long, global = true, env = "WFM_DIR")]
    pub dir: Option<PathBuf>,

    /// Output in JSON format
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Enable debug logging for wfm
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Emit task events as JSONL to a file, or `-` for stdout
    #[arg(long, global = true)]
    pub events: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create `.wfm/` and a default `.wfm.toml`
    Init,

    /// Show reference types and their task types
    References,

    /// Task management
    #[command(subcommand)]
    Task(TaskCommands),
}

#[derive(Subcommand, Debug)]
pub enum TaskCommands {
    /// Create a task, or a batch of tasks from a JSON file
    New {
        /// Reference entity id
        #[arg(long, required_unless_present = "batch")]
        reference_id: Option<u64>,

        /// Reference type (e.g. ORDER, SHIPMENT)
        #[arg(long, required_unless_present = "batch")]
        reference_type: Option<String>,

        /// Task type (e.g. CREATE_INVOICE)
        #[arg(long, required_unless_present = "batch")]
        task_type: Option<String>,

        /// Assignee user id
        #[arg(long, required_unless_present = "batch")]
        assignee: Option<u64>,

        /// Priority: LOW, MEDIUM, HIGH
        #[arg(long, default_value = "MEDIUM")]
        priority: String,

        /// Deadline (epoch millis or RFC 3339)
        #[arg(long, required_unless_present = "batch")]
        deadline: Option<String>,

        /// JSON file with an array of task requests
        #[arg(long, conflicts_with_all = ["reference_id", "reference_type", "task_type", "assignee", "deadline"])]
        batch: Option<PathBuf>,
    },

    /// Change status and/or description of a task, or a batch from a JSON file
    Update {
        /// Task id
        #[arg(required_unless_present = "batch")]
        id: Option<u64>,

        /// New status: ASSIGNED, STARTED, COMPLETED, CANCELLED
        #[arg(long)]
        status: Option<String>,

        /// New description
        #[arg(long)]
        description: Option<String>,

        /// JSON file with an array of update requests
        #[arg(long, conflicts_with_all = ["id", "status", "description"])]
        batch: Option<PathBuf>,
    },

    /// Hand every task of a reference to a new assignee
    Assign {
        /// Reference entity id
        #[arg(long)]
        reference_id: u64,

        /// Reference type (e.g. ORDER)
        #[arg(long)]
        reference_type: String,

        /// New assignee user id
        #[arg(long)]
        assignee: u64,
    },

    /// Show a task with its activity log
    Show {
        /// Task id
        id: u64,
    },

    /// Add a comment to a task
    Comment {
        /// Task id
        id: u64,

        /// Comment text
        text: String,

        /// Commenting user id
        #[arg(long)]
        user: u64,
    },

    /// Change a task's priority
    Priority {
        /// Task id
        id: u64,

        /// New priority: LOW, MEDIUM, HIGH
        priority: String,

        /// User making the change
        #[arg(long)]
        user: u64,
    },

    /// List tasks whose deadline falls within a range
    ByDate {
        /// Assignee ids (repeat or comma-separate)
        #[arg(long = "assignee", required = true, value_delimiter = ',')]
        assignees: Vec<u64>,

        /// Range start, inclusive (epoch millis or RFC 3339)
        #[arg(long)]
        start: String,

        /// Range end, inclusive (epoch millis or RFC 3339)
        #[arg(long)]
        end: String,
    },

    /// List a day's tasks plus older pending ones
    Daily {
        /// Assignee ids (repeat or comma-separate)
        #[arg(long = "assignee", required = true, value_delimiter = ',')]
        assignees: Vec<u64>,

        /// Any instant within the day (defaults to now)
        #[arg(long)]
        date: Option<String>,
    },

    /// List tasks with a given priority
    ByPriority {
        /// Priority: LOW, MEDIUM, HIGH
        priority: String,
    },
}

impl Cli {
    /// Execute the CLI command
    pub fn run(self) -> Result<()> {
        let global = task::GlobalOptions {
            dir: self.dir,
            events: self.events,
            json: self.json,
            quiet: self.quiet,
        };

        match self.command {
            Commands::Init => init::run(global.dir, global.json, global.quiet),
            Commands::References => task::run_references(global),
            Commands::Task(cmd) => match cmd {
                TaskCommands::New {
                    reference_id,
                    reference_type,
                    task_type,
                    assignee,
                    priority,
                    deadline,
                    batch,
                } => task::run_new(
                    task::NewOptions {
                        reference_id,
                        reference_type,
                        task_type,
                        assignee,
                        priority,
                        deadline,
                        batch,
                    },
                    global,
                ),
                TaskCommands::Update {
                    id,
                    status,
                    description,
                    batch,
                } => task::run_update(
                    task::UpdateOptions {
                        id,
                        status,
                        description,
                        batch,
                    },
                    global,
                ),
                TaskCommands::Assign {
                    reference_id,
                    reference_type,
                    assignee,
                } => task::run_assign(
                    task::AssignOptions {
                        reference_id,
                        reference_type,
                        assignee,
                    },
                    global,
                ),
                TaskCommands::Show { id } => task::run_show(id, global),
                TaskCommands::Comment { id, text, user } => {
                    task::run_comment(task::CommentOptions { id, text, user }, global)
                }
                TaskCommands::Priority { id, priority, user } => task::run_priority(
                    task::PriorityOptions { id, priority, user },
                    global,
                ),
                TaskCommands::ByDate {
                    assignees,
                    start,
                    end,
                } => task::run_by_date(
                    task::ByDateOptions {
                        assignees,
                        start,
                        end,
                    },
                    global,
                ),
                TaskCommands::Daily { assignees, date } => {
                    task::run_daily(task::DailyOptions { assignees, date }, global)
                }
                TaskCommands::ByPriority { priority } => task::run_by_priority(priority, global),
            },
        }
    }
}
