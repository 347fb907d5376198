//! Configuration loading and management
//!
//! Handles parsing of `.wfm.toml` configuration files.

use std::collections::BTreeMap;
use std::path::Path;

use chrono::Duration;
use serde::{Deserialize, Serialize};

use crate::clock::{parse_duration, DayZone};
use crate::error::{Error, Result};
use crate::reference::ReferenceTable;
use crate::task::{Priority, ReferenceType, TaskType};

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Task creation defaults
    #[serde(default)]
    pub tasks: TasksConfig,

    /// Day boundary settings
    #[serde(default)]
    pub schedule: ScheduleConfig,

    /// Reference type -> applicable task types
    #[serde(default = "default_references")]
    pub references: BTreeMap<String, Vec<String>>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            tasks: TasksConfig::default(),
            schedule: ScheduleConfig::default(),
            references: default_references(),
        }
    }
}

/// Tasks configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TasksConfig {
    /// Description given to explicitly created tasks
    #[serde(default = "default_description")]
    pub default_description: String,

    /// Deadline offset for tasks created by reference assignment
    #[serde(default = "default_assignment_deadline")]
    pub assignment_deadline: String,

    /// Priority for tasks created by reference assignment
    #[serde(default = "default_assignment_priority")]
    pub assignment_priority: String,
}

fn default_description() -> String {
    "New task created.".to_string()
}

fn default_assignment_deadline() -> String {
    "24h".to_string()
}

fn default_assignment_priority() -> String {
    "MEDIUM".to_string()
}

impl Default for TasksConfig {
    fn default() -> Self {
        Self {
            default_description: default_description(),
            assignment_deadline: default_assignment_deadline(),
            assignment_priority: default_assignment_priority(),
        }
    }
}

/// Schedule configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleConfig {
    /// `local`, `UTC`, or a fixed offset such as `+05:30`
    #[serde(default = "default_timezone")]
    pub timezone: String,
}

fn default_timezone() -> String {
    "local".to_string()
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            timezone: default_timezone(),
        }
    }
}

fn default_references() -> BTreeMap<String, Vec<String>> {
    let entries: [(&str, &[&str]); 3] = [
        ("ORDER", &["CREATE_INVOICE", "ARRANGE_PICKUP", "COLLECT_PAYMENT"]),
        ("ENTITY", &["ASSIGN_CUSTOMER_TO_SALES_PERSON"]),
        ("SHIPMENT", &["SHIPMENT_TASK"]),
    ];
    entries
        .iter()
        .map(|(reference, tasks)| {
            (
                reference.to_string(),
                tasks.iter().map(|task| task.to_string()).collect(),
            )
        })
        .collect()
}

/// Validated, typed view of the task settings.
#[derive(Debug, Clone)]
pub struct TaskPolicy {
    pub default_description: String,
    pub assignment_deadline: Duration,
    pub assignment_priority: Priority,
}

impl Default for TaskPolicy {
    fn default() -> Self {
        Self {
            default_description: default_description(),
            assignment_deadline: Duration::hours(24),
            assignment_priority: Priority::Medium,
        }
    }
}

impl Config {
    /// Load configuration from a `.wfm.toml` file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)
            .map_err(|err| Error::InvalidConfig(format!("{}: {err}", path.display())))?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from the root directory, or return defaults.
    ///
    /// An invalid file is logged and ignored.
    pub fn load_from_root(root: &Path) -> Self {
        let config_path = root.join(crate::storage::CONFIG_FILE);
        if !config_path.exists() {
            return Self::default();
        }
        match Self::load(&config_path) {
            Ok(config) => config,
            Err(err) => {
                tracing::warn!(path = %config_path.display(), error = %err, "ignoring invalid config");
                Self::default()
            }
        }
    }

    /// Save configuration to a file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn task_policy(&self) -> Result<TaskPolicy> {
        self.tasks.policy()
    }

    pub fn day_zone(&self) -> Result<DayZone> {
        self.schedule.timezone.parse().map_err(|err: Error| {
            Error::InvalidConfig(format!("schedule.timezone: {err}"))
        })
    }

    pub fn reference_table(&self) -> Result<ReferenceTable> {
        let mut table = ReferenceTable::new();
        for (reference, task_types) in &self.references {
            if reference.trim().is_empty() {
                return Err(Error::InvalidConfig(
                    "references: reference type cannot be empty".to_string(),
                ));
            }
            if task_types.is_empty() {
                return Err(Error::InvalidConfig(format!(
                    "references.{reference}: needs at least one task type"
                )));
            }
            let mut seen = std::collections::HashSet::new();
            let mut resolved = Vec::with_capacity(task_types.len());
            for task_type in task_types {
                if task_type.trim().is_empty() {
                    return Err(Error::InvalidConfig(format!(
                        "references.{reference}: task type cannot be empty"
                    )));
                }
                let task_type = TaskType::new(task_type);
                if !seen.insert(task_type.clone()) {
                    return Err(Error::InvalidConfig(format!(
                        "references.{reference}: duplicate task type '{task_type}'"
                    )));
                }
                resolved.push(task_type);
            }
            table.insert(ReferenceType::new(reference), resolved);
        }
        Ok(table)
    }

    fn validate(&self) -> Result<()> {
        self.task_policy()?;
        self.day_zone()?;
        self.reference_table()?;
        Ok(())
    }
}

impl TasksConfig {
    fn policy(&self) -> Result<TaskPolicy> {
        if self.default_description.trim().is_empty() {
            return Err(Error::InvalidConfig(
                "tasks.default_description cannot be empty".to_string(),
            ));
        }

        let assignment_deadline = parse_duration(&self.assignment_deadline).map_err(|err| {
            Error::InvalidConfig(format!("tasks.assignment_deadline: {err}"))
        })?;
        if assignment_deadline <= Duration::zero() {
            return Err(Error::InvalidConfig(
                "tasks.assignment_deadline must be > 0".to_string(),
            ));
        }

        let assignment_priority: Priority = self.assignment_priority.parse().map_err(|err: Error| {
            Error::InvalidConfig(format!("tasks.assignment_priority: {err}"))
        })?;

        Ok(TaskPolicy {
            default_description: self.default_description.clone(),
            assignment_deadline,
            assignment_priority,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn defaults_are_expected() {
        let cfg = Config::default();
        assert_eq!(cfg.tasks.default_description, "New task created.");
        assert_eq!(cfg.tasks.assignment_deadline, "24h");
        assert_eq!(cfg.tasks.assignment_priority, "MEDIUM");
        assert_eq!(cfg.schedule.timezone, "local");

        let policy = cfg.task_policy().expect("policy");
        assert_eq!(policy.assignment_deadline, Duration::hours(24));
        assert_eq!(policy.assignment_priority, Priority::Medium);

        let table = cfg.reference_table().expect("table");
        assert_eq!(
            table.applicable_task_types(&ReferenceType::new("ORDER")).len(),
            3
        );
        assert_eq!(
            table.applicable_task_types(&ReferenceType::new("SHIPMENT")),
            &[TaskType::new("SHIPMENT_TASK")]
        );
    }

    #[test]
    fn load_parses_overrides() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join(".wfm.toml");
        let content = r#"
[tasks]
default_description = "Fresh task."
assignment_deadline = "2d"
assignment_priority = "high"

[schedule]
timezone = "+05:30"

[references]
ORDER = ["CREATE_INVOICE"]
RETURN = ["inspect-item", "REFUND"]
"#;
        fs::write(&path, content.trim()).expect("write config");

        let cfg = Config::load(&path).expect("load config");
        let policy = cfg.task_policy().expect("policy");
        assert_eq!(policy.default_description, "Fresh task.");
        assert_eq!(policy.assignment_deadline, Duration::days(2));
        assert_eq!(policy.assignment_priority, Priority::High);
        assert_eq!(cfg.day_zone().expect("zone").to_string(), "+05:30");

        let table = cfg.reference_table().expect("table");
        assert_eq!(table.iter().count(), 2);
        assert_eq!(
            table.applicable_task_types(&ReferenceType::new("RETURN")),
            &[TaskType::new("INSPECT_ITEM"), TaskType::new("REFUND")]
        );
        assert!(table
            .applicable_task_types(&ReferenceType::new("ENTITY"))
            .is_empty());
    }

    #[test]
    fn invalid_values_rejected() {
        let cases = [
            "[tasks]\nassignment_priority = \"urgent\"",
            "[tasks]\nassignment_deadline = \"0h\"",
            "[tasks]\ndefault_description = \"  \"",
            "[schedule]\ntimezone = \"moon\"",
            "[references]\nORDER = []",
            "[references]\nORDER = [\"A\", \"a\"]",
            "[tasks]\nassignment_deadline = \"24\"",
            "[schedule]\ntimezone = 5",
            "[tasks",
        ];
        for content in cases {
            let dir = tempfile::tempdir().expect("tempdir");
            let path = dir.path().join(".wfm.toml");
            fs::write(&path, content).expect("write config");

            match Config::load(&path) {
                Err(Error::InvalidConfig(_)) => {}
                other => panic!("expected invalid config for {content:?}, got {other:?}"),
            }
        }
    }

    #[test]
    fn load_from_root_defaults_when_missing_or_invalid() {
        let dir = tempfile::tempdir().expect("tempdir");
        let cfg = Config::load_from_root(dir.path());
        assert_eq!(cfg.schedule.timezone, "local");

        fs::write(dir.path().join(".wfm.toml"), "[schedule]\ntimezone = \"moon\"")
            .expect("write config");
        let cfg = Config::load_from_root(dir.path());
        assert_eq!(cfg.schedule.timezone, "local");
    }

    #[test]
    fn save_writes_toml() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("out.toml");
        Config::default().save(&path).expect("save config");

        let written = fs::read_to_string(&path).expect("read config");
        assert!(written.contains("assignment_deadline = \"24h\""));
        assert!(written.contains("SHIPMENT"));

        let reloaded = Config::load(&path).expect("reload");
        assert_eq!(reloaded.references, Config::default().references);
    }
}
