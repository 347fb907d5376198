//! wfm init command implementation
//!
//! Creates the `.wfm/` data directory and a default `.wfm.toml`.

use std::path::{Path, PathBuf};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::output::{emit_success, HumanOutput, OutputOptions};
use crate::storage::Storage;

#[derive(serde::Serialize)]
struct InitReport {
    root: PathBuf,
    created: InitCreated,
}

#[derive(serde::Serialize)]
struct InitCreated {
    config: bool,
    data_dir: bool,
}

pub fn run(dir: Option<PathBuf>, json: bool, quiet: bool) -> Result<()> {
    let root = match dir {
        Some(path) => path,
        None => std::env::current_dir()?,
    };
    let storage = Storage::new(root.clone());

    let created_data_dir = ensure_data_dir(&storage)?;
    let created_config = ensure_config(&storage.config_file())?;
    tracing::info!(
        root = %root.display(),
        created_data_dir,
        created_config,
        "init"
    );

    let report = InitReport {
        root: root.clone(),
        created: InitCreated {
            config: created_config,
            data_dir: created_data_dir,
        },
    };

    let mut created_items = Vec::new();
    if created_config {
        created_items.push(crate::storage::CONFIG_FILE);
    }
    if created_data_dir {
        created_items.push(".wfm/");
    }

    let header = if created_items.is_empty() {
        "wfm init: nothing to do"
    } else {
        "wfm init: initialized"
    };

    let mut human = HumanOutput::new(header);
    human.push_summary("root", root.display().to_string());
    human.push_summary(
        "created",
        if created_items.is_empty() {
            "none".to_string()
        } else {
            created_items.join(", ")
        },
    );
    human.push_next_step("wfm references");
    human.push_next_step("wfm task assign --reference-id <id> --reference-type <type> --assignee <user>");

    emit_success(OutputOptions { json, quiet }, "init", &report, Some(&human))
}

fn ensure_data_dir(storage: &Storage) -> Result<bool> {
    let path = storage.data_dir();
    if path.exists() {
        if !path.is_dir() {
            return Err(Error::OperationFailed(format!(
                "Expected directory at {}",
                path.display()
            )));
        }
        return Ok(false);
    }

    storage.init()?;
    Ok(true)
}

fn ensure_config(config_path: &Path) -> Result<bool> {
    if config_path.exists() {
        if !config_path.is_file() {
            return Err(Error::OperationFailed(format!(
                ".wfm.toml exists but is not a file: {}",
                config_path.display()
            )));
        }
        return Ok(false);
    }

    Config::default().save(config_path)?;
    Ok(true)
}
