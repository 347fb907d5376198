#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use assert_cmd::Command;
use serde_json::Value;
use tempfile::TempDir;

pub struct TestDir {
    dir: TempDir,
}

impl TestDir {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().expect("failed to create tempdir");
        Self { dir }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn write_file(&self, rel_path: &str, contents: &str) -> std::io::Result<PathBuf> {
        let path = self.dir.path().join(rel_path);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, contents)?;
        Ok(path)
    }

    pub fn write_config(&self, contents: &str) -> std::io::Result<PathBuf> {
        self.write_file(".wfm.toml", contents)
    }

    pub fn tasks_file(&self) -> PathBuf {
        self.dir.path().join(".wfm").join("tasks.json")
    }

    /// `wfm` running inside this directory with a clean environment.
    pub fn cmd(&self) -> Command {
        let mut cmd = wfm_cmd();
        cmd.current_dir(self.path());
        cmd
    }

    /// Run a command with `--json` and return the parsed envelope.
    pub fn json(&self, args: &[&str]) -> Value {
        let output = self
            .cmd()
            .args(args)
            .arg("--json")
            .assert()
            .success()
            .get_output()
            .stdout
            .clone();
        serde_json::from_slice(&output).expect("json envelope")
    }

    /// Create one task and return its id.
    pub fn new_task(
        &self,
        reference_id: u64,
        reference_type: &str,
        task_type: &str,
        assignee: u64,
        deadline: &str,
    ) -> u64 {
        let reference_id = reference_id.to_string();
        let assignee = assignee.to_string();
        let value = self.json(&[
            "task",
            "new",
            "--reference-id",
            &reference_id,
            "--reference-type",
            reference_type,
            "--task-type",
            task_type,
            "--assignee",
            &assignee,
            "--deadline",
            deadline,
        ]);
        value["data"]["tasks"][0]["id"].as_u64().expect("task id")
    }
}

pub fn wfm_cmd() -> Command {
    let mut cmd = Command::cargo_bin("wfm").expect("binary");
    cmd.env_remove("WFM_DIR");
    cmd.env_remove("RUST_LOG");
    cmd
}

pub fn ids(value: &Value) -> Vec<u64> {
    value["data"]["tasks"]
        .as_array()
        .expect("tasks array")
        .iter()
        .map(|task| task["id"].as_u64().expect("task id"))
        .collect()
}
