//! Storage layout for wfm
//!
//! All state lives under a single root directory:
//!
//! ```text
//! <root>/
//!   .wfm.toml           # Configuration (optional)
//!   .wfm/               # Data directory
//!     tasks.json        # Task snapshot
//!     tasks.lock        # Lock guarding snapshot writes
//! ```

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{de::DeserializeOwned, Serialize};

use crate::error::Result;

/// Name of the data directory under the root
pub const DATA_DIR: &str = ".wfm";

/// Name of the configuration file under the root
pub const CONFIG_FILE: &str = ".wfm.toml";

/// Storage manager for wfm state
#[derive(Debug, Clone)]
pub struct Storage {
    root: PathBuf,
}

impl Storage {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    // =========================================================================
    // Path accessors
    // =========================================================================

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path to the `.wfm/` data directory
    pub fn data_dir(&self) -> PathBuf {
        self.root.join(DATA_DIR)
    }

    /// Path to `.wfm.toml`
    pub fn config_file(&self) -> PathBuf {
        self.root.join(CONFIG_FILE)
    }

    /// Path to the task snapshot
    pub fn tasks_file(&self) -> PathBuf {
        self.data_dir().join("tasks.json")
    }

    /// Path to the lock guarding the task snapshot
    pub fn tasks_lock_file(&self) -> PathBuf {
        self.data_dir().join("tasks.lock")
    }

    // =========================================================================
    // Directory initialization
    // =========================================================================

    pub fn init(&self) -> Result<()> {
        fs::create_dir_all(self.data_dir())?;
        Ok(())
    }

    // =========================================================================
    // File I/O helpers
    // =========================================================================

    /// Write JSON data atomically (write to temp, then rename)
    pub fn write_json<T: Serialize>(&self, path: &Path, data: &T) -> Result<()> {
        let json = serde_json::to_string_pretty(data)?;
        self.write_atomic(path, json.as_bytes())
    }

    /// Read JSON data from a file
    pub fn read_json<T: DeserializeOwned>(&self, path: &Path) -> Result<T> {
        let content = fs::read_to_string(path)?;
        let data: T = serde_json::from_str(&content)?;
        Ok(data)
    }

    /// Write data using temp file + rename so readers never see a partial file
    pub fn write_atomic(&self, path: &Path, data: &[u8]) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let temp_path = path.with_extension("tmp");

        let mut file = File::create(&temp_path)?;
        file.write_all(data)?;
        file.sync_all()?;

        fs::rename(&temp_path, path)?;

        Ok(())
    }
}
