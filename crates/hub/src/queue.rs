//! File-backed command queue from the API to the daemon.
//!
//! The API appends one command per line. The daemon claims the whole file by
//! renaming it before reading, so commands appended after the rename land in
//! a fresh file and are picked up on the next drain.

use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

pub const QUEUE_FILE: &str = "command.txt";

#[derive(Debug, Clone)]
pub struct CommandQueue {
    path: PathBuf,
    processing: PathBuf,
}

impl CommandQueue {
    pub fn new(data_dir: impl AsRef<Path>) -> Self {
        let path = data_dir.as_ref().join(QUEUE_FILE);
        let processing = path.with_extension("processing");
        Self { path, processing }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append `cmd` as its own line. Callers in one process must serialize
    /// pushes themselves.
    pub fn push(&self, cmd: &str) -> Result<()> {
        if let Some(dir) = self.path.parent() {
            fs::create_dir_all(dir)
                .with_context(|| format!("failed to create {}", dir.display()))?;
        }
        let mut f = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("failed to open {}", self.path.display()))?;
        writeln!(f, "{cmd}").with_context(|| format!("failed to append to {}", self.path.display()))
    }

    /// Take every queued command in order. A missing queue drains empty.
    pub fn drain(&self) -> Result<Vec<String>> {
        match fs::rename(&self.path, &self.processing) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(e).with_context(|| format!("failed to claim {}", self.path.display()))
            }
        }

        let contents = fs::read_to_string(&self.processing)
            .with_context(|| format!("failed to read {}", self.processing.display()))?;
        fs::remove_file(&self.processing)
            .with_context(|| format!("failed to remove {}", self.processing.display()))?;

        Ok(contents
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(str::to_string)
            .collect())
    }
}

// ===========================================================================
// Tests
// ===========================================================================
