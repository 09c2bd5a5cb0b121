//! JSONL event log: an append-only record of every pipeline event.

use crate::events::{Event, Observer};
use anyhow::{anyhow, Context, Result};
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;

/// Appends each event as one JSON line.
pub struct EventLog {
    file: Mutex<File>,
}

impl EventLog {
    /// Open or create the log file, creating parent directories.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("failed to open event log: {}", path.display()))?;

        Ok(Self {
            file: Mutex::new(file),
        })
    }

    pub fn log(&self, event: &Event) -> Result<()> {
        let json = serde_json::to_string(event)?;
        let mut file = self
            .file
            .lock()
            .map_err(|_| anyhow!("event log lock poisoned"))?;
        writeln!(file, "{json}")?;
        Ok(())
    }
}

impl Observer for EventLog {
    fn notify(&self, event: &Event) -> Result<()> {
        self.log(event)
    }
}
