// Append-only notification log: one JSON notification per line
use serde_json::Value;
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

pub const DEFAULT_LOG_FILE: &str = "exafore.log";

pub struct NotificationLog {
    path: PathBuf,
    file: File,
    written: u64,
}

impl NotificationLog {
    /// Open `path` for appending, creating it if needed.
    pub fn open(path: impl AsRef<Path>) -> io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        Ok(NotificationLog {
            path,
            file,
            written: 0,
        })
    }

    /// Write one notification frame, fields in arrival order, as one line
    /// flushed immediately.
    pub fn append(&mut self, frame: &Value) -> io::Result<()> {
        let mut line = serde_json::to_vec(frame)?;
        line.push(b'\n');
        self.file.write_all(&line)?;
        self.file.flush()?;
        self.written += 1;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Notifications appended through this handle.
    pub fn written(&self) -> u64 {
        self.written
    }
}
