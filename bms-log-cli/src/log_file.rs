//! Text log file sink
//!
//! Appends one record per recognized frame. Existing logs are never truncated,
//! so several sessions can share a file.

use anyhow::{Context, Result};
use bms_log_decoder::{FrameRecord, LogSink};
use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

pub struct TextLogSink {
    path: PathBuf,
    writer: BufWriter<File>,
    entries: usize,
}

impl TextLogSink {
    /// Open (or create) the log file in append mode
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create log directory: {:?}", parent))?;
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("Failed to open log file: {:?}", path))?;

        log::info!("Logging decoded frames to {:?}", path);

        Ok(Self {
            path: path.to_path_buf(),
            writer: BufWriter::new(file),
            entries: 0,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Records written by this sink
    pub fn entries(&self) -> usize {
        self.entries
    }
}

impl LogSink for TextLogSink {
    fn write_entry(&mut self, record: &FrameRecord) -> Result<()> {
        write!(self.writer, "{}", record)
            .and_then(|_| self.writer.flush())
            .with_context(|| format!("Failed to write to {:?}", self.path))?;
        self.entries += 1;
        Ok(())
    }
}
