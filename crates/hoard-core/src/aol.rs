//! Append-only log of mutation commands
//!
//! Every successful mutation outside startup appends one framed command to
//! `<path>/<name>.aol`; replay applies the surviving commands in file order
//! to rebuild the index after a restart.
//!
//! The writer is append-only — it never seeks and never rewrites. Each
//! command is written and flushed before the mutation returns; syncing to
//! persistent media per command is the `durable` tunable, off by default.
//!
//! Replay stops at the first malformed or truncated frame and treats it as
//! end-of-log. Unlike checksum-per-entry formats that scan forward for the
//! next magic, the log is a strict prefix: anything after a bad frame was
//! written after the corruption point and cannot be trusted.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::error::{StoreError, StoreResult};
use crate::format::{self, AolRecord};
use crate::sys::durable_sync;

/// Appends framed commands to the log file.
pub struct AolWriter {
    file: File,
    path: PathBuf,
    durable: bool,
}

impl AolWriter {
    /// Open (creating if needed) the log for appending.
    pub fn open(path: &Path, durable: bool) -> StoreResult<Self> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|e| StoreError::Io {
                path: Some(path.to_path_buf()),
                kind: e.kind(),
                message: format!("failed to open append-only log: {}", e),
            })?;

        Ok(Self {
            file,
            path: path.to_path_buf(),
            durable,
        })
    }

    /// Append a Put command.
    pub fn append_put(&mut self, key: &[u8], content_type: &[u8], value: &[u8]) -> StoreResult<()> {
        let frame = format::encode_put(key, content_type, value);
        self.append_frame(&frame)
    }

    /// Append a Delete command.
    pub fn append_delete(&mut self, key: &[u8]) -> StoreResult<()> {
        let frame = format::encode_delete(key);
        self.append_frame(&frame)
    }

    fn append_frame(&mut self, frame: &[u8]) -> StoreResult<()> {
        self.file.write_all(frame).map_err(|e| StoreError::Io {
            path: Some(self.path.clone()),
            kind: e.kind(),
            message: format!("append-only log write failed: {}", e),
        })?;

        if self.durable {
            durable_sync(&self.file).map_err(|e| StoreError::Io {
                path: Some(self.path.clone()),
                kind: e.kind(),
                message: format!("append-only log sync failed: {}", e),
            })?;
        }

        Ok(())
    }

    /// Force the log to persistent storage regardless of the per-command
    /// durability setting.
    pub fn sync(&self) -> StoreResult<()> {
        durable_sync(&self.file).map_err(|e| StoreError::Io {
            path: Some(self.path.clone()),
            kind: e.kind(),
            message: format!("append-only log sync failed: {}", e),
        })
    }

    /// The log file path (for diagnostics).
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Read every intact command from the log, in file order.
///
/// A missing file is an empty log. Parsing stops at EOF or at the first
/// defective frame; everything before it is returned, the file itself is
/// left untouched.
pub fn read_all(path: &Path) -> StoreResult<Vec<AolRecord>> {
    if !path.exists() {
        return Ok(Vec::new());
    }

    let buffer = std::fs::read(path).map_err(|e| StoreError::Io {
        path: Some(path.to_path_buf()),
        kind: e.kind(),
        message: format!("failed to read append-only log: {}", e),
    })?;

    let mut records = Vec::new();
    let mut offset = 0usize;

    while offset < buffer.len() {
        match format::decode_record(&buffer[offset..], path, offset as u64) {
            Ok((record, used)) => {
                records.push(record);
                offset += used;
            }
            Err(e) => {
                eprintln!("[AOL REPLAY] log ends early: {}", e);
                break;
            }
        }
    }

    Ok(records)
}
