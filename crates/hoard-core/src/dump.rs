//! Point-in-time binary snapshots of the whole index
//!
//! A snapshot is written to `<name>.dump-tmp` and installed over
//! `<name>.dump` by rename, so the live snapshot is replaced all-or-nothing.
//! Any failure along the way unlinks the temp file and leaves the previous
//! snapshot untouched.
//!
//! Format v1 (header in `format.rs`): each record is the key padded with
//! NULs to [`KEY_MAX`] bytes, a u64 data size, and the data bytes, emitted
//! in slot order then chain order. Readers must not rely on that order.
//! The v1 record carries no content-type and no explicit key length; on
//! load the key is the span before the first NUL, and the content-type
//! resets to the default.

use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use crate::error::{StoreError, StoreResult};
use crate::format::{DumpHeader, DUMP_HEADER_SIZE, KEY_MAX};
use crate::index::Index;
use crate::sys::{durable_sync, sync_dir};

/// The in-progress snapshot path: `<name>.dump-tmp` next to the live one.
pub fn tmp_path(dump_path: &Path) -> PathBuf {
    let mut name = dump_path.as_os_str().to_os_string();
    name.push("-tmp");
    PathBuf::from(name)
}

/// Serialize the whole index and atomically install it at `dump_path`.
/// The index is only read, never mutated.
pub fn save(index: &Index, dump_path: &Path) -> StoreResult<()> {
    let tmp = tmp_path(dump_path);
    let result = write_snapshot(index, &tmp, dump_path);
    if result.is_err() {
        let _ = fs::remove_file(&tmp);
    }
    result
}

fn write_snapshot(index: &Index, tmp: &Path, dump_path: &Path) -> StoreResult<()> {
    let file = File::create(tmp).map_err(|e| StoreError::Io {
        path: Some(tmp.to_path_buf()),
        kind: e.kind(),
        message: format!("failed to create snapshot temp file: {}", e),
    })?;
    let mut writer = BufWriter::new(file);

    let io_err = |e: std::io::Error| StoreError::Io {
        path: Some(tmp.to_path_buf()),
        kind: e.kind(),
        message: format!("snapshot write failed: {}", e),
    };

    let header = DumpHeader {
        record_count: index.len(),
    };
    writer.write_all(&header.to_bytes()).map_err(io_err)?;

    let mut key_buf = [0u8; KEY_MAX];
    for record in index.records() {
        // Key field is fixed-width, NUL-padded.
        key_buf.fill(0);
        key_buf[..record.key().len()].copy_from_slice(record.key());
        writer.write_all(&key_buf).map_err(io_err)?;
        writer
            .write_all(&(record.data().len() as u64).to_le_bytes())
            .map_err(io_err)?;
        writer.write_all(record.data()).map_err(io_err)?;
    }

    writer.flush().map_err(io_err)?;
    durable_sync(writer.get_ref()).map_err(io_err)?;
    drop(writer);

    fs::rename(tmp, dump_path).map_err(|e| StoreError::Io {
        path: Some(dump_path.to_path_buf()),
        kind: e.kind(),
        message: format!("failed to install snapshot: {}", e),
    })?;

    // The rename itself must survive a crash, not just the file contents.
    if let Some(parent) = dump_path.parent() {
        sync_dir(parent).map_err(|e| StoreError::Io {
            path: Some(parent.to_path_buf()),
            kind: e.kind(),
            message: format!("failed to sync snapshot directory: {}", e),
        })?;
    }

    Ok(())
}

/// Streaming reader over a snapshot's records.
pub struct DumpReader {
    reader: BufReader<File>,
    path: PathBuf,
    record_count: u64,
    read_so_far: u64,
    offset: u64,
}

impl DumpReader {
    /// Open a snapshot and validate its header.
    pub fn open(path: &Path) -> StoreResult<Self> {
        let file = File::open(path).map_err(|e| StoreError::Io {
            path: Some(path.to_path_buf()),
            kind: e.kind(),
            message: format!("failed to open snapshot: {}", e),
        })?;
        let mut reader = BufReader::new(file);

        let mut header_buf = [0u8; DUMP_HEADER_SIZE];
        reader
            .read_exact(&mut header_buf)
            .map_err(|e| StoreError::Corrupt {
                path: path.to_path_buf(),
                offset: 0,
                reason: format!("snapshot shorter than its header: {}", e),
            })?;
        let header = DumpHeader::from_bytes(&header_buf, path)?;

        Ok(Self {
            reader,
            path: path.to_path_buf(),
            record_count: header.record_count,
            read_so_far: 0,
            offset: DUMP_HEADER_SIZE as u64,
        })
    }

    /// Records the header promises.
    pub fn record_count(&self) -> u64 {
        self.record_count
    }

    /// Read the next `(key, value)` pair, or `None` once all promised
    /// records were read. A short read before that is `Corrupt`.
    pub fn next_record(&mut self) -> StoreResult<Option<(Vec<u8>, Vec<u8>)>> {
        if self.read_so_far == self.record_count {
            return Ok(None);
        }

        let corrupt = |offset: u64, reason: String| StoreError::Corrupt {
            path: self.path.clone(),
            offset,
            reason,
        };

        let mut key_buf = [0u8; KEY_MAX];
        self.reader.read_exact(&mut key_buf).map_err(|e| {
            corrupt(
                self.offset,
                format!(
                    "short read in record {} of {}: {}",
                    self.read_so_far + 1,
                    self.record_count,
                    e
                ),
            )
        })?;
        // Fixed-width key field: the key is everything before the first
        // NUL (a full-width key has none).
        let key_len = key_buf.iter().position(|&b| b == 0).unwrap_or(KEY_MAX);

        let mut size_buf = [0u8; 8];
        self.reader.read_exact(&mut size_buf).map_err(|e| {
            corrupt(
                self.offset + KEY_MAX as u64,
                format!("short read in record size: {}", e),
            )
        })?;
        let data_size = u64::from_le_bytes(size_buf);

        let mut data = vec![0u8; data_size as usize];
        self.reader.read_exact(&mut data).map_err(|e| {
            corrupt(
                self.offset + KEY_MAX as u64 + 8,
                format!("short read in record data ({} bytes): {}", data_size, e),
            )
        })?;

        self.read_so_far += 1;
        self.offset += KEY_MAX as u64 + 8 + data_size;
        Ok(Some((key_buf[..key_len].to_vec(), data)))
    }
}
