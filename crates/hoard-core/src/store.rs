//! Store façade — lifecycle, feature flags, and mutation routing
//!
//! A `Store` owns one index and the file paths derived from its name:
//! `<path>/<name>.dump` for snapshots and `<path>/<name>.aol` for the
//! append-only log. Mutations update the index first, then append a
//! command to the log when the `APPEND_ONLY` feature is on.
//!
//! Lifecycle: `open` replays the log (if any) in the `Startup` state, where
//! log appends are suppressed so replay does not re-log itself, then
//! transitions to `Aokay` and serves. `close` tears the index down and
//! verifies that exactly the claimed number of records was freed.
//!
//! The store assumes exclusive access: all operations are synchronous and
//! single-threaded. An embedder that wants shared access wraps the store
//! in its own reader-writer lock.

use std::path::{Path, PathBuf};
use std::time::{Instant, SystemTime};

use crate::aol::{self, AolWriter};
use crate::config::Config;
use crate::dump::{self, DumpReader};
use crate::error::{StoreError, StoreResult};
use crate::format::{Command, DEFAULT_CONTENT_TYPE};
use crate::index::{clip, Index};
use crate::sys;

/// Log every mutation to the append-only log. The only defined feature.
pub const APPEND_ONLY: u32 = 1 << 0;

/// Store lifecycle state. Log appends require `Aokay`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    /// Opening: replaying the log into the empty index.
    Startup,
    /// Serving.
    Aokay,
}

/// An embeddable key-value store: RAM-resident chained hash table,
/// append-only command log, binary snapshots.
pub struct Store {
    index: Index,
    config: Config,
    features: u32,
    state: State,
    aol: Option<AolWriter>,
    aol_path: PathBuf,
    dump_path: PathBuf,
    created: Instant,
}

impl Store {
    /// Open a store named `name` inside `path`, creating the directory
    /// (mode 0755) if needed. If `APPEND_ONLY` is in `features`, the log
    /// is replayed before the store starts serving.
    pub fn open<P: AsRef<Path>>(path: P, name: &str, features: u32) -> StoreResult<Store> {
        Self::open_with_config(path, name, features, Config::default())
    }

    /// `open` with explicit sizing and durability settings.
    pub fn open_with_config<P: AsRef<Path>>(
        path: P,
        name: &str,
        features: u32,
        config: Config,
    ) -> StoreResult<Store> {
        let path = path.as_ref();

        config.validate().map_err(|message| StoreError::Io {
            path: None,
            kind: std::io::ErrorKind::InvalidInput,
            message,
        })?;

        sys::ensure_dir(path).map_err(|e| StoreError::Io {
            path: Some(path.to_path_buf()),
            kind: e.kind(),
            message: format!("failed to create store directory: {}", e),
        })?;

        let dump_path = path.join(format!("{}.dump", name));
        let aol_path = path.join(format!("{}.aol", name));

        // A crash during a snapshot leaves its temp file behind; the live
        // snapshot is still the previous one.
        let stale_tmp = dump::tmp_path(&dump_path);
        if stale_tmp.exists() {
            eprintln!(
                "[OPEN] removing stale snapshot temp {}",
                stale_tmp.display()
            );
            let _ = std::fs::remove_file(&stale_tmp);
        }

        let mut store = Store {
            index: Index::with_slots(config.initial_slots),
            config,
            features,
            state: State::Startup,
            aol: None,
            aol_path,
            dump_path,
            created: Instant::now(),
        };

        if store.is_enabled(APPEND_ONLY) {
            store.aol = Some(AolWriter::open(&store.aol_path, store.config.durable_aol)?);
            store.replay_log()?;
        }

        store.state = State::Aokay;
        Ok(store)
    }

    /// Apply every surviving log command through the normal entry points.
    /// `Startup` state keeps them from being re-logged.
    fn replay_log(&mut self) -> StoreResult<()> {
        let records = aol::read_all(&self.aol_path)?;
        let replayed = records.len();

        for record in records {
            match record.command {
                Command::Put => {
                    self.put_ct(&record.key, &record.value, &record.content_type)?;
                }
                Command::Delete => {
                    self.delete(&record.key)?;
                }
            }
        }

        if replayed > 0 {
            eprintln!(
                "[AOL REPLAY] restored {} commands, {} records live",
                replayed,
                self.index.len()
            );
        }
        Ok(())
    }

    /// Insert or update a binding with the default content-type.
    pub fn put(&mut self, key: &[u8], value: &[u8]) -> StoreResult<()> {
        self.put_ct(key, value, DEFAULT_CONTENT_TYPE)
    }

    /// Insert or update a binding with an explicit content-type. An empty
    /// content-type is replaced by the default.
    pub fn put_ct(&mut self, key: &[u8], value: &[u8], content_type: &[u8]) -> StoreResult<()> {
        let content_type = if content_type.is_empty() {
            DEFAULT_CONTENT_TYPE
        } else {
            content_type
        };
        let key = clip(key);

        self.index.put(key, value, content_type);

        if self.logging_active() {
            self.log_writer()?.append_put(key, content_type, value)?;
        }
        Ok(())
    }

    /// Fetch the value bound to a key. No side effects.
    pub fn get(&self, key: &[u8]) -> Option<&[u8]> {
        self.index.find(key).map(|record| record.data())
    }

    /// Fetch the content-type bound to a key.
    pub fn content_type(&self, key: &[u8]) -> Option<&[u8]> {
        self.index.find(key).map(|record| record.content_type())
    }

    /// Remove a binding. `Ok(false)` means the key was not present.
    pub fn delete(&mut self, key: &[u8]) -> StoreResult<bool> {
        let key = clip(key);
        if !self.index.delete(key) {
            return Ok(false);
        }

        if self.logging_active() {
            self.log_writer()?.append_delete(key)?;
        }
        Ok(true)
    }

    /// Attach an expiry time to a key. Accepted and discarded: expiry is
    /// not enforced.
    pub fn set_expire(&mut self, _key: &[u8], _at: SystemTime) -> StoreResult<()> {
        Ok(())
    }

    /// Snapshot the index to `<name>.dump`, atomically.
    pub fn save(&self) -> StoreResult<()> {
        dump::save(&self.index, &self.dump_path)
    }

    /// Snapshot in a forked child. The parent returns immediately and keeps
    /// serving; the child writes the copy-on-write image it captured at the
    /// fork and always exits, with code 0 on success and 1 on failure.
    #[cfg(unix)]
    pub fn background_save(&self) -> StoreResult<()> {
        match sys::fork().map_err(|e| StoreError::Io {
            path: None,
            kind: e.kind(),
            message: format!("could not fork for background save: {}", e),
        })? {
            sys::Fork::Child => {
                let code = match dump::save(&self.index, &self.dump_path) {
                    Ok(()) => 0,
                    Err(e) => {
                        eprintln!("[DUMP] background save failed: {}", e);
                        1
                    }
                };
                sys::exit_child(code);
            }
            sys::Fork::Parent(pid) => {
                eprintln!("[DUMP] backgrounding snapshot, pid {}", pid);
                Ok(())
            }
        }
    }

    /// Without fork, a background save degrades to a synchronous one.
    #[cfg(not(unix))]
    pub fn background_save(&self) -> StoreResult<()> {
        self.save()
    }

    /// Load a snapshot file into the store, inserting every record through
    /// the normal put path with the default content-type. Loading does not
    /// clear existing bindings first.
    pub fn load(&mut self, filename: &Path) -> StoreResult<()> {
        let mut reader = DumpReader::open(filename)?;
        while let Some((key, value)) = reader.next_record()? {
            self.put(&key, &value)?;
        }
        Ok(())
    }

    /// Close, verifying teardown. Frees every record and errors with
    /// `InvariantViolation` if the freed count disagrees with the live
    /// record count. The log file handle closes with the store.
    pub fn close(self) -> StoreResult<()> {
        self.shutdown()
    }

    /// `save` then `close`.
    pub fn close_save(self) -> StoreResult<()> {
        self.save()?;
        self.shutdown()
    }

    fn shutdown(mut self) -> StoreResult<()> {
        let expected = self.index.len();
        let freed = self.index.clear();
        if freed != expected {
            return Err(StoreError::InvariantViolation {
                expected,
                actual: freed,
            });
        }
        Ok(())
    }

    /// Seconds since this store was opened.
    pub fn uptime(&self) -> u64 {
        self.created.elapsed().as_secs()
    }

    /// Number of live records.
    pub fn len(&self) -> u64 {
        self.index.len()
    }

    /// True when the store holds no records.
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Current slot count of the underlying table.
    pub fn slot_count(&self) -> usize {
        self.index.slot_count()
    }

    /// Turn a feature on. Enabling `APPEND_ONLY` mid-flight starts logging
    /// with the next mutation; the writer opens lazily.
    pub fn enable(&mut self, feature: u32) {
        self.features |= feature;
    }

    /// Turn a feature off.
    pub fn disable(&mut self, feature: u32) {
        self.features &= !feature;
    }

    /// Check a feature bit.
    pub fn is_enabled(&self, feature: u32) -> bool {
        self.features & feature != 0
    }

    fn logging_active(&self) -> bool {
        self.state == State::Aokay && self.is_enabled(APPEND_ONLY)
    }

    fn log_writer(&mut self) -> StoreResult<&mut AolWriter> {
        if self.aol.is_none() {
            self.aol = Some(AolWriter::open(&self.aol_path, self.config.durable_aol)?);
        }
        Ok(self.aol.as_mut().unwrap())
    }
}
