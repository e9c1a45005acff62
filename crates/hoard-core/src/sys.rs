//! Platform plumbing: durable sync, directory creation, process forking
//!
//! Everything here wraps an OS facility whose strongest form differs per
//! platform. The rest of the crate calls these and stays portable.

use std::fs::{self, File};
use std::io;
use std::path::Path;

/// Flush a file to persistent storage with the strongest primitive the
/// platform offers.
///
/// - Linux: `fdatasync` (file data, not metadata)
/// - macOS/iOS: `fcntl(F_FULLFSYNC)` — plain `fsync` there only reaches the
///   disk's volatile write cache
/// - Windows: `FlushFileBuffers`
/// - elsewhere: std's `sync_data`
pub fn durable_sync(file: &File) -> io::Result<()> {
    #[cfg(target_os = "linux")]
    {
        use std::os::unix::io::AsRawFd;
        // SAFETY: the fd comes from a live File and stays open for the call.
        let rc = unsafe { libc::fdatasync(file.as_raw_fd()) };
        if rc == 0 {
            Ok(())
        } else {
            Err(io::Error::last_os_error())
        }
    }

    #[cfg(any(target_os = "macos", target_os = "ios"))]
    {
        use std::os::unix::io::AsRawFd;
        // SAFETY: the fd comes from a live File and stays open for the call.
        let rc = unsafe { libc::fcntl(file.as_raw_fd(), libc::F_FULLFSYNC) };
        if rc == 0 {
            Ok(())
        } else {
            Err(io::Error::last_os_error())
        }
    }

    #[cfg(target_os = "windows")]
    {
        use std::os::windows::io::AsRawHandle;
        use winapi::um::fileapi::FlushFileBuffers;
        // SAFETY: the handle comes from a live File and stays open for
        // the call.
        let rc = unsafe { FlushFileBuffers(file.as_raw_handle() as *mut _) };
        if rc != 0 {
            Ok(())
        } else {
            Err(io::Error::last_os_error())
        }
    }

    #[cfg(not(any(
        target_os = "linux",
        target_os = "macos",
        target_os = "ios",
        target_os = "windows"
    )))]
    {
        file.sync_data()
    }
}

/// Persist a completed rename by syncing the directory that holds it.
/// Directories cannot be opened as files on Windows; the rename itself is
/// still atomic there, so this is a no-op.
pub fn sync_dir(path: &Path) -> io::Result<()> {
    #[cfg(unix)]
    {
        let dir = File::open(path)?;
        durable_sync(&dir)
    }
    #[cfg(not(unix))]
    {
        let _ = path;
        Ok(())
    }
}

/// Create `path` (and missing parents) if it does not exist, mode 0755
/// on unix.
pub fn ensure_dir(path: &Path) -> io::Result<()> {
    if path.is_dir() {
        return Ok(());
    }
    let mut builder = fs::DirBuilder::new();
    builder.recursive(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        builder.mode(0o755);
    }
    builder.create(path)
}

/// Which side of a fork the caller landed on.
#[cfg(unix)]
#[derive(Debug, Clone, Copy)]
pub enum Fork {
    /// Parent process; carries the child's pid.
    Parent(i32),
    /// Child process.
    Child,
}

/// Fork the process.
#[cfg(unix)]
pub fn fork() -> io::Result<Fork> {
    // SAFETY: fork has no preconditions; the child only does file I/O and
    // exits via exit_child without touching the parent's runtime state.
    match unsafe { libc::fork() } {
        -1 => Err(io::Error::last_os_error()),
        0 => Ok(Fork::Child),
        pid => Ok(Fork::Parent(pid)),
    }
}

/// Terminate a forked child immediately. `_exit` skips atexit handlers and
/// stdio teardown, which belong to the parent.
#[cfg(unix)]
pub fn exit_child(code: i32) -> ! {
    unsafe { libc::_exit(code) }
}
