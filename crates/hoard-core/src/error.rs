//! Error types for Hoard operations
//!
//! Every fallible operation in the crate reports a `StoreError`, which
//! carries enough context (path, offset, reason) to diagnose a failure
//! without re-running it.

use std::error::Error;
use std::fmt;
use std::io;
use std::path::PathBuf;

/// Hoard error types with detailed context
#[derive(Debug, Clone)]
pub enum StoreError {
    /// I/O operation failed
    Io {
        /// The file path where the error occurred
        path: Option<PathBuf>,
        /// The underlying I/O error kind
        kind: io::ErrorKind,
        /// Human-readable description
        message: String,
    },

    /// A snapshot file did not start with the expected signature
    BadMagic {
        /// File being read
        path: PathBuf,
        /// The four bytes actually found
        found: [u8; 4],
    },

    /// A snapshot file carries a format version this build cannot parse
    BadVersion {
        /// File being read
        path: PathBuf,
        /// The four version digits actually found
        found: [u8; 4],
    },

    /// A file ended early or contained a malformed frame
    Corrupt {
        /// File being read
        path: PathBuf,
        /// Byte offset where the problem was detected
        offset: u64,
        /// Description of the problem
        reason: String,
    },

    /// Close walked the table and freed a different number of records
    /// than the live record count claimed
    InvariantViolation {
        /// Records the table claimed to hold
        expected: u64,
        /// Records actually reachable and freed
        actual: u64,
    },
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::Io { path, kind, message } => {
                if let Some(path) = path {
                    write!(f, "I/O error in {}: {} ({})", path.display(), message, kind)
                } else {
                    write!(f, "I/O error: {} ({})", message, kind)
                }
            }

            StoreError::BadMagic { path, found } => {
                write!(
                    f,
                    "{} is not a valid snapshot: signature {:02x}{:02x}{:02x}{:02x}",
                    path.display(),
                    found[0],
                    found[1],
                    found[2],
                    found[3]
                )
            }

            StoreError::BadVersion { path, found } => {
                write!(
                    f,
                    "cannot parse snapshot version {:?} in {}",
                    String::from_utf8_lossy(found),
                    path.display()
                )
            }

            StoreError::Corrupt { path, offset, reason } => {
                write!(f, "{} corrupt at offset {}: {}", path.display(), offset, reason)
            }

            StoreError::InvariantViolation { expected, actual } => {
                write!(
                    f,
                    "record count mismatch on close: expected {}, freed {}",
                    expected, actual
                )
            }
        }
    }
}

impl Error for StoreError {}

/// Convert std::io::Error to StoreError::Io
impl From<io::Error> for StoreError {
    fn from(err: io::Error) -> Self {
        StoreError::Io {
            path: None,
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}

/// Result type alias for Hoard operations
pub type StoreResult<T> = Result<T, StoreError>;
