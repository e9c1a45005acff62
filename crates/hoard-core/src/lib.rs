//! Hoard Core — embeddable RAM-first key-value store
//!
//! Byte-string keys map to opaque byte-string values tagged with a
//! content-type. The whole data set lives in a chained hash table in RAM;
//! durability comes from two artifacts next to each other on disk:
//!
//! - **Append-only log** (`<name>.aol`): one framed command per mutation,
//!   replayed on open to rebuild the table.
//! - **Snapshot** (`<name>.dump`): a compact binary image of the entire
//!   table, written to a temp file and installed by atomic rename —
//!   optionally from a forked child so the store keeps serving.
//!
//! # Concurrency
//!
//! The store is single-threaded by contract: operations run to completion
//! on the calling thread and assume exclusive access. Embedders wanting
//! shared access wrap the store in their own lock. The only cross-process
//! parallelism is the background snapshot child, which works on the
//! copy-on-write image captured at fork time.

pub mod aol;
pub mod config;
pub mod dump;
pub mod error;
pub mod format;
pub mod hash;
pub mod index;
pub mod store;
pub mod sys;

// Re-export the embedder-facing surface
pub use config::Config;
pub use error::{StoreError, StoreResult};
pub use format::{DEFAULT_CONTENT_TYPE, KEY_MAX};
pub use index::PutOutcome;
pub use store::{Store, APPEND_ONLY};
