//! Deduplicating sink
//!
//! Finished listings from every seed funnel into one sink, which decides per
//! listing whether to store it, replace the stored copy, or drop it.

mod dedup;

pub use dedup::DedupSink;

use crate::storage::StorageError;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Outcome of offering a listing to the sink
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Decision {
    New,
    Updated,
    Skipped,
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::New => "new",
            Self::Updated => "updated",
            Self::Skipped => "skipped",
        })
    }
}

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("Failed to store listing: {0}")]
    Storage(#[from] StorageError),

    #[error("Failed to write seen ids to {path}: {source}")]
    Flush {
        path: PathBuf,
        #[source]
        source: StorageError,
    },
}
