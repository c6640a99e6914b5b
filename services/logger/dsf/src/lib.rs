//! Sample id extension and DSF text output for sensor hub logs.
//!
//! This crate turns decoded sensor samples into DSF text rows. Each sensor
//! stream gets its own [`SampleIdExtender`] so that the 8-bit report
//! sequence numbers become monotonically increasing 64-bit sample ids, and
//! its own one-time header block.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod sample_id;
pub mod writer;

use std::path::PathBuf;
use thiserror::Error;

// Re-export main types
pub use sample_id::SampleIdExtender;
pub use writer::{DsfWriter, Orientation};

/// DSF output errors
#[derive(Error, Debug)]
pub enum DsfError {
    /// Output file could not be created
    #[error("unable to open {path}: {source}")]
    Open {
        /// Requested path
        path: PathBuf,
        /// Underlying error
        source: std::io::Error,
    },
    /// Write failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
