//! Saved pipeline library
//!
//! A user's collection of named launch descriptions: a JSON index file,
//! optional one-file-per-pipeline `.gstpipe` backups, built-in templates for
//! a first run, and a record of which entry is currently active.

pub mod item;
pub mod status;
pub mod storage;
pub mod templates;

pub use item::{PipelineCategory, PipelineItem};
pub use status::StatusTracker;
pub use storage::{sanitize_file_name, PipelineLibrary, SortOrder};

/// Error type for library operations
#[derive(Debug, thiserror::Error)]
pub enum LibraryError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid pipeline data: {0}")]
    Invalid(String),

    #[error("No pipeline with id {0}")]
    NotFound(String),
}

pub type Result<T> = std::result::Result<T, LibraryError>;

#[cfg(test)]
mod tests;
