//! Error types for the auxetic pipeline

use std::path::PathBuf;

use thiserror::Error;

use crate::kernel::KernelError;

/// Main error type for lattice construction, analysis and post-processing
#[derive(Error, Debug)]
pub enum AuxeticError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Invalid geometry: {0}")]
    InvalidGeometry(String),

    #[error("'{operation}' is not allowed while the structure is {state}")]
    OutOfOrder {
        operation: &'static str,
        state: &'static str,
    },

    #[error("Unit cell {0} is not registered on this structure")]
    UnitCellNotFound(u32),

    #[error("Duplicate unit cell id {0}")]
    DuplicateId(u32),

    #[error("Kernel operation failed: {0}")]
    Kernel(#[from] KernelError),

    #[error("Job '{name}' finished with status {status}")]
    JobFailed { name: String, status: String },

    #[error("Results folder {0:?} already exists")]
    FolderExists(PathBuf),

    #[error("No result row at time {time:.2} for structure '{structure}'")]
    NoMatchingTimeRow { time: f64, structure: String },

    #[error("Degenerate strain at frame {frame_id}: {reason}")]
    DegenerateStrain { frame_id: usize, reason: String },

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

/// Result type for auxetic operations
pub type AuxeticResult<T> = Result<T, AuxeticError>;
