//! Job-level errors.

use std::fmt;

use gifmill_core::{GifError, PipelineError, PixelError};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::storage::StorageError;
use crate::tempfiles::TempFileError;

/// Why a job failed. Every failure is reported to the caller as one of these.
#[derive(Debug, Error)]
pub enum JobError {
    /// Missing or invalid request data, or an undecodable source image.
    #[error("invalid input: {0}")]
    Input(String),

    /// Every requested effect failed.
    #[error("no frames produced: all {attempted} effect(s) failed")]
    NoFramesProduced { attempted: usize },

    /// The GIF could not be written.
    #[error("encoding failed: {0}")]
    Encoding(String),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("job cancelled")]
    Cancelled,
}

/// The `errorKind` reported in job responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JobErrorKind {
    InputError,
    NoFramesProduced,
    EncodingError,
    StorageError,
    Cancelled,
}

impl JobErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            JobErrorKind::InputError => "InputError",
            JobErrorKind::NoFramesProduced => "NoFramesProduced",
            JobErrorKind::EncodingError => "EncodingError",
            JobErrorKind::StorageError => "StorageError",
            JobErrorKind::Cancelled => "Cancelled",
        }
    }
}

impl fmt::Display for JobErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl JobError {
    pub fn kind(&self) -> JobErrorKind {
        match self {
            JobError::Input(_) => JobErrorKind::InputError,
            JobError::NoFramesProduced { .. } => JobErrorKind::NoFramesProduced,
            JobError::Encoding(_) => JobErrorKind::EncodingError,
            JobError::Storage(_) => JobErrorKind::StorageError,
            JobError::Cancelled => JobErrorKind::Cancelled,
        }
    }
}

impl From<PipelineError> for JobError {
    fn from(err: PipelineError) -> Self {
        match err {
            PipelineError::NoFramesProduced { attempted } => JobError::NoFramesProduced { attempted },
            other => JobError::Input(other.to_string()),
        }
    }
}

impl From<PixelError> for JobError {
    fn from(err: PixelError) -> Self {
        JobError::Input(format!("source image: {}", err))
    }
}

impl From<GifError> for JobError {
    fn from(err: GifError) -> Self {
        JobError::Encoding(err.to_string())
    }
}

impl From<TempFileError> for JobError {
    fn from(err: TempFileError) -> Self {
        JobError::Storage(StorageError::Transport(err.to_string()))
    }
}

impl From<tokio::task::JoinError> for JobError {
    fn from(err: tokio::task::JoinError) -> Self {
        JobError::Encoding(format!("worker task failed: {}", err))
    }
}
