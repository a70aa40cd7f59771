//! Gifmill Service - encoding jobs and their collaborators
//!
//! This crate runs [`gifmill_core`] as a job service: it fetches source
//! images from a [`BlobStore`], manages scratch files through a
//! [`TempFileManager`], drives each [`EncodingJob`] through its lifecycle and
//! speaks the JSON request/response format used by callers.

pub mod config;
pub mod error;
pub mod job;
pub mod request;
pub mod service;
pub mod storage;
pub mod tempfiles;

pub use config::{ConfigError, JobDefaults, ServiceConfig};
pub use error::{JobError, JobErrorKind};
pub use job::{EncodingJob, JobContext, JobOutcome, JobReport, JobState};
pub use request::{JobOptions, JobRequest, JobResponse, UploadResponse};
pub use service::GifService;
pub use storage::{BlobId, BlobStore, FsBlobStore, MemoryBlobStore, StorageError};
pub use tempfiles::{CleanupError, LocalTempFiles, TempFileManager, TempGuard, TempHandle};
