//! Encoding jobs.
//!
//! A job turns one stored source image into one stored GIF:
//!
//! ```text
//! Pending -> FetchingSource -> Processing -> Encoding -> Persisting -> Completed
//!     \____________\_______________\____________\____________\______> Failed(kind)
//! ```
//!
//! Decoding, effects and GIF encoding run on tokio's blocking pool; only the
//! blob store calls await I/O. Each transition is logged and recorded, and
//! checks the job's cancellation token. Cancellation takes effect between
//! transitions or while the source download is pending; a blocking worker
//! is always awaited, so nothing touches a temp file after its guard is
//! gone. Temp files are held in [`TempGuard`]s so they are released on every
//! path, including cancellation and panics in worker tasks.

use std::future::Future;
use std::fs::OpenOptions;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::Arc;

use gifmill_core::{
    EffectEngine, EffectPipeline, Frame, GifError, GifSettings, PixelBuffer, SkippedEffect,
    StreamingGifEncoder,
};
use tokio_util::sync::CancellationToken;

use crate::error::{JobError, JobErrorKind};
use crate::request::{JobOptions, JobResponse};
use crate::storage::{BlobId, BlobStore, StorageError};
use crate::tempfiles::{TempFileManager, TempGuard};

/// Lifecycle state of an [`EncodingJob`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    Pending,
    FetchingSource,
    Processing,
    Encoding,
    Persisting,
    Completed,
    Failed(JobErrorKind),
}

impl JobState {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobState::Completed | JobState::Failed(_))
    }
}

/// What a successful job produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobReport {
    pub artifact: BlobId,
    pub frame_count: usize,
    /// Effects omitted because they failed.
    pub skipped: Vec<SkippedEffect>,
}

/// Final result plus the states the job went through.
#[derive(Debug)]
pub struct JobOutcome {
    pub result: Result<JobReport, JobError>,
    pub history: Vec<JobState>,
}

impl JobOutcome {
    /// The terminal state.
    pub fn state(&self) -> JobState {
        self.history.last().copied().unwrap_or(JobState::Pending)
    }

    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }

    pub fn response(&self) -> JobResponse {
        JobResponse::from(&self.result)
    }
}

/// Shared collaborators for jobs. Cheap to clone.
pub struct JobContext<S, T> {
    pub store: Arc<S>,
    pub temps: Arc<T>,
    pub engine: Arc<dyn EffectEngine>,
    /// Id prefix for stored GIFs.
    pub output_prefix: String,
    pub parallel_effects: bool,
}

impl<S, T> Clone for JobContext<S, T> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            temps: Arc::clone(&self.temps),
            engine: Arc::clone(&self.engine),
            output_prefix: self.output_prefix.clone(),
            parallel_effects: self.parallel_effects,
        }
    }
}

/// One source image to one GIF.
pub struct EncodingJob<S, T> {
    ctx: JobContext<S, T>,
    source: BlobId,
    options: JobOptions,
    cancel: CancellationToken,
    state: JobState,
    history: Vec<JobState>,
}

impl<S, T> EncodingJob<S, T>
where
    S: BlobStore + 'static,
    T: TempFileManager + 'static,
{
    pub fn new(ctx: JobContext<S, T>, source: BlobId, options: JobOptions) -> Self {
        Self {
            ctx,
            source,
            options,
            cancel: CancellationToken::new(),
            state: JobState::Pending,
            history: vec![JobState::Pending],
        }
    }

    /// Use `token` to cancel this job.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Token that cancels this job.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn state(&self) -> JobState {
        self.state
    }

    /// Run to a terminal state.
    pub async fn run(mut self) -> JobOutcome {
        log::debug!("Job for {} starting", self.source);
        let result = self.execute().await;

        match &result {
            Ok(report) => {
                self.record(JobState::Completed);
                log::info!(
                    "Job for {} completed: {} ({} frame(s), {} skipped)",
                    self.source,
                    report.artifact,
                    report.frame_count,
                    report.skipped.len()
                );
            }
            Err(err) => {
                self.record(JobState::Failed(err.kind()));
                log::warn!("Job for {} failed: {}", self.source, err);
            }
        }

        JobOutcome {
            result,
            history: self.history,
        }
    }

    async fn execute(&mut self) -> Result<JobReport, JobError> {
        let temps = Arc::clone(&self.ctx.temps);
        let store = Arc::clone(&self.ctx.store);

        // FetchingSource: download, spill to disk, decode from the spilled file
        self.advance(JobState::FetchingSource)?;
        let source_file = TempGuard::acquire(&*temps)?;
        let bytes = self.cancellable(store.get(&self.source)).await?;
        let spill = source_file.path().to_path_buf();
        tokio::fs::write(&spill, bytes)
            .await
            .map_err(|e| StorageError::Transport(format!("{}: {}", spill.display(), e)))?;
        let base = blocking(move || {
            let bytes = std::fs::read(&spill)
                .map_err(|e| JobError::Input(format!("source image: {}", e)))?;
            Ok(PixelBuffer::decode(&bytes)?)
        })
        .await?;
        release(source_file);

        // Processing
        self.advance(JobState::Processing)?;
        let engine = Arc::clone(&self.ctx.engine);
        let config = self.options.pipeline_config(self.ctx.parallel_effects);
        let effects = self.options.effects.clone();
        let output = blocking(move || {
            Ok(EffectPipeline::new(&*engine, config).apply(&base, &effects)?)
        })
        .await?;

        // Encoding
        self.advance(JobState::Encoding)?;
        let artifact_file = TempGuard::acquire(&*temps)?;
        let target = artifact_file.path().to_path_buf();
        let settings = self.options.gif_settings();
        let frames = output.frames;
        let frame_count = frames.len();
        blocking(move || Ok(write_gif(&target, &frames, settings)?)).await?;

        // Persisting
        self.advance(JobState::Persisting)?;
        let gif = tokio::fs::read(artifact_file.path()).await.map_err(|e| {
            JobError::Encoding(format!("{}: {}", artifact_file.path().display(), e))
        })?;
        let artifact = store.put(&self.ctx.output_prefix, "gif", gif).await?;
        release(artifact_file);

        Ok(JobReport {
            artifact,
            frame_count,
            skipped: output.skipped,
        })
    }

    fn advance(&mut self, next: JobState) -> Result<(), JobError> {
        if self.cancel.is_cancelled() {
            return Err(JobError::Cancelled);
        }
        self.record(next);
        Ok(())
    }

    fn record(&mut self, next: JobState) {
        log::debug!("Job for {}: {:?} -> {:?}", self.source, self.state, next);
        self.state = next;
        self.history.push(next);
    }

    /// Await `fut` unless the job is cancelled first.
    async fn cancellable<F, R, E>(&self, fut: F) -> Result<R, JobError>
    where
        F: Future<Output = Result<R, E>>,
        JobError: From<E>,
    {
        tokio::select! {
            _ = self.cancel.cancelled() => Err(JobError::Cancelled),
            result = fut => result.map_err(JobError::from),
        }
    }
}

/// Run `f` on the blocking pool. A panic there becomes an `EncodingError`.
async fn blocking<F, R>(f: F) -> Result<R, JobError>
where
    F: FnOnce() -> Result<R, JobError> + Send + 'static,
    R: Send + 'static,
{
    tokio::task::spawn_blocking(f).await?
}

/// Release a temp file now, logging failures.
fn release<T: TempFileManager + ?Sized>(guard: TempGuard<'_, T>) {
    if let Err(e) = guard.release() {
        log::warn!("{}", e);
    }
}

/// Stream `frames` into the existing file at `path`.
///
/// The file is opened, never created, so a released temp file stays gone.
fn write_gif(path: &Path, frames: &[Frame], settings: GifSettings) -> Result<(), GifError> {
    let first = frames.first().ok_or(GifError::EmptyDocument)?;
    let file = OpenOptions::new().write(true).truncate(true).open(path)?;

    let mut encoder = StreamingGifEncoder::new(BufWriter::new(file));
    encoder.start(first.width(), first.height())?;
    encoder.configure(settings)?;
    for frame in frames {
        encoder.add_frame(frame)?;
    }
    encoder.into_inner()?.flush()?;
    Ok(())
}
