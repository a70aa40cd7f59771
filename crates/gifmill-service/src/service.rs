//! Request-level entry point: JSON request in, JSON response out.

use std::sync::Arc;

use gifmill_core::{EffectEngine, PixelBuffer};
use tokio_util::sync::CancellationToken;

use crate::config::{JobDefaults, ServiceConfig};
use crate::error::JobError;
use crate::job::{EncodingJob, JobContext};
use crate::request::{JobRequest, JobResponse};
use crate::storage::{BlobId, BlobStore, FsBlobStore, StorageError};
use crate::tempfiles::{LocalTempFiles, TempFileError, TempFileManager};

/// Runs job requests against one set of collaborators.
pub struct GifService<S, T> {
    ctx: JobContext<S, T>,
    defaults: JobDefaults,
    upload_prefix: String,
}

impl GifService<FsBlobStore, LocalTempFiles> {
    /// Filesystem-backed service as described by `config`.
    ///
    /// # Errors
    ///
    /// Fails when the scratch directory under `config.temp_dir` cannot be
    /// created.
    pub fn from_config(
        config: &ServiceConfig,
        engine: Arc<dyn EffectEngine>,
    ) -> Result<Self, TempFileError> {
        let ctx = JobContext {
            store: Arc::new(FsBlobStore::new(&config.storage.blob_root)),
            temps: Arc::new(LocalTempFiles::new(&config.temp_dir)?),
            engine,
            output_prefix: config.storage.output_prefix.clone(),
            parallel_effects: config.parallel_effects,
        };
        Ok(Self::new(
            ctx,
            config.defaults.clone(),
            config.storage.upload_prefix.clone(),
        ))
    }
}

impl<S, T> GifService<S, T>
where
    S: BlobStore + 'static,
    T: TempFileManager + 'static,
{
    pub fn new(ctx: JobContext<S, T>, defaults: JobDefaults, upload_prefix: String) -> Self {
        Self {
            ctx,
            defaults,
            upload_prefix,
        }
    }

    pub fn context(&self) -> &JobContext<S, T> {
        &self.ctx
    }

    /// Validate and run one request.
    pub async fn handle(&self, request: &JobRequest) -> JobResponse {
        self.handle_with_cancellation(request, CancellationToken::new())
            .await
    }

    /// Like [`handle`](Self::handle), stopping early once `cancel` fires.
    pub async fn handle_with_cancellation(
        &self,
        request: &JobRequest,
        cancel: CancellationToken,
    ) -> JobResponse {
        let (source, options) = match request.validate(&self.defaults) {
            Ok(parts) => parts,
            Err(err) => {
                log::warn!("Rejected request: {}", err);
                return JobResponse::failure(&err);
            }
        };

        EncodingJob::new(self.ctx.clone(), source, options)
            .with_cancellation(cancel)
            .run()
            .await
            .response()
    }

    /// Store a source image and return its reference.
    ///
    /// The bytes must decode as an image; `extension` names the stored file.
    pub async fn upload(&self, extension: &str, bytes: Vec<u8>) -> Result<BlobId, JobError> {
        if bytes.is_empty() {
            return Err(JobError::Input("image is empty".to_string()));
        }
        let candidate = bytes.clone();
        tokio::task::spawn_blocking(move || PixelBuffer::decode(&candidate)).await??;

        let id = self
            .ctx
            .store
            .put(&self.upload_prefix, extension, bytes)
            .await
            .map_err(|e| match e {
                StorageError::InvalidId(_) => JobError::Input(e.to_string()),
                other => JobError::Storage(other),
            })?;
        log::info!("Uploaded source image {}", id);
        Ok(id)
    }
}
