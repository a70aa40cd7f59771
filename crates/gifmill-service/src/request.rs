//! JSON request and response shapes for job invocation.
//!
//! ```json
//! { "sourceImageRef": "uploads/cat.png",
//!   "options": { "targetSize": 256, "effects": ["original", "invert"],
//!                "frameDelayMs": 500, "quality": 10, "loopCount": 0 } }
//! ```
//!
//! Every option is optional. `imageSize` and `frameDelay` are accepted as
//! aliases of `targetSize` and `frameDelayMs`.

use gifmill_core::palette::{MAX_QUALITY, MIN_QUALITY};
use gifmill_core::{Effect, GifSettings, PipelineConfig};
use serde::{Deserialize, Serialize};

use crate::config::JobDefaults;
use crate::error::{JobError, JobErrorKind};
use crate::job::JobReport;
use crate::storage::BlobId;

/// A job invocation as received.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobRequest {
    #[serde(default)]
    pub source_image_ref: String,
    #[serde(default)]
    pub options: RequestOptions,
}

/// Raw, unvalidated options.
///
/// Numbers are kept wide so out-of-range values become input errors instead
/// of JSON parse failures.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestOptions {
    #[serde(alias = "imageSize", skip_serializing_if = "Option::is_none")]
    pub target_size: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub effects: Option<Vec<String>>,
    #[serde(alias = "frameDelay", skip_serializing_if = "Option::is_none")]
    pub frame_delay_ms: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quality: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub loop_count: Option<i64>,
}

/// Validated job options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobOptions {
    /// Edge length of the square output.
    pub target_size: u32,
    /// Effects in frame order. May be empty; the job then produces no frames.
    pub effects: Vec<Effect>,
    pub frame_delay_ms: u32,
    pub quality: u8,
    /// `Some(0)` loops forever, `None` plays once.
    pub loop_count: Option<u16>,
}

impl JobOptions {
    /// Pipeline settings for these options.
    pub fn pipeline_config(&self, parallel: bool) -> PipelineConfig {
        PipelineConfig {
            parallel,
            ..PipelineConfig::square(self.target_size, self.frame_delay_ms)
        }
    }

    /// Encoder settings for these options.
    pub fn gif_settings(&self) -> GifSettings {
        GifSettings {
            loop_count: self.loop_count,
            frame_delay_ms: self.frame_delay_ms,
            quality: self.quality,
        }
    }
}

impl JobRequest {
    /// Validate into a source reference and options, filling gaps from
    /// `defaults`.
    ///
    /// # Errors
    ///
    /// `JobError::Input` for a missing source reference, an unknown effect or
    /// an out-of-range number.
    pub fn validate(&self, defaults: &JobDefaults) -> Result<(BlobId, JobOptions), JobError> {
        let source = self.source_image_ref.trim();
        if source.is_empty() {
            return Err(JobError::Input("sourceImageRef is required".to_string()));
        }
        Ok((BlobId::from(source), self.options.resolve(defaults)?))
    }
}

impl RequestOptions {
    /// Apply defaults and range checks.
    pub fn resolve(&self, defaults: &JobDefaults) -> Result<JobOptions, JobError> {
        let target_size = in_range(
            "targetSize",
            self.target_size.unwrap_or(defaults.target_size as i64),
            1,
            defaults.max_target_size as i64,
        )? as u32;

        let frame_delay_ms = in_range(
            "frameDelayMs",
            self.frame_delay_ms.unwrap_or(defaults.frame_delay_ms as i64),
            1,
            u16::MAX as i64 * 10,
        )? as u32;

        let quality = in_range(
            "quality",
            self.quality.unwrap_or(defaults.quality as i64),
            MIN_QUALITY as i64,
            MAX_QUALITY as i64,
        )? as u8;

        let loop_count = match in_range(
            "loopCount",
            self.loop_count.unwrap_or(defaults.loop_count as i64),
            -1,
            u16::MAX as i64,
        )? {
            -1 => None,
            n => Some(n as u16),
        };

        let effects = match &self.effects {
            Some(names) => names
                .iter()
                .map(|name| {
                    name.parse::<Effect>()
                        .map_err(|e| JobError::Input(e.to_string()))
                })
                .collect::<Result<Vec<_>, _>>()?,
            None => defaults.effects.clone(),
        };

        Ok(JobOptions {
            target_size,
            effects,
            frame_delay_ms,
            quality,
            loop_count,
        })
    }
}

fn in_range(field: &str, value: i64, min: i64, max: i64) -> Result<i64, JobError> {
    if (min..=max).contains(&value) {
        Ok(value)
    } else {
        Err(JobError::Input(format!(
            "{} must be between {} and {}, got {}",
            field, min, max, value
        )))
    }
}

/// Job result as returned to the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artifact_ref: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frame_count: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skipped_effects: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<JobErrorKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl JobResponse {
    pub fn success(report: &JobReport) -> Self {
        JobResponse {
            success: true,
            artifact_ref: Some(report.artifact.to_string()),
            frame_count: Some(report.frame_count),
            skipped_effects: Some(report.skipped.iter().map(|s| s.effect.to_string()).collect()),
            error_kind: None,
            message: None,
        }
    }

    pub fn failure(err: &JobError) -> Self {
        JobResponse {
            success: false,
            artifact_ref: None,
            frame_count: None,
            skipped_effects: None,
            error_kind: Some(err.kind()),
            message: Some(err.to_string()),
        }
    }
}

impl From<&Result<JobReport, JobError>> for JobResponse {
    fn from(result: &Result<JobReport, JobError>) -> Self {
        match result {
            Ok(report) => JobResponse::success(report),
            Err(err) => JobResponse::failure(err),
        }
    }
}

/// Result of storing a source image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    pub success: bool,
    pub source_image_ref: String,
}
