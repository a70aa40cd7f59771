//! Service configuration.
//!
//! Settings come from three layers, later ones winning:
//!
//! 1. Built-in defaults ([`ServiceConfig::default`]).
//! 2. An optional JSON file named by `GIFMILL_CONFIG`. Missing fields keep
//!    their defaults.
//! 3. Environment overrides: `GIFMILL_BLOB_ROOT`, `GIFMILL_TEMP_DIR` and
//!    `GIFMILL_PARALLEL_EFFECTS`.

use std::path::{Path, PathBuf};

use gifmill_core::palette::DEFAULT_QUALITY;
use gifmill_core::pipeline::{DEFAULT_DELAY_MS, DEFAULT_FRAME_SIZE};
use gifmill_core::Effect;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Names the JSON config file.
pub const CONFIG_ENV: &str = "GIFMILL_CONFIG";
/// Overrides `storage.blob_root`.
pub const BLOB_ROOT_ENV: &str = "GIFMILL_BLOB_ROOT";
/// Overrides `temp_dir`.
pub const TEMP_DIR_ENV: &str = "GIFMILL_TEMP_DIR";
/// Overrides `parallel_effects` (`true`/`false`/`1`/`0`).
pub const PARALLEL_EFFECTS_ENV: &str = "GIFMILL_PARALLEL_EFFECTS";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid value '{value}' for {key}")]
    InvalidValue { key: &'static str, value: String },
}

/// Root configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Blob storage layout.
    pub storage: StorageConfig,
    /// Directory for job temp files.
    pub temp_dir: PathBuf,
    /// Evaluate a job's effects in parallel.
    pub parallel_effects: bool,
    /// Options applied when a request leaves them out.
    pub defaults: JobDefaults,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        ServiceConfig {
            storage: StorageConfig::default(),
            temp_dir: std::env::temp_dir().join("gifmill"),
            parallel_effects: false,
            defaults: JobDefaults::default(),
        }
    }
}

/// Where blobs live.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Root directory of the filesystem blob store.
    pub blob_root: PathBuf,
    /// Id prefix for generated GIFs.
    pub output_prefix: String,
    /// Id prefix for uploaded source images.
    pub upload_prefix: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        StorageConfig {
            blob_root: PathBuf::from("gifmill-data"),
            output_prefix: "gif_output".to_string(),
            upload_prefix: "uploads".to_string(),
        }
    }
}

/// Per-job option defaults and limits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct JobDefaults {
    pub target_size: u32,
    pub effects: Vec<Effect>,
    pub frame_delay_ms: u32,
    pub quality: u8,
    /// 0 loops forever, -1 plays once, n repeats n times.
    pub loop_count: i32,
    /// Largest accepted `targetSize`.
    pub max_target_size: u32,
}

impl Default for JobDefaults {
    fn default() -> Self {
        JobDefaults {
            target_size: DEFAULT_FRAME_SIZE,
            effects: Effect::DEFAULTS.to_vec(),
            frame_delay_ms: DEFAULT_DELAY_MS,
            quality: DEFAULT_QUALITY,
            loop_count: 0,
            max_target_size: 2048,
        }
    }
}

impl ServiceConfig {
    /// Load from `GIFMILL_CONFIG` (if set) and the process environment.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_with(|key| std::env::var(key).ok())
    }

    /// Load using `lookup` to read environment variables.
    pub fn load_with<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = match lookup(CONFIG_ENV) {
            Some(path) => Self::from_file(Path::new(&path))?,
            None => Self::default(),
        };
        config.apply_env(lookup)?;
        Ok(config)
    }

    /// Parse a JSON config file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Apply environment overrides.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(root) = lookup(BLOB_ROOT_ENV) {
            self.storage.blob_root = PathBuf::from(root);
        }
        if let Some(dir) = lookup(TEMP_DIR_ENV) {
            self.temp_dir = PathBuf::from(dir);
        }
        if let Some(value) = lookup(PARALLEL_EFFECTS_ENV) {
            self.parallel_effects = parse_bool(&value).ok_or(ConfigError::InvalidValue {
                key: PARALLEL_EFFECTS_ENV,
                value,
            })?;
        }
        Ok(())
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = ServiceConfig::default();
        assert_eq!(config.defaults.target_size, 256);
        assert_eq!(config.defaults.frame_delay_ms, 500);
        assert_eq!(config.defaults.quality, 10);
        assert_eq!(config.defaults.loop_count, 0);
        assert_eq!(
            config.defaults.effects,
            vec![Effect::Original, Effect::Grayscale, Effect::Invert]
        );
        assert_eq!(config.storage.output_prefix, "gif_output");
        assert!(!config.parallel_effects);
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config: ServiceConfig =
            serde_json::from_str(r#"{ "defaults": { "target_size": 128 } }"#).unwrap();
        assert_eq!(config.defaults.target_size, 128);
        assert_eq!(config.defaults.frame_delay_ms, 500);
        assert_eq!(config.storage, StorageConfig::default());
    }

    #[test]
    fn test_json_effects_are_identifiers() {
        let config: ServiceConfig =
            serde_json::from_str(r#"{ "defaults": { "effects": ["sepia", "blur"] } }"#).unwrap();
        assert_eq!(config.defaults.effects, vec![Effect::Sepia, Effect::Blur]);

        assert!(serde_json::from_str::<ServiceConfig>(r#"{ "defaults": { "effects": ["glitch"] } }"#).is_err());
    }

    #[test]
    fn test_env_overrides() {
        let config = ServiceConfig::load_with(env(&[
            (BLOB_ROOT_ENV, "/srv/blobs"),
            (TEMP_DIR_ENV, "/scratch"),
            (PARALLEL_EFFECTS_ENV, "true"),
        ]))
        .unwrap();

        assert_eq!(config.storage.blob_root, PathBuf::from("/srv/blobs"));
        assert_eq!(config.temp_dir, PathBuf::from("/scratch"));
        assert!(config.parallel_effects);
    }

    #[test]
    fn test_env_invalid_bool() {
        let result = ServiceConfig::load_with(env(&[(PARALLEL_EFFECTS_ENV, "sometimes")]));
        assert!(matches!(
            result,
            Err(ConfigError::InvalidValue {
                key: PARALLEL_EFFECTS_ENV,
                ..
            })
        ));
    }

    #[test]
    fn test_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gifmill.json");
        std::fs::write(&path, r#"{ "parallel_effects": true, "storage": { "output_prefix": "out" } }"#)
            .unwrap();

        let config = ServiceConfig::load_with(env(&[(CONFIG_ENV, path.to_str().unwrap())])).unwrap();
        assert!(config.parallel_effects);
        assert_eq!(config.storage.output_prefix, "out");
        assert_eq!(config.storage.upload_prefix, "uploads");
    }

    #[test]
    fn test_missing_config_file() {
        let result = ServiceConfig::load_with(env(&[(CONFIG_ENV, "/nonexistent/gifmill.json")]));
        assert!(matches!(result, Err(ConfigError::Read { .. })));
    }
}
