// TOML config adapter - Configuration hierarchy backed by TOML files
//
// Precedence: CLI > environment (TRIMGRID_*) > file > defaults.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{TrimGridError, TrimGridResult};
use crate::planner::EncoderSettings;
use crate::utils::logging::LogLevel;

/// Name of the config file looked up in the working directory
pub const LOCAL_CONFIG_FILE: &str = "trimgrid.toml";

/// Prefix of environment overrides
pub const ENV_PREFIX: &str = "TRIMGRID_";

/// Highest constant-quality value accepted by the H.265 encoders
const MAX_CRF: u8 = 51;

/// Application configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AppConfig {
    /// Transcoder binary
    pub ffmpeg_path: PathBuf,
    /// Probe binary
    pub ffprobe_path: PathBuf,
    /// Hardware H.265 encoder
    pub hw_encoder: String,
    /// Hardware decode accelerator passed to `-hwaccel`
    pub hw_decode_accel: String,
    /// Software H.265 encoder
    pub sw_encoder: String,
    pub crf: u8,
    pub preset: String,
    pub log_level: String,
    pub log_json: bool,
    /// Per-job timeout; jobs run until exit or cancellation when unset
    pub job_timeout_secs: Option<u64>,
    /// Rebase timeline times onto the opened source when durations differ
    pub scale_to_source: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        let encoder = EncoderSettings::default();
        Self {
            ffmpeg_path: encoder.program,
            ffprobe_path: PathBuf::from("ffprobe"),
            hw_encoder: encoder.hw_encoder,
            hw_decode_accel: encoder.hw_decode_accel,
            sw_encoder: encoder.sw_encoder,
            crf: encoder.crf,
            preset: encoder.preset,
            log_level: "info".to_string(),
            log_json: false,
            job_timeout_secs: None,
            scale_to_source: true,
        }
    }
}

/// Values given on the command line
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigOverrides {
    pub log_level: Option<String>,
    pub log_json: Option<bool>,
    pub job_timeout_secs: Option<u64>,
}

impl AppConfig {
    /// Parse a TOML document; absent keys keep their defaults
    pub fn from_toml_str(content: &str) -> TrimGridResult<Self> {
        toml::from_str(content).map_err(|e| TrimGridError::ConfigError {
            message: format!("Failed to parse TOML config: {}", e),
        })
    }

    pub fn load_file(path: &Path) -> TrimGridResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| TrimGridError::ConfigError {
            message: format!("Failed to read config file {}: {}", path.display(), e),
        })?;
        let config = Self::from_toml_str(&content)?;
        info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    pub fn to_toml_string(&self) -> TrimGridResult<String> {
        toml::to_string_pretty(self).map_err(|e| TrimGridError::ConfigError {
            message: format!("Failed to serialize config: {}", e),
        })
    }

    /// Apply `TRIMGRID_*` overrides read through `lookup`
    pub fn apply_env<F>(&mut self, lookup: F) -> TrimGridResult<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(&format!("{}{}", ENV_PREFIX, key));
        let mut applied = 0;

        if let Some(v) = var("FFMPEG_PATH") {
            self.ffmpeg_path = PathBuf::from(v);
            applied += 1;
        }
        if let Some(v) = var("FFPROBE_PATH") {
            self.ffprobe_path = PathBuf::from(v);
            applied += 1;
        }
        for (key, field) in [
            ("HW_ENCODER", &mut self.hw_encoder),
            ("HW_DECODE_ACCEL", &mut self.hw_decode_accel),
            ("SW_ENCODER", &mut self.sw_encoder),
            ("PRESET", &mut self.preset),
            ("LOG_LEVEL", &mut self.log_level),
        ] {
            if let Some(v) = var(key) {
                *field = v;
                applied += 1;
            }
        }
        if let Some(v) = var("CRF") {
            self.crf = parse_env("CRF", &v)?;
            applied += 1;
        }
        if let Some(v) = var("LOG_JSON") {
            self.log_json = parse_env("LOG_JSON", &v)?;
            applied += 1;
        }
        if let Some(v) = var("JOB_TIMEOUT_SECS") {
            self.job_timeout_secs = Some(parse_env("JOB_TIMEOUT_SECS", &v)?);
            applied += 1;
        }
        if let Some(v) = var("SCALE_TO_SOURCE") {
            self.scale_to_source = parse_env("SCALE_TO_SOURCE", &v)?;
            applied += 1;
        }

        if applied > 0 {
            debug!("Applied {} environment variable overrides", applied);
        }
        Ok(())
    }

    pub fn apply_overrides(&mut self, overrides: &ConfigOverrides) {
        if let Some(level) = &overrides.log_level {
            self.log_level = level.clone();
        }
        if let Some(json) = overrides.log_json {
            self.log_json = json;
        }
        if let Some(secs) = overrides.job_timeout_secs {
            self.job_timeout_secs = Some(secs);
        }
    }

    /// Reject values the rest of the application cannot work with
    pub fn validate(&self) -> TrimGridResult<()> {
        let invalid = |message: String| Err(TrimGridError::ConfigError { message });

        self.log_level()?;
        if self.crf > MAX_CRF {
            return invalid(format!("CRF value cannot exceed {}", MAX_CRF));
        }
        if self.job_timeout_secs == Some(0) {
            return invalid("job_timeout_secs must be greater than zero".to_string());
        }
        for (name, value) in [
            ("ffmpeg_path", self.ffmpeg_path.as_os_str().is_empty()),
            ("ffprobe_path", self.ffprobe_path.as_os_str().is_empty()),
            ("hw_encoder", self.hw_encoder.trim().is_empty()),
            ("hw_decode_accel", self.hw_decode_accel.trim().is_empty()),
            ("sw_encoder", self.sw_encoder.trim().is_empty()),
            ("preset", self.preset.trim().is_empty()),
        ] {
            if value {
                return invalid(format!("{} must not be empty", name));
            }
        }
        Ok(())
    }

    /// Encoder settings for the job planner
    pub fn encoder_settings(&self) -> EncoderSettings {
        EncoderSettings {
            program: self.ffmpeg_path.clone(),
            hw_encoder: self.hw_encoder.clone(),
            hw_decode_accel: self.hw_decode_accel.clone(),
            sw_encoder: self.sw_encoder.clone(),
            crf: self.crf,
            preset: self.preset.clone(),
        }
    }

    pub fn log_level(&self) -> TrimGridResult<LogLevel> {
        self.log_level.parse()
    }

    pub fn job_timeout(&self) -> Option<Duration> {
        self.job_timeout_secs.map(Duration::from_secs)
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, value: &str) -> TrimGridResult<T> {
    value.trim().parse().map_err(|_| TrimGridError::ConfigError {
        message: format!("Invalid value for {}{}: '{}'", ENV_PREFIX, key, value),
    })
}

/// Loads the configuration hierarchy
pub struct TomlConfigAdapter;

impl TomlConfigAdapter {
    /// Resolve, load and validate the effective configuration.
    ///
    /// An explicit path must exist; the implicit locations are optional.
    pub fn load(explicit: Option<&Path>, overrides: &ConfigOverrides) -> TrimGridResult<AppConfig> {
        let mut config = match explicit {
            Some(path) => AppConfig::load_file(path)?,
            None => match Self::default_config_paths().into_iter().find(|p| p.is_file()) {
                Some(path) => AppConfig::load_file(&path)?,
                None => {
                    debug!("No config file found, using defaults");
                    AppConfig::default()
                }
            },
        };

        config.apply_env(|key| std::env::var(key).ok())?;
        config.apply_overrides(overrides);
        config.validate()?;
        Ok(config)
    }

    /// Implicit config locations, in lookup order
    pub fn default_config_paths() -> Vec<PathBuf> {
        let mut paths = vec![PathBuf::from(LOCAL_CONFIG_FILE)];
        if let Some(dir) = Self::user_config_dir() {
            paths.push(dir.join("trimgrid").join("config.toml"));
        }
        paths
    }

    fn user_config_dir() -> Option<PathBuf> {
        if cfg!(windows) {
            std::env::var_os("APPDATA").map(PathBuf::from)
        } else {
            std::env::var_os("XDG_CONFIG_HOME")
                .map(PathBuf::from)
                .or_else(|| std::env::var_os("HOME").map(|home| PathBuf::from(home).join(".config")))
        }
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
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_are_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.hw_encoder, "hevc_nvenc");
        assert_eq!(config.crf, 23);
        assert_eq!(config.job_timeout(), None);
        assert_eq!(config.encoder_settings(), EncoderSettings::default());
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let config = AppConfig::from_toml_str("crf = 28\nhw_encoder = \"hevc_qsv\"\n").unwrap();
        assert_eq!(config.crf, 28);
        assert_eq!(config.hw_encoder, "hevc_qsv");
        assert_eq!(config.preset, "medium");
    }

    #[test]
    fn test_malformed_file_is_error() {
        assert!(AppConfig::from_toml_str("crf = \"high\"").is_err());
        assert!(AppConfig::from_toml_str("unknown_key = 1").is_err());
    }

    #[test]
    fn test_toml_round_trip() {
        let mut config = AppConfig::default();
        config.job_timeout_secs = Some(600);
        let text = config.to_toml_string().unwrap();
        assert_eq!(AppConfig::from_toml_str(&text).unwrap(), config);
    }

    #[test]
    fn test_env_overrides_file() {
        let mut config = AppConfig::from_toml_str("preset = \"slow\"\ncrf = 20").unwrap();
        config
            .apply_env(env(&[
                ("TRIMGRID_CRF", "30"),
                ("TRIMGRID_JOB_TIMEOUT_SECS", "90"),
                ("TRIMGRID_SCALE_TO_SOURCE", "false"),
            ]))
            .unwrap();
        assert_eq!(config.preset, "slow");
        assert_eq!(config.crf, 30);
        assert_eq!(config.job_timeout(), Some(Duration::from_secs(90)));
        assert!(!config.scale_to_source);
    }

    #[test]
    fn test_bad_env_value_is_error() {
        let mut config = AppConfig::default();
        assert!(config.apply_env(env(&[("TRIMGRID_LOG_JSON", "maybe")])).is_err());
    }

    #[test]
    fn test_cli_overrides_env() {
        let mut config = AppConfig::default();
        config.apply_env(env(&[("TRIMGRID_LOG_LEVEL", "warn")])).unwrap();
        config.apply_overrides(&ConfigOverrides {
            log_level: Some("debug".to_string()),
            log_json: Some(true),
            job_timeout_secs: None,
        });
        assert_eq!(config.log_level, "debug");
        assert!(config.log_json);
    }

    #[test]
    fn test_validation() {
        let mut config = AppConfig::default();
        config.crf = 52;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.log_level = "loud".to_string();
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.sw_encoder = " ".to_string();
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.job_timeout_secs = Some(0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_explicit_missing_file_is_error() {
        let dir = tempfile::TempDir::new().unwrap();
        let missing = dir.path().join("nope.toml");
        assert!(TomlConfigAdapter::load(Some(&missing), &ConfigOverrides::default()).is_err());
    }

    #[test]
    fn test_load_explicit_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "sw_encoder = \"libx265\"\npreset = \"fast\"\n").unwrap();
        let config = TomlConfigAdapter::load(
            Some(&path),
            &ConfigOverrides {
                job_timeout_secs: Some(5),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(config.preset, "fast");
        assert_eq!(config.job_timeout_secs, Some(5));
    }
}
