//! Configuration management for the Veristat pipeline service
//!
//! Handles loading, parsing, and validating configuration from TOML files
//! and environment variables. Every pipeline stage receives an immutable
//! snapshot at construction; nothing reads ambient global state, and
//! out-of-range values are rejected at load time rather than clamped.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, ConfigResult};

/// Main configuration structure for the pipeline service
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Emulator launch defaults
    pub emulator: EmulatorConfig,

    /// Bottleneck classification thresholds
    pub thresholds: ThresholdConfig,

    /// Anomaly scoring configuration
    pub anomaly: AnomalyConfig,

    /// Persistence configuration
    pub storage: StorageConfig,

    /// HTTP server configuration
    pub server: ServerConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Defaults for launching the telemetry producer
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmulatorConfig {
    /// Run duration in seconds
    pub duration_sec: u64,

    /// Sampling rate in lines per second
    pub hz: u32,

    /// Seed for the emulator's metric synthesis
    pub seed: u64,
}

/// Thresholds for the bottleneck classifier. All checks are strictly
/// greater-than; the boundary value itself does not trigger a finding.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ThresholdConfig {
    /// Tail latency warning threshold in milliseconds
    pub latency_p95_warn_ms: f64,

    /// Mean cache miss ratio warning threshold
    pub cache_miss_warn: f64,

    /// Error rate warning threshold
    pub error_rate_warn: f64,
}

/// Anomaly scorer configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnomalyConfig {
    /// Expected outlier fraction in the synthesized neighborhood,
    /// strictly inside (0, 1)
    pub contamination: f64,

    /// Seed for neighborhood synthesis and tree construction. `None` opts
    /// into entropy seeding, making scores non-reproducible call-to-call.
    pub seed: Option<u64>,
}

/// Persistence configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// SQLite database path
    pub db_path: PathBuf,
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind address
    pub bind_address: String,

    /// Listen port
    pub port: u16,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level filter (trace, debug, info, warn, error)
    pub level: String,
}

impl Default for EmulatorConfig {
    fn default() -> Self {
        Self {
            duration_sec: 15,
            hz: 15,
            seed: 42,
        }
    }
}

impl Default for ThresholdConfig {
    fn default() -> Self {
        Self {
            latency_p95_warn_ms: 40.0,
            cache_miss_warn: 0.12,
            error_rate_warn: 0.02,
        }
    }
}

impl Default for AnomalyConfig {
    fn default() -> Self {
        Self {
            contamination: 0.05,
            seed: Some(123),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from("./runs.db"),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1".to_string(),
            port: 8080,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl PipelineConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> ConfigResult<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|_| ConfigError::FileNotFound {
            path: path.to_string_lossy().to_string(),
        })?;

        let config: PipelineConfig =
            toml::from_str(&content).map_err(|e| ConfigError::ParseError {
                reason: e.to_string(),
            })?;

        config.validate()?;
        Ok(config)
    }

    /// Apply environment variable overrides to this configuration
    pub fn apply_env(&mut self) -> ConfigResult<()> {
        if let Ok(db_path) = std::env::var("VERISTAT_DB_PATH") {
            self.storage.db_path = PathBuf::from(db_path);
        }

        if let Ok(duration) = std::env::var("VERISTAT_EMU_DURATION_SEC") {
            self.emulator.duration_sec =
                duration.parse().map_err(|_| ConfigError::InvalidValue {
                    field: "VERISTAT_EMU_DURATION_SEC".to_string(),
                    value: duration,
                })?;
        }

        if let Ok(hz) = std::env::var("VERISTAT_EMU_HZ") {
            self.emulator.hz = hz.parse().map_err(|_| ConfigError::InvalidValue {
                field: "VERISTAT_EMU_HZ".to_string(),
                value: hz,
            })?;
        }

        if let Ok(contamination) = std::env::var("VERISTAT_ANOMALY_CONTAMINATION") {
            self.anomaly.contamination =
                contamination.parse().map_err(|_| ConfigError::InvalidValue {
                    field: "VERISTAT_ANOMALY_CONTAMINATION".to_string(),
                    value: contamination,
                })?;
        }

        if let Ok(level) = std::env::var("VERISTAT_LOG_LEVEL") {
            self.logging.level = level;
        }

        Ok(())
    }

    /// Load configuration with fallback order: file -> env -> defaults
    pub fn load_with_fallback<P: AsRef<Path>>(config_path: Option<P>) -> ConfigResult<Self> {
        let mut config = match config_path {
            Some(path) if path.as_ref().exists() => PipelineConfig::from_file(path)?,
            _ => PipelineConfig::default(),
        };

        config.apply_env()?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration. Violations are fatal to pipeline
    /// construction; values are never silently clamped.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.emulator.duration_sec == 0 || self.emulator.duration_sec > 300 {
            return Err(ConfigError::InvalidValue {
                field: "emulator.duration_sec".to_string(),
                value: self.emulator.duration_sec.to_string(),
            });
        }

        if self.emulator.hz == 0 || self.emulator.hz > 200 {
            return Err(ConfigError::InvalidValue {
                field: "emulator.hz".to_string(),
                value: self.emulator.hz.to_string(),
            });
        }

        if !self.thresholds.latency_p95_warn_ms.is_finite()
            || self.thresholds.latency_p95_warn_ms < 0.0
        {
            return Err(ConfigError::InvalidValue {
                field: "thresholds.latency_p95_warn_ms".to_string(),
                value: self.thresholds.latency_p95_warn_ms.to_string(),
            });
        }

        if !self.thresholds.cache_miss_warn.is_finite() || self.thresholds.cache_miss_warn < 0.0 {
            return Err(ConfigError::InvalidValue {
                field: "thresholds.cache_miss_warn".to_string(),
                value: self.thresholds.cache_miss_warn.to_string(),
            });
        }

        if !self.thresholds.error_rate_warn.is_finite() || self.thresholds.error_rate_warn < 0.0 {
            return Err(ConfigError::InvalidValue {
                field: "thresholds.error_rate_warn".to_string(),
                value: self.thresholds.error_rate_warn.to_string(),
            });
        }

        if !self.anomaly.contamination.is_finite()
            || self.anomaly.contamination <= 0.0
            || self.anomaly.contamination >= 1.0
        {
            return Err(ConfigError::InvalidValue {
                field: "anomaly.contamination".to_string(),
                value: self.anomaly.contamination.to_string(),
            });
        }

        Ok(())
    }
}
