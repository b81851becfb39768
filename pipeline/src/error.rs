//! Error handling for the Veristat pipeline service
//!
//! This module provides the error types for all pipeline operations,
//! including configuration loading, telemetry collection, KPI analysis,
//! and run persistence.
//!
//! A malformed telemetry line is deliberately NOT an error: the parser
//! returns `None` and the collector counts the rejection. Only conditions
//! that stop an operation are modeled here.

use std::io;

use thiserror::Error;

/// The main error type for the pipeline service
#[derive(Error, Debug)]
pub enum PipelineError {
    /// Configuration related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Telemetry collection errors
    #[error("Collection error: {0}")]
    Collect(#[from] CollectError),

    /// KPI analysis errors
    #[error("Analysis error: {0}")]
    Analysis(#[from] AnalysisError),

    /// Run persistence errors
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Configuration related errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration file not found: {path}")]
    FileNotFound { path: String },

    #[error("Configuration parsing error: {reason}")]
    ParseError { reason: String },

    #[error("Invalid configuration value: {field} = {value}")]
    InvalidValue { field: String, value: String },
}

/// Telemetry collection errors
#[derive(Error, Debug)]
pub enum CollectError {
    #[error("Failed to spawn telemetry producer: {reason}")]
    Spawn { reason: String },

    #[error("Producer stdout was not captured")]
    MissingStdout,

    #[error("Failed to read producer output: {0}")]
    Io(#[from] io::Error),
}

/// KPI analysis errors
#[derive(Error, Debug)]
pub enum AnalysisError {
    /// Distinct from "run not found" so callers can render different messages
    #[error("Run produced no samples")]
    EmptyRun,
}

/// Run persistence errors
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Run metadata serialization failed: {reason}")]
    MetaEncoding { reason: String },
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, PipelineError>;

/// A specialized result type for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// A specialized result type for storage operations
pub type StorageResult<T> = std::result::Result<T, StorageError>;

impl PipelineError {
    /// Get the error category for logging
    pub fn category(&self) -> &'static str {
        match self {
            PipelineError::Config(_) => "config",
            PipelineError::Collect(_) => "collect",
            PipelineError::Analysis(_) => "analysis",
            PipelineError::Storage(_) => "storage",
            PipelineError::Io(_) => "io",
            PipelineError::Serialization(_) => "serialization",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_categorization() {
        let err = PipelineError::Analysis(AnalysisError::EmptyRun);
        assert_eq!(err.category(), "analysis");

        let err = PipelineError::Config(ConfigError::InvalidValue {
            field: "anomaly.contamination".to_string(),
            value: "1.5".to_string(),
        });
        assert_eq!(err.category(), "config");
    }

    #[test]
    fn test_empty_run_message() {
        let err = AnalysisError::EmptyRun;
        assert_eq!(err.to_string(), "Run produced no samples");
    }
}
