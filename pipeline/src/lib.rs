//! Veristat pipeline service library
//!
//! This library provides the core functionality for the Veristat pipeline
//! service, which ingests line-oriented telemetry from an emulator
//! process, aggregates run-level KPIs, flags bottlenecks against
//! configured thresholds, and scores each run's KPI vector for anomalies.

pub mod analyzer;
pub mod anomaly;
pub mod collector;
pub mod config;
pub mod emulator;
pub mod error;
pub mod parser;
pub mod server;
pub mod storage;

// Re-export commonly used types
pub use analyzer::{Analyzer, KpiSet, RunReport};
pub use anomaly::{AnomalyResult, AnomalyScorer};
pub use collector::{collect_lines, run_producer_and_collect, CollectResult, StreamSummary};
pub use config::PipelineConfig;
pub use emulator::Profile;
pub use error::{PipelineError, Result};
pub use parser::{LineParser, Sample};
pub use storage::Storage;
