//! Terminal rendering for reports and run listings

use serde::Serialize;

use crate::api::{Report, RunCreated, RunSummary};
use crate::error::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
}

pub struct OutputManager {
    format: OutputFormat,
}

impl OutputManager {
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    pub fn print_json<T: Serialize>(&self, value: &T) -> Result<()> {
        println!("{}", serde_json::to_string_pretty(value)?);
        Ok(())
    }

    pub fn print_run_created(&self, run: &RunCreated) -> Result<()> {
        match self.format {
            OutputFormat::Json => self.print_json(&serde_json::json!({
                "run_id": run.run_id,
                "created_at": run.created_at,
                "profile": run.profile,
                "samples": run.samples,
                "parse_failures": run.parse_failures,
            })),
            OutputFormat::Text => {
                println!("run {} ({})", run.run_id, run.profile);
                println!(
                    "  samples: {}  parse_failures: {}",
                    run.samples, run.parse_failures
                );
                Ok(())
            }
        }
    }

    pub fn print_run_list(&self, runs: &[RunSummary]) -> Result<()> {
        match self.format {
            OutputFormat::Json => self.print_json(&serde_json::json!(runs
                .iter()
                .map(|r| {
                    serde_json::json!({
                        "run_id": r.run_id,
                        "created_at": r.created_at,
                        "meta": r.meta,
                    })
                })
                .collect::<Vec<_>>())),
            OutputFormat::Text => {
                if runs.is_empty() {
                    println!("no runs recorded");
                    return Ok(());
                }
                for r in runs {
                    let profile = r.meta["profile"].as_str().unwrap_or("?");
                    println!("{}  {}  {}", r.run_id, r.created_at, profile);
                }
                Ok(())
            }
        }
    }

    pub fn print_report(&self, report: &Report) -> Result<()> {
        match self.format {
            OutputFormat::Json => self.print_json(&serde_json::json!({
                "run_id": report.run_id,
                "kpis": report.kpis,
                "bottlenecks": report.bottlenecks,
                "ml": {
                    "anomaly_score": report.ml.anomaly_score,
                    "is_anomalous": report.ml.is_anomalous,
                },
            })),
            OutputFormat::Text => {
                println!("report for run {}", report.run_id);
                println!("  kpis:");
                if let Some(kpis) = report.kpis.as_object() {
                    for (name, value) in kpis {
                        println!("    {name}: {value}");
                    }
                }
                println!("  bottlenecks:");
                for finding in &report.bottlenecks {
                    println!("    - {finding}");
                }
                println!(
                    "  anomaly: score={:.4} anomalous={}",
                    report.ml.anomaly_score,
                    report.ml.is_anomalous == 1
                );
                Ok(())
            }
        }
    }
}
