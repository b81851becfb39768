//! Veristat pipeline daemon
//!
//! `veristatd serve` runs the HTTP API; `veristatd run` executes one
//! pipeline pass locally and prints the report; `veristatd emulate` is the
//! telemetry producer the other two spawn as a subprocess.

use std::io;
use std::process::Command;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use veristat_pipeline::analyzer::Analyzer;
use veristat_pipeline::collector::run_producer_and_collect;
use veristat_pipeline::config::PipelineConfig;
use veristat_pipeline::emulator::{self, Profile};
use veristat_pipeline::server::{self, AppState};

#[derive(Parser)]
#[command(name = "veristatd")]
#[command(about = "Veristat pipeline daemon - telemetry ingestion, KPI analysis, and anomaly scoring")]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(long, global = true, env = "VERISTAT_CONFIG")]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP API server
    Serve,

    /// Execute one pipeline pass locally and print the report as JSON
    Run {
        /// Workload profile
        #[arg(long, value_enum, default_value_t = Profile::Baseline)]
        profile: Profile,

        /// Run duration in seconds (config default if omitted)
        #[arg(long)]
        duration_sec: Option<u64>,

        /// Sampling rate in lines per second (config default if omitted)
        #[arg(long)]
        hz: Option<u32>,
    },

    /// Produce telemetry lines on stdout (used as the run subprocess)
    Emulate {
        /// Workload profile
        #[arg(long, value_enum, default_value_t = Profile::Baseline)]
        profile: Profile,

        /// Run duration in seconds
        #[arg(long, default_value_t = 15)]
        duration_sec: u64,

        /// Sampling rate in lines per second
        #[arg(long, default_value_t = 15)]
        hz: u32,

        /// Seed for metric synthesis
        #[arg(long, default_value_t = 42)]
        seed: u64,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = PipelineConfig::load_with_fallback(cli.config.as_deref())
        .context("failed to load configuration")?;

    init_logging(&config);

    match cli.command {
        Commands::Serve => serve(config).await,
        Commands::Run {
            profile,
            duration_sec,
            hz,
        } => run_once(config, profile, duration_sec, hz),
        Commands::Emulate {
            profile,
            duration_sec,
            hz,
            seed,
        } => {
            validate_run_bounds(duration_sec, hz)?;
            emulator::stream(io::stdout().lock(), profile, duration_sec, hz, seed)?;
            Ok(())
        }
    }
}

/// Command-line counterpart of the config/request range checks. Out-of-range
/// values are rejected, never clamped.
fn validate_run_bounds(duration_sec: u64, hz: u32) -> anyhow::Result<()> {
    if duration_sec == 0 || duration_sec > 300 {
        bail!("duration_sec must be between 1 and 300, got {duration_sec}");
    }
    if hz == 0 || hz > 200 {
        bail!("hz must be between 1 and 200, got {hz}");
    }
    Ok(())
}

async fn serve(config: PipelineConfig) -> anyhow::Result<()> {
    let state = AppState::new(config);
    state.storage.init_db().context("failed to initialize database")?;
    info!("startup complete");
    server::serve(state).await
}

/// One-shot local pipeline: emulate, collect, analyze, print. Nothing is
/// persisted; partial samples from a failed producer are reported together
/// with its exit code.
fn run_once(
    config: PipelineConfig,
    profile: Profile,
    duration_sec: Option<u64>,
    hz: Option<u32>,
) -> anyhow::Result<()> {
    let duration_sec = duration_sec.unwrap_or(config.emulator.duration_sec);
    let hz = hz.unwrap_or(config.emulator.hz);
    validate_run_bounds(duration_sec, hz)?;

    let exe = std::env::current_exe().context("cannot locate daemon binary")?;
    let mut cmd = Command::new(exe);
    cmd.arg("emulate")
        .arg("--profile")
        .arg(profile.as_str())
        .arg("--duration-sec")
        .arg(duration_sec.to_string())
        .arg("--hz")
        .arg(hz.to_string())
        .arg("--seed")
        .arg(config.emulator.seed.to_string());

    let collected = run_producer_and_collect(cmd)?;
    if collected.exit_code != 0 {
        bail!(
            "emulator failed with exit_code={} ({} samples collected before failure)",
            collected.exit_code,
            collected.samples.len()
        );
    }

    let analyzer = Analyzer::new(&config);
    let report = analyzer.build_report(&collected.samples)?;

    println!("{}", serde_json::to_string_pretty(&report)?);
    info!(
        samples = collected.samples.len(),
        parse_failures = collected.parse_failures,
        "run complete"
    );
    Ok(())
}

fn init_logging(config: &PipelineConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("veristat_pipeline={}", config.logging.level)));

    tracing_subscriber::fmt().with_env_filter(filter).init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn verify_cli() {
        Cli::command().debug_assert()
    }

    #[test]
    fn test_emulate_args_parse() {
        let cli = Cli::try_parse_from([
            "veristatd",
            "emulate",
            "--profile",
            "cache_stress",
            "--duration-sec",
            "10",
            "--hz",
            "20",
            "--seed",
            "7",
        ])
        .unwrap();

        match cli.command {
            Commands::Emulate {
                profile,
                duration_sec,
                hz,
                seed,
            } => {
                assert_eq!(profile, Profile::CacheStress);
                assert_eq!(duration_sec, 10);
                assert_eq!(hz, 20);
                assert_eq!(seed, 7);
            }
            _ => panic!("expected emulate subcommand"),
        }
    }

    #[test]
    fn test_run_bounds_accept_valid_ranges() {
        assert!(validate_run_bounds(1, 1).is_ok());
        assert!(validate_run_bounds(15, 15).is_ok());
        assert!(validate_run_bounds(300, 200).is_ok());
    }

    #[test]
    fn test_run_bounds_reject_out_of_range() {
        assert!(validate_run_bounds(0, 15).is_err());
        assert!(validate_run_bounds(301, 15).is_err());
        assert!(validate_run_bounds(15, 0).is_err());
        assert!(validate_run_bounds(15, 201).is_err());
    }

    #[test]
    fn test_run_bounds_reject_huge_duration() {
        // duration * hz would overflow tick math if this slipped through
        assert!(validate_run_bounds(u64::MAX, 2).is_err());
    }
}
