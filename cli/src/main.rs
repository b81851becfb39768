//! Veristat CLI - command-line client for the pipeline service
//!
//! Talks to a running `veristatd serve` over HTTP. The `batch` command
//! mirrors the service's intended demo flow: one run per profile, each
//! followed by its report.

use clap::{Parser, Subcommand};
use std::process;
use tracing::info;
use tracing_subscriber::EnvFilter;

mod api;
mod error;
mod output;

use api::{RunRequest, VeristatClient, PROFILES};
use error::{format_error, Result};
use output::{OutputFormat, OutputManager};

#[derive(Parser)]
#[command(name = "veristat")]
#[command(about = "Veristat CLI - drive telemetry runs and fetch their reports")]
#[command(version)]
struct Cli {
    /// Service URL
    #[arg(long, global = true, env = "VERISTAT_URL", default_value = "http://127.0.0.1:8080")]
    url: String,

    /// Output format
    #[arg(long, global = true, value_enum, default_value = "text")]
    format: OutputFormatArg,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::ValueEnum, Clone, Debug)]
enum OutputFormatArg {
    Text,
    Json,
}

impl From<OutputFormatArg> for OutputFormat {
    fn from(arg: OutputFormatArg) -> Self {
        match arg {
            OutputFormatArg::Text => OutputFormat::Text,
            OutputFormatArg::Json => OutputFormat::Json,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Check service health
    Health,

    /// Launch one run and print the creation summary
    Run {
        /// Workload profile
        #[arg(long, default_value = "baseline", value_parser = PROFILES)]
        profile: String,

        /// Run duration in seconds (service default if omitted)
        #[arg(long)]
        duration_sec: Option<u64>,

        /// Sampling rate in lines per second (service default if omitted)
        #[arg(long)]
        hz: Option<u32>,
    },

    /// List recorded runs
    Runs,

    /// Fetch the report for a run
    Report {
        /// Run identifier
        run_id: String,
    },

    /// Run every profile once and print each report
    Batch {
        /// Per-run duration in seconds
        #[arg(long, default_value_t = 10)]
        duration_sec: u64,

        /// Per-run sampling rate in lines per second
        #[arg(long, default_value_t = 20)]
        hz: u32,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if let Err(e) = run_command(cli).await {
        eprintln!("{}", format_error(&e));
        process::exit(e.exit_code());
    }
}

async fn run_command(cli: Cli) -> Result<()> {
    let client = VeristatClient::new(cli.url.clone())?;
    let output = OutputManager::new(OutputFormat::from(cli.format));

    info!(url = %cli.url, "connecting to Veristat service");

    match cli.command {
        Commands::Health => {
            let health = client.health().await?;
            output.print_json(&health)
        }
        Commands::Run {
            profile,
            duration_sec,
            hz,
        } => {
            let run = client
                .create_run(&RunRequest {
                    profile,
                    duration_sec,
                    hz,
                })
                .await?;
            output.print_run_created(&run)
        }
        Commands::Runs => {
            let runs = client.list_runs().await?;
            output.print_run_list(&runs)
        }
        Commands::Report { run_id } => {
            let report = client.report(&run_id).await?;
            output.print_report(&report)
        }
        Commands::Batch { duration_sec, hz } => {
            for profile in PROFILES {
                println!("==============================");
                println!("PROFILE: {profile}");

                let run = client
                    .create_run(&RunRequest {
                        profile: profile.to_string(),
                        duration_sec: Some(duration_sec),
                        hz: Some(hz),
                    })
                    .await?;
                output.print_run_created(&run)?;

                let report = client.report(&run.run_id).await?;
                output.print_report(&report)?;
            }
            Ok(())
        }
    }
}

fn init_logging(verbose: bool) {
    let default = if verbose { "veristat=info" } else { "veristat=warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
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
    fn test_run_args_parse() {
        let cli = Cli::try_parse_from([
            "veristat",
            "run",
            "--profile",
            "timing_bug",
            "--duration-sec",
            "10",
        ])
        .unwrap();

        match cli.command {
            Commands::Run {
                profile,
                duration_sec,
                hz,
            } => {
                assert_eq!(profile, "timing_bug");
                assert_eq!(duration_sec, Some(10));
                assert_eq!(hz, None);
            }
            _ => panic!("expected run subcommand"),
        }
    }

    #[test]
    fn test_rejects_unknown_profile() {
        assert!(Cli::try_parse_from(["veristat", "run", "--profile", "warp_core"]).is_err());
    }

    #[test]
    fn test_default_url_and_format() {
        let cli = Cli::try_parse_from(["veristat", "health"]).unwrap();
        assert_eq!(cli.url, "http://127.0.0.1:8080");
        assert!(matches!(cli.format, OutputFormatArg::Text));
    }
}
