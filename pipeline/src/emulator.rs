//! Mock emulator telemetry producer
//!
//! Stands in for the real hardware/timing emulator: emits telemetry lines
//! in the pipeline's ingestion grammar at a fixed rate, with per-profile
//! bias knobs that push specific KPIs past their warning thresholds.
//! Generation is fully deterministic for a given seed; timestamps are
//! tick-based rather than wall-clock so the same seed always yields the
//! same lines.

use std::fmt;
use std::io::{self, Write};
use std::str::FromStr;
use std::thread;
use std::time::Duration;

use clap::ValueEnum;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};

/// Workload profile for a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
#[value(rename_all = "snake_case")]
pub enum Profile {
    /// Healthy reference workload
    Baseline,

    /// Elevated cache miss rate and moderately higher latency
    CacheStress,

    /// High tail latency with injected timing errors
    TimingBug,
}

impl Profile {
    pub const ALL: [Profile; 3] = [Profile::Baseline, Profile::CacheStress, Profile::TimingBug];

    pub fn as_str(&self) -> &'static str {
        match self {
            Profile::Baseline => "baseline",
            Profile::CacheStress => "cache_stress",
            Profile::TimingBug => "timing_bug",
        }
    }

    /// Per-profile bias knobs: (latency_bias_ms, cache_bias, error_bias)
    fn biases(&self) -> (f64, f64, f64) {
        match self {
            Profile::Baseline => (0.0, 0.0, 0.0),
            Profile::CacheStress => (8.0, 0.08, 0.0),
            Profile::TimingBug => (12.0, 0.0, 0.02),
        }
    }
}

impl fmt::Display for Profile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Profile {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "baseline" => Ok(Profile::Baseline),
            "cache_stress" => Ok(Profile::CacheStress),
            "timing_bug" => Ok(Profile::TimingBug),
            other => Err(format!("unknown profile: {other}")),
        }
    }
}

/// Generate the full telemetry line sequence for a run.
///
/// `hz` must be at least 1 (enforced by config/request validation before
/// this point). Timestamps advance by `1000 / hz` milliseconds per tick.
pub fn generate_lines(profile: Profile, duration_sec: u64, hz: u32, seed: u64) -> Vec<String> {
    let mut rng = StdRng::seed_from_u64(seed);
    let (latency_bias, cache_bias, error_bias) = profile.biases();

    let interval_ms = 1000 / u64::from(hz.max(1));
    let ticks = duration_sec * u64::from(hz.max(1));

    let ipc_dist: Normal<f64> = Normal::new(1.2, 0.15).expect("stddev is positive");
    let cache_dist = Normal::new(0.07 + cache_bias, 0.02).expect("stddev is positive");
    let latency_dist = Normal::new(22.0 + latency_bias, 4.5).expect("stddev is positive");

    let mut lines = Vec::with_capacity(ticks as usize);
    for tick in 0..ticks {
        let ts_ms = tick * interval_ms;

        let ipc = ipc_dist.sample(&mut rng).max(0.2);
        let cache_miss = cache_dist.sample(&mut rng).clamp(0.01, 0.35);
        let latency_ms = latency_dist.sample(&mut rng).max(5.0);
        let power_w = Normal::new(8.0 + 10.0 * cache_miss, 0.8)
            .expect("stddev is positive")
            .sample(&mut rng)
            .max(0.5);

        let warnings = u8::from(rng.gen::<f64>() < 0.03 + cache_bias * 0.2);
        let errors = u8::from(rng.gen::<f64>() < 0.005 + error_bias);

        lines.push(format!(
            "ts={}ms latency={:.2}ms ipc={:.3} cache_miss={:.3} power={:.2}W warnings={} errors={}",
            ts_ms, latency_ms, ipc, cache_miss, power_w, warnings, errors
        ));
    }

    lines
}

/// Stream a run's telemetry to a writer in real time, one line per tick.
///
/// This is the behavior behind `veristatd emulate`: the parent pipeline
/// reads these lines from the child's stdout until EOF.
pub fn stream<W: Write>(
    mut out: W,
    profile: Profile,
    duration_sec: u64,
    hz: u32,
    seed: u64,
) -> io::Result<()> {
    let interval = Duration::from_millis(1000 / u64::from(hz.max(1)));

    for line in generate_lines(profile, duration_sec, hz, seed) {
        writeln!(out, "{line}")?;
        out.flush()?;
        thread::sleep(interval);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::collect_lines;

    #[test]
    fn test_generation_is_deterministic() {
        let a = generate_lines(Profile::Baseline, 5, 15, 42);
        let b = generate_lines(Profile::Baseline, 5, 15, 42);
        assert_eq!(a, b);

        let c = generate_lines(Profile::Baseline, 5, 15, 43);
        assert_ne!(a, c);
    }

    #[test]
    fn test_line_count_and_timestamps() {
        let lines = generate_lines(Profile::Baseline, 3, 10, 42);
        assert_eq!(lines.len(), 30);
        assert!(lines[0].starts_with("ts=0ms "));
        assert!(lines[1].starts_with("ts=100ms "));
    }

    #[test]
    fn test_every_generated_line_parses() {
        for profile in Profile::ALL {
            let lines = generate_lines(profile, 5, 20, 42);
            let summary = collect_lines(&lines);
            assert_eq!(summary.parse_failures, 0, "profile {profile}");
            assert_eq!(summary.samples.len(), 100);
        }
    }

    #[test]
    fn test_metric_floors_hold() {
        let samples = collect_lines(&generate_lines(Profile::Baseline, 20, 50, 42)).samples;
        assert!(samples.iter().all(|s| s.ipc >= 0.2));
        assert!(samples.iter().all(|s| s.latency_ms >= 5.0));
        assert!(samples.iter().all(|s| (0.01..=0.35).contains(&s.cache_miss)));
        assert!(samples.iter().all(|s| s.power_w >= 0.5));
    }

    #[test]
    fn test_cache_stress_raises_cache_miss() {
        let baseline = collect_lines(&generate_lines(Profile::Baseline, 10, 20, 42)).samples;
        let stressed = collect_lines(&generate_lines(Profile::CacheStress, 10, 20, 42)).samples;

        let mean = |samples: &[crate::parser::Sample]| {
            samples.iter().map(|s| s.cache_miss).sum::<f64>() / samples.len() as f64
        };
        assert!(mean(&stressed) > mean(&baseline) + 0.05);
    }

    #[test]
    fn test_profile_round_trips_through_str() {
        for profile in Profile::ALL {
            assert_eq!(profile.as_str().parse::<Profile>().unwrap(), profile);
        }
        assert!("quantum_foam".parse::<Profile>().is_err());
    }
}
