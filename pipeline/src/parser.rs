//! Telemetry line parsing
//!
//! This module is the sole validation boundary between the external
//! emulator process and the rest of the pipeline. One raw stdout line
//! either becomes a [`Sample`] or is rejected with `None` — malformed
//! input never panics and never raises.
//!
//! Expected line grammar (fixed-field, whitespace-separated, order-sensitive):
//!
//! ```text
//! ts=<int>ms latency=<float>ms ipc=<float> cache_miss=<float> power=<float>W warnings=<int> errors=<int>
//! ```

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Anchored on both ends: a missing field, reordered fields, a stray unit
/// suffix, or trailing garbage all fail the match. Numeric tokens admit
/// digits and a decimal point only — no signs, no exponents.
const LINE_PATTERN: &str = r"^ts=(\d+)ms\s+latency=([\d.]+)ms\s+ipc=([\d.]+)\s+cache_miss=([\d.]+)\s+power=([\d.]+)W\s+warnings=(\d+)\s+errors=(\d+)$";

/// One parsed telemetry observation. Immutable once created; the raw line
/// is retained for audit and debugging.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    /// Milliseconds since run start
    pub ts_ms: u64,

    /// Observed operation latency in milliseconds
    pub latency_ms: f64,

    /// Instructions-per-cycle-like throughput metric
    pub ipc: f64,

    /// Cache miss ratio in [0, 1]
    pub cache_miss: f64,

    /// Power draw in watts
    pub power_w: f64,

    /// Warning flag for this observation (0 or 1)
    pub warnings: u32,

    /// Error flag for this observation (0 or 1)
    pub errors: u32,

    /// The original line as read from the producer
    pub raw_line: String,
}

/// Parser for the fixed telemetry line grammar.
///
/// Pure and stateless: identical input always yields identical output
/// (or identical rejection).
#[derive(Debug, Clone)]
pub struct LineParser {
    line_regex: Regex,
}

impl LineParser {
    pub fn new() -> Self {
        Self {
            line_regex: Regex::new(LINE_PATTERN).expect("telemetry line pattern compiles"),
        }
    }

    /// Parse one raw line into a [`Sample`], or `None` if it deviates from
    /// the grammar in any way. Leading/trailing whitespace is trimmed first.
    pub fn parse(&self, line: &str) -> Option<Sample> {
        let line = line.trim();
        let caps = self.line_regex.captures(line)?;

        let ts_ms: u64 = caps[1].parse().ok()?;
        let latency_ms: f64 = caps[2].parse().ok()?;
        let ipc: f64 = caps[3].parse().ok()?;
        let cache_miss: f64 = caps[4].parse().ok()?;
        let power_w: f64 = caps[5].parse().ok()?;
        let warnings: u32 = caps[6].parse().ok()?;
        let errors: u32 = caps[7].parse().ok()?;

        // Absurdly long digit runs overflow to infinity; downstream reports
        // must never carry non-finite numbers, so reject here.
        if !latency_ms.is_finite() || !ipc.is_finite() || !cache_miss.is_finite() || !power_w.is_finite() {
            return None;
        }

        Some(Sample {
            ts_ms,
            latency_ms,
            ipc,
            cache_miss,
            power_w,
            warnings,
            errors,
            raw_line: line.to_string(),
        })
    }
}

impl Default for LineParser {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const GOOD_LINE: &str =
        "ts=10ms latency=21.20ms ipc=1.234 cache_miss=0.080 power=9.10W warnings=0 errors=1";

    #[test]
    fn test_parse_well_formed_line() {
        let parser = LineParser::new();
        let s = parser.parse(GOOD_LINE).expect("line should parse");
        assert_eq!(s.ts_ms, 10);
        assert!((s.latency_ms - 21.2).abs() < 1e-9);
        assert!((s.ipc - 1.234).abs() < 1e-9);
        assert!((s.cache_miss - 0.08).abs() < 1e-9);
        assert!((s.power_w - 9.1).abs() < 1e-9);
        assert_eq!(s.warnings, 0);
        assert_eq!(s.errors, 1);
        assert_eq!(s.raw_line, GOOD_LINE);
    }

    #[test]
    fn test_whitespace_is_trimmed() {
        let parser = LineParser::new();
        let padded = format!("   {}  \n", GOOD_LINE);
        let s = parser.parse(&padded).expect("padded line should parse");
        assert_eq!(s.ts_ms, 10);
        assert_eq!(s.raw_line, GOOD_LINE);
    }

    #[test]
    fn test_rejects_missing_field() {
        let parser = LineParser::new();
        let line = "ts=10ms latency=21.20ms ipc=1.234 cache_miss=0.080 warnings=0 errors=1";
        assert!(parser.parse(line).is_none());
    }

    #[test]
    fn test_rejects_reordered_fields() {
        let parser = LineParser::new();
        let line =
            "latency=21.20ms ts=10ms ipc=1.234 cache_miss=0.080 power=9.10W warnings=0 errors=1";
        assert!(parser.parse(line).is_none());
    }

    #[test]
    fn test_rejects_non_numeric_token() {
        let parser = LineParser::new();
        let line =
            "ts=10ms latency=fastms ipc=1.234 cache_miss=0.080 power=9.10W warnings=0 errors=1";
        assert!(parser.parse(line).is_none());
    }

    #[test]
    fn test_rejects_signed_number() {
        let parser = LineParser::new();
        let line =
            "ts=10ms latency=-21.20ms ipc=1.234 cache_miss=0.080 power=9.10W warnings=0 errors=1";
        assert!(parser.parse(line).is_none());
    }

    #[test]
    fn test_rejects_missing_unit_suffix() {
        let parser = LineParser::new();
        let line = "ts=10 latency=21.20ms ipc=1.234 cache_miss=0.080 power=9.10W warnings=0 errors=1";
        assert!(parser.parse(line).is_none());

        let line = "ts=10ms latency=21.20ms ipc=1.234 cache_miss=0.080 power=9.10 warnings=0 errors=1";
        assert!(parser.parse(line).is_none());
    }

    #[test]
    fn test_rejects_trailing_garbage() {
        let parser = LineParser::new();
        let line = format!("{} extra=1", GOOD_LINE);
        assert!(parser.parse(&line).is_none());
    }

    #[test]
    fn test_rejects_empty_and_noise() {
        let parser = LineParser::new();
        assert!(parser.parse("").is_none());
        assert!(parser.parse("   ").is_none());
        assert!(parser.parse("emulator booting...").is_none());
    }

    #[test]
    fn test_rejects_overflowing_float() {
        let parser = LineParser::new();
        let huge = "9".repeat(400);
        let line = format!(
            "ts=10ms latency={}ms ipc=1.234 cache_miss=0.080 power=9.10W warnings=0 errors=1",
            huge
        );
        assert!(parser.parse(&line).is_none());
    }

    #[test]
    fn test_parse_is_deterministic() {
        let parser = LineParser::new();
        assert_eq!(parser.parse(GOOD_LINE), parser.parse(GOOD_LINE));
    }

    proptest! {
        #[test]
        fn prop_round_trip_recovers_fields(
            ts in 0u64..10_000_000,
            latency in 0.0f64..10_000.0,
            ipc in 0.0f64..16.0,
            cache_miss in 0.0f64..1.0,
            power in 0.0f64..500.0,
            warnings in 0u32..2,
            errors in 0u32..2,
        ) {
            let line = format!(
                "ts={}ms latency={:.2}ms ipc={:.3} cache_miss={:.3} power={:.2}W warnings={} errors={}",
                ts, latency, ipc, cache_miss, power, warnings, errors
            );
            let parser = LineParser::new();
            let s = parser.parse(&line).expect("generated line should parse");
            let expected_latency: f64 = format!("{:.2}", latency).parse().unwrap();
            prop_assert_eq!(s.ts_ms, ts);
            prop_assert!((s.latency_ms - expected_latency).abs() < 1e-9);
            prop_assert_eq!(s.warnings, warnings);
            prop_assert_eq!(s.errors, errors);
        }
    }
}
