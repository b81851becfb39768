//! Telemetry stream collection
//!
//! Consumes an ordered line stream from a telemetry producer, applies the
//! line parser to each line, and accumulates valid samples. A malformed
//! line increments a failure counter and the stream continues; nothing in
//! this module aborts on bad input data.
//!
//! Samples keep the exact order their source lines were read in. The
//! collector never re-sorts by `ts_ms`; a producer that emits out-of-order
//! timestamps is passed through as-is. There is no read timeout: the loop
//! terminates when the producer closes its stdout, not before.

use std::io::{BufRead, BufReader};
use std::process::{Command, Stdio};

use tracing::{debug, info, warn};

use crate::error::CollectError;
use crate::parser::{LineParser, Sample};

/// Outcome of draining a line stream, before any process exit status
/// is known.
#[derive(Debug, Default)]
pub struct StreamSummary {
    /// Valid samples in delivery order
    pub samples: Vec<Sample>,

    /// Count of rejected lines
    pub parse_failures: u64,
}

/// Outcome of running an external telemetry producer to completion.
///
/// The exit code is reported alongside whatever samples were parsed, even
/// when it is non-zero; whether partial samples from a failed producer are
/// stored or discarded is the caller's decision.
#[derive(Debug)]
pub struct CollectResult {
    pub samples: Vec<Sample>,
    pub parse_failures: u64,
    pub exit_code: i32,
}

/// Drain an ordered sequence of raw lines through the parser.
///
/// Accepts any line source: an in-memory buffer, a test fixture, or a
/// reader adapter over a live stream.
pub fn collect_lines<I, S>(lines: I) -> StreamSummary
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let parser = LineParser::new();
    let mut summary = StreamSummary::default();

    for line in lines {
        match parser.parse(line.as_ref()) {
            Some(sample) => summary.samples.push(sample),
            None => {
                debug!(line = line.as_ref(), "rejected malformed telemetry line");
                summary.parse_failures += 1;
            }
        }
    }

    summary
}

/// Spawn the telemetry producer and collect its stdout until it exits.
///
/// Blocks until the producer closes its output and terminates; the exit
/// status is reaped only after the stream is fully drained. I/O failures
/// while reading are surfaced as errors, unlike malformed lines which are
/// merely counted.
pub fn run_producer_and_collect(mut cmd: Command) -> Result<CollectResult, CollectError> {
    info!(command = ?cmd, "launching telemetry producer");

    let mut child = cmd
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .map_err(|e| CollectError::Spawn { reason: e.to_string() })?;

    let stdout = child.stdout.take().ok_or(CollectError::MissingStdout)?;
    let reader = BufReader::new(stdout);

    let parser = LineParser::new();
    let mut samples = Vec::new();
    let mut parse_failures = 0u64;

    for line in reader.lines() {
        let line = line?;
        match parser.parse(&line) {
            Some(sample) => samples.push(sample),
            None => parse_failures += 1,
        }
    }

    let status = child.wait()?;
    let exit_code = status.code().unwrap_or(-1);

    if exit_code != 0 {
        warn!(exit_code, parsed = samples.len(), "producer exited with failure");
    } else {
        info!(
            exit_code,
            parsed = samples.len(),
            parse_failures,
            "producer exited"
        );
    }

    Ok(CollectResult {
        samples,
        parse_failures,
        exit_code,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn good_line(ts: u64, errors: u32) -> String {
        format!(
            "ts={}ms latency=21.20ms ipc=1.234 cache_miss=0.080 power=9.10W warnings=0 errors={}",
            ts, errors
        )
    }

    #[test]
    fn test_collects_in_delivery_order() {
        // Deliberately out-of-order timestamps: the collector must not re-sort.
        let lines = vec![good_line(30, 0), good_line(10, 0), good_line(20, 0)];
        let summary = collect_lines(&lines);
        assert_eq!(summary.parse_failures, 0);
        let ts: Vec<u64> = summary.samples.iter().map(|s| s.ts_ms).collect();
        assert_eq!(ts, vec![30, 10, 20]);
    }

    #[test]
    fn test_never_aborts_on_bad_lines() {
        // 100 lines, every 3rd (0-indexed: lines 0, 3, 6, ...) malformed.
        let lines: Vec<String> = (0..100)
            .map(|i| {
                if i % 3 == 0 {
                    format!("garbage line {}", i)
                } else {
                    good_line(i as u64, 0)
                }
            })
            .collect();

        let summary = collect_lines(&lines);
        assert_eq!(summary.parse_failures, 34);
        assert_eq!(summary.samples.len(), 66);
    }

    #[test]
    fn test_counts_each_rejection_once() {
        let lines = vec![good_line(0, 0), "noise".to_string(), good_line(1, 1)];
        let summary = collect_lines(&lines);
        assert_eq!(summary.parse_failures, 1);
        assert_eq!(summary.samples.len(), 2);
    }

    #[test]
    fn test_empty_stream() {
        let summary = collect_lines(Vec::<String>::new());
        assert!(summary.samples.is_empty());
        assert_eq!(summary.parse_failures, 0);
    }

    #[test]
    fn test_run_producer_captures_exit_code() {
        let mut cmd = Command::new("sh");
        cmd.arg("-c").arg(format!("echo '{}'; exit 0", good_line(5, 0)));
        let result = run_producer_and_collect(cmd).expect("producer should run");
        assert_eq!(result.exit_code, 0);
        assert_eq!(result.samples.len(), 1);
        assert_eq!(result.samples[0].ts_ms, 5);
    }

    #[test]
    fn test_run_producer_reports_failure_exit_with_partial_samples() {
        let mut cmd = Command::new("sh");
        cmd.arg("-c")
            .arg(format!("echo '{}'; echo 'panic!'; exit 3", good_line(7, 1)));
        let result = run_producer_and_collect(cmd).expect("collection itself should succeed");
        assert_eq!(result.exit_code, 3);
        assert_eq!(result.samples.len(), 1);
        assert_eq!(result.parse_failures, 1);
    }

    #[test]
    fn test_spawn_failure_is_an_error() {
        let cmd = Command::new("/nonexistent/veristat-producer");
        assert!(matches!(
            run_producer_and_collect(cmd),
            Err(CollectError::Spawn { .. })
        ));
    }
}
