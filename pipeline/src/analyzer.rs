//! Run-level KPI aggregation, bottleneck classification, and report
//! composition
//!
//! All reductions here are order-independent, so out-of-order timestamps
//! in the sample collection do not affect results. KPIs are recomputed on
//! demand and never cached.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::anomaly::{AnomalyResult, AnomalyScorer};
use crate::config::{PipelineConfig, ThresholdConfig};
use crate::error::AnalysisError;
use crate::parser::Sample;

/// Sentinel emitted when no threshold check triggers; the bottleneck list
/// is never empty.
pub const NO_BOTTLENECKS: &str = "No major bottlenecks detected under current thresholds.";

/// Scalar summary statistics for one run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KpiSet {
    pub sample_count: u64,
    pub latency_mean_ms: f64,
    pub latency_p95_ms: f64,
    pub ipc_mean: f64,
    pub cache_miss_mean: f64,
    pub error_rate: f64,
    pub warning_rate: f64,
}

/// Anomaly outcome as it appears in a delivered report: `is_anomalous`
/// travels as 0/1 on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MlSummary {
    pub anomaly_score: f64,
    pub is_anomalous: u8,
}

impl From<AnomalyResult> for MlSummary {
    fn from(result: AnomalyResult) -> Self {
        Self {
            anomaly_score: result.anomaly_score,
            is_anomalous: u8::from(result.is_anomalous),
        }
    }
}

/// The composed output for one run: KPIs, bottleneck findings, and the
/// anomaly verdict
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub kpis: KpiSet,
    pub bottlenecks: Vec<String>,
    pub ml: MlSummary,
}

/// Reduce a non-empty sample collection into a [`KpiSet`].
///
/// Zero samples is a distinct failure, never a `KpiSet` of zeros; callers
/// special-case [`AnalysisError::EmptyRun`] before rendering.
pub fn aggregate(samples: &[Sample]) -> Result<KpiSet, AnalysisError> {
    if samples.is_empty() {
        return Err(AnalysisError::EmptyRun);
    }

    let count = samples.len() as f64;

    let latency_mean_ms = samples.iter().map(|s| s.latency_ms).sum::<f64>() / count;
    let ipc_mean = samples.iter().map(|s| s.ipc).sum::<f64>() / count;
    let cache_miss_mean = samples.iter().map(|s| s.cache_miss).sum::<f64>() / count;

    let error_rate = samples.iter().map(|s| f64::from(s.errors)).sum::<f64>() / count;
    let warning_rate = samples.iter().map(|s| f64::from(s.warnings)).sum::<f64>() / count;

    let mut latencies: Vec<f64> = samples.iter().map(|s| s.latency_ms).collect();
    latencies.sort_by(|a, b| a.total_cmp(b));
    let latency_p95_ms = percentile(&latencies, 95.0);

    Ok(KpiSet {
        sample_count: samples.len() as u64,
        latency_mean_ms,
        latency_p95_ms,
        ipc_mean,
        cache_miss_mean,
        error_rate,
        warning_rate,
    })
}

/// Percentile over sorted values with linear interpolation between order
/// statistics. `values` must be sorted ascending and non-empty.
pub(crate) fn percentile(values: &[f64], pct: f64) -> f64 {
    debug_assert!(!values.is_empty());

    let rank = pct / 100.0 * (values.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;

    if lo == hi {
        return values[lo];
    }

    let weight = rank - lo as f64;
    values[lo] * (1.0 - weight) + values[hi] * weight
}

/// Apply the configured thresholds to a [`KpiSet`].
///
/// Checks are strictly greater-than and findings appear in a fixed order
/// (tail latency, cache locality, error rate) regardless of magnitude.
pub fn classify(kpis: &KpiSet, thresholds: &ThresholdConfig) -> Vec<String> {
    let mut findings = Vec::new();

    if kpis.latency_p95_ms > thresholds.latency_p95_warn_ms {
        findings.push(format!(
            "High tail latency (p95={:.2}ms) → potential timing / critical-path bottleneck.",
            kpis.latency_p95_ms
        ));
    }
    if kpis.cache_miss_mean > thresholds.cache_miss_warn {
        findings.push(format!(
            "Elevated cache miss rate (mean={:.3}) → potential memory locality / cache config bottleneck.",
            kpis.cache_miss_mean
        ));
    }
    if kpis.error_rate > thresholds.error_rate_warn {
        findings.push(format!(
            "Error rate high (rate={:.3}) → potential functional/timing violations in validation.",
            kpis.error_rate
        ));
    }

    if findings.is_empty() {
        findings.push(NO_BOTTLENECKS.to_string());
    }

    findings
}

/// Composes the full pipeline tail: aggregate, classify, score.
///
/// Holds a frozen snapshot of thresholds and anomaly configuration for the
/// lifetime of a run; no component reads ambient state.
#[derive(Debug, Clone)]
pub struct Analyzer {
    thresholds: ThresholdConfig,
    scorer: AnomalyScorer,
}

impl Analyzer {
    pub fn new(config: &PipelineConfig) -> Self {
        Self {
            thresholds: config.thresholds.clone(),
            scorer: AnomalyScorer::new(&config.anomaly),
        }
    }

    /// Build the report for one run's samples. Pure composition; fails
    /// only on an empty sample collection.
    pub fn build_report(&self, samples: &[Sample]) -> Result<RunReport, AnalysisError> {
        let kpis = aggregate(samples)?;
        let bottlenecks = classify(&kpis, &self.thresholds);

        let ml = self
            .scorer
            .score([kpis.latency_p95_ms, kpis.cache_miss_mean, kpis.error_rate]);

        debug!(
            samples = kpis.sample_count,
            latency_p95_ms = kpis.latency_p95_ms,
            anomaly_score = ml.anomaly_score,
            "built run report"
        );

        Ok(RunReport {
            kpis,
            bottlenecks,
            ml: ml.into(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(latency_ms: f64, cache_miss: f64, warnings: u32, errors: u32) -> Sample {
        Sample {
            ts_ms: 0,
            latency_ms,
            ipc: 1.0,
            cache_miss,
            power_w: 8.0,
            warnings,
            errors,
            raw_line: String::new(),
        }
    }

    fn default_analyzer() -> Analyzer {
        Analyzer::new(&PipelineConfig::default())
    }

    #[test]
    fn test_aggregate_means_and_rates() {
        let samples = vec![
            sample(10.0, 0.0, 0, 0),
            sample(20.0, 0.0, 1, 1),
            sample(30.0, 0.0, 0, 0),
            sample(40.0, 0.0, 1, 1),
        ];

        let kpis = aggregate(&samples).unwrap();
        assert_eq!(kpis.sample_count, 4);
        assert!((kpis.latency_mean_ms - 25.0).abs() < 1e-12);
        assert!((kpis.error_rate - 0.5).abs() < 1e-12);
        assert!((kpis.warning_rate - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_aggregate_rejects_empty_input() {
        assert!(matches!(aggregate(&[]), Err(AnalysisError::EmptyRun)));
    }

    #[test]
    fn test_percentile_interpolates() {
        // numpy.percentile([10, 20, 30, 40], 95) == 38.5
        let values = [10.0, 20.0, 30.0, 40.0];
        assert!((percentile(&values, 95.0) - 38.5).abs() < 1e-12);
        assert_eq!(percentile(&values, 0.0), 10.0);
        assert_eq!(percentile(&values, 100.0), 40.0);
        assert_eq!(percentile(&[7.0], 95.0), 7.0);
    }

    #[test]
    fn test_p95_falls_between_bounding_order_statistics() {
        let samples: Vec<Sample> = (1..=17).map(|i| sample(i as f64, 0.0, 0, 0)).collect();
        let kpis = aggregate(&samples).unwrap();

        let n = samples.len();
        let rank = 0.95 * (n - 1) as f64;
        let lo = rank.floor() as usize;
        let hi = rank.ceil() as usize;
        assert!(kpis.latency_p95_ms >= (lo + 1) as f64);
        assert!(kpis.latency_p95_ms <= (hi + 1) as f64);
    }

    #[test]
    fn test_p95_is_order_independent() {
        let sorted: Vec<Sample> = (1..=20).map(|i| sample(i as f64, 0.0, 0, 0)).collect();
        let mut shuffled = sorted.clone();
        shuffled.reverse();
        shuffled.swap(3, 11);

        assert_eq!(
            aggregate(&sorted).unwrap().latency_p95_ms,
            aggregate(&shuffled).unwrap().latency_p95_ms
        );
    }

    #[test]
    fn test_classifier_boundary_does_not_trigger() {
        let thresholds = ThresholdConfig::default();
        let kpis = KpiSet {
            sample_count: 10,
            latency_mean_ms: 20.0,
            latency_p95_ms: thresholds.latency_p95_warn_ms,
            ipc_mean: 1.2,
            cache_miss_mean: thresholds.cache_miss_warn,
            error_rate: thresholds.error_rate_warn,
            warning_rate: 0.0,
        };

        let findings = classify(&kpis, &thresholds);
        assert_eq!(findings, vec![NO_BOTTLENECKS.to_string()]);
    }

    #[test]
    fn test_classifier_above_boundary_triggers_in_fixed_order() {
        let thresholds = ThresholdConfig::default();
        let kpis = KpiSet {
            sample_count: 10,
            latency_mean_ms: 20.0,
            latency_p95_ms: thresholds.latency_p95_warn_ms + 1.0,
            ipc_mean: 1.2,
            cache_miss_mean: thresholds.cache_miss_warn + 0.01,
            error_rate: thresholds.error_rate_warn + 0.01,
            warning_rate: 0.0,
        };

        let findings = classify(&kpis, &thresholds);
        assert_eq!(findings.len(), 3);
        assert!(findings[0].contains("tail latency"));
        assert!(findings[1].contains("cache miss"));
        assert!(findings[2].contains("Error rate"));
    }

    #[test]
    fn test_classifier_single_finding() {
        let thresholds = ThresholdConfig::default();
        let kpis = KpiSet {
            sample_count: 10,
            latency_mean_ms: 20.0,
            latency_p95_ms: 10.0,
            ipc_mean: 1.2,
            cache_miss_mean: 0.3,
            error_rate: 0.0,
            warning_rate: 0.0,
        };

        let findings = classify(&kpis, &thresholds);
        assert_eq!(findings.len(), 1);
        assert!(findings[0].contains("cache miss"));
    }

    #[test]
    fn test_build_report_empty_run_guard() {
        let analyzer = default_analyzer();
        assert!(matches!(
            analyzer.build_report(&[]),
            Err(AnalysisError::EmptyRun)
        ));
    }

    #[test]
    fn test_build_report_emits_finite_numbers() {
        let analyzer = default_analyzer();
        let samples: Vec<Sample> = (0..50)
            .map(|i| sample(20.0 + (i % 7) as f64, 0.07, 0, u32::from(i % 25 == 0)))
            .collect();

        let report = analyzer.build_report(&samples).unwrap();
        for v in [
            report.kpis.latency_mean_ms,
            report.kpis.latency_p95_ms,
            report.kpis.ipc_mean,
            report.kpis.cache_miss_mean,
            report.kpis.error_rate,
            report.kpis.warning_rate,
            report.ml.anomaly_score,
        ] {
            assert!(v.is_finite());
        }
        assert!(!report.bottlenecks.is_empty());
        assert!(report.ml.is_anomalous <= 1);
    }

    #[test]
    fn test_build_report_is_reproducible_with_seeded_scorer() {
        let analyzer = default_analyzer();
        let samples: Vec<Sample> = (0..30).map(|i| sample(20.0 + i as f64, 0.06, 0, 0)).collect();

        let a = analyzer.build_report(&samples).unwrap();
        let b = analyzer.build_report(&samples).unwrap();
        assert_eq!(a.ml, b.ml);
        assert_eq!(a.kpis, b.kpis);
    }
}
