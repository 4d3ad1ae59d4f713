use crate::stats::PhaseStatistics;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VerdictThresholds {
    pub target_interval_ms: f64,
    pub acceptable_interval_ms: f64,
    pub min_throughput: f64,
    pub target_throughput: f64,
}

impl Default for VerdictThresholds {
    fn default() -> Self {
        Self {
            target_interval_ms: 85.0,
            acceptable_interval_ms: 100.0,
            min_throughput: 15_000.0,
            target_throughput: 18_000.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerdictTier {
    Target,
    Acceptable,
    Failing,
}

impl fmt::Display for VerdictTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VerdictTier::Target => write!(f, "TARGET MET"),
            VerdictTier::Acceptable => write!(f, "ACCEPTABLE"),
            VerdictTier::Failing => write!(f, "FAILING"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Verdict {
    pub tier: VerdictTier,
    pub mean_interval_ms: Option<f64>,
    pub throughput: f64,
    pub reason: String,
}

/// Grade loaded-phase cadence and throughput. Tiers are tried best first;
/// both limits are inclusive. A phase without samples always fails.
pub fn evaluate(
    loaded: Option<&PhaseStatistics>,
    throughput: f64,
    thresholds: &VerdictThresholds,
) -> Verdict {
    let Some(stats) = loaded else {
        return Verdict {
            tier: VerdictTier::Failing,
            mean_interval_ms: None,
            throughput,
            reason: "no blocks observed under load".to_string(),
        };
    };
    let mean = stats.mean;

    let rules = [
        (
            VerdictTier::Target,
            thresholds.target_interval_ms,
            thresholds.target_throughput,
        ),
        (
            VerdictTier::Acceptable,
            thresholds.acceptable_interval_ms,
            thresholds.min_throughput,
        ),
    ];

    for (tier, max_interval, min_tps) in rules {
        if mean <= max_interval && throughput >= min_tps {
            return Verdict {
                tier,
                mean_interval_ms: Some(mean),
                throughput,
                reason: format!(
                    "mean {:.1}ms <= {}ms at {:.0} tx/s >= {:.0} tx/s",
                    mean, max_interval, throughput, min_tps
                ),
            };
        }
    }

    let mut misses = Vec::new();
    if mean > thresholds.acceptable_interval_ms {
        misses.push(format!(
            "mean {:.1}ms exceeds {}ms",
            mean, thresholds.acceptable_interval_ms
        ));
    }
    if throughput < thresholds.min_throughput {
        misses.push(format!(
            "{:.0} tx/s below {:.0} tx/s",
            throughput, thresholds.min_throughput
        ));
    }
    Verdict {
        tier: VerdictTier::Failing,
        mean_interval_ms: Some(mean),
        throughput,
        reason: misses.join(", "),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stats::summarize;

    fn thresholds() -> VerdictThresholds {
        VerdictThresholds::default()
    }

    fn grade(mean: f64, tps: f64) -> VerdictTier {
        let stats = summarize(&[mean]).unwrap();
        evaluate(Some(&stats), tps, &thresholds()).tier
    }

    #[test]
    fn test_acceptable_tier() {
        assert_eq!(grade(90.0, 16_000.0), VerdictTier::Acceptable);
    }

    #[test]
    fn test_boundaries_are_inclusive() {
        assert_eq!(grade(85.0, 18_000.0), VerdictTier::Target);
        assert_eq!(grade(100.0, 15_000.0), VerdictTier::Acceptable);
        assert_eq!(grade(100.01, 15_000.0), VerdictTier::Failing);
    }

    #[test]
    fn test_fast_blocks_need_target_throughput() {
        assert_eq!(grade(70.0, 17_999.0), VerdictTier::Acceptable);
        assert_eq!(grade(70.0, 14_999.0), VerdictTier::Failing);
    }

    #[test]
    fn test_failing_reason_names_misses() {
        let stats = summarize(&[150.0]).unwrap();
        let verdict = evaluate(Some(&stats), 1_000.0, &thresholds());
        assert_eq!(verdict.tier, VerdictTier::Failing);
        assert!(verdict.reason.contains("exceeds"));
        assert!(verdict.reason.contains("below"));
    }

    #[test]
    fn test_no_data_fails() {
        let verdict = evaluate(None, 20_000.0, &thresholds());
        assert_eq!(verdict.tier, VerdictTier::Failing);
        assert_eq!(verdict.mean_interval_ms, None);
    }
}
