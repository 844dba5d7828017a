//! Matching Phase Metrics
//!
//! Links accepted per cascade rule, exact keys rejected for being shared,
//! fuzzy score distribution and reference records left unmatched.

use crate::metrics::{phase_metric, MetricDoc, MetricType, PhaseMetrics};
use crate::types::MatchRule;

pub struct MatchingMetrics;

impl MatchingMetrics {
    /// Record the outcome of one cascade stage
    pub fn record_stage(rule: MatchRule, matched: usize, ambiguous_keys: usize) {
        ::metrics::counter!(phase_metric!(counter, "matching", "links"), "rule" => rule.as_str())
            .increment(matched as u64);
        if ambiguous_keys > 0 {
            ::metrics::counter!(
                phase_metric!(counter, "matching", "ambiguous_keys"),
                "rule" => rule.as_str()
            )
            .increment(ambiguous_keys as u64);
        }
    }

    pub fn record_fuzzy_score(score: f64) {
        ::metrics::histogram!(phase_metric!(histogram, "matching", "fuzzy_score")).record(score);
    }

    pub fn record_unmatched(unmatched: usize) {
        ::metrics::gauge!(phase_metric!(gauge, "matching", "unmatched_references"))
            .set(unmatched as f64);
    }

    /// Record the size of the inputs handed to the cascade
    pub fn record_inputs(references: usize, candidates: usize) {
        ::metrics::gauge!(phase_metric!(gauge, "matching", "reference_records"))
            .set(references as f64);
        ::metrics::gauge!(phase_metric!(gauge, "matching", "candidate_records"))
            .set(candidates as f64);
    }
}

impl PhaseMetrics for MatchingMetrics {
    fn register_metrics() {
        use metrics::{counter, gauge, histogram};

        for rule in MatchRule::all() {
            let _ = counter!(phase_metric!(counter, "matching", "links"), "rule" => rule.as_str());
        }
        let _ = histogram!(phase_metric!(histogram, "matching", "fuzzy_score"));
        let _ = gauge!(phase_metric!(gauge, "matching", "unmatched_references"));
        let _ = gauge!(phase_metric!(gauge, "matching", "reference_records"));
        let _ = gauge!(phase_metric!(gauge, "matching", "candidate_records"));
    }

    fn phase_name() -> &'static str {
        "matching"
    }

    fn metrics_documentation() -> Vec<MetricDoc> {
        vec![
            MetricDoc {
                name: phase_metric!(counter, "matching", "links"),
                metric_type: MetricType::Counter,
                help: "Links accepted by the match cascade",
                labels: vec!["rule"],
            },
            MetricDoc {
                name: phase_metric!(counter, "matching", "ambiguous_keys"),
                metric_type: MetricType::Counter,
                help: "Exact-match keys rejected because they are shared by several records",
                labels: vec!["rule"],
            },
            MetricDoc {
                name: phase_metric!(histogram, "matching", "fuzzy_score"),
                metric_type: MetricType::Histogram,
                help: "Token-set scores of accepted fuzzy name matches",
                labels: vec![],
            },
            MetricDoc {
                name: phase_metric!(gauge, "matching", "unmatched_references"),
                metric_type: MetricType::Gauge,
                help: "Reference records without a match after the cascade",
                labels: vec![],
            },
            MetricDoc {
                name: phase_metric!(gauge, "matching", "reference_records"),
                metric_type: MetricType::Gauge,
                help: "Reference records entering the cascade",
                labels: vec![],
            },
            MetricDoc {
                name: phase_metric!(gauge, "matching", "candidate_records"),
                metric_type: MetricType::Gauge,
                help: "Aggregated candidate records entering the cascade",
                labels: vec![],
            },
        ]
    }
}
