use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;
use uuid::Uuid;

use crate::constants;
use crate::error::Result;
use crate::pipeline::processing::aggregate::{AggregatedCandidates, SourceReport};
use crate::pipeline::processing::conflation::{Linkage, StageReport};
use crate::pipeline::processing::enrich::EnrichedDataset;
use crate::types::MatchRule;

/// Fingerprint of one input file
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InputDigest {
    pub name: String,
    pub path: PathBuf,
    pub sha256: String,
    pub rows: usize,
}

/// How many records carry an operator before and after enrichment
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OperatorCoverage {
    pub scraped_with_operator: usize,
    pub scraped_total: usize,
    pub enriched_with_operator: usize,
    pub enriched_total: usize,
    /// `enriched_with_operator / scraped_with_operator`, absent when nothing
    /// was scraped with an operator
    pub landed_share: Option<f64>,
}

impl OperatorCoverage {
    pub fn measure(candidates: &AggregatedCandidates, enriched: &EnrichedDataset) -> Self {
        let scraped_with_operator = candidates.count_with(constants::FIELD_TRAEGER);
        let enriched_with_operator = enriched.count_with(constants::FIELD_TRAEGER);
        let landed_share = if scraped_with_operator == 0 {
            None
        } else {
            Some(enriched_with_operator as f64 / scraped_with_operator as f64)
        };
        Self {
            scraped_with_operator,
            scraped_total: candidates.len(),
            enriched_with_operator,
            enriched_total: enriched.records.len(),
            landed_share,
        }
    }
}

/// Machine-readable record of one merge run, written next to the artifacts
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub lookup_version: String,
    pub inputs: Vec<InputDigest>,
    pub skipped_sources: Vec<String>,
    pub sources: Vec<SourceReport>,
    pub reference_rows: usize,
    pub candidate_rows: usize,
    pub stages: Vec<StageReport>,
    pub matched_by_rule: BTreeMap<String, usize>,
    pub matched_total: usize,
    pub unmatched_references: usize,
    pub missing_enrichment_columns: Vec<String>,
    pub coverage: OperatorCoverage,
}

impl RunSummary {
    pub fn matched_by_rule(linkage: &Linkage) -> BTreeMap<String, usize> {
        MatchRule::all()
            .into_iter()
            .map(|rule| (rule.as_str().to_string(), linkage.count_for(rule)))
            .collect()
    }

    /// Pretty JSON, written atomically
    pub fn write(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let json = serde_json::to_string_pretty(self)?;
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, json)?;
        fs::rename(&tmp, path)?;
        info!(path = %path.display(), run_id = %self.run_id, "Wrote run summary");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::processing::aggregate::{SourceAggregator, SourceBatch};
    use crate::types::{CandidateId, FacilityRecord, MatchResult, RecordSet, ReferenceId};

    fn sample() -> RunSummary {
        let linkage = Linkage {
            matches: vec![MatchResult {
                reference_id: ReferenceId(0),
                candidate_id: CandidateId(0),
                rule: MatchRule::Phone,
                score: None,
            }],
            stages: Vec::new(),
            reference_count: 2,
            candidate_count: 1,
        };
        let now = Utc::now();
        RunSummary {
            run_id: Uuid::new_v4(),
            started_at: now,
            finished_at: now,
            lookup_version: "test".to_string(),
            inputs: Vec::new(),
            skipped_sources: vec!["caritas".to_string()],
            sources: Vec::new(),
            reference_rows: 2,
            candidate_rows: 1,
            stages: Vec::new(),
            matched_by_rule: RunSummary::matched_by_rule(&linkage),
            matched_total: linkage.matches.len(),
            unmatched_references: linkage.unmatched_references(),
            missing_enrichment_columns: Vec::new(),
            coverage: OperatorCoverage {
                scraped_with_operator: 0,
                scraped_total: 1,
                enriched_with_operator: 0,
                enriched_total: 2,
                landed_share: None,
            },
        }
    }

    #[test]
    fn test_matched_by_rule_lists_every_rule() {
        let summary = sample();
        assert_eq!(summary.matched_by_rule.len(), 3);
        assert_eq!(summary.matched_by_rule["phone"], 1);
        assert_eq!(summary.matched_by_rule["email"], 0);
        assert_eq!(summary.unmatched_references, 1);
    }

    #[test]
    fn test_write_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("merge_summary.json");
        sample().write(&path).unwrap();

        let value: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(value["matched_by_rule"]["fuzzy_name"], 0);
        assert_eq!(value["skipped_sources"][0], "caritas");
        assert!(value["coverage"]["landed_share"].is_null());
        assert!(!path.with_extension("json.tmp").exists());
    }

    #[test]
    fn test_operator_coverage() {
        let candidates = SourceAggregator::aggregate([SourceBatch::new(
            "caritas",
            RecordSet::new(
                vec!["name".into(), "traeger".into()],
                vec![
                    FacilityRecord::from_pairs([("name", "KG A"), ("traeger", "Caritas")]),
                    FacilityRecord::from_pairs([("name", "KG B"), ("traeger", "Caritas")]),
                ],
            ),
        )]);
        let mut enriched = EnrichedDataset::default();
        enriched.records.push(crate::pipeline::processing::enrich::EnrichedRecord {
            reference_id: ReferenceId(0),
            record: FacilityRecord::from_pairs([("traeger", "Caritas")]),
            provenance: None,
        });

        let coverage = OperatorCoverage::measure(&candidates, &enriched);
        assert_eq!(coverage.scraped_with_operator, 2);
        assert_eq!(coverage.enriched_with_operator, 1);
        assert_eq!(coverage.landed_share, Some(0.5));
    }
}
