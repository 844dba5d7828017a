use serde::Serialize;
use tracing::{debug, info, warn};

use crate::constants;
use crate::error::{MergeError, Result};
use crate::pipeline::processing::aggregate::AggregatedCandidates;
use crate::pipeline::processing::conflation::Linkage;
use crate::types::{format_score, CandidateId, FacilityRecord, MatchRule, RecordSet, ReferenceId};

/// Why an enrichment was applied
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchProvenance {
    pub candidate_id: CandidateId,
    pub candidate_source: String,
    pub candidate_name: String,
    pub rule: MatchRule,
    pub score: Option<f64>,
}

/// A reference record with supplemental fields from its matched candidate
#[derive(Debug, Clone, PartialEq)]
pub struct EnrichedRecord {
    pub reference_id: ReferenceId,
    pub record: FacilityRecord,
    /// `None` when no rule matched this reference
    pub provenance: Option<MatchProvenance>,
}

/// Every reference record exactly once, in reference order
#[derive(Debug, Clone, Default)]
pub struct EnrichedDataset {
    /// Reference columns followed by enrichment columns not already present
    pub columns: Vec<String>,
    pub records: Vec<EnrichedRecord>,
    /// Enrichment columns no candidate source provides
    pub missing_columns: Vec<String>,
}

impl EnrichedDataset {
    pub fn matched(&self) -> usize {
        self.records.iter().filter(|r| r.provenance.is_some()).count()
    }

    pub fn count_with(&self, column: &str) -> usize {
        self.records.iter().filter(|r| r.record.has(column)).count()
    }

    /// Enriched table with `match_rule` and `score` appended
    pub fn to_record_set(&self) -> RecordSet {
        let mut columns: Vec<String> = self
            .columns
            .iter()
            .filter(|c| {
                c.as_str() != constants::COLUMN_MATCH_RULE && c.as_str() != constants::COLUMN_SCORE
            })
            .cloned()
            .collect();
        columns.push(constants::COLUMN_MATCH_RULE.to_string());
        columns.push(constants::COLUMN_SCORE.to_string());

        let records = self
            .records
            .iter()
            .map(|enriched| {
                let mut row = enriched.record.clone();
                // Reference values never carry provenance columns into the output
                row.set(constants::COLUMN_MATCH_RULE, "");
                row.set(constants::COLUMN_SCORE, "");
                if let Some(p) = &enriched.provenance {
                    row.set(constants::COLUMN_MATCH_RULE, p.rule.as_str());
                    row.set(constants::COLUMN_SCORE, format_score(p.score));
                }
                row
            })
            .collect();
        RecordSet::new(columns, records)
    }

    /// One audit row per reference record, matched or not
    pub fn to_audit_set(&self) -> RecordSet {
        let columns = [
            constants::COLUMN_REFERENCE_ID,
            constants::FIELD_NAME,
            constants::FIELD_PLZ,
            constants::FIELD_ORT,
            constants::COLUMN_CANDIDATE_ID,
            constants::COLUMN_CANDIDATE_SOURCE,
            constants::COLUMN_CANDIDATE_NAME,
            constants::COLUMN_MATCH_RULE,
            constants::COLUMN_SCORE,
        ]
        .iter()
        .map(|c| c.to_string())
        .collect();

        let records = self
            .records
            .iter()
            .map(|enriched| {
                let mut row = FacilityRecord::new();
                row.set(constants::COLUMN_REFERENCE_ID, enriched.reference_id.to_string());
                for field in [constants::FIELD_NAME, constants::FIELD_PLZ, constants::FIELD_ORT] {
                    row.set(field, enriched.record.get_or_empty(field));
                }
                if let Some(p) = &enriched.provenance {
                    row.set(constants::COLUMN_CANDIDATE_ID, p.candidate_id.to_string());
                    row.set(constants::COLUMN_CANDIDATE_SOURCE, p.candidate_source.as_str());
                    row.set(constants::COLUMN_CANDIDATE_NAME, p.candidate_name.as_str());
                    row.set(constants::COLUMN_MATCH_RULE, p.rule.as_str());
                    row.set(constants::COLUMN_SCORE, format_score(p.score));
                }
                row
            })
            .collect();
        RecordSet::new(columns, records)
    }
}

/// Copies a fixed set of supplemental fields from matched candidates onto
/// copies of their reference records
#[derive(Debug, Clone)]
pub struct Enricher {
    columns: Vec<String>,
}

impl Default for Enricher {
    fn default() -> Self {
        Self {
            columns: constants::DEFAULT_ENRICH_COLUMNS.iter().map(|c| c.to_string()).collect(),
        }
    }
}

impl Enricher {
    /// Rejects enrichment sets that would overwrite identity fields
    pub fn new(columns: Vec<String>) -> Result<Self> {
        if let Some(column) = columns.iter().find(|c| constants::is_identity_field(c)) {
            return Err(MergeError::Config(format!(
                "enrichment column '{}' is an identity field",
                column
            )));
        }
        Ok(Self { columns })
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn enrich(
        &self,
        reference: &RecordSet,
        candidates: &AggregatedCandidates,
        linkage: &Linkage,
    ) -> Result<EnrichedDataset> {
        if linkage.reference_count != reference.len()
            || linkage.candidate_count != candidates.len()
        {
            return Err(MergeError::RunIntegrity(format!(
                "linkage built for {}x{} records, enriching {}x{}",
                linkage.reference_count,
                linkage.candidate_count,
                reference.len(),
                candidates.len()
            )));
        }

        let missing_columns: Vec<String> = self
            .columns
            .iter()
            .filter(|c| !candidates.has_column(c))
            .cloned()
            .collect();
        if !missing_columns.is_empty() {
            warn!(
                columns = ?missing_columns,
                "Enrichment columns missing from every candidate source, emitting them empty"
            );
        }

        let mut columns = reference.columns.clone();
        for column in &self.columns {
            if !columns.contains(column) {
                columns.push(column.clone());
            }
        }

        let by_reference = linkage.by_reference();
        let mut records = Vec::with_capacity(reference.len());

        for (index, base) in reference.records.iter().enumerate() {
            let reference_id = ReferenceId(index);
            let mut record = base.clone();
            let provenance = match by_reference.get(&reference_id) {
                Some(m) => {
                    let candidate = candidates.get(m.candidate_id).ok_or_else(|| {
                        MergeError::RunIntegrity(format!(
                            "candidate {} does not exist",
                            m.candidate_id
                        ))
                    })?;
                    for column in &self.columns {
                        if let Some(value) = candidate.get(column) {
                            record.set(column.as_str(), value);
                        }
                    }
                    debug!(
                        reference = %reference_id,
                        candidate = %m.candidate_id,
                        rule = %m.rule,
                        "Reference enriched"
                    );
                    Some(MatchProvenance {
                        candidate_id: m.candidate_id,
                        candidate_source: candidates.source_of(m.candidate_id).to_string(),
                        candidate_name: candidate.name().to_string(),
                        rule: m.rule,
                        score: m.score,
                    })
                }
                None => None,
            };
            records.push(EnrichedRecord {
                reference_id,
                record,
                provenance,
            });
        }

        let dataset = EnrichedDataset {
            columns,
            records,
            missing_columns,
        };
        info!(
            rows = dataset.records.len(),
            matched = dataset.matched(),
            columns = dataset.columns.len(),
            "Reference records enriched"
        );
        Ok(dataset)
    }
}
