use serde::Serialize;
use tracing::info;

use crate::constants;
use crate::types::{CandidateId, FacilityRecord, RecordSet};

/// Records from one provider source, already in the shared facility shape
#[derive(Debug, Clone)]
pub struct SourceBatch {
    pub source: String,
    pub records: RecordSet,
}

impl SourceBatch {
    pub fn new(source: impl Into<String>, records: RecordSet) -> Self {
        Self {
            source: source.into(),
            records,
        }
    }
}

/// Per-source diagnostics gathered while aggregating
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceReport {
    pub source: String,
    pub rows: usize,
    pub empty_columns: Vec<String>,
    pub with_operator: usize,
}

/// The union of every provider source, each record tagged with its origin.
///
/// A record's [`CandidateId`] is its position here: sources in the order they
/// were added, rows in file order.
#[derive(Debug, Clone, Default)]
pub struct AggregatedCandidates {
    /// Union of source columns in first-seen order, without pipeline columns
    pub columns: Vec<String>,
    pub records: Vec<FacilityRecord>,
    pub reports: Vec<SourceReport>,
}

impl AggregatedCandidates {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, id: CandidateId) -> Option<&FacilityRecord> {
        self.records.get(id.0)
    }

    pub fn source_of(&self, id: CandidateId) -> &str {
        self.get(id)
            .map(|r| r.get_or_empty(constants::COLUMN_SOURCE))
            .unwrap_or("")
    }

    pub fn has_column(&self, column: &str) -> bool {
        self.columns.iter().any(|c| c == column)
    }

    pub fn count_with(&self, column: &str) -> usize {
        self.records.iter().filter(|r| r.has(column)).count()
    }

    /// Tabular form with `candidate_id` and `source` leading
    pub fn to_record_set(&self) -> RecordSet {
        let mut columns = vec![
            constants::COLUMN_CANDIDATE_ID.to_string(),
            constants::COLUMN_SOURCE.to_string(),
        ];
        columns.extend(
            self.columns
                .iter()
                .filter(|c| {
                    c.as_str() != constants::COLUMN_SOURCE
                        && c.as_str() != constants::COLUMN_CANDIDATE_ID
                })
                .cloned(),
        );
        let records = self
            .records
            .iter()
            .enumerate()
            .map(|(i, r)| {
                let mut row = r.clone();
                row.set(constants::COLUMN_CANDIDATE_ID, i.to_string());
                row
            })
            .collect();
        RecordSet::new(columns, records)
    }
}

/// Concatenates provider sources into one candidate set. Does not deduplicate.
#[derive(Debug, Default)]
pub struct SourceAggregator {
    aggregated: AggregatedCandidates,
}

impl SourceAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, batch: SourceBatch) {
        let SourceBatch { source, records } = batch;

        let report = SourceReport {
            source: source.clone(),
            rows: records.len(),
            empty_columns: records.empty_columns(),
            with_operator: records.count_with(constants::FIELD_TRAEGER),
        };
        info!(
            source = %source,
            rows = report.rows,
            empty_columns = report.empty_columns.len(),
            "Source aggregated"
        );

        for column in &records.columns {
            if !self.aggregated.has_column(column) {
                self.aggregated.columns.push(column.clone());
            }
        }
        for mut record in records.records {
            record.set(constants::COLUMN_SOURCE, source.as_str());
            self.aggregated.records.push(record);
        }
        self.aggregated.reports.push(report);
    }

    pub fn finish(self) -> AggregatedCandidates {
        info!(
            sources = self.aggregated.reports.len(),
            rows = self.aggregated.len(),
            columns = self.aggregated.columns.len(),
            "Candidate sources aggregated"
        );
        self.aggregated
    }

    /// Aggregate a list of batches in order
    pub fn aggregate(batches: impl IntoIterator<Item = SourceBatch>) -> AggregatedCandidates {
        let mut aggregator = Self::new();
        for batch in batches {
            aggregator.add(batch);
        }
        aggregator.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn batch(source: &str, columns: &[&str], rows: &[&[(&str, &str)]]) -> SourceBatch {
        SourceBatch::new(
            source,
            RecordSet::new(
                columns.iter().map(|c| c.to_string()).collect(),
                rows.iter()
                    .map(|pairs| FacilityRecord::from_pairs(pairs.iter().copied()))
                    .collect(),
            ),
        )
    }

    #[test]
    fn test_union_tags_and_ids() {
        let aggregated = SourceAggregator::aggregate([
            batch(
                "stadt_linz",
                &["name", "kosten"],
                &[&[("name", "KG A")], &[("name", "KG B")]],
            ),
            batch(
                "caritas",
                &["name", "traeger", "email"],
                &[&[("name", "KG C"), ("traeger", "Caritas")]],
            ),
        ]);

        assert_eq!(aggregated.len(), 3);
        assert_eq!(aggregated.columns, vec!["name", "kosten", "traeger", "email"]);
        assert_eq!(aggregated.source_of(CandidateId(0)), "stadt_linz");
        assert_eq!(aggregated.source_of(CandidateId(2)), "caritas");
        assert_eq!(aggregated.get(CandidateId(1)).unwrap().name(), "KG B");
        assert_eq!(aggregated.source_of(CandidateId(9)), "");
    }

    #[test]
    fn test_duplicates_across_sources_are_kept() {
        let row: &[(&str, &str)] = &[("name", "KG A"), ("email", "a@x.at")];
        let aggregated = SourceAggregator::aggregate([
            batch("one", &["name", "email"], &[row]),
            batch("two", &["name", "email"], &[row]),
        ]);
        assert_eq!(aggregated.len(), 2);
    }

    #[test]
    fn test_reports() {
        let aggregated = SourceAggregator::aggregate([batch(
            "familienbund",
            &["name", "kosten", "traeger"],
            &[&[("name", "KG A"), ("traeger", "Familienbund OÖ")], &[("name", "KG B")]],
        )]);
        let report = &aggregated.reports[0];
        assert_eq!(report.rows, 2);
        assert_eq!(report.empty_columns, vec!["kosten".to_string()]);
        assert_eq!(report.with_operator, 1);
    }

    #[test]
    fn test_record_set_layout() {
        let aggregated = SourceAggregator::aggregate([batch(
            "kinderfreunde",
            &["name"],
            &[&[("name", "KG A")]],
        )]);
        let set = aggregated.to_record_set();
        assert_eq!(set.columns, vec!["candidate_id", "source", "name"]);
        assert_eq!(set.records[0].get("candidate_id"), Some("0"));
        assert_eq!(set.records[0].get("source"), Some("kinderfreunde"));
    }
}
