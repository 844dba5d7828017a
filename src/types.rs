use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::constants;

/// One childcare facility as a flat mapping of named fields.
///
/// Empty values are never stored, so a missing field and a blank cell look
/// the same to every consumer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FacilityRecord {
    fields: BTreeMap<String, String>,
}

impl FacilityRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a record from `(field, value)` pairs, dropping blank values
    pub fn from_pairs<K, V, I>(pairs: I) -> Self
    where
        K: Into<String>,
        V: Into<String>,
        I: IntoIterator<Item = (K, V)>,
    {
        let mut record = Self::new();
        for (k, v) in pairs {
            record.set(k, v);
        }
        record
    }

    /// Field value, `None` when missing or blank
    pub fn get(&self, field: &str) -> Option<&str> {
        self.fields.get(field).map(String::as_str)
    }

    /// Field value with missing mapped to the empty string
    pub fn get_or_empty(&self, field: &str) -> &str {
        self.get(field).unwrap_or("")
    }

    /// Set a field. Blank values remove the field instead.
    pub fn set(&mut self, field: impl Into<String>, value: impl Into<String>) {
        let field = field.into();
        let value = value.into();
        let trimmed = value.trim();
        if trimmed.is_empty() {
            self.fields.remove(&field);
        } else if trimmed.len() == value.len() {
            self.fields.insert(field, value);
        } else {
            self.fields.insert(field, trimmed.to_string());
        }
    }

    pub fn has(&self, field: &str) -> bool {
        self.fields.contains_key(field)
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn name(&self) -> &str {
        self.get_or_empty(constants::FIELD_NAME)
    }
}

/// A table of facility records plus the column order they were read with
#[derive(Debug, Clone, Default)]
pub struct RecordSet {
    pub columns: Vec<String>,
    pub records: Vec<FacilityRecord>,
}

impl RecordSet {
    pub fn new(columns: Vec<String>, records: Vec<FacilityRecord>) -> Self {
        Self { columns, records }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Columns that have no value in any record
    pub fn empty_columns(&self) -> Vec<String> {
        self.columns
            .iter()
            .filter(|c| !self.records.iter().any(|r| r.has(c)))
            .cloned()
            .collect()
    }

    /// Number of records carrying a value in `column`
    pub fn count_with(&self, column: &str) -> usize {
        self.records.iter().filter(|r| r.has(column)).count()
    }
}

/// Position of a record in the reference set
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ReferenceId(pub usize);

/// Within-run identifier of an aggregated candidate record
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CandidateId(pub usize);

impl fmt::Display for ReferenceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for CandidateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The cascade rule that justified a link, strongest first
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchRule {
    Email,
    Phone,
    FuzzyName,
}

impl MatchRule {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchRule::Email => constants::RULE_EMAIL,
            MatchRule::Phone => constants::RULE_PHONE,
            MatchRule::FuzzyName => constants::RULE_FUZZY_NAME,
        }
    }

    pub fn all() -> [MatchRule; 3] {
        [MatchRule::Email, MatchRule::Phone, MatchRule::FuzzyName]
    }
}

impl fmt::Display for MatchRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One accepted link between a reference record and a candidate record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchResult {
    pub reference_id: ReferenceId,
    pub candidate_id: CandidateId,
    pub rule: MatchRule,
    /// Token-set score for fuzzy matches, `None` for exact rules
    pub score: Option<f64>,
}

impl MatchResult {
    /// Score as written to the artifacts: two decimals, empty for exact rules
    pub fn score_label(&self) -> String {
        format_score(self.score)
    }
}

pub fn format_score(score: Option<f64>) -> String {
    score.map(|s| format!("{:.2}", s)).unwrap_or_default()
}
