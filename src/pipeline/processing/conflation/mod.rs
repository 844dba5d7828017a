//! Record linkage between the reference register and aggregated candidates.
//!
//! The [`Matcher`] runs a cascade of rules, strongest first. Each rule only
//! sees records that no earlier rule consumed, and every accepted link is
//! removed from the shared [`MatchPool`] before the next rule runs.

pub mod exact;
pub mod fuzzy;
pub mod pool;
pub mod similarity;

use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use tracing::{info, warn};

use crate::constants::FUZZY_SCORE_CUTOFF;
use crate::error::{MergeError, Result};
use crate::metrics::matching::MatchingMetrics;
use crate::pipeline::processing::normalize::NormalizedKeySet;
use crate::types::{CandidateId, MatchResult, MatchRule, ReferenceId};

pub use pool::MatchPool;

/// What one rule proposed against the current pool
#[derive(Debug, Clone, Default)]
pub struct StageOutput {
    pub matches: Vec<MatchResult>,
    pub ambiguous_keys: usize,
    pub compared_pairs: usize,
}

/// One step of the cascade
pub trait MatchStage {
    fn rule(&self) -> MatchRule;

    /// Propose links among pooled records. Must not assume anything about
    /// records outside the pool.
    fn propose(
        &self,
        references: &[NormalizedKeySet],
        candidates: &[NormalizedKeySet],
        pool: &MatchPool,
    ) -> StageOutput;
}

/// Cardinality-checked exact match on the normalized email
pub struct EmailStage;

/// Cardinality-checked exact match on the phone digits
pub struct PhoneStage;

/// Blocked greedy fuzzy match on the name tokens
pub struct FuzzyNameStage {
    pub cutoff: f64,
}

fn email_key(keys: &NormalizedKeySet) -> &str {
    &keys.email_norm
}

fn phone_key(keys: &NormalizedKeySet) -> &str {
    &keys.telefon_norm
}

impl MatchStage for EmailStage {
    fn rule(&self) -> MatchRule {
        MatchRule::Email
    }

    fn propose(
        &self,
        references: &[NormalizedKeySet],
        candidates: &[NormalizedKeySet],
        pool: &MatchPool,
    ) -> StageOutput {
        let out = exact::match_unique_key(self.rule(), references, candidates, pool, email_key);
        StageOutput {
            matches: out.matches,
            ambiguous_keys: out.ambiguous_keys,
            compared_pairs: 0,
        }
    }
}

impl MatchStage for PhoneStage {
    fn rule(&self) -> MatchRule {
        MatchRule::Phone
    }

    fn propose(
        &self,
        references: &[NormalizedKeySet],
        candidates: &[NormalizedKeySet],
        pool: &MatchPool,
    ) -> StageOutput {
        let out = exact::match_unique_key(self.rule(), references, candidates, pool, phone_key);
        StageOutput {
            matches: out.matches,
            ambiguous_keys: out.ambiguous_keys,
            compared_pairs: 0,
        }
    }
}

impl MatchStage for FuzzyNameStage {
    fn rule(&self) -> MatchRule {
        MatchRule::FuzzyName
    }

    fn propose(
        &self,
        references: &[NormalizedKeySet],
        candidates: &[NormalizedKeySet],
        pool: &MatchPool,
    ) -> StageOutput {
        let out = fuzzy::match_blocked_names(references, candidates, pool, self.cutoff);
        for m in &out.matches {
            if let Some(score) = m.score {
                MatchingMetrics::record_fuzzy_score(score);
            }
        }
        StageOutput {
            matches: out.matches,
            ambiguous_keys: 0,
            compared_pairs: out.compared_pairs,
        }
    }
}

/// Effect of one stage on the pool
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StageReport {
    pub rule: MatchRule,
    pub matched: usize,
    pub ambiguous_keys: usize,
    pub compared_pairs: usize,
    pub references_remaining: usize,
    pub candidates_remaining: usize,
}

/// The partial injective mapping produced by one cascade run
#[derive(Debug, Clone, Default)]
pub struct Linkage {
    pub matches: Vec<MatchResult>,
    pub stages: Vec<StageReport>,
    pub reference_count: usize,
    pub candidate_count: usize,
}

impl Linkage {
    /// Matches keyed by reference id
    pub fn by_reference(&self) -> BTreeMap<ReferenceId, &MatchResult> {
        self.matches.iter().map(|m| (m.reference_id, m)).collect()
    }

    pub fn count_for(&self, rule: MatchRule) -> usize {
        self.matches.iter().filter(|m| m.rule == rule).count()
    }

    pub fn unmatched_references(&self) -> usize {
        self.reference_count - self.matches.len()
    }

    /// Check the 1:1 invariant over the whole cascade
    pub fn verify(&self) -> Result<()> {
        let mut seen_references: BTreeSet<ReferenceId> = BTreeSet::new();
        let mut seen_candidates: BTreeSet<CandidateId> = BTreeSet::new();
        for m in &self.matches {
            if m.reference_id.0 >= self.reference_count
                || m.candidate_id.0 >= self.candidate_count
            {
                return Err(MergeError::RunIntegrity(format!(
                    "link {} -> {} points outside the input sets",
                    m.reference_id, m.candidate_id
                )));
            }
            if !seen_references.insert(m.reference_id) {
                return Err(MergeError::RunIntegrity(format!(
                    "reference {} has more than one match",
                    m.reference_id
                )));
            }
            if !seen_candidates.insert(m.candidate_id) {
                return Err(MergeError::RunIntegrity(format!(
                    "candidate {} has more than one match",
                    m.candidate_id
                )));
            }
        }
        Ok(())
    }
}

/// Runs the match cascade
pub struct Matcher {
    stages: Vec<Box<dyn MatchStage>>,
}

impl Default for Matcher {
    fn default() -> Self {
        Self::with_stages(vec![
            Box::new(EmailStage),
            Box::new(PhoneStage),
            Box::new(FuzzyNameStage {
                cutoff: FUZZY_SCORE_CUTOFF,
            }),
        ])
    }
}

impl Matcher {
    /// Email, then phone, then blocked fuzzy name at the standard cutoff
    pub fn new() -> Self {
        Self::default()
    }

    /// A cascade with custom stages, run in the given order
    pub fn with_stages(stages: Vec<Box<dyn MatchStage>>) -> Self {
        Self { stages }
    }

    /// Link references to candidates. Both slices are indexed by their ids.
    pub fn run(
        &self,
        references: &[NormalizedKeySet],
        candidates: &[NormalizedKeySet],
    ) -> Result<Linkage> {
        let mut pool = MatchPool::new(references.len(), candidates.len());
        let mut linkage = Linkage {
            reference_count: references.len(),
            candidate_count: candidates.len(),
            ..Default::default()
        };

        for stage in &self.stages {
            let rule = stage.rule();
            let output = stage.propose(references, candidates, &pool);

            for m in &output.matches {
                pool.consume(m)?;
            }

            let report = StageReport {
                rule,
                matched: output.matches.len(),
                ambiguous_keys: output.ambiguous_keys,
                compared_pairs: output.compared_pairs,
                references_remaining: pool.reference_count(),
                candidates_remaining: pool.candidate_count(),
            };
            info!(
                rule = %rule,
                matched = report.matched,
                ambiguous_keys = report.ambiguous_keys,
                references_remaining = report.references_remaining,
                candidates_remaining = report.candidates_remaining,
                "Match stage finished"
            );
            MatchingMetrics::record_stage(rule, report.matched, report.ambiguous_keys);

            linkage.matches.extend(output.matches);
            linkage.stages.push(report);
        }

        linkage.verify()?;

        let unmatched = linkage.unmatched_references();
        if unmatched > 0 {
            warn!(
                unmatched,
                total = linkage.reference_count,
                "Reference records left without a match"
            );
        }
        MatchingMetrics::record_unmatched(unmatched);

        Ok(linkage)
    }
}
