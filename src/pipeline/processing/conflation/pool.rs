use std::collections::BTreeSet;

use crate::error::{MergeError, Result};
use crate::types::{CandidateId, MatchResult, ReferenceId};

/// The records still available for matching on both sides of the cascade.
///
/// Stages never remove records from the input sets; they consume ids from
/// this pool instead. A consumed id can never be consumed again.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchPool {
    references: BTreeSet<ReferenceId>,
    candidates: BTreeSet<CandidateId>,
}

impl MatchPool {
    pub fn new(reference_count: usize, candidate_count: usize) -> Self {
        Self {
            references: (0..reference_count).map(ReferenceId).collect(),
            candidates: (0..candidate_count).map(CandidateId).collect(),
        }
    }

    pub fn has_reference(&self, id: ReferenceId) -> bool {
        self.references.contains(&id)
    }

    pub fn has_candidate(&self, id: CandidateId) -> bool {
        self.candidates.contains(&id)
    }

    /// Available reference ids in ascending order
    pub fn references(&self) -> impl Iterator<Item = ReferenceId> + '_ {
        self.references.iter().copied()
    }

    /// Available candidate ids in ascending order
    pub fn candidates(&self) -> impl Iterator<Item = CandidateId> + '_ {
        self.candidates.iter().copied()
    }

    pub fn reference_count(&self) -> usize {
        self.references.len()
    }

    pub fn candidate_count(&self) -> usize {
        self.candidates.len()
    }

    /// Remove both sides of an accepted match from the pool
    pub fn consume(&mut self, result: &MatchResult) -> Result<()> {
        if !self.has_reference(result.reference_id) {
            return Err(MergeError::RunIntegrity(format!(
                "reference {} not available in pool (rule {})",
                result.reference_id, result.rule
            )));
        }
        if !self.has_candidate(result.candidate_id) {
            return Err(MergeError::RunIntegrity(format!(
                "candidate {} not available in pool (rule {})",
                result.candidate_id, result.rule
            )));
        }
        self.references.remove(&result.reference_id);
        self.candidates.remove(&result.candidate_id);
        Ok(())
    }
}
