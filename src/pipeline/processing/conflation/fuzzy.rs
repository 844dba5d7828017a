use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

use super::pool::MatchPool;
use super::similarity::token_set_ratio;
use crate::pipeline::processing::normalize::{BlockKey, NormalizedKeySet};
use crate::types::{CandidateId, MatchResult, MatchRule, ReferenceId};

/// Links proposed by the blocked fuzzy name rule
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FuzzyMatchOutput {
    pub matches: Vec<MatchResult>,
    /// Blocks holding at least one pooled record on each side
    pub blocks: usize,
    /// Name pairs scored across all blocks
    pub compared_pairs: usize,
}

#[derive(Default)]
struct Block {
    references: Vec<ReferenceId>,
    candidates: Vec<CandidateId>,
}

/// Whether a token-set score clears the cutoff. The cutoff is inclusive.
pub fn accepts(score: f64, cutoff: f64) -> bool {
    score >= cutoff
}

/// Greedy 1:1 name matching inside `(plz, ort, art)` blocks.
///
/// Within a block every pooled reference is scored against every pooled
/// candidate; pairs clearing the cutoff are taken highest score first, ties
/// broken by lower reference id, then lower candidate id, skipping pairs whose
/// records were already taken. Blocks are visited in ascending key order.
/// Records with an incomplete block key are never compared. This is a local
/// heuristic, not a maximum-weight assignment.
pub fn match_blocked_names(
    references: &[NormalizedKeySet],
    candidates: &[NormalizedKeySet],
    pool: &MatchPool,
    cutoff: f64,
) -> FuzzyMatchOutput {
    let mut blocks: BTreeMap<BlockKey, Block> = BTreeMap::new();
    for id in pool.references() {
        if let Some(key) = references[id.0].block_key() {
            blocks.entry(key).or_default().references.push(id);
        }
    }
    for id in pool.candidates() {
        if let Some(key) = candidates[id.0].block_key() {
            blocks.entry(key).or_default().candidates.push(id);
        }
    }

    let mut output = FuzzyMatchOutput::default();
    let mut taken_references: BTreeSet<ReferenceId> = BTreeSet::new();
    let mut taken_candidates: BTreeSet<CandidateId> = BTreeSet::new();

    for (key, block) in &blocks {
        if block.references.is_empty() || block.candidates.is_empty() {
            continue;
        }
        output.blocks += 1;

        let mut scored: Vec<(f64, ReferenceId, CandidateId)> = Vec::new();
        for &reference_id in &block.references {
            let reference_name = &references[reference_id.0].name_norm;
            for &candidate_id in &block.candidates {
                let score = token_set_ratio(reference_name, &candidates[candidate_id.0].name_norm);
                output.compared_pairs += 1;
                if accepts(score, cutoff) {
                    scored.push((score, reference_id, candidate_id));
                }
            }
        }

        scored.sort_by(|a, b| b.0.total_cmp(&a.0).then(a.1.cmp(&b.1)).then(a.2.cmp(&b.2)));

        for (score, reference_id, candidate_id) in scored {
            if taken_references.contains(&reference_id)
                || taken_candidates.contains(&candidate_id)
            {
                continue;
            }
            debug!(
                plz = %key.plz,
                ort = %key.ort,
                art = %key.art,
                reference = %reference_id,
                candidate = %candidate_id,
                score,
                "Fuzzy name match accepted"
            );
            taken_references.insert(reference_id);
            taken_candidates.insert(candidate_id);
            output.matches.push(MatchResult {
                reference_id,
                candidate_id,
                rule: MatchRule::FuzzyName,
                score: Some(score),
            });
        }
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::processing::normalize::Normalizer;
    use crate::types::FacilityRecord;

    fn keys(name: &str, plz: &str, ort: &str, art: &str) -> NormalizedKeySet {
        Normalizer::default().keys(&FacilityRecord::from_pairs([
            ("name", name),
            ("plz", plz),
            ("ort", ort),
            ("art", art),
        ]))
    }

    #[test]
    fn test_accepts_is_inclusive() {
        assert!(accepts(90.0, 90.0));
        assert!(!accepts(89.0, 90.0));
        assert!(!accepts(89.999, 90.0));
    }

    #[test]
    fn test_match_within_block() {
        let references = vec![keys("Hort Musterstadt", "4020", "Linz", "Hort")];
        let candidates = vec![keys(
            "Hort Musterstadt Nachmittagsbetreuung",
            "4020",
            "linz",
            "hort",
        )];
        let pool = MatchPool::new(1, 1);

        let out = match_blocked_names(&references, &candidates, &pool, 90.0);
        assert_eq!(out.matches.len(), 1);
        assert_eq!(out.matches[0].rule, MatchRule::FuzzyName);
        assert!(out.matches[0].score.unwrap() >= 90.0);
        assert_eq!(out.blocks, 1);
    }

    #[test]
    fn test_identical_names_in_different_blocks_never_match() {
        let references = vec![
            keys("Kindergarten Sonnenschein", "4020", "Linz", "Kindergarten"),
            keys("Kindergarten Sonnenschein", "4020", "Linz", "Kindergarten"),
            keys("Kindergarten Sonnenschein", "4020", "Linz", "Kindergarten"),
        ];
        let candidates = vec![
            keys("Kindergarten Sonnenschein", "4030", "Linz", "Kindergarten"),
            keys("Kindergarten Sonnenschein", "4020", "Leonding", "Kindergarten"),
            keys("Kindergarten Sonnenschein", "4020", "Linz", "Hort"),
        ];
        let pool = MatchPool::new(3, 3);

        let out = match_blocked_names(&references, &candidates, &pool, 90.0);
        assert!(out.matches.is_empty());
        assert_eq!(out.compared_pairs, 0);
    }

    #[test]
    fn test_incomplete_block_key_never_matches() {
        let references = vec![keys("Hort Nord", "4020", "Linz", "")];
        let candidates = vec![keys("Hort Nord", "4020", "Linz", "")];
        let out = match_blocked_names(&references, &candidates, &MatchPool::new(1, 1), 90.0);
        assert!(out.matches.is_empty());
    }

    #[test]
    fn test_greedy_takes_highest_score_first() {
        // r0 scores 100 against c1 and lower against c0, r1 only fits c0
        let references = vec![
            keys("Kindergarten Am Bach", "4020", "Linz", "KG"),
            keys("Kindergarten Am Bachl", "4020", "Linz", "KG"),
        ];
        let candidates = vec![
            keys("Kindergarten Am Bachl", "4020", "Linz", "KG"),
            keys("Kindergarten Am Bach", "4020", "Linz", "KG"),
        ];
        let out = match_blocked_names(&references, &candidates, &MatchPool::new(2, 2), 90.0);
        assert_eq!(out.matches.len(), 2);
        let pairs: Vec<(usize, usize)> = out
            .matches
            .iter()
            .map(|m| (m.reference_id.0, m.candidate_id.0))
            .collect();
        assert!(pairs.contains(&(0, 1)));
        assert!(pairs.contains(&(1, 0)));
        assert!(out.matches.iter().all(|m| m.score == Some(100.0)));
    }

    #[test]
    fn test_partial_overlap_matches_in_shared_block() {
        let references = vec![keys("Hort Nord", "4020", "Linz", "Hort")];
        let candidates = vec![keys("Hort Nordx", "4020", "linz", "hort")];
        let out = match_blocked_names(&references, &candidates, &MatchPool::new(1, 1), 90.0);
        assert_eq!(out.matches.len(), 1);
        let score = out.matches[0].score.unwrap();
        assert!((score - 1800.0 / 19.0).abs() < 1e-9, "score was {}", score);
    }

    #[test]
    fn test_greedy_prefers_stronger_pair_over_input_order() {
        // r0 likes c0 best (94.74) but r1 is a perfect fit for c0. Taking
        // pairs by score hands c0 to r1 and leaves r0 its next best, c1 (90.91).
        let references = vec![
            keys("Hort Nordx", "4020", "Linz", "Hort"),
            keys("Hort Nord", "4020", "Linz", "Hort"),
        ];
        let candidates = vec![
            keys("Hort Nord", "4020", "Linz", "Hort"),
            keys("Hort Nordxyz", "4020", "Linz", "Hort"),
        ];
        let out = match_blocked_names(&references, &candidates, &MatchPool::new(2, 2), 90.0);

        let pairs: Vec<(usize, usize)> = out
            .matches
            .iter()
            .map(|m| (m.reference_id.0, m.candidate_id.0))
            .collect();
        assert_eq!(pairs, vec![(1, 0), (0, 1)]);
        assert_eq!(out.matches[0].score, Some(100.0));
        let runner_up = out.matches[1].score.unwrap();
        assert!((runner_up - 2000.0 / 22.0).abs() < 1e-9, "score was {}", runner_up);
    }

    #[test]
    fn test_ties_resolve_to_lowest_ids() {
        let references = vec![
            keys("Hort Mitte", "4020", "Linz", "Hort"),
            keys("Hort Mitte", "4020", "Linz", "Hort"),
        ];
        let candidates = vec![keys("Hort Mitte", "4020", "Linz", "Hort")];
        let pool = MatchPool::new(2, 1);

        let first = match_blocked_names(&references, &candidates, &pool, 90.0);
        let second = match_blocked_names(&references, &candidates, &pool, 90.0);
        assert_eq!(first, second);
        assert_eq!(first.matches.len(), 1);
        assert_eq!(first.matches[0].reference_id, ReferenceId(0));
    }

    #[test]
    fn test_consumed_records_are_skipped() {
        let references = vec![keys("Hort Mitte", "4020", "Linz", "Hort")];
        let candidates = vec![keys("Hort Mitte", "4020", "Linz", "Hort")];
        let mut pool = MatchPool::new(1, 1);
        pool.consume(&MatchResult {
            reference_id: ReferenceId(0),
            candidate_id: CandidateId(0),
            rule: MatchRule::Email,
            score: None,
        })
        .unwrap();
        let out = match_blocked_names(&references, &candidates, &pool, 90.0);
        assert!(out.matches.is_empty());
    }
}
