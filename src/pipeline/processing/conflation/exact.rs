use std::collections::BTreeMap;
use tracing::debug;

use super::pool::MatchPool;
use crate::pipeline::processing::normalize::NormalizedKeySet;
use crate::types::{CandidateId, MatchResult, MatchRule, ReferenceId};

/// Links proposed by one exact-key rule
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExactMatchOutput {
    pub matches: Vec<MatchResult>,
    /// Keys present on both sides but shared by more than one record on either side
    pub ambiguous_keys: usize,
}

/// Match pooled records whose key is unique on both sides.
///
/// A key value links a reference to a candidate only when it occurs exactly
/// once among the pooled references and exactly once among the pooled
/// candidates. Empty keys never match. The pool itself is not modified.
pub fn match_unique_key<F>(
    rule: MatchRule,
    references: &[NormalizedKeySet],
    candidates: &[NormalizedKeySet],
    pool: &MatchPool,
    key: F,
) -> ExactMatchOutput
where
    F: Fn(&NormalizedKeySet) -> &str,
{
    let mut by_reference: BTreeMap<&str, Vec<ReferenceId>> = BTreeMap::new();
    for id in pool.references() {
        let value = key(&references[id.0]);
        if !value.is_empty() {
            by_reference.entry(value).or_default().push(id);
        }
    }

    let mut by_candidate: BTreeMap<&str, Vec<CandidateId>> = BTreeMap::new();
    for id in pool.candidates() {
        let value = key(&candidates[id.0]);
        if !value.is_empty() {
            by_candidate.entry(value).or_default().push(id);
        }
    }

    let mut output = ExactMatchOutput::default();
    for (value, reference_ids) in &by_reference {
        let Some(candidate_ids) = by_candidate.get(value) else {
            continue;
        };
        match (reference_ids.as_slice(), candidate_ids.as_slice()) {
            ([reference_id], [candidate_id]) => output.matches.push(MatchResult {
                reference_id: *reference_id,
                candidate_id: *candidate_id,
                rule,
                score: None,
            }),
            _ => {
                debug!(
                    rule = %rule,
                    key = %value,
                    references = reference_ids.len(),
                    candidates = candidate_ids.len(),
                    "Shared key rejected, falling through to weaker rules"
                );
                output.ambiguous_keys += 1;
            }
        }
    }

    output.matches.sort_by_key(|m| m.reference_id);
    output
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with_email(email: &str) -> NormalizedKeySet {
        NormalizedKeySet {
            email_norm: email.to_string(),
            ..Default::default()
        }
    }

    fn email(keys: &NormalizedKeySet) -> &str {
        &keys.email_norm
    }

    #[test]
    fn test_unique_keys_match() {
        let references = vec![with_email("a@x.at"), with_email("b@x.at"), with_email("")];
        let candidates = vec![with_email("b@x.at"), with_email("a@x.at"), with_email("")];
        let pool = MatchPool::new(3, 3);

        let out = match_unique_key(MatchRule::Email, &references, &candidates, &pool, email);
        assert_eq!(out.matches.len(), 2);
        assert_eq!(out.matches[0].reference_id, ReferenceId(0));
        assert_eq!(out.matches[0].candidate_id, CandidateId(1));
        assert_eq!(out.matches[1].reference_id, ReferenceId(1));
        assert_eq!(out.matches[1].candidate_id, CandidateId(0));
        assert!(out.matches.iter().all(|m| m.score.is_none() && m.rule == MatchRule::Email));
        assert_eq!(out.ambiguous_keys, 0);
    }

    #[test]
    fn test_key_shared_on_candidate_side_is_rejected() {
        let references = vec![with_email("office@caritas.at")];
        let candidates = vec![with_email("office@caritas.at"), with_email("office@caritas.at")];
        let pool = MatchPool::new(1, 2);

        let out = match_unique_key(MatchRule::Email, &references, &candidates, &pool, email);
        assert!(out.matches.is_empty());
        assert_eq!(out.ambiguous_keys, 1);
    }

    #[test]
    fn test_key_shared_on_reference_side_is_rejected() {
        let references = vec![with_email("k@x.at"), with_email("k@x.at")];
        let candidates = vec![with_email("k@x.at")];
        let pool = MatchPool::new(2, 1);

        let out = match_unique_key(MatchRule::Email, &references, &candidates, &pool, email);
        assert!(out.matches.is_empty());
        assert_eq!(out.ambiguous_keys, 1);
    }

    #[test]
    fn test_only_pooled_records_are_counted() {
        let references = vec![with_email("k@x.at"), with_email("k@x.at")];
        let candidates = vec![with_email("other@x.at"), with_email("k@x.at")];
        let mut pool = MatchPool::new(2, 2);
        pool.consume(&MatchResult {
            reference_id: ReferenceId(0),
            candidate_id: CandidateId(0),
            rule: MatchRule::Email,
            score: None,
        })
        .unwrap();

        let out = match_unique_key(MatchRule::Phone, &references, &candidates, &pool, email);
        assert_eq!(out.matches.len(), 1);
        assert_eq!(out.matches[0].reference_id, ReferenceId(1));
        assert_eq!(out.matches[0].candidate_id, CandidateId(1));
        assert_eq!(out.matches[0].rule, MatchRule::Phone);
    }
}
