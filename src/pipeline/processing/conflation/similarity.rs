use crate::pipeline::processing::normalize::NameTokens;

/// Order-insensitive token-set similarity on a 0–100 scale.
///
/// With `I` the sorted common tokens and `A`, `B` the sorted leftovers of each
/// side, the score is 100 when `I` is non-empty and one side has no leftovers.
/// With no common tokens it is `ratio(A, B)`; otherwise the best of
/// `ratio(I + A, I + B)`, `ratio(I, I + A)` and `ratio(I, I + B)`.
/// Either side empty scores 0.
pub fn token_set_ratio(left: &NameTokens, right: &NameTokens) -> f64 {
    if left.is_empty() || right.is_empty() {
        return 0.0;
    }

    let (left, right) = (left.tokens(), right.tokens());
    let common: Vec<&str> = left.intersection(right).map(String::as_str).collect();
    let only_left: Vec<&str> = left.difference(right).map(String::as_str).collect();
    let only_right: Vec<&str> = right.difference(left).map(String::as_str).collect();

    if !common.is_empty() && (only_left.is_empty() || only_right.is_empty()) {
        return 100.0;
    }

    let sect = common.join(" ");
    let diff_left = only_left.join(" ");
    let diff_right = only_right.join(" ");

    if sect.is_empty() {
        return ratio(&diff_left, &diff_right);
    }

    let sect_left = format!("{} {}", sect, diff_left);
    let sect_right = format!("{} {}", sect, diff_right);
    ratio(&sect_left, &sect_right)
        .max(ratio(&sect, &sect_left))
        .max(ratio(&sect, &sect_right))
}

/// Indel similarity: `200 * LCS / (|a| + |b|)` over characters.
pub fn ratio(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let total = a.len() + b.len();
    if total == 0 {
        return 100.0;
    }
    200.0 * longest_common_subsequence(&a, &b) as f64 / total as f64
}

fn longest_common_subsequence(a: &[char], b: &[char]) -> usize {
    if a.is_empty() || b.is_empty() {
        return 0;
    }
    // Single rolling row keeps memory linear in the shorter side
    let (outer, inner) = if a.len() >= b.len() { (a, b) } else { (b, a) };
    let mut row = vec![0usize; inner.len() + 1];
    for oc in outer {
        let mut diagonal = 0;
        for (j, ic) in inner.iter().enumerate() {
            let above = row[j + 1];
            row[j + 1] = if oc == ic {
                diagonal + 1
            } else {
                above.max(row[j])
            };
            diagonal = above;
        }
    }
    row[inner.len()]
}
