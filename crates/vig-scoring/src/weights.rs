//! Weight-vector normalization and leaderboard ranking.
//!
//! The emission cycle turns raw weighted volumes into a normalized
//! vector for the consensus layer; the query surface uses the same
//! ranking for its leaderboard.

use std::collections::BTreeMap;

use vig_types::Uid;

/// Tolerance on the normalized weight sum.
///
/// Normalization divides integer micro-unit scores in `f64`; the sum of
/// the resulting vector is 1 within this epsilon whenever any score is
/// nonzero.
pub const WEIGHT_SUM_EPSILON: f64 = 1e-6;

/// Normalize raw weighted volumes to a weight vector summing to 1.
///
/// Zero-score participants are dropped. When every score is zero the
/// result is empty — the emission cycle still records the (empty)
/// snapshot for audit continuity.
pub fn normalize(scores: &BTreeMap<Uid, u64>) -> BTreeMap<Uid, f64> {
    let total: u128 = scores.values().map(|s| *s as u128).sum();
    if total == 0 {
        return BTreeMap::new();
    }

    scores
        .iter()
        .filter(|(_, score)| **score > 0)
        .map(|(uid, score)| (*uid, *score as f64 / total as f64))
        .collect()
}

/// Rank participants by weighted volume, highest first.
///
/// Ties are broken by ascending uid, so the ordering is total and
/// stable across calls.
pub fn rank(scores: &BTreeMap<Uid, u64>) -> Vec<(Uid, u64)> {
    let mut ranked: Vec<(Uid, u64)> = scores.iter().map(|(u, s)| (*u, *s)).collect();
    // BTreeMap iteration is ascending by uid; the stable sort preserves
    // that order for equal scores.
    ranked.sort_by(|a, b| b.1.cmp(&a.1));
    ranked
}
