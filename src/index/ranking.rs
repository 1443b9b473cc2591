//! Top-k selection over a score vector

use std::cmp::Ordering;

/// Order by score descending, then by row position ascending.
///
/// NaN scores rank below every real score; `-0.0` ties with `0.0`.
fn rank_order(a: &(usize, f32), b: &(usize, f32)) -> Ordering {
    let score = |s: f32| {
        if s.is_nan() {
            f32::NEG_INFINITY
        } else if s == 0.0 {
            0.0
        } else {
            s
        }
    };
    score(b.1)
        .total_cmp(&score(a.1))
        .then_with(|| a.0.cmp(&b.0))
}

/// Return the `k` best `(position, score)` pairs, best first.
///
/// Equal scores keep insertion order, so results are deterministic.
pub fn top_k(scores: &[f32], k: usize) -> Vec<(usize, f32)> {
    let k = k.min(scores.len());
    if k == 0 {
        return Vec::new();
    }

    let mut ranked: Vec<(usize, f32)> = scores.iter().copied().enumerate().collect();
    if k < ranked.len() {
        ranked.select_nth_unstable_by(k - 1, rank_order);
        ranked.truncate(k);
    }
    ranked.sort_unstable_by(rank_order);
    ranked
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_top_k_orders_descending() {
        let ranked = top_k(&[0.1, 0.9, 0.5], 3);
        assert_eq!(ranked, vec![(1, 0.9), (2, 0.5), (0, 0.1)]);
    }

    #[test]
    fn test_top_k_truncates() {
        let ranked = top_k(&[0.1, 0.9, 0.5, 0.7], 2);
        assert_eq!(ranked, vec![(1, 0.9), (3, 0.7)]);
    }

    #[test]
    fn test_ties_prefer_earlier_position() {
        let ranked = top_k(&[0.3, 0.8, 0.8, 0.8, 0.1], 2);
        assert_eq!(ranked, vec![(1, 0.8), (2, 0.8)]);
    }

    #[test]
    fn test_k_larger_than_len() {
        assert_eq!(top_k(&[0.2, 0.4], 10).len(), 2);
    }

    #[test]
    fn test_zero_k_and_empty() {
        assert!(top_k(&[0.2, 0.4], 0).is_empty());
        assert!(top_k(&[], 5).is_empty());
    }

    #[test]
    fn test_signed_zeros_tie() {
        let ranked = top_k(&[-0.0, 0.0, -0.25], 3);
        let positions: Vec<usize> = ranked.iter().map(|(pos, _)| *pos).collect();
        assert_eq!(positions, vec![0, 1, 2]);
    }

    #[test]
    fn test_nan_ranks_last() {
        let ranked = top_k(&[f32::NAN, -0.5, 0.5], 3);
        assert_eq!(ranked[0].0, 2);
        assert_eq!(ranked[1].0, 1);
        assert_eq!(ranked[2].0, 0);
    }
}
