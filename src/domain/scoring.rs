//! Pure scoring math for the Search Service (C5): cosine similarity and the
//! verified/recency relevance boost (§4.3.1, §4.5 step 4).
//!
//! Kept free of any port or I/O dependency so the ranking laws in §8 can be
//! asserted directly against plain floats and timestamps.

use chrono::{DateTime, Utc};

/// Cosine similarity of two vectors, defined as `0.0` when either norm is
/// zero (so an all-zero chunk embedding never produces `NaN`, and never
/// outranks a non-zero candidate against a non-zero query).
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}

/// Apply the verified/recency relevance boost to a raw cosine score,
/// clamped to `1.0` (§4.5 step 4).
pub fn relevance_score(
    raw_cosine: f32,
    verified_by_admin: bool,
    created_at: DateTime<Utc>,
    now: DateTime<Utc>,
    verified_boost: f32,
    recency_boost: f32,
    recency_days: i64,
) -> f32 {
    let mut score = raw_cosine;
    if verified_by_admin {
        score *= verified_boost;
    }
    if (now - created_at).num_days() <= recency_days {
        score *= recency_boost;
    }
    score.min(1.0)
}

/// Tie-break ordering for equal-score results (§4.5): verified first, then
/// newer `created_at` first, then smaller chunk id first. Returns
/// `Ordering` suitable for use as the secondary key in a `sort_by`.
pub fn tie_break(
    a_verified: bool,
    a_created_at: DateTime<Utc>,
    a_id: i64,
    b_verified: bool,
    b_created_at: DateTime<Utc>,
    b_id: i64,
) -> std::cmp::Ordering {
    b_verified
        .cmp(&a_verified)
        .then_with(|| b_created_at.cmp(&a_created_at))
        .then_with(|| a_id.cmp(&b_id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn cosine_of_identical_unit_vectors_is_one() {
        let v = vec![0.6, 0.8];
        assert!((cosine_similarity(&v, &v) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn cosine_is_zero_when_either_vector_is_zero() {
        let zero = vec![0.0, 0.0];
        let v = vec![1.0, 0.0];
        assert_eq!(cosine_similarity(&zero, &v), 0.0);
        assert_eq!(cosine_similarity(&v, &zero), 0.0);
        assert_eq!(cosine_similarity(&zero, &zero), 0.0);
    }

    #[test]
    fn relevance_boost_matches_spec_scenario_5() {
        // scenario 5 of the spec's end-to-end suite
        let now = Utc::now();
        let a = relevance_score(0.80, true, now, now, 1.15, 1.10, 90);
        let b = relevance_score(0.80, false, now - Duration::days(730), now, 1.15, 1.10, 90);
        assert!((a - 1.0).abs() < 1e-6);
        assert!((b - 0.80).abs() < 1e-6);
        assert!(a > b);
    }

    #[test]
    fn tie_break_prefers_verified_then_recent_then_smaller_id() {
        let now = Utc::now();
        let earlier = now - Duration::days(1);
        assert_eq!(
            tie_break(true, now, 5, false, now, 1),
            std::cmp::Ordering::Less
        );
        assert_eq!(
            tie_break(true, earlier, 5, true, now, 1),
            std::cmp::Ordering::Greater
        );
        assert_eq!(
            tie_break(true, now, 5, true, now, 1),
            std::cmp::Ordering::Greater
        );
    }
}
