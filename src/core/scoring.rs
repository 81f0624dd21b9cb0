use std::collections::BTreeSet;

use crate::models::User;

/// Points for age proximity, by bucket of the absolute difference
const AGE_DIFF_TIGHT: i64 = 2;
const AGE_DIFF_NEAR: i64 = 5;
const AGE_DIFF_WIDE: i64 = 10;
const AGE_TIGHT_POINTS: i32 = 30;
const AGE_NEAR_POINTS: i32 = 20;
const AGE_WIDE_POINTS: i32 = 10;

/// Points for exact community / location agreement
const COMMUNITY_POINTS: i32 = 25;
const LOCATION_POINTS: i32 = 25;

/// Points per shared interest token, and the cap on the factor
const INTEREST_POINTS_EACH: i32 = 5;
const INTEREST_POINTS_CAP: i32 = 20;

/// Calculate the compatibility score between two profiles
///
/// Scoring formula (additive, each factor capped):
///   age proximity:    diff <= 2 -> 30, <= 5 -> 20, <= 10 -> 10
///   same community:   +25
///   same location:    +25
///   shared interests: +5 per shared token, capped at 20
///
/// The total is clamped to `max_score`. The function is symmetric
/// (`score(a, b) == score(b, a)`), deterministic and side-effect free,
/// which is what makes the pair-keyed cache sound.
///
/// Returns the score together with the shared interest tokens.
pub fn score_compatibility(a: &User, b: &User, max_score: i32) -> (i32, Vec<String>) {
    let mut score = age_proximity_points(a.age, b.age);

    if same_field(a.community.as_deref(), b.community.as_deref()) {
        score += COMMUNITY_POINTS;
    }

    if same_field(a.location.as_deref(), b.location.as_deref()) {
        score += LOCATION_POINTS;
    }

    let shared = shared_interest_tokens(a.interests.as_deref(), b.interests.as_deref());
    score += interest_points(shared.len());

    (score.clamp(0, max_score), shared)
}

/// Age factor: closer ages score higher; an unknown age on either side
/// contributes nothing.
#[inline]
fn age_proximity_points(a: Option<i32>, b: Option<i32>) -> i32 {
    let (Some(a), Some(b)) = (a, b) else {
        return 0;
    };

    let diff = (i64::from(a) - i64::from(b)).abs();
    if diff <= AGE_DIFF_TIGHT {
        AGE_TIGHT_POINTS
    } else if diff <= AGE_DIFF_NEAR {
        AGE_NEAR_POINTS
    } else if diff <= AGE_DIFF_WIDE {
        AGE_WIDE_POINTS
    } else {
        0
    }
}

/// Exact string agreement; blank values never match.
#[inline]
fn same_field(a: Option<&str>, b: Option<&str>) -> bool {
    match (a, b) {
        (Some(a), Some(b)) => !a.trim().is_empty() && a == b,
        _ => false,
    }
}

/// Tokenize both free-text interest blobs on whitespace, case-fold and
/// intersect. The sorted set keeps the result order-independent of the
/// input, so both call directions return identical token lists.
fn shared_interest_tokens(a: Option<&str>, b: Option<&str>) -> Vec<String> {
    let (Some(a), Some(b)) = (a, b) else {
        return Vec::new();
    };

    let tokens_a: BTreeSet<String> = a.split_whitespace().map(str::to_lowercase).collect();
    let tokens_b: BTreeSet<String> = b.split_whitespace().map(str::to_lowercase).collect();

    tokens_a.intersection(&tokens_b).cloned().collect()
}

#[inline]
fn interest_points(shared_count: usize) -> i32 {
    let count = i32::try_from(shared_count).unwrap_or(i32::MAX);
    count.saturating_mul(INTEREST_POINTS_EACH).min(INTEREST_POINTS_CAP)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn profile(id: &str, age: Option<i32>, community: &str, location: &str, interests: &str) -> User {
        User {
            id: id.to_string(),
            display_name: format!("User {}", id),
            age,
            age_preference_min: None,
            age_preference_max: None,
            community: (!community.is_empty()).then(|| community.to_string()),
            location: (!location.is_empty()).then(|| location.to_string()),
            interests: (!interests.is_empty()).then(|| interests.to_string()),
            available_slots: 3,
            total_slots_used: 0,
            is_active: true,
            last_active_at: Utc::now(),
        }
    }

    #[test]
    fn test_worked_example() {
        // age diff 1 (+30), same community (+25), same location (+25),
        // one shared interest token "music" (+5) = 85
        let a = profile("a", Some(25), "Tech", "NYC", "music hiking");
        let b = profile("b", Some(26), "Tech", "NYC", "music travel");

        let (score, shared) = score_compatibility(&a, &b, 100);
        assert_eq!(score, 85);
        assert_eq!(shared, vec!["music"]);
    }

    #[test]
    fn test_symmetry() {
        let a = profile("a", Some(31), "Books", "Berlin", "Chess running COOKING");
        let b = profile("b", Some(24), "Tech", "Berlin", "cooking chess yoga");

        let (ab, shared_ab) = score_compatibility(&a, &b, 100);
        let (ba, shared_ba) = score_compatibility(&b, &a, 100);

        assert_eq!(ab, ba);
        assert_eq!(shared_ab, shared_ba);
    }

    #[test]
    fn test_age_buckets() {
        assert_eq!(age_proximity_points(Some(25), Some(27)), 30);
        assert_eq!(age_proximity_points(Some(25), Some(30)), 20);
        assert_eq!(age_proximity_points(Some(25), Some(35)), 10);
        assert_eq!(age_proximity_points(Some(25), Some(40)), 0);
    }

    #[test]
    fn test_missing_age_scores_zero_for_age_factor() {
        let a = profile("a", None, "Tech", "NYC", "");
        let b = profile("b", Some(30), "Tech", "NYC", "");

        let (score, _) = score_compatibility(&a, &b, 100);
        // community + location only
        assert_eq!(score, 50);
    }

    #[test]
    fn test_interest_cap() {
        let a = profile("a", None, "", "", "one two three four five six");
        let b = profile("b", None, "", "", "one two three four five six");

        let (score, shared) = score_compatibility(&a, &b, 100);
        assert_eq!(shared.len(), 6);
        // 6 shared tokens would be 30 points uncapped
        assert_eq!(score, INTEREST_POINTS_CAP);
    }

    #[test]
    fn test_case_folding_and_duplicates() {
        let a = profile("a", None, "", "", "Music music MUSIC");
        let b = profile("b", None, "", "", "music");

        let (score, shared) = score_compatibility(&a, &b, 100);
        assert_eq!(shared, vec!["music"]);
        assert_eq!(score, 5);
    }

    #[test]
    fn test_clamped_to_max_score() {
        let a = profile("a", Some(25), "Tech", "NYC", "a b c d e");
        let b = profile("b", Some(25), "Tech", "NYC", "a b c d e");

        // 30 + 25 + 25 + 20 = 100 uncapped; clamp to a lower configured max
        let (score, _) = score_compatibility(&a, &b, 80);
        assert_eq!(score, 80);
    }

    #[test]
    fn test_bounds() {
        let a = profile("a", None, "", "", "");
        let b = profile("b", None, "", "", "");

        let (score, shared) = score_compatibility(&a, &b, 100);
        assert_eq!(score, 0);
        assert!(shared.is_empty());
    }

    #[test]
    fn test_blank_fields_never_match() {
        let mut a = profile("a", None, "", "", "");
        let mut b = profile("b", None, "", "", "");
        a.community = Some("  ".to_string());
        b.community = Some("  ".to_string());

        let (score, _) = score_compatibility(&a, &b, 100);
        assert_eq!(score, 0);
    }
}
