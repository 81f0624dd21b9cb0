// Unit tests for Kindred Algo

use chrono::Utc;
use kindred_algo::core::{
    filters::{mutual_age_compatible, queue_compatible},
    priority::priority_score,
    scoring::score_compatibility,
    starters::StarterDeck,
};
use kindred_algo::models::{PriorityWeights, QueuePreferences, User};

fn build_user(
    id: &str,
    age: Option<i32>,
    pref_min: Option<i32>,
    pref_max: Option<i32>,
    community: Option<&str>,
    location: Option<&str>,
    interests: Option<&str>,
) -> User {
    User {
        id: id.to_string(),
        display_name: format!("User {}", id),
        age,
        age_preference_min: pref_min,
        age_preference_max: pref_max,
        community: community.map(str::to_string),
        location: location.map(str::to_string),
        interests: interests.map(str::to_string),
        available_slots: 3,
        total_slots_used: 0,
        is_active: true,
        last_active_at: Utc::now(),
    }
}

#[test]
fn test_score_worked_example() {
    let a = build_user(
        "a",
        Some(25),
        None,
        None,
        Some("Tech"),
        Some("NYC"),
        Some("music hiking"),
    );
    let b = build_user(
        "b",
        Some(26),
        None,
        None,
        Some("Tech"),
        Some("NYC"),
        Some("music travel"),
    );

    let (score, shared) = score_compatibility(&a, &b, 100);

    // 30 (age) + 25 (community) + 25 (location) + 5 (shared "music") = 85
    assert_eq!(score, 85);
    assert_eq!(shared, vec!["music"]);
}

#[test]
fn test_score_symmetry_across_profiles() {
    let profiles = [
        build_user("a", Some(22), None, None, Some("Art"), Some("LA"), Some("film yoga")),
        build_user("b", Some(31), None, None, Some("Tech"), Some("NYC"), Some("music film")),
        build_user("c", None, None, None, None, Some("LA"), Some("yoga")),
        build_user("d", Some(45), None, None, Some("Art"), None, None),
    ];

    for a in &profiles {
        for b in &profiles {
            let (ab, _) = score_compatibility(a, b, 100);
            let (ba, _) = score_compatibility(b, a, 100);
            assert_eq!(ab, ba, "score({}, {}) != score({}, {})", a.id, b.id, b.id, a.id);
        }
    }
}

#[test]
fn test_score_boundedness() {
    let maxed = build_user(
        "a",
        Some(25),
        None,
        None,
        Some("Tech"),
        Some("NYC"),
        Some("one two three four five six seven"),
    );
    let empty = build_user("b", None, None, None, None, None, None);

    let (high, _) = score_compatibility(&maxed, &maxed.clone(), 100);
    let (low, _) = score_compatibility(&maxed, &empty, 100);

    assert!(high <= 100 && high >= 0);
    assert!(low <= 100 && low >= 0);
    assert_eq!(low, 0);
}

#[test]
fn test_mutual_age_preference_both_directions() {
    // a's window excludes b even though b's window accepts a
    let a = build_user("a", Some(25), Some(23), Some(27), None, None, None);
    let b = build_user("b", Some(35), Some(20), Some(40), None, None, None);

    assert!(!mutual_age_compatible(&a, &b));

    let c = build_user("c", Some(26), Some(24), Some(30), None, None, None);
    assert!(mutual_age_compatible(&a, &c));
}

#[test]
fn test_disjoint_age_preferences_never_pair() {
    // Three users whose windows exclude each other pairwise
    let a = build_user("a", Some(20), Some(18), Some(22), None, None, None);
    let b = build_user("b", Some(35), Some(33), Some(37), None, None, None);
    let c = build_user("c", Some(50), Some(48), Some(52), None, None, None);

    assert!(!queue_compatible(&a, None, &b, None));
    assert!(!queue_compatible(&b, None, &c, None));
    assert!(!queue_compatible(&a, None, &c, None));
}

#[test]
fn test_queue_location_filter_requires_agreement() {
    let a = build_user("a", Some(25), None, None, None, None, None);
    let b = build_user("b", Some(26), None, None, None, None, None);

    let here = QueuePreferences {
        age_min: None,
        age_max: None,
        location: Some("Berlin".to_string()),
    };
    let there = QueuePreferences {
        age_min: None,
        age_max: None,
        location: Some("Hamburg".to_string()),
    };

    // The filter only binds when both sides set one
    assert!(queue_compatible(&a, Some(&here), &b, None));
    assert!(!queue_compatible(&a, Some(&here), &b, Some(&there)));
    assert!(queue_compatible(&a, Some(&here), &b, Some(&here.clone())));
}

#[test]
fn test_priority_rises_with_wait_and_falls_with_idleness() {
    let user = build_user("a", Some(25), None, None, None, None, None);
    let weights = PriorityWeights::default();

    let fresh = priority_score(&user, None, 0, 0, 3600, &weights);
    let waited = priority_score(&user, None, 3600, 0, 3600, &weights);
    let idle = priority_score(&user, None, 0, 100 * 3600, 3600, &weights);

    assert!(waited > fresh);
    assert!(idle < fresh);
    for p in [fresh, waited, idle] {
        assert!(p >= 0.0 && p <= 1.0, "priority {} out of [0, 1]", p);
    }
}

#[test]
fn test_priority_prefers_open_preferences() {
    let open = build_user("a", Some(25), None, None, None, None, None);
    let narrow = build_user("b", Some(25), Some(25), Some(26), None, None, None);
    let weights = PriorityWeights::default();

    let open_score = priority_score(&open, None, 0, 0, 3600, &weights);
    let narrow_score = priority_score(&narrow, None, 0, 0, 3600, &weights);

    assert!(open_score > narrow_score);
}

#[test]
fn test_starter_deck_deterministic_with_seed() {
    let a = StarterDeck::seeded(99);
    let b = StarterDeck::seeded(99);

    for _ in 0..25 {
        assert_eq!(a.draw(), b.draw());
    }
}
