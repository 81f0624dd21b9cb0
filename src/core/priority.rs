use crate::core::filters::effective_age_range;
use crate::models::{PriorityWeights, QueuePreferences, User};

/// Activity decays to zero over this many seconds of inactivity
const ACTIVITY_DECAY_SECS: f64 = 72.0 * 3600.0;

/// Age-window width treated as fully open when normalizing openness
const FULL_AGE_SPAN: f64 = 50.0;

/// Factor for a location-filtered entry: restricting to one place roughly
/// halves the pool it can pair against
const LOCATION_FILTERED_OPENNESS: f64 = 0.5;

/// Queue priority: weighted sum of normalized wait time, an activity term
/// and a compatibility-potential term
///
///   priority = w_wait * wait + w_activity * activity + w_potential * potential
///
/// All three terms are in [0, 1], so with weights summing to 1 the score is
/// too. Recomputed when the entry is created or refreshed, not per cycle.
pub fn priority_score(
    user: &User,
    prefs: Option<&QueuePreferences>,
    waited_secs: i64,
    idle_secs: i64,
    max_wait_secs: i64,
    weights: &PriorityWeights,
) -> f64 {
    let wait = wait_factor(waited_secs, max_wait_secs);
    let activity = activity_factor(idle_secs);
    let potential = compatibility_potential(user, prefs);

    weights.wait_time * wait + weights.activity * activity + weights.compatibility * potential
}

/// Wait factor: fraction of the maximum wait already served
#[inline]
pub fn wait_factor(waited_secs: i64, max_wait_secs: i64) -> f64 {
    (waited_secs as f64 / max_wait_secs.max(1) as f64).clamp(0.0, 1.0)
}

/// Activity factor: linear decay over the inactivity horizon
#[inline]
pub fn activity_factor(idle_secs: i64) -> f64 {
    1.0 - (idle_secs.max(0) as f64 / ACTIVITY_DECAY_SECS).clamp(0.0, 1.0)
}

/// Compatibility potential: how easy this user is to pair, from the
/// openness of their effective filters. An unbounded age window counts as
/// fully open; a location filter discounts the result.
pub fn compatibility_potential(user: &User, prefs: Option<&QueuePreferences>) -> f64 {
    let age_openness = match effective_age_range(user, prefs) {
        (Some(min), Some(max)) => (f64::from((max - min).max(0)) / FULL_AGE_SPAN).clamp(0.0, 1.0),
        _ => 1.0,
    };

    let location_openness = if prefs.and_then(|p| p.location.as_deref()).is_some() {
        LOCATION_FILTERED_OPENNESS
    } else {
        1.0
    };

    (age_openness + location_openness) / 2.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn user(pref_min: Option<i32>, pref_max: Option<i32>) -> User {
        User {
            id: "u".to_string(),
            display_name: "U".to_string(),
            age: Some(25),
            age_preference_min: pref_min,
            age_preference_max: pref_max,
            community: None,
            location: None,
            interests: None,
            available_slots: 3,
            total_slots_used: 0,
            is_active: true,
            last_active_at: Utc::now(),
        }
    }

    #[test]
    fn test_wait_factor_clamps() {
        assert_eq!(wait_factor(0, 3600), 0.0);
        assert_eq!(wait_factor(1800, 3600), 0.5);
        assert_eq!(wait_factor(7200, 3600), 1.0);
        assert_eq!(wait_factor(-5, 3600), 0.0);
    }

    #[test]
    fn test_activity_decay() {
        assert_eq!(activity_factor(0), 1.0);
        assert!(activity_factor(36 * 3600) > 0.4);
        assert!(activity_factor(36 * 3600) < 0.6);
        assert_eq!(activity_factor(200 * 3600), 0.0);
    }

    #[test]
    fn test_open_preferences_score_full_potential() {
        let open = user(None, None);
        assert_eq!(compatibility_potential(&open, None), 1.0);
    }

    #[test]
    fn test_narrow_window_lowers_potential() {
        let narrow = user(Some(25), Some(27));
        let wide = user(Some(20), Some(45));
        assert!(compatibility_potential(&narrow, None) < compatibility_potential(&wide, None));
    }

    #[test]
    fn test_location_filter_lowers_potential() {
        let u = user(None, None);
        let filtered = QueuePreferences {
            age_min: None,
            age_max: None,
            location: Some("NYC".to_string()),
        };
        assert!(compatibility_potential(&u, Some(&filtered)) < compatibility_potential(&u, None));
    }

    #[test]
    fn test_priority_in_unit_range() {
        let u = user(Some(20), Some(30));
        let weights = PriorityWeights::default();

        let p = priority_score(&u, None, 1800, 3600, 3600, &weights);
        assert!(p >= 0.0 && p <= 1.0, "priority {} out of range", p);
    }

    #[test]
    fn test_longer_wait_raises_priority() {
        let u = user(None, None);
        let weights = PriorityWeights::default();

        let fresh = priority_score(&u, None, 0, 0, 3600, &weights);
        let waited = priority_score(&u, None, 3000, 0, 3600, &weights);
        assert!(waited > fresh);
    }
}
