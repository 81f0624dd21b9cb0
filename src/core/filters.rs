use crate::models::{QueuePreferences, User};

/// Check mutual age-preference compatibility in both directions.
///
/// A user with no stated preference accepts any age; a user whose own age
/// is unknown passes the other side's range check (the range only
/// constrains a known age).
#[inline]
pub fn mutual_age_compatible(a: &User, b: &User) -> bool {
    age_within(b.age, a.age_preference_min, a.age_preference_max)
        && age_within(a.age, b.age_preference_min, b.age_preference_max)
}

#[inline]
fn age_within(age: Option<i32>, min: Option<i32>, max: Option<i32>) -> bool {
    let Some(age) = age else {
        return true;
    };

    if let Some(min) = min {
        if age < min {
            return false;
        }
    }
    if let Some(max) = max {
        if age > max {
            return false;
        }
    }
    true
}

/// Effective age window for a queued user: the queue-time filter overrides
/// the profile preference field by field.
pub fn effective_age_range(
    user: &User,
    prefs: Option<&QueuePreferences>,
) -> (Option<i32>, Option<i32>) {
    let min = prefs
        .and_then(|p| p.age_min)
        .or(user.age_preference_min);
    let max = prefs
        .and_then(|p| p.age_max)
        .or(user.age_preference_max);
    (min, max)
}

/// Pairing predicate for two queue entries.
///
/// Age compatibility must hold in both directions using each side's
/// effective window. The location filter only binds when both entries set
/// one, and then requires exact agreement.
pub fn queue_compatible(
    a: &User,
    a_prefs: Option<&QueuePreferences>,
    b: &User,
    b_prefs: Option<&QueuePreferences>,
) -> bool {
    let (a_min, a_max) = effective_age_range(a, a_prefs);
    let (b_min, b_max) = effective_age_range(b, b_prefs);

    if !age_within(b.age, a_min, a_max) || !age_within(a.age, b_min, b_max) {
        return false;
    }

    if let (Some(loc_a), Some(loc_b)) = (
        a_prefs.and_then(|p| p.location.as_deref()),
        b_prefs.and_then(|p| p.location.as_deref()),
    ) {
        if loc_a != loc_b {
            return false;
        }
    }

    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn user(id: &str, age: Option<i32>, pref_min: Option<i32>, pref_max: Option<i32>) -> User {
        User {
            id: id.to_string(),
            display_name: format!("User {}", id),
            age,
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

    fn prefs(age_min: Option<i32>, age_max: Option<i32>, location: Option<&str>) -> QueuePreferences {
        QueuePreferences {
            age_min,
            age_max,
            location: location.map(str::to_string),
        }
    }

    #[test]
    fn test_mutual_age_compatible() {
        let a = user("a", Some(25), Some(20), Some(30));
        let b = user("b", Some(28), Some(22), Some(35));
        assert!(mutual_age_compatible(&a, &b));
    }

    #[test]
    fn test_one_direction_fails() {
        // b accepts a, but a's window excludes b
        let a = user("a", Some(25), Some(20), Some(26));
        let b = user("b", Some(28), Some(22), Some(35));
        assert!(!mutual_age_compatible(&a, &b));
        assert!(!mutual_age_compatible(&b, &a));
    }

    #[test]
    fn test_no_preferences_accepts_all() {
        let a = user("a", Some(25), None, None);
        let b = user("b", Some(60), None, None);
        assert!(mutual_age_compatible(&a, &b));
    }

    #[test]
    fn test_unknown_age_passes_range_check() {
        let a = user("a", None, Some(20), Some(30));
        let b = user("b", Some(50), None, None);
        // b's age fails a's window, a's unknown age passes b's absent window
        assert!(!mutual_age_compatible(&a, &b));

        let c = user("c", None, None, None);
        assert!(mutual_age_compatible(&a, &c));
    }

    #[test]
    fn test_queue_filter_overrides_profile() {
        let a = user("a", Some(25), Some(20), Some(26));
        let b = user("b", Some(28), None, None);

        // profile window excludes b
        assert!(!queue_compatible(&a, None, &b, None));

        // queue-time filter widens the window
        let wider = prefs(Some(20), Some(35), None);
        assert!(queue_compatible(&a, Some(&wider), &b, None));
    }

    #[test]
    fn test_location_filter_binds_only_when_both_set() {
        let a = user("a", Some(25), None, None);
        let b = user("b", Some(26), None, None);

        let nyc = prefs(None, None, Some("NYC"));
        let berlin = prefs(None, None, Some("Berlin"));

        assert!(queue_compatible(&a, Some(&nyc), &b, None));
        assert!(queue_compatible(&a, Some(&nyc), &b, Some(&nyc)));
        assert!(!queue_compatible(&a, Some(&nyc), &b, Some(&berlin)));
    }
}
