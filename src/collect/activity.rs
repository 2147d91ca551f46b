//! Composite activity state → `rs_activity` measurement.

use crate::activity::state::CompositeState;
use crate::collect::series_names::{BaseTags, SERIES_ACTIVITY};
use crate::write::measurement::Measurement;

/// Build the activity measurement for `state`.
///
/// Only present parts become string fields (`skill`, `type`, `location`).
/// Nothing is produced for an anonymous user or an all-empty state.
#[must_use]
pub fn activity_measurement(tags: &BaseTags, state: &CompositeState) -> Option<Measurement> {
    if tags.user.is_empty() || state.is_empty() {
        return None;
    }
    let mut builder = Measurement::builder(tags.series(SERIES_ACTIVITY).build());
    let parts = [
        ("skill", state.skill),
        ("type", state.location_type),
        ("location", state.location),
    ];
    for (key, value) in parts {
        if let Some(value) = value.filter(|v| !v.is_empty()) {
            builder = builder.string_field(key, value);
        }
    }
    let measurement = builder.build();
    (!measurement.string_fields().is_empty()).then_some(measurement)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_present_parts_become_fields() {
        let state = CompositeState {
            skill: Some("Fishing"),
            location: Some("Fishing Guild"),
            location_type: None,
        };
        let m = activity_measurement(&BaseTags::for_user("zezima"), &state).unwrap();
        assert_eq!(m.series().name(), SERIES_ACTIVITY);
        assert_eq!(m.string_fields().len(), 2);
        assert_eq!(m.string_fields()["skill"], "Fishing");
        assert_eq!(m.string_fields()["location"], "Fishing Guild");
        assert!(m.numeric_fields().is_empty());
    }

    #[test]
    fn empty_user_or_state_produces_nothing() {
        let state = CompositeState {
            location: Some("In Game"),
            ..CompositeState::default()
        };
        assert!(activity_measurement(&BaseTags::default(), &state).is_none());
        assert!(
            activity_measurement(&BaseTags::for_user("zezima"), &CompositeState::default())
                .is_none()
        );
    }
}
