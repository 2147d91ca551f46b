//! Series names, well-known field keys, and the shared base-tag builder.

#![allow(missing_docs)]

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::core::config::FeatureToggles;
use crate::write::series::{Series, SeriesBuilder};

pub const SERIES_INVENTORY: &str = "rs_inventory";
pub const SERIES_SKILL: &str = "rs_skill";
pub const SERIES_SELF: &str = "rs_self";
// Misspelling is the established measurement name in existing databases.
pub const SERIES_ACHIEVEMENTS: &str = "rs_achivements";
pub const SERIES_KILL_COUNT: &str = "rs_killcount";
pub const SERIES_SELF_LOC: &str = "rs_self_loc";
pub const SERIES_ACTIVITY: &str = "rs_activity";
pub const SERIES_LOOT: &str = "rs_loot";
pub const SERIES_SKILLING_ITEMS: &str = "rs_skilling_items";

pub const SELF_KEY_X: &str = "locX";
pub const SELF_KEY_Y: &str = "locY";
pub const SELF_POS_KEYS: [&str; 2] = [SELF_KEY_X, SELF_KEY_Y];

pub const TAG_USER: &str = "user";

/// Whether the toggle owning `series` is on. Series without a toggle always pass.
#[must_use]
pub fn feature_enabled(features: &FeatureToggles, series: &str) -> bool {
    match series {
        SERIES_SKILL => features.write_xp,
        SERIES_INVENTORY => features.write_bank_value,
        SERIES_SELF_LOC => features.write_self_loc,
        SERIES_SELF | SERIES_ACHIEVEMENTS => features.write_self_meta,
        SERIES_KILL_COUNT => features.write_kill_count,
        SERIES_ACTIVITY => features.write_activity,
        SERIES_LOOT => features.write_loot,
        SERIES_SKILLING_ITEMS => features.write_skilling_items,
        _ => true,
    }
}

/// Tags every series produced for one logged-in account carries.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BaseTags {
    pub user: String,
    #[serde(flatten)]
    pub extra: BTreeMap<String, String>,
}

impl BaseTags {
    #[must_use]
    pub fn for_user(user: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            extra: BTreeMap::new(),
        }
    }

    /// Builder for `name` carrying the base tags.
    #[must_use]
    pub fn series(&self, name: &str) -> SeriesBuilder {
        Series::builder(name)
            .tags(self.extra.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .tag(TAG_USER, self.user.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_tag_wins_over_extra() {
        let mut tags = BaseTags::for_user("zezima");
        tags.extra.insert("user".to_string(), "other".to_string());
        tags.extra.insert("worldType".to_string(), "STANDARD".to_string());
        let series = tags.series(SERIES_SELF).build();
        assert_eq!(series.name(), SERIES_SELF);
        assert_eq!(series.tag(TAG_USER), Some("zezima"));
        assert_eq!(series.tag("worldType"), Some("STANDARD"));
    }

    #[test]
    fn toggles_gate_their_series_only() {
        let mut features = FeatureToggles::default();
        assert!(!feature_enabled(&features, SERIES_SELF_LOC));
        assert!(feature_enabled(&features, SERIES_LOOT));
        features.write_loot = false;
        assert!(!feature_enabled(&features, SERIES_LOOT));
        assert!(feature_enabled(&features, "custom_series"));
    }
}
