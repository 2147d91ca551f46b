//! Skilling item tracker: correlates per-tick inventory gains with xp drops.
//!
//! When a host tick closes with xp gained in exactly one tracked skill, every
//! item added to the inventory during that tick is attributed to the skill
//! and reported to the summing `rs_skilling_items` series.

#![allow(missing_docs)]

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::activity::catalog::Skill;
use crate::collect::series_names::{BaseTags, SERIES_SKILLING_ITEMS};
use crate::write::measurement::Measurement;

/// Items never attributed to a skill: coins, waterskins, cooking containers,
/// and birdhouse-run byproducts.
pub const IGNORED_ITEMS: &[u32] = &[
    995,  // coins
    1823, 1825, 1827, 1829, 1831, // waterskins (4) .. (0)
    2313, // pie dish
    1887, // cake tin
    1931, // pot
    1923, // bowl
    8792, // clockwork
    314,  // feather
];

/// Gathering and production skills the tracker correlates.
pub const TRACKED_SKILLS: &[Skill] = &[
    Skill::Runecraft,
    Skill::Crafting,
    Skill::Mining,
    Skill::Smithing,
    Skill::Firemaking,
    Skill::Cooking,
    Skill::Woodcutting,
    Skill::Herblore,
    Skill::Hunter,
    Skill::Fletching,
    Skill::Farming,
    Skill::Fishing,
];

/// One inventory slot as reported by the host. Ids are already canonical.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryItem {
    pub id: u32,
    pub quantity: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

#[derive(Debug, Default)]
pub struct SkillingItemTracker {
    previous: BTreeMap<u32, i64>,
    names: BTreeMap<u32, String>,
    tracking_tick: Option<u64>,
    added: BTreeMap<u32, i64>,
    xp: BTreeMap<Skill, i64>,
}

impl SkillingItemTracker {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Diff a full inventory snapshot against the previous one.
    pub fn on_inventory(
        &mut self,
        items: &[InventoryItem],
        tick: u64,
        tags: &BaseTags,
    ) -> Vec<Measurement> {
        let mut current: BTreeMap<u32, i64> = BTreeMap::new();
        for item in items {
            if item.quantity <= 0 || IGNORED_ITEMS.contains(&item.id) {
                continue;
            }
            *current.entry(item.id).or_default() += item.quantity;
            if let Some(name) = &item.name {
                self.names.insert(item.id, name.clone());
            }
        }

        let mut out = Vec::new();
        for (&id, &count) in &current {
            let gained = count - self.previous.get(&id).copied().unwrap_or(0);
            if gained > 0 {
                out.extend(self.flush_if_needed(tick, tags));
                *self.added.entry(id).or_default() += gained;
            }
        }
        self.previous = current;
        out
    }

    /// Record an xp gain. Untracked skills are ignored.
    pub fn on_xp_gained(
        &mut self,
        skill: Skill,
        xp: i64,
        tick: u64,
        tags: &BaseTags,
    ) -> Vec<Measurement> {
        if !TRACKED_SKILLS.contains(&skill) {
            return Vec::new();
        }
        let out = self.flush_if_needed(tick, tags);
        *self.xp.entry(skill).or_default() += xp;
        out
    }

    /// Close the tracked tick once the host has moved past it.
    pub fn flush_if_needed(&mut self, tick: u64, tags: &BaseTags) -> Vec<Measurement> {
        if self.tracking_tick == Some(tick) {
            return Vec::new();
        }
        let mut out = Vec::new();
        if let (1, Some((&skill, &xp))) = (self.xp.len(), self.xp.iter().next()) {
            #[allow(clippy::cast_precision_loss)]
            let weighted = xp as f64 / self.added.len().max(1) as f64;
            for (&id, &count) in &self.added {
                let series = tags
                    .series(SERIES_SKILLING_ITEMS)
                    .tag("skill", skill.name())
                    .tag("item", self.item_key(id))
                    .build();
                out.push(
                    Measurement::builder(series)
                        .numeric_field("xp", xp)
                        .numeric_field("weightedXp", weighted)
                        .numeric_field("itemCount", count)
                        .numeric_field("actionCount", 1)
                        .build(),
                );
            }
        }
        self.added.clear();
        self.xp.clear();
        self.tracking_tick = Some(tick);
        out
    }

    fn item_key(&self, id: u32) -> String {
        self.names
            .get(&id)
            .map_or_else(|| id.to_string(), |name| format!("{name}@{id}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::write::measurement::FieldValue;

    fn item(id: u32, quantity: i64, name: &str) -> InventoryItem {
        InventoryItem {
            id,
            quantity,
            name: Some(name.to_string()),
        }
    }

    fn tags() -> BaseTags {
        BaseTags::for_user("zezima")
    }

    #[test]
    fn single_skill_tick_attributes_items() {
        let mut tracker = SkillingItemTracker::new();
        tracker.on_inventory(&[item(1511, 1, "Logs")], 9, &tags());
        tracker.flush_if_needed(10, &tags());

        tracker.on_xp_gained(Skill::Woodcutting, 25, 10, &tags());
        tracker.on_inventory(&[item(1511, 3, "Logs")], 10, &tags());
        let out = tracker.flush_if_needed(11, &tags());

        assert_eq!(out.len(), 1);
        let m = &out[0];
        assert_eq!(m.series().tag("skill"), Some("WOODCUTTING"));
        assert_eq!(m.series().tag("item"), Some("Logs@1511"));
        assert_eq!(m.numeric("xp"), Some(FieldValue::Int(25)));
        assert_eq!(m.numeric("itemCount"), Some(FieldValue::Int(2)));
        assert_eq!(m.numeric("weightedXp"), Some(FieldValue::Float(25.0)));
        assert_eq!(m.numeric("actionCount"), Some(FieldValue::Int(1)));
    }

    #[test]
    fn weighted_xp_splits_across_distinct_items() {
        let mut tracker = SkillingItemTracker::new();
        tracker.on_xp_gained(Skill::Fishing, 90, 5, &tags());
        tracker.on_inventory(
            &[item(331, 1, "Raw salmon"), item(335, 1, "Raw trout")],
            5,
            &tags(),
        );
        let out = tracker.flush_if_needed(6, &tags());
        assert_eq!(out.len(), 2);
        for m in &out {
            assert_eq!(m.numeric("weightedXp"), Some(FieldValue::Float(45.0)));
        }
    }

    #[test]
    fn two_skills_in_one_tick_are_ambiguous() {
        let mut tracker = SkillingItemTracker::new();
        tracker.on_xp_gained(Skill::Fishing, 50, 5, &tags());
        tracker.on_xp_gained(Skill::Cooking, 30, 5, &tags());
        tracker.on_inventory(&[item(331, 1, "Raw salmon")], 5, &tags());
        assert!(tracker.flush_if_needed(6, &tags()).is_empty());
    }

    #[test]
    fn ignored_items_and_untracked_skills() {
        let mut tracker = SkillingItemTracker::new();
        assert!(
            tracker
                .on_xp_gained(Skill::Attack, 100, 1, &tags())
                .is_empty()
        );
        tracker.on_xp_gained(Skill::Fishing, 10, 1, &tags());
        tracker.on_inventory(&[item(995, 500, "Coins"), item(314, 5, "Feather")], 1, &tags());
        assert!(tracker.flush_if_needed(2, &tags()).is_empty());
    }

    #[test]
    fn new_tick_flushes_before_recording() {
        let mut tracker = SkillingItemTracker::new();
        tracker.on_xp_gained(Skill::Mining, 35, 1, &tags());
        tracker.on_inventory(
            &[InventoryItem {
                id: 440,
                quantity: 1,
                name: None,
            }],
            1,
            &tags(),
        );
        let out = tracker.on_xp_gained(Skill::Mining, 35, 2, &tags());
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].series().tag("item"), Some("440"));
    }
}
