//! Activity resolution: prioritized, self-expiring classification events
//! collapsed into one composite "what is happening now" state.

#![allow(missing_docs)]

use std::cmp::Reverse;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use serde::Serialize;

use crate::activity::catalog::{Catalog, EventDef};

/// Resolved (skill, location, location type). Any part may be absent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CompositeState {
    pub skill: Option<&'static str>,
    pub location: Option<&'static str>,
    pub location_type: Option<&'static str>,
}

impl CompositeState {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.skill.is_none() && self.location.is_none() && self.location_type.is_none()
    }
}

#[derive(Debug, Clone, Copy)]
struct EventInstance {
    def: EventDef,
    start: Instant,
    updated: Instant,
    /// Trigger sequence number; breaks ties between identical timestamps.
    seq: u64,
}

#[derive(Debug, Default)]
struct Active {
    events: HashMap<&'static str, EventInstance>,
    next_seq: u64,
}

impl Active {
    /// Active events, highest priority first, then most recently updated.
    fn ordered(&self) -> Vec<&EventInstance> {
        let mut ordered: Vec<&EventInstance> = self.events.values().collect();
        ordered.sort_by_key(|e| (Reverse(e.def.priority), Reverse(e.updated), Reverse(e.seq)));
        ordered
    }
}

/// The activity state machine. One lock guards the active set.
#[derive(Debug)]
pub struct ActivityState {
    catalog: Arc<Catalog>,
    idle_timeout: Mutex<Duration>,
    active: Mutex<Active>,
}

impl ActivityState {
    #[must_use]
    pub fn new(catalog: Arc<Catalog>, idle_timeout: Duration) -> Self {
        Self {
            catalog,
            idle_timeout: Mutex::new(idle_timeout),
            active: Mutex::new(Active::default()),
        }
    }

    /// State machine over the built-in catalog.
    #[must_use]
    pub fn with_builtin(idle_timeout: Duration) -> Self {
        Self::new(Arc::new(Catalog::builtin().clone()), idle_timeout)
    }

    #[must_use]
    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    #[must_use]
    pub fn idle_timeout(&self) -> Duration {
        *self.idle_timeout.lock()
    }

    pub fn set_idle_timeout(&self, timeout: Duration) {
        *self.idle_timeout.lock() = timeout;
    }

    /// Drop every active event.
    pub fn reset(&self) {
        self.active.lock().events.clear();
    }

    /// Ids of the active events in resolution order.
    #[must_use]
    pub fn active_ids(&self) -> Vec<&'static str> {
        self.active.lock().ordered().iter().map(|e| e.def.id).collect()
    }

    #[must_use]
    pub fn is_active(&self, id: &str) -> bool {
        self.active.lock().events.contains_key(id)
    }

    /// Create or refresh `id`. Returns false for ids missing from the catalog.
    pub fn trigger_event(&self, id: &str) -> bool {
        self.trigger_event_at(id, Instant::now())
    }

    pub fn trigger_event_at(&self, id: &str, now: Instant) -> bool {
        let Some(def) = self.catalog.get(id).copied() else {
            tracing::debug!(event = id, "unknown classification event");
            return false;
        };
        let mut active = self.active.lock();
        let seq = active.next_seq;
        active.next_seq += 1;

        let instance = active.events.entry(def.id).or_insert(EventInstance {
            def,
            start: now,
            updated: now,
            seq,
        });
        instance.updated = now;
        instance.seq = seq;

        if def.clears {
            active
                .events
                .retain(|other, e| *other == def.id || !e.def.clears);
        }
        true
    }

    /// Remove timing-out events idle longer than the timeout. Returns how many.
    pub fn check_for_timeout(&self) -> usize {
        self.check_for_timeout_at(Instant::now())
    }

    pub fn check_for_timeout_at(&self, now: Instant) -> usize {
        let timeout = self.idle_timeout();
        let mut active = self.active.lock();
        let before = active.events.len();
        active.events.retain(|_, e| {
            !(e.def.times_out && now.saturating_duration_since(e.updated) > timeout)
        });
        before - active.events.len()
    }

    /// Current composite state, or `None` when nothing is active or the
    /// idle root has been the top event for longer than the timeout.
    #[must_use]
    pub fn resolve(&self) -> Option<CompositeState> {
        self.resolve_at(Instant::now())
    }

    #[must_use]
    pub fn resolve_at(&self, now: Instant) -> Option<CompositeState> {
        let timeout = self.idle_timeout();
        let active = self.active.lock();
        let ordered = active.ordered();
        let top = ordered.first()?;
        if self.catalog.idle_root() == Some(top.def.id)
            && now.saturating_duration_since(top.start) > timeout
        {
            return None;
        }

        let mut state = CompositeState::default();
        for event in &ordered {
            if state.skill.is_none() {
                state.skill = event.def.skill.map(|s| s.label());
            }
            if state.location.is_none() {
                state.location = event.def.location;
            }
            if state.location_type.is_none() {
                state.location_type = event.def.location_type.map(|t| t.name());
            }
            if state.skill.is_some() && state.location.is_some() && state.location_type.is_some() {
                break;
            }
        }
        Some(state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::activity::catalog::{IN_GAME, IN_MENU, LocationType, Skill};

    const TIMEOUT: Duration = Duration::from_secs(300);

    fn builtin() -> ActivityState {
        ActivityState::with_builtin(TIMEOUT)
    }

    fn custom(events: Vec<EventDef>) -> ActivityState {
        ActivityState::new(Arc::new(Catalog::new(events, None).unwrap()), TIMEOUT)
    }

    #[test]
    fn empty_state_resolves_to_nothing() {
        assert!(builtin().resolve().is_none());
    }

    #[test]
    fn clearing_events_exclude_each_other() {
        let state = builtin();
        let t0 = Instant::now();
        state.trigger_event_at("TRAINING_WOODCUTTING", t0);
        state.trigger_event_at("CITY_LUMBRIDGE", t0);
        state.trigger_event_at("CITY_VARROCK", t0 + Duration::from_secs(1));
        assert!(!state.is_active("CITY_LUMBRIDGE"));
        assert!(state.is_active("CITY_VARROCK"));
        assert!(state.is_active("TRAINING_WOODCUTTING"));

        let resolved = state.resolve_at(t0 + Duration::from_secs(2)).unwrap();
        assert_eq!(resolved.skill, Some("Woodcutting"));
        assert_eq!(resolved.location, Some("Varrock"));
        assert_eq!(resolved.location_type, Some("CITIES"));
    }

    #[test]
    fn retrigger_refreshes_instead_of_duplicating() {
        let state = builtin();
        let t0 = Instant::now();
        state.trigger_event_at(IN_GAME, t0);
        state.trigger_event_at(IN_GAME, t0 + Duration::from_secs(5));
        assert_eq!(state.active_ids(), vec![IN_GAME]);
    }

    #[test]
    fn priority_wins_then_timeout_hands_over() {
        let state = custom(vec![
            EventDef::area("HIGH", "High", LocationType::Poi, &[1]).with_flags(5, false, true),
            EventDef::area("LOW", "Low", LocationType::Cities, &[2]).with_flags(1, false, false),
        ]);
        let t0 = Instant::now();
        state.trigger_event_at("LOW", t0);
        state.trigger_event_at("HIGH", t0);
        assert_eq!(state.resolve_at(t0).unwrap().location, Some("High"));

        let later = t0 + TIMEOUT + Duration::from_secs(1);
        assert_eq!(state.check_for_timeout_at(later), 1);
        assert_eq!(state.resolve_at(later).unwrap().location, Some("Low"));
    }

    #[test]
    fn recency_breaks_priority_ties() {
        let state = custom(vec![
            EventDef::skill("A", Skill::Mining, 0),
            EventDef::skill("B", Skill::Smithing, 0),
        ]);
        let t0 = Instant::now();
        state.trigger_event_at("A", t0);
        state.trigger_event_at("B", t0 + Duration::from_secs(1));
        assert_eq!(state.resolve_at(t0).unwrap().skill, Some("Smithing"));
        state.trigger_event_at("A", t0 + Duration::from_secs(2));
        assert_eq!(state.resolve_at(t0).unwrap().skill, Some("Mining"));
    }

    #[test]
    fn timeout_only_removes_timing_out_events() {
        let state = builtin();
        let t0 = Instant::now();
        state.trigger_event_at(IN_GAME, t0);
        state.trigger_event_at("TRAINING_FISHING", t0);
        let later = t0 + TIMEOUT + Duration::from_secs(1);
        assert_eq!(state.check_for_timeout_at(later), 1);
        assert_eq!(state.active_ids(), vec![IN_GAME]);
        // Exactly at the boundary nothing expires.
        state.trigger_event_at("TRAINING_FISHING", t0);
        assert_eq!(state.check_for_timeout_at(t0 + TIMEOUT), 0);
    }

    #[test]
    fn idle_root_times_out_on_start_time() {
        let state = builtin();
        let t0 = Instant::now();
        state.trigger_event_at(IN_MENU, t0);
        assert_eq!(state.resolve_at(t0).unwrap().location, Some("In Menu"));

        // Refreshing does not move the start time.
        let later = t0 + TIMEOUT + Duration::from_secs(1);
        state.trigger_event_at(IN_MENU, later);
        assert!(state.resolve_at(later).is_none());
    }

    #[test]
    fn idle_root_below_other_events_still_resolves() {
        let state = builtin();
        let t0 = Instant::now();
        state.trigger_event_at(IN_MENU, t0);
        state.trigger_event_at("TRAINING_COOKING", t0);
        let later = t0 + TIMEOUT + Duration::from_secs(1);
        let resolved = state.resolve_at(later).unwrap();
        assert_eq!(resolved.skill, Some("Cooking"));
        assert_eq!(resolved.location, Some("In Menu"));
    }

    #[test]
    fn reset_clears_everything() {
        let state = builtin();
        state.trigger_event(IN_GAME);
        state.trigger_event("TRAINING_MAGIC");
        state.reset();
        assert!(state.active_ids().is_empty());
        assert!(state.resolve().is_none());
    }

    #[test]
    fn unknown_ids_are_ignored() {
        let state = builtin();
        assert!(!state.trigger_event("NOT_AN_EVENT"));
        assert!(state.active_ids().is_empty());
    }

    #[test]
    fn unbounded_timeout_never_expires() {
        let state = ActivityState::with_builtin(Duration::from_secs(u64::MAX));
        let t0 = Instant::now();
        state.trigger_event_at(IN_MENU, t0);
        state.trigger_event_at("TRAINING_FISHING", t0);
        let later = t0 + Duration::from_secs(3600);
        assert_eq!(state.check_for_timeout_at(later), 0);
        assert_eq!(state.resolve_at(later).unwrap().skill, Some("Fishing"));
    }

    #[test]
    fn concurrent_trigger_timeout_and_resolve() {
        let state = Arc::new(builtin());
        let ids = ["CITY_LUMBRIDGE", "CITY_VARROCK", "TRAINING_FISHING", IN_GAME];
        let mut handles = Vec::new();
        for worker in 0..4 {
            let state = Arc::clone(&state);
            handles.push(std::thread::spawn(move || {
                for i in 0..500 {
                    state.trigger_event(ids[(worker + i) % ids.len()]);
                }
            }));
        }
        let reader = {
            let state = Arc::clone(&state);
            std::thread::spawn(move || {
                for _ in 0..500 {
                    state.check_for_timeout();
                    let _ = state.resolve();
                }
            })
        };
        for handle in handles {
            handle.join().unwrap();
        }
        reader.join().unwrap();

        // Clearing events stay mutually exclusive under contention.
        let clearing = state
            .active_ids()
            .into_iter()
            .filter(|id| state.catalog().get(id).is_some_and(|e| e.clears))
            .count();
        assert_eq!(clearing, 1);
        assert!(state.is_active("TRAINING_FISHING"));
    }
}
