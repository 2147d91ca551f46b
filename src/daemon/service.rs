//! Telemetry service: owns the write registry, the activity state machine and
//! the skilling tracker, reacts to host notifications, and drives the
//! heartbeat and flush schedules.
//!
//! Lifecycle:
//! 1. `TelemetryService::new(config)` builds every component from one config.
//! 2. `start()` spawns the heartbeat and flush schedules.
//! 3. Host notifications arrive through the `on_*` methods and `submit`.
//! 4. `apply_config()` swaps settings at runtime; a changed interval tears
//!    the matching schedule down and rebuilds it.
//! 5. `shutdown()` runs a final heartbeat and flush, then stops the schedules.

#![allow(missing_docs)]

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};

use crate::activity::catalog::{AreaFlags, IN_GAME, IN_MENU, Skill};
use crate::activity::state::{ActivityState, CompositeState};
use crate::collect::activity::activity_measurement;
use crate::collect::series_names::{BaseTags, SERIES_SKILL, feature_enabled};
use crate::collect::skilling::{InventoryItem, SkillingItemTracker};
use crate::core::config::Config;
use crate::core::errors::Result;
use crate::daemon::backoff::FlushBackoff;
use crate::daemon::schedule::FixedDelaySchedule;
use crate::sink::SinkConnector;
use crate::write::measurement::Measurement;
use crate::write::registry::{FlushOutcome, WriteRegistry};
use crate::write::series::Series;

// ──────────────────── host-side state ────────────────────

/// Client connection state as reported by the host.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GameState {
    #[default]
    Unknown,
    Starting,
    LoginScreen,
    LoginScreenAuthenticator,
    LoggingIn,
    Loading,
    LoggedIn,
    ConnectionLost,
    Hopping,
}

/// Last known player position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Position {
    region: u32,
    plane: i32,
    flags: AreaFlags,
}

#[derive(Debug, Default)]
struct Session {
    tags: BaseTags,
    game_state: GameState,
    tick: u64,
    position: Option<Position>,
    previous_xp: HashMap<Skill, i64>,
    skilling: SkillingItemTracker,
}

// ──────────────────── flush attempts ────────────────────

/// Result of one scheduled flush cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushAttempt {
    /// Skipped while the failure backoff window drains.
    Suppressed,
    Completed(FlushOutcome),
    /// Delivery failed; `failures` consecutive failures so far.
    Failed { failures: u32 },
}

#[derive(Debug, Default)]
struct Schedules {
    heartbeat: Option<FixedDelaySchedule>,
    flush: Option<FixedDelaySchedule>,
}

// ──────────────────── service ────────────────────

/// The wired-up telemetry pipeline. Shared as `Arc<TelemetryService>`; the
/// schedules hold only weak references.
pub struct TelemetryService {
    registry: WriteRegistry,
    activity: ActivityState,
    config: RwLock<Config>,
    backoff: Mutex<FlushBackoff>,
    session: Mutex<Session>,
    schedules: Mutex<Schedules>,
}

impl std::fmt::Debug for TelemetryService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelemetryService")
            .field("registry", &self.registry)
            .field("backoff", &*self.backoff.lock())
            .finish_non_exhaustive()
    }
}

impl TelemetryService {
    /// Service delivering through the URL-scheme connector.
    #[must_use]
    pub fn new(config: Config) -> Arc<Self> {
        let registry = WriteRegistry::new(config.sink.clone());
        Self::with_registry(config, registry)
    }

    /// Service delivering through a custom connector.
    #[must_use]
    pub fn with_connector(config: Config, connector: Box<dyn SinkConnector>) -> Arc<Self> {
        let registry = WriteRegistry::with_connector(config.sink.clone(), connector);
        Self::with_registry(config, registry)
    }

    fn with_registry(config: Config, registry: WriteRegistry) -> Arc<Self> {
        let activity = ActivityState::with_builtin(config.activity.idle_timeout());
        Arc::new(Self {
            registry,
            activity,
            config: RwLock::new(config),
            backoff: Mutex::new(FlushBackoff::new()),
            session: Mutex::new(Session::default()),
            schedules: Mutex::new(Schedules::default()),
        })
    }

    #[must_use]
    pub fn registry(&self) -> &WriteRegistry {
        &self.registry
    }

    #[must_use]
    pub fn activity(&self) -> &ActivityState {
        &self.activity
    }

    #[must_use]
    pub fn config(&self) -> Config {
        self.config.read().clone()
    }

    #[must_use]
    pub fn backoff(&self) -> FlushBackoff {
        *self.backoff.lock()
    }

    #[must_use]
    pub fn base_tags(&self) -> BaseTags {
        self.session.lock().tags.clone()
    }

    #[must_use]
    pub fn game_state(&self) -> GameState {
        self.session.lock().game_state
    }

    // ──────────────────── schedules ────────────────────

    /// Spawn the heartbeat and flush schedules. Restarts any that are running.
    ///
    /// # Errors
    /// `Runtime` when a worker thread cannot be spawned.
    pub fn start(self: &Arc<Self>) -> Result<()> {
        let (heartbeat, flush) = {
            let config = self.config.read();
            (
                config.schedule.heartbeat_interval(),
                config.schedule.flush_interval(),
            )
        };
        self.restart_heartbeat(heartbeat)?;
        self.restart_flush(flush)?;
        tracing::info!(?heartbeat, ?flush, "telemetry schedules started");
        Ok(())
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        let schedules = self.schedules.lock();
        schedules.flush.as_ref().is_some_and(FixedDelaySchedule::is_running)
            || schedules
                .heartbeat
                .as_ref()
                .is_some_and(FixedDelaySchedule::is_running)
    }

    /// Interval of the running flush schedule.
    #[must_use]
    pub fn flush_schedule_interval(&self) -> Option<Duration> {
        self.schedules
            .lock()
            .flush
            .as_ref()
            .map(FixedDelaySchedule::interval)
    }

    fn restart_heartbeat(self: &Arc<Self>, interval: Duration) -> Result<()> {
        let weak = Arc::downgrade(self);
        let schedule = FixedDelaySchedule::start("heartbeat", interval, interval, move || {
            if let Some(service) = Weak::upgrade(&weak) {
                service.heartbeat();
            }
        })?;
        let previous = self.schedules.lock().heartbeat.replace(schedule);
        drop(previous);
        Ok(())
    }

    fn restart_flush(self: &Arc<Self>, interval: Duration) -> Result<()> {
        let weak = Arc::downgrade(self);
        let schedule = FixedDelaySchedule::start("flush", interval, interval, move || {
            if let Some(service) = Weak::upgrade(&weak) {
                service.scheduled_flush();
            }
        })?;
        let previous = self.schedules.lock().flush.replace(schedule);
        drop(previous);
        Ok(())
    }

    fn stop_schedules(&self) {
        let mut schedules = {
            let mut guard = self.schedules.lock();
            std::mem::take(&mut *guard)
        };
        if let Some(s) = schedules.heartbeat.as_mut() {
            s.stop();
        }
        if let Some(s) = schedules.flush.as_mut() {
            s.stop();
        }
    }

    // ──────────────────── periodic work ────────────────────

    /// Expire stale events, resolve the composite state and submit it.
    pub fn heartbeat(&self) -> Option<CompositeState> {
        if !self.config.read().features.write_activity {
            return None;
        }
        let expired = self.activity.check_for_timeout();
        if expired > 0 {
            tracing::debug!(expired, "activity events timed out");
        }
        let state = self.activity.resolve()?;
        let tags = self.base_tags();
        if let Some(measurement) = activity_measurement(&tags, &state) {
            let _ = self.submit(measurement);
        }
        Some(state)
    }

    /// One flush cycle under the failure backoff.
    pub fn scheduled_flush(&self) -> FlushAttempt {
        if !self.backoff.lock().should_attempt() {
            return FlushAttempt::Suppressed;
        }
        match self.registry.flush() {
            Ok(outcome) => {
                self.backoff.lock().record_success();
                FlushAttempt::Completed(outcome)
            }
            Err(e) => {
                let failures = self.backoff.lock().record_failure();
                tracing::error!(error = %e, code = e.code(), failures, "flush failed");
                FlushAttempt::Failed { failures }
            }
        }
    }

    // ──────────────────── producers ────────────────────

    /// Submit `measurement` unless its category is switched off.
    ///
    /// # Errors
    /// `StrategyContract` when the measurement violates its writer's contract.
    pub fn submit(&self, measurement: Measurement) -> Result<bool> {
        if !feature_enabled(&self.config.read().features, measurement.series().name()) {
            return Ok(false);
        }
        self.registry.submit(measurement)
    }

    #[must_use]
    pub fn is_blocked(&self, series: &Series) -> bool {
        self.registry.is_blocked(series)
    }

    fn submit_all(&self, measurements: Vec<Measurement>) {
        for measurement in measurements {
            let _ = self.submit(measurement);
        }
    }

    /// Trigger a classification event when activity writing is on.
    pub fn trigger(&self, id: &str) -> bool {
        self.config.read().features.write_activity && self.activity.trigger_event(id)
    }

    // ──────────────────── host notifications ────────────────────

    /// Set the account the following series are tagged with.
    pub fn on_login(&self, user: &str, extra: BTreeMap<String, String>) {
        let mut session = self.session.lock();
        session.tags = BaseTags {
            user: user.to_string(),
            extra,
        };
        tracing::info!(user, "session user set");
    }

    pub fn on_game_state(&self, state: GameState) {
        let previous = {
            let mut session = self.session.lock();
            let previous = session.game_state;
            session.game_state = state;
            if state == GameState::LoggingIn {
                session.previous_xp.clear();
            }
            previous
        };

        match state {
            GameState::LoginScreen => self.reset_activity(),
            GameState::LoggedIn if previous == GameState::LoggingIn => self.reset_activity(),
            _ => {}
        }
        self.check_for_area_update();
    }

    fn reset_activity(&self) {
        self.activity.reset();
        let root = if self.game_state() == GameState::LoggedIn {
            IN_GAME
        } else {
            IN_MENU
        };
        self.trigger(root);
    }

    /// A skill's xp total changed.
    pub fn on_stat_changed(&self, skill: Skill, xp: i64, level: i64, virtual_level: i64) {
        let (tags, gained, closed) = {
            let mut session = self.session.lock();
            if xp == 0 || session.game_state != GameState::LoggedIn {
                return;
            }
            let previous = session.previous_xp.insert(skill, xp);
            let Some(previous) = previous.filter(|p| *p != xp) else {
                return;
            };
            let gained = xp - previous;
            let (tick, tags) = (session.tick, session.tags.clone());
            let closed = session.skilling.on_xp_gained(skill, gained, tick, &tags);
            (tags, gained, closed)
        };
        self.submit_all(closed);
        tracing::trace!(skill = skill.name(), gained, "xp gained");

        let features = self.config.read().features.clone();
        if features.write_xp {
            let series = tags.series(SERIES_SKILL).tag("skill", skill.name()).build();
            let measurement = Measurement::builder(series)
                .numeric_field("xp", xp)
                .numeric_field("realLevel", level)
                .numeric_field("virtualLevel", virtual_level)
                .build();
            let _ = self.submit(measurement);
        }
        if features.write_activity {
            if let Some(event) = self.activity.catalog().from_skill(skill) {
                self.activity.trigger_event(event.id);
            }
        }
    }

    /// Player position changed.
    pub fn on_region(&self, region: u32, plane: i32, flags: AreaFlags) {
        self.session.lock().position = Some(Position {
            region,
            plane,
            flags,
        });
        self.check_for_area_update();
    }

    fn check_for_area_update(&self) {
        let position = {
            let session = self.session.lock();
            if session.game_state != GameState::LoggedIn {
                return;
            }
            session.position
        };
        let Some(pos) = position else {
            return;
        };
        if let Some(event) = self
            .activity
            .catalog()
            .classify_area(pos.region, pos.plane, pos.flags)
        {
            self.trigger(event.id);
        }
    }

    /// Varbit values changed; `values` holds the current reading per varbit.
    pub fn on_varbits(&self, values: &BTreeMap<u32, i64>) {
        let probe = |varbit: u32| values.get(&varbit).copied().unwrap_or(0);
        if let Some(event) = self.activity.catalog().from_varbit(probe) {
            self.trigger(event.id);
        }
    }

    pub fn on_tick(&self, tick: u64) {
        let closed = {
            let mut session = self.session.lock();
            session.tick = tick;
            let tags = session.tags.clone();
            session.skilling.flush_if_needed(tick, &tags)
        };
        self.submit_all(closed);
    }

    /// Full inventory snapshot.
    pub fn on_inventory(&self, items: &[InventoryItem]) {
        let closed = {
            let mut session = self.session.lock();
            let tick = session.tick;
            let tags = session.tags.clone();
            session.skilling.on_inventory(items, tick, &tags)
        };
        self.submit_all(closed);
    }

    // ──────────────────── configuration ────────────────────

    /// Swap in `new` at runtime.
    ///
    /// Any change resets the flush backoff. A changed interval rebuilds the
    /// matching schedule when schedules are running. Sink identity changes
    /// take effect on the next flush.
    ///
    /// # Errors
    /// `InvalidConfig` when `new` fails validation; nothing is applied then.
    pub fn apply_config(self: &Arc<Self>, new: Config) -> Result<bool> {
        new.validate()?;
        let old = {
            let mut config = self.config.write();
            if *config == new {
                tracing::debug!("config unchanged, skipping reload");
                return Ok(false);
            }
            std::mem::replace(&mut *config, new.clone())
        };

        self.backoff.lock().reset();
        self.registry.update_settings(new.sink.clone());
        self.activity.set_idle_timeout(new.activity.idle_timeout());

        let running = self.is_running();
        if running && old.schedule.flush_interval_secs != new.schedule.flush_interval_secs {
            self.restart_flush(new.schedule.flush_interval())?;
            tracing::info!(interval = ?new.schedule.flush_interval(), "flush schedule rebuilt");
        }
        if running && old.schedule.heartbeat_interval_secs != new.schedule.heartbeat_interval_secs
        {
            self.restart_heartbeat(new.schedule.heartbeat_interval())?;
        }

        let old_hash = old.stable_hash().unwrap_or_default();
        let new_hash = new.stable_hash().unwrap_or_default();
        tracing::info!(%old_hash, %new_hash, "config applied");
        Ok(true)
    }

    /// Re-read the config file the current config was loaded from.
    ///
    /// # Errors
    /// Load, parse and validation failures; the running config is kept.
    pub fn reload_from_disk(self: &Arc<Self>) -> Result<bool> {
        let path = self.config.read().config_file.clone();
        let explicit = (!path.as_os_str().is_empty()).then_some(path.as_path());
        let loaded = Config::load(explicit).inspect_err(|e| {
            tracing::error!(error = %e, code = e.code(), "config reload failed");
        })?;
        self.apply_config(loaded)
    }

    // ──────────────────── shutdown ────────────────────

    /// Final heartbeat and flush, then stop the schedules.
    pub fn shutdown(&self) {
        self.heartbeat();
        match self.registry.flush() {
            Ok(outcome) => tracing::info!(?outcome, "final flush"),
            Err(e) => tracing::error!(error = %e, code = e.code(), "final flush failed"),
        }
        self.stop_schedules();
    }
}

impl Drop for TelemetryService {
    fn drop(&mut self) {
        self.stop_schedules();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::activity::catalog::Catalog;
    use crate::collect::series_names::SERIES_ACTIVITY;
    use crate::core::errors::ItelError;
    use crate::sink::{BatchPoints, PointSink, SinkIdentity};
    use std::sync::atomic::{AtomicBool, Ordering};

    #[derive(Default)]
    struct Shared {
        batches: Mutex<Vec<BatchPoints>>,
        failing: AtomicBool,
    }

    struct Recording(Arc<Shared>);

    impl PointSink for Recording {
        fn write(&mut self, batch: &BatchPoints) -> Result<()> {
            if self.0.failing.load(Ordering::SeqCst) {
                return Err(ItelError::delivery("test://", "down"));
            }
            self.0.batches.lock().push(batch.clone());
            Ok(())
        }

        fn endpoint(&self) -> String {
            "test://".to_string()
        }
    }

    struct Connector(Arc<Shared>);

    impl SinkConnector for Connector {
        fn connect(&self, _identity: &SinkIdentity) -> Result<Box<dyn PointSink>> {
            Ok(Box::new(Recording(Arc::clone(&self.0))))
        }
    }

    fn config() -> Config {
        let mut config = Config::default();
        config.sink.url = "http://db:8086".to_string();
        config.sink.database = "osrs".to_string();
        config
    }

    fn service() -> (Arc<TelemetryService>, Arc<Shared>) {
        let shared = Arc::new(Shared::default());
        let svc =
            TelemetryService::with_connector(config(), Box::new(Connector(Arc::clone(&shared))));
        svc.on_login("zezima", BTreeMap::new());
        (svc, shared)
    }

    fn log_in(svc: &TelemetryService) {
        svc.on_game_state(GameState::LoggingIn);
        svc.on_game_state(GameState::LoggedIn);
    }

    fn delivered(shared: &Shared) -> Vec<String> {
        shared
            .batches
            .lock()
            .iter()
            .flat_map(|b| b.points().iter().map(|p| p.measurement.clone()))
            .collect()
    }

    #[test]
    fn login_resets_activity_to_in_game() {
        let (svc, _) = service();
        svc.on_game_state(GameState::LoginScreen);
        assert_eq!(svc.activity().active_ids(), vec![IN_MENU]);
        log_in(&svc);
        assert_eq!(svc.activity().active_ids(), vec![IN_GAME]);
    }

    #[test]
    fn first_stat_report_is_a_baseline() {
        let (svc, shared) = service();
        log_in(&svc);
        svc.on_stat_changed(Skill::Fishing, 1_000, 20, 20);
        let skill_series = svc.base_tags().series(SERIES_SKILL).tag("skill", "FISHING").build();
        assert!(!svc.is_blocked(&skill_series));
        svc.on_stat_changed(Skill::Fishing, 1_050, 20, 20);
        assert!(svc.is_blocked(&skill_series));
        assert!(svc.activity().is_active("TRAINING_FISHING"));
        svc.scheduled_flush();
        assert_eq!(delivered(&shared), vec![SERIES_SKILL.to_string()]);
    }

    #[test]
    fn stats_are_ignored_when_logged_out() {
        let (svc, shared) = service();
        svc.on_stat_changed(Skill::Fishing, 1_000, 20, 20);
        svc.on_stat_changed(Skill::Fishing, 1_050, 20, 20);
        assert_eq!(
            svc.scheduled_flush(),
            FlushAttempt::Completed(FlushOutcome::Empty)
        );
        assert!(delivered(&shared).is_empty());
    }

    #[test]
    fn heartbeat_submits_resolved_activity() {
        let (svc, shared) = service();
        log_in(&svc);
        let state = svc.heartbeat().unwrap();
        assert_eq!(state.location, Some("In Game"));
        svc.scheduled_flush();
        assert_eq!(delivered(&shared), vec![SERIES_ACTIVITY.to_string()]);
    }

    #[test]
    fn disabled_category_is_dropped() {
        let (svc, _) = service();
        let mut cfg = config();
        cfg.features.write_activity = false;
        svc.apply_config(cfg).unwrap();
        log_in(&svc);
        assert!(svc.activity().active_ids().is_empty());
        assert!(svc.heartbeat().is_none());
        let m = Measurement::builder(svc.base_tags().series(SERIES_ACTIVITY).build())
            .string_field("location", "x")
            .build();
        assert!(!svc.submit(m).unwrap());
    }

    #[test]
    fn failures_arm_backoff_and_config_change_clears_it() {
        let (svc, shared) = service();
        log_in(&svc);
        svc.heartbeat();
        shared.failing.store(true, Ordering::SeqCst);
        assert_eq!(svc.scheduled_flush(), FlushAttempt::Failed { failures: 1 });
        assert_eq!(svc.scheduled_flush(), FlushAttempt::Suppressed);
        svc.heartbeat();
        assert_eq!(svc.scheduled_flush(), FlushAttempt::Failed { failures: 2 });
        for _ in 0..4 {
            assert_eq!(svc.scheduled_flush(), FlushAttempt::Suppressed);
        }

        shared.failing.store(false, Ordering::SeqCst);
        svc.heartbeat();
        assert_eq!(
            svc.scheduled_flush(),
            FlushAttempt::Completed(FlushOutcome::Delivered { points: 1 })
        );

        shared.failing.store(true, Ordering::SeqCst);
        svc.heartbeat();
        svc.scheduled_flush();
        let mut cfg = config();
        cfg.sink.retention_policy = "weekly".to_string();
        assert!(svc.apply_config(cfg).unwrap());
        assert_eq!(svc.backoff(), FlushBackoff::new());
    }

    #[test]
    fn unchanged_config_is_not_reapplied() {
        let (svc, _) = service();
        assert!(!svc.apply_config(config()).unwrap());
        let mut bad = config();
        bad.schedule.flush_interval_secs = 1;
        assert!(svc.apply_config(bad).is_err());
        assert_eq!(svc.config(), config());
    }

    #[test]
    fn flush_interval_change_rebuilds_schedule() {
        let (svc, _) = service();
        svc.start().unwrap();
        assert_eq!(svc.flush_schedule_interval(), Some(Duration::from_secs(15)));
        let mut cfg = config();
        cfg.schedule.flush_interval_secs = 30;
        svc.apply_config(cfg).unwrap();
        assert_eq!(svc.flush_schedule_interval(), Some(Duration::from_secs(30)));
        svc.shutdown();
        assert!(!svc.is_running());
    }

    #[test]
    fn region_updates_classify_area() {
        let (svc, _) = service();
        log_in(&svc);
        let region = Catalog::builtin()
            .get("CITY_VARROCK")
            .and_then(|e| e.regions.first().copied())
            .unwrap();
        svc.on_region(region, 0, AreaFlags::default());
        assert!(svc.activity().is_active("CITY_VARROCK"));
        let wilderness = AreaFlags {
            wilderness: true,
            ..AreaFlags::default()
        };
        svc.on_region(region, 0, wilderness);
        assert!(svc.activity().is_active("WILDERNESS"));
    }

    #[test]
    fn skilling_items_flow_through_ticks() {
        let (svc, shared) = service();
        log_in(&svc);
        svc.on_tick(1);
        svc.on_stat_changed(Skill::Woodcutting, 100, 10, 10);
        svc.on_inventory(&[]);
        svc.on_tick(2);
        svc.on_stat_changed(Skill::Woodcutting, 125, 10, 10);
        svc.on_inventory(&[InventoryItem {
            id: 1511,
            quantity: 1,
            name: Some("Logs".to_string()),
        }]);
        svc.on_tick(3);
        svc.scheduled_flush();
        let names = delivered(&shared);
        assert!(names.contains(&"rs_skilling_items".to_string()));
    }

    #[test]
    fn shutdown_flushes_pending_points() {
        let (svc, shared) = service();
        log_in(&svc);
        svc.shutdown();
        assert_eq!(delivered(&shared), vec![SERIES_ACTIVITY.to_string()]);
    }
}
