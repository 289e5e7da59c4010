// The engine aggregate: one owner for roster, session state, focus, and
// signal buffers. All mutation is serialized through this type's methods;
// readers only ever see cloned snapshots.

pub(crate) mod recent;

pub use recent::RecentBuffer;

use std::sync::mpsc::Sender;
use std::time::{Duration, Instant};

use log::{error, warn};
use serde::Serialize;

use crate::coaching::{CoachingRule, CoachingSignal, default_rules};
use crate::config::AppConfig;
use crate::focus::FocusDirector;
use crate::roster::{Driver, DriverStatus, Roster};
use crate::session::{FlagColor, OutboundCommand, RaceEvent, RaceStats};
use crate::standings::{Alert, RankingMode, StandingsEngine, sorted_for_display};
use crate::store::StateStore;
use crate::transport::{TelemetryEvent, TransportMessage};

/// Immutable view of the engine state handed to presentation.
#[derive(Clone, Debug, Serialize)]
pub struct HudSnapshot {
    /// Drivers in display order, ascending by position.
    pub drivers: Vec<Driver>,
    pub race_stats: RaceStats,
    pub selected_driver_id: Option<String>,
    pub auto_focus: bool,
    pub alerts: Vec<Alert>,
    pub coaching: Vec<CoachingSignal>,
}

/// The single writer over all broadcast state.
///
/// Message handling is synchronous and atomic per call: resolve, merge,
/// re-rank, and coach all complete before `apply` returns, so no reader can
/// observe a half-merged driver. Telemetry for the same car is applied in
/// arrival order; over an unordered transport that means last-applied-wins
/// per field. This is a known, accepted weak-consistency tradeoff — there is
/// no sequence-number reordering here.
pub struct HudEngine {
    roster: Roster,
    race_stats: RaceStats,
    standings: StandingsEngine,
    focus: FocusDirector,
    rules: Vec<Box<dyn CoachingRule>>,
    coaching: RecentBuffer<CoachingSignal>,
    alerts: RecentBuffer<Alert>,
    store: Option<StateStore>,
    outbound: Option<Sender<OutboundCommand>>,
    swap_interval: Duration,
    last_swap: Instant,
    dirty: bool,
}

impl HudEngine {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            roster: Roster::new(),
            race_stats: RaceStats::default(),
            standings: StandingsEngine::new(config.ranking_mode),
            focus: FocusDirector::new(Duration::from_secs(config.focus_cooldown_s)),
            rules: default_rules(),
            coaching: RecentBuffer::new(config.coaching_buffer_cap),
            alerts: RecentBuffer::new(config.alert_buffer_cap),
            store: None,
            outbound: None,
            swap_interval: Duration::from_secs(config.lead_swap_interval_s),
            last_swap: Instant::now(),
            dirty: false,
        }
    }

    /// Attach a state store and restore whatever it holds.
    pub fn with_store(mut self, store: StateStore) -> Self {
        self.roster = Roster::from_drivers(store.load_roster());
        self.race_stats = store.load_race_stats();
        self.store = Some(store);
        self
    }

    /// Attach the outbound command channel for manager actions.
    pub fn with_outbound(mut self, sender: Sender<OutboundCommand>) -> Self {
        self.outbound = Some(sender);
        self
    }

    /// Replace the default coaching rule set.
    pub fn with_rules(mut self, rules: Vec<Box<dyn CoachingRule>>) -> Self {
        self.rules = rules;
        self
    }

    /// Process one transport message.
    ///
    /// Never fails: malformed content has already been degraded to omitted
    /// fields by the transport layer, and everything else is swallowed and
    /// logged so one bad message cannot poison the stream.
    pub fn apply(&mut self, message: TransportMessage, now: Instant) {
        match message {
            TransportMessage::Telemetry(event) => self.apply_telemetry(event, now),
            TransportMessage::SyncRaceState(sync) => {
                self.race_stats.apply_sync(&sync);
                self.refresh_focus(now);
                self.dirty = true;
            }
        }
    }

    fn apply_telemetry(&mut self, event: TelemetryEvent, now: Instant) {
        let resolved = self.roster.resolve(&event.car, &event.driver, &event.telemetry);

        let (driver_id, previous, merged) = {
            let Some(driver) = self.roster.get_index_mut(resolved.index) else {
                return;
            };
            let previous = if resolved.created {
                None
            } else {
                driver.telemetry.clone()
            };
            let mut merged = previous.clone().unwrap_or_default();
            event.telemetry.apply_to(&mut merged);
            driver.telemetry = Some(merged.clone());

            // telemetry may move a driver between track and pit road, but
            // never overrides a manager marking them out of the race
            if driver.status != DriverStatus::Out {
                driver.status = if merged.pit_status {
                    DriverStatus::Pit
                } else {
                    DriverStatus::Active
                };
            }
            (driver.id.clone(), previous, merged)
        };

        self.standings
            .record_progress(&driver_id, merged.lap_dist_pct, now);
        if self.standings.mode() == RankingMode::Telemetry
            && let Some(alert) = self.standings.rank(&mut self.roster)
        {
            self.alerts.push(alert);
        }

        if self.focus.selected_id() == Some(driver_id.as_str()) {
            for rule in self.rules.iter_mut() {
                for signal in rule.evaluate(previous.as_ref(), &merged) {
                    self.coaching.push(signal);
                }
            }
        }

        self.refresh_focus(now);
        self.dirty = true;
    }

    /// Advance time-driven behavior: the simulated lead change (demo mode),
    /// the focus cooldown, and coalesced persistence.
    pub fn tick(&mut self, now: Instant) {
        if self.standings.mode() == RankingMode::Simulated
            && self.roster.len() >= 2
            && now.duration_since(self.last_swap) >= self.swap_interval
        {
            if let Some(alert) = self.standings.swap_lead(&mut self.roster) {
                self.alerts.push(alert);
            }
            self.last_swap = now;
        }

        self.refresh_focus(now);

        if self.dirty {
            self.persist();
            self.dirty = false;
        }
    }

    fn refresh_focus(&mut self, now: Instant) {
        let leader_id = self.roster.leader().map(|d| d.id.clone());
        if self.focus.refresh(leader_id.as_deref(), now) {
            // advisories never carry over between drivers
            self.coaching.clear();
        }
    }

    fn persist(&self) {
        let Some(store) = &self.store else {
            return;
        };
        if let Err(e) = store.save_roster(self.roster.drivers()) {
            error!("Could not persist roster: {e}");
        }
        if let Err(e) = store.save_race_stats(&self.race_stats) {
            error!("Could not persist race stats: {e}");
        }
    }

    fn emit(&self, command: OutboundCommand) {
        if let Some(outbound) = &self.outbound
            && let Err(e) = outbound.send(command)
        {
            warn!("Dropped outbound command, channel closed: {e}");
        }
    }

    // ---- manager-facing mutation API ----

    /// Direct roster addition, bypassing telemetry resolution.
    pub fn add_driver(&mut self, driver: Driver, now: Instant) {
        self.roster.add(driver);
        self.refresh_focus(now);
        self.persist();
    }

    /// Remove a driver. Positions are compacted as part of the removal;
    /// there is never a gap in the running order afterwards.
    pub fn remove_driver(&mut self, id: &str, now: Instant) -> bool {
        let Some(removed) = self.roster.remove(id) else {
            return false;
        };
        self.standings.forget(&removed.id);
        self.focus.deselect(&removed.id);
        self.refresh_focus(now);
        self.persist();
        true
    }

    /// Replace a driver record wholesale (manager edit).
    pub fn update_driver(&mut self, driver: Driver, now: Instant) -> bool {
        if !self.roster.update(driver) {
            return false;
        }
        self.refresh_focus(now);
        self.persist();
        true
    }

    /// Manually focus a driver: clears the coaching buffer and holds off
    /// auto-focus for the configured cooldown.
    pub fn select_driver(&mut self, id: &str, now: Instant) -> bool {
        if self.roster.get(id).is_none() {
            warn!("Ignoring selection of unknown driver {id}");
            return false;
        }
        self.focus.select_manual(id, now);
        self.coaching.clear();
        true
    }

    /// Switch the broadcast to a new event and mark the session live.
    pub fn set_event(&mut self, event: RaceEvent) {
        self.race_stats.set_event(event);
        self.persist();
    }

    /// Manager flag change. Only Green and Yellow can be thrown from the
    /// dashboard; the command is also emitted outbound, fire-and-forget.
    pub fn update_flag(&mut self, flag: FlagColor, now: Instant) -> bool {
        if !matches!(flag, FlagColor::Green | FlagColor::Yellow) {
            warn!("Manager flag change to {flag} not allowed");
            return false;
        }
        self.race_stats.flag = flag;
        self.emit(OutboundCommand::UpdateFlag { flag });
        self.refresh_focus(now);
        self.persist();
        true
    }

    pub fn toggle_maintenance(&mut self, value: bool) {
        self.race_stats.is_maintenance = value;
        self.emit(OutboundCommand::ToggleMaintenance { value });
        self.persist();
    }

    // ---- read side ----

    pub fn roster(&self) -> &Roster {
        &self.roster
    }

    pub fn race_stats(&self) -> &RaceStats {
        &self.race_stats
    }

    pub fn alerts(&self) -> &RecentBuffer<Alert> {
        &self.alerts
    }

    pub fn coaching(&self) -> &RecentBuffer<CoachingSignal> {
        &self.coaching
    }

    pub fn selected_driver_id(&self) -> Option<&str> {
        self.focus.selected_id()
    }

    pub fn auto_focus_active(&self) -> bool {
        self.focus.auto_focus_active()
    }

    pub fn snapshot(&self) -> HudSnapshot {
        HudSnapshot {
            drivers: sorted_for_display(&self.roster)
                .into_iter()
                .cloned()
                .collect(),
            race_stats: self.race_stats.clone(),
            selected_driver_id: self.focus.selected_id().map(str::to_string),
            auto_focus: self.focus.auto_focus_active(),
            alerts: self.alerts.to_vec(),
            coaching: self.coaching.to_vec(),
        }
    }
}
