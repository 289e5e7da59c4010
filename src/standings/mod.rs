// Standings engine: position ordering, gap strings, lead-change alerts

use std::collections::HashMap;
use std::time::{Instant, SystemTime, UNIX_EPOCH};

use itertools::Itertools;
use log::{debug, info};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::roster::registry::placeholder_gap;
use crate::roster::{Driver, LEADER_GAP, Roster};

/// Interval of the simulated lead-change tick.
pub const DEFAULT_LEAD_SWAP_INTERVAL_S: u64 = 12;

/// A lap-fraction drop larger than this is a start/finish-line crossing, not
/// a car backing up.
const WRAP_THRESHOLD: f32 = 0.5;

/// Weight of the newest lap-rate sample in the smoothed estimate.
const RATE_SMOOTHING: f32 = 0.3;

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub enum AlertKind {
    #[serde(rename = "LEAD_CHANGE")]
    LeadChange,
}

/// A broadcast-facing notification that the position-1 driver changed.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Alert {
    pub driver_name: String,
    pub car_number: String,
    pub kind: AlertKind,
    pub timestamp_ms: u128,
}

impl Alert {
    pub fn lead_change(driver: &Driver) -> Self {
        Self {
            driver_name: driver.name.clone(),
            car_number: driver.number.clone(),
            kind: AlertKind::LeadChange,
            timestamp_ms: unix_millis(),
        }
    }
}

fn unix_millis() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or(0)
}

/// How positions are derived.
///
/// `Simulated` is the demo mechanism: a periodic swap of P1 and P2, not tied
/// to telemetry. `Telemetry` ranks by accumulated lap progress and is the
/// mode live ingestion runs in.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RankingMode {
    Simulated,
    #[default]
    Telemetry,
}

/// Format a time delta as a display gap, e.g. `+0.347`.
pub fn format_gap(seconds: f32) -> String {
    format!("+{seconds:.3}")
}

#[derive(Clone, Copy, Debug, Default)]
struct LapProgress {
    laps: u32,
    last_pct: f32,
    last_instant: Option<Instant>,
    /// Smoothed lap fraction per second, used to turn distance deficits into
    /// time gaps.
    rate: Option<f32>,
}

/// Sort key tolerating non-numeric car numbers: numeric numbers order
/// numerically ahead of everything else, the rest lexicographically.
fn car_number_key(number: &str) -> (u8, u32, String) {
    match number.parse::<u32>() {
        Ok(numeric) => (0, numeric, String::new()),
        Err(_) => (1, 0, number.to_string()),
    }
}

/// Derives position ordering and gap strings for the roster.
pub struct StandingsEngine {
    mode: RankingMode,
    progress: HashMap<String, LapProgress>,
    last_leader: Option<String>,
}

impl StandingsEngine {
    pub fn new(mode: RankingMode) -> Self {
        Self {
            mode,
            progress: HashMap::new(),
            last_leader: None,
        }
    }

    pub fn mode(&self) -> RankingMode {
        self.mode
    }

    /// Record a lap-distance observation for a driver.
    ///
    /// Detects the 1.0 -> 0.0 wrap at the start/finish line to accumulate
    /// completed laps, and keeps a smoothed lap-rate estimate per driver.
    pub fn record_progress(&mut self, driver_id: &str, lap_dist_pct: f32, now: Instant) {
        let entry = self.progress.entry(driver_id.to_string()).or_default();

        let wrapped = entry.last_pct - lap_dist_pct > WRAP_THRESHOLD;
        if wrapped {
            entry.laps += 1;
            debug!("{driver_id} completed lap {}", entry.laps);
        }

        if let Some(last_instant) = entry.last_instant {
            let dt = now.duration_since(last_instant).as_secs_f32();
            let mut delta = lap_dist_pct - entry.last_pct;
            if wrapped {
                delta += 1.0;
            }
            if dt > 0. && delta >= 0. {
                let sample = delta / dt;
                entry.rate = Some(match entry.rate {
                    Some(rate) => rate + RATE_SMOOTHING * (sample - rate),
                    None => sample,
                });
            }
        }

        entry.last_pct = lap_dist_pct;
        entry.last_instant = Some(now);
    }

    fn progress_of(&self, driver_id: &str) -> f32 {
        self.progress
            .get(driver_id)
            .map(|p| p.laps as f32 + p.last_pct)
            .unwrap_or(-1.)
    }

    fn rate_of(&self, driver_id: &str) -> Option<f32> {
        self.progress.get(driver_id).and_then(|p| p.rate)
    }

    /// Drop accumulated progress for a removed driver.
    pub fn forget(&mut self, driver_id: &str) {
        self.progress.remove(driver_id);
    }

    /// Recompute positions from accumulated lap progress.
    ///
    /// Ordering is descending progress; ties break deterministically by
    /// ascending car number. Drivers that have never reported progress rank
    /// behind everyone who has. Returns a lead-change alert when the
    /// position-1 driver differs from the previous ranking pass.
    pub fn rank(&mut self, roster: &mut Roster) -> Option<Alert> {
        if roster.is_empty() {
            return None;
        }

        let order: Vec<String> = roster
            .drivers()
            .iter()
            .sorted_by(|a, b| {
                self.progress_of(&b.id)
                    .partial_cmp(&self.progress_of(&a.id))
                    .unwrap_or(std::cmp::Ordering::Equal)
                    .then_with(|| car_number_key(&a.number).cmp(&car_number_key(&b.number)))
            })
            .map(|d| d.id.clone())
            .collect();

        let leader_id = order[0].clone();
        let leader_progress = self.progress_of(&leader_id);
        let leader_rate = self.rate_of(&leader_id);

        for (rank, id) in order.iter().enumerate() {
            let gap = if rank == 0 {
                LEADER_GAP.to_string()
            } else {
                let deficit = leader_progress - self.progress_of(id);
                self.display_gap(deficit, leader_rate, roster.get(id))
            };
            if let Some(driver) = roster.get_mut(id) {
                driver.position = rank + 1;
                driver.gap = gap;
            }
        }

        let lead_changed = self.last_leader.as_deref() != Some(leader_id.as_str());
        let had_leader = self.last_leader.is_some();
        self.last_leader = Some(leader_id.clone());

        if lead_changed && had_leader {
            let new_leader = roster.get(&leader_id)?;
            info!("Lead change: #{} {} takes P1", new_leader.number, new_leader.name);
            return Some(Alert::lead_change(new_leader));
        }
        None
    }

    fn display_gap(&self, deficit: f32, leader_rate: Option<f32>, driver: Option<&Driver>) -> String {
        if deficit >= 1. {
            return format!("+{}L", deficit.floor() as u32);
        }
        if let Some(rate) = leader_rate
            && rate > 0.
        {
            return format_gap(deficit / rate);
        }
        // no lap-rate estimate yet: retain the previous display gap, unless
        // that would leak the leader-reserved marker
        match driver {
            Some(d) if d.gap != LEADER_GAP => d.gap.clone(),
            _ => placeholder_gap(),
        }
    }

    /// Simulated lead change: swap P1 and P2 (demo mechanism).
    ///
    /// The former P2 takes the lead with the reserved gap; the former leader
    /// drops to P2 with a randomized gap in [0.100, 0.500) seconds. Requires
    /// at least two drivers.
    pub fn swap_lead(&mut self, roster: &mut Roster) -> Option<Alert> {
        if roster.len() < 2 {
            return None;
        }

        let p1_id = roster.drivers().iter().find(|d| d.position == 1)?.id.clone();
        let p2_id = roster.drivers().iter().find(|d| d.position == 2)?.id.clone();

        let demoted_gap = format_gap(rand::rng().random_range(0.100f32..0.500));
        if let Some(former_leader) = roster.get_mut(&p1_id) {
            former_leader.position = 2;
            former_leader.gap = demoted_gap;
        }

        let new_leader = roster.get_mut(&p2_id)?;
        new_leader.position = 1;
        new_leader.gap = LEADER_GAP.to_string();
        info!("Lead change: #{} {} takes P1", new_leader.number, new_leader.name);

        self.last_leader = Some(p2_id.clone());
        roster.get(&p2_id).map(Alert::lead_change)
    }
}

/// Drivers in display order: ascending by position.
pub fn sorted_for_display(roster: &Roster) -> Vec<&Driver> {
    roster
        .drivers()
        .iter()
        .sorted_by_key(|d| d.position)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::roster::TelemetryPatch;

    fn seeded_roster(cars: &[(&str, &str)]) -> Roster {
        let mut roster = Roster::new();
        for (number, name) in cars {
            roster.resolve(number, name, &TelemetryPatch::default());
        }
        roster
    }

    #[test]
    fn test_swap_promotes_p2_and_demotes_p1() {
        let mut roster = seeded_roster(&[("22", "JOEY LOGANO"), ("8", "KYLE BUSCH")]);
        let mut standings = StandingsEngine::new(RankingMode::Simulated);

        let alert = standings.swap_lead(&mut roster).unwrap();

        let new_leader = roster.leader().unwrap();
        assert_eq!(new_leader.number, "8");
        assert_eq!(new_leader.gap, LEADER_GAP);

        let demoted = roster.drivers().iter().find(|d| d.position == 2).unwrap();
        assert_eq!(demoted.number, "22");
        let seconds: f32 = demoted.gap.strip_prefix('+').unwrap().parse().unwrap();
        assert!((0.100..0.500).contains(&seconds));
        // three decimals
        assert_eq!(demoted.gap.split('.').nth(1).unwrap().len(), 3);

        assert_eq!(alert.kind, AlertKind::LeadChange);
        assert_eq!(alert.car_number, "8");
        assert_eq!(alert.driver_name, "KYLE BUSCH");
    }

    #[test]
    fn test_swap_requires_two_drivers() {
        let mut roster = seeded_roster(&[("22", "JOEY LOGANO")]);
        let mut standings = StandingsEngine::new(RankingMode::Simulated);
        assert!(standings.swap_lead(&mut roster).is_none());
        assert_eq!(roster.leader().unwrap().position, 1);
    }

    #[test]
    fn test_rank_orders_by_accumulated_progress() {
        let mut roster = seeded_roster(&[("22", "JOEY LOGANO"), ("8", "KYLE BUSCH")]);
        let mut standings = StandingsEngine::new(RankingMode::Telemetry);
        let now = Instant::now();

        // car 8 is half a lap ahead
        standings.record_progress("driver-1", 0.25, now);
        standings.record_progress("driver-2", 0.75, now);
        standings.rank(&mut roster);

        assert_eq!(roster.leader().unwrap().number, "8");
        let trailing = roster.drivers().iter().find(|d| d.number == "22").unwrap();
        assert_eq!(trailing.position, 2);
    }

    #[test]
    fn test_rank_counts_laps_across_the_wrap() {
        let mut roster = seeded_roster(&[("22", "JOEY LOGANO"), ("8", "KYLE BUSCH")]);
        let mut standings = StandingsEngine::new(RankingMode::Telemetry);
        let now = Instant::now();

        // car 22 crosses the line (0.98 -> 0.02): one full lap in the bank
        standings.record_progress("driver-1", 0.98, now);
        standings.record_progress("driver-1", 0.02, now);
        standings.record_progress("driver-2", 0.90, now);
        standings.rank(&mut roster);

        assert_eq!(roster.leader().unwrap().number, "22");
    }

    #[test]
    fn test_rank_breaks_ties_by_car_number() {
        let mut roster = seeded_roster(&[("24", "WILLIAM BYRON"), ("9", "CHASE ELLIOTT")]);
        let mut standings = StandingsEngine::new(RankingMode::Telemetry);
        let now = Instant::now();

        standings.record_progress("driver-1", 0.40, now);
        standings.record_progress("driver-2", 0.40, now);
        standings.rank(&mut roster);

        // identical progress: the lower car number ranks first
        assert_eq!(roster.leader().unwrap().number, "9");
    }

    #[test]
    fn test_rank_emits_one_alert_per_lead_change() {
        let mut roster = seeded_roster(&[("22", "JOEY LOGANO"), ("8", "KYLE BUSCH")]);
        let mut standings = StandingsEngine::new(RankingMode::Telemetry);
        let now = Instant::now();

        standings.record_progress("driver-1", 0.50, now);
        standings.record_progress("driver-2", 0.20, now);
        // first pass establishes a leader; no alert for the initial ranking
        assert!(standings.rank(&mut roster).is_none());
        // unchanged order: still quiet
        assert!(standings.rank(&mut roster).is_none());

        // car 8 sweeps past
        standings.record_progress("driver-2", 0.60, now);
        let alert = standings.rank(&mut roster);
        assert!(alert.is_some());
        assert_eq!(alert.unwrap().car_number, "8");
    }

    #[test]
    fn test_lapped_driver_gap_renders_laps_behind() {
        let mut roster = seeded_roster(&[("22", "JOEY LOGANO"), ("8", "KYLE BUSCH")]);
        let mut standings = StandingsEngine::new(RankingMode::Telemetry);
        let now = Instant::now();

        standings.record_progress("driver-1", 0.90, now);
        standings.record_progress("driver-1", 0.10, now); // lap 1
        standings.record_progress("driver-1", 0.90, now);
        standings.record_progress("driver-1", 0.10, now); // lap 2
        standings.record_progress("driver-2", 0.05, now);
        standings.rank(&mut roster);

        let lapped = roster.drivers().iter().find(|d| d.number == "8").unwrap();
        assert_eq!(lapped.gap, "+2L");
    }

    #[test]
    fn test_same_lap_gap_derived_from_leader_rate() {
        let mut roster = seeded_roster(&[("22", "JOEY LOGANO"), ("8", "KYLE BUSCH")]);
        let mut standings = StandingsEngine::new(RankingMode::Telemetry);
        let start = Instant::now();

        // leader covers 1% of the lap per second
        standings.record_progress("driver-1", 0.40, start);
        standings.record_progress("driver-1", 0.50, start + std::time::Duration::from_secs(10));
        standings.record_progress("driver-2", 0.45, start + std::time::Duration::from_secs(10));
        standings.rank(&mut roster);

        let chaser = roster.drivers().iter().find(|d| d.number == "8").unwrap();
        let seconds: f32 = chaser.gap.strip_prefix('+').unwrap().parse().unwrap();
        // 5% deficit at 1%/s is a five-second gap
        assert!((seconds - 5.0).abs() < 0.25, "gap was {}", chaser.gap);
    }

    #[test]
    fn test_leader_always_renders_reserved_gap() {
        let mut roster = seeded_roster(&[("22", "JOEY LOGANO"), ("8", "KYLE BUSCH")]);
        let mut standings = StandingsEngine::new(RankingMode::Telemetry);
        let now = Instant::now();

        standings.record_progress("driver-2", 0.75, now);
        standings.rank(&mut roster);

        for driver in roster.drivers() {
            if driver.position == 1 {
                assert_eq!(driver.gap, LEADER_GAP);
            } else {
                assert_ne!(driver.gap, LEADER_GAP);
            }
        }
    }

    #[test]
    fn test_display_order_is_ascending_position() {
        let mut roster = seeded_roster(&[
            ("22", "JOEY LOGANO"),
            ("8", "KYLE BUSCH"),
            ("9", "CHASE ELLIOTT"),
        ]);
        let mut standings = StandingsEngine::new(RankingMode::Telemetry);
        let now = Instant::now();

        standings.record_progress("driver-1", 0.10, now);
        standings.record_progress("driver-2", 0.90, now);
        standings.record_progress("driver-3", 0.50, now);
        standings.rank(&mut roster);

        let positions: Vec<usize> = sorted_for_display(&roster)
            .iter()
            .map(|d| d.position)
            .collect();
        assert_eq!(positions, vec![1, 2, 3]);
    }
}
