// Coaching rules: transient advisories for the focused driver

use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::roster::Telemetry;

pub(crate) const WHEELSPIN_MIN_THROTTLE: f32 = 98.;
pub(crate) const WHEELSPIN_MAX_SPEED: f32 = 140.;
pub const WHEELSPIN_MESSAGE: &str = "EXCESSIVE WHEELSPIN";
pub const PIT_ENTRY_MESSAGE: &str = "ENTERING PIT LANE";

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SignalKind {
    Correct,
    Wrong,
    Info,
}

/// A transient advisory tied to the focused driver's telemetry.
///
/// Signals are never persisted; they live in a bounded most-recent-first
/// buffer that is cleared whenever focus changes.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct CoachingSignal {
    pub kind: SignalKind,
    pub message: String,
    pub timestamp_ms: u128,
}

impl CoachingSignal {
    pub fn now(kind: SignalKind, message: &str) -> Self {
        Self {
            kind,
            message: message.to_string(),
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

/// A rule evaluated against each merged telemetry update of the focused
/// driver.
///
/// Rules see the previous snapshot (absent on the first sighting) and the
/// freshly merged one, and emit zero or more signals. Rules within a pass are
/// independent: none may depend on another rule's output.
pub trait CoachingRule {
    fn evaluate(
        &mut self,
        previous: Option<&Telemetry>,
        current: &Telemetry,
    ) -> Vec<CoachingSignal>;
}

/// Flags a car spinning its tires: full throttle without the speed to match.
pub struct WheelspinRule;

impl CoachingRule for WheelspinRule {
    fn evaluate(
        &mut self,
        _previous: Option<&Telemetry>,
        current: &Telemetry,
    ) -> Vec<CoachingSignal> {
        if current.throttle > WHEELSPIN_MIN_THROTTLE && current.speed < WHEELSPIN_MAX_SPEED {
            vec![CoachingSignal::now(SignalKind::Wrong, WHEELSPIN_MESSAGE)]
        } else {
            Vec::new()
        }
    }
}

/// Announces the focused car crossing onto pit road.
///
/// Fires on the rising edge of the pit flag only; a car first sighted while
/// already in the pits stays quiet.
pub struct PitEntryRule;

impl CoachingRule for PitEntryRule {
    fn evaluate(
        &mut self,
        previous: Option<&Telemetry>,
        current: &Telemetry,
    ) -> Vec<CoachingSignal> {
        let was_on_track = previous.is_some_and(|p| !p.pit_status);
        if was_on_track && current.pit_status {
            vec![CoachingSignal::now(SignalKind::Info, PIT_ENTRY_MESSAGE)]
        } else {
            Vec::new()
        }
    }
}

/// The default rule set evaluated by the engine.
pub fn default_rules() -> Vec<Box<dyn CoachingRule>> {
    vec![Box::new(WheelspinRule), Box::new(PitEntryRule)]
}
