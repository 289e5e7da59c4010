// Race-wide session state, updated by race-control broadcasts and manager
// commands. Per-car telemetry never touches any of these fields.

use std::str::FromStr;

use log::warn;
use serde::{Deserialize, Serialize};

use crate::roster::lenient;

/// Session status forced by a manager taking an event live.
pub const SESSION_STATUS_LIVE: &str = "RACE LIVE";

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub enum FlagColor {
    Green,
    Yellow,
    Red,
    White,
    Checkered,
}

impl FromStr for FlagColor {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Green" => Ok(FlagColor::Green),
            "Yellow" => Ok(FlagColor::Yellow),
            "Red" => Ok(FlagColor::Red),
            "White" => Ok(FlagColor::White),
            "Checkered" => Ok(FlagColor::Checkered),
            _ => Err(()),
        }
    }
}

impl std::fmt::Display for FlagColor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FlagColor::Green => write!(f, "Green"),
            FlagColor::Yellow => write!(f, "Yellow"),
            FlagColor::Red => write!(f, "Red"),
            FlagColor::White => write!(f, "White"),
            FlagColor::Checkered => write!(f, "Checkered"),
        }
    }
}

/// One entry of the series schedule.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RaceEvent {
    pub name: String,
    pub track: String,
    pub date: String,
    #[serde(default)]
    pub is_exhibition: bool,
}

/// Race-wide stats surfaced on every overlay.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct RaceStats {
    pub lap: u32,
    pub total_laps: u32,
    pub flag: FlagColor,
    pub track_temp: String,
    pub air_temp: String,
    pub session_status: String,
    pub current_event: Option<RaceEvent>,
    pub is_maintenance: bool,
}

impl Default for RaceStats {
    fn default() -> Self {
        Self {
            lap: 1,
            total_laps: 100,
            flag: FlagColor::Green,
            track_temp: "102°F".to_string(),
            air_temp: "78°F".to_string(),
            session_status: "PRACTICE".to_string(),
            current_event: None,
            is_maintenance: false,
        }
    }
}

/// A `sync_race_state` broadcast from race control.
///
/// All fields are optional; absent fields retain their prior values. The
/// flag travels as a raw string so an unknown color can be rejected on merge
/// without losing the rest of the message.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct RaceStateSync {
    #[serde(deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub flag: Option<String>,
    #[serde(deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub lap: Option<u32>,
    #[serde(deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub total_laps: Option<u32>,
    #[serde(deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub is_maintenance: Option<bool>,
}

impl RaceStats {
    /// Shallow-merge a race-control broadcast into the current stats.
    ///
    /// An invalid flag value is rejected and the previous flag retained; it
    /// is never coerced to an unrelated color.
    pub fn apply_sync(&mut self, sync: &RaceStateSync) {
        if let Some(raw_flag) = &sync.flag {
            match FlagColor::from_str(raw_flag) {
                Ok(flag) => self.flag = flag,
                Err(_) => warn!("Rejected invalid flag value '{raw_flag}', keeping {}", self.flag),
            }
        }
        if let Some(lap) = sync.lap {
            self.lap = lap;
        }
        if let Some(total_laps) = sync.total_laps {
            self.total_laps = total_laps;
        }
        if let Some(is_maintenance) = sync.is_maintenance {
            self.is_maintenance = is_maintenance;
        }
    }

    /// Switch the broadcast to a new event and mark the session live.
    pub fn set_event(&mut self, event: RaceEvent) {
        self.current_event = Some(event);
        self.session_status = SESSION_STATUS_LIVE.to_string();
    }
}

/// Manager-triggered commands emitted back over the transport.
/// Fire-and-forget: no acknowledgment is expected.
#[derive(Clone, Debug, Serialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutboundCommand {
    UpdateFlag { flag: FlagColor },
    ToggleMaintenance { value: bool },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sync_merges_only_present_fields() {
        let mut stats = RaceStats::default();
        let sync: RaceStateSync =
            serde_json::from_str(r#"{"lap": 42, "isMaintenance": true}"#).unwrap();
        stats.apply_sync(&sync);

        assert_eq!(stats.lap, 42);
        assert!(stats.is_maintenance);
        // untouched fields keep their prior values
        assert_eq!(stats.total_laps, 100);
        assert_eq!(stats.flag, FlagColor::Green);
    }

    #[test]
    fn test_valid_flag_is_applied() {
        let mut stats = RaceStats::default();
        let sync: RaceStateSync = serde_json::from_str(r#"{"flag": "Yellow"}"#).unwrap();
        stats.apply_sync(&sync);
        assert_eq!(stats.flag, FlagColor::Yellow);
    }

    #[test]
    fn test_invalid_flag_is_rejected_and_previous_retained() {
        let mut stats = RaceStats {
            flag: FlagColor::Yellow,
            ..Default::default()
        };
        let sync: RaceStateSync =
            serde_json::from_str(r#"{"flag": "Purple", "lap": 7}"#).unwrap();
        stats.apply_sync(&sync);

        assert_eq!(stats.flag, FlagColor::Yellow);
        // the rest of the message still lands
        assert_eq!(stats.lap, 7);
    }

    #[test]
    fn test_wrong_typed_sync_fields_are_omitted() {
        let mut stats = RaceStats::default();
        let sync: RaceStateSync =
            serde_json::from_str(r#"{"lap": "forty", "totalLaps": 80}"#).unwrap();
        stats.apply_sync(&sync);

        assert_eq!(stats.lap, 1);
        assert_eq!(stats.total_laps, 80);
    }

    #[test]
    fn test_set_event_forces_live_status() {
        let mut stats = RaceStats::default();
        stats.set_event(RaceEvent {
            name: "Season Opener".to_string(),
            track: "Daytona".to_string(),
            date: "2026-02-15".to_string(),
            is_exhibition: false,
        });

        assert_eq!(stats.session_status, SESSION_STATUS_LIVE);
        assert_eq!(stats.current_event.as_ref().unwrap().track, "Daytona");
    }

    #[test]
    fn test_outbound_command_wire_shape() {
        let command = OutboundCommand::UpdateFlag {
            flag: FlagColor::Yellow,
        };
        assert_eq!(
            serde_json::to_string(&command).unwrap(),
            r#"{"type":"update_flag","flag":"Yellow"}"#
        );
    }
}
