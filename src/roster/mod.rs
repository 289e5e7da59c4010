pub(crate) mod registry;

pub use registry::{ResolvedDriver, Roster};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};

/// Gap string reserved for the driver holding position 1.
pub const LEADER_GAP: &str = "--";

/// Lateral and longitudinal acceleration, in g.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct GForce {
    pub lat: f32,
    pub long: f32,
}

/// Tire surface temperatures for all four corners of the car.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct TireTemps {
    pub fl: f32,
    pub fr: f32,
    pub rl: f32,
    pub rr: f32,
}

/// Live telemetry snapshot for one driver.
///
/// Created on the first telemetry sighting for a car and updated in place by
/// [`TelemetryPatch::apply_to`] for the rest of the session. It is only ever
/// destroyed together with its owning [`Driver`].
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct Telemetry {
    /// Current engine RPM
    pub rpm: f32,
    /// Current speed, mph
    pub speed: f32,
    /// Current gear
    pub gear: i32,
    /// Throttle use, 0=off throttle to 100=full throttle
    pub throttle: f32,
    /// Brake use, 0=released to 100=max pedal force
    pub brake: f32,
    /// Fuel remaining, gallons
    pub fuel: f32,
    /// Percentage distance around the lap, wraps at 1.0 -> 0.0 each lap
    pub lap_dist_pct: f32,
    /// Whether the car is currently on pit road
    pub pit_status: bool,
    pub g_force: GForce,
    pub tires: TireTemps,
}

impl Default for Telemetry {
    fn default() -> Self {
        Self {
            rpm: 0.,
            speed: 0.,
            gear: 0,
            throttle: 0.,
            brake: 0.,
            fuel: 0.,
            lap_dist_pct: 0.,
            pit_status: false,
            g_force: GForce::default(),
            tires: TireTemps::default(),
        }
    }
}

/// Deserializes a field that may be absent or carry the wrong type.
///
/// Incoming telemetry payloads are partial by contract and occasionally
/// malformed; either case decodes to `None` ("field omitted") so a single bad
/// field never rejects the whole message.
pub(crate) fn lenient<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(T::deserialize(value).ok())
}

#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct GForcePatch {
    #[serde(deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub lat: Option<f32>,
    #[serde(deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub long: Option<f32>,
}

impl GForcePatch {
    fn apply_to(&self, g_force: &mut GForce) {
        if let Some(lat) = self.lat {
            g_force.lat = lat;
        }
        if let Some(long) = self.long {
            g_force.long = long;
        }
    }
}

#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TireTempsPatch {
    #[serde(deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub fl: Option<f32>,
    #[serde(deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub fr: Option<f32>,
    #[serde(deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub rl: Option<f32>,
    #[serde(deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub rr: Option<f32>,
}

impl TireTempsPatch {
    fn apply_to(&self, tires: &mut TireTemps) {
        if let Some(fl) = self.fl {
            tires.fl = fl;
        }
        if let Some(fr) = self.fr {
            tires.fr = fr;
        }
        if let Some(rl) = self.rl {
            tires.rl = rl;
        }
        if let Some(rr) = self.rr {
            tires.rr = rr;
        }
    }
}

/// A partial telemetry update as delivered by the transport.
///
/// Every field is optional: keys present in the payload overwrite the stored
/// snapshot, omitted keys retain their prior values. The nested `g_force` and
/// `tires` structures merge the same way, key by key, rather than being
/// replaced wholesale.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct TelemetryPatch {
    #[serde(deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub rpm: Option<f32>,
    #[serde(deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub speed: Option<f32>,
    #[serde(deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub gear: Option<i32>,
    #[serde(deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub throttle: Option<f32>,
    #[serde(deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub brake: Option<f32>,
    #[serde(deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub fuel: Option<f32>,
    #[serde(deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub lap_dist_pct: Option<f32>,
    #[serde(deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub pit_status: Option<bool>,
    #[serde(deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub g_force: Option<GForcePatch>,
    #[serde(deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub tires: Option<TireTempsPatch>,
}

impl TelemetryPatch {
    /// Merge this patch into an existing snapshot.
    pub fn apply_to(&self, telemetry: &mut Telemetry) {
        if let Some(rpm) = self.rpm {
            telemetry.rpm = rpm;
        }
        if let Some(speed) = self.speed {
            telemetry.speed = speed;
        }
        if let Some(gear) = self.gear {
            telemetry.gear = gear;
        }
        if let Some(throttle) = self.throttle {
            telemetry.throttle = throttle;
        }
        if let Some(brake) = self.brake {
            telemetry.brake = brake;
        }
        if let Some(fuel) = self.fuel {
            telemetry.fuel = fuel;
        }
        if let Some(lap_dist_pct) = self.lap_dist_pct {
            telemetry.lap_dist_pct = lap_dist_pct;
        }
        if let Some(pit_status) = self.pit_status {
            telemetry.pit_status = pit_status;
        }
        if let Some(g_force) = &self.g_force {
            g_force.apply_to(&mut telemetry.g_force);
        }
        if let Some(tires) = &self.tires {
            tires.apply_to(&mut telemetry.tires);
        }
    }

    /// Build the initial snapshot for a newly sighted car.
    pub fn initial_snapshot(&self) -> Telemetry {
        let mut telemetry = Telemetry::default();
        self.apply_to(&mut telemetry);
        telemetry
    }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub enum DriverStatus {
    Active,
    Pit,
    Out,
}

/// One tracked competitor/car entity in the roster.
///
/// `id` is assigned by the registry at first sighting and never changes;
/// every other field is mutated in place through the engine's reducers.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Driver {
    pub id: String,
    pub name: String,
    /// Car number. Display key only: the external simulator may re-use or
    /// correct numbers mid-session, so this is not a unique identity.
    pub number: String,
    /// Integer rank, 1 = leader. A permutation of 1..N across the roster.
    pub position: usize,
    /// Formatted delta behind the leader; [`LEADER_GAP`] for the leader only.
    pub gap: String,
    pub status: DriverStatus,
    /// Absent until the first telemetry event for this car arrives.
    pub telemetry: Option<Telemetry>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn merged(existing: Telemetry, raw: &str) -> Telemetry {
        let patch: TelemetryPatch = serde_json::from_str(raw).unwrap();
        let mut telemetry = existing;
        patch.apply_to(&mut telemetry);
        telemetry
    }

    #[test]
    fn test_partial_merge_preserves_omitted_fields() {
        let existing = Telemetry {
            speed: 150.,
            gear: 3,
            ..Default::default()
        };
        let out = merged(existing, r#"{"rpm": 8000}"#);
        assert_eq!(out.speed, 150.);
        assert_eq!(out.gear, 3);
        assert_eq!(out.rpm, 8000.);
    }

    #[test]
    fn test_nested_structures_merge_key_by_key() {
        let existing = Telemetry {
            g_force: GForce { lat: 1.2, long: 0.4 },
            tires: TireTemps {
                fl: 210.,
                fr: 215.,
                rl: 205.,
                rr: 208.,
            },
            ..Default::default()
        };
        let out = merged(existing, r#"{"gForce": {"lat": 1.5}, "tires": {"rr": 220.5}}"#);
        assert_eq!(out.g_force.lat, 1.5);
        assert_eq!(out.g_force.long, 0.4);
        assert_eq!(out.tires.fl, 210.);
        assert_eq!(out.tires.rr, 220.5);
    }

    #[test]
    fn test_malformed_fields_are_treated_as_omitted() {
        let existing = Telemetry {
            speed: 150.,
            ..Default::default()
        };
        // wrong-typed speed and gForce must not reject the message or clobber
        // the stored values; the valid rpm still lands
        let out = merged(
            existing,
            r#"{"speed": "fast", "gForce": "sideways", "rpm": 7200}"#,
        );
        assert_eq!(out.speed, 150.);
        assert_eq!(out.rpm, 7200.);
    }

    #[test]
    fn test_empty_patch_is_a_no_op() {
        let existing = Telemetry {
            speed: 150.,
            gear: 4,
            pit_status: true,
            ..Default::default()
        };
        let out = merged(existing.clone(), "{}");
        assert_eq!(out, existing);
    }

    #[test]
    fn test_initial_snapshot_from_partial_payload() {
        let patch: TelemetryPatch =
            serde_json::from_str(r#"{"speed": 185.2, "pitStatus": true}"#).unwrap();
        let telemetry = patch.initial_snapshot();
        assert_eq!(telemetry.speed, 185.2);
        assert!(telemetry.pit_status);
        assert_eq!(telemetry.rpm, 0.);
    }

    use proptest::prelude::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        #[test]
        fn prop_merge_preserves_unpatched_fields(
            base_speed in 0.0f32..300.0,
            base_rpm in 0.0f32..10000.0,
            base_lat in -3.0f32..3.0,
            patch_rpm in proptest::option::of(0.0f32..10000.0),
            patch_throttle in proptest::option::of(0.0f32..100.0),
            patch_long in proptest::option::of(-3.0f32..3.0),
        ) {
            let existing = Telemetry {
                speed: base_speed,
                rpm: base_rpm,
                g_force: GForce { lat: base_lat, long: 0. },
                ..Default::default()
            };
            let patch = TelemetryPatch {
                rpm: patch_rpm,
                throttle: patch_throttle,
                g_force: patch_long.map(|long| GForcePatch {
                    lat: None,
                    long: Some(long),
                }),
                ..Default::default()
            };

            let mut merged = existing.clone();
            patch.apply_to(&mut merged);

            // patched fields take the incoming value, everything else is
            // untouched, including sibling keys of a nested structure
            prop_assert_eq!(merged.speed, base_speed);
            prop_assert_eq!(merged.rpm, patch_rpm.unwrap_or(base_rpm));
            prop_assert_eq!(merged.throttle, patch_throttle.unwrap_or(0.));
            prop_assert_eq!(merged.g_force.lat, base_lat);
            prop_assert_eq!(merged.g_force.long, patch_long.unwrap_or(0.));
        }
    }
}
