// Driver registry: authoritative mapping of car identity -> driver record

use log::{debug, info};
use rand::Rng;

use super::{Driver, DriverStatus, LEADER_GAP, TelemetryPatch};

/// Outcome of resolving a telemetry event against the roster.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ResolvedDriver {
    /// Index of the resolved driver in the roster.
    pub index: usize,
    /// Whether the driver was materialized by this event.
    pub created: bool,
}

/// Synthesized gap string for a driver that has never been ranked.
pub(crate) fn placeholder_gap() -> String {
    format!("+{:.3}", rand::rng().random_range(0.0..2.0))
}

/// The set of all tracked drivers for the session.
///
/// The registry exclusively owns the driver records and their telemetry;
/// every mutation flows through the engine into these methods. Ids are
/// assigned from a monotonic sequence at first sighting and are never reused
/// or derived from the car number, so a mid-session renumber can never
/// recycle an identity.
#[derive(Debug)]
pub struct Roster {
    drivers: Vec<Driver>,
    next_id: u64,
}

impl Default for Roster {
    fn default() -> Self {
        Roster::new()
    }
}

impl Roster {
    pub fn new() -> Self {
        Self {
            drivers: Vec::new(),
            next_id: 1,
        }
    }

    /// Rebuild a roster from persisted driver records.
    ///
    /// The id sequence resumes past the highest persisted id so drivers
    /// created after a restart never collide with restored ones.
    pub fn from_drivers(drivers: Vec<Driver>) -> Self {
        let next_id = drivers
            .iter()
            .filter_map(|d| d.id.strip_prefix("driver-"))
            .filter_map(|seq| seq.parse::<u64>().ok())
            .max()
            .map(|max| max + 1)
            .unwrap_or(drivers.len() as u64 + 1);
        Self { drivers, next_id }
    }

    /// Resolve a telemetry event's identity fields to a driver record,
    /// materializing a new driver if none matches.
    ///
    /// A driver matches if its stored number equals the event's car number OR
    /// its stored name equals the event's driver name. The OR tolerates late
    /// renames and number corrections from the external simulator, at the
    /// accepted cost of a possible false merge when two distinct entities
    /// transiently share a number. A miss always creates, never rejects.
    pub fn resolve(&mut self, car_number: &str, driver_name: &str, patch: &TelemetryPatch) -> ResolvedDriver {
        if let Some(index) = self
            .drivers
            .iter()
            .position(|d| d.number == car_number || d.name == driver_name)
        {
            return ResolvedDriver {
                index,
                created: false,
            };
        }

        let id = format!("driver-{}", self.next_id);
        self.next_id += 1;

        let position = self.drivers.len() + 1;
        let gap = if position == 1 {
            LEADER_GAP.to_string()
        } else {
            placeholder_gap()
        };
        let status = if patch.pit_status.unwrap_or(false) {
            DriverStatus::Pit
        } else {
            DriverStatus::Active
        };

        info!("New driver sighted: #{car_number} {driver_name} -> {id} (P{position})");
        self.drivers.push(Driver {
            id,
            name: driver_name.to_string(),
            number: car_number.to_string(),
            position,
            gap,
            status,
            telemetry: Some(patch.initial_snapshot()),
        });

        ResolvedDriver {
            index: self.drivers.len() - 1,
            created: true,
        }
    }

    pub fn get(&self, id: &str) -> Option<&Driver> {
        self.drivers.iter().find(|d| d.id == id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut Driver> {
        self.drivers.iter_mut().find(|d| d.id == id)
    }

    pub fn get_index(&self, index: usize) -> Option<&Driver> {
        self.drivers.get(index)
    }

    pub fn get_index_mut(&mut self, index: usize) -> Option<&mut Driver> {
        self.drivers.get_mut(index)
    }

    /// The driver currently holding position 1, if the roster is non-empty.
    pub fn leader(&self) -> Option<&Driver> {
        self.drivers.iter().find(|d| d.position == 1)
    }

    pub fn drivers(&self) -> &[Driver] {
        &self.drivers
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Driver> {
        self.drivers.iter_mut()
    }

    pub fn len(&self) -> usize {
        self.drivers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.drivers.is_empty()
    }

    /// Append a manager-created driver, bypassing telemetry resolution.
    pub fn add(&mut self, driver: Driver) {
        // keep the id sequence ahead of externally supplied ids
        if let Some(seq) = driver
            .id
            .strip_prefix("driver-")
            .and_then(|s| s.parse::<u64>().ok())
            && seq >= self.next_id
        {
            self.next_id = seq + 1;
        }
        debug!("Manager added driver {} (#{})", driver.id, driver.number);
        self.drivers.push(driver);
        self.renumber();
    }

    /// Replace a driver record wholesale (manager edit). No-op if the id is
    /// unknown.
    pub fn update(&mut self, driver: Driver) -> bool {
        match self.drivers.iter_mut().find(|d| d.id == driver.id) {
            Some(existing) => {
                *existing = driver;
                self.renumber();
                true
            }
            None => false,
        }
    }

    /// Remove a driver and compact the remaining positions back to a
    /// contiguous 1..N permutation. Renumbering is part of this operation's
    /// contract; callers never observe a position gap.
    pub fn remove(&mut self, id: &str) -> Option<Driver> {
        let index = self.drivers.iter().position(|d| d.id == id)?;
        let removed = self.drivers.remove(index);
        info!("Driver {} (#{}) removed from roster", removed.id, removed.number);
        self.renumber();
        Some(removed)
    }

    /// Compact positions to 1..N, preserving relative order, and re-assert
    /// the leader-gap invariant: position 1 carries [`LEADER_GAP`], nobody
    /// else does.
    pub fn renumber(&mut self) {
        let mut order: Vec<usize> = (0..self.drivers.len()).collect();
        order.sort_by_key(|&i| self.drivers[i].position);

        for (rank, index) in order.into_iter().enumerate() {
            let driver = &mut self.drivers[index];
            driver.position = rank + 1;
            if driver.position == 1 {
                driver.gap = LEADER_GAP.to_string();
            } else if driver.gap == LEADER_GAP {
                driver.gap = placeholder_gap();
            }
        }
    }
}
