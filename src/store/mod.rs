// Persisted state: roster and race stats survive across restarts as opaque
// JSON blobs under stable keys.

use std::fs;
use std::path::PathBuf;

use log::{debug, warn};

use crate::errors::PitwallError;
use crate::roster::Driver;
use crate::session::RaceStats;

const ROSTER_KEY: &str = "roster.json";
const RACE_STATS_KEY: &str = "race_stats.json";

/// File-backed store with load-on-init and save-on-mutation hooks.
///
/// Loading never fails: absent or malformed blobs fall back to an empty
/// roster / default race stats with a warning.
pub struct StateStore {
    base_dir: PathBuf,
}

impl StateStore {
    pub fn new(base_dir: PathBuf) -> Result<Self, PitwallError> {
        if !base_dir.exists() {
            fs::create_dir_all(&base_dir).map_err(|e| PitwallError::StoreIoError { source: e })?;
        }
        Ok(Self { base_dir })
    }

    /// Create the store in the default application data directory.
    pub fn new_default() -> Result<Self, PitwallError> {
        let base_dir = dirs::data_dir()
            .ok_or(PitwallError::NoStateDir)?
            .join("pitwall")
            .join("state");
        Self::new(base_dir)
    }

    fn key_path(&self, key: &str) -> PathBuf {
        self.base_dir.join(key)
    }

    fn load_blob<T: serde::de::DeserializeOwned + Default>(&self, key: &str) -> T {
        let path = self.key_path(key);
        if !path.exists() {
            debug!("No persisted state under {key}, starting fresh");
            return T::default();
        }
        match fs::read_to_string(&path) {
            Ok(content) => match serde_json::from_str(&content) {
                Ok(value) => value,
                Err(e) => {
                    warn!("Discarding malformed persisted state under {key}: {e}");
                    T::default()
                }
            },
            Err(e) => {
                warn!("Could not read persisted state under {key}: {e}");
                T::default()
            }
        }
    }

    fn save_blob<T: serde::Serialize>(&self, key: &str, value: &T) -> Result<(), PitwallError> {
        let content = serde_json::to_string(value)
            .map_err(|e| PitwallError::StoreSerializeError { source: e })?;
        fs::write(self.key_path(key), content)
            .map_err(|e| PitwallError::StoreIoError { source: e })
    }

    pub fn load_roster(&self) -> Vec<Driver> {
        self.load_blob(ROSTER_KEY)
    }

    pub fn save_roster(&self, drivers: &[Driver]) -> Result<(), PitwallError> {
        self.save_blob(ROSTER_KEY, &drivers)
    }

    pub fn load_race_stats(&self) -> RaceStats {
        self.load_blob(RACE_STATS_KEY)
    }

    pub fn save_race_stats(&self, stats: &RaceStats) -> Result<(), PitwallError> {
        self.save_blob(RACE_STATS_KEY, stats)
    }
}
