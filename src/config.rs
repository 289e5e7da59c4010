use serde::{Deserialize, Serialize};

use crate::errors::PitwallError;
use crate::focus::DEFAULT_FOCUS_COOLDOWN_S;
use crate::standings::{DEFAULT_LEAD_SWAP_INTERVAL_S, RankingMode};
use crate::transport::simulator::SIM_REFRESH_RATE_MS;

const CONFIG_FILE_NAME: &str = "config.json";

pub const DEFAULT_ALERT_BUFFER_CAP: usize = 5;
pub const DEFAULT_COACHING_BUFFER_CAP: usize = 3;

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(default)]
pub struct AppConfig {
    pub ranking_mode: RankingMode,
    pub lead_swap_interval_s: u64,
    pub focus_cooldown_s: u64,
    pub alert_buffer_cap: usize,
    pub coaching_buffer_cap: usize,
    pub simulator_refresh_ms: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            ranking_mode: RankingMode::default(),
            lead_swap_interval_s: DEFAULT_LEAD_SWAP_INTERVAL_S,
            focus_cooldown_s: DEFAULT_FOCUS_COOLDOWN_S,
            alert_buffer_cap: DEFAULT_ALERT_BUFFER_CAP,
            coaching_buffer_cap: DEFAULT_COACHING_BUFFER_CAP,
            simulator_refresh_ms: SIM_REFRESH_RATE_MS,
        }
    }
}

impl AppConfig {
    pub fn from_local_file() -> Option<Self> {
        let config_path = dirs::config_dir()?.join("pitwall").join(CONFIG_FILE_NAME);

        if config_path.exists() {
            let file = std::fs::File::open(config_path).ok()?;
            match serde_json::from_reader(file) {
                Ok(config) => Some(config),
                Err(e) => {
                    log::warn!("Could not parse config file, using defaults: {e}");
                    None
                }
            }
        } else {
            None
        }
    }

    pub fn save(&self) -> Result<(), PitwallError> {
        let config_path = dirs::config_dir()
            .ok_or(PitwallError::NoConfigDir)?
            .join("pitwall")
            .join(CONFIG_FILE_NAME);

        if !config_path.exists()
            && let Some(parent) = config_path.parent()
        {
            std::fs::create_dir_all(parent)
                .map_err(|e| PitwallError::ConfigIoError { source: e })?;
        }

        let file = std::fs::File::create(config_path)
            .map_err(|e| PitwallError::ConfigIoError { source: e })?;
        serde_json::to_writer(file, self)
            .map_err(|e| PitwallError::ConfigSerializeError { source: e })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_documented_values() {
        let config = AppConfig::default();
        assert_eq!(config.lead_swap_interval_s, 12);
        assert_eq!(config.focus_cooldown_s, 25);
        assert_eq!(config.alert_buffer_cap, 5);
        assert_eq!(config.coaching_buffer_cap, 3);
        assert_eq!(config.ranking_mode, RankingMode::Telemetry);
    }

    #[test]
    fn test_partial_config_files_fill_in_defaults() {
        let config: AppConfig = serde_json::from_str(r#"{"focus_cooldown_s": 10}"#).unwrap();
        assert_eq!(config.focus_cooldown_s, 10);
        assert_eq!(config.alert_buffer_cap, DEFAULT_ALERT_BUFFER_CAP);
    }
}
