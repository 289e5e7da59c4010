// Library interface for pitwall
// This allows integration tests to access internal modules

pub mod coaching;
pub mod config;
pub mod errors;
pub mod focus;
pub mod hud;
pub mod recorder;
pub mod roster;
pub mod session;
pub mod standings;
pub mod store;
pub mod transport;

// Re-export commonly used types
pub use config::AppConfig;
pub use errors::PitwallError;
pub use hud::{HudEngine, HudSnapshot};
pub use roster::{Driver, DriverStatus, Roster, Telemetry, TelemetryPatch};
pub use session::{FlagColor, RaceStats};
pub use standings::{Alert, AlertKind, RankingMode};
pub use transport::{MessageSource, MockMessageSource, TransportMessage};
