//! Process configuration read from the environment.

use tracing::warn;

use travel_auth::SYSTEM_USER;
use travel_observability::LogFormat;

pub const SEED_DATA_VAR: &str = "TRAVEL_SEED_DATA";
pub const SYSTEM_USER_VAR: &str = "TRAVEL_SYSTEM_USER";
pub const LOG_FORMAT_VAR: &str = "TRAVEL_LOG_FORMAT";

/// Runtime settings for the travel service.
///
/// Missing variables fall back to defaults; unparsable ones fall back too and
/// are reported with a warning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    /// Load the demo itineraries into an empty store at startup.
    pub seed_data: bool,
    /// User id stamped by background work with no authenticated principal.
    pub system_user: String,
    pub log_format: LogFormat,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            seed_data: true,
            system_user: SYSTEM_USER.to_string(),
            log_format: LogFormat::default(),
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();

        let seed_data = match lookup(SEED_DATA_VAR) {
            Some(raw) => parse_bool(&raw).unwrap_or_else(|| {
                warn!(var = SEED_DATA_VAR, value = %raw, "not a boolean; using default");
                defaults.seed_data
            }),
            None => defaults.seed_data,
        };

        let system_user = lookup(SYSTEM_USER_VAR)
            .map(|raw| raw.trim().to_string())
            .filter(|user| !user.is_empty())
            .unwrap_or(defaults.system_user);

        let log_format = match lookup(LOG_FORMAT_VAR) {
            Some(raw) => raw.parse::<LogFormat>().unwrap_or_else(|err| {
                warn!(var = LOG_FORMAT_VAR, error = %err, "using default log format");
                defaults.log_format
            }),
            None => defaults.log_format,
        };

        Self {
            seed_data,
            system_user,
            log_format,
        }
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
