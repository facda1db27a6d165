//! Environment-driven configuration

use crate::state::PendingActionPolicy;
use std::env;
use std::path::PathBuf;
use tracing::warn;

const DEFAULT_DB_PATH: &str = "assistant.sqlite";
const DEFAULT_PORT: u16 = 8080;
const DEFAULT_USAGE_LOOKBACK_DAYS: u32 = 7;

#[derive(Debug, Clone)]
pub struct AssistantConfig {
    pub db_path: PathBuf,
    pub port: u16,
    pub pending_action_policy: PendingActionPolicy,
    /// Lookback window for app usage aggregation
    pub usage_lookback_days: u32,
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from(DEFAULT_DB_PATH),
            port: DEFAULT_PORT,
            pending_action_policy: PendingActionPolicy::ReplaceLast,
            usage_lookback_days: DEFAULT_USAGE_LOOKBACK_DAYS,
        }
    }
}

impl AssistantConfig {
    /// Read configuration from the process environment.
    ///
    /// Call `dotenv::dotenv()` first if a `.env` file should be honored.
    /// Unparseable values fall back to their defaults.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(path) = env::var("ASSISTANT_DB_PATH") {
            if !path.trim().is_empty() {
                config.db_path = PathBuf::from(path);
            }
        }

        if let Ok(raw) = env::var("PORT").or_else(|_| env::var("API_PORT")) {
            match raw.parse::<u16>() {
                Ok(port) => config.port = port,
                Err(_) => warn!(value = %raw, "Invalid PORT, using {}", DEFAULT_PORT),
            }
        }

        if let Ok(raw) = env::var("PENDING_ACTION_POLICY") {
            match PendingActionPolicy::parse(&raw) {
                Some(policy) => config.pending_action_policy = policy,
                None => warn!(value = %raw, "Unknown PENDING_ACTION_POLICY, using replace"),
            }
        }

        if let Ok(raw) = env::var("USAGE_LOOKBACK_DAYS") {
            match raw.parse::<u32>() {
                Ok(days) if days > 0 => config.usage_lookback_days = days,
                _ => warn!(
                    value = %raw,
                    "Invalid USAGE_LOOKBACK_DAYS, using {}", DEFAULT_USAGE_LOOKBACK_DAYS
                ),
            }
        }

        config
    }
}
