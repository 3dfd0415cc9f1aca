//! Configuration types.

use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;

use crate::error::ConfigError;

/// Bot configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct BotConfig {
    /// Telegram Bot API token.
    pub bot_token: SecretString,
    /// Moderator allow-list, in configured order.
    pub moderators: Vec<i64>,
    /// Chat id of the public channel approved complaints are published to.
    pub public_channel: i64,
    /// Ledger database path.
    pub db_path: PathBuf,
    /// How long a moderator has to type a reject reason after confirming.
    pub reject_reason_timeout: Duration,
    /// Attempts made to publish an approved complaint before alerting.
    pub publish_attempts: u32,
    /// Delay between publish attempts (doubles after each failure).
    pub publish_backoff: Duration,
}

impl BotConfig {
    /// Build a config for the given token, moderators and channel with
    /// default tuning values.
    pub fn new(bot_token: SecretString, moderators: Vec<i64>, public_channel: i64) -> Self {
        Self {
            bot_token,
            moderators,
            public_channel,
            db_path: PathBuf::from("./data/patrol.db"),
            reject_reason_timeout: Duration::from_secs(600),
            publish_attempts: 3,
            publish_backoff: Duration::from_millis(2000),
        }
    }

    /// Load from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load using an arbitrary variable lookup (tests pass a map).
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let token = lookup("TELEGRAM_BOT_TOKEN")
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| ConfigError::MissingEnvVar("TELEGRAM_BOT_TOKEN".into()))?;

        let moderators_raw = lookup("PATROL_MODERATORS")
            .ok_or_else(|| ConfigError::MissingEnvVar("PATROL_MODERATORS".into()))?;
        let moderators = parse_id_list("PATROL_MODERATORS", &moderators_raw)?;
        if moderators.is_empty() {
            return Err(ConfigError::InvalidValue {
                key: "PATROL_MODERATORS".into(),
                message: "at least one moderator id is required".into(),
            });
        }

        let channel_raw = lookup("PATROL_CHANNEL_ID")
            .ok_or_else(|| ConfigError::MissingEnvVar("PATROL_CHANNEL_ID".into()))?;
        let public_channel = parse_id("PATROL_CHANNEL_ID", &channel_raw)?;

        let mut config = Self::new(SecretString::from(token), moderators, public_channel);

        if let Some(path) = lookup("PATROL_DB_PATH") {
            config.db_path = PathBuf::from(path);
        }
        if let Some(secs) = lookup("PATROL_REJECT_REASON_TIMEOUT_SECS") {
            config.reject_reason_timeout =
                Duration::from_secs(parse_number("PATROL_REJECT_REASON_TIMEOUT_SECS", &secs)?);
        }
        if let Some(attempts) = lookup("PATROL_PUBLISH_ATTEMPTS") {
            config.publish_attempts = parse_number("PATROL_PUBLISH_ATTEMPTS", &attempts)?.max(1) as u32;
        }
        if let Some(ms) = lookup("PATROL_PUBLISH_BACKOFF_MS") {
            config.publish_backoff =
                Duration::from_millis(parse_number("PATROL_PUBLISH_BACKOFF_MS", &ms)?);
        }

        Ok(config)
    }

    /// Whether `id` is on the moderator allow-list.
    pub fn is_moderator(&self, id: i64) -> bool {
        self.moderators.contains(&id)
    }
}

fn parse_id(key: &str, raw: &str) -> Result<i64, ConfigError> {
    raw.trim().parse().map_err(|_| ConfigError::InvalidValue {
        key: key.to_string(),
        message: format!("'{}' is not a numeric chat id", raw.trim()),
    })
}

fn parse_id_list(key: &str, raw: &str) -> Result<Vec<i64>, ConfigError> {
    let mut ids = Vec::new();
    for part in raw.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        let id = parse_id(key, part)?;
        if !ids.contains(&id) {
            ids.push(id);
        }
    }
    Ok(ids)
}

fn parse_number(key: &str, raw: &str) -> Result<u64, ConfigError> {
    raw.trim().parse().map_err(|_| ConfigError::InvalidValue {
        key: key.to_string(),
        message: format!("'{}' is not a non-negative integer", raw.trim()),
    })
}
