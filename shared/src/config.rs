//! Configuration for the duty bot.
//!
//! Two layers: [`Config`] holds deployment settings read from the process
//! environment, [`DutyConfig`] holds the bot's roster, rank table and game
//! tuning, loaded once per process from JSON.

use serde::Deserialize;
use std::collections::HashSet;
use std::env;
use validator::Validate;

use crate::models::UserRef;
use crate::{Error, Result};

const DEFAULT_TELEGRAM_API_BASE: &str = "https://api.telegram.org";
const DEFAULT_DUTY_CONFIG_PATH: &str = "duty.json";

/// Which persistence backend to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Postgres,
    Memory,
}

/// Where database credentials come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DatabaseSource {
    /// A complete connection URL
    Url(String),
    /// Host and database name from the environment, credentials from Secrets Manager
    Secret {
        host: String,
        name: String,
        secret_arn: String,
    },
}

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Bot token for the Telegram Bot API
    pub telegram_bot_token: String,
    /// Telegram Bot API base URL
    pub telegram_api_base: String,
    /// Shared secret Telegram sends in `X-Telegram-Bot-Api-Secret-Token`
    pub webhook_secret: Option<String>,
    /// Persistence backend
    pub store: StoreBackend,
    /// Database connection source (unused by the memory backend)
    pub database: Option<DatabaseSource>,
    /// Inline bot configuration JSON
    pub duty_config_json: Option<String>,
    /// Path to the bot configuration file
    pub duty_config_path: String,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        let store = match env::var("DUTY_STORE").as_deref() {
            Ok("memory") => StoreBackend::Memory,
            Ok("postgres") | Err(_) => StoreBackend::Postgres,
            Ok(other) => {
                return Err(Error::Config(format!("Unknown DUTY_STORE: {}", other)));
            }
        };

        let database = match env::var("DATABASE_URL") {
            Ok(url) => Some(DatabaseSource::Url(url)),
            Err(_) => match (env::var("DB_HOST"), env::var("DB_SECRET_ARN")) {
                (Ok(host), Ok(secret_arn)) => Some(DatabaseSource::Secret {
                    host,
                    name: env::var("DB_NAME").unwrap_or_else(|_| "daily_update".to_string()),
                    secret_arn,
                }),
                _ => None,
            },
        };

        if store == StoreBackend::Postgres && database.is_none() {
            return Err(Error::Config(
                "DATABASE_URL or DB_HOST and DB_SECRET_ARN must be set".to_string(),
            ));
        }

        Ok(Self {
            telegram_bot_token: env::var("TELEGRAM_BOT_TOKEN")
                .map_err(|_| Error::Config("TELEGRAM_BOT_TOKEN not set".to_string()))?,
            telegram_api_base: env::var("TELEGRAM_API_BASE")
                .unwrap_or_else(|_| DEFAULT_TELEGRAM_API_BASE.to_string()),
            webhook_secret: env::var("TELEGRAM_WEBHOOK_SECRET").ok(),
            store,
            database,
            duty_config_json: env::var("DUTY_CONFIG").ok(),
            duty_config_path: env::var("DUTY_CONFIG_PATH")
                .unwrap_or_else(|_| DEFAULT_DUTY_CONFIG_PATH.to_string()),
        })
    }
}

/// What the pass keyword does when the duty holder sends it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PassPolicy {
    /// Skip recording and roll a new duty holder right away
    #[default]
    Rotate,
    /// Record an empty update and keep the current holder
    RecordEmpty,
}

/// How the leaderboard orders users with equal scores.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TieBreak {
    /// Keep the order users appear in the roster
    #[default]
    RosterOrder,
    /// Order by first name
    Alphabetical,
}

/// Roster, rank table and game tuning.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct DutyConfig {
    /// Everyone who can hold the duty, in display order
    #[validate(length(min = 1))]
    pub roster: Vec<UserRef>,
    /// Rank titles from lowest to highest score
    #[validate(length(min = 1))]
    pub rank_titles: Vec<String>,
    /// Group chat that receives announcements
    pub group_chat_id: i64,
    /// Extra private chats that receive the daily broadcast
    #[serde(default)]
    pub broadcast_recipients: Vec<i64>,
    /// On average one message in this many triggers a reaction
    #[serde(default = "default_lucky_event_every")]
    #[validate(range(min = 1))]
    pub lucky_event_every: u32,
    /// Probability that a triggered reaction is lucky
    #[serde(default = "default_lucky_factor")]
    #[validate(range(min = 0.0, max = 1.0))]
    pub lucky_factor: f64,
    #[serde(default = "default_pass_keyword")]
    #[validate(length(min = 1))]
    pub pass_keyword: String,
    #[serde(default)]
    pub pass_policy: PassPolicy,
    #[serde(default)]
    pub tie_break: TieBreak,
    #[serde(default = "default_leaderboard_keywords")]
    pub leaderboard_keywords: Vec<String>,
    #[serde(default = "default_mention_keywords")]
    pub mention_keywords: Vec<String>,
    /// Accept `?update=<text>` submissions attributed to the current holder
    #[serde(default)]
    pub allow_direct_updates: bool,
}

fn default_lucky_event_every() -> u32 {
    20
}

fn default_lucky_factor() -> f64 {
    0.5
}

fn default_pass_keyword() -> String {
    "pass".to_string()
}

fn default_leaderboard_keywords() -> Vec<String> {
    vec!["/ranks".to_string(), "leaderboard".to_string()]
}

fn default_mention_keywords() -> Vec<String> {
    vec!["@all".to_string(), "@everyone".to_string()]
}

impl DutyConfig {
    /// Parse and validate a JSON configuration document.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: DutyConfig = serde_json::from_str(json)
            .map_err(|e| Error::Config(format!("Invalid duty config: {}", e)))?;
        config.validated()
    }

    /// Load the bot configuration named by the environment.
    pub fn load(config: &Config) -> Result<Self> {
        match &config.duty_config_json {
            Some(json) => Self::from_json(json),
            None => {
                let json = std::fs::read_to_string(&config.duty_config_path).map_err(|e| {
                    Error::Config(format!(
                        "Failed to read {}: {}",
                        config.duty_config_path, e
                    ))
                })?;
                Self::from_json(&json)
            }
        }
    }

    fn validated(self) -> Result<Self> {
        self.validate()?;

        let mut seen = HashSet::new();
        if let Some(dup) = self.roster.iter().find(|u| !seen.insert(u.id)) {
            return Err(Error::Config(format!(
                "Duplicate roster id {} ({})",
                dup.id, dup.first_name
            )));
        }

        Ok(self)
    }

    /// Look up a roster member by chat user id.
    pub fn roster_member(&self, user_id: i64) -> Option<&UserRef> {
        self.roster.iter().find(|u| u.id == user_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_applied() {
        let json = r#"{
            "roster": [{"id": 1, "username": "alice", "first_name": "Alice"}],
            "rank_titles": ["Novice"],
            "group_chat_id": -100
        }"#;
        let config = DutyConfig::from_json(json).unwrap();
        assert_eq!(config.lucky_event_every, 20);
        assert_eq!(config.pass_keyword, "pass");
        assert_eq!(config.pass_policy, PassPolicy::Rotate);
        assert_eq!(config.tie_break, TieBreak::RosterOrder);
        assert!(!config.allow_direct_updates);
        assert_eq!(config.roster_member(1).unwrap().first_name, "Alice");
        assert!(config.roster_member(2).is_none());
    }

    #[test]
    fn test_policies_parse() {
        let json = r#"{
            "roster": [{"id": 1, "first_name": "Alice"}],
            "rank_titles": ["Novice"],
            "group_chat_id": -100,
            "pass_policy": "record_empty",
            "tie_break": "alphabetical"
        }"#;
        let config = DutyConfig::from_json(json).unwrap();
        assert_eq!(config.pass_policy, PassPolicy::RecordEmpty);
        assert_eq!(config.tie_break, TieBreak::Alphabetical);
    }

    #[test]
    fn test_empty_roster_rejected() {
        let json = r#"{"roster": [], "rank_titles": ["Novice"], "group_chat_id": -100}"#;
        assert!(matches!(DutyConfig::from_json(json), Err(Error::Config(_))));
    }

    #[test]
    fn test_lucky_factor_out_of_range() {
        let json = r#"{
            "roster": [{"id": 1, "first_name": "Alice"}],
            "rank_titles": ["Novice"],
            "group_chat_id": -100,
            "lucky_factor": 1.5
        }"#;
        assert!(DutyConfig::from_json(json).is_err());
    }

    #[test]
    fn test_duplicate_roster_ids() {
        let json = r#"{
            "roster": [{"id": 1, "first_name": "Alice"}, {"id": 1, "first_name": "Alicia"}],
            "rank_titles": ["Novice"],
            "group_chat_id": -100
        }"#;
        let err = DutyConfig::from_json(json).unwrap_err();
        assert!(err.to_string().contains("Duplicate roster id 1"));
    }
}
