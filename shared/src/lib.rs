//! Shared library for the daily update duty bot.
//!
//! This crate holds the bot's domain logic (duty rotation, reputation, daily
//! broadcast), its persistence and the Telegram client. The Lambda binary in
//! `duty-webhook` only routes requests into it.

pub mod bot;
pub mod broadcast;
pub mod config;
pub mod db;
pub mod duty;
pub mod error;
pub mod http;
pub mod models;
pub mod reputation;
pub mod store;
pub mod telegram;

pub use bot::DutyBot;
pub use broadcast::ReminderOutcome;
pub use config::{Config, DatabaseSource, DutyConfig, PassPolicy, StoreBackend, TieBreak};
pub use db::Database;
pub use duty::UpdateOutcome;
pub use error::{Error, Result};
pub use http::{reply_response, WebhookReply};
pub use models::{DutyRecord, ReactionEvent, ReactionTally, UpdateEntry, UserRef};
pub use reputation::{LeaderboardEntry, Luck, RankChange};
pub use store::{DutyStore, MemoryStore, PgDutyStore};
pub use telegram::{Messenger, TelegramClient};
