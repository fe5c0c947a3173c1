//! Persistence for duty records, updates and reactions.

mod memory;
mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgDutyStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::models::{DutyRecord, ReactionEvent, ReactionTally, UpdateEntry};
use crate::Result;

/// Append-only store behind every webhook operation.
#[async_trait]
pub trait DutyStore: Send + Sync {
    /// Append a duty record and make it the current one.
    async fn insert_duty(&self, record: &DutyRecord) -> Result<()>;

    /// The current duty record, if anyone has been rolled yet.
    async fn current_duty(&self) -> Result<Option<DutyRecord>>;

    async fn insert_update(&self, entry: &UpdateEntry) -> Result<()>;

    /// Most recent update created at or after `since`.
    async fn latest_update_since(&self, since: DateTime<Utc>) -> Result<Option<UpdateEntry>>;

    async fn insert_reaction(&self, event: &ReactionEvent) -> Result<()>;

    /// Lucky and unlucky counts for a user.
    async fn reaction_tally(&self, user_id: i64) -> Result<ReactionTally>;
}
