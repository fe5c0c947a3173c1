//! PostgreSQL implementation of DutyStore.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;

use crate::db::Database;
use crate::models::{DutyRecord, DutyRow, ReactionEvent, ReactionTally, UpdateEntry, UpdateRow};
use crate::Result;

use super::DutyStore;

/// PostgreSQL implementation of DutyStore.
#[derive(Clone)]
pub struct PgDutyStore {
    db: Arc<Database>,
}

impl PgDutyStore {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl DutyStore for PgDutyStore {
    async fn insert_duty(&self, record: &DutyRecord) -> Result<()> {
        let pool = self.db.pool().await?;
        let mut tx = pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO duty_log (id, person_id, username, first_name, created_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(record.id)
        .bind(record.person.id)
        .bind(&record.person.username)
        .bind(&record.person.first_name)
        .bind(record.created_at)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            INSERT INTO current_duty (slot, duty_id) VALUES (1, $1)
            ON CONFLICT (slot) DO UPDATE SET duty_id = EXCLUDED.duty_id
            "#,
        )
        .bind(record.id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn current_duty(&self) -> Result<Option<DutyRecord>> {
        let pool = self.db.pool().await?;
        let row: Option<DutyRow> = sqlx::query_as(
            r#"
            SELECT d.id, d.person_id, d.username, d.first_name, d.created_at
            FROM current_duty c
            JOIN duty_log d ON d.id = c.duty_id
            WHERE c.slot = 1
            "#,
        )
        .fetch_optional(pool)
        .await?;

        Ok(row.map(DutyRecord::from))
    }

    async fn insert_update(&self, entry: &UpdateEntry) -> Result<()> {
        let pool = self.db.pool().await?;
        sqlx::query(
            r#"
            INSERT INTO update_log (id, text, person_id, username, first_name, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(entry.id)
        .bind(&entry.text)
        .bind(entry.person.id)
        .bind(&entry.person.username)
        .bind(&entry.person.first_name)
        .bind(entry.created_at)
        .execute(pool)
        .await?;

        Ok(())
    }

    async fn latest_update_since(&self, since: DateTime<Utc>) -> Result<Option<UpdateEntry>> {
        let pool = self.db.pool().await?;
        let row: Option<UpdateRow> = sqlx::query_as(
            r#"
            SELECT id, text, person_id, username, first_name, created_at
            FROM update_log
            WHERE created_at >= $1
            ORDER BY created_at DESC
            LIMIT 1
            "#,
        )
        .bind(since)
        .fetch_optional(pool)
        .await?;

        Ok(row.map(UpdateEntry::from))
    }

    async fn insert_reaction(&self, event: &ReactionEvent) -> Result<()> {
        let pool = self.db.pool().await?;
        sqlx::query(
            r#"
            INSERT INTO reaction_log (id, originating_message, from_user_id, unlucky, created_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(event.id)
        .bind(&event.originating_message)
        .bind(event.from_user_id)
        .bind(event.unlucky)
        .bind(event.created_at)
        .execute(pool)
        .await?;

        Ok(())
    }

    async fn reaction_tally(&self, user_id: i64) -> Result<ReactionTally> {
        let pool = self.db.pool().await?;
        let (lucky, unlucky): (i64, i64) = sqlx::query_as(
            r#"
            SELECT
                COUNT(*) FILTER (WHERE NOT unlucky),
                COUNT(*) FILTER (WHERE unlucky)
            FROM reaction_log
            WHERE from_user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_one(pool)
        .await?;

        Ok(ReactionTally { lucky, unlucky })
    }
}
