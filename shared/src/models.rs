//! Shared data models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A roster member, identified by their chat platform user id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRef {
    pub id: i64,
    #[serde(default)]
    pub username: Option<String>,
    pub first_name: String,
}

impl UserRef {
    /// `@username` when the user has one, otherwise their first name.
    pub fn mention(&self) -> String {
        match &self.username {
            Some(username) => format!("@{}", username),
            None => self.first_name.clone(),
        }
    }
}

/// Who currently owes the daily update.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DutyRecord {
    pub id: Uuid,
    pub person: UserRef,
    pub created_at: DateTime<Utc>,
}

/// A submitted daily update.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UpdateEntry {
    pub id: Uuid,
    pub text: String,
    pub person: UserRef,
    pub created_at: DateTime<Utc>,
}

/// A lucky or unlucky reaction to a chat message.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReactionEvent {
    pub id: Uuid,
    /// Raw inbound message payload that triggered the event
    pub originating_message: serde_json::Value,
    pub from_user_id: i64,
    pub unlucky: bool,
    pub created_at: DateTime<Utc>,
}

/// Lucky/unlucky counts for one user.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReactionTally {
    pub lucky: i64,
    pub unlucky: i64,
}

impl ReactionTally {
    /// Net score: lucky minus unlucky.
    pub fn score(&self) -> i64 {
        self.lucky - self.unlucky
    }
}

/// Duty log row as stored in the database.
#[derive(Debug, sqlx::FromRow)]
pub(crate) struct DutyRow {
    pub id: Uuid,
    pub person_id: i64,
    pub username: Option<String>,
    pub first_name: String,
    pub created_at: DateTime<Utc>,
}

impl From<DutyRow> for DutyRecord {
    fn from(row: DutyRow) -> Self {
        Self {
            id: row.id,
            person: UserRef {
                id: row.person_id,
                username: row.username,
                first_name: row.first_name,
            },
            created_at: row.created_at,
        }
    }
}

/// Update log row as stored in the database.
#[derive(Debug, sqlx::FromRow)]
pub(crate) struct UpdateRow {
    pub id: Uuid,
    pub text: String,
    pub person_id: i64,
    pub username: Option<String>,
    pub first_name: String,
    pub created_at: DateTime<Utc>,
}

impl From<UpdateRow> for UpdateEntry {
    fn from(row: UpdateRow) -> Self {
        Self {
            id: row.id,
            text: row.text,
            person: UserRef {
                id: row.person_id,
                username: row.username,
                first_name: row.first_name,
            },
            created_at: row.created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mention_prefers_username() {
        let alice = UserRef {
            id: 1,
            username: Some("alice".to_string()),
            first_name: "Alice".to_string(),
        };
        let bob = UserRef {
            id: 2,
            username: None,
            first_name: "Bob".to_string(),
        };
        assert_eq!(alice.mention(), "@alice");
        assert_eq!(bob.mention(), "Bob");
    }

    #[test]
    fn test_negative_score() {
        let tally = ReactionTally { lucky: 1, unlucky: 4 };
        assert_eq!(tally.score(), -3);
    }
}
