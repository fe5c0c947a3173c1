//! In-process DutyStore for local runs and tests.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use crate::models::{DutyRecord, ReactionEvent, ReactionTally, UpdateEntry};
use crate::Result;

use super::DutyStore;

#[derive(Default)]
struct Logs {
    duties: Vec<DutyRecord>,
    updates: Vec<UpdateEntry>,
    reactions: Vec<ReactionEvent>,
}

/// Keeps every log in memory; contents are lost when the process exits.
#[derive(Default)]
pub struct MemoryStore {
    logs: RwLock<Logs>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every update recorded so far, oldest first.
    pub async fn updates(&self) -> Vec<UpdateEntry> {
        self.logs.read().await.updates.clone()
    }

    /// Every duty record so far, oldest first.
    pub async fn duties(&self) -> Vec<DutyRecord> {
        self.logs.read().await.duties.clone()
    }

    /// Every reaction so far, oldest first.
    pub async fn reactions(&self) -> Vec<ReactionEvent> {
        self.logs.read().await.reactions.clone()
    }
}

#[async_trait]
impl DutyStore for MemoryStore {
    async fn insert_duty(&self, record: &DutyRecord) -> Result<()> {
        self.logs.write().await.duties.push(record.clone());
        Ok(())
    }

    async fn current_duty(&self) -> Result<Option<DutyRecord>> {
        Ok(self.logs.read().await.duties.last().cloned())
    }

    async fn insert_update(&self, entry: &UpdateEntry) -> Result<()> {
        self.logs.write().await.updates.push(entry.clone());
        Ok(())
    }

    async fn latest_update_since(&self, since: DateTime<Utc>) -> Result<Option<UpdateEntry>> {
        let logs = self.logs.read().await;
        Ok(logs
            .updates
            .iter()
            .filter(|u| u.created_at >= since)
            .max_by_key(|u| u.created_at)
            .cloned())
    }

    async fn insert_reaction(&self, event: &ReactionEvent) -> Result<()> {
        self.logs.write().await.reactions.push(event.clone());
        Ok(())
    }

    async fn reaction_tally(&self, user_id: i64) -> Result<ReactionTally> {
        let logs = self.logs.read().await;
        let mut tally = ReactionTally::default();
        for event in logs.reactions.iter().filter(|e| e.from_user_id == user_id) {
            if event.unlucky {
                tally.unlucky += 1;
            } else {
                tally.lucky += 1;
            }
        }
        Ok(tally)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::UserRef;
    use chrono::Duration;
    use uuid::Uuid;

    fn alice() -> UserRef {
        UserRef {
            id: 1,
            username: Some("alice".to_string()),
            first_name: "Alice".to_string(),
        }
    }

    fn entry(text: &str, created_at: DateTime<Utc>) -> UpdateEntry {
        UpdateEntry {
            id: Uuid::new_v4(),
            text: text.to_string(),
            person: alice(),
            created_at,
        }
    }

    #[tokio::test]
    async fn test_latest_duty_wins() {
        let store = MemoryStore::new();
        assert!(store.current_duty().await.unwrap().is_none());

        for first_name in ["Alice", "Bob"] {
            let record = DutyRecord {
                id: Uuid::new_v4(),
                person: UserRef {
                    first_name: first_name.to_string(),
                    ..alice()
                },
                created_at: Utc::now(),
            };
            store.insert_duty(&record).await.unwrap();
        }

        let current = store.current_duty().await.unwrap().unwrap();
        assert_eq!(current.person.first_name, "Bob");
        assert_eq!(store.duties().await.len(), 2);
    }

    #[tokio::test]
    async fn test_latest_update_since() {
        let store = MemoryStore::new();
        let now = Utc::now();
        store.insert_update(&entry("old", now - Duration::hours(30))).await.unwrap();
        store.insert_update(&entry("newer", now - Duration::minutes(5))).await.unwrap();
        store.insert_update(&entry("middle", now - Duration::hours(1))).await.unwrap();

        let latest = store
            .latest_update_since(now - Duration::hours(2))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(latest.text, "newer");

        let none = store.latest_update_since(now).await.unwrap();
        assert!(none.is_none());
    }
}
