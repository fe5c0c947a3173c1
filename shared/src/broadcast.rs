//! Daily broadcast, reminders and plain relays to the group chat.

use chrono::{DateTime, Duration, Timelike, Utc};
use tracing::{info, warn};

use crate::bot::DutyBot;
use crate::models::{UpdateEntry, UserRef};
use crate::{Error, Result};

/// Result of a reminder run.
#[derive(Debug, Clone, PartialEq)]
pub enum ReminderOutcome {
    /// Today's update is already in
    AlreadySubmitted,
    /// The duty holder was pinged
    Reminded(UserRef),
    /// Nobody is on duty, so nobody to remind
    NobodyOnDuty,
}

impl ReminderOutcome {
    /// Human-readable summary for the HTTP reply.
    pub fn reply_text(&self) -> String {
        match self {
            ReminderOutcome::AlreadySubmitted => {
                "Today's update is already in, no reminder sent".to_string()
            }
            ReminderOutcome::Reminded(holder) => format!("Reminded {}", holder.first_name),
            ReminderOutcome::NobodyOnDuty => "Nobody is on duty, no reminder sent".to_string(),
        }
    }
}

/// Longest text Telegram accepts in a single message.
pub const MAX_MESSAGE_CHARS: usize = 4096;

/// Midnight UTC at the start of `now`'s day.
pub fn start_of_utc_day(now: DateTime<Utc>) -> DateTime<Utc> {
    now - Duration::seconds(i64::from(now.num_seconds_from_midnight()))
        - Duration::nanoseconds(i64::from(now.nanosecond()))
}

/// Group message quoting today's update, or announcing that it was missed.
pub fn daily_broadcast_text(today: Option<&UpdateEntry>, holder: Option<&UserRef>) -> String {
    match (today, holder) {
        (Some(entry), _) => format!("{}: {}", entry.person.first_name, entry.text),
        (None, Some(holder)) => format!(
            "Uh oh, {} decided not to post an update today :(",
            holder.first_name
        ),
        (None, None) => "No update today, nobody was on duty.".to_string(),
    }
}

impl DutyBot {
    /// Latest update created since midnight UTC of `now`'s day.
    pub async fn todays_update(&self, now: DateTime<Utc>) -> Result<Option<UpdateEntry>> {
        self.store()
            .latest_update_since(start_of_utc_day(now))
            .await
    }

    /// Send today's update (or the lack of one) to the group and every private recipient.
    pub async fn send_daily_broadcast(&self, now: DateTime<Utc>) -> Result<String> {
        let today = self.todays_update(now).await?;
        let holder = self.current_duty_holder().await?;
        let text = daily_broadcast_text(today.as_ref(), holder.as_ref());

        info!(has_update = today.is_some(), "Sending daily broadcast");
        self.notify_group(&text).await;
        for &chat_id in &self.config().broadcast_recipients {
            self.notify(chat_id, &text).await;
        }

        Ok(text)
    }

    /// Ping the duty holder privately unless today's update is already in.
    pub async fn send_reminder(&self, now: DateTime<Utc>) -> Result<ReminderOutcome> {
        if self.todays_update(now).await?.is_some() {
            info!("Update already submitted, skipping reminder");
            return Ok(ReminderOutcome::AlreadySubmitted);
        }

        let Some(holder) = self.current_duty_holder().await? else {
            warn!("Reminder requested but nobody is on duty");
            return Ok(ReminderOutcome::NobodyOnDuty);
        };

        let text = format!(
            "Hey {}, don't forget to send today's update!",
            holder.first_name
        );
        self.notify(holder.id, &text).await;
        info!(user_id = holder.id, "Reminder sent");

        Ok(ReminderOutcome::Reminded(holder))
    }

    /// Mention every roster member in the group.
    pub async fn mention_everyone(&self) -> String {
        let text = self
            .config()
            .roster
            .iter()
            .map(UserRef::mention)
            .collect::<Vec<_>>()
            .join(" ");
        self.notify_group(&text).await;
        text
    }

    /// Relay arbitrary text to the group.
    pub async fn speak(&self, text: &str) -> Result<()> {
        let chars = text.chars().count();
        if chars > MAX_MESSAGE_CHARS {
            return Err(Error::Validation(format!(
                "Message is {} characters, the limit is {}",
                chars, MAX_MESSAGE_CHARS
            )));
        }
        self.notify_group(text).await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bot::testing::{alice, harness, harness_offline, GROUP};
    use crate::models::DutyRecord;
    use crate::store::DutyStore;
    use chrono::TimeZone;
    use uuid::Uuid;

    fn at(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 10, h, m, 0).unwrap()
    }

    fn entry(text: &str, created_at: DateTime<Utc>) -> UpdateEntry {
        UpdateEntry {
            id: Uuid::new_v4(),
            text: text.to_string(),
            person: alice(),
            created_at,
        }
    }

    async fn seed_alice(store: &dyn DutyStore) {
        store
            .insert_duty(&DutyRecord {
                id: Uuid::new_v4(),
                person: alice(),
                created_at: at(0, 0),
            })
            .await
            .unwrap();
    }

    #[test]
    fn test_start_of_utc_day() {
        let now = Utc.with_ymd_and_hms(2024, 3, 10, 17, 45, 12).unwrap()
            + Duration::milliseconds(250);
        assert_eq!(start_of_utc_day(now), at(0, 0));
        assert_eq!(start_of_utc_day(at(0, 0)), at(0, 0));
    }

    #[tokio::test]
    async fn test_todays_update_respects_day_boundary() {
        let h = harness();
        h.store
            .insert_update(&entry("yesterday", at(0, 0) - Duration::minutes(1)))
            .await
            .unwrap();
        assert!(h.bot.todays_update(at(12, 0)).await.unwrap().is_none());

        h.store
            .insert_update(&entry("today", at(0, 1)))
            .await
            .unwrap();
        let today = h.bot.todays_update(at(12, 0)).await.unwrap().unwrap();
        assert_eq!(today.text, "today");
    }

    #[tokio::test]
    async fn test_broadcast_quotes_update() {
        let h = harness();
        seed_alice(&*h.store).await;
        h.store.insert_update(&entry("hello", at(9, 0))).await.unwrap();

        let text = h.bot.send_daily_broadcast(at(18, 0)).await.unwrap();
        assert_eq!(text, "Alice: hello");
        assert_eq!(h.messenger.sent_to(GROUP).await, vec!["Alice: hello"]);
        assert_eq!(h.messenger.sent_to(77).await, vec!["Alice: hello"]);
    }

    #[tokio::test]
    async fn test_broadcast_survives_send_failures() {
        let h = harness_offline();
        seed_alice(&*h.store).await;
        h.store.insert_update(&entry("hello", at(9, 0))).await.unwrap();

        let text = h.bot.send_daily_broadcast(at(18, 0)).await.unwrap();
        assert_eq!(text, "Alice: hello");
        assert!(h.messenger.sent.lock().await.is_empty());
    }

    #[tokio::test]
    async fn test_broadcast_announces_miss() {
        let h = harness();
        seed_alice(&*h.store).await;
        let text = h.bot.send_daily_broadcast(at(18, 0)).await.unwrap();
        assert_eq!(text, "Uh oh, Alice decided not to post an update today :(");
    }

    #[tokio::test]
    async fn test_reminder_skipped_when_submitted() {
        let h = harness();
        seed_alice(&*h.store).await;
        h.store.insert_update(&entry("done", at(8, 0))).await.unwrap();

        let outcome = h.bot.send_reminder(at(16, 0)).await.unwrap();
        assert_eq!(outcome, ReminderOutcome::AlreadySubmitted);
        assert!(h.messenger.sent.lock().await.is_empty());
    }

    #[tokio::test]
    async fn test_reminder_pings_holder() {
        let h = harness();
        seed_alice(&*h.store).await;

        let outcome = h.bot.send_reminder(at(16, 0)).await.unwrap();
        assert_eq!(outcome, ReminderOutcome::Reminded(alice()));
        assert_eq!(outcome.reply_text(), "Reminded Alice");
        assert_eq!(h.messenger.sent_to(alice().id).await.len(), 1);
    }

    #[tokio::test]
    async fn test_reminder_without_holder() {
        let h = harness();
        let outcome = h.bot.send_reminder(at(16, 0)).await.unwrap();
        assert_eq!(outcome, ReminderOutcome::NobodyOnDuty);
        assert_eq!(outcome.reply_text(), "Nobody is on duty, no reminder sent");
    }

    #[tokio::test]
    async fn test_mention_everyone() {
        let h = harness();
        assert_eq!(h.bot.mention_everyone().await, "@alice @bob");
        assert_eq!(h.messenger.sent_to(GROUP).await, vec!["@alice @bob"]);
    }

    #[tokio::test]
    async fn test_speak_rejects_oversized_text() {
        let h = harness();
        let long = "a".repeat(MAX_MESSAGE_CHARS + 1);
        let err = h.bot.speak(&long).await.unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
        assert_eq!(err.status_code(), 400);
        assert!(h.messenger.sent.lock().await.is_empty());

        h.bot.speak("ship it").await.unwrap();
        assert_eq!(h.messenger.sent_to(GROUP).await, vec!["ship it"]);
    }
}
