//! Duty rotation: who owes the daily update, and recording it.

use chrono::{DateTime, Utc};
use rand::seq::SliceRandom;
use tracing::{info, warn};
use uuid::Uuid;

use crate::bot::DutyBot;
use crate::broadcast::start_of_utc_day;
use crate::config::PassPolicy;
use crate::models::{DutyRecord, UpdateEntry, UserRef};
use crate::{Error, Result};

/// What happened to a submitted update.
#[derive(Debug, Clone, PartialEq)]
pub enum UpdateOutcome {
    /// Saved and attributed to the duty holder
    Recorded(UpdateEntry),
    /// Submitter is not the duty holder; nothing written
    NotYourTurn { holder: UserRef },
    /// Pass keyword used; `next` is the newly rolled holder when the policy rotates
    Passed { next: Option<UserRef> },
    /// The holder already sent an update during this duty today; nothing written
    AlreadySubmitted(UpdateEntry),
    /// Nobody has been rolled yet
    NoDutyHolder,
    /// Blank text
    Empty,
}

impl UpdateOutcome {
    /// Reply for the person who submitted the update.
    pub fn reply_text(&self) -> String {
        match self {
            UpdateOutcome::Recorded(entry) => {
                format!("Thanks {}, your update is saved.", entry.person.first_name)
            }
            UpdateOutcome::NotYourTurn { holder } => {
                format!("Not your turn, it's {}'s.", holder.first_name)
            }
            UpdateOutcome::Passed { next: Some(next) } => {
                format!("Passed. {} is up now.", next.first_name)
            }
            UpdateOutcome::Passed { next: None } => "Passed. Nothing posted today.".to_string(),
            UpdateOutcome::AlreadySubmitted(entry) => format!(
                "You already sent today's update, {}. It stays as it is.",
                entry.person.first_name
            ),
            UpdateOutcome::NoDutyHolder => {
                "Nobody is on update duty yet, so there is nothing to record.".to_string()
            }
            UpdateOutcome::Empty => "Your update was empty, please send some text.".to_string(),
        }
    }
}

/// True when `keyword` appears in `text` as a whole word, ignoring case and punctuation.
///
/// Bot commands addressed as `/command@BotName` match `/command`.
pub fn contains_keyword(text: &str, keyword: &str) -> bool {
    text.split_whitespace().any(|word| {
        let word = word.trim_matches(|c: char| !c.is_alphanumeric() && c != '/' && c != '@');
        let word = match word.split_once('@') {
            Some((command, _bot)) if command.starts_with('/') => command,
            _ => word,
        };
        word.eq_ignore_ascii_case(keyword)
    })
}

impl DutyBot {
    /// Roll a new duty holder from the roster, persist it and announce it.
    pub async fn select_new_person(&self) -> Result<UserRef> {
        let person = {
            let mut rng = self.rng();
            self.config().roster.choose(&mut *rng).cloned()
        }
        .ok_or_else(|| Error::Config("Roster is empty".to_string()))?;

        let record = DutyRecord {
            id: Uuid::new_v4(),
            person: person.clone(),
            created_at: Utc::now(),
        };
        self.store().insert_duty(&record).await?;

        info!(user_id = person.id, name = %person.first_name, "Rolled new duty holder");

        let group_text = format!("{} is on update duty next!", person.mention());
        let private_text = format!(
            "Hi {}, you're up! Send me your daily update in this chat.",
            person.first_name
        );
        tokio::join!(
            self.notify_group(&group_text),
            self.notify(person.id, &private_text)
        );

        Ok(person)
    }

    /// The person who currently owes the update.
    pub async fn current_duty_holder(&self) -> Result<Option<UserRef>> {
        Ok(self.store().current_duty().await?.map(|record| record.person))
    }

    /// Record `text` from `submitter` if they hold the duty.
    ///
    /// At most one entry is written per duty per UTC day; later messages leave it untouched.
    pub async fn record_update(&self, submitter: &UserRef, text: &str) -> Result<UpdateOutcome> {
        let duty = match self.store().current_duty().await? {
            Some(duty) => duty,
            None => {
                warn!(user_id = submitter.id, "Update submitted but nobody is on duty");
                return Ok(UpdateOutcome::NoDutyHolder);
            }
        };
        let holder = duty.person;

        if submitter.id != holder.id {
            info!(
                user_id = submitter.id,
                holder_id = holder.id,
                "Rejected update from someone off duty"
            );
            return Ok(UpdateOutcome::NotYourTurn { holder });
        }

        let text = text.trim();
        if text.is_empty() {
            return Ok(UpdateOutcome::Empty);
        }

        let now = Utc::now();
        let since = start_of_utc_day(now).max(duty.created_at);
        if let Some(existing) = self.store().latest_update_since(since).await? {
            if existing.person.id == holder.id {
                info!(user_id = holder.id, "Update already submitted today");
                return Ok(UpdateOutcome::AlreadySubmitted(existing));
            }
        }

        if contains_keyword(text, &self.config().pass_keyword) {
            info!(user_id = holder.id, policy = ?self.config().pass_policy, "Duty holder passed");
            return match self.config().pass_policy {
                PassPolicy::Rotate => {
                    let next = self.select_new_person().await?;
                    Ok(UpdateOutcome::Passed { next: Some(next) })
                }
                PassPolicy::RecordEmpty => {
                    self.save_update(holder, String::new(), now).await?;
                    Ok(UpdateOutcome::Passed { next: None })
                }
            };
        }

        let entry = self.save_update(holder, text.to_string(), now).await?;
        Ok(UpdateOutcome::Recorded(entry))
    }

    /// Record `text` on behalf of whoever holds the duty (the `?update=` path).
    pub async fn submit_direct_update(&self, text: &str) -> Result<UpdateOutcome> {
        match self.current_duty_holder().await? {
            Some(holder) => self.record_update(&holder, text).await,
            None => {
                warn!("Direct update submitted but nobody is on duty");
                Ok(UpdateOutcome::NoDutyHolder)
            }
        }
    }

    async fn save_update(
        &self,
        person: UserRef,
        text: String,
        created_at: DateTime<Utc>,
    ) -> Result<UpdateEntry> {
        let entry = UpdateEntry {
            id: Uuid::new_v4(),
            text,
            person,
            created_at,
        };
        self.store().insert_update(&entry).await?;
        info!(user_id = entry.person.id, "Daily update recorded");
        Ok(entry)
    }
}
