//! Lucky/unlucky reputation: random reactions, scores, ranks and the leaderboard.

use chrono::Utc;
use rand::Rng;
use std::cmp::Reverse;
use tracing::info;
use uuid::Uuid;

use crate::bot::DutyBot;
use crate::config::TieBreak;
use crate::models::{ReactionEvent, UserRef};
use crate::Result;

/// Which way a reaction went.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Luck {
    Lucky,
    Unlucky,
}

/// A user's score after a reaction, with the matching title.
#[derive(Debug, Clone, PartialEq)]
pub struct RankChange {
    pub luck: Luck,
    pub score: i64,
    pub title: String,
}

/// One leaderboard line.
#[derive(Debug, Clone, PartialEq)]
pub struct LeaderboardEntry {
    pub user: UserRef,
    pub score: i64,
    pub title: String,
}

/// Title for `score`, clamping below zero to the first title and past the end
/// to the last one.
pub fn rank_title(titles: &[String], score: i64) -> &str {
    let Some(last) = titles.len().checked_sub(1) else {
        return "";
    };
    let index = score.clamp(0, last as i64) as usize;
    &titles[index]
}

/// Render `entries` as numbered `name :: title` lines.
pub fn render_leaderboard(entries: &[LeaderboardEntry]) -> String {
    entries
        .iter()
        .enumerate()
        .map(|(i, entry)| format!("{}. {} :: {}", i + 1, entry.user.first_name, entry.title))
        .collect::<Vec<_>>()
        .join("\n")
}

impl DutyBot {
    /// Decide whether this message triggers a reaction, and which kind.
    pub fn roll_luck(&self) -> Option<Luck> {
        let every = self.config().lucky_event_every.max(1);
        let lucky_factor = self.config().lucky_factor;
        let mut rng = self.rng();

        if !rng.gen_ratio(1, every) {
            return None;
        }
        if rng.gen_bool(lucky_factor) {
            Some(Luck::Lucky)
        } else {
            Some(Luck::Unlucky)
        }
    }

    /// Net score for a user.
    pub async fn score(&self, user_id: i64) -> Result<i64> {
        Ok(self.store().reaction_tally(user_id).await?.score())
    }

    /// Store a reaction for `user`, recompute their rank and announce it to the group.
    pub async fn record_reaction(
        &self,
        user: &UserRef,
        originating_message: serde_json::Value,
        luck: Luck,
    ) -> Result<RankChange> {
        let event = ReactionEvent {
            id: Uuid::new_v4(),
            originating_message,
            from_user_id: user.id,
            unlucky: luck == Luck::Unlucky,
            created_at: Utc::now(),
        };
        self.store().insert_reaction(&event).await?;

        let score = self.score(user.id).await?;
        let title = rank_title(&self.config().rank_titles, score).to_string();
        info!(user_id = user.id, score, title = %title, ?luck, "Reaction recorded");

        let announcement = match luck {
            Luck::Lucky => format!(
                "{} got lucky! Score {}, rank: {}",
                user.first_name, score, title
            ),
            Luck::Unlucky => format!(
                "{} got unlucky... Score {}, rank: {}",
                user.first_name, score, title
            ),
        };
        self.notify_group(&announcement).await;

        Ok(RankChange { luck, score, title })
    }

    /// Roll for a reaction to an inbound group message.
    pub async fn react_to_message(
        &self,
        user: &UserRef,
        originating_message: serde_json::Value,
    ) -> Result<Option<RankChange>> {
        match self.roll_luck() {
            Some(luck) => Ok(Some(
                self.record_reaction(user, originating_message, luck).await?,
            )),
            None => Ok(None),
        }
    }

    /// Score and title for every roster member, best first.
    pub async fn compute_leaderboard(&self) -> Result<Vec<LeaderboardEntry>> {
        let mut entries = Vec::with_capacity(self.config().roster.len());
        for user in &self.config().roster {
            let score = self.score(user.id).await?;
            entries.push(LeaderboardEntry {
                user: user.clone(),
                score,
                title: rank_title(&self.config().rank_titles, score).to_string(),
            });
        }

        // Stable sort, so equal scores keep roster order.
        match self.config().tie_break {
            TieBreak::RosterOrder => entries.sort_by_key(|e| Reverse(e.score)),
            TieBreak::Alphabetical => entries.sort_by(|a, b| {
                b.score
                    .cmp(&a.score)
                    .then_with(|| a.user.first_name.cmp(&b.user.first_name))
            }),
        }

        Ok(entries)
    }

    /// Compute the leaderboard and post it to the group.
    pub async fn send_leaderboard(&self) -> Result<String> {
        let text = render_leaderboard(&self.compute_leaderboard().await?);
        self.notify_group(&text).await;
        Ok(text)
    }
}
