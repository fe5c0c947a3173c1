//! Maps an inbound request to exactly one bot operation.

use chrono::{DateTime, Utc};
use serde_json::Value;
use shared::duty::contains_keyword;
use shared::telegram::Update;
use shared::{DutyBot, UpdateOutcome, UserRef, WebhookReply};
use std::collections::HashMap;
use tracing::{error, info, warn};

const NOTHING_HAPPENED: &str = "Nothing happened. Try ?send=1, ?roll=1, ?reminder=1, \
    ?leaderboard=1, ?speak=<text> or point the chat webhook at ?privateChat=1.";

/// The operation selected by the query string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// `?update=<text>`
    Update(String),
    /// `?send=1`: broadcast today's update, then roll a new holder
    Send,
    /// `?roll=1`
    Roll,
    /// `?reminder=1`
    Reminder,
    /// `?leaderboard=1`
    Leaderboard,
    /// `?privateChat=1` with a Telegram update as the body
    ChatWebhook,
    /// `?speak=<text>`
    Speak(String),
    Unknown,
}

fn flag(params: &HashMap<String, String>, name: &str) -> bool {
    matches!(params.get(name).map(String::as_str), Some("1") | Some("true"))
}

fn text_param(params: &HashMap<String, String>, name: &str) -> Option<String> {
    params
        .get(name)
        .filter(|value| !value.trim().is_empty())
        .cloned()
}

impl Command {
    /// Pick the command; when several flags are present the first match in
    /// declaration order wins.
    pub fn from_params(params: &HashMap<String, String>) -> Self {
        if let Some(text) = text_param(params, "update") {
            Command::Update(text)
        } else if flag(params, "send") {
            Command::Send
        } else if flag(params, "roll") {
            Command::Roll
        } else if flag(params, "reminder") {
            Command::Reminder
        } else if flag(params, "leaderboard") {
            Command::Leaderboard
        } else if flag(params, "privateChat") {
            Command::ChatWebhook
        } else if let Some(text) = text_param(params, "speak") {
            Command::Speak(text)
        } else {
            Command::Unknown
        }
    }
}

/// Check the `X-Telegram-Bot-Api-Secret-Token` header when a secret is configured.
pub fn secret_matches(expected: Option<&str>, provided: Option<&str>) -> bool {
    match expected {
        Some(expected) => provided == Some(expected),
        None => true,
    }
}

/// Run `command` and build the reply. Store failures become a 500 reply.
pub async fn route(bot: &DutyBot, command: Command, body: &[u8], now: DateTime<Utc>) -> WebhookReply {
    info!(command = ?command, "Routing webhook request");

    let result = match command {
        Command::Update(text) => handle_direct_update(bot, &text).await,
        Command::Send => handle_send(bot, now).await,
        Command::Roll => bot
            .select_new_person()
            .await
            .map(|person| WebhookReply::ok(format!("{} is on duty now", person.first_name))),
        Command::Reminder => bot
            .send_reminder(now)
            .await
            .map(|outcome| WebhookReply::ok(outcome.reply_text())),
        Command::Leaderboard => bot.send_leaderboard().await.map(WebhookReply::ok),
        Command::ChatWebhook => handle_chat(bot, body).await,
        Command::Speak(text) => bot
            .speak(&text)
            .await
            .map(|()| WebhookReply::ok("Message Successfully Sent!")),
        Command::Unknown => Ok(WebhookReply::ok(NOTHING_HAPPENED)),
    };

    result.unwrap_or_else(|e| {
        error!(error = %e, "Webhook request failed");
        WebhookReply::error(e.status_code(), format!("Request failed: {}", e))
    })
}

async fn handle_direct_update(bot: &DutyBot, text: &str) -> shared::Result<WebhookReply> {
    if !bot.config().allow_direct_updates {
        return Ok(WebhookReply::ok(
            "Direct updates are disabled, send your update to the bot in a private chat",
        ));
    }

    let outcome = bot.submit_direct_update(text).await?;
    if let UpdateOutcome::Recorded(_) = outcome {
        return Ok(WebhookReply::ok("Update submitted successfully"));
    }
    Ok(WebhookReply::ok(outcome.reply_text()))
}

async fn handle_send(bot: &DutyBot, now: DateTime<Utc>) -> shared::Result<WebhookReply> {
    bot.send_daily_broadcast(now).await?;
    let next = bot.select_new_person().await?;
    Ok(WebhookReply::ok(format!(
        "Message Successfully Sent! {} is on duty next",
        next.first_name
    )))
}

async fn handle_chat(bot: &DutyBot, body: &[u8]) -> shared::Result<WebhookReply> {
    let update: Update = match serde_json::from_slice(body) {
        Ok(update) => update,
        Err(e) => {
            // Acknowledge anyway so Telegram doesn't keep redelivering it.
            warn!(error = %e, "Unreadable chat payload");
            return Ok(WebhookReply::ok("Ignored unreadable chat payload"));
        }
    };

    let Some(message) = update.message else {
        return Ok(WebhookReply::ok("Nothing to do"));
    };
    let Some(from) = message.from.as_ref() else {
        return Ok(WebhookReply::ok("Nothing to do"));
    };
    let sender = UserRef::from(from);
    let text = message.text.as_deref().unwrap_or_default();

    if message.chat.is_private() {
        let outcome = bot.record_update(&sender, text).await?;
        bot.notify(message.chat.id, &outcome.reply_text()).await;
        return Ok(WebhookReply::ok(outcome.reply_text()));
    }

    let config = bot.config();
    if message.chat.id != config.group_chat_id {
        info!(chat_id = message.chat.id, "Ignoring message from an unconfigured chat");
        return Ok(WebhookReply::ok("Ignored message from another chat"));
    }

    if text.trim().is_empty() {
        return Ok(WebhookReply::ok("Nothing to do"));
    }

    if config
        .leaderboard_keywords
        .iter()
        .any(|keyword| contains_keyword(text, keyword))
    {
        return Ok(WebhookReply::ok(bot.send_leaderboard().await?));
    }

    if config
        .mention_keywords
        .iter()
        .any(|keyword| contains_keyword(text, keyword))
    {
        return Ok(WebhookReply::ok(bot.mention_everyone().await));
    }

    let Some(member) = config.roster_member(sender.id) else {
        info!(user_id = sender.id, "Sender is not on the roster, no reaction");
        return Ok(WebhookReply::ok("Sender is not on the roster"));
    };

    let originating = serde_json::from_slice::<Value>(body)
        .ok()
        .and_then(|payload| payload.get("message").cloned())
        .unwrap_or(Value::Null);

    match bot.react_to_message(member, originating).await? {
        Some(change) => Ok(WebhookReply::ok(format!(
            "{} is now {} ({})",
            member.first_name, change.title, change.score
        ))),
        None => Ok(WebhookReply::ok("No reaction this time")),
    }
}
