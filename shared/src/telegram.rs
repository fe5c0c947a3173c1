//! Telegram Bot API: inbound webhook payloads and outbound messages.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::models::UserRef;
use crate::{Error, Result};

/// Inbound webhook update (only the fields the bot reads).
#[derive(Debug, Clone, Deserialize)]
pub struct Update {
    pub update_id: i64,
    pub message: Option<Message>,
}

/// A chat message.
#[derive(Debug, Clone, Deserialize)]
pub struct Message {
    pub message_id: i64,
    pub from: Option<TelegramUser>,
    pub chat: Chat,
    pub text: Option<String>,
}

/// Message sender.
#[derive(Debug, Clone, Deserialize)]
pub struct TelegramUser {
    pub id: i64,
    pub first_name: String,
    pub username: Option<String>,
}

impl From<&TelegramUser> for UserRef {
    fn from(user: &TelegramUser) -> Self {
        Self {
            id: user.id,
            username: user.username.clone(),
            first_name: user.first_name.clone(),
        }
    }
}

/// Chat a message was posted in.
#[derive(Debug, Clone, Deserialize)]
pub struct Chat {
    pub id: i64,
    #[serde(rename = "type")]
    pub chat_type: String,
}

impl Chat {
    pub fn is_private(&self) -> bool {
        self.chat_type == "private"
    }
}

/// `sendMessage` request body.
#[derive(Debug, Serialize)]
struct SendMessage<'a> {
    text: &'a str,
    chat_id: i64,
}

/// Something that can deliver a text message to a chat.
#[async_trait]
pub trait Messenger: Send + Sync {
    async fn send_message(&self, chat_id: i64, text: &str) -> Result<()>;
}

/// Telegram Bot API client.
pub struct TelegramClient {
    http_client: reqwest::Client,
    api_base: String,
    bot_token: String,
}

impl TelegramClient {
    pub fn new(http_client: reqwest::Client, api_base: String, bot_token: String) -> Self {
        Self {
            http_client,
            api_base,
            bot_token,
        }
    }

    fn send_message_url(&self) -> String {
        format!(
            "{}/bot{}/sendMessage",
            self.api_base.trim_end_matches('/'),
            self.bot_token
        )
    }
}

#[async_trait]
impl Messenger for TelegramClient {
    async fn send_message(&self, chat_id: i64, text: &str) -> Result<()> {
        let response = self
            .http_client
            .post(self.send_message_url())
            .json(&SendMessage { text, chat_id })
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Messaging(format!(
                "sendMessage failed: {} - {}",
                status, body
            )));
        }

        Ok(())
    }
}

/// Send a message, logging and swallowing any failure.
pub async fn notify(messenger: &dyn Messenger, chat_id: i64, text: &str) {
    match messenger.send_message(chat_id, text).await {
        Ok(()) => info!(chat_id, "Message sent"),
        Err(e) => error!(chat_id, error = %e, "Failed to send message"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_private_update() {
        let json = r#"{
            "update_id": 10,
            "message": {
                "message_id": 7,
                "date": 1700000000,
                "from": {"id": 42, "is_bot": false, "first_name": "Alice", "username": "alice"},
                "chat": {"id": 42, "type": "private", "first_name": "Alice"},
                "text": "shipped the thing"
            }
        }"#;
        let update: Update = serde_json::from_str(json).unwrap();
        let message = update.message.unwrap();
        assert!(message.chat.is_private());
        assert_eq!(message.text.as_deref(), Some("shipped the thing"));

        let user = UserRef::from(message.from.as_ref().unwrap());
        assert_eq!(user.id, 42);
        assert_eq!(user.username.as_deref(), Some("alice"));
    }

    #[test]
    fn test_parse_update_without_message() {
        let json = r#"{"update_id": 11, "edited_message": {"message_id": 1}}"#;
        let update: Update = serde_json::from_str(json).unwrap();
        assert!(update.message.is_none());
    }

    #[test]
    fn test_send_message_url() {
        let client = TelegramClient::new(
            reqwest::Client::new(),
            "https://api.telegram.org/".to_string(),
            "123:abc".to_string(),
        );
        assert_eq!(
            client.send_message_url(),
            "https://api.telegram.org/bot123:abc/sendMessage"
        );
    }

    #[test]
    fn test_send_message_body() {
        let body = serde_json::to_value(SendMessage {
            text: "hi",
            chat_id: -100,
        })
        .unwrap();
        assert_eq!(body, serde_json::json!({"text": "hi", "chat_id": -100}));
    }
}
