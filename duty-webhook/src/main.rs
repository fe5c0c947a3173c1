//! Duty Webhook Lambda - Daily update duty bot.
//!
//! One HTTP-triggered function behind API Gateway. The query string picks the
//! operation: scheduled calls (`?send=1`, `?roll=1`, `?reminder=1`) come from
//! EventBridge, chat traffic arrives from Telegram on `?privateChat=1`.

mod router;

use aws_sdk_secretsmanager::Client as SecretsClient;
use chrono::Utc;
use lambda_http::{run, service_fn, Body, Error, Request, RequestExt, Response};
use shared::{
    reply_response, Config, DatabaseSource, Database, DutyBot, DutyConfig, DutyStore,
    MemoryStore, PgDutyStore, StoreBackend, TelegramClient, WebhookReply,
};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::router::{route, secret_matches, Command};

const SECRET_TOKEN_HEADER: &str = "x-telegram-bot-api-secret-token";

/// Application state, built once per container and reused while warm.
struct AppState {
    bot: DutyBot,
    webhook_secret: Option<String>,
}

impl AppState {
    async fn new() -> Result<Self, Error> {
        let config = Config::from_env()?;
        let duty_config = Arc::new(DutyConfig::load(&config)?);

        let store: Arc<dyn DutyStore> = match config.store {
            StoreBackend::Memory => {
                warn!("Using in-memory store, state is lost when the container stops");
                Arc::new(MemoryStore::new())
            }
            StoreBackend::Postgres => {
                let source = config
                    .database
                    .clone()
                    .ok_or("Database settings not configured")?;
                let secrets = match &source {
                    DatabaseSource::Secret { .. } => {
                        let aws_config =
                            aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
                        Some(SecretsClient::new(&aws_config))
                    }
                    DatabaseSource::Url(_) => None,
                };
                // Connects lazily on the first request that touches the store.
                Arc::new(PgDutyStore::new(Arc::new(Database::new(source, secrets))))
            }
        };

        let messenger = Arc::new(TelegramClient::new(
            reqwest::Client::new(),
            config.telegram_api_base.clone(),
            config.telegram_bot_token.clone(),
        ));

        info!(
            roster_size = duty_config.roster.len(),
            group_chat_id = duty_config.group_chat_id,
            "Duty bot configured"
        );

        Ok(Self {
            bot: DutyBot::new(store, messenger, duty_config),
            webhook_secret: config.webhook_secret,
        })
    }
}

async fn handler(state: Arc<AppState>, event: Request) -> Result<Response<Body>, Error> {
    let params: HashMap<String, String> = event
        .query_string_parameters_ref()
        .map(|query| {
            query
                .iter()
                .map(|(key, value)| (key.to_string(), value.to_string()))
                .collect()
        })
        .unwrap_or_default();

    let command = Command::from_params(&params);

    if command == Command::ChatWebhook {
        let provided = event
            .headers()
            .get(SECRET_TOKEN_HEADER)
            .and_then(|value| value.to_str().ok());
        if !secret_matches(state.webhook_secret.as_deref(), provided) {
            warn!("Rejected chat webhook with a bad secret token");
            return reply_response(&WebhookReply::error(401, "Invalid secret token"));
        }
    }

    let reply = route(&state.bot, command, event.body().as_ref(), Utc::now()).await;
    reply_response(&reply)
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .json()
        .init();

    let state = Arc::new(AppState::new().await?);

    run(service_fn(move |event| {
        let state = Arc::clone(&state);
        async move { handler(state, event).await }
    }))
    .await
}
