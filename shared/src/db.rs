//! Database connection management.
//!
//! The pool is created on first use and kept for the lifetime of the warm
//! Lambda container. If connecting fails the cell stays empty, so the next
//! invocation tries again.

use aws_sdk_secretsmanager::Client as SecretsClient;
use serde::Deserialize;
use sqlx::postgres::{PgConnectOptions, PgPool, PgPoolOptions};
use std::time::Duration;
use tokio::sync::OnceCell;
use tracing::info;

use crate::config::DatabaseSource;
use crate::{Error, Result};

/// Tables are append-only logs; `current_duty` holds a single row pointing at
/// the latest duty record and is written in the same transaction as the log.
const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS duty_log (
        id UUID PRIMARY KEY,
        person_id BIGINT NOT NULL,
        username TEXT,
        first_name TEXT NOT NULL,
        created_at TIMESTAMPTZ NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS current_duty (
        slot SMALLINT PRIMARY KEY CHECK (slot = 1),
        duty_id UUID NOT NULL REFERENCES duty_log (id)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS update_log (
        id UUID PRIMARY KEY,
        text TEXT NOT NULL,
        person_id BIGINT NOT NULL,
        username TEXT,
        first_name TEXT NOT NULL,
        created_at TIMESTAMPTZ NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS update_log_created_at_idx ON update_log (created_at DESC)",
    r#"
    CREATE TABLE IF NOT EXISTS reaction_log (
        id UUID PRIMARY KEY,
        originating_message JSONB NOT NULL,
        from_user_id BIGINT NOT NULL,
        unlucky BOOLEAN NOT NULL,
        created_at TIMESTAMPTZ NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS reaction_log_user_idx ON reaction_log (from_user_id)",
];

/// Database credentials stored in Secrets Manager.
#[derive(Debug, Deserialize)]
pub struct DatabaseCredentials {
    pub username: String,
    pub password: String,
    pub port: Option<u16>,
}

/// Lazily connected PostgreSQL pool.
pub struct Database {
    source: DatabaseSource,
    secrets: Option<SecretsClient>,
    pool: OnceCell<PgPool>,
}

impl Database {
    /// Create a handle; no connection is made until [`Database::pool`] is called.
    pub fn new(source: DatabaseSource, secrets: Option<SecretsClient>) -> Self {
        Self {
            source,
            secrets,
            pool: OnceCell::new(),
        }
    }

    /// Get the shared pool, connecting on first use.
    pub async fn pool(&self) -> Result<&PgPool> {
        if self.pool.initialized() {
            info!("Using cached database pool");
        }
        self.pool.get_or_try_init(|| self.connect()).await
    }

    async fn connect(&self) -> Result<PgPool> {
        info!("Creating new database pool");
        let options = self.connect_options().await?;

        let pool = PgPoolOptions::new()
            .max_connections(5)
            .acquire_timeout(Duration::from_secs(3))
            .connect_with(options)
            .await?;

        for statement in SCHEMA {
            sqlx::query(statement).execute(&pool).await?;
        }

        Ok(pool)
    }

    async fn connect_options(&self) -> Result<PgConnectOptions> {
        match &self.source {
            DatabaseSource::Url(url) => Ok(url.parse()?),
            DatabaseSource::Secret {
                host,
                name,
                secret_arn,
            } => {
                let client = self.secrets.as_ref().ok_or_else(|| {
                    Error::Config("Secrets Manager client required for DB_SECRET_ARN".to_string())
                })?;
                let creds = fetch_credentials(client, secret_arn).await?;
                Ok(secret_connect_options(host, name, &creds))
            }
        }
    }
}

/// Connection options from discrete settings, so credentials never pass through a URL.
fn secret_connect_options(host: &str, name: &str, creds: &DatabaseCredentials) -> PgConnectOptions {
    PgConnectOptions::new()
        .host(host)
        .port(creds.port.unwrap_or(5432))
        .username(&creds.username)
        .password(&creds.password)
        .database(name)
}

async fn fetch_credentials(client: &SecretsClient, secret_arn: &str) -> Result<DatabaseCredentials> {
    let response = client
        .get_secret_value()
        .secret_id(secret_arn)
        .send()
        .await
        .map_err(|e| Error::Aws(format!("Failed to get DB secret: {}", e)))?;

    let secret = response
        .secret_string()
        .ok_or_else(|| Error::Aws("Secret has no string value".to_string()))?;

    serde_json::from_str(secret)
        .map_err(|e| Error::Aws(format!("Failed to parse database credentials: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_credentials() {
        let json = r#"{"username":"bot","password":"hunter2","host":"db.internal","port":6543}"#;
        let creds: DatabaseCredentials = serde_json::from_str(json).unwrap();
        assert_eq!(creds.username, "bot");
        assert_eq!(creds.password, "hunter2");
        assert_eq!(creds.port, Some(6543));
    }

    #[tokio::test]
    async fn test_url_source_needs_no_secrets() {
        let db = Database::new(
            DatabaseSource::Url("postgres://bot@localhost:5433/daily_update".to_string()),
            None,
        );
        let options = db.connect_options().await.unwrap();
        assert_eq!(options.get_host(), "localhost");
        assert_eq!(options.get_port(), 5433);
        assert_eq!(options.get_username(), "bot");
        assert_eq!(options.get_database(), Some("daily_update"));
    }

    #[test]
    fn test_secret_options_keep_special_characters_out_of_host() {
        let creds = DatabaseCredentials {
            username: "bot".to_string(),
            password: "p@ss/w#rd:1".to_string(),
            port: None,
        };
        let options = secret_connect_options("db.internal", "daily_update", &creds);
        assert_eq!(options.get_host(), "db.internal");
        assert_eq!(options.get_port(), 5432);
        assert_eq!(options.get_username(), "bot");
        assert_eq!(options.get_database(), Some("daily_update"));
    }

    #[tokio::test]
    async fn test_secret_source_without_client() {
        let db = Database::new(
            DatabaseSource::Secret {
                host: "db.internal".to_string(),
                name: "daily_update".to_string(),
                secret_arn: "arn:aws:secretsmanager:us-east-1:1:secret:db".to_string(),
            },
            None,
        );
        assert!(matches!(db.connect_options().await, Err(Error::Config(_))));
    }
}
