use std::env;

use anyhow::{Context, Result};
use url::Url;

use crate::db::DEFAULT_MAX_POOL_SIZE;

pub const DEFAULT_MAIL_FROM: &str = "Job Board <no-reply@jobboard.local>";
pub const DEFAULT_RECOVERY_URL: &str = "http://localhost:5173/recover";

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub database_url: String,
    pub database_max_pool_size: u32,
    pub server_host: String,
    pub server_port: u16,
    pub cors_allowed_origin: Option<String>,
    pub smtp_host: Option<String>,
    pub smtp_port: u16,
    pub smtp_username: Option<String>,
    pub smtp_password: Option<String>,
    pub mail_from: String,
    pub recovery_url: Url,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        let database_url = env::var("DATABASE_URL").context("DATABASE_URL must be set")?;
        let database_max_pool_size = env::var("DATABASE_MAX_POOL_SIZE")
            .ok()
            .and_then(|value| value.parse().ok())
            .unwrap_or(DEFAULT_MAX_POOL_SIZE);
        let server_host = env::var("SERVER_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let server_port = env::var("SERVER_PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse()
            .context("SERVER_PORT must be a valid u16")?;
        let cors_allowed_origin = env::var("CORS_ALLOWED_ORIGIN").ok();
        let smtp_host = env::var("SMTP_HOST")
            .ok()
            .filter(|host| !host.trim().is_empty());
        let smtp_port = env::var("SMTP_PORT")
            .unwrap_or_else(|_| "25".to_string())
            .parse()
            .context("SMTP_PORT must be a valid u16")?;
        let smtp_username = env::var("SMTP_USERNAME").ok();
        let smtp_password = env::var("SMTP_PASSWORD").ok();
        let mail_from = env::var("MAIL_FROM").unwrap_or_else(|_| DEFAULT_MAIL_FROM.to_string());
        let recovery_url = env::var("RECOVERY_URL")
            .unwrap_or_else(|_| DEFAULT_RECOVERY_URL.to_string());
        let recovery_url = Url::parse(&recovery_url).context("RECOVERY_URL must be a valid URL")?;

        Ok(Self {
            database_url,
            database_max_pool_size,
            server_host,
            server_port,
            cors_allowed_origin,
            smtp_host,
            smtp_port,
            smtp_username,
            smtp_password,
            mail_from,
            recovery_url,
        })
    }

    /// Defaults for everything except the database, for tools and tests that
    /// build the configuration by hand.
    pub fn with_database_url(database_url: impl Into<String>) -> Result<Self> {
        Ok(Self {
            database_url: database_url.into(),
            database_max_pool_size: DEFAULT_MAX_POOL_SIZE,
            server_host: "127.0.0.1".to_string(),
            server_port: 0,
            cors_allowed_origin: None,
            smtp_host: None,
            smtp_port: 25,
            smtp_username: None,
            smtp_password: None,
            mail_from: DEFAULT_MAIL_FROM.to_string(),
            recovery_url: Url::parse(DEFAULT_RECOVERY_URL)?,
        })
    }

    pub fn redacted_database_url(&self) -> String {
        redact_database_url(&self.database_url)
    }
}

fn redact_database_url(raw: &str) -> String {
    match Url::parse(raw) {
        Ok(mut parsed) => {
            if parsed.password().is_some() {
                let _ = parsed.set_password(Some("*****"));
            }
            parsed.to_string()
        }
        Err(_) => "***".to_string(),
    }
}
