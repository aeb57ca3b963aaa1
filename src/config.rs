use std::env;
use std::fmt::Display;
use std::str::FromStr;
use std::time::Duration;

use anyhow::Context;
use reqwest::Url;
use tracing::debug;

pub struct Config {
    pub database_url: String,
    pub db_max_connections: u32,
    pub cf_api_base: String,
    pub cf_max_retries: u32,
    pub cf_timeout: Duration,
    pub cf_submission_count: u32,
    pub sweep_cron: String,
    pub notify_webhook_url: Option<Url>,
    pub notify_from: String,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        if let Ok(path) = dotenvy::dotenv() {
            debug!(path = %path.display(), "loaded .env");
        }

        let database_url = env::var("DATABASE_URL")
            .context("DATABASE_URL must be set to a production Postgres instance")?;
        let notify_webhook_url = match var("NOTIFY_WEBHOOK_URL") {
            Some(raw) => Some(
                Url::parse(&raw).with_context(|| format!("NOTIFY_WEBHOOK_URL is not a url: {raw}"))?,
            ),
            None => None,
        };

        Ok(Self {
            database_url,
            db_max_connections: load("DB_MAX_CONNECTIONS", 5)?,
            cf_api_base: var("CF_API_BASE")
                .unwrap_or_else(|| "https://codeforces.com/api/".to_string()),
            cf_max_retries: load("CF_MAX_RETRIES", 3)?,
            cf_timeout: Duration::from_secs(load("CF_TIMEOUT_SECS", 30)?),
            cf_submission_count: load("CF_SUBMISSION_COUNT", 10_000)?,
            sweep_cron: var("SWEEP_CRON").unwrap_or_else(|| "0 0 1 * * *".to_string()),
            notify_webhook_url,
            notify_from: var("NOTIFY_FROM")
                .unwrap_or_else(|| "noreply@cf-tracker.local".to_string()),
        })
    }
}

fn var(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn load<T>(key: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr + Display,
    T::Err: Display,
{
    match var(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|err| anyhow::anyhow!("invalid {key} value {raw:?}: {err}")),
        None => {
            debug!("{key} not set, using default: {default}");
            Ok(default)
        }
    }
}
