use std::{env, fmt::Display, fs::read_to_string, str::FromStr, time::Duration};

use anyhow::{Context, Result, anyhow};
use tracing::{info, warn};

pub struct Config {
    pub port: u16,
    pub redis_url: Option<String>,
    pub jwt_secret: String,
    pub cors_origins: Vec<String>,
    pub smtp: Option<SmtpConfig>,
    pub email_to: Option<String>,
    pub line: Option<LineConfig>,
    pub notify: NotifyConfig,
    pub admin_password: Option<String>,
    pub admin_email: Option<String>,
}

pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub from: String,
}

pub struct LineConfig {
    pub access_token: String,
    pub group_id: String,
}

#[derive(Clone, Copy)]
pub struct NotifyConfig {
    pub workers: usize,
    pub queue: usize,
    pub timeout: Duration,
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            workers: 2,
            queue: 64,
            timeout: Duration::from_secs(10),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let jwt_secret = read_secret("JWT_SECRET").ok_or_else(|| anyhow!("JWT_SECRET is required"))?;

        Ok(Self {
            port: try_load("RUST_PORT", "8080")?,
            redis_url: optional("REDIS_URL"),
            jwt_secret,
            cors_origins: optional("CORS_ORIGINS")
                .map(|origins| {
                    origins
                        .split(',')
                        .map(|origin| origin.trim().to_string())
                        .filter(|origin| !origin.is_empty())
                        .collect()
                })
                .unwrap_or_default(),
            smtp: load_smtp()?,
            email_to: optional("EMAIL_TO"),
            line: load_line(),
            notify: NotifyConfig {
                workers: try_load("NOTIFY_WORKERS", "2")?,
                queue: try_load("NOTIFY_QUEUE", "64")?,
                timeout: Duration::from_secs(try_load("NOTIFY_TIMEOUT_SECS", "10")?),
            },
            admin_password: read_secret("ADMIN_PASSWORD"),
            admin_email: optional("ADMIN_EMAIL"),
        })
    }
}

fn load_smtp() -> Result<Option<SmtpConfig>> {
    let Some(host) = optional("SMTP_HOST") else {
        warn!("SMTP_HOST not set, email delivery disabled");
        return Ok(None);
    };

    Ok(Some(SmtpConfig {
        host,
        port: try_load("SMTP_PORT", "587")?,
        user: optional("SMTP_USER").unwrap_or_default(),
        password: read_secret("SMTP_PASSWORD").unwrap_or_default(),
        from: optional("EMAIL_FROM").context("EMAIL_FROM is required when SMTP_HOST is set")?,
    }))
}

fn load_line() -> Option<LineConfig> {
    match (read_secret("LINE_CHANNEL_ACCESS_TOKEN"), optional("LINE_GROUP_ID")) {
        (Some(access_token), Some(group_id)) => Some(LineConfig {
            access_token,
            group_id,
        }),
        _ => {
            warn!("LINE_CHANNEL_ACCESS_TOKEN or LINE_GROUP_ID not set, chat delivery disabled");
            None
        }
    }
}

fn var(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn optional(key: &str) -> Option<String> {
    let value = var(key);
    if value.is_none() {
        info!("{key} not set");
    }
    value
}

fn try_load<T: FromStr>(key: &str, default: &str) -> Result<T>
where
    T::Err: Display,
{
    var(key)
        .unwrap_or_else(|| {
            info!("{key} not set, using default: {default}");
            default.to_string()
        })
        .parse()
        .map_err(|e| anyhow!("Invalid {key} value: {e}"))
}

fn read_secret(secret_name: &str) -> Option<String> {
    let path = format!("/run/secrets/{secret_name}");

    match read_to_string(&path) {
        Ok(secret) => Some(secret.trim().to_string()),
        Err(_) => var(secret_name),
    }
}
