use std::env;
use std::time::Duration;

use crate::error::AppError;

pub const DEFAULT_TICK_SECS: u64 = 60;
pub const DEFAULT_WINDOW_SECS: u64 = 5 * 60;
pub const DEFAULT_SEND_TIMEOUT_SECS: u64 = 10;
/// Upper bound for every configured duration (one week).
pub const MAX_DURATION_SECS: u64 = 7 * 24 * 60 * 60;
pub const DEFAULT_ICON: &str = "/icon-192x192.png";
pub const DEFAULT_BADGE: &str = "/badge-72x72.png";

#[derive(Clone, Debug)]
pub struct PushGatewayConfig {
    pub url: String,
    pub token: Option<String>,
}

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub database_url: String,
    pub listen_addr: String,
    pub tick_period: Duration,
    pub look_ahead: Duration,
    pub send_timeout: Duration,
    pub push_gateway: Option<PushGatewayConfig>,
    pub icon: String,
    pub badge: String,
}

impl AppConfig {
    pub fn new_from_env() -> Result<Self, AppError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the config from an arbitrary key lookup so parsing can be
    /// exercised without mutating the process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, AppError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let database_url = lookup("DATABASE_URL")
            .unwrap_or_else(|| "sqlite://reminders.db?mode=rwc".to_string());
        let listen_addr = lookup("LISTEN_ADDR").unwrap_or_else(|| "127.0.0.1:5000".to_string());

        let tick_period = parse_secs(&lookup, "SCHEDULER_TICK_SECS", DEFAULT_TICK_SECS)?;
        let look_ahead = parse_secs(&lookup, "SCHEDULER_WINDOW_SECS", DEFAULT_WINDOW_SECS)?;
        let send_timeout = parse_secs(&lookup, "PUSH_SEND_TIMEOUT_SECS", DEFAULT_SEND_TIMEOUT_SECS)?;

        let push_gateway = lookup("PUSH_GATEWAY_URL")
            .filter(|url| !url.trim().is_empty())
            .map(|url| PushGatewayConfig {
                url,
                token: lookup("PUSH_GATEWAY_TOKEN").filter(|t| !t.is_empty()),
            });

        Ok(Self {
            database_url,
            listen_addr,
            tick_period,
            look_ahead,
            send_timeout,
            push_gateway,
            icon: lookup("PUSH_DEFAULT_ICON").unwrap_or_else(|| DEFAULT_ICON.to_string()),
            badge: lookup("PUSH_DEFAULT_BADGE").unwrap_or_else(|| DEFAULT_BADGE.to_string()),
        })
    }
}

fn parse_secs<F>(lookup: &F, key: &str, default: u64) -> Result<Duration, AppError>
where
    F: Fn(&str) -> Option<String>,
{
    let secs = match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse::<u64>()
            .map_err(|_| AppError::Config(format!("{} must be a whole number of seconds, got {:?}", key, raw)))?,
        None => default,
    };

    if secs == 0 {
        return Err(AppError::Config(format!("{} must be greater than zero", key)));
    }
    if secs > MAX_DURATION_SECS {
        return Err(AppError::Config(format!(
            "{} must be at most {} seconds, got {}",
            key, MAX_DURATION_SECS, secs
        )));
    }

    Ok(Duration::from_secs(secs))
}
