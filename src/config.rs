use std::net::SocketAddr;
use std::{env, fmt::Display, str::FromStr};

use anyhow::{anyhow, bail, Context};
use chrono::Duration;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub bind_addr: SocketAddr,
    pub db_max_connections: u32,
    /// Lifetime of every issued class code, counted from issuance.
    pub code_window: Duration,
    pub session_ttl: Duration,
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        let database_url = env::var("DATABASE_URL").context("DATABASE_URL must be set")?;

        let window_minutes = bounded(
            "CODE_WINDOW_MINUTES",
            try_load("CODE_WINDOW_MINUTES", "30")?,
            MAX_CODE_WINDOW_MINUTES,
        )?;
        let ttl_hours = bounded(
            "SESSION_TTL_HOURS",
            try_load("SESSION_TTL_HOURS", "48")?,
            MAX_SESSION_TTL_HOURS,
        )?;

        Ok(Self {
            database_url,
            bind_addr: try_load("BIND_ADDR", "127.0.0.1:3000")?,
            db_max_connections: try_load("DB_MAX_CONNECTIONS", "5")?,
            code_window: Duration::minutes(window_minutes),
            session_ttl: Duration::hours(ttl_hours),
        })
    }
}

/// One day.
const MAX_CODE_WINDOW_MINUTES: i64 = 24 * 60;
/// One year.
const MAX_SESSION_TTL_HOURS: i64 = 24 * 366;

fn bounded(key: &str, value: i64, max: i64) -> anyhow::Result<i64> {
    if value <= 0 || value > max {
        bail!("{} must be between 1 and {}, got {}", key, max, value);
    }
    Ok(value)
}

fn try_load<T: FromStr>(key: &str, default: &str) -> anyhow::Result<T>
where
    T::Err: Display,
{
    let raw = env::var(key).unwrap_or_else(|_| {
        log::info!("{} not set, using default: {}", key, default);
        default.to_string()
    });
    raw.parse()
        .map_err(|e| anyhow!("Invalid {} value `{}`: {}", key, raw, e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_values_and_reports_bad_ones() {
        let port: u16 = try_load("ATTENDANCE_TEST_UNSET_PORT", "3000").unwrap();
        assert_eq!(port, 3000);

        let bad: anyhow::Result<u16> = try_load("ATTENDANCE_TEST_UNSET_PORT", "lots");
        let message = bad.unwrap_err().to_string();
        assert!(message.contains("ATTENDANCE_TEST_UNSET_PORT"));
    }

    #[test]
    fn durations_outside_bounds_fail_startup() {
        assert_eq!(bounded("CODE_WINDOW_MINUTES", 30, MAX_CODE_WINDOW_MINUTES).unwrap(), 30);
        for value in [0, -5, MAX_CODE_WINDOW_MINUTES + 1, i64::MAX] {
            assert!(bounded("CODE_WINDOW_MINUTES", value, MAX_CODE_WINDOW_MINUTES).is_err());
        }
        assert!(bounded("SESSION_TTL_HOURS", i64::MAX, MAX_SESSION_TTL_HOURS).is_err());
    }
}
