//! services/api/src/config.rs
//!
//! Defines the application's configuration structure and loading logic.
//!
//! All configuration is loaded from environment variables at startup. The `.env`
//! file is used for local development.

use chrono_tz::Tz;
use std::net::SocketAddr;
use tracing::Level;

use firefly_core::Child;

/// Bounds on the upcoming-task lookahead window (days).
const LOOKAHEAD_DAYS_RANGE: std::ops::RangeInclusive<u32> = 1..=30;
/// Bounds on the polling interval (minutes).
const SCAN_INTERVAL_RANGE: std::ops::RangeInclusive<u64> = 15..=60;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing the environment variable {0}")]
    MissingVar(String),
    #[error("Invalid value for the environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    pub log_level: Level,
    /// Base URL of the school's Firefly installation.
    pub firefly_host: String,
    pub device_id: String,
    pub secret: String,
    pub app_id: String,
    pub user_guid: String,
    /// Children to track; falls back to the account holder when empty.
    pub children: Vec<Child>,
    pub task_lookahead_days: u32,
    pub scan_interval_minutes: u64,
    pub show_class_times: bool,
    pub timezone: Tz,
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// It will look for a `.env` file in the current directory for development,
    /// but this is skipped in test environments to ensure tests are hermetic.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Only load from .env in non-test mode to avoid contamination.
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }

        // --- Server Settings ---
        let bind_address_str =
            std::env::var("BIND_ADDRESS").unwrap_or_else(|_| "0.0.0.0:3000".to_string());
        let bind_address = bind_address_str
            .parse::<SocketAddr>()
            .map_err(|e| ConfigError::InvalidValue("BIND_ADDRESS".to_string(), e.to_string()))?;

        let log_level_str = std::env::var("RUST_LOG").unwrap_or_else(|_| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        // --- Firefly Credentials ---
        let firefly_host = require_var("FIREFLY_HOST")?;
        let device_id = require_var("FIREFLY_DEVICE_ID")?;
        let secret = require_var("FIREFLY_SECRET")?;
        let app_id =
            std::env::var("FIREFLY_APP_ID").unwrap_or_else(|_| "Firefly Cloud Hub".to_string());
        let user_guid = require_var("FIREFLY_USER_GUID")?;

        let children = parse_children(
            std::env::var("FIREFLY_CHILDREN").unwrap_or_default(),
            &user_guid,
        )?;

        // --- Polling and View Settings ---
        let task_lookahead_days =
            ranged_var("TASK_LOOKAHEAD_DAYS", 7, LOOKAHEAD_DAYS_RANGE)?;
        let scan_interval_minutes =
            ranged_var("SCAN_INTERVAL_MINUTES", 15, SCAN_INTERVAL_RANGE)?;

        let show_class_times = match std::env::var("SHOW_CLASS_TIMES") {
            Err(_) => false,
            Ok(raw) => raw.parse::<bool>().map_err(|_| {
                ConfigError::InvalidValue(
                    "SHOW_CLASS_TIMES".to_string(),
                    format!("'{}' is not a boolean", raw),
                )
            })?,
        };

        let timezone = match std::env::var("TIMEZONE") {
            Err(_) => chrono_tz::UTC,
            Ok(raw) => raw.parse::<Tz>().map_err(|_| {
                ConfigError::InvalidValue(
                    "TIMEZONE".to_string(),
                    format!("'{}' is not an IANA timezone name", raw),
                )
            })?,
        };

        Ok(Self {
            bind_address,
            log_level,
            firefly_host,
            device_id,
            secret,
            app_id,
            user_guid,
            children,
            task_lookahead_days,
            scan_interval_minutes,
            show_class_times,
            timezone,
        })
    }
}

fn require_var(name: &str) -> Result<String, ConfigError> {
    std::env::var(name).map_err(|_| ConfigError::MissingVar(name.to_string()))
}

/// Parse a numeric variable with a default, rejecting values outside `range`.
fn ranged_var<T>(
    name: &str,
    default: T,
    range: std::ops::RangeInclusive<T>,
) -> Result<T, ConfigError>
where
    T: std::str::FromStr + PartialOrd + std::fmt::Display + Copy,
{
    match std::env::var(name) {
        Err(_) => Ok(default),
        Ok(raw) => {
            let value = raw.parse::<T>().map_err(|_| {
                ConfigError::InvalidValue(name.to_string(), format!("'{}' is not a number", raw))
            })?;
            if range.contains(&value) {
                Ok(value)
            } else {
                Err(ConfigError::InvalidValue(
                    name.to_string(),
                    format!(
                        "{} is outside the allowed range {}-{}",
                        value,
                        range.start(),
                        range.end()
                    ),
                ))
            }
        }
    }
}

/// Parse `FIREFLY_CHILDREN` ("guid=name,guid=name").
///
/// An empty value means the account holder is tracked directly, which is the
/// behavior for student (non-parent) accounts.
fn parse_children(raw: String, user_guid: &str) -> Result<Vec<Child>, ConfigError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(vec![Child {
            guid: user_guid.to_string(),
            name: "Student".to_string(),
        }]);
    }

    raw.split(',')
        .map(|entry| {
            let entry = entry.trim();
            match entry.split_once('=') {
                Some((guid, name)) if !guid.trim().is_empty() && !name.trim().is_empty() => {
                    Ok(Child {
                        guid: guid.trim().to_string(),
                        name: name.trim().to_string(),
                    })
                }
                _ => Err(ConfigError::InvalidValue(
                    "FIREFLY_CHILDREN".to_string(),
                    format!("'{}' is not a guid=name pair", entry),
                )),
            }
        })
        .collect()
}
