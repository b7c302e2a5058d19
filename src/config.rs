//! Configuration Module
//!
//! Loads service configuration from environment variables and validates it
//! up front, so a bad setting stops the process at startup.

use std::env;
use std::time::Duration;

use crate::error::{ConfigError, WorkerError};
use crate::remote::RedisOptions;
use crate::worker::{WorkerIdOptions, DEFAULT_BIT_LENGTH, DEFAULT_PREFIX};

const DEFAULT_EXPIRATION: Duration = Duration::from_secs(3600);
const DEFAULT_CLEAN_INTERVAL: Duration = Duration::from_secs(300);

/// Service configuration parameters.
#[derive(Debug, Clone)]
pub struct Config {
    /// Default lifetime of local entries
    pub expiration: Duration,
    /// Local sweep interval
    pub clean_interval: Duration,
    /// Remote store connection
    pub redis: RedisOptions,
    /// Worker id claiming
    pub worker: WorkerIdOptions,
    /// HTTP server port
    pub server_port: u16,
}

impl Config {
    /// Loads and validates configuration from environment variables.
    ///
    /// # Environment Variables
    /// - `CACHE_EXPIRATION` - Local default TTL, e.g. `1h` (default: 1h; `0s` selects the default)
    /// - `CACHE_CLEAN_INTERVAL` - Sweep interval (default: 5m; `0s` selects the default)
    /// - `REDIS_ADDRS` - Comma-separated `host:port` list (required)
    /// - `REDIS_PASSWORD` - Remote password (default: none)
    /// - `REDIS_DB` - Remote database index (default: 0)
    /// - `WORKER_ID_PREFIX` - Lease key prefix (default: `kvcoord:worker`)
    /// - `WORKER_ID_BIT_LENGTH` - Id space width in bits (default: 6)
    /// - `WORKER_ID` - Fixed worker id, skips claiming (default: unset)
    /// - `SERVER_PORT` - HTTP server port (default: 3000)
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Same as [`Config::from_env`] with an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let expiration = match var("CACHE_EXPIRATION") {
            Some(raw) => parse_duration("CACHE_EXPIRATION", &raw)?,
            None => DEFAULT_EXPIRATION,
        };
        let clean_interval = match var("CACHE_CLEAN_INTERVAL") {
            Some(raw) => parse_duration("CACHE_CLEAN_INTERVAL", &raw)?,
            None => DEFAULT_CLEAN_INTERVAL,
        };

        let addrs: Vec<String> = var("REDIS_ADDRS")
            .map(|raw| {
                raw.split(',')
                    .map(str::trim)
                    .filter(|addr| !addr.is_empty())
                    .map(String::from)
                    .collect()
            })
            .unwrap_or_default();

        let config = Self {
            expiration: non_zero_or(expiration, DEFAULT_EXPIRATION),
            clean_interval: non_zero_or(clean_interval, DEFAULT_CLEAN_INTERVAL),
            redis: RedisOptions {
                addrs,
                password: var("REDIS_PASSWORD"),
                db: parse_number("REDIS_DB", var("REDIS_DB"), 0)?,
                ..RedisOptions::default()
            },
            worker: WorkerIdOptions {
                prefix: var("WORKER_ID_PREFIX").unwrap_or_else(|| DEFAULT_PREFIX.to_string()),
                bit_length: parse_number(
                    "WORKER_ID_BIT_LENGTH",
                    var("WORKER_ID_BIT_LENGTH"),
                    DEFAULT_BIT_LENGTH,
                )?,
                worker_id: var("WORKER_ID")
                    .map(|raw| parse_number("WORKER_ID", Some(raw), 0))
                    .transpose()?,
            },
            server_port: parse_number("SERVER_PORT", var("SERVER_PORT"), 3000)?,
        };

        config.validate()?;
        Ok(config)
    }

    /// Checks required fields and cross-field constraints.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.redis.addrs.is_empty() {
            return Err(ConfigError::Missing("REDIS_ADDRS"));
        }
        self.worker.validate().map_err(|e| {
            let name = match e {
                WorkerError::InvalidBitLength(_) => "WORKER_ID_BIT_LENGTH",
                _ => "WORKER_ID",
            };
            ConfigError::Invalid {
                name,
                reason: e.to_string(),
            }
        })
    }
}

fn non_zero_or(value: Duration, fallback: Duration) -> Duration {
    if value.is_zero() {
        fallback
    } else {
        value
    }
}

fn parse_duration(name: &'static str, raw: &str) -> Result<Duration, ConfigError> {
    // "0" is a valid "use the default" marker without a unit
    if raw == "0" {
        return Ok(Duration::ZERO);
    }
    humantime::parse_duration(raw).map_err(|e| ConfigError::Invalid {
        name,
        reason: e.to_string(),
    })
}

fn parse_number<T>(name: &'static str, raw: Option<String>, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match raw {
        Some(raw) => raw.parse().map_err(|e: T::Err| ConfigError::Invalid {
            name,
            reason: e.to_string(),
        }),
        None => Ok(default),
    }
}
