//! Configuration for the chat server.
//!
//! Defaults can be overridden via environment variables:
//!
//! - `CHAT_BIND_ADDR`            (default: "127.0.0.1")
//! - `CHAT_PORT`                 (default: "8080")
//! - `CHAT_WORKERS`              (default: "8")
//! - `CHAT_HISTORY`              (default: "32")
//! - `CHAT_POLL_TIMEOUT_SECS`    (default: "15")
//! - `CHAT_REQUEST_TIMEOUT_SECS` (default: "10")
//!
//! and finally by the optional command line argument (`<port>` or
//! `<host>:<port>`).

use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::error::AppError;
use crate::pool::DEFAULT_WORKERS;
use crate::room::{RoomSettings, DEFAULT_HISTORY_CAPACITY, DEFAULT_POLL_TIMEOUT};

/// Default interface to bind
pub const DEFAULT_BIND_ADDR: &str = "127.0.0.1";

/// Default TCP port
pub const DEFAULT_PORT: u16 = 8080;

/// Default time allowed for a client to send its request
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Server configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// IP address / interface to bind to (e.g. "0.0.0.0" or "127.0.0.1").
    pub bind_addr: String,

    /// TCP port to listen on.
    pub port: u16,

    /// Number of worker tasks serving requests.
    pub workers: usize,

    /// Messages retained per room.
    pub history_capacity: usize,

    /// Longest time a pull waits for new messages.
    pub poll_timeout: Duration,

    /// Longest time a client may take to send its request head.
    pub request_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: DEFAULT_BIND_ADDR.to_string(),
            port: DEFAULT_PORT,
            workers: DEFAULT_WORKERS,
            history_capacity: DEFAULT_HISTORY_CAPACITY,
            poll_timeout: DEFAULT_POLL_TIMEOUT,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

impl Config {
    /// Construct a `Config` from environment variables, falling back
    /// to the defaults.
    pub fn from_env() -> Result<Self, AppError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Construct a `Config` from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, AppError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Config::default();
        let config = Config {
            bind_addr: lookup("CHAT_BIND_ADDR").unwrap_or(defaults.bind_addr),
            port: parse_or_default(&lookup, "CHAT_PORT", defaults.port)?,
            workers: parse_or_default(&lookup, "CHAT_WORKERS", defaults.workers)?,
            history_capacity: parse_or_default(&lookup, "CHAT_HISTORY", defaults.history_capacity)?,
            poll_timeout: Duration::from_secs(parse_or_default(
                &lookup,
                "CHAT_POLL_TIMEOUT_SECS",
                defaults.poll_timeout.as_secs(),
            )?),
            request_timeout: Duration::from_secs(parse_or_default(
                &lookup,
                "CHAT_REQUEST_TIMEOUT_SECS",
                defaults.request_timeout.as_secs(),
            )?),
        };
        config.validate()?;
        Ok(config)
    }

    /// Apply the command line address argument: either a bare port or
    /// `host:port`.
    pub fn apply_addr_arg(&mut self, arg: &str) -> Result<(), AppError> {
        let invalid = || AppError::Config {
            key: "address argument".to_string(),
            value: arg.to_string(),
        };

        match arg.rsplit_once(':') {
            Some((host, port)) => {
                if host.is_empty() {
                    return Err(invalid());
                }
                self.port = port.parse().map_err(|_| invalid())?;
                self.bind_addr = host.to_string();
            }
            None => {
                self.port = arg.parse().map_err(|_| invalid())?;
            }
        }
        Ok(())
    }

    /// Reject values the server cannot run with.
    pub fn validate(&self) -> Result<(), AppError> {
        if self.workers == 0 {
            return Err(AppError::Config {
                key: "CHAT_WORKERS".to_string(),
                value: "0".to_string(),
            });
        }
        if self.history_capacity == 0 {
            return Err(AppError::Config {
                key: "CHAT_HISTORY".to_string(),
                value: "0".to_string(),
            });
        }
        Ok(())
    }

    /// Convenience: `addr:port` socket string.
    pub fn socket_addr_string(&self) -> String {
        format!("{}:{}", self.bind_addr, self.port)
    }

    /// Settings shared by every room.
    pub fn room_settings(&self) -> RoomSettings {
        RoomSettings {
            history_capacity: self.history_capacity,
            poll_timeout: self.poll_timeout,
        }
    }
}

fn parse_or_default<F, T>(lookup: &F, key: &str, default: T) -> Result<T, AppError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(key) {
        Some(val) => val.trim().parse::<T>().map_err(|_| AppError::Config {
            key: key.to_string(),
            value: val,
        }),
        None => Ok(default),
    }
}
