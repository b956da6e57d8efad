//! Server configuration, read once at startup from the environment.

use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use crate::errors::ConfigError;

pub const ADDR_VAR: &str = "DUEL_CHESS_ADDR";
pub const CLOCK_TICK_VAR: &str = "DUEL_CHESS_CLOCK_TICK_MS";
pub const BROADCAST_TICK_VAR: &str = "DUEL_CHESS_BROADCAST_TICK_MS";
pub const LEADERBOARD_SIZE_VAR: &str = "DUEL_CHESS_LEADERBOARD_SIZE";
pub const STARTING_RATING_VAR: &str = "DUEL_CHESS_STARTING_RATING";
pub const K_FACTOR_VAR: &str = "DUEL_CHESS_K_FACTOR";

#[derive(Debug, Clone, PartialEq)]
pub struct ServerConfig {
    /// WebSocket listen address. Default: 0.0.0.0:3000.
    pub addr: SocketAddr,
    /// How often each active match checks its clock for a fallen flag. Default: 50ms.
    pub clock_tick: Duration,
    /// How often `timer_update` is pushed to both players. Default: 1s.
    pub broadcast_tick: Duration,
    /// Rows in `leaderboard_update`. Default: 10.
    pub leaderboard_size: usize,
    /// Rating given to identities seen for the first time. Default: 600.
    pub starting_rating: i32,
    /// Elo K-factor. Default: 32.
    pub k_factor: u32,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: SocketAddr::from(([0, 0, 0, 0], 3000)),
            clock_tick: Duration::from_millis(50),
            broadcast_tick: Duration::from_millis(1000),
            leaderboard_size: 10,
            starting_rating: 600,
            k_factor: 32,
        }
    }
}

impl ServerConfig {
    /// Build the configuration from process environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Build the configuration from an arbitrary variable source. Unset
    /// variables keep their defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let config = Self {
            addr: parse_var(&lookup, ADDR_VAR)?.unwrap_or(defaults.addr),
            clock_tick: parse_var(&lookup, CLOCK_TICK_VAR)?
                .map(Duration::from_millis)
                .unwrap_or(defaults.clock_tick),
            broadcast_tick: parse_var(&lookup, BROADCAST_TICK_VAR)?
                .map(Duration::from_millis)
                .unwrap_or(defaults.broadcast_tick),
            leaderboard_size: parse_var(&lookup, LEADERBOARD_SIZE_VAR)?
                .unwrap_or(defaults.leaderboard_size),
            starting_rating: parse_var(&lookup, STARTING_RATING_VAR)?
                .unwrap_or(defaults.starting_rating),
            k_factor: parse_var(&lookup, K_FACTOR_VAR)?.unwrap_or(defaults.k_factor),
        };
        config.validate()?;
        Ok(config)
    }

    /// Reject values that would stall the sync loops.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.clock_tick.is_zero() {
            return Err(invalid(CLOCK_TICK_VAR, "0", "must be at least 1"));
        }
        if self.broadcast_tick.is_zero() {
            return Err(invalid(BROADCAST_TICK_VAR, "0", "must be at least 1"));
        }
        if self.leaderboard_size == 0 {
            return Err(invalid(LEADERBOARD_SIZE_VAR, "0", "must be at least 1"));
        }
        Ok(())
    }
}

fn parse_var<T>(lookup: &impl Fn(&str) -> Option<String>, var: &'static str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let Some(raw) = lookup(var) else {
        return Ok(None);
    };
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    trimmed
        .parse()
        .map(Some)
        .map_err(|err: T::Err| invalid(var, trimmed, &err.to_string()))
}

fn invalid(var: &'static str, value: &str, reason: &str) -> ConfigError {
    ConfigError::Invalid {
        var,
        value: value.to_owned(),
        reason: reason.to_owned(),
    }
}
