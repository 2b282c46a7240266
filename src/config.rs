//! Runtime configuration parsed from environment variables.
//!
//! Recognized variables (all optional):
//! - `DASHBOARD_STORAGE_PATH`: JSON file backing the origin store; in-memory when unset
//! - `DASHBOARD_SYNC_INTERVAL_SECS`: divergence check period, default 30
//! - `DASHBOARD_STORAGE_QUOTA_BYTES`: origin quota, default 5 MiB
//! - `DASHBOARD_ROLES`: `user=role` pairs, see `access::RoleTable::parse`

use std::path::PathBuf;
use std::time::Duration;

use crate::access::{AccessError, RoleTable};
use crate::storage::DEFAULT_QUOTA_BYTES;

pub const DEFAULT_SYNC_INTERVAL_SECS: u64 = 30;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("DASHBOARD_SYNC_INTERVAL_SECS must be greater than zero")]
    ZeroInterval,
    #[error("invalid DASHBOARD_ROLES: {0}")]
    Roles(#[from] AccessError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DashboardConfig {
    pub storage_path: Option<PathBuf>,
    pub sync_interval: Duration,
    pub storage_quota_bytes: usize,
    pub roles: RoleTable,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            storage_path: None,
            sync_interval: Duration::from_secs(DEFAULT_SYNC_INTERVAL_SECS),
            storage_quota_bytes: DEFAULT_QUOTA_BYTES,
            roles: RoleTable::new(),
        }
    }
}

impl DashboardConfig {
    /// Build config from the process environment.
    ///
    /// # Errors
    ///
    /// See [`DashboardConfig::from_lookup`].
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build config from an arbitrary variable lookup.
    ///
    /// Unparseable numbers fall back to their defaults.
    ///
    /// # Errors
    ///
    /// Returns `ZeroInterval` for a zero check period and `Roles` for a
    /// malformed role table.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let storage_path = lookup("DASHBOARD_STORAGE_PATH")
            .map(|p| p.trim().to_owned())
            .filter(|p| !p.is_empty())
            .map(PathBuf::from);

        let interval_secs = parse_or(&lookup, "DASHBOARD_SYNC_INTERVAL_SECS", DEFAULT_SYNC_INTERVAL_SECS);
        if interval_secs == 0 {
            return Err(ConfigError::ZeroInterval);
        }

        let roles = match lookup("DASHBOARD_ROLES") {
            Some(spec) => RoleTable::parse(&spec)?,
            None => RoleTable::new(),
        };

        Ok(Self {
            storage_path,
            sync_interval: Duration::from_secs(interval_secs),
            storage_quota_bytes: parse_or(&lookup, "DASHBOARD_STORAGE_QUOTA_BYTES", DEFAULT_QUOTA_BYTES),
            roles,
        })
    }
}

fn parse_or<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> T
where
    T: std::str::FromStr + Copy,
{
    lookup(key)
        .and_then(|v| v.trim().parse::<T>().ok())
        .unwrap_or(default)
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
