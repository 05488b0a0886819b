//! Runtime configuration for the sync layer.
//!
//! Defaults suit an interactive editor. [`SyncConfig::from_env`] overrides
//! them from `PATCHWIRE_*` environment variables.

use std::time::Duration;

use patchwire_core::NodeLayout;

use crate::error::SyncError;

/// Milliseconds to wait for a sub-graph snapshot; `0` waits forever.
pub const FETCH_TIMEOUT_VAR: &str = "PATCHWIRE_FETCH_TIMEOUT_MS";
/// Milliseconds between dirty-set flushes.
pub const FLUSH_INTERVAL_VAR: &str = "PATCHWIRE_FLUSH_INTERVAL_MS";

const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(10);
const DEFAULT_FLUSH_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SyncConfig {
    /// How long `get_graph` waits for a snapshot. `None` disables the limit.
    pub fetch_timeout: Option<Duration>,
    /// Period of the background flush loop.
    pub flush_interval: Duration,
    /// Geometry used for socket positions.
    pub layout: NodeLayout,
}

impl Default for SyncConfig {
    fn default() -> Self {
        SyncConfig {
            fetch_timeout: Some(DEFAULT_FETCH_TIMEOUT),
            flush_interval: DEFAULT_FLUSH_INTERVAL,
            layout: NodeLayout::default(),
        }
    }
}

impl SyncConfig {
    /// Reads overrides from the process environment.
    pub fn from_env() -> Result<Self, SyncError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads overrides through `lookup`; unset keys keep their defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, SyncError> {
        let mut config = SyncConfig::default();

        if let Some(ms) = parse_millis(&lookup, FETCH_TIMEOUT_VAR)? {
            config.fetch_timeout = (ms > 0).then(|| Duration::from_millis(ms));
        }
        if let Some(ms) = parse_millis(&lookup, FLUSH_INTERVAL_VAR)? {
            if ms == 0 {
                return Err(SyncError::InvalidConfig {
                    key: FLUSH_INTERVAL_VAR.to_string(),
                    value: "0".to_string(),
                });
            }
            config.flush_interval = Duration::from_millis(ms);
        }

        Ok(config)
    }
}

fn parse_millis(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Result<Option<u64>, SyncError> {
    let Some(raw) = lookup(key) else {
        return Ok(None);
    };
    let parsed = raw.trim().parse::<u64>();
    parsed.map(Some).map_err(|_| SyncError::InvalidConfig {
        key: key.to_string(),
        value: raw,
    })
}
