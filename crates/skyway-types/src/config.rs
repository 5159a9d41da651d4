//! configuration types for skyway.

use serde::{Deserialize, Serialize};

/// main configuration for the management controller.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// the controller's name, used to seed its database row.
    pub controller_name: String,

    /// when set, run outside a cluster against the named standalone
    /// namespace (in-memory cluster objects).
    pub standalone_namespace: Option<String>,

    /// database configuration.
    pub database: DatabaseConfig,

    /// state-sync tuning.
    pub sync: SyncConfig,

    /// backbone-link manager tuning.
    pub links: LinkConfig,

    /// certificate reconciler tuning.
    pub reconciler: ReconcilerConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            controller_name: default_controller_name(),
            standalone_namespace: std::env::var("SKX_STANDALONE_NAMESPACE").ok(),
            database: DatabaseConfig::default(),
            sync: SyncConfig::default(),
            links: LinkConfig::default(),
            reconciler: ReconcilerConfig::default(),
        }
    }
}

/// controller name from `SKX_CONTROLLER_NAME`, falling back to `HOSTNAME`.
fn default_controller_name() -> String {
    std::env::var("SKX_CONTROLLER_NAME")
        .or_else(|_| std::env::var("HOSTNAME"))
        .unwrap_or_else(|_| "skx-controller".to_string())
}

/// database configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// database type: "sqlite" or "postgres".
    pub db_type: String,

    /// database connection string or file path.
    pub connection_string: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            db_type: "sqlite".to_string(),
            connection_string: "/var/lib/skyway/db.sqlite".to_string(),
        }
    }
}

/// state-sync engine tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// base interval between outgoing heartbeats, in seconds.
    pub heartbeat_period_secs: u64,

    /// random spread added to each heartbeat interval, in seconds.
    pub heartbeat_window_secs: u64,

    /// interval between beacons while no peer has been heard, in seconds.
    pub beacon_interval_secs: u64,

    /// request/reply timeout for state pulls, in seconds.
    pub request_timeout_secs: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            heartbeat_period_secs: 10,
            heartbeat_window_secs: 5,
            beacon_interval_secs: 5,
            request_timeout_secs: 5,
        }
    }
}

/// backbone-link manager tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkConfig {
    /// interval between reconcile cycles, in seconds.
    pub reconcile_interval_secs: u64,

    /// interval after a failed cycle, in seconds.
    pub error_backoff_secs: u64,

    /// how long a claim assertion waits for member credentials, in seconds.
    pub claim_timeout_secs: u64,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            reconcile_interval_secs: 30,
            error_backoff_secs: 10,
            claim_timeout_secs: 30,
        }
    }
}

/// certificate reconciler tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconcilerConfig {
    /// sleep after an empty select, in seconds.
    pub idle_delay_secs: u64,

    /// sleep after a transaction error, in seconds.
    pub error_backoff_secs: u64,

    /// interval between pruning sweeps, in seconds.
    pub prune_interval_secs: u64,
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            idle_delay_secs: 2,
            error_backoff_secs: 10,
            prune_interval_secs: 60,
        }
    }
}
