// Error types module

use std::path::PathBuf;
use thiserror::Error;

/// Declarative-input validation errors. Fatal at startup: the loop refuses
/// to run until the operator fixes the config.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse YAML in {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("service '{service}': {reason}")]
    Invalid { service: String, reason: String },
}

/// Errors from invoking the scheduler CLI. Always non-fatal: callers treat
/// these as "no change this tick" and let the next tick retry.
#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("failed to spawn '{command}': {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("'{command}' exited with status {status}")]
    NonZeroExit { command: String, status: i32 },
}

/// Errors talking to the HAProxy admin socket. Callers fall back to a zero
/// reading rather than propagating these.
#[derive(Debug, Error)]
pub enum AdminError {
    #[error("failed to connect to admin socket {path}: {source}")]
    Connect {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to read from admin socket: {source}")]
    Read {
        #[source]
        source: std::io::Error,
    },

    #[error("malformed admin socket response: {0}")]
    Malformed(String),

    #[error("no stats row found for backend '{0}'")]
    UnknownBackend(String),

    #[error("no column '{column}' in stats row for '{backend}'")]
    UnknownMetric { backend: String, column: String },
}

/// Errors managing the HAProxy subprocess. `is_running` failures and soft
/// stop/reload-with-no-process are logged, not propagated.
#[derive(Debug, Error)]
pub enum HaproxyError {
    #[error("failed to spawn haproxy: {source}")]
    Spawn {
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write pidfile {path}: {source}")]
    Pidfile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to signal haproxy pid {pid}: {source}")]
    Signal {
        pid: i32,
        #[source]
        source: std::io::Error,
    },
}

/// Config model write failures. The tick aborts without a reload; the prior
/// on-disk file remains live.
#[derive(Debug, Error)]
pub enum WriteError {
    #[error("failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
