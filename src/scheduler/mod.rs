//! Thin wrapper over the `treadmill` scheduler CLI. Every operation is a
//! subprocess invocation; nothing here talks to the scheduler directly.

use std::collections::HashMap;
use std::process::Command;

use crate::constants::TREADMILL_BIN;
use crate::error::SchedulerError;

pub struct SchedulerClient;

impl SchedulerClient {
    pub fn new() -> Self {
        SchedulerClient
    }

    /// Start one new instance of `app`. Fire-and-forget: a non-zero exit is
    /// a transient failure, not fatal — the scheduler assigns the instance
    /// id asynchronously and it's observed later through `discover`.
    pub fn start(&self, app: &str, manifest: &str) -> Result<(), SchedulerError> {
        let command = format!("{TREADMILL_BIN} run --manifest {manifest} {app}");
        let status = Command::new(TREADMILL_BIN)
            .args(["run", "--manifest", manifest, app])
            .status()
            .map_err(|source| SchedulerError::Spawn {
                command: command.clone(),
                source,
            })?;

        if !status.success() {
            tracing::warn!(command = %command, code = ?status.code(), "scheduler start exited non-zero");
        }
        Ok(())
    }

    /// Stop one instance (`<app>#<instance>`).
    pub fn stop(&self, app: &str, instance: &str) -> Result<(), SchedulerError> {
        let full_name = format!("{app}#{instance}");
        let command = format!("{TREADMILL_BIN} stop --all {full_name}");
        let status = Command::new(TREADMILL_BIN)
            .args(["stop", "--all", &full_name])
            .status()
            .map_err(|source| SchedulerError::Spawn {
                command: command.clone(),
                source,
            })?;

        if !status.success() {
            tracing::warn!(command = %command, code = ?status.code(), "scheduler stop exited non-zero");
        }
        Ok(())
    }

    /// Discover running instances of `app`, keyed by instance id, each
    /// mapping endpoint name to `host:port`. Empty stdout and a non-zero
    /// exit are both treated as "nothing discovered" rather than an error —
    /// the scheduler is frequently between states.
    pub fn discover(&self, app: &str) -> HashMap<String, HashMap<String, String>> {
        let output = match Command::new(TREADMILL_BIN).args(["discovery", app]).output() {
            Ok(output) => output,
            Err(source) => {
                tracing::warn!(app, %source, "failed to spawn treadmill discovery");
                return HashMap::new();
            }
        };

        if !output.status.success() {
            tracing::warn!(app, code = ?output.status.code(), "treadmill discovery exited non-zero");
            return HashMap::new();
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        parse_discovery(&stdout)
    }

    /// Stop every instance of `app`, used only at shutdown.
    pub fn stop_app(&self, app: &str) -> Result<(), SchedulerError> {
        let command = format!("{TREADMILL_BIN} stop --all {app}#*");
        let status = Command::new(TREADMILL_BIN)
            .args(["stop", "--all", &format!("{app}#*")])
            .status()
            .map_err(|source| SchedulerError::Spawn {
                command: command.clone(),
                source,
            })?;

        if !status.success() {
            tracing::warn!(command = %command, code = ?status.code(), "scheduler stop_app exited non-zero");
        }
        Ok(())
    }
}

impl Default for SchedulerClient {
    fn default() -> Self {
        Self::new()
    }
}

/// Parse `treadmill discovery` output: one line per `<app>#<instance>:<endpoint> <host>:<port>`.
fn parse_discovery(stdout: &str) -> HashMap<String, HashMap<String, String>> {
    let mut result: HashMap<String, HashMap<String, String>> = HashMap::new();

    for line in stdout.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let Some((name_part, address)) = line.split_once(' ') else {
            continue;
        };
        let Some((full_name, endpoint)) = name_part.split_once(':') else {
            continue;
        };
        let Some((_app, instance)) = full_name.split_once('#') else {
            continue;
        };

        result
            .entry(instance.to_string())
            .or_default()
            .insert(endpoint.to_string(), address.to_string());
    }

    result
}
