//! HAProxy subprocess lifecycle: start, graceful reload, soft stop — driven
//! entirely through the pidfile HAProxy itself writes with `-p`.

use std::path::PathBuf;
use std::process::Command;

use crate::constants::HAPROXY_BIN;
use crate::error::HaproxyError;

pub struct HaproxyProcess {
    config_path: PathBuf,
    pidfile: PathBuf,
}

impl HaproxyProcess {
    pub fn new(config_path: PathBuf, pidfile: PathBuf) -> Self {
        HaproxyProcess { config_path, pidfile }
    }

    fn read_pid(&self) -> Option<i32> {
        let contents = std::fs::read_to_string(&self.pidfile).ok()?;
        contents.trim().parse().ok()
    }

    /// Whether the pidfile names a pid that is actually alive. A missing or
    /// unparsable pidfile means not running.
    pub fn is_running(&self) -> bool {
        match self.read_pid() {
            Some(pid) => unsafe { libc::kill(pid, 0) == 0 },
            None => false,
        }
    }

    /// Start a fresh HAProxy process.
    pub fn start(&self) -> Result<(), HaproxyError> {
        Command::new(HAPROXY_BIN)
            .args(["-f", &self.config_path.to_string_lossy()])
            .args(["-p", &self.pidfile.to_string_lossy()])
            .arg("-D")
            .status()
            .map_err(|source| HaproxyError::Spawn { source })?;
        Ok(())
    }

    /// Graceful reload: the new worker inherits listening sockets from the
    /// pid named in the current pidfile, which drains and exits on its own.
    /// With no process currently running, this behaves like `start`.
    pub fn reload(&self) -> Result<(), HaproxyError> {
        let Some(old_pid) = self.read_pid() else {
            tracing::warn!("no pidfile found, starting fresh instead of reloading");
            return self.start();
        };

        Command::new(HAPROXY_BIN)
            .args(["-f", &self.config_path.to_string_lossy()])
            .args(["-p", &self.pidfile.to_string_lossy()])
            .arg("-D")
            .args(["-sf", &old_pid.to_string()])
            .status()
            .map_err(|source| HaproxyError::Spawn { source })?;
        Ok(())
    }

    /// Soft stop via `SIGUSR1`. A missing pidfile is treated as already
    /// stopped, not an error.
    pub fn stop(&self) -> Result<(), HaproxyError> {
        let Some(pid) = self.read_pid() else {
            tracing::warn!("no pidfile found, haproxy already stopped");
            return Ok(());
        };

        let rc = unsafe { libc::kill(pid, libc::SIGUSR1) };
        if rc != 0 {
            return Err(HaproxyError::Signal {
                pid,
                source: std::io::Error::last_os_error(),
            });
        }
        Ok(())
    }
}
