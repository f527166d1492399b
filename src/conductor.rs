//! Process-wide tick driver: owns the config model, the HAProxy process,
//! and one watcher/orchestrator pair per configured service.

use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::config::Config;
use crate::constants::{ADMIN_SOCKET_NAME, DEFAULT_PIDFILE};
use crate::haproxy::{AdminClient, ConfigModel, HaproxyProcess};
use crate::metrics::Metrics;
use crate::orchestrator::Orchestrator;
use crate::scheduler::SchedulerClient;
use crate::watcher::Watcher;

/// The three process-wide filesystem locations every component needs,
/// constructed once at startup and threaded through by reference instead of
/// living as global mutable state. `pidfile` is a fixed well-known path,
/// independent of `socket_dir` — only the admin socket lives there.
#[derive(Debug, Clone)]
pub struct Paths {
    pub socket_dir: PathBuf,
    pub haproxy_config: PathBuf,
    pub pidfile: PathBuf,
}

impl Paths {
    pub fn new(socket_dir: PathBuf, haproxy_config: PathBuf) -> Self {
        Paths {
            socket_dir,
            haproxy_config,
            pidfile: PathBuf::from(DEFAULT_PIDFILE),
        }
    }

    pub fn admin_socket(&self) -> PathBuf {
        self.socket_dir.join(ADMIN_SOCKET_NAME)
    }
}

pub struct Conductor {
    paths: Paths,
    model: ConfigModel,
    haproxy: HaproxyProcess,
    admin: AdminClient,
    scheduler: SchedulerClient,
    watchers: Vec<Watcher>,
    orchestrators: Vec<Orchestrator>,
    /// appnames to stop on shutdown, one per configured service.
    appnames: Vec<String>,
    pub metrics: Metrics,
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

impl Conductor {
    /// Load and validate `config_path`, build the initial config model,
    /// write it to `paths.haproxy_config`, and start (or reload-in-place)
    /// HAProxy.
    pub fn start(config_path: &Path, paths: Paths) -> anyhow::Result<Self> {
        let config = Config::from_file(config_path)?;
        Self::from_config(config, paths)
    }

    fn from_config(config: Config, paths: Paths) -> anyhow::Result<Self> {
        let model = config.build_model(&paths.socket_dir);
        model.write(&paths.haproxy_config)?;

        let haproxy = HaproxyProcess::new(paths.haproxy_config.clone(), paths.pidfile.clone());
        // A start/reload failure here is logged, not fatal: the controller
        // is resilient and will try again through the normal tick loop once
        // the watcher next marks the model dirty.
        if haproxy.is_running() {
            tracing::info!("haproxy already running on known pidfile, reloading in place");
            if let Err(err) = haproxy.reload() {
                tracing::warn!(%err, "failed to reload haproxy at startup");
            }
        } else {
            tracing::info!("starting haproxy");
            if let Err(err) = haproxy.start() {
                tracing::warn!(%err, "failed to start haproxy at startup");
            }
        }

        let admin = AdminClient::new(&paths.socket_dir);
        let scheduler = SchedulerClient::new();

        let mut watchers = Vec::new();
        let mut orchestrators = Vec::new();
        let mut appnames = Vec::new();

        for service in config.services.values() {
            appnames.push(service.scheduler.appname.clone());
            if let Some(orchestrator) = Orchestrator::new(service) {
                orchestrators.push(orchestrator);
            }
            watchers.push(Watcher::new(service.clone()));
        }

        Ok(Conductor {
            paths,
            model,
            haproxy,
            admin,
            scheduler,
            watchers,
            orchestrators,
            appnames,
            metrics: Metrics::new(),
        })
    }

    /// One iteration: reconcile membership, conditionally reload, then let
    /// every orchestrator react to the now-current view of HAProxy.
    pub fn tick(&mut self) -> anyhow::Result<()> {
        let started = std::time::Instant::now();
        let mut dirty = false;
        let mut reloaded = false;

        for watcher in &mut self.watchers {
            if watcher.tick(&self.scheduler, &mut self.model) {
                dirty = true;
            }
        }

        if dirty {
            // A write failure aborts this tick's reload entirely, leaving
            // the prior on-disk config (and running haproxy) untouched.
            match self.model.write(&self.paths.haproxy_config) {
                Ok(()) => {
                    if let Err(err) = self.haproxy.reload() {
                        tracing::warn!(%err, "failed to reload haproxy");
                    } else {
                        reloaded = true;
                    }
                }
                Err(err) => {
                    tracing::error!(%err, "failed to write haproxy config, skipping reload this tick");
                }
            }
        }

        let now = unix_now();
        for orchestrator in &mut self.orchestrators {
            orchestrator.tick(&self.admin, &self.scheduler, now, &self.metrics);
            let runtime = &orchestrator.runtime;
            self.metrics.set_service_gauges(
                orchestrator.name(),
                runtime.target,
                runtime.pending,
                runtime.healthy.as_ref().map(|h| h.len() as i64).unwrap_or(0),
            );
        }

        self.metrics.record_tick(started.elapsed(), dirty, reloaded);
        Ok(())
    }

    /// Stop HAProxy, then best-effort stop every configured service's
    /// scheduler app. Errors stopping one app do not block the rest.
    pub fn shutdown(&self) {
        if let Err(err) = self.haproxy.stop() {
            tracing::warn!(%err, "failed to stop haproxy during shutdown");
        }
        for appname in &self.appnames {
            if let Err(err) = self.scheduler.stop_app(appname) {
                tracing::warn!(%err, appname, "failed to stop scheduler app during shutdown");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
haproxy:
  global:
    - "maxconn 4096"
services:
  myapp:
    scheduler:
      appname: myapp.prod
      manifest: myapp.yml
      endpoint: http
    haproxy:
      listen: []
      port: 8080
      server: []
    elasticity:
      min_servers: 1
      max_servers: 4
      method: conn_rate
      steps: [100, 300]
"#;

    #[test]
    fn start_writes_config_and_constructs_one_orchestrator_per_elastic_service() {
        let dir = tempfile::tempdir().unwrap();
        let paths = Paths::new(dir.path().to_path_buf(), dir.path().join("haproxy.conf"));
        let config = Config::from_yaml(SAMPLE, Path::new("test.yaml")).unwrap();

        let conductor = Conductor::from_config(config, paths.clone()).unwrap();
        assert_eq!(conductor.orchestrators.len(), 1);
        assert_eq!(conductor.watchers.len(), 1);
        assert!(paths.haproxy_config.exists());
    }

    #[test]
    fn tick_runs_without_a_live_haproxy_or_scheduler() {
        let dir = tempfile::tempdir().unwrap();
        let paths = Paths::new(dir.path().to_path_buf(), dir.path().join("haproxy.conf"));
        let config = Config::from_yaml(SAMPLE, Path::new("test.yaml")).unwrap();
        let mut conductor = Conductor::from_config(config, paths).unwrap();

        // haproxy/treadmill binaries are absent in the test sandbox; every
        // I/O degrades to its documented failure mode rather than panicking.
        assert!(conductor.tick().is_ok());
    }
}
