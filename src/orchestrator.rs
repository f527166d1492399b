//! Elasticity engine: reads HAProxy demand metrics, decides a target replica
//! count, and drives the scheduler toward it.

use std::collections::{HashSet, VecDeque};

use crate::config::elasticity::{ElasticityConfig, ScalingPolicy};
use crate::config::service::ServiceConfig;
use crate::constants::{HISTORY_CAPACITY, HOLD_CONNS_ADMIT_MAXCONN, HOLD_CONNS_HOLD_MAXCONN};
use crate::haproxy::AdminClient;
use crate::metrics::Metrics;
use crate::scheduler::SchedulerClient;

/// Fixed-capacity FIFO of recent measurements; oldest is dropped once full.
#[derive(Debug, Clone, Default)]
pub struct BoundedHistory {
    samples: VecDeque<f64>,
    capacity: usize,
}

impl BoundedHistory {
    pub fn new(capacity: usize) -> Self {
        BoundedHistory {
            samples: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push(&mut self, value: f64) {
        if self.samples.len() >= self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(value);
    }

    pub fn max(&self) -> Option<f64> {
        self.samples.iter().copied().fold(None, |acc, v| match acc {
            Some(m) if m >= v => Some(m),
            _ => Some(v),
        })
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// Mutable elasticity state, owned by the orchestrator, re-derived each tick
/// from the config model and HAProxy stats rather than persisted anywhere.
pub struct ElasticityRuntime {
    pub history: BoundedHistory,
    pub conn_history: BoundedHistory,
    pub target: i64,
    pub pending: i64,
    /// `None` means "never observed" (first tick); distinguished from
    /// `Some(empty)` ("observed, nothing healthy").
    pub healthy: Option<HashSet<String>>,
    pub shutoff_time: u64,
    /// Working floor, equal to the config's `min_servers` except while
    /// `hold_conns` is pinning or releasing a worker.
    pub min_servers: u32,
}

impl ElasticityRuntime {
    pub fn new(min_servers: u32) -> Self {
        ElasticityRuntime {
            history: BoundedHistory::new(HISTORY_CAPACITY),
            conn_history: BoundedHistory::new(HISTORY_CAPACITY),
            target: min_servers as i64,
            pending: 0,
            healthy: None,
            shutoff_time: 0,
            min_servers,
        }
    }
}

pub struct Orchestrator {
    name: String,
    appname: String,
    manifest: String,
    elasticity: ElasticityConfig,
    pub runtime: ElasticityRuntime,
}

impl Orchestrator {
    /// `None` when the service has no `elasticity` block — such services are
    /// membership-only and have no orchestrator.
    pub fn new(service: &ServiceConfig) -> Option<Self> {
        let elasticity = service.elasticity.clone()?;
        let runtime = ElasticityRuntime::new(elasticity.min_servers);
        Some(Orchestrator {
            name: service.name.clone(),
            appname: service.scheduler.appname.clone(),
            manifest: service.scheduler.manifest.clone(),
            elasticity,
            runtime,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn proxy_name(&self) -> String {
        format!("{}_proxy", self.name)
    }

    pub fn tick(&mut self, admin: &AdminClient, scheduler: &SchedulerClient, now: u64, metrics: &Metrics) {
        self.update_target(admin, metrics);
        self.apply_hold_conns(admin, now, metrics);
        self.reconcile_actual(admin, scheduler, metrics);
    }

    fn update_target(&mut self, admin: &AdminClient, metrics: &Metrics) {
        let column = self.elasticity.metric.stat_column();
        let current = admin.metric(&self.name, column).unwrap_or_else(|err| {
            tracing::warn!(service = %self.name, %err, "failed to read demand metric, treating as 0");
            metrics.record_admin_read_failure();
            0.0
        });
        self.runtime.history.push(current);
        let m = self.runtime.history.max().unwrap_or(0.0);
        let min_servers = self.runtime.min_servers as i64;

        let mut target = match &self.elasticity.policy {
            ScalingPolicy::Steps(steps) => min_servers + steps.iter().filter(|s| m > **s).count() as i64,
            ScalingPolicy::Breakpoint(b) => {
                let mut t = self.runtime.target;
                if current > *b {
                    t += 1;
                }
                if m < *b {
                    t -= 1;
                }
                t
            }
            ScalingPolicy::Scale(divisor) => (m / divisor).floor() as i64 + min_servers,
        };

        target = target.max(min_servers);
        if let Some(cap) = self.elasticity.max_servers {
            target = target.min(cap as i64);
        }
        self.runtime.target = target;
    }

    fn apply_hold_conns(&mut self, admin: &AdminClient, now: u64, metrics: &Metrics) {
        let Some(hold) = self.elasticity.hold_conns else {
            return;
        };
        let proxy = self.proxy_name();

        if now >= self.runtime.shutoff_time {
            let scur = admin.metric(&proxy, "scur").unwrap_or_else(|err| {
                tracing::warn!(service = %self.name, %err, "failed to read proxy scur, treating as 0");
                metrics.record_admin_read_failure();
                0.0
            });
            if scur > 0.0 {
                self.runtime.min_servers += 1;
                self.runtime.target += 1;
                self.runtime.shutoff_time = now + hold.cooldown_secs;
            } else if self.runtime.target > 0 {
                self.runtime.min_servers = self.runtime.min_servers.saturating_sub(1);
                self.runtime.target -= 1;
            }
        }

        let healthy_empty = self.runtime.healthy.as_ref().map(|h| h.is_empty()).unwrap_or(true);
        let maxconn = if healthy_empty {
            HOLD_CONNS_HOLD_MAXCONN
        } else {
            HOLD_CONNS_ADMIT_MAXCONN
        };
        if let Err(err) = admin.setmaxconn(&proxy, maxconn) {
            tracing::warn!(service = %self.name, %err, "failed to set frontend maxconn");
        }
    }

    fn reconcile_actual(&mut self, admin: &AdminClient, scheduler: &SchedulerClient, metrics: &Metrics) {
        let servers = admin.servers(&self.name).unwrap_or_else(|err| {
            tracing::warn!(service = %self.name, %err, "failed to read server statuses");
            metrics.record_admin_read_failure();
            Vec::new()
        });
        let healthy: HashSet<String> = servers.iter().filter(|s| s.is_healthy()).map(|s| s.name.clone()).collect();

        let Some(prev_healthy) = self.runtime.healthy.take() else {
            self.runtime.healthy = Some(healthy);
            return;
        };

        self.runtime.pending -= healthy.len() as i64 - prev_healthy.len() as i64;
        self.runtime.healthy = Some(healthy.clone());

        let diff = self.runtime.target - healthy.len() as i64 - self.runtime.pending;

        if diff > 0 {
            for _ in 0..diff {
                if let Err(err) = scheduler.start(&self.appname, &self.manifest) {
                    tracing::warn!(service = %self.name, %err, "scheduler start failed");
                }
                metrics.record_scheduler_start();
            }
            self.runtime.pending += diff;
        } else if diff < 0 {
            let stop_count = diff.unsigned_abs().min(healthy.len() as u64) as usize;
            for instance in healthy.iter().take(stop_count) {
                if let Err(err) = scheduler.stop(&self.appname, instance) {
                    tracing::warn!(service = %self.name, %err, "scheduler stop failed");
                }
                metrics.record_scheduler_stop();
                self.runtime.pending -= 1;
            }
        }
    }
}
