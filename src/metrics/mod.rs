// Metrics module - Prometheus-compatible text export of conductor internals
//
// Scoped to what the conductor itself needs to expose: tick timing, reload
// activity, scheduler call volume, and per-service elasticity gauges. Counters
// use atomics so any component can record without locking; per-service gauges
// live behind a single mutex since they're updated once per tick, not on a
// hot path.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

#[derive(Default)]
pub struct Metrics {
    tick_count: AtomicU64,
    tick_duration_nanos_total: AtomicU64,
    reload_count: AtomicU64,
    dirty_tick_count: AtomicU64,
    scheduler_start_count: AtomicU64,
    scheduler_stop_count: AtomicU64,
    admin_read_failures: AtomicU64,
    service_gauges: Mutex<HashMap<String, ServiceGauges>>,
}

#[derive(Debug, Clone, Copy, Default)]
struct ServiceGauges {
    target: i64,
    pending: i64,
    healthy: i64,
}

impl Metrics {
    pub fn new() -> Self {
        Metrics::default()
    }

    pub fn record_tick(&self, duration: std::time::Duration, dirty: bool, reloaded: bool) {
        self.tick_count.fetch_add(1, Ordering::Relaxed);
        self.tick_duration_nanos_total
            .fetch_add(duration.as_nanos() as u64, Ordering::Relaxed);
        if dirty {
            self.dirty_tick_count.fetch_add(1, Ordering::Relaxed);
        }
        if reloaded {
            self.reload_count.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_scheduler_start(&self) {
        self.scheduler_start_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_scheduler_stop(&self) {
        self.scheduler_stop_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_admin_read_failure(&self) {
        self.admin_read_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn set_service_gauges(&self, service: &str, target: i64, pending: i64, healthy: i64) {
        let mut gauges = self.service_gauges.lock().unwrap_or_else(|e| e.into_inner());
        gauges.insert(service.to_string(), ServiceGauges { target, pending, healthy });
    }

    /// Render all metrics in Prometheus text exposition format.
    pub fn export_prometheus(&self) -> String {
        let mut out = String::new();

        out.push_str("# HELP conductor_tick_total Total conductor ticks run.\n");
        out.push_str("# TYPE conductor_tick_total counter\n");
        out.push_str(&format!(
            "conductor_tick_total {}\n",
            self.tick_count.load(Ordering::Relaxed)
        ));

        out.push_str("# HELP conductor_tick_duration_nanos_total Cumulative tick duration in nanoseconds.\n");
        out.push_str("# TYPE conductor_tick_duration_nanos_total counter\n");
        out.push_str(&format!(
            "conductor_tick_duration_nanos_total {}\n",
            self.tick_duration_nanos_total.load(Ordering::Relaxed)
        ));

        out.push_str("# HELP conductor_reload_total Total haproxy reloads issued.\n");
        out.push_str("# TYPE conductor_reload_total counter\n");
        out.push_str(&format!("conductor_reload_total {}\n", self.reload_count.load(Ordering::Relaxed)));

        out.push_str("# HELP conductor_dirty_tick_total Ticks where a watcher changed the config model.\n");
        out.push_str("# TYPE conductor_dirty_tick_total counter\n");
        out.push_str(&format!(
            "conductor_dirty_tick_total {}\n",
            self.dirty_tick_count.load(Ordering::Relaxed)
        ));

        out.push_str("# HELP conductor_scheduler_start_total Scheduler start invocations.\n");
        out.push_str("# TYPE conductor_scheduler_start_total counter\n");
        out.push_str(&format!(
            "conductor_scheduler_start_total {}\n",
            self.scheduler_start_count.load(Ordering::Relaxed)
        ));

        out.push_str("# HELP conductor_scheduler_stop_total Scheduler stop invocations.\n");
        out.push_str("# TYPE conductor_scheduler_stop_total counter\n");
        out.push_str(&format!(
            "conductor_scheduler_stop_total {}\n",
            self.scheduler_stop_count.load(Ordering::Relaxed)
        ));

        out.push_str("# HELP conductor_admin_read_failures_total Admin socket read failures.\n");
        out.push_str("# TYPE conductor_admin_read_failures_total counter\n");
        out.push_str(&format!(
            "conductor_admin_read_failures_total {}\n",
            self.admin_read_failures.load(Ordering::Relaxed)
        ));

        let gauges = self.service_gauges.lock().unwrap_or_else(|e| e.into_inner());
        out.push_str("# HELP conductor_service_target Desired replica count per service.\n");
        out.push_str("# TYPE conductor_service_target gauge\n");
        for (service, g) in gauges.iter() {
            out.push_str(&format!("conductor_service_target{{service=\"{service}\"}} {}\n", g.target));
        }
        out.push_str("# HELP conductor_service_pending Scheduler operations in flight per service.\n");
        out.push_str("# TYPE conductor_service_pending gauge\n");
        for (service, g) in gauges.iter() {
            out.push_str(&format!("conductor_service_pending{{service=\"{service}\"}} {}\n", g.pending));
        }
        out.push_str("# HELP conductor_service_healthy Healthy server count per service.\n");
        out.push_str("# TYPE conductor_service_healthy gauge\n");
        for (service, g) in gauges.iter() {
            out.push_str(&format!("conductor_service_healthy{{service=\"{service}\"}} {}\n", g.healthy));
        }

        out
    }
}
