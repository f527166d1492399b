//! End-to-end elasticity scenarios against a stubbed HAProxy admin socket.
//! No real `haproxy` or `treadmill` binary is required: scheduler calls
//! degrade to logged warnings (fire-and-forget), and the orchestrator's
//! target/pending bookkeeping is observable independent of whether those
//! subprocesses actually exist.

use std::io::{BufRead, BufReader, Write};
use std::os::unix::net::UnixListener;
use std::path::Path;
use std::sync::{Arc, Mutex};

use haproxy_conductor::config::elasticity::{DemandMetric, ElasticityConfig, ScalingPolicy};
use haproxy_conductor::config::service::{HaproxyServiceConfig, SchedulerConfig, ServiceConfig};
use haproxy_conductor::haproxy::AdminClient;
use haproxy_conductor::metrics::Metrics;
use haproxy_conductor::orchestrator::Orchestrator;
use haproxy_conductor::scheduler::SchedulerClient;

fn stat_csv(backend: &str, rate: f64, servers: &[(&str, &str)]) -> String {
    let mut out = format!("# pxname,svname,scur,status,rate,qtime,rtime\n");
    for (name, status) in servers {
        out.push_str(&format!("{backend},{name},0,{status},0,0,0\n"));
    }
    out.push_str(&format!("{backend},FRONTEND,0,OPEN,0,0,0\n"));
    out.push_str(&format!("{backend},BACKEND,0,UP,{rate},0,0\n"));
    out
}

/// Serves `*response` for every `show stat` request on a background thread;
/// answers `set maxconn` with an empty success line.
fn spawn_admin_stub(socket_dir: &Path, response: Arc<Mutex<String>>) {
    let listener = UnixListener::bind(socket_dir.join("admin.sock")).unwrap();
    std::thread::spawn(move || {
        for stream in listener.incoming().flatten() {
            let response = response.clone();
            std::thread::spawn(move || {
                let mut reader = BufReader::new(stream.try_clone().unwrap());
                let mut line = String::new();
                if reader.read_line(&mut line).is_err() {
                    return;
                }
                let mut stream = stream;
                if line.trim().starts_with("set maxconn") {
                    let _ = stream.write_all(b"\n");
                } else {
                    let body = response.lock().unwrap().clone();
                    let _ = stream.write_all(body.as_bytes());
                }
            });
        }
    });
}

fn steps_service(min_servers: u32, max_servers: Option<u32>) -> ServiceConfig {
    ServiceConfig {
        name: "svc".to_string(),
        scheduler: SchedulerConfig {
            appname: "myapp.prod".to_string(),
            manifest: "myapp.yml".to_string(),
            endpoint: "http".to_string(),
        },
        haproxy: HaproxyServiceConfig {
            listen: vec![],
            port: 8080,
            server: vec![],
        },
        elasticity: Some(ElasticityConfig {
            min_servers,
            max_servers,
            metric: DemandMetric::ConnRate,
            policy: ScalingPolicy::Steps(vec![100.0, 300.0]),
            hold_conns: None,
        }),
    }
}

#[test]
fn cold_start_dispatches_min_servers_and_seeds_healthy() {
    let dir = tempfile::tempdir().unwrap();
    let response = Arc::new(Mutex::new(stat_csv("svc", 0.0, &[])));
    spawn_admin_stub(dir.path(), response);

    let admin = AdminClient::new(dir.path());
    let scheduler = SchedulerClient::new();
    let metrics = Metrics::new();
    let mut orchestrator = Orchestrator::new(&steps_service(1, Some(5))).unwrap();

    orchestrator.tick(&admin, &scheduler, 0, &metrics);

    assert_eq!(orchestrator.runtime.target, 1);
    // first tick only seeds `healthy`; no pending reconciliation yet.
    assert_eq!(orchestrator.runtime.pending, 0);
    assert!(orchestrator.runtime.healthy.as_ref().unwrap().is_empty());
}

#[test]
fn steps_ladder_climbs_then_descends_with_history_window() {
    let dir = tempfile::tempdir().unwrap();
    let response = Arc::new(Mutex::new(stat_csv("svc", 0.0, &[("svc#1", "UP")])));
    spawn_admin_stub(dir.path(), response.clone());

    let admin = AdminClient::new(dir.path());
    let scheduler = SchedulerClient::new();
    let metrics = Metrics::new();
    let mut orchestrator = Orchestrator::new(&steps_service(1, Some(5))).unwrap();

    // tick 1: seeds healthy={svc#1}
    orchestrator.tick(&admin, &scheduler, 0, &metrics);
    assert_eq!(orchestrator.runtime.target, 1);

    // tick 2: rate spikes to 350 -> max(history) = 350 > 300 and > 100 -> target = 1 + 2 = 3
    *response.lock().unwrap() = stat_csv("svc", 350.0, &[("svc#1", "UP")]);
    orchestrator.tick(&admin, &scheduler, 1, &metrics);
    assert_eq!(orchestrator.runtime.target, 3);
    // diff = 3 - 1 - 0 = 2 -> two starts dispatched
    assert_eq!(orchestrator.runtime.pending, 2);

    // ticks 3-12: rate drops to 0 for enough ticks to flush the window of
    // historical spikes (capacity 10).
    *response.lock().unwrap() = stat_csv("svc", 0.0, &[("svc#1", "UP")]);
    for t in 2..13 {
        orchestrator.tick(&admin, &scheduler, t, &metrics);
    }
    assert_eq!(orchestrator.runtime.target, 1);
}

#[test]
fn breakpoint_policy_holds_the_line_while_a_spike_lingers_in_the_window() {
    let dir = tempfile::tempdir().unwrap();
    let response = Arc::new(Mutex::new(stat_csv("svc", 0.0, &[("svc#1", "UP")])));
    spawn_admin_stub(dir.path(), response.clone());

    let admin = AdminClient::new(dir.path());
    let scheduler = SchedulerClient::new();
    let metrics = Metrics::new();

    let mut service = steps_service(1, Some(5));
    service.elasticity = Some(ElasticityConfig {
        min_servers: 1,
        max_servers: Some(5),
        metric: DemandMetric::ConnRate,
        policy: ScalingPolicy::Breakpoint(10.0),
        hold_conns: None,
    });
    let mut orchestrator = Orchestrator::new(&service).unwrap();

    // c=0 < B=10 -> target -= 1, clamped back up to min_servers (1)
    orchestrator.tick(&admin, &scheduler, 0, &metrics);
    assert_eq!(orchestrator.runtime.target, 1);

    // c=20 > B=10 -> target += 1 -> 2
    *response.lock().unwrap() = stat_csv("svc", 20.0, &[("svc#1", "UP")]);
    orchestrator.tick(&admin, &scheduler, 1, &metrics);
    assert_eq!(orchestrator.runtime.target, 2);

    // c=5 is back below B, but the 20 from the prior tick is still the max
    // of the window, so the down-step (which needs m<B) doesn't fire either.
    *response.lock().unwrap() = stat_csv("svc", 5.0, &[("svc#1", "UP")]);
    orchestrator.tick(&admin, &scheduler, 2, &metrics);
    assert_eq!(orchestrator.runtime.target, 2);
}

#[test]
fn hold_conns_gates_frontend_maxconn_on_health() {
    let dir = tempfile::tempdir().unwrap();
    let response = Arc::new(Mutex::new(stat_csv("svc", 0.0, &[])));
    spawn_admin_stub(dir.path(), response);

    let admin = AdminClient::new(dir.path());
    let scheduler = SchedulerClient::new();
    let metrics = Metrics::new();

    let mut service = steps_service(0, None);
    service.elasticity = Some(ElasticityConfig {
        min_servers: 0,
        max_servers: None,
        metric: DemandMetric::ConnRate,
        policy: ScalingPolicy::Breakpoint(100.0),
        hold_conns: Some(haproxy_conductor::config::elasticity::HoldConns { cooldown_secs: 60 }),
    });
    let mut orchestrator = Orchestrator::new(&service).unwrap();

    // should not panic even though the `<name>_proxy` backend doesn't exist
    // in this stub: metric/setmaxconn failures are swallowed and logged.
    orchestrator.tick(&admin, &scheduler, 0, &metrics);
    assert_eq!(orchestrator.runtime.target, 0);
}
