use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use haproxy_conductor::conductor::{Conductor, Paths};
use haproxy_conductor::constants::{DEFAULT_CONFIG_FILE, DEFAULT_HAPROXY_CONFIG_FILE, DEFAULT_SOCKET_DIR, LOOP_TIME_SECS};

/// haproxy-conductor - elastic load-balancer control plane for HAProxy
#[derive(Parser, Debug)]
#[command(name = "haproxy-conductor")]
#[command(version, about, long_about = None)]
struct Args {
    /// Directory holding the HAProxy admin socket and pidfile
    #[arg(long, default_value = DEFAULT_SOCKET_DIR)]
    socket: PathBuf,

    /// Path to the declarative input document
    #[arg(long, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    /// Path to the generated HAProxy configuration file
    #[arg(long, default_value = DEFAULT_HAPROXY_CONFIG_FILE)]
    haproxy_config: PathBuf,

    /// Raise the tracing filter to debug regardless of RUST_LOG
    #[arg(long)]
    debug: bool,
}

fn main() -> ExitCode {
    let args = Args::parse();

    if let Err(err) = haproxy_conductor::logging::init_subscriber(args.debug) {
        eprintln!("failed to initialize logging: {err}");
        return ExitCode::from(1);
    }

    let paths = Paths::new(args.socket.clone(), args.haproxy_config.clone());

    tracing::info!(
        socket = %args.socket.display(),
        config = %args.config.display(),
        haproxy_config = %args.haproxy_config.display(),
        "starting haproxy-conductor"
    );

    let conductor = match Conductor::start(&args.config, paths) {
        Ok(conductor) => conductor,
        Err(err) => {
            if err.downcast_ref::<haproxy_conductor::error::ConfigError>().is_some() {
                tracing::error!(%err, "configuration invalid, refusing to start");
                return ExitCode::from(2);
            }
            tracing::error!(%err, "failed to start conductor");
            return ExitCode::from(1);
        }
    };

    let runtime = match tokio::runtime::Builder::new_multi_thread().worker_threads(1).enable_all().build() {
        Ok(runtime) => runtime,
        Err(err) => {
            eprintln!("failed to build async runtime: {err}");
            return ExitCode::from(1);
        }
    };

    runtime.block_on(run(conductor))
}

async fn run(mut conductor: Conductor) -> ExitCode {
    let mut interval = tokio::time::interval(std::time::Duration::from_secs(LOOP_TIME_SECS));
    let mut sigterm = match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
        Ok(sig) => sig,
        Err(err) => {
            tracing::error!(%err, "failed to install SIGTERM handler");
            return ExitCode::from(1);
        }
    };

    loop {
        tokio::select! {
            _ = interval.tick() => {
                if let Err(err) = tokio::task::block_in_place(|| conductor.tick()) {
                    tracing::error!(%err, "tick failed");
                }
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("received SIGINT, shutting down");
                break;
            }
            _ = sigterm.recv() => {
                tracing::info!("received SIGTERM, shutting down");
                break;
            }
        }
    }

    tokio::task::block_in_place(|| conductor.shutdown());
    ExitCode::from(0)
}
