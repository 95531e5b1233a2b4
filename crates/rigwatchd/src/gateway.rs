//! Gateway mode: every background loop in one process.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use rigwatch_core::GatewayConfig;
use rigwatch_device::{
    CameraStreamer, DeviceApi, HttpDeviceApi, Reachability, SystemReachability, TcpCameraStreamer,
};
use rigwatch_health::{DeviceProber, HealthPoller, HealthRegistry};
use rigwatch_restart::RestartCoordinator;
use rigwatch_state::EventLog;
use rigwatch_tour::{TourDeps, TourOrchestrator};
use tokio::sync::watch;
use tracing::{info, warn};

use crate::{admin, api};

pub async fn run(
    config_path: Option<PathBuf>,
    data_dir: PathBuf,
    api_port: u16,
) -> anyhow::Result<()> {
    info!("rigwatch gateway starting");

    let config = match &config_path {
        Some(path) => GatewayConfig::from_file(path)?,
        None => {
            warn!("no config file given, using defaults");
            GatewayConfig::default()
        }
    };
    let network = config.network();
    let health = config.health();
    let mut tour = config.tour();
    if tour.picture_root.is_relative() {
        tour.picture_root = data_dir.join(&tour.picture_root);
    }

    // ── Initialize subsystems ──────────────────────────────────

    let store = admin::open_store(&data_dir)?;
    info!(data_dir = %data_dir.display(), "state store opened");

    let registry = Arc::new(HealthRegistry::new(store.clone())?);
    let api: Arc<dyn DeviceApi> = Arc::new(HttpDeviceApi::new(network.api_port, health.request_timeout));
    let reach: Arc<dyn Reachability> = Arc::new(SystemReachability::new(network.connect_timeout));
    let streamer: Arc<dyn CameraStreamer> = Arc::new(TcpCameraStreamer::new(
        network.stream_port,
        tour.picture_root.clone(),
        health.request_timeout,
    ));

    let poller = Arc::new(HealthPoller::new(
        registry.clone(),
        api.clone(),
        reach.clone(),
        health,
    ));
    let prober = Arc::new(DeviceProber::new(reach, network));
    let coordinator = Arc::new(RestartCoordinator::new(
        registry.clone(),
        store.clone(),
        api.clone(),
        EventLog::new(store.clone()),
        config.restart(),
    ));
    let orchestrator = Arc::new(TourOrchestrator::new(
        TourDeps {
            store: store.clone(),
            health: registry,
            restart: coordinator,
            api,
            streamer,
        },
        tour,
        config.motor(),
    ));

    let stopped = orchestrator.recover_after_restart()?;
    if stopped > 0 {
        warn!(stopped, "tours left running by the previous process were stopped");
    }

    // ── Start background tasks ─────────────────────────────────

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let prober_handle = tokio::spawn(prober.run(poller.clone(), shutdown_rx.clone()));
    let poller_handle = tokio::spawn(poller.run(shutdown_rx.clone()));
    let scheduler_handle = tokio::spawn(orchestrator.clone().run(shutdown_rx));

    // ── Control API ────────────────────────────────────────────

    let router = api::build_router(orchestrator);
    let api_addr = SocketAddr::from(([0, 0, 0, 0], api_port));
    info!(%api_addr, "control api starting");
    let listener = tokio::net::TcpListener::bind(api_addr).await?;

    let server = axum::serve(listener, router).with_graceful_shutdown(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to listen for ctrl-c");
        }
        info!("shutdown signal received");
        let _ = shutdown_tx.send(true);
    });
    server.await?;

    let _ = prober_handle.await;
    let _ = poller_handle.await;
    let _ = scheduler_handle.await;

    info!("rigwatch gateway stopped");
    Ok(())
}
