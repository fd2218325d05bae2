//! Process supervisor: builds the initial [`SharedState`], starts the
//! HTTP service and one capture worker per configured camera, then idles
//! until shutdown is requested.

use std::thread::{self, JoinHandle};

use anyhow::{Context, Result};
use tracing::{error, info, info_span};

use crate::camera::{CameraDevice, MockCameraDevice};
use crate::config::AppConfig;
use crate::record::new_root;
use crate::state::{SharedState, Value};
use crate::worker::CaptureWorker;

/// Runs the supervisor to completion: spawn workers and HTTP, wait for a
/// shutdown signal, join everything. The error variant carries bind/startup
/// failures with `anyhow::Context`; a clean shutdown is `Ok(())`.
pub async fn run(config: AppConfig) -> Result<()> {
    let cameras = config.camera_settings();
    let root = new_root(&config.ipv4, config.port, &cameras);
    let shared = SharedState::from_root(root);

    let bind_addr = format!("{}:{}", config.ipv4, config.port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind HTTP listener on {bind_addr}"))?;
    info!(addr = %bind_addr, "HTTP control surface listening");

    let app = crate::http::router(shared.clone());
    let http_shared = shared.clone();
    let http_task = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_watcher(http_shared))
            .await
    });

    let worker_handles: Vec<JoinHandle<()>> = cameras
        .into_iter()
        .map(|(id, _settings)| spawn_worker(id, shared.clone()))
        .collect();

    wait_for_shutdown_signal(&shared).await;

    if let Err(e) = http_task.await {
        error!(error = %e, "HTTP task join failed");
    }
    for handle in worker_handles {
        if handle.join().is_err() {
            error!("capture worker thread panicked");
        }
    }

    info!("supervisor shut down cleanly");
    Ok(())
}

fn spawn_worker(camera_id: String, shared: SharedState) -> JoinHandle<()> {
    thread::spawn(move || {
        let span = info_span!("camera_worker", camera_id = %camera_id);
        let _enter = span.enter();
        match MockCameraDevice::open(camera_id.parse().unwrap_or(0)) {
            Ok(device) => {
                let mut worker = CaptureWorker::new(camera_id, device, shared);
                worker.run();
            }
            Err(e) => error!(camera_id = %camera_id, error = %e, "failed to open camera device"),
        }
    })
}

async fn shutdown_watcher(shared: SharedState) {
    loop {
        let running = shared
            .get("is_running")
            .map(|v| matches!(v, Value::Bool(true)))
            .unwrap_or(false);
        if !running {
            return;
        }
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;
    }
}

async fn wait_for_shutdown_signal(shared: &SharedState) {
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::select! {
        _ = ctrl_c => {
            info!("received interrupt, shutting down");
        }
    }
    let _ = shared.set("is_running", Value::Bool(false));
    if let Ok(Value::Mapping(cameras)) = shared.get("camera") {
        for id in cameras.keys() {
            let _ = shared.set(&format!("camera/{id}/is_running"), Value::Bool(false));
        }
    }
}
