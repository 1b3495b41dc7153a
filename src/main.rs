//! campair - paired-camera device service
//!
//! Main entry point. Builds the capture context from the host platform
//! backends, starts the HTTP server, and runs the maintenance loop, which
//! idles whenever a capture session holds the gate.

use campair::platform::{HostRadio, LogPin, LoopbackSync, SimCamera};
use campair::seqcap::quiesce::ServerControl;
use campair::seqcap::trigger::{OutputPin, TriggerLine};
use campair::state::{AppConfig, AppState, CaptureContext};
use campair::storage::{self, DirStorage};
use campair::web_api::{self, HttpServer};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "campair=info,tower_http=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AppConfig::default();
    tracing::info!(
        role = config.role.as_str(),
        pair_id = %config.pair_id,
        peer = %config.peer_host(),
        mount_root = %config.mount_root.display(),
        "campair starting"
    );

    let addr: SocketAddr = match format!("{}:{}", config.host, config.port).parse() {
        Ok(addr) => addr,
        Err(e) => {
            tracing::error!(error = %e, "invalid listen address");
            std::process::exit(1);
        }
    };

    // Host platform backends; device builds substitute real drivers here.
    let sync_bus = LoopbackSync::new();
    let server = Arc::new(HttpServer::new(addr));
    let dir_storage = Arc::new(DirStorage::new(config.mount_root.clone()));

    let ctx = Arc::new(CaptureContext::new(
        Arc::new(SimCamera::new()),
        Arc::clone(&dir_storage) as Arc<dyn storage::Storage>,
        Arc::new(HostRadio::new()),
        Arc::clone(&server) as Arc<dyn ServerControl>,
        Arc::clone(&sync_bus) as Arc<dyn OutputPin>,
        Arc::clone(&sync_bus) as Arc<dyn TriggerLine>,
        Arc::new(LogPin::new("indicator")),
    ));

    // Storage serves static capture files between sessions.
    if let Err(e) = storage::mount(dir_storage.as_ref()).await {
        tracing::error!(error = %e, "initial storage mount failed");
        std::process::exit(1);
    }

    let state = AppState {
        config,
        ctx: Arc::clone(&ctx),
    };

    let router = web_api::create_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        );

    server.install(router);
    if let Err(e) = server.start().await {
        tracing::error!(error = %e, "http server failed to start");
        std::process::exit(1);
    }

    // Maintenance loop: one is_active poll per iteration; while a capture
    // session runs, nothing here may touch the radio, the storage mount, or
    // the HTTP server.
    loop {
        if ctx.gate.is_active() {
            tokio::time::sleep(Duration::from_millis(50)).await;
            continue;
        }

        tracing::trace!("keepalive tick");
        tokio::time::sleep(Duration::from_secs(1)).await;
    }
}
