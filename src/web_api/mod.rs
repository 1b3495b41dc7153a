//! WebAPI - device HTTP endpoints
//!
//! ## Responsibilities
//!
//! - The two capture trigger routes (`/seq_cap`, `/cap_seq_init`)
//! - Health and status endpoints
//! - The restartable HTTP server handle the quiescence controller drives

mod capture_routes;
pub mod server;

pub use server::HttpServer;

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::state::AppState;

/// Create API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(health_check))
        .route("/api/status", get(device_status))
        .route("/seq_cap", get(capture_routes::seq_cap))
        .route("/cap_seq_init", get(capture_routes::cap_seq_init))
        .with_state(state)
}

/// Health check response body
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub role: &'static str,
    pub capture_active: bool,
}

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        role: state.config.role.as_str(),
        capture_active: state.ctx.gate.is_active(),
    })
}

/// Device status response body
#[derive(Debug, Serialize)]
pub struct DeviceStatus {
    pub device_type: &'static str,
    pub firmware_version: &'static str,
    pub role: &'static str,
    pub pair_id: String,
    pub peer_host: String,
    pub capture_active: bool,
    pub time: DateTime<Utc>,
}

/// Device status endpoint
pub async fn device_status(State(state): State<AppState>) -> Json<DeviceStatus> {
    Json(DeviceStatus {
        device_type: "campair",
        firmware_version: env!("CARGO_PKG_VERSION"),
        role: state.config.role.as_str(),
        pair_id: state.config.pair_id.clone(),
        peer_host: state.config.peer_host(),
        capture_active: state.ctx.gate.is_active(),
        time: Utc::now(),
    })
}
