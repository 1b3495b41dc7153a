//! Capture trigger routes
//!
//! Both endpoints validate the device role and the request, claim the
//! session gate, acknowledge the client, and hand the parsed configuration
//! to a freshly spawned session task. Nothing about the session's outcome
//! flows back over HTTP; the acknowledgement only means "started".

use axum::extract::{Query, State};
use axum::response::IntoResponse;
use axum::Json;
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::seqcap;
use crate::state::{AppState, Role};

/// `GET /seq_cap` - start a master capture session.
///
/// Master-only. Required: `cap_seq_name`, `cap_amount`. Optional: selectors,
/// timing knobs, the camera-control overlay, and `slave_host` (defaults to
/// the hostname derived from the pairing id).
pub async fn seq_cap(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<impl IntoResponse> {
    if state.config.role != Role::Master {
        return Err(Error::RoleMismatch("Not master".to_string()));
    }

    let (cfg, slave_host) = seqcap::parse_master_query(&params)?;
    let peer_host = slave_host.unwrap_or_else(|| state.config.peer_host());

    tracing::info!(
        sequence = %cfg.sequence_name,
        frames = cfg.frame_count,
        pixformat = cfg.pixel_format.code(),
        framesize = cfg.frame_size.code(),
        peer = %peer_host,
        overlay_controls = cfg.overlay.entries().len(),
        "starting master sequence capture"
    );

    seqcap::start_master(Arc::clone(&state.ctx), cfg, peer_host)?;

    Ok(Json(json!({"ok": true, "started": true})))
}

/// `GET /cap_seq_init` - arm this device as the slave of a sequence.
///
/// Slave-only. Selectors are numeric-only here; the master never forwards
/// its overlay, so the slave captures with driver defaults.
pub async fn cap_seq_init(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<impl IntoResponse> {
    if state.config.role != Role::Slave {
        return Err(Error::RoleMismatch("Not slave".to_string()));
    }

    let cfg = seqcap::parse_slave_query(&params)?;

    tracing::info!(
        sequence = %cfg.sequence_name,
        frames = cfg.frame_count,
        pixformat = cfg.pixel_format.code(),
        framesize = cfg.frame_size.code(),
        "arming slave sequence capture"
    );

    seqcap::start_slave(Arc::clone(&state.ctx), cfg)?;

    Ok(Json(json!({"ok": true, "prepared": true})))
}
