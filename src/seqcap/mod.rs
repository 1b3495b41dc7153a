//! Synchronized sequence capture subsystem
//!
//! ## Responsibilities
//!
//! - Single-admission control for capture sessions (session gate)
//! - The master/slave capture state machines and their collaborators:
//!   remote peer preparation, network quiescence, the sync pulse/interrupt
//!   protocol, and frame persistence
//!
//! ## Design
//!
//! - The trigger endpoints claim the gate, acknowledge the client, and spawn
//!   one session task that owns the whole sequence
//! - Every session restores everything it suspended and clears the gate on
//!   every exit path

pub mod config;
pub mod gate;
pub mod persist;
pub mod prepare;
pub mod quiesce;
pub mod session;
pub mod trigger;

pub use config::{
    parse_master_query, parse_slave_query, ControlOverlay, FrameSize, PixelFormat,
    SequenceCaptureConfig,
};
pub use gate::SessionGate;
pub use session::SessionRole;
pub use trigger::SyncTrigger;

use crate::error::{Error, Result};
use crate::state::CaptureContext;
use std::sync::Arc;

/// Admit and spawn a master capture session.
///
/// Claims the session gate before spawning; the spawned task releases it on
/// every exit path. Returns [`Error::Busy`] when a session already runs.
pub fn start_master(
    ctx: Arc<CaptureContext>,
    cfg: SequenceCaptureConfig,
    peer_host: String,
) -> Result<()> {
    if !ctx.gate.try_begin() {
        return Err(Error::Busy("capture session already running".to_string()));
    }
    tokio::spawn(session::run_session(
        ctx,
        SessionRole::Master { peer_host },
        cfg,
    ));
    Ok(())
}

/// Admit and spawn a slave capture session.
pub fn start_slave(ctx: Arc<CaptureContext>, cfg: SequenceCaptureConfig) -> Result<()> {
    if !ctx.gate.try_begin() {
        return Err(Error::Busy("capture session already running".to_string()));
    }
    tokio::spawn(session::run_session(ctx, SessionRole::Slave, cfg));
    Ok(())
}
