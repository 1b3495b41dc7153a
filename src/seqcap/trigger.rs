//! Sync signal driver
//!
//! ## Responsibilities
//!
//! - Master side: pulse a dedicated output pin once per frame, bracketing the
//!   local frame grab so both devices request exposure at the same instant
//! - Slave side: arm an edge-triggered input line whose only action is a
//!   non-blocking wakeup of the capture loop
//!
//! [`SyncTrigger`] is a strict two-role channel: `signal` is the producer,
//! callable from interrupt context (never blocks, never allocates), and
//! `wait` is the consumer, callable only from task context. Wakeups are
//! single-slot; back-to-back edges coalesce.

use crate::camera::{Camera, FrameBuf};
use crate::error::Result;
use futures::FutureExt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;

/// How long the master holds the pulse high after issuing its grab, so the
/// peer's edge detector latches it even under interrupt-latency jitter.
pub const PULSE_HOLD: Duration = Duration::from_millis(5);

/// Single-slot wakeup between the trigger edge and the slave capture loop.
#[derive(Debug, Default)]
pub struct SyncTrigger {
    notify: Notify,
}

impl SyncTrigger {
    pub fn new() -> Self {
        Self {
            notify: Notify::new(),
        }
    }

    /// Producer side. Non-blocking and allocation-free; the only caller is
    /// the edge-interrupt path.
    pub fn signal(&self) {
        self.notify.notify_one();
    }

    /// Consumer side. Blocks the slave capture loop until the next edge.
    pub async fn wait(&self) {
        self.notify.notified().await;
    }

    /// Discard a pending wakeup, if any. Called immediately before arming so
    /// a stale pulse from a previous session cannot leak into this one.
    pub fn drain(&self) {
        self.notify.notified().now_or_never();
    }
}

/// Digital output pin (sync pulse, indicator). Sync pin idles low.
pub trait OutputPin: Send + Sync {
    fn set_high(&self);
    fn set_low(&self);
}

/// Slave-side edge-interrupt input line.
pub trait TriggerLine: Send + Sync {
    /// Enable rising-edge notification into `trigger`.
    fn arm(&self, trigger: Arc<SyncTrigger>) -> Result<()>;

    /// Remove the edge handler.
    fn disarm(&self);
}

/// Pulse-bracketed master grab: raise the pin, grab, hold, drop the pin.
///
/// The hold guarantees the slave latches the edge even if its interrupt is
/// delayed; the grab sits inside the bracket so both exposure windows are
/// requested within interrupt latency of each other.
pub async fn pulsed_grab(pin: &dyn OutputPin, camera: &dyn Camera) -> Result<FrameBuf> {
    pin.set_high();
    let grabbed = camera.frame_grab().await;
    tokio::time::sleep(PULSE_HOLD).await;
    pin.set_low();
    grabbed
}
