//! Quiescence controller
//!
//! Network and radio interrupts are the dominant source of frame-to-frame
//! timing error during a capture window, so the session suspends both the
//! local HTTP server and the radio before any photography work and restores
//! them unconditionally on the way out. Both directions are idempotent.

use crate::error::Result;
use crate::radio::NetworkRadio;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

/// Delay after each suspension step so in-flight work drains.
const DRAIN_DELAY: Duration = Duration::from_millis(50);

/// HTTP server start/stop seam. Both operations are idempotent.
#[async_trait]
pub trait ServerControl: Send + Sync {
    async fn stop(&self) -> Result<()>;
    async fn start(&self) -> Result<()>;
}

/// Suspends and restores the HTTP server + network radio pair.
pub struct Quiescence {
    server: Arc<dyn ServerControl>,
    radio: Arc<dyn NetworkRadio>,
}

impl Quiescence {
    pub fn new(server: Arc<dyn ServerControl>, radio: Arc<dyn NetworkRadio>) -> Self {
        Self { server, radio }
    }

    /// Stop the HTTP server, then the radio, letting in-flight work drain
    /// after each step.
    pub async fn suspend(&self) {
        if let Err(e) = self.server.stop().await {
            tracing::warn!(error = %e, "http server stop failed");
        }
        tokio::time::sleep(DRAIN_DELAY).await;
        if let Err(e) = self.radio.stop().await {
            tracing::warn!(error = %e, "radio stop failed");
        }
        tokio::time::sleep(DRAIN_DELAY).await;
        tracing::info!("quiescence window entered");
    }

    /// Restore the radio, re-associate, and restart the HTTP server.
    /// Called exactly once per session on every exit path.
    pub async fn resume(&self) {
        if let Err(e) = self.radio.start().await {
            tracing::warn!(error = %e, "radio start failed");
        }
        if let Err(e) = self.radio.connect().await {
            tracing::warn!(error = %e, "radio reconnect failed");
        }
        if let Err(e) = self.server.start().await {
            tracing::warn!(error = %e, "http server start failed");
        }
        tracing::info!("quiescence window left, service restored");
    }
}
