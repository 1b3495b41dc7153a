//! Camera collaborator contract
//!
//! ## Responsibilities
//!
//! - Frame grab/dispose pairing for the capture path
//! - Named control-value application (pixformat, framesize, overlay controls)
//!
//! The sensor driver itself lives behind this trait; the capture subsystem
//! only depends on the three operations below. `frame_dispose` must be called
//! after every successful `frame_grab`, even when a later step fails, because
//! real drivers hand out DMA-backed buffers that must be returned.

use crate::error::Result;
use async_trait::async_trait;

/// One grabbed frame. The buffer is owned by the driver until
/// [`Camera::frame_dispose`] is called.
#[derive(Debug, Clone)]
pub struct FrameBuf {
    /// Encoded frame bytes
    pub data: Vec<u8>,
}

/// Camera driver seam consumed by the capture subsystem
#[async_trait]
pub trait Camera: Send + Sync {
    /// Grab one frame from the sensor
    async fn frame_grab(&self) -> Result<FrameBuf>;

    /// Return the most recently grabbed frame buffer to the driver
    async fn frame_dispose(&self);

    /// Set a named control value (e.g. "pixformat", "agc_gain")
    async fn ctrl_set(&self, name: &str, value: i32) -> Result<()>;
}
