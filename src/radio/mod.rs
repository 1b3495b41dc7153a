//! Network radio collaborator contract
//!
//! The capture subsystem suspends the radio during the timing-critical
//! window and restores it afterwards. Association, credentials and mDNS
//! advertisement are owned by the implementation.

use crate::error::Result;
use async_trait::async_trait;

/// Radio control seam used by the quiescence controller
#[async_trait]
pub trait NetworkRadio: Send + Sync {
    /// Stop the radio
    async fn stop(&self) -> Result<()>;

    /// Start the radio
    async fn start(&self) -> Result<()>;

    /// Re-associate after a start
    async fn connect(&self) -> Result<()>;
}
