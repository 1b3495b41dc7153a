//! Remote preparation client (master side)
//!
//! One GET to the peer's arm endpoint carrying only the required fields.
//! This is a best-effort handshake, not a two-phase commit: the peer may
//! already be armed out-of-band or may simply be late, so the master treats
//! any failure here as soft and proceeds with its own sequence.

use super::config::SequenceCaptureConfig;
use crate::error::{Error, Result};
use std::time::Duration;

/// Bound on the whole preparation round trip.
pub const PREPARE_TIMEOUT: Duration = Duration::from_secs(5);

/// Build the arm-slave URL. Overlay controls are intentionally not
/// forwarded; the slave receives the minimal config and defaults the rest.
pub fn prepare_url(cfg: &SequenceCaptureConfig, peer_host: &str) -> String {
    format!(
        "http://{}/cap_seq_init?pixformat={}&framesize={}&cap_seq_name={}&cap_amount={}",
        peer_host,
        cfg.pixel_format.code(),
        cfg.frame_size.code(),
        cfg.sequence_name,
        cfg.frame_count
    )
}

/// Ask the peer to arm itself. Transport errors and non-2xx statuses are
/// both errors; the caller decides they are non-fatal.
pub async fn prepare_peer(
    client: &reqwest::Client,
    cfg: &SequenceCaptureConfig,
    peer_host: &str,
) -> Result<()> {
    let url = prepare_url(cfg, peer_host);
    tracing::info!(url = %url, "preparing peer");

    let resp = client
        .get(&url)
        .timeout(PREPARE_TIMEOUT)
        .send()
        .await?;

    let status = resp.status();
    if !status.is_success() {
        return Err(Error::Internal(format!(
            "peer prepare returned HTTP {status}"
        )));
    }
    Ok(())
}
