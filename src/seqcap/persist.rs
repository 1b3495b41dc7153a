//! Frame persistence
//!
//! One file per frame under `captures/<sequence_name>/`, named
//! `<monotonic_timestamp_ms>-<frame_size_label>.raw`, written in a single
//! truncate-create write. Path construction is deterministic so a sequence
//! can be reassembled from filenames alone.

use super::config::SequenceCaptureConfig;
use crate::error::Result;
use crate::storage::Storage;
use std::path::{Path, PathBuf};

/// Directory holding all frames of one sequence.
pub fn capture_dir(mount_root: &Path, sequence_name: &str) -> PathBuf {
    mount_root.join("captures").join(sequence_name)
}

/// Full path for one frame.
pub fn frame_path(
    mount_root: &Path,
    sequence_name: &str,
    ts_ms: u64,
    size_label: &str,
) -> PathBuf {
    capture_dir(mount_root, sequence_name).join(format!("{ts_ms}-{size_label}.raw"))
}

/// Create the sequence directory; idempotent.
pub async fn ensure_capture_dir(storage: &dyn Storage, sequence_name: &str) -> Result<()> {
    let dir = capture_dir(storage.mount_root(), sequence_name);
    tracing::info!(dir = %dir.display(), "ensuring capture dir");
    storage.mkdirs(&dir).await
}

/// Persist one frame buffer.
pub async fn persist_frame(
    storage: &dyn Storage,
    cfg: &SequenceCaptureConfig,
    ts_ms: u64,
    data: &[u8],
) -> Result<()> {
    let path = frame_path(
        storage.mount_root(),
        &cfg.sequence_name,
        ts_ms,
        cfg.frame_size.label(),
    );
    tracing::debug!(path = %path.display(), bytes = data.len(), "writing frame");
    storage.write_file(&path, data).await
}
