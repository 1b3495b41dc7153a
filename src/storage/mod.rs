//! Persistent storage collaborator
//!
//! ## Responsibilities
//!
//! - Mount/unmount around the capture window (the mount shares pins with the
//!   indicator GPIO on the reference hardware, so the done-blink requires an
//!   unmounted card)
//! - Idempotent directory creation and truncate-create file writes
//!
//! Mounting prefers the wide (4-bit) bus and falls back to 1-bit when the
//! wide mount fails; [`mount`] implements that policy over the trait.

use crate::error::{Error, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::fs;

/// SDMMC bus width
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusWidth {
    One,
    Four,
}

impl BusWidth {
    pub fn lanes(&self) -> u8 {
        match self {
            BusWidth::One => 1,
            BusWidth::Four => 4,
        }
    }
}

/// Storage seam consumed by the capture subsystem
#[async_trait]
pub trait Storage: Send + Sync {
    /// Root path all capture files live under
    fn mount_root(&self) -> &Path;

    /// Mount at a specific bus width
    async fn mount_width(&self, width: BusWidth) -> Result<()>;

    /// Unmount; no-op when not mounted
    async fn unmount(&self) -> Result<()>;

    /// Create a directory and any missing parents; ok if it already exists
    async fn mkdirs(&self, path: &Path) -> Result<()>;

    /// Write the full buffer in one truncate-create write
    async fn write_file(&self, path: &Path, data: &[u8]) -> Result<()>;
}

/// Mount with wide-to-narrow fallback, returning the width that stuck.
pub async fn mount(storage: &dyn Storage) -> Result<BusWidth> {
    match storage.mount_width(BusWidth::Four).await {
        Ok(()) => Ok(BusWidth::Four),
        Err(e) => {
            tracing::warn!(error = %e, "4-bit mount failed, falling back to 1-bit");
            storage.mount_width(BusWidth::One).await?;
            Ok(BusWidth::One)
        }
    }
}

/// Directory-backed storage for host builds and tests.
///
/// "Mounting" only ensures the root directory exists; the mounted flag still
/// gates writes so sessions exercise the same mount/unmount discipline as the
/// SDMMC-backed implementation.
pub struct DirStorage {
    root: PathBuf,
    mounted: AtomicBool,
}

impl DirStorage {
    pub fn new(root: PathBuf) -> Self {
        Self {
            root,
            mounted: AtomicBool::new(false),
        }
    }

    pub fn is_mounted(&self) -> bool {
        self.mounted.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Storage for DirStorage {
    fn mount_root(&self) -> &Path {
        &self.root
    }

    async fn mount_width(&self, width: BusWidth) -> Result<()> {
        if self.mounted.load(Ordering::SeqCst) {
            return Ok(());
        }
        fs::create_dir_all(&self.root).await?;
        self.mounted.store(true, Ordering::SeqCst);
        tracing::info!(root = %self.root.display(), lanes = width.lanes(), "storage mounted");
        Ok(())
    }

    async fn unmount(&self) -> Result<()> {
        if self.mounted.swap(false, Ordering::SeqCst) {
            tracing::info!(root = %self.root.display(), "storage unmounted");
        }
        Ok(())
    }

    async fn mkdirs(&self, path: &Path) -> Result<()> {
        if !self.mounted.load(Ordering::SeqCst) {
            return Err(Error::Storage("not mounted".to_string()));
        }
        fs::create_dir_all(path).await?;
        Ok(())
    }

    async fn write_file(&self, path: &Path, data: &[u8]) -> Result<()> {
        if !self.mounted.load(Ordering::SeqCst) {
            return Err(Error::Storage("not mounted".to_string()));
        }
        fs::write(path, data).await?;
        Ok(())
    }
}
