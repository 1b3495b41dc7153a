//! campair - paired-camera device service
//!
//! Firmware-style service for one unit of a paired camera rig. Each device
//! exposes its camera over the local network and, on demand, runs a
//! hardware-synchronized multi-frame capture sequence across both units,
//! persisting every frame to local storage.
//!
//! ## Architecture
//!
//! 1. `seqcap` - the synchronized sequence capture subsystem: session gate,
//!    master/slave state machines, peer preparation, quiescence, the sync
//!    pulse/interrupt protocol, frame persistence
//! 2. `web_api` - trigger endpoints and the restartable HTTP server
//! 3. `camera` / `radio` / `storage` - collaborator contracts
//! 4. `platform` - host-side collaborator implementations
//! 5. `state` - device config and the shared capture context

pub mod camera;
pub mod error;
pub mod platform;
pub mod radio;
pub mod seqcap;
pub mod state;
pub mod storage;
pub mod web_api;

pub use error::{Error, Result};
pub use state::{AppConfig, AppState, CaptureContext, Role};
