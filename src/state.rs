//! Application state
//!
//! Holds the device configuration and the capture-subsystem context shared
//! by the endpoint handlers and the spawned session tasks.

use crate::camera::Camera;
use crate::radio::NetworkRadio;
use crate::seqcap::gate::SessionGate;
use crate::seqcap::quiesce::ServerControl;
use crate::seqcap::trigger::{OutputPin, SyncTrigger, TriggerLine};
use crate::storage::Storage;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// Fixed device identity within a pair
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Master,
    Slave,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Master => "master",
            Role::Slave => "slave",
        }
    }

    /// Case-insensitive; anything unrecognized is treated as master.
    pub fn parse(s: &str) -> Self {
        if s.eq_ignore_ascii_case("slave") {
            Role::Slave
        } else {
            Role::Master
        }
    }
}

/// Device configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Device role, gating which trigger endpoint is accepted
    pub role: Role,
    /// Pairing id used to derive the peer hostname
    pub pair_id: String,
    /// Server host
    pub host: String,
    /// Server port
    pub port: u16,
    /// Storage mount root for capture files
    pub mount_root: PathBuf,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            role: Role::parse(&std::env::var("CAMPAIR_ROLE").unwrap_or_default()),
            pair_id: std::env::var("CAMPAIR_PAIR_ID").unwrap_or_else(|_| "0".to_string()),
            host: std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: std::env::var("PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(80),
            mount_root: std::env::var("CAMPAIR_MOUNT_ROOT")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("/var/lib/campair/card")),
        }
    }
}

impl AppConfig {
    /// Peer hostname derived from the pairing id, used when the request
    /// carries no explicit `slave_host`.
    pub fn peer_host(&self) -> String {
        format!("cam-slave-{}.local", sanitize_pair_id(&self.pair_id))
    }
}

/// mDNS hostnames allow letters/digits/hyphen only; map everything else.
fn sanitize_pair_id(pair_id: &str) -> String {
    let s: String = pair_id
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_lowercase()
            } else {
                '-'
            }
        })
        .collect();
    if s.is_empty() {
        "0".to_string()
    } else {
        s
    }
}

/// Capture-subsystem context: the session gate, the sync primitives, and the
/// hardware collaborators, shared by both endpoint handlers and session tasks.
pub struct CaptureContext {
    pub gate: SessionGate,
    pub trigger: Arc<SyncTrigger>,
    pub camera: Arc<dyn Camera>,
    pub storage: Arc<dyn Storage>,
    pub radio: Arc<dyn NetworkRadio>,
    pub server: Arc<dyn ServerControl>,
    pub sync_pin: Arc<dyn OutputPin>,
    pub trigger_line: Arc<dyn TriggerLine>,
    pub indicator: Arc<dyn OutputPin>,
    pub http: reqwest::Client,
    started_at: Instant,
}

impl CaptureContext {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        camera: Arc<dyn Camera>,
        storage: Arc<dyn Storage>,
        radio: Arc<dyn NetworkRadio>,
        server: Arc<dyn ServerControl>,
        sync_pin: Arc<dyn OutputPin>,
        trigger_line: Arc<dyn TriggerLine>,
        indicator: Arc<dyn OutputPin>,
    ) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .expect("Failed to build HTTP client");

        Self {
            gate: SessionGate::new(),
            trigger: Arc::new(SyncTrigger::new()),
            camera,
            storage,
            radio,
            server,
            sync_pin,
            trigger_line,
            indicator,
            http,
            started_at: Instant::now(),
        }
    }

    /// Monotonic milliseconds since process start, used for frame filenames.
    pub fn uptime_ms(&self) -> u64 {
        self.started_at.elapsed().as_millis() as u64
    }
}

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Device config
    pub config: AppConfig,
    /// Capture subsystem context
    pub ctx: Arc<CaptureContext>,
}
