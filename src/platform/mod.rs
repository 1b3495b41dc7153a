//! Host-side collaborator implementations
//!
//! Development builds run against these: a synthetic camera, a logged no-op
//! radio, and a loopback sync bus that feeds the master's pulse straight
//! into the local trigger line. Device builds swap in real backends behind
//! the same traits; nothing in the capture subsystem changes.

use crate::camera::{Camera, FrameBuf};
use crate::error::Result;
use crate::radio::NetworkRadio;
use crate::seqcap::trigger::{OutputPin, SyncTrigger, TriggerLine};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

/// Synthetic camera producing JPEG-stub frames.
#[derive(Default)]
pub struct SimCamera {
    controls: Mutex<HashMap<String, i32>>,
    frame_no: AtomicU32,
    outstanding: AtomicBool,
}

impl SimCamera {
    pub fn new() -> Self {
        Self::default()
    }

    /// Last applied value of a named control, if any.
    pub fn ctrl_get(&self, name: &str) -> Option<i32> {
        self.controls.lock().unwrap().get(name).copied()
    }
}

#[async_trait]
impl Camera for SimCamera {
    async fn frame_grab(&self) -> Result<FrameBuf> {
        let n = self.frame_no.fetch_add(1, Ordering::SeqCst);
        self.outstanding.store(true, Ordering::SeqCst);
        // JPEG SOI marker followed by filler, recognizable in a hexdump
        let mut data = vec![0xFF, 0xD8];
        data.extend_from_slice(&n.to_be_bytes());
        data.resize(4096, 0xA5);
        Ok(FrameBuf { data })
    }

    async fn frame_dispose(&self) {
        self.outstanding.store(false, Ordering::SeqCst);
    }

    async fn ctrl_set(&self, name: &str, value: i32) -> Result<()> {
        tracing::debug!(control = name, value, "sim camera control set");
        self.controls
            .lock()
            .unwrap()
            .insert(name.to_string(), value);
        Ok(())
    }
}

/// Radio control for hosts whose network is managed elsewhere; state is
/// tracked and logged, nothing is actually toggled.
#[derive(Default)]
pub struct HostRadio {
    running: AtomicBool,
}

impl HostRadio {
    pub fn new() -> Self {
        Self {
            running: AtomicBool::new(true),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl NetworkRadio for HostRadio {
    async fn stop(&self) -> Result<()> {
        self.running.store(false, Ordering::SeqCst);
        tracing::info!("radio stopped");
        Ok(())
    }

    async fn start(&self) -> Result<()> {
        self.running.store(true, Ordering::SeqCst);
        tracing::info!("radio started");
        Ok(())
    }

    async fn connect(&self) -> Result<()> {
        tracing::info!("radio reconnected");
        Ok(())
    }
}

/// Loopback sync bus: the master's output pin edge feeds the local trigger
/// line, so a single host can exercise the full pulse protocol.
#[derive(Default)]
pub struct LoopbackSync {
    armed: Mutex<Option<Arc<SyncTrigger>>>,
    level: AtomicBool,
}

impl LoopbackSync {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }
}

impl OutputPin for LoopbackSync {
    fn set_high(&self) {
        // rising edge only
        if !self.level.swap(true, Ordering::SeqCst) {
            if let Some(trigger) = self.armed.lock().unwrap().as_ref() {
                trigger.signal();
            }
        }
    }

    fn set_low(&self) {
        self.level.store(false, Ordering::SeqCst);
    }
}

impl TriggerLine for LoopbackSync {
    fn arm(&self, trigger: Arc<SyncTrigger>) -> Result<()> {
        *self.armed.lock().unwrap() = Some(trigger);
        Ok(())
    }

    fn disarm(&self) {
        *self.armed.lock().unwrap() = None;
    }
}

/// Output pin that only logs; stands in for the indicator LED.
#[derive(Default)]
pub struct LogPin {
    name: &'static str,
}

impl LogPin {
    pub fn new(name: &'static str) -> Self {
        Self { name }
    }
}

impl OutputPin for LogPin {
    fn set_high(&self) {
        tracing::debug!(pin = self.name, "high");
    }

    fn set_low(&self) {
        tracing::debug!(pin = self.name, "low");
    }
}
