//! Session gate - single-admission control for capture sessions
//!
//! One boolean, process-wide. The trigger endpoints admit through
//! [`SessionGate::try_begin`] before spawning a session task; the task clears
//! the gate as its very last action on every exit path. The maintenance loop
//! polls [`SessionGate::is_active`] and idles while a session runs, so no
//! unrelated subsystem touches the radio, the storage mount, or the sync
//! pins mid-capture.

use std::sync::atomic::{AtomicBool, Ordering};

/// Process-wide capture-session admission flag
#[derive(Debug, Default)]
pub struct SessionGate {
    active: AtomicBool,
}

impl SessionGate {
    pub fn new() -> Self {
        Self {
            active: AtomicBool::new(false),
        }
    }

    /// Atomically claim the gate. Returns `false` when a session already
    /// holds it; the caller must then reject the request.
    pub fn try_begin(&self) -> bool {
        self.active
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Release the gate. Safe to call concurrently with `try_begin`.
    pub fn end(&self) {
        self.active.store(false, Ordering::Release);
    }

    /// Whether a session currently holds the gate.
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }
}
