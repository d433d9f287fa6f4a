//! Per-session flags shared between the event loop and save workers.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Local};

/// Mutable state of one secure matrix session. Never persisted.
#[derive(Debug, Default)]
pub struct SessionState {
    dirty: AtomicBool,
    edits: AtomicU64,
    logging_out: AtomicBool,
    security_initialized: AtomicBool,
    save_in_flight: AtomicBool,
    last_update: Mutex<Option<DateTime<Local>>>,
}

impl SessionState {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn mark_dirty(&self) {
        self.edits.fetch_add(1, Ordering::SeqCst);
        self.dirty.store(true, Ordering::SeqCst);
    }

    /// Counter bumped by every [`mark_dirty`](Self::mark_dirty).
    pub fn edit_generation(&self) -> u64 {
        self.edits.load(Ordering::SeqCst)
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty.load(Ordering::SeqCst)
    }

    pub fn clear_dirty(&self) {
        self.dirty.store(false, Ordering::SeqCst);
    }

    /// Clear dirty only if nothing was edited since `generation` was read.
    /// A save that raced with an edit leaves the newer edit pending.
    pub fn clear_dirty_since(&self, generation: u64) -> bool {
        if self.edit_generation() != generation {
            return false;
        }
        self.clear_dirty();
        true
    }

    /// Claim the logout sequence. Only the first caller gets `true`.
    pub fn begin_logout(&self) -> bool {
        self.logging_out
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }

    pub fn is_logging_out(&self) -> bool {
        self.logging_out.load(Ordering::SeqCst)
    }

    /// Returns `true` the first time only.
    pub fn mark_security_initialized(&self) -> bool {
        self.security_initialized
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }

    pub fn is_security_initialized(&self) -> bool {
        self.security_initialized.load(Ordering::SeqCst)
    }

    /// Claim the single save slot. `None` while another save is in flight.
    pub fn begin_save(self: &Arc<Self>) -> Option<SaveTicket> {
        self.save_in_flight
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .ok()
            .map(|_| SaveTicket {
                state: Arc::clone(self),
            })
    }

    /// Drives the "Saving..." affordance.
    pub fn is_saving(&self) -> bool {
        self.save_in_flight.load(Ordering::SeqCst)
    }

    pub fn stamp_update(&self, at: DateTime<Local>) {
        if let Ok(mut last) = self.last_update.lock() {
            *last = Some(at);
        }
    }

    pub fn last_update(&self) -> Option<DateTime<Local>> {
        self.last_update.lock().ok().and_then(|last| *last)
    }
}

/// Proof that a save holds the in-flight slot. Dropping it releases the
/// slot, on success, failure, or a worker that never reports back.
#[derive(Debug)]
pub struct SaveTicket {
    state: Arc<SessionState>,
}

impl Drop for SaveTicket {
    fn drop(&mut self) {
        self.state.save_in_flight.store(false, Ordering::SeqCst);
    }
}
