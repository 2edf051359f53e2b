//! Barcode admission
//!
//! A decoded barcode skips photo analysis and goes straight to manual search.
//! Barcodes are ignored while a capture is running and for a short cooldown
//! after a cancellation, so the code still in view when the user backs out
//! does not immediately reopen search.

use std::time::{Duration, Instant};

/// Decides whether a barcode read should be acted on
#[derive(Debug, Clone, Copy)]
pub struct BarcodeGate {
    cooldown: Duration,
}

impl BarcodeGate {
    pub fn new(cooldown: Duration) -> Self {
        Self { cooldown }
    }

    /// Whether a barcode seen at `now` is admitted
    pub fn allows(&self, busy: bool, last_cancelled_at: Option<Instant>, now: Instant) -> bool {
        if busy {
            return false;
        }
        match last_cancelled_at {
            Some(cancelled_at) => now.saturating_duration_since(cancelled_at) >= self.cooldown,
            None => true,
        }
    }
}
