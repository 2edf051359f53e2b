//! Operation tracking for scans
//!
//! Every capture gets a [`ScanOperation`] carrying a sequence number and an
//! abort token. The [`OperationTracker`] holds the current sequence; an
//! operation whose sequence is no longer current, or that was cancelled, is
//! stale and must not touch the scan state or deliver an outcome.

use parking_lot::Mutex;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::barcode::BarcodeGate;
use super::state::ScanState;

/// Handle for one capture operation
#[derive(Debug, Clone)]
pub struct ScanOperation {
    seq: u64,
    abort: CancellationToken,
}

impl ScanOperation {
    pub fn seq(&self) -> u64 {
        self.seq
    }

    /// Fires when the operation is explicitly cancelled
    pub fn abort_signal(&self) -> &CancellationToken {
        &self.abort
    }
}

#[derive(Debug, Default)]
struct TrackerState {
    current_seq: u64,
    cancelled: bool,
    abort: CancellationToken,
    in_flight: bool,
    last_cancelled_at: Option<Instant>,
    scan_state: ScanState,
}

/// Current-operation record and observable scan state
#[derive(Debug, Default)]
pub struct OperationTracker {
    state: Mutex<TrackerState>,
}

impl OperationTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a new operation, superseding any previous one
    ///
    /// The previous operation's abort token is left alone; it notices it is
    /// stale at its next check.
    pub fn begin(&self) -> ScanOperation {
        let mut state = self.state.lock();
        state.current_seq += 1;
        state.cancelled = false;
        state.abort = CancellationToken::new();
        state.in_flight = true;
        state.scan_state = ScanState::Idle;

        ScanOperation {
            seq: state.current_seq,
            abort: state.abort.clone(),
        }
    }

    /// Cancel the in-flight operation
    ///
    /// Returns false when nothing was running, so repeated calls are no-ops.
    pub fn cancel(&self) -> bool {
        let mut state = self.state.lock();
        if !state.in_flight {
            return false;
        }

        state.cancelled = true;
        state.current_seq += 1;
        state.abort.cancel();
        state.in_flight = false;
        state.scan_state = ScanState::Idle;
        state.last_cancelled_at = Some(Instant::now());

        debug!("Cancelled scan, sequence now {}", state.current_seq);
        true
    }

    /// Whether `op` has been superseded or cancelled
    pub fn is_stale(&self, op: &ScanOperation) -> bool {
        let state = self.state.lock();
        Self::stale(&state, op)
    }

    fn stale(state: &TrackerState, op: &ScanOperation) -> bool {
        op.seq != state.current_seq || state.cancelled || op.abort.is_cancelled()
    }

    /// Mark `op` as done; ignored if it is no longer current
    pub fn finish(&self, op: &ScanOperation) {
        let mut state = self.state.lock();
        if !Self::stale(&state, op) {
            state.in_flight = false;
        }
    }

    /// Run `f` on the scan state only if `op` is still current
    ///
    /// The staleness check and `f` happen under one lock, so a cancellation
    /// cannot slip in between them.
    pub fn with_current<R>(
        &self,
        op: &ScanOperation,
        f: impl FnOnce(&mut ScanState) -> R,
    ) -> Option<R> {
        let mut state = self.state.lock();
        if Self::stale(&state, op) {
            return None;
        }
        Some(f(&mut state.scan_state))
    }

    pub fn scan_state(&self) -> ScanState {
        self.state.lock().scan_state
    }

    /// Whether a capture is running
    pub fn is_busy(&self) -> bool {
        self.state.lock().in_flight
    }

    /// Run `deliver` if a barcode seen at `now` should be acted on
    ///
    /// The check and `deliver` share one lock, so a scan started
    /// concurrently cannot overlap with the barcode outcome.
    pub fn admit_barcode(
        &self,
        gate: &BarcodeGate,
        now: Instant,
        deliver: impl FnOnce(),
    ) -> bool {
        let state = self.state.lock();
        if !gate.allows(state.in_flight, state.last_cancelled_at, now) {
            return false;
        }
        deliver();
        true
    }
}
