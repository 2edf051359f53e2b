//! Scan state machine
//!
//! Pure transition function from (state, event) to the next state and the
//! outcome to surface, if any. The pipeline applies transitions only while
//! its operation is current, so this module knows nothing about staleness.

use crate::catalog::CigarRecord;
use crate::shared::{ErrorCategory, ScanMessage};

/// Scan lifecycle states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScanState {
    /// Camera live, ready for a capture or a barcode
    #[default]
    Idle,
    Capturing,
    Compressing,
    /// Waiting on the feature-extraction service
    Analyzing,
    /// Resolving logo/text signals against the catalog
    Matching,
    Resolved,
    FallbackSearch,
    Failed,
}

/// Inputs to the state machine
#[derive(Debug, Clone, PartialEq)]
pub enum ScanEvent {
    CaptureRequested,
    PhotoCaptured,
    PhotoCompressed,
    /// The extraction service answered
    SignalsExtracted,
    CigarMatched(CigarRecord),
    /// Signals were found but nothing in the catalog matched
    MatchMissed {
        prefill: String,
        ocr_clues: Option<String>,
    },
    Failed {
        category: ErrorCategory,
        fallback_prefill: Option<String>,
    },
    /// The terminal outcome was handed to the caller
    OutcomeDelivered,
    Cancelled,
}

/// Result of applying an event
#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    pub next: ScanState,
    pub outcome: Option<ScanMessage>,
}

impl Transition {
    fn to(next: ScanState) -> Self {
        Self { next, outcome: None }
    }

    fn emit(next: ScanState, outcome: ScanMessage) -> Self {
        Self {
            next,
            outcome: Some(outcome),
        }
    }
}

/// Apply an event to a state
///
/// Events that make no sense in the current state leave it unchanged and
/// produce no outcome.
pub fn transition(state: ScanState, event: ScanEvent) -> Transition {
    use ScanState::*;

    match (state, event) {
        (_, ScanEvent::Cancelled) => Transition::to(Idle),

        (Idle, ScanEvent::CaptureRequested) => Transition::to(Capturing),
        (Capturing, ScanEvent::PhotoCaptured) => Transition::to(Compressing),
        (Compressing, ScanEvent::PhotoCompressed) => Transition::to(Analyzing),
        (Analyzing, ScanEvent::SignalsExtracted) => Transition::to(Matching),

        (Matching, ScanEvent::CigarMatched(record)) => {
            Transition::emit(Resolved, ScanMessage::Resolved(record))
        }
        (Matching, ScanEvent::MatchMissed { prefill, ocr_clues }) => {
            Transition::emit(FallbackSearch, ScanMessage::Fallback { prefill, ocr_clues })
        }
        (
            Capturing | Compressing | Analyzing | Matching,
            ScanEvent::Failed {
                category,
                fallback_prefill,
            },
        ) => Transition::emit(Failed, ScanMessage::failed(category, fallback_prefill)),

        (Resolved | FallbackSearch | Failed, ScanEvent::OutcomeDelivered) => Transition::to(Idle),

        (state, _) => Transition::to(state),
    }
}
