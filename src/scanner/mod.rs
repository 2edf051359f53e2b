//! Band Scanner
//!
//! The capture pipeline and the pieces it is built from:
//! - `state` - pure scan state machine
//! - `operation` - sequence/cancellation tracking per capture
//! - `barcode` - barcode admission while scanning and after cancel
//! - `pipeline` - the async driver tying camera, vision and catalog together

pub mod barcode;
pub mod operation;
pub mod pipeline;
pub mod state;

pub use barcode::BarcodeGate;
pub use operation::{OperationTracker, ScanOperation};
pub use pipeline::{PipelineSettings, ScanPipeline};
pub use state::{transition, ScanEvent, ScanState, Transition};
