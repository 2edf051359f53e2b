//! Message types sent from the scan pipeline to its caller

use crate::catalog::CigarRecord;

/// Failure categories surfaced to the user
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// The feature-extraction call exceeded its budget
    Timeout,
    /// The feature-extraction service could not be reached
    Network,
    /// The catalog rejected the query
    Permission,
    /// Neither a logo nor any text was detected
    NoSignal,
    /// Anything else (camera, image decoding, malformed responses)
    Generic,
}

impl ErrorCategory {
    /// Message shown to the user
    pub fn user_message(&self) -> &'static str {
        match self {
            ErrorCategory::Timeout => {
                "The band analysis took too long. Try again or search manually."
            }
            ErrorCategory::Network => {
                "Couldn't reach the band analysis service. Check your connection and try again."
            }
            ErrorCategory::Permission => {
                "Cannot read the cigar catalog. You can still search manually."
            }
            ErrorCategory::NoSignal => {
                "No logo or text was found on the band. Try a closer, well-lit photo."
            }
            ErrorCategory::Generic => "Something went wrong while scanning. Please try again.",
        }
    }

    /// Whether retrying the same scan may succeed
    pub fn is_retryable(&self) -> bool {
        matches!(self, ErrorCategory::Timeout | ErrorCategory::Network)
    }
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ErrorCategory::Timeout => "timeout",
            ErrorCategory::Network => "network",
            ErrorCategory::Permission => "permission",
            ErrorCategory::NoSignal => "no-signal",
            ErrorCategory::Generic => "generic",
        };
        f.write_str(name)
    }
}

/// Terminal outcome of a scan, or a barcode routed to manual search
#[derive(Debug, Clone, PartialEq)]
pub enum ScanMessage {
    /// The band was matched to a catalog record
    Resolved(CigarRecord),
    /// No match; open manual search with the best guess
    Fallback {
        prefill: String,
        /// Raw OCR text, when any was detected
        ocr_clues: Option<String>,
    },
    /// The scan failed
    Failed {
        category: ErrorCategory,
        message: String,
        /// Best guess for manual search, when one is still worth offering
        fallback_prefill: Option<String>,
    },
}

impl ScanMessage {
    /// Failure message for a category, using its user-facing text
    pub fn failed(category: ErrorCategory, fallback_prefill: Option<String>) -> Self {
        ScanMessage::Failed {
            category,
            message: category.user_message().to_string(),
            fallback_prefill,
        }
    }
}
