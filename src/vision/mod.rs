//! Vision Layer
//!
//! Logo and text extraction for band photos. The extraction itself happens
//! in an external service reached through [`FeatureExtractor`]; this module
//! defines the request features, the annotations that come back and the
//! failure taxonomy.

pub mod cloud;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::capture::CompressedImage;
use crate::shared::ErrorCategory;

pub use cloud::CloudVisionClient;

/// Features requested from the extraction service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FeatureType {
    LogoDetection,
    TextDetection,
}

/// Features requested for every band scan
pub const BAND_FEATURES: [FeatureType; 2] =
    [FeatureType::LogoDetection, FeatureType::TextDetection];

/// A detected brand logo
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogoAnnotation {
    /// Logo label, usually the brand name
    pub description: String,
    /// Detection confidence (0.0 - 1.0)
    #[serde(default)]
    pub score: f32,
}

/// A block of detected text
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextAnnotation {
    pub description: String,
}

/// Signals extracted from one band photo
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BandAnnotations {
    /// Logo annotations in service order
    pub logos: Vec<LogoAnnotation>,
    /// Text annotations; the first entry holds the full text block
    pub text_annotations: Vec<TextAnnotation>,
}

impl BandAnnotations {
    /// Highest-confidence logo with a non-empty label; earliest wins ties
    pub fn best_logo(&self) -> Option<&LogoAnnotation> {
        let mut best: Option<&LogoAnnotation> = None;
        for logo in self.logos.iter().filter(|l| !l.description.trim().is_empty()) {
            match best {
                Some(current) if current.score >= logo.score => {}
                _ => best = Some(logo),
            }
        }
        best
    }

    /// Full extracted text block, when any text was detected
    pub fn full_text(&self) -> Option<&str> {
        self.text_annotations
            .first()
            .map(|annotation| annotation.description.trim())
            .filter(|text| !text.is_empty())
    }

    /// True when neither a logo nor text was detected
    pub fn is_empty(&self) -> bool {
        self.best_logo().is_none() && self.full_text().is_none()
    }
}

/// Feature-extraction failures
#[derive(Debug, Error)]
pub enum VisionError {
    #[error("vision request timed out")]
    Timeout,

    #[error("vision service unreachable: {0}")]
    Network(String),

    #[error("vision service rejected credentials: {0}")]
    Unauthorized(String),

    #[error("vision service error {code}: {message}")]
    Service { code: u16, message: String },

    #[error("invalid vision response: {0}")]
    InvalidResponse(String),
}

impl VisionError {
    /// User-facing category for this failure
    pub fn category(&self) -> ErrorCategory {
        match self {
            VisionError::Timeout => ErrorCategory::Timeout,
            VisionError::Network(_) => ErrorCategory::Network,
            VisionError::Service { code, .. } if *code >= 500 => ErrorCategory::Network,
            VisionError::Unauthorized(_)
            | VisionError::Service { .. }
            | VisionError::InvalidResponse(_) => ErrorCategory::Generic,
        }
    }
}

impl From<reqwest::Error> for VisionError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            VisionError::Timeout
        } else if err.is_decode() {
            VisionError::InvalidResponse(err.to_string())
        } else {
            VisionError::Network(err.to_string())
        }
    }
}

/// Logo/text extraction service
#[async_trait]
pub trait FeatureExtractor: Send + Sync {
    /// Run the requested features on a compressed photo
    async fn annotate(
        &self,
        image: &CompressedImage,
        features: &[FeatureType],
    ) -> Result<BandAnnotations, VisionError>;
}
