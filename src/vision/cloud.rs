//! HTTP client for an images-annotate style vision API

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use super::{
    BandAnnotations, FeatureExtractor, FeatureType, LogoAnnotation, TextAnnotation, VisionError,
};
use crate::capture::CompressedImage;
use crate::config::VisionConfig;

#[derive(Debug, Serialize)]
struct AnnotateRequest {
    requests: Vec<ImageRequest>,
}

#[derive(Debug, Serialize)]
struct ImageRequest {
    image: ImageContent,
    features: Vec<FeatureRequest>,
}

#[derive(Debug, Serialize)]
struct ImageContent {
    content: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct FeatureRequest {
    #[serde(rename = "type")]
    kind: FeatureType,
    max_results: u32,
}

#[derive(Debug, Default, Deserialize)]
struct AnnotateResponse {
    #[serde(default)]
    responses: Vec<ImageResponse>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ImageResponse {
    #[serde(default)]
    logo_annotations: Vec<LogoAnnotation>,
    #[serde(default)]
    text_annotations: Vec<TextAnnotation>,
    #[serde(default)]
    error: Option<ServiceStatus>,
}

#[derive(Debug, Deserialize)]
struct ServiceStatus {
    #[serde(default)]
    code: u16,
    #[serde(default)]
    message: String,
}

/// Vision API client
pub struct CloudVisionClient {
    client: Client,
    endpoint: String,
    api_key: Option<String>,
    max_logo_results: u32,
}

impl CloudVisionClient {
    /// Create a client from configuration
    ///
    /// The HTTP timeout sits slightly above the pipeline's analysis budget;
    /// the pipeline enforces the real deadline.
    pub fn new(config: &VisionConfig) -> Result<Self, VisionError> {
        let client = Client::builder()
            .timeout(config.timeout() + Duration::from_secs(3))
            .user_agent(concat!("band-scanner/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| VisionError::Network(format!("Failed to create HTTP client: {}", e)))?;

        let api_key = config.resolve_api_key();
        if api_key.is_none() {
            warn!(
                "No vision API key configured (set {} or vision.api_key)",
                config.api_key_env
            );
        }

        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
            api_key,
            max_logo_results: config.max_logo_results,
        })
    }

    fn max_results(&self, feature: FeatureType) -> u32 {
        match feature {
            FeatureType::LogoDetection => self.max_logo_results,
            // The first text annotation already carries the full block
            FeatureType::TextDetection => 1,
        }
    }

    fn build_request(&self, image: &CompressedImage, features: &[FeatureType]) -> AnnotateRequest {
        AnnotateRequest {
            requests: vec![ImageRequest {
                image: ImageContent {
                    content: image.to_base64(),
                },
                features: features
                    .iter()
                    .map(|&kind| FeatureRequest {
                        kind,
                        max_results: self.max_results(kind),
                    })
                    .collect(),
            }],
        }
    }
}

#[async_trait]
impl FeatureExtractor for CloudVisionClient {
    async fn annotate(
        &self,
        image: &CompressedImage,
        features: &[FeatureType],
    ) -> Result<BandAnnotations, VisionError> {
        let start = Instant::now();
        let body = self.build_request(image, features);

        let mut request = self.client.post(&self.endpoint).json(&body);
        if let Some(key) = &self.api_key {
            request = request.query(&[("key", key)]);
        }

        let response = request.send().await?;
        let status = response.status();

        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            let message = response.text().await.unwrap_or_default();
            return Err(VisionError::Unauthorized(message));
        }
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(VisionError::Service {
                code: status.as_u16(),
                message,
            });
        }

        let text = response.text().await?;
        let annotations = parse_annotations(&text)?;

        debug!(
            "Vision analysis complete in {:?}: {} logos, {} text annotations",
            start.elapsed(),
            annotations.logos.len(),
            annotations.text_annotations.len()
        );

        Ok(annotations)
    }
}

/// Parse an images-annotate response body for a single image
fn parse_annotations(body: &str) -> Result<BandAnnotations, VisionError> {
    let parsed: AnnotateResponse =
        serde_json::from_str(body).map_err(|e| VisionError::InvalidResponse(e.to_string()))?;

    let Some(first) = parsed.responses.into_iter().next() else {
        return Ok(BandAnnotations::default());
    };

    if let Some(error) = first.error {
        if error.code != 0 {
            return Err(VisionError::Service {
                code: error.code,
                message: error.message,
            });
        }
    }

    Ok(BandAnnotations {
        logos: first.logo_annotations,
        text_annotations: first.text_annotations,
    })
}
