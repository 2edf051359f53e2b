//! Application Configuration
//!
//! Scanner settings stored in TOML format.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable consulted when no API key is configured
pub const DEFAULT_API_KEY_ENV: &str = "BAND_SCANNER_VISION_API_KEY";

/// Application settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Feature-extraction service settings
    pub vision: VisionConfig,
    /// Photo compression settings
    pub compression: CompressionConfig,
    /// Catalog lookup settings
    pub catalog: CatalogConfig,
    /// Scan pipeline settings
    pub scanner: ScannerConfig,
}

/// Feature-extraction service settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VisionConfig {
    /// Images-annotate endpoint
    pub endpoint: String,
    /// API key; falls back to the `api_key_env` variable when unset
    pub api_key: Option<String>,
    /// Environment variable holding the API key
    pub api_key_env: String,
    /// Hard budget for one analysis request, in seconds
    pub timeout_secs: u64,
    /// Maximum logo annotations requested
    pub max_logo_results: u32,
}

impl Default for VisionConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://vision.googleapis.com/v1/images:annotate".to_string(),
            api_key: None,
            api_key_env: DEFAULT_API_KEY_ENV.to_string(),
            timeout_secs: 12,
            max_logo_results: 5,
        }
    }
}

impl VisionConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Configured API key, or the one from the environment
    pub fn resolve_api_key(&self) -> Option<String> {
        self.api_key
            .clone()
            .filter(|key| !key.trim().is_empty())
            .or_else(|| std::env::var(&self.api_key_env).ok())
            .filter(|key| !key.trim().is_empty())
    }
}

/// Photo compression settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CompressionConfig {
    /// Longest edge of the uploaded image in pixels
    pub max_dimension: u32,
    /// JPEG quality (1-100)
    pub jpeg_quality: u8,
}

impl Default for CompressionConfig {
    fn default() -> Self {
        Self {
            max_dimension: 1024,
            jpeg_quality: 70,
        }
    }
}

/// Catalog lookup settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    /// JSON catalog file; defaults to `catalog.json` in the data directory
    pub path: Option<PathBuf>,
    /// Records fetched per brand lookup
    pub brand_lookup_limit: usize,
    /// Records fetched per prefix-range lookup
    pub prefix_lookup_limit: usize,
    /// Leading tokens used for prefix lookups
    pub prefix_token_count: usize,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            path: None,
            brand_lookup_limit: 25,
            prefix_lookup_limit: 10,
            prefix_token_count: 3,
        }
    }
}

/// Scan pipeline settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScannerConfig {
    /// Barcodes are ignored for this long after a scan is cancelled
    pub barcode_cooldown_ms: u64,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            barcode_cooldown_ms: 1500,
        }
    }
}

impl ScannerConfig {
    pub fn barcode_cooldown(&self) -> Duration {
        Duration::from_millis(self.barcode_cooldown_ms)
    }
}

/// Load configuration from file
pub fn load_config(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config {:?}", path))?;
    let config: AppConfig = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config {:?}", path))?;
    Ok(config)
}

/// Save configuration to file
pub fn save_config(config: &AppConfig, path: &Path) -> Result<()> {
    let content = toml::to_string_pretty(config)?;
    std::fs::write(path, content)?;
    Ok(())
}
