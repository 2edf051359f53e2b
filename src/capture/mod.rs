//! Photo Capture Layer
//!
//! Cameras are reached through the [`Camera`] trait so the scan pipeline
//! does not depend on a particular device API. The CLI uses a file-backed
//! camera that "takes" a photo by reading an image from disk.

pub mod compress;
pub mod frame;

use anyhow::{Context, Result};
use async_trait::async_trait;
use std::path::PathBuf;

pub use compress::{compress_frame, CompressedImage};
pub use frame::CapturedFrame;

/// A source of band photos
#[async_trait]
pub trait Camera: Send + Sync {
    /// Take a single photo
    async fn take_photo(&self) -> Result<CapturedFrame>;
}

/// Camera that returns the contents of an image file
#[derive(Debug, Clone)]
pub struct FileCamera {
    path: PathBuf,
}

impl FileCamera {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl Camera for FileCamera {
    async fn take_photo(&self) -> Result<CapturedFrame> {
        let data = tokio::fs::read(&self.path)
            .await
            .with_context(|| format!("Failed to read photo {:?}", self.path))?;
        let frame = CapturedFrame::new(data);
        if frame.is_empty() {
            anyhow::bail!("Photo {:?} is empty", self.path);
        }
        Ok(frame)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[tokio::test]
    async fn test_file_camera_reads_photo() {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(&[0xFF, 0xD8, 0xFF]).unwrap();

        let camera = FileCamera::new(temp_file.path());
        let frame = camera.take_photo().await.unwrap();
        assert_eq!(frame.data, vec![0xFF, 0xD8, 0xFF]);
    }

    #[tokio::test]
    async fn test_file_camera_missing_file() {
        let camera = FileCamera::new("/nonexistent/band.jpg");
        assert!(camera.take_photo().await.is_err());
    }

    #[tokio::test]
    async fn test_file_camera_empty_file() {
        let temp_file = NamedTempFile::new().unwrap();
        let camera = FileCamera::new(temp_file.path());
        assert!(camera.take_photo().await.is_err());
    }
}
