//! Frame data structures for captured band photos

use std::time::Instant;

/// A photo taken by the camera
#[derive(Debug, Clone)]
pub struct CapturedFrame {
    /// Encoded image bytes (JPEG, PNG, ...) as delivered by the camera
    pub data: Vec<u8>,
    /// Timestamp when the photo was taken
    pub timestamp: Instant,
}

impl CapturedFrame {
    /// Create a new captured frame
    pub fn new(data: Vec<u8>) -> Self {
        Self {
            data,
            timestamp: Instant::now(),
        }
    }

    /// Size of the encoded photo in bytes
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}
