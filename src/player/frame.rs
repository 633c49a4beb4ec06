//! Rendered image exchanged with player sources.

use crate::core::time::Time;

/// Rendered video frame (RGBA8).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoFrame {
    pub data: Vec<u8>,   // Raw pixel data (RGBA8)
    pub width: u32,
    pub height: u32,
    pub timestamp: Time, // Local timestamp in nanoseconds
}

impl VideoFrame {
    pub fn new(data: Vec<u8>, width: u32, height: u32, timestamp: Time) -> Self {
        Self {
            data,
            width,
            height,
            timestamp,
        }
    }

    /// Transparent black frame of the given size
    pub fn blank(width: u32, height: u32, timestamp: Time) -> Self {
        Self::new(vec![0; (width * height * 4) as usize], width, height, timestamp)
    }
}
