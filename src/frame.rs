// Frame and verdict types shared across the pipeline.

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

/// One captured frame. Created once per tick, read-only afterwards, and
/// shared via `Arc` between the pre-roll buffer, classifier, and recorder.
#[derive(Debug, Clone)]
pub struct Frame {
    pub seq: u64,
    pub captured_at: DateTime<Local>,
    pub width: u32,
    pub height: u32,
    /// Packed BGR24 pixel data, `width * height * 3` bytes.
    pub data: Vec<u8>,
}

impl Frame {
    pub fn new(seq: u64, captured_at: DateTime<Local>, width: u32, height: u32, data: Vec<u8>) -> Self {
        debug_assert_eq!(data.len(), Self::byte_len(width, height));
        Self { seq, captured_at, width, height, data }
    }

    /// Byte length of a packed BGR24 frame of the given dimensions.
    pub fn byte_len(width: u32, height: u32) -> usize {
        width as usize * height as usize * 3
    }
}

/// Axis-aligned motion region in frame pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Region {
    pub x: u32,
    pub y: u32,
    pub w: u32,
    pub h: u32,
}

impl Region {
    pub fn area(&self) -> u32 {
        self.w * self.h
    }
}

/// Per-frame classifier output, consumed within the tick that produced it.
/// Only `is_motion` drives control flow; regions are for display layers.
#[derive(Debug, Clone, Default)]
pub struct DetectionVerdict {
    pub is_motion: bool,
    pub regions: Vec<Region>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_byte_len() {
        assert_eq!(Frame::byte_len(720, 480), 720 * 480 * 3);
        assert_eq!(Frame::byte_len(0, 480), 0);
    }

    #[test]
    fn test_region_area() {
        let r = Region { x: 10, y: 20, w: 30, h: 50 };
        assert_eq!(r.area(), 1500);
    }
}
