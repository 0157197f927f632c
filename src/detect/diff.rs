// Frame-differencing motion classifier.
//
// Grayscale-differences consecutive frames, counts changed pixels per
// block of a coarse grid, and merges hot blocks into bounding regions.
// Regions smaller than `min_region_area` are discarded, which filters
// sensor noise and small flicker the same way a contour-area threshold
// would.

use super::MotionClassifier;
use crate::frame::{DetectionVerdict, Frame, Region};

/// Grid block edge in pixels.
const BLOCK: u32 = 16;
/// Per-pixel luma delta counted as "changed".
const PIXEL_DELTA_THRESHOLD: u8 = 25;
/// Fraction of changed pixels that marks a block as hot.
const BLOCK_CHANGED_RATIO: f32 = 0.2;

pub struct FrameDiffClassifier {
    min_region_area: u32,
    prev_luma: Option<Vec<u8>>,
    width: u32,
    height: u32,
}

impl FrameDiffClassifier {
    pub fn new(min_region_area: u32) -> Self {
        Self {
            min_region_area,
            prev_luma: None,
            width: 0,
            height: 0,
        }
    }

    /// BT.601-ish luma from packed BGR24.
    fn luma(frame: &Frame) -> Vec<u8> {
        frame
            .data
            .chunks_exact(3)
            .map(|px| {
                let (b, g, r) = (px[0] as u16, px[1] as u16, px[2] as u16);
                ((r * 77 + g * 150 + b * 29) >> 8) as u8
            })
            .collect()
    }

    /// Merge hot blocks into per-component bounding regions (4-connected).
    fn regions_from_hot_blocks(&self, hot: &[bool], bx: usize, by: usize) -> Vec<Region> {
        let mut seen = vec![false; hot.len()];
        let mut regions = Vec::new();

        for start in 0..hot.len() {
            if !hot[start] || seen[start] {
                continue;
            }
            let (mut min_x, mut min_y) = (start % bx, start / bx);
            let (mut max_x, mut max_y) = (min_x, min_y);
            let mut queue = vec![start];
            seen[start] = true;
            while let Some(idx) = queue.pop() {
                let (cx, cy) = (idx % bx, idx / bx);
                min_x = min_x.min(cx);
                max_x = max_x.max(cx);
                min_y = min_y.min(cy);
                max_y = max_y.max(cy);
                let mut neighbors = Vec::with_capacity(4);
                if cx > 0 {
                    neighbors.push(idx - 1);
                }
                if cx + 1 < bx {
                    neighbors.push(idx + 1);
                }
                if cy > 0 {
                    neighbors.push(idx - bx);
                }
                if cy + 1 < by {
                    neighbors.push(idx + bx);
                }
                for n in neighbors {
                    if hot[n] && !seen[n] {
                        seen[n] = true;
                        queue.push(n);
                    }
                }
            }

            let x = min_x as u32 * BLOCK;
            let y = min_y as u32 * BLOCK;
            let w = ((max_x as u32 + 1) * BLOCK).min(self.width) - x;
            let h = ((max_y as u32 + 1) * BLOCK).min(self.height) - y;
            let region = Region { x, y, w, h };
            if region.area() >= self.min_region_area {
                regions.push(region);
            }
        }

        regions
    }
}

impl MotionClassifier for FrameDiffClassifier {
    fn classify(&mut self, frame: &Frame) -> DetectionVerdict {
        let luma = Self::luma(frame);

        if frame.width != self.width || frame.height != self.height {
            // First frame, or the source changed geometry: re-baseline.
            self.width = frame.width;
            self.height = frame.height;
            self.prev_luma = Some(luma);
            return DetectionVerdict::default();
        }

        let prev = match self.prev_luma.replace(luma) {
            Some(p) => p,
            None => return DetectionVerdict::default(),
        };
        let curr = self.prev_luma.as_deref().unwrap_or(&[]);

        let w = self.width as usize;
        let bx = (self.width as usize + BLOCK as usize - 1) / BLOCK as usize;
        let by = (self.height as usize + BLOCK as usize - 1) / BLOCK as usize;
        let mut hot = vec![false; bx * by];

        for (bi, hot_flag) in hot.iter_mut().enumerate() {
            let bx0 = (bi % bx) * BLOCK as usize;
            let by0 = (bi / bx) * BLOCK as usize;
            let bx1 = (bx0 + BLOCK as usize).min(w);
            let by1 = (by0 + BLOCK as usize).min(self.height as usize);

            let mut changed = 0u32;
            let total = ((bx1 - bx0) * (by1 - by0)) as u32;
            for y in by0..by1 {
                let row = y * w;
                for x in bx0..bx1 {
                    let delta = curr[row + x].abs_diff(prev[row + x]);
                    if delta > PIXEL_DELTA_THRESHOLD {
                        changed += 1;
                    }
                }
            }
            *hot_flag = total > 0 && changed as f32 / total as f32 >= BLOCK_CHANGED_RATIO;
        }

        let regions = self.regions_from_hot_blocks(&hot, bx, by);
        DetectionVerdict { is_motion: !regions.is_empty(), regions }
    }
}
