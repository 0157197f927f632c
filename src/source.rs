// Frame acquisition seam.
//
// Real camera capture lives outside this crate; the pipeline only needs a
// pull-based producer of fixed-geometry frames at a nominal rate.

use std::io::{ErrorKind, Read};
use std::sync::Arc;

use chrono::Local;

use crate::constants::DEFAULT_FPS;
use crate::error::{Result, SentryCamError};
use crate::frame::Frame;

/// One pull from a source.
pub enum SourceTick {
    Frame(Arc<Frame>),
    /// Transient drop: the controller skips the tick and retries.
    Dropped,
    /// The stream is over; the pipeline shuts down cleanly.
    End,
}

pub trait FrameSource {
    fn width(&self) -> u32;
    fn height(&self) -> u32;
    /// Rate as reported by the source; may be garbage (zero, negative, NaN).
    fn reported_fps(&self) -> f64;
    fn next_frame(&mut self) -> Result<SourceTick>;

    /// Reported rate clamped to something usable.
    fn nominal_fps(&self) -> f64 {
        sanitize_fps(self.reported_fps())
    }
}

/// Invalid reported rates fall back to a fixed default rather than failing
/// startup.
pub fn sanitize_fps(reported: f64) -> f64 {
    if reported.is_finite() && reported > 0.0 {
        reported
    } else {
        DEFAULT_FPS
    }
}

/// Raw BGR24 frames from a byte stream, e.g. an ffmpeg camera pipe:
///
/// ```text
/// ffmpeg -i /dev/video0 -f rawvideo -pix_fmt bgr24 - | sentry-cam run --stdin --width 720 --height 480
/// ```
pub struct RawStreamSource<R: Read> {
    reader: R,
    width: u32,
    height: u32,
    fps: f64,
    seq: u64,
}

impl<R: Read> RawStreamSource<R> {
    pub fn new(reader: R, width: u32, height: u32, fps: f64) -> Self {
        Self { reader, width, height, fps, seq: 0 }
    }
}

impl<R: Read> FrameSource for RawStreamSource<R> {
    fn width(&self) -> u32 {
        self.width
    }

    fn height(&self) -> u32 {
        self.height
    }

    fn reported_fps(&self) -> f64 {
        self.fps
    }

    fn next_frame(&mut self) -> Result<SourceTick> {
        let mut data = vec![0u8; Frame::byte_len(self.width, self.height)];
        match self.reader.read_exact(&mut data) {
            Ok(()) => {
                self.seq += 1;
                Ok(SourceTick::Frame(Arc::new(Frame::new(
                    self.seq,
                    Local::now(),
                    self.width,
                    self.height,
                    data,
                ))))
            }
            // A trailing partial frame reads as EOF; the stream is done.
            Err(e) if e.kind() == ErrorKind::UnexpectedEof => Ok(SourceTick::End),
            Err(e) => Err(SentryCamError::Source(format!("frame read failed: {}", e))),
        }
    }
}

/// Procedural frame generator: a bright block drifting over a dark
/// background, moving in bursts so events start and stop on their own.
/// Useful for demos and integration tests without a camera.
pub struct SyntheticSource {
    width: u32,
    height: u32,
    fps: f64,
    seq: u64,
    /// Total frames to produce; 0 means endless.
    total_frames: u64,
    burst_on: u64,
    burst_off: u64,
    /// Return `Dropped` every nth tick to exercise the skip path.
    drop_every: Option<u64>,
    x: u32,
}

const SYNTH_BLOCK: u32 = 64;

impl SyntheticSource {
    pub fn new(width: u32, height: u32, fps: f64, total_frames: u64) -> Self {
        Self {
            width,
            height,
            fps,
            seq: 0,
            total_frames,
            burst_on: 40,
            burst_off: 80,
            drop_every: None,
            x: 0,
        }
    }

    pub fn with_bursts(mut self, on: u64, off: u64) -> Self {
        self.burst_on = on.max(1);
        self.burst_off = off;
        self
    }

    pub fn with_drop_every(mut self, nth: u64) -> Self {
        self.drop_every = (nth > 0).then_some(nth);
        self
    }

    fn render(&self) -> Vec<u8> {
        let mut data = vec![16u8; Frame::byte_len(self.width, self.height)];
        let y0 = (self.height / 2).saturating_sub(SYNTH_BLOCK / 2);
        for y in y0..(y0 + SYNTH_BLOCK).min(self.height) {
            for x in self.x..(self.x + SYNTH_BLOCK).min(self.width) {
                let i = (y as usize * self.width as usize + x as usize) * 3;
                data[i] = 230;
                data[i + 1] = 230;
                data[i + 2] = 230;
            }
        }
        data
    }
}

impl FrameSource for SyntheticSource {
    fn width(&self) -> u32 {
        self.width
    }

    fn height(&self) -> u32 {
        self.height
    }

    fn reported_fps(&self) -> f64 {
        self.fps
    }

    fn next_frame(&mut self) -> Result<SourceTick> {
        if self.total_frames > 0 && self.seq >= self.total_frames {
            return Ok(SourceTick::End);
        }
        self.seq += 1;

        if let Some(nth) = self.drop_every {
            if self.seq % nth == 0 {
                return Ok(SourceTick::Dropped);
            }
        }

        let cycle = self.burst_on + self.burst_off;
        let moving = cycle == 0 || (self.seq % cycle.max(1)) < self.burst_on;
        if moving {
            let span = self.width.saturating_sub(SYNTH_BLOCK).max(1);
            self.x = (self.x + 8) % span;
        }

        Ok(SourceTick::Frame(Arc::new(Frame::new(
            self.seq,
            Local::now(),
            self.width,
            self.height,
            self.render(),
        ))))
    }
}
