// Artifact encoders.
//
// `FfmpegEncoder` pipes raw BGR24 into one ffmpeg child per artifact;
// `RawEncoder` dumps bare frame bytes for environments without ffmpeg
// (and for tests, where frame counts fall straight out of file sizes).

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, Command, Stdio};

use crate::constants::{CLIP_CODEC, CLIP_CRF, SNAPSHOT_QUALITY};
use crate::error::{Result, SentryCamError};
use crate::frame::Frame;
use crate::tools::ffmpeg_path;

/// An open clip being written frame by frame.
pub trait ClipSink: Send {
    fn write_frame(&mut self, frame: &Frame) -> Result<()>;
    /// Flush and close. Must leave a valid artifact even when fewer frames
    /// than planned were written.
    fn finish(&mut self) -> Result<()>;
}

/// Creates clip sinks and writes stills. One encoder serves the whole run.
pub trait Encoder: Send {
    fn clip_ext(&self) -> &'static str;
    fn snapshot_ext(&self) -> &'static str;
    fn open_clip(&self, path: &Path, width: u32, height: u32, fps: f64) -> Result<Box<dyn ClipSink>>;
    fn write_snapshot(&self, path: &Path, frame: &Frame) -> Result<()>;
}

// ---------------------------------------------------------------------------
// ffmpeg

pub struct FfmpegEncoder {
    ffmpeg: PathBuf,
}

impl FfmpegEncoder {
    pub fn new() -> Self {
        let ffmpeg = ffmpeg_path();
        log::debug!("using ffmpeg at {}", ffmpeg.display());
        Self { ffmpeg }
    }

    fn rawvideo_input_args(cmd: &mut Command, width: u32, height: u32, fps: f64) {
        cmd.args([
            "-y",
            "-f",
            "rawvideo",
            "-pix_fmt",
            "bgr24",
            "-s",
        ]);
        cmd.arg(format!("{}x{}", width, height));
        cmd.arg("-r");
        cmd.arg(format!("{:.3}", fps));
        cmd.args(["-i", "-"]);
    }
}

impl Default for FfmpegEncoder {
    fn default() -> Self {
        Self::new()
    }
}

impl Encoder for FfmpegEncoder {
    fn clip_ext(&self) -> &'static str {
        "mp4"
    }

    fn snapshot_ext(&self) -> &'static str {
        "jpg"
    }

    fn open_clip(&self, path: &Path, width: u32, height: u32, fps: f64) -> Result<Box<dyn ClipSink>> {
        let mut cmd = Command::new(&self.ffmpeg);
        Self::rawvideo_input_args(&mut cmd, width, height, fps);
        cmd.args(["-an", "-c:v", CLIP_CODEC, "-crf"])
            .arg(CLIP_CRF.to_string())
            .args(["-pix_fmt", "yuv420p"])
            .arg(path)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::null());

        let mut child = cmd
            .spawn()
            .map_err(|e| SentryCamError::Encoder(format!("failed to spawn ffmpeg: {}", e)))?;
        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| SentryCamError::Encoder("ffmpeg stdin unavailable".to_string()))?;

        Ok(Box::new(FfmpegClipSink {
            child,
            stdin: Some(stdin),
            path: path.to_path_buf(),
        }))
    }

    fn write_snapshot(&self, path: &Path, frame: &Frame) -> Result<()> {
        // ffmpeg's q scale is 1-31 where 1 is best; map our 0-100 quality.
        let q_value = ((100 - SNAPSHOT_QUALITY) as f32 / 100.0 * 30.0 + 1.0) as u32;

        let mut cmd = Command::new(&self.ffmpeg);
        Self::rawvideo_input_args(&mut cmd, frame.width, frame.height, 1.0);
        cmd.args(["-frames:v", "1", "-q:v"])
            .arg(q_value.to_string())
            .arg(path)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::null());

        let mut child = cmd
            .spawn()
            .map_err(|e| SentryCamError::Encoder(format!("failed to spawn ffmpeg: {}", e)))?;
        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(&frame.data)
                .map_err(|e| SentryCamError::Encoder(format!("snapshot pipe write: {}", e)))?;
        }
        let status = child
            .wait()
            .map_err(|e| SentryCamError::Encoder(format!("ffmpeg wait: {}", e)))?;
        if !status.success() {
            return Err(SentryCamError::Encoder(format!(
                "ffmpeg exited with {} for {}",
                status,
                path.display()
            )));
        }
        Ok(())
    }
}

struct FfmpegClipSink {
    child: Child,
    stdin: Option<ChildStdin>,
    path: PathBuf,
}

impl ClipSink for FfmpegClipSink {
    fn write_frame(&mut self, frame: &Frame) -> Result<()> {
        let stdin = self
            .stdin
            .as_mut()
            .ok_or_else(|| SentryCamError::Encoder("clip sink already finished".to_string()))?;
        stdin
            .write_all(&frame.data)
            .map_err(|e| SentryCamError::Encoder(format!("clip pipe write: {}", e)))
    }

    fn finish(&mut self) -> Result<()> {
        // Closing stdin tells ffmpeg to flush and write the trailer.
        drop(self.stdin.take());
        let status = self
            .child
            .wait()
            .map_err(|e| SentryCamError::Encoder(format!("ffmpeg wait: {}", e)))?;
        if !status.success() {
            return Err(SentryCamError::Encoder(format!(
                "ffmpeg exited with {} for {}",
                status,
                self.path.display()
            )));
        }
        Ok(())
    }
}

impl Drop for FfmpegClipSink {
    fn drop(&mut self) {
        if self.stdin.is_some() {
            drop(self.stdin.take());
            let _ = self.child.wait();
        }
    }
}

// ---------------------------------------------------------------------------
// raw dumps

/// Writes packed BGR24 frames back to back, no container. A clip of N
/// frames is exactly `N * width * height * 3` bytes.
pub struct RawEncoder;

impl Encoder for RawEncoder {
    fn clip_ext(&self) -> &'static str {
        "bgr24"
    }

    fn snapshot_ext(&self) -> &'static str {
        "bgr24"
    }

    fn open_clip(&self, path: &Path, _width: u32, _height: u32, _fps: f64) -> Result<Box<dyn ClipSink>> {
        let file = File::create(path)?;
        Ok(Box::new(RawClipSink { file }))
    }

    fn write_snapshot(&self, path: &Path, frame: &Frame) -> Result<()> {
        std::fs::write(path, &frame.data)?;
        Ok(())
    }
}

struct RawClipSink {
    file: File,
}

impl ClipSink for RawClipSink {
    fn write_frame(&mut self, frame: &Frame) -> Result<()> {
        self.file.write_all(&frame.data)?;
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        self.file.flush()?;
        Ok(())
    }
}
