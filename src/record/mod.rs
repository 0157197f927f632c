// Event recording: the clip-session lifecycle, snapshot stills, and the
// off-path writer thread that performs the actual encoding I/O.

pub mod encoder;
pub mod snapshot;
pub mod writer;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::frame::Frame;

use writer::WriterHandle;

/// Bookkeeping for the single in-flight clip.
#[derive(Debug)]
struct ClipSession {
    path: PathBuf,
    frames_written: u64,
    post_frames_remaining: u32,
}

/// Owns the lifecycle of at most one output clip: open with pre-roll
/// replay, append live frames, finalize once the post-roll budget runs
/// out. Actual byte I/O happens on the writer thread; this type only
/// decides what gets written when.
pub struct ClipRecorder {
    fps: f64,
    post_frames_budget: u32,
    session: Option<ClipSession>,
}

impl ClipRecorder {
    pub fn new(post_seconds: f64, fps: f64) -> Self {
        let post_frames_budget = (post_seconds * fps).round().max(0.0) as u32;
        Self {
            fps,
            post_frames_budget,
            session: None,
        }
    }

    pub fn is_open(&self) -> bool {
        self.session.is_some()
    }

    pub fn post_frames_budget(&self) -> u32 {
        self.post_frames_budget
    }

    pub fn current_clip(&self) -> Option<&Path> {
        self.session.as_ref().map(|s| s.path.as_path())
    }

    /// Open a new clip seeded with the pre-roll history and the triggering
    /// frame. Must not be called while a session is open; the state
    /// machine's Active guard is what keeps sessions from overlapping.
    ///
    /// Returns the clip path if a zero post-roll budget closed the session
    /// immediately.
    pub fn begin(
        &mut self,
        writer: &WriterHandle,
        path: PathBuf,
        preroll: Vec<Arc<Frame>>,
        trigger: Arc<Frame>,
    ) -> Option<PathBuf> {
        assert!(self.session.is_none(), "clip session already open");

        writer.open_clip(path.clone(), trigger.width, trigger.height, self.fps);
        let mut frames_written = 0u64;
        for frame in preroll {
            writer.write_clip_frame(frame);
            frames_written += 1;
        }
        writer.write_clip_frame(trigger);
        frames_written += 1;

        log::info!("clip started -> {} ({} pre-roll frames)", path.display(), frames_written - 1);
        self.session = Some(ClipSession {
            path,
            frames_written,
            post_frames_remaining: self.post_frames_budget,
        });

        if self.post_frames_budget == 0 {
            return self.finalize(writer);
        }
        None
    }

    /// Append a live frame to the open session; finalizes automatically
    /// once the post-roll countdown reaches zero and returns the finished
    /// clip path. Ignored when no session is open.
    pub fn append(&mut self, writer: &WriterHandle, frame: Arc<Frame>) -> Option<PathBuf> {
        let exhausted = match self.session.as_mut() {
            Some(session) => {
                writer.write_clip_frame(frame);
                session.frames_written += 1;
                session.post_frames_remaining -= 1;
                session.post_frames_remaining == 0
            }
            None => false,
        };
        if exhausted {
            self.finalize(writer)
        } else {
            None
        }
    }

    /// Close the open session, if any, and return its path. Safe to call
    /// repeatedly, and safe to call mid-countdown (shutdown): the shorter
    /// clip is still a valid artifact.
    pub fn finalize(&mut self, writer: &WriterHandle) -> Option<PathBuf> {
        let session = self.session.take()?;
        writer.close_clip();
        log::info!(
            "finished clip: {} ({} frames, {} post-roll frames unspent)",
            session.path.display(),
            session.frames_written,
            session.post_frames_remaining
        );
        Some(session.path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::encoder::RawEncoder;
    use chrono::Local;
    use std::thread::JoinHandle;
    use tempfile::TempDir;

    const W: u32 = 8;
    const H: u32 = 8;

    fn frame(seq: u64) -> Arc<Frame> {
        Arc::new(Frame::new(seq, Local::now(), W, H, vec![seq as u8; Frame::byte_len(W, H)]))
    }

    fn spawn_raw_writer() -> (WriterHandle, JoinHandle<()>) {
        writer::spawn(Box::new(RawEncoder), 64)
    }

    fn frames_in(path: &Path) -> usize {
        std::fs::read(path).unwrap().len() / Frame::byte_len(W, H)
    }

    #[test]
    fn test_begin_writes_preroll_trigger_and_post_budget() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("clip.bgr24");
        let (writer, join) = spawn_raw_writer();

        // post budget = 0.5s * 10fps = 5
        let mut recorder = ClipRecorder::new(0.5, 10.0);
        assert_eq!(recorder.post_frames_budget(), 5);

        let preroll = vec![frame(1), frame(2), frame(3)];
        assert!(recorder.begin(&writer, path.clone(), preroll, frame(4)).is_none());
        assert!(recorder.is_open());

        let mut closed = None;
        for seq in 5..10 {
            closed = recorder.append(&writer, frame(seq));
        }
        assert_eq!(closed.as_deref(), Some(path.as_path()));
        assert!(!recorder.is_open());

        drop(writer);
        join.join().unwrap();

        // preroll(3) + trigger(1) + post(5)
        assert_eq!(frames_in(&path), 9);
        // chronological order: first byte of each frame is its seq
        let bytes = std::fs::read(&path).unwrap();
        for (i, chunk) in bytes.chunks_exact(Frame::byte_len(W, H)).enumerate() {
            assert_eq!(chunk[0] as usize, i + 1);
        }
    }

    #[test]
    fn test_forced_finalize_mid_countdown_yields_valid_shorter_clip() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("clip.bgr24");
        let (writer, join) = spawn_raw_writer();

        // post budget = 1.0s * 10fps = 10
        let mut recorder = ClipRecorder::new(1.0, 10.0);
        recorder.begin(&writer, path.clone(), vec![frame(1), frame(2)], frame(3));
        for seq in 4..9 {
            recorder.append(&writer, frame(seq));
        }
        assert!(recorder.is_open());

        // Shutdown with 5 post-roll frames unspent.
        assert_eq!(recorder.finalize(&writer).as_deref(), Some(path.as_path()));
        // Idempotent: a second call is a no-op.
        assert!(recorder.finalize(&writer).is_none());
        // Appends after finalize are ignored.
        assert!(recorder.append(&writer, frame(99)).is_none());

        drop(writer);
        join.join().unwrap();

        // preroll(2) + trigger(1) + appended(5)
        assert_eq!(frames_in(&path), 8);
    }

    #[test]
    fn test_zero_post_budget_closes_immediately() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("clip.bgr24");
        let (writer, join) = spawn_raw_writer();

        let mut recorder = ClipRecorder::new(0.0, 10.0);
        let closed = recorder.begin(&writer, path.clone(), vec![frame(1)], frame(2));
        assert_eq!(closed.as_deref(), Some(path.as_path()));
        assert!(!recorder.is_open());

        drop(writer);
        join.join().unwrap();
        assert_eq!(frames_in(&path), 2);
    }

    #[test]
    #[should_panic(expected = "clip session already open")]
    fn test_begin_while_open_is_an_invariant_violation() {
        let tmp = TempDir::new().unwrap();
        let (writer, _join) = spawn_raw_writer();
        let mut recorder = ClipRecorder::new(1.0, 10.0);
        recorder.begin(&writer, tmp.path().join("a.bgr24"), Vec::new(), frame(1));
        recorder.begin(&writer, tmp.path().join("b.bgr24"), Vec::new(), frame(2));
    }
}
