// Per-tick orchestration: pull a frame, classify it, feed the pre-roll
// buffer and the alert state machine, and drive recording on transitions.
//
// One logical tick per captured frame, one writer for all mutable state.
// Pacing to the nominal frame rate is a cancellable monotonic-clock wait,
// never a spin; encoding I/O lives on the writer thread and can only cost
// the tick a queue push.

use std::path::Path;
use std::sync::{Arc, Condvar, Mutex};
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crate::buffer::PreRollBuffer;
use crate::config::Config;
use crate::constants::WRITE_QUEUE_CAPACITY;
use crate::detect::MotionClassifier;
use crate::error::Result;
use crate::event::{EventStateMachine, Phase, Transition};
use crate::frame::{DetectionVerdict, Frame};
use crate::record::encoder::Encoder;
use crate::record::snapshot::{EventNamer, SnapshotWriter};
use crate::record::writer::{self, WriterHandle};
use crate::record::ClipRecorder;
use crate::source::{FrameSource, SourceTick};
use crate::status::{StatusCell, StatusReporter, StatusSnapshot};

/// Cooperative shutdown token. Requesting it wakes any pipeline currently
/// waiting out its frame-pacing delay.
#[derive(Clone, Default)]
pub struct ShutdownToken {
    inner: Arc<ShutdownInner>,
}

#[derive(Default)]
struct ShutdownInner {
    requested: Mutex<bool>,
    cv: Condvar,
}

impl ShutdownToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request(&self) {
        let mut requested = self.inner.requested.lock().unwrap();
        *requested = true;
        self.inner.cv.notify_all();
    }

    pub fn is_requested(&self) -> bool {
        *self.inner.requested.lock().unwrap()
    }

    /// Wait up to `dur`, returning early (true) if shutdown is requested.
    pub fn wait_timeout(&self, dur: Duration) -> bool {
        let deadline = Instant::now() + dur;
        let mut requested = self.inner.requested.lock().unwrap();
        loop {
            if *requested {
                return true;
            }
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            let (guard, _) = self
                .inner
                .cv
                .wait_timeout(requested, deadline - now)
                .unwrap();
            requested = guard;
        }
    }
}

/// Final counters from a completed run.
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub frames_processed: u64,
    pub dropped_frames: u64,
    pub events_total: u64,
    pub write_failures: u64,
    pub last_snapshot: Option<String>,
    pub last_clip: Option<String>,
}

pub struct PipelineController<S: FrameSource, C: MotionClassifier> {
    source: S,
    classifier: C,
    fps: f64,
    tick_period: Duration,
    pacing: bool,

    buffer: PreRollBuffer,
    machine: EventStateMachine,
    recorder: ClipRecorder,
    snapshots: SnapshotWriter,
    namer: EventNamer,

    writer: Option<WriterHandle>,
    writer_join: Option<JoinHandle<()>>,
    failures: Arc<AtomicU64>,
    clip_ext: &'static str,
    snapshot_ext: &'static str,

    status: StatusCell,
    shutdown: ShutdownToken,

    frames_processed: u64,
    dropped_frames: u64,
    events_total: u64,
    last_clip: Option<String>,
    last_artifact: Option<String>,
}

impl<S: FrameSource, C: MotionClassifier> PipelineController<S, C> {
    pub fn new(
        source: S,
        classifier: C,
        config: &Config,
        encoder: Box<dyn Encoder>,
        shutdown: ShutdownToken,
    ) -> Result<Self> {
        config.validate()?;
        config.prepare_output_dir()?;

        let reported = source.reported_fps();
        let fps = source.nominal_fps();
        if fps != reported {
            log::warn!("source reported fps {}, falling back to {}", reported, fps);
        }

        let clip_ext = encoder.clip_ext();
        let snapshot_ext = encoder.snapshot_ext();
        let (writer, writer_join) = writer::spawn(encoder, WRITE_QUEUE_CAPACITY);
        let failures = writer.failure_counter();

        let now = Instant::now();
        Ok(Self {
            fps,
            tick_period: Duration::from_secs_f64(1.0 / fps),
            pacing: true,
            buffer: PreRollBuffer::new(config.pre_seconds, fps),
            machine: EventStateMachine::new(
                config.sustained_threshold,
                config.alert_display_seconds,
                config.flash_interval_seconds,
                now,
            ),
            recorder: ClipRecorder::new(config.post_seconds, fps),
            snapshots: SnapshotWriter::new(),
            namer: EventNamer::new(config.output_dir.clone()),
            writer: Some(writer),
            writer_join: Some(writer_join),
            failures,
            clip_ext,
            snapshot_ext,
            status: StatusCell::new(),
            shutdown,
            source,
            classifier,
            frames_processed: 0,
            dropped_frames: 0,
            events_total: 0,
            last_clip: None,
            last_artifact: None,
        })
    }

    pub fn reporter(&self) -> StatusReporter {
        self.status.reporter()
    }

    pub fn shutdown_token(&self) -> ShutdownToken {
        self.shutdown.clone()
    }

    /// Disable nominal-FPS pacing. Offline replays and tests run as fast
    /// as the source can supply frames.
    pub fn set_pacing(&mut self, pacing: bool) {
        self.pacing = pacing;
    }

    /// Run until the source ends or shutdown is requested. Any open clip
    /// session is finalized and flushed before this returns.
    pub fn run(mut self) -> Result<RunSummary> {
        log::info!(
            "pipeline started: {}x{} @ {:.2} fps, pre-roll {} frames, post-roll {} frames",
            self.source.width(),
            self.source.height(),
            self.fps,
            self.buffer.capacity(),
            self.recorder.post_frames_budget(),
        );

        let result = self.run_loop();
        let summary = self.stop();
        result.map(|_| summary)
    }

    fn run_loop(&mut self) -> Result<()> {
        while !self.shutdown.is_requested() {
            let tick_start = Instant::now();

            match self.source.next_frame()? {
                SourceTick::Frame(frame) => self.tick(frame, tick_start),
                SourceTick::Dropped => {
                    self.dropped_frames += 1;
                    log::debug!("dropped frame, skipping tick");
                }
                SourceTick::End => {
                    log::info!("frame source ended");
                    break;
                }
            }

            if self.pacing {
                let elapsed = tick_start.elapsed();
                if elapsed < self.tick_period {
                    self.shutdown.wait_timeout(self.tick_period - elapsed);
                }
            }
        }
        Ok(())
    }

    fn tick(&mut self, frame: Arc<Frame>, now: Instant) {
        let writer = match self.writer.clone() {
            Some(w) => w,
            None => return, // controller already stopped
        };
        self.frames_processed += 1;

        let verdict = self.classifier.classify(&frame);
        self.buffer.push(Arc::clone(&frame));

        let transition = self.machine.update(verdict.is_motion, now);
        match transition {
            Transition::EventStart => self.on_event_start(&writer, &frame),
            Transition::EventEnd => log::info!("alert window closed"),
            Transition::EventContinue | Transition::None => {}
        }

        // Live appends run on the post-roll countdown, not the alert
        // phase: the clip keeps filling after EventEnd until the budget
        // is spent. The trigger frame was already written by begin().
        if transition != Transition::EventStart && self.recorder.is_open() {
            if let Some(path) = self.recorder.append(&writer, Arc::clone(&frame)) {
                self.note_clip(&path);
            }
        }

        self.publish_status(&verdict);
    }

    fn on_event_start(&mut self, writer: &WriterHandle, frame: &Arc<Frame>) {
        // When the post budget outlives the alert window, the previous
        // clip can still be draining as the next event triggers. Close it
        // so sessions never overlap.
        if self.recorder.is_open() {
            log::warn!("new event while previous clip still draining, finalizing it");
            if let Some(path) = self.recorder.finalize(writer) {
                self.note_clip(&path);
            }
        }

        self.events_total += 1;
        let stem = self.namer.next_stem(frame.captured_at);
        log::info!("motion event {} -> {}", self.events_total, stem);

        let snap_path = self.namer.snapshot_path(&stem, self.snapshot_ext);
        self.snapshots.save(writer, snap_path, Arc::clone(frame));
        self.last_artifact = self.snapshots.last_saved().map(str::to_string);

        let clip_path = self.namer.clip_path(&stem, self.clip_ext);
        let preroll = self.buffer.snapshot();
        if let Some(path) = self.recorder.begin(writer, clip_path, preroll, Arc::clone(frame)) {
            self.note_clip(&path);
        }
    }

    fn note_clip(&mut self, path: &Path) {
        self.last_clip = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned());
        self.last_artifact = self.last_clip.clone();
    }

    fn publish_status(&self, verdict: &DetectionVerdict) {
        self.status.publish(StatusSnapshot {
            alert: self.machine.phase() == Phase::Active,
            flash_on: self.machine.flash_on(),
            sustained_count: self.machine.sustained_count(),
            recording: self.recorder.is_open(),
            events_total: self.events_total,
            dropped_frames: self.dropped_frames,
            write_failures: self.failures.load(Ordering::Relaxed),
            regions: verdict.regions.clone(),
            last_snapshot: self.snapshots.last_saved().map(str::to_string),
            last_clip: self.last_clip.clone(),
            last_artifact: self.last_artifact.clone(),
        });
    }

    fn stop(&mut self) -> RunSummary {
        if let Some(writer) = self.writer.take() {
            if let Some(path) = self.recorder.finalize(&writer) {
                self.note_clip(&path);
            }
            // Dropping the last handle closes the queue; the writer
            // thread drains it and exits.
            drop(writer);
        }
        if let Some(join) = self.writer_join.take() {
            if join.join().is_err() {
                log::error!("event writer thread panicked");
            }
        }

        self.publish_status(&DetectionVerdict::default());
        let summary = RunSummary {
            frames_processed: self.frames_processed,
            dropped_frames: self.dropped_frames,
            events_total: self.events_total,
            write_failures: self.failures.load(Ordering::Relaxed),
            last_snapshot: self.snapshots.last_saved().map(str::to_string),
            last_clip: self.last_clip.clone(),
        };
        log::info!(
            "pipeline stopped: {} frames, {} events, {} dropped, {} write failures",
            summary.frames_processed,
            summary.events_total,
            summary.dropped_frames,
            summary.write_failures,
        );
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::ScriptedClassifier;
    use crate::record::encoder::RawEncoder;
    use crate::source::SyntheticSource;
    use std::thread;
    use tempfile::TempDir;

    const W: u32 = 128;
    const H: u32 = 128;

    fn frame_bytes() -> u64 {
        Frame::byte_len(W, H) as u64
    }

    /// Run a full pipeline over a synthetic source with scripted verdicts,
    /// raw-dump encoding, and pacing disabled.
    fn run_scripted(config: &Config, source: SyntheticSource, script: Vec<bool>) -> RunSummary {
        let mut controller = PipelineController::new(
            source,
            ScriptedClassifier::new(script),
            config,
            Box::new(RawEncoder),
            ShutdownToken::new(),
        )
        .unwrap();
        controller.set_pacing(false);
        controller.run().unwrap()
    }

    /// Artifact file sizes in the output dir whose names start with `prefix`.
    fn artifacts(dir: &std::path::Path, prefix: &str) -> Vec<u64> {
        let mut sizes: Vec<(String, u64)> = std::fs::read_dir(dir)
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().starts_with(prefix))
            .map(|e| {
                (
                    e.file_name().to_string_lossy().into_owned(),
                    e.metadata().unwrap().len(),
                )
            })
            .collect();
        sizes.sort();
        sizes.into_iter().map(|(_, s)| s).collect()
    }

    #[test]
    fn test_single_event_records_snapshot_and_full_clip() {
        let tmp = TempDir::new().unwrap();
        let config = Config {
            pre_seconds: 0.5,          // capacity 5 at 10 fps
            post_seconds: 0.5,         // budget 5 at 10 fps
            sustained_threshold: 3,
            alert_display_seconds: 60.0,
            output_dir: tmp.path().join("out"),
            ..Config::default()
        };
        let source = SyntheticSource::new(W, H, 10.0, 30);
        // Quiet for 5 frames, then 3 motion frames: EventStart on tick 8.
        let mut script = vec![false; 5];
        script.extend([true; 3]);

        let summary = run_scripted(&config, source, script);

        assert_eq!(summary.events_total, 1);
        assert_eq!(summary.frames_processed, 30);
        assert_eq!(summary.dropped_frames, 0);
        assert_eq!(summary.write_failures, 0);

        let snaps = artifacts(&config.output_dir, "snapshot_");
        assert_eq!(snaps, vec![frame_bytes()]);

        // pre-roll(5) + trigger(1) + post-roll(5)
        let clips = artifacts(&config.output_dir, "clip_");
        assert_eq!(clips, vec![11 * frame_bytes()]);

        assert!(summary.last_clip.unwrap().starts_with("clip_"));
        assert!(summary.last_snapshot.unwrap().starts_with("snapshot_"));
    }

    #[test]
    fn test_source_end_finalizes_clip_mid_countdown() {
        let tmp = TempDir::new().unwrap();
        let config = Config {
            pre_seconds: 1.0,           // capacity 10 at 10 fps
            post_seconds: 10.0,         // budget 100, far beyond the stream
            sustained_threshold: 3,
            alert_display_seconds: 60.0,
            output_dir: tmp.path().join("out"),
            ..Config::default()
        };
        let source = SyntheticSource::new(W, H, 10.0, 20);
        let summary = run_scripted(&config, source, vec![true; 20]);

        assert_eq!(summary.events_total, 1);
        // EventStart on tick 3 with 3 buffered frames: pre(3) + trigger(1)
        // + appends on ticks 4..=20 (17). The unspent post budget is cut
        // short by the stream ending, and the clip is still valid.
        let clips = artifacts(&config.output_dir, "clip_");
        assert_eq!(clips, vec![21 * frame_bytes()]);
    }

    #[test]
    fn test_back_to_back_events_never_overlap_and_get_distinct_names() {
        let tmp = TempDir::new().unwrap();
        let config = Config {
            pre_seconds: 0.0,
            post_seconds: 2.0, // budget 20, outlives the alert window
            sustained_threshold: 1,
            // Expires by the next tick, so sustained motion re-triggers
            // while the previous clip is still draining post-roll.
            alert_display_seconds: 0.000_000_1,
            output_dir: tmp.path().join("out"),
            ..Config::default()
        };
        let source = SyntheticSource::new(W, H, 10.0, 10);
        let summary = run_scripted(&config, source, vec![true; 10]);

        // Start on every odd tick, expiry on every even one: five events,
        // each clip force-finalized at the next start (or at stream end)
        // with trigger + one appended frame.
        assert_eq!(summary.events_total, 5);
        let clips = artifacts(&config.output_dir, "clip_");
        assert_eq!(clips.len(), 5, "same-second events must not overwrite each other");
        assert!(clips.iter().all(|&s| s == 2 * frame_bytes()));
        let snaps = artifacts(&config.output_dir, "snapshot_");
        assert_eq!(snaps.len(), 5);
    }

    #[test]
    fn test_dropped_frames_skip_the_tick() {
        let tmp = TempDir::new().unwrap();
        let config = Config {
            output_dir: tmp.path().join("out"),
            ..Config::default()
        };
        let source = SyntheticSource::new(W, H, 10.0, 6).with_drop_every(3);
        let summary = run_scripted(&config, source, Vec::new());

        assert_eq!(summary.frames_processed, 4);
        assert_eq!(summary.dropped_frames, 2);
        assert_eq!(summary.events_total, 0);
    }

    #[test]
    fn test_reporter_projects_final_counters() {
        let tmp = TempDir::new().unwrap();
        let config = Config {
            pre_seconds: 0.0,
            post_seconds: 0.2,
            sustained_threshold: 2,
            alert_display_seconds: 60.0,
            output_dir: tmp.path().join("out"),
            ..Config::default()
        };
        let source = SyntheticSource::new(W, H, 10.0, 10);
        let mut controller = PipelineController::new(
            source,
            ScriptedClassifier::new(vec![false, true, true]),
            &config,
            Box::new(RawEncoder),
            ShutdownToken::new(),
        )
        .unwrap();
        controller.set_pacing(false);
        let reporter = controller.reporter();
        let summary = controller.run().unwrap();

        let status = reporter.snapshot();
        assert_eq!(status.events_total, 1);
        assert_eq!(status.events_total, summary.events_total);
        assert!(!status.recording);
        assert_eq!(status.last_clip, summary.last_clip);
    }

    #[test]
    fn test_shutdown_token_cancels_wait_early() {
        let token = ShutdownToken::new();
        let waiter = token.clone();
        let start = Instant::now();
        let handle = thread::spawn(move || waiter.wait_timeout(Duration::from_secs(30)));
        thread::sleep(Duration::from_millis(50));
        token.request();
        assert!(handle.join().unwrap(), "wait must report cancellation");
        assert!(start.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn test_shutdown_token_times_out_when_not_requested() {
        let token = ShutdownToken::new();
        assert!(!token.wait_timeout(Duration::from_millis(20)));
        assert!(!token.is_requested());
    }
}
