// Dedicated writer thread -- drains a bounded queue of encode jobs.
//
// The capture tick must never block on storage. Frame jobs are enqueued
// with try_send and dropped (counted) when the queue is full; open/close
// and snapshot jobs use a blocking send so a clip is never left headless
// or unclosed by backpressure. Failures are logged and aggregated into a
// shared counter, and the thread outlives every job: it only exits when
// the last handle is dropped, finalizing any clip still open.

use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{Receiver, SyncSender, TrySendError};
use std::sync::{mpsc, Arc};
use std::thread::JoinHandle;

use crate::frame::Frame;

use super::encoder::{ClipSink, Encoder};

enum WriteJob {
    OpenClip { path: PathBuf, width: u32, height: u32, fps: f64 },
    ClipFrame(Arc<Frame>),
    CloseClip,
    Snapshot { path: PathBuf, frame: Arc<Frame> },
}

/// Sending half of the writer queue. Cloneable; the writer thread stops
/// once every clone is dropped.
#[derive(Clone)]
pub struct WriterHandle {
    tx: SyncSender<WriteJob>,
    failures: Arc<AtomicU64>,
}

impl WriterHandle {
    pub fn open_clip(&self, path: PathBuf, width: u32, height: u32, fps: f64) {
        self.send_blocking(WriteJob::OpenClip { path, width, height, fps });
    }

    /// Best-effort frame write: a full queue drops the frame rather than
    /// stalling capture.
    pub fn write_clip_frame(&self, frame: Arc<Frame>) {
        match self.tx.try_send(WriteJob::ClipFrame(frame)) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                log::warn!("write queue full, dropping clip frame");
                self.failures.fetch_add(1, Ordering::Relaxed);
            }
            Err(TrySendError::Disconnected(_)) => {
                self.failures.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    pub fn close_clip(&self) {
        self.send_blocking(WriteJob::CloseClip);
    }

    pub fn snapshot(&self, path: PathBuf, frame: Arc<Frame>) {
        self.send_blocking(WriteJob::Snapshot { path, frame });
    }

    pub fn failures(&self) -> u64 {
        self.failures.load(Ordering::Relaxed)
    }

    /// Counter shared with the writer thread; stays readable after the
    /// handle is gone.
    pub fn failure_counter(&self) -> Arc<AtomicU64> {
        Arc::clone(&self.failures)
    }

    // Control jobs are rare (a few per event) and must not be lost, so
    // they may wait for queue space.
    fn send_blocking(&self, job: WriteJob) {
        if self.tx.send(job).is_err() {
            log::error!("writer thread gone, job discarded");
            self.failures.fetch_add(1, Ordering::Relaxed);
        }
    }
}

/// Spawn the writer thread. Call once per pipeline.
pub fn spawn(encoder: Box<dyn Encoder>, queue_capacity: usize) -> (WriterHandle, JoinHandle<()>) {
    let (tx, rx) = mpsc::sync_channel(queue_capacity);
    let failures = Arc::new(AtomicU64::new(0));
    let thread_failures = Arc::clone(&failures);

    let join = std::thread::Builder::new()
        .name("event-writer".into())
        .spawn(move || writer_loop(encoder, rx, thread_failures))
        .expect("failed to spawn event writer thread");

    (WriterHandle { tx, failures }, join)
}

fn writer_loop(encoder: Box<dyn Encoder>, rx: Receiver<WriteJob>, failures: Arc<AtomicU64>) {
    let mut sink: Option<Box<dyn ClipSink>> = None;

    for job in rx {
        match job {
            WriteJob::OpenClip { path, width, height, fps } => {
                if let Some(mut old) = sink.take() {
                    // Should not happen: the recorder closes before reopening.
                    log::error!("writer: clip sink still open, closing it first");
                    if old.finish().is_err() {
                        failures.fetch_add(1, Ordering::Relaxed);
                    }
                }
                match encoder.open_clip(&path, width, height, fps) {
                    Ok(s) => sink = Some(s),
                    Err(e) => {
                        log::error!("failed to open clip {}: {}", path.display(), e);
                        failures.fetch_add(1, Ordering::Relaxed);
                    }
                }
            }
            WriteJob::ClipFrame(frame) => match sink.as_mut() {
                Some(s) => {
                    if let Err(e) = s.write_frame(&frame) {
                        log::warn!("clip frame write failed: {}", e);
                        failures.fetch_add(1, Ordering::Relaxed);
                    }
                }
                None => {
                    // Open failed earlier; the whole clip is lost.
                    log::debug!("no open clip sink, frame discarded");
                    failures.fetch_add(1, Ordering::Relaxed);
                }
            },
            WriteJob::CloseClip => {
                if let Some(mut s) = sink.take() {
                    if let Err(e) = s.finish() {
                        log::error!("clip finalize failed: {}", e);
                        failures.fetch_add(1, Ordering::Relaxed);
                    }
                }
            }
            WriteJob::Snapshot { path, frame } => match encoder.write_snapshot(&path, &frame) {
                Ok(()) => log::info!("saved snapshot -> {}", path.display()),
                Err(e) => {
                    log::error!("snapshot write failed for {}: {}", path.display(), e);
                    failures.fetch_add(1, Ordering::Relaxed);
                }
            },
        }
    }

    // All handles dropped. Backstop: never leave a clip without a trailer.
    if let Some(mut s) = sink.take() {
        log::warn!("writer: finalizing clip left open at shutdown");
        if let Err(e) = s.finish() {
            log::error!("clip finalize failed: {}", e);
            failures.fetch_add(1, Ordering::Relaxed);
        }
    }
}
