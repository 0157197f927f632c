// Event artifact naming and snapshot persistence.
//
// Artifacts are named by the event's wall-clock timestamp at second
// resolution. Two events inside the same second get a numeric suffix so
// the earlier artifact is never overwritten; the snapshot and clip of one
// event share the stem so they pair up on disk.

use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Local};

use crate::constants::{CLIP_PREFIX, EVENT_STAMP_FORMAT, SNAPSHOT_PREFIX};
use crate::frame::Frame;

use super::writer::WriterHandle;

pub struct EventNamer {
    output_dir: PathBuf,
    last_stamp: String,
    dup_count: u32,
}

impl EventNamer {
    pub fn new(output_dir: PathBuf) -> Self {
        Self {
            output_dir,
            last_stamp: String::new(),
            dup_count: 0,
        }
    }

    /// Unique stem for one event, e.g. `20260825_143015` or, for a repeat
    /// within the same second, `20260825_143015_2`.
    pub fn next_stem(&mut self, at: DateTime<Local>) -> String {
        let stamp = at.format(EVENT_STAMP_FORMAT).to_string();
        if stamp == self.last_stamp {
            self.dup_count += 1;
            format!("{}_{}", stamp, self.dup_count)
        } else {
            self.last_stamp = stamp.clone();
            self.dup_count = 1;
            stamp
        }
    }

    pub fn snapshot_path(&self, stem: &str, ext: &str) -> PathBuf {
        self.output_dir.join(format!("{}{}.{}", SNAPSHOT_PREFIX, stem, ext))
    }

    pub fn clip_path(&self, stem: &str, ext: &str) -> PathBuf {
        self.output_dir.join(format!("{}{}.{}", CLIP_PREFIX, stem, ext))
    }
}

/// Persists one still image per triggered event, off the capture path.
pub struct SnapshotWriter {
    last_saved: Option<String>,
}

impl SnapshotWriter {
    pub fn new() -> Self {
        Self { last_saved: None }
    }

    /// Queue the still for the event that just triggered.
    pub fn save(&mut self, writer: &WriterHandle, path: PathBuf, frame: Arc<Frame>) {
        self.last_saved = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned());
        writer.snapshot(path, frame);
    }

    /// File name of the most recently queued snapshot.
    pub fn last_saved(&self) -> Option<&str> {
        self.last_saved.as_deref()
    }
}

impl Default for SnapshotWriter {
    fn default() -> Self {
        Self::new()
    }
}
