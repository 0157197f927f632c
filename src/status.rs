// Read-only status projection for an external overlay.
//
// The controller publishes a fresh snapshot once per tick; display layers
// read whole snapshots and never touch live pipeline state.

use std::sync::{Arc, Mutex};

use serde::Serialize;

use crate::frame::Region;

/// Point-in-time view of the pipeline.
#[derive(Debug, Clone, Default, Serialize)]
pub struct StatusSnapshot {
    pub alert: bool,
    pub flash_on: bool,
    pub sustained_count: u32,
    pub recording: bool,
    pub events_total: u64,
    pub dropped_frames: u64,
    pub write_failures: u64,
    /// Motion regions from the latest verdict, for box rendering only.
    pub regions: Vec<Region>,
    pub last_snapshot: Option<String>,
    pub last_clip: Option<String>,
    /// Name of the most recently saved artifact of either kind.
    pub last_artifact: Option<String>,
}

impl StatusSnapshot {
    /// Overlay label: `ALERT` while an event window is open, `OK` otherwise.
    pub fn state_label(&self) -> &'static str {
        if self.alert {
            "ALERT"
        } else {
            "OK"
        }
    }
}

/// Shared slot the controller publishes into.
#[derive(Clone, Default)]
pub struct StatusCell {
    inner: Arc<Mutex<StatusSnapshot>>,
}

impl StatusCell {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn publish(&self, snapshot: StatusSnapshot) {
        *self.inner.lock().unwrap() = snapshot;
    }

    pub fn read(&self) -> StatusSnapshot {
        self.inner.lock().unwrap().clone()
    }

    pub fn reporter(&self) -> StatusReporter {
        StatusReporter { cell: self.clone() }
    }
}

/// Read-only handle for display layers. Cannot mutate pipeline state.
#[derive(Clone)]
pub struct StatusReporter {
    cell: StatusCell,
}

impl StatusReporter {
    pub fn snapshot(&self) -> StatusSnapshot {
        self.cell.read()
    }
}
