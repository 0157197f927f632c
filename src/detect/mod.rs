// Motion classification seam.
//
// The pipeline only consumes a boolean verdict plus display regions; how
// the verdict is computed is swappable behind this trait, so a
// background-subtraction classifier and a pose-based one are
// interchangeable without touching the state machine.

mod diff;

pub use diff::FrameDiffClassifier;

use crate::frame::{DetectionVerdict, Frame, Region};

pub trait MotionClassifier: Send {
    fn classify(&mut self, frame: &Frame) -> DetectionVerdict;
}

/// Replays a fixed verdict sequence, then reports no motion forever.
/// Used by tests and offline replays where the trigger points are known.
pub struct ScriptedClassifier {
    script: Vec<bool>,
    cursor: usize,
}

impl ScriptedClassifier {
    pub fn new(script: Vec<bool>) -> Self {
        Self { script, cursor: 0 }
    }
}

impl MotionClassifier for ScriptedClassifier {
    fn classify(&mut self, frame: &Frame) -> DetectionVerdict {
        let is_motion = self.script.get(self.cursor).copied().unwrap_or(false);
        self.cursor += 1;
        let regions = if is_motion {
            vec![Region { x: 0, y: 0, w: frame.width, h: frame.height }]
        } else {
            Vec::new()
        };
        DetectionVerdict { is_motion, regions }
    }
}
