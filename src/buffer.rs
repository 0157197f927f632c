// Pre-roll history -- bounded circular buffer of recent frames.

use std::collections::VecDeque;
use std::sync::Arc;

use crate::frame::Frame;

/// Bounded chronological frame history. Pushing into a full buffer evicts
/// the oldest entry. A capacity of 0 disables pre-roll entirely.
///
/// Capacity is fixed at construction from the pre-roll window and the frame
/// rate; a changed rate requires reconstruction.
pub struct PreRollBuffer {
    frames: VecDeque<Arc<Frame>>,
    capacity: usize,
}

impl PreRollBuffer {
    /// Capacity is `ceil(pre_seconds * fps)`.
    pub fn new(pre_seconds: f64, fps: f64) -> Self {
        let capacity = (pre_seconds * fps).ceil().max(0.0) as usize;
        Self {
            frames: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn push(&mut self, frame: Arc<Frame>) {
        if self.capacity == 0 {
            return;
        }
        if self.frames.len() == self.capacity {
            self.frames.pop_front();
        }
        self.frames.push_back(frame);
    }

    /// Independent chronological copy of the current contents. Later pushes
    /// do not retroactively alter a snapshot already handed to the recorder.
    pub fn snapshot(&self) -> Vec<Arc<Frame>> {
        self.frames.iter().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Local;

    fn frame(seq: u64) -> Arc<Frame> {
        Arc::new(Frame::new(seq, Local::now(), 2, 2, vec![0u8; 12]))
    }

    #[test]
    fn test_capacity_from_window() {
        assert_eq!(PreRollBuffer::new(3.0, 20.0).capacity(), 60);
        assert_eq!(PreRollBuffer::new(1.0, 29.97).capacity(), 30);
        assert_eq!(PreRollBuffer::new(0.0, 20.0).capacity(), 0);
    }

    #[test]
    fn test_keeps_last_capacity_frames_in_order() {
        let mut buf = PreRollBuffer::new(1.0, 5.0); // capacity 5
        for seq in 0..12 {
            buf.push(frame(seq));
        }
        assert_eq!(buf.len(), 5);
        let seqs: Vec<u64> = buf.snapshot().iter().map(|f| f.seq).collect();
        assert_eq!(seqs, vec![7, 8, 9, 10, 11]);
    }

    #[test]
    fn test_snapshot_is_independent_of_later_pushes() {
        let mut buf = PreRollBuffer::new(1.0, 3.0);
        buf.push(frame(1));
        buf.push(frame(2));
        let snap = buf.snapshot();
        buf.push(frame(3));
        buf.push(frame(4));
        let seqs: Vec<u64> = snap.iter().map(|f| f.seq).collect();
        assert_eq!(seqs, vec![1, 2]);
    }

    #[test]
    fn test_zero_capacity_disables_preroll() {
        let mut buf = PreRollBuffer::new(0.0, 20.0);
        buf.push(frame(1));
        buf.push(frame(2));
        assert!(buf.is_empty());
        assert!(buf.snapshot().is_empty());
    }
}
