// Debounced motion -> alert state machine.
//
// A noisy per-frame verdict becomes a stable Idle/Active signal: K
// consecutive motion frames start an event, and the Active window expires
// on a fixed timer regardless of continued motion (non-re-arming). The
// flash timer runs on its own clock and only matters to renderers while
// Active.

use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Active,
}

/// Per-tick output of the state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    None,
    /// Debounce threshold reached while idle: trigger snapshot + clip.
    EventStart,
    /// Still inside the alert window.
    EventContinue,
    /// Alert window expired.
    EventEnd,
}

pub struct EventStateMachine {
    phase: Phase,
    sustained_count: u32,
    sustained_threshold: u32,
    alert_window: Duration,
    alert_started: Instant,
    flash_interval: Duration,
    flash_on: bool,
    last_flash_toggle: Instant,
}

impl EventStateMachine {
    pub fn new(
        sustained_threshold: u32,
        alert_display_seconds: f64,
        flash_interval_seconds: f64,
        now: Instant,
    ) -> Self {
        Self {
            phase: Phase::Idle,
            sustained_count: 0,
            sustained_threshold: sustained_threshold.max(1),
            alert_window: Duration::from_secs_f64(alert_display_seconds),
            alert_started: now,
            flash_interval: Duration::from_secs_f64(flash_interval_seconds),
            flash_on: false,
            last_flash_toggle: now,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Length of the trailing run of motion verdicts.
    pub fn sustained_count(&self) -> u32 {
        self.sustained_count
    }

    pub fn flash_on(&self) -> bool {
        self.flash_on
    }

    /// Advance one tick. `now` must come from a monotonic clock and never
    /// move backwards between calls.
    pub fn update(&mut self, is_motion: bool, now: Instant) -> Transition {
        // The debounce counter tracks the trailing motion run in every phase.
        if is_motion {
            self.sustained_count += 1;
        } else {
            self.sustained_count = 0;
        }

        // Flash toggles on its own timer, independent of phase.
        if now.duration_since(self.last_flash_toggle) >= self.flash_interval {
            self.flash_on = !self.flash_on;
            self.last_flash_toggle = now;
        }

        match self.phase {
            Phase::Idle => {
                // EventStart cannot fire while Active; the window itself is
                // the cooldown against overlapping sessions.
                if self.sustained_count >= self.sustained_threshold {
                    self.phase = Phase::Active;
                    self.alert_started = now;
                    Transition::EventStart
                } else {
                    Transition::None
                }
            }
            Phase::Active => {
                if now.duration_since(self.alert_started) >= self.alert_window {
                    self.phase = Phase::Idle;
                    Transition::EventEnd
                } else {
                    Transition::EventContinue
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn machine(threshold: u32, alert_secs: f64) -> (EventStateMachine, Instant) {
        let t0 = Instant::now();
        (EventStateMachine::new(threshold, alert_secs, 0.25, t0), t0)
    }

    fn at(t0: Instant, millis: u64) -> Instant {
        t0 + Duration::from_millis(millis)
    }

    #[test]
    fn test_sustained_count_tracks_trailing_run() {
        let (mut m, t0) = machine(100, 10.0);
        let verdicts = [true, true, false, true, true, true, false];
        let expected = [1, 2, 0, 1, 2, 3, 0];
        for (i, (&v, &e)) in verdicts.iter().zip(expected.iter()).enumerate() {
            m.update(v, at(t0, i as u64 * 50));
            assert_eq!(m.sustained_count(), e, "tick {}", i);
        }
    }

    #[test]
    fn test_event_starts_at_third_consecutive_motion_frame() {
        let (mut m, t0) = machine(3, 10.0);
        let verdicts = [false, false, true, true, true, false, false];
        let expected_counts = [0, 0, 1, 2, 3, 0, 0];
        let mut starts = 0;
        for (i, &v) in verdicts.iter().enumerate() {
            let tr = m.update(v, at(t0, i as u64 * 50));
            assert_eq!(m.sustained_count(), expected_counts[i], "tick {}", i);
            if tr == Transition::EventStart {
                starts += 1;
                assert_eq!(i, 4, "start must fire on the third consecutive motion frame");
            }
        }
        assert_eq!(starts, 1);
    }

    #[test]
    fn test_no_second_start_while_active() {
        let (mut m, t0) = machine(2, 10.0);
        assert_eq!(m.update(true, at(t0, 0)), Transition::None);
        assert_eq!(m.update(true, at(t0, 50)), Transition::EventStart);
        // Continued motion keeps the count climbing but cannot re-trigger.
        for i in 2..20 {
            let tr = m.update(true, at(t0, i * 50));
            assert_eq!(tr, Transition::EventContinue, "tick {}", i);
        }
        assert_eq!(m.phase(), Phase::Active);
    }

    #[test]
    fn test_alert_window_expires_despite_continued_motion() {
        let (mut m, t0) = machine(1, 2.0);
        assert_eq!(m.update(true, at(t0, 10_000)), Transition::EventStart);
        assert_eq!(m.update(true, at(t0, 11_000)), Transition::EventContinue);
        assert_eq!(m.update(true, at(t0, 11_999)), Transition::EventContinue);
        // The window is not re-armed by motion: it closes at start + 2.0s.
        assert_eq!(m.update(true, at(t0, 12_000)), Transition::EventEnd);
        assert_eq!(m.phase(), Phase::Idle);
    }

    #[test]
    fn test_retrigger_after_window_expiry() {
        let (mut m, t0) = machine(1, 1.0);
        assert_eq!(m.update(true, at(t0, 0)), Transition::EventStart);
        assert_eq!(m.update(true, at(t0, 1_000)), Transition::EventEnd);
        // Sustained motion immediately starts the next event from Idle.
        assert_eq!(m.update(true, at(t0, 1_050)), Transition::EventStart);
    }

    #[test]
    fn test_flash_toggles_on_interval() {
        let t0 = Instant::now();
        let mut m = EventStateMachine::new(1, 10.0, 0.25, t0);
        assert!(!m.flash_on());
        m.update(false, at(t0, 100));
        assert!(!m.flash_on());
        m.update(false, at(t0, 260));
        assert!(m.flash_on());
        m.update(false, at(t0, 300));
        assert!(m.flash_on());
        m.update(false, at(t0, 520));
        assert!(!m.flash_on());
    }
}
