use std::time::{Duration, Instant};

/// Discrete event derived from one function's raw encoder samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputEvent {
    Rotate(i64),
    Press,
    Hold,
    ReleaseAfterHold,
}

/// Edge/hold detection state for a single encoder. Owns everything the
/// per-tick sampling needs; nothing hides in statics.
#[derive(Debug)]
pub struct InputState {
    last_position: i64,
    pressed_at: Option<Instant>,
    hold_fired: bool,
    hold_threshold: Duration,
}

impl InputState {
    pub fn new(initial_position: i64, hold_threshold: Duration) -> Self {
        Self {
            last_position: initial_position,
            pressed_at: None,
            hold_fired: false,
            hold_threshold,
        }
    }

    /// Folds one raw sample into at most one event. Button edges win over
    /// rotation within a tick; an unemitted rotation is carried because the
    /// last-seen position only advances when a `Rotate` is emitted.
    pub fn update(&mut self, position: i64, pressed: bool, now: Instant) -> Option<InputEvent> {
        match (pressed, self.pressed_at) {
            (true, None) => {
                // Press edge arms the hold timer and consumes the tick; the
                // event itself is decided at release (or when the hold
                // threshold is crossed). Any concurrent rotation is carried.
                self.pressed_at = Some(now);
                self.hold_fired = false;
                return None;
            }
            (true, Some(since)) => {
                if !self.hold_fired && now.duration_since(since) >= self.hold_threshold {
                    self.hold_fired = true;
                    return Some(InputEvent::Hold);
                }
            }
            (false, Some(_)) => {
                self.pressed_at = None;
                return if self.hold_fired {
                    // The hold already consumed this press; suppress the
                    // short-press semantics.
                    self.hold_fired = false;
                    Some(InputEvent::ReleaseAfterHold)
                } else {
                    Some(InputEvent::Press)
                };
            }
            (false, None) => {}
        }

        let delta = position - self.last_position;
        if delta != 0 {
            self.last_position = position;
            return Some(InputEvent::Rotate(delta));
        }
        None
    }
}
