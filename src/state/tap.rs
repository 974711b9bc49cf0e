//! Hotkey tap detection
//!
//! The hotkey doubles as a plain modifier. A press/release pair shorter than
//! the threshold is a tap; anything longer, or any other key pressed while the
//! hotkey is down, is modifier use and does not toggle.

use std::time::{Duration, Instant};

pub const DEFAULT_TAP_THRESHOLD: Duration = Duration::from_millis(400);

#[derive(Debug, Clone)]
pub struct HotkeyTapTracker {
    threshold: Duration,
    /// Set only while armed
    pressed_at: Option<Instant>,
}

impl HotkeyTapTracker {
    pub fn new(threshold: Duration) -> Self {
        Self {
            threshold,
            pressed_at: None,
        }
    }

    pub fn is_armed(&self) -> bool {
        self.pressed_at.is_some()
    }

    /// Hotkey pressed. Key repeat of a held hotkey keeps the first timestamp.
    pub fn press(&mut self, now: Instant) {
        if self.pressed_at.is_none() {
            self.pressed_at = Some(now);
        }
    }

    /// Hotkey released. Returns true for a tap; always disarms.
    pub fn release(&mut self, now: Instant) -> bool {
        match self.pressed_at.take() {
            Some(pressed_at) => now.saturating_duration_since(pressed_at) < self.threshold,
            None => false,
        }
    }

    /// Another key went down while the hotkey was held
    pub fn interrupt(&mut self) {
        self.pressed_at = None;
    }
}

impl Default for HotkeyTapTracker {
    fn default() -> Self {
        Self::new(DEFAULT_TAP_THRESHOLD)
    }
}
