//! Client-side key repeat
//!
//! Wayland leaves repeat to the client. Only keys the current mode accepts
//! repeats for are tracked (nudges and scrolling).

use std::time::{Duration, Instant};

use crate::keys::KeyId;

/// Compositor defaults until `wl_keyboard.repeat_info` arrives
const DEFAULT_RATE: i32 = 25;
const DEFAULT_DELAY: i32 = 600;

/// Tracks repeat progress for one held key
pub struct KeyRepeatState {
    /// Characters per second; 0 disables repeat
    rate: i32,
    /// Milliseconds before the first repeat
    delay: i32,
    key: Option<KeyId>,
    press_time: Option<Instant>,
    /// Whether the initial delay has passed
    started: bool,
    last_fire: Option<Instant>,
}

impl KeyRepeatState {
    pub fn new() -> Self {
        Self {
            rate: DEFAULT_RATE,
            delay: DEFAULT_DELAY,
            key: None,
            press_time: None,
            started: false,
            last_fire: None,
        }
    }

    pub fn set_info(&mut self, rate: i32, delay: i32) {
        self.rate = rate;
        self.delay = delay;
        if rate <= 0 {
            self.cancel();
        }
    }

    /// Start tracking a new key press
    pub fn start(&mut self, key: KeyId, now: Instant) {
        self.key = Some(key);
        self.press_time = Some(now);
        self.started = false;
        self.last_fire = None;
    }

    /// Stop repeat for a specific key (on release)
    pub fn stop(&mut self, key: KeyId) {
        if self.key == Some(key) {
            self.cancel();
        }
    }

    pub fn has_key(&self) -> bool {
        self.key.is_some()
    }

    pub fn cancel(&mut self) {
        self.key = None;
        self.press_time = None;
        self.started = false;
        self.last_fire = None;
    }

    /// Returns the held key when a repeat is due at `now`
    pub fn should_fire(&mut self, now: Instant) -> Option<KeyId> {
        if self.rate <= 0 {
            return None;
        }
        let key = self.key?;
        let press_time = self.press_time?;

        if !self.started {
            if now.saturating_duration_since(press_time) >= self.delay_duration() {
                self.started = true;
                self.last_fire = Some(now);
                return Some(key);
            }
        } else {
            let last = self.last_fire.unwrap_or(press_time);
            if now.saturating_duration_since(last) >= self.interval() {
                self.last_fire = Some(now);
                return Some(key);
            }
        }

        None
    }

    fn delay_duration(&self) -> Duration {
        Duration::from_millis(self.delay.max(0) as u64)
    }

    fn interval(&self) -> Duration {
        Duration::from_micros(1_000_000 / self.rate.max(1) as u64)
    }
}

impl Default for KeyRepeatState {
    fn default() -> Self {
        Self::new()
    }
}
