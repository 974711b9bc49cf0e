use std::time::Instant;

use wayland_client::protocol::wl_keyboard;

use crate::State;
use crate::keys::{KeyEvent, KeyId};

/// Where a key press came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum KeyOrigin {
    Keyboard,
    Repeat,
}

impl State {
    pub(crate) fn handle_key(&mut self, key: u32, key_state: wl_keyboard::KeyState) {
        let now = Instant::now();

        if key_state != wl_keyboard::KeyState::Pressed {
            let Some(id) = self.keyboard.release(key) else {
                log::debug!("[KEY] Ignoring release of {}", key);
                return;
            };
            self.repeat.stop(id);
            self.deliver(KeyEvent::release(id, now), KeyOrigin::Keyboard);
            return;
        }

        let Some(id) = self.keyboard.press(key) else {
            log::debug!("[KEY] Ignoring key {}", key);
            return;
        };

        // Decided before delivery: the press may itself change the mode
        let repeats = self.settings.repeat
            && self.keyboard.key_repeats(key)
            && self
                .controller
                .as_ref()
                .is_some_and(|c| c.accepts_repeat(id));
        if repeats {
            self.repeat.start(id, now);
        } else {
            self.repeat.cancel();
        }

        self.deliver(KeyEvent::press(id, now), KeyOrigin::Keyboard);
    }

    /// Called from the repeat timer
    pub(crate) fn fire_repeat(&mut self, now: Instant) {
        let Some(id) = self.repeat.should_fire(now) else {
            return;
        };
        if !self
            .controller
            .as_ref()
            .is_some_and(|c| c.accepts_repeat(id))
        {
            self.repeat.cancel();
            return;
        }
        self.deliver(KeyEvent::press(id, now), KeyOrigin::Repeat);
    }

    /// Overlay lost keyboard focus. Held keys are dropped without synthetic
    /// releases, so a hotkey held across the focus change never counts as a tap.
    pub(crate) fn focus_lost(&mut self) {
        let held: Vec<KeyId> = self.keyboard.leave();
        if !held.is_empty() {
            log::debug!("[KEY] Focus lost with {:?} held", held);
        }
        if self.repeat.has_key() {
            log::debug!("[REPEAT] Cancelled on focus loss");
            self.repeat.cancel();
        }
        self.actions.on_focus(false);
    }

    fn deliver(&mut self, event: KeyEvent, origin: KeyOrigin) {
        let Some(controller) = self.controller.as_mut() else {
            log::debug!("[KEY] Controller not ready, dropping {:?}", event.key);
            return;
        };
        if origin == KeyOrigin::Keyboard {
            log::trace!("[KEY] {:?} {:?}", event.key, event.state);
        }
        controller.handle(event);
        if !controller.mode().is_visible() {
            self.repeat.cancel();
            controller.hide_stale_overlay(&event);
        }
    }
}
