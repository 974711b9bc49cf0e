//! Keyboard state management
//!
//! Handles the XKB keymap, resolving evdev keycodes to logical keys, and
//! matching releases to the key each press produced.

use std::collections::{HashMap, HashSet};
use xkbcommon::xkb;

use crate::keys::KeyId;
use crate::keysym;

/// Keyboard state for the overlay's `wl_keyboard`
pub struct KeyboardState {
    xkb_context: xkb::Context,
    xkb_state: Option<xkb::State>,
    /// Keys currently down, by evdev keycode. Releases resolve through this
    /// map so a modifier change mid-press cannot turn `a` into `A`.
    held: HashMap<u32, KeyId>,
    /// Keys already down when focus arrived (e.g. the binding that opened us)
    ignored_keys: HashSet<u32>,
}

impl KeyboardState {
    pub fn new() -> Self {
        Self {
            xkb_context: xkb::Context::new(xkb::CONTEXT_NO_FLAGS),
            xkb_state: None,
            held: HashMap::new(),
            ignored_keys: HashSet::new(),
        }
    }

    /// Load keymap from string
    pub fn load_keymap(&mut self, keymap_str: &str) -> bool {
        match xkb::Keymap::new_from_string(
            &self.xkb_context,
            keymap_str.to_string(),
            xkb::KEYMAP_FORMAT_TEXT_V1,
            xkb::KEYMAP_COMPILE_NO_FLAGS,
        ) {
            Some(keymap) => {
                self.xkb_state = Some(xkb::State::new(&keymap));
                true
            }
            None => false,
        }
    }

    pub fn update_modifiers(
        &mut self,
        mods_depressed: u32,
        mods_latched: u32,
        mods_locked: u32,
        group: u32,
    ) {
        if let Some(xkb_state) = &mut self.xkb_state {
            xkb_state.update_mask(mods_depressed, mods_latched, mods_locked, 0, 0, group);
        }
    }

    /// Logical key for an evdev keycode under the current modifiers
    pub fn key_info(&self, key: u32) -> Option<KeyId> {
        let xkb_state = self.xkb_state.as_ref()?;
        let keycode = xkb::Keycode::new(key + 8); // evdev to xkb
        let keysym = xkb_state.key_get_one_sym(keycode);
        let utf8 = xkb_state.key_get_utf8(keycode);
        keysym::keysym_to_key(keysym, &utf8)
    }

    /// Check if a key should repeat according to the XKB keymap
    pub fn key_repeats(&self, key: u32) -> bool {
        self.xkb_state.as_ref().is_some_and(|state| {
            let keycode = xkb::Keycode::new(key + 8);
            state.get_keymap().key_repeats(keycode)
        })
    }

    /// Focus gained; keys listed by the compositor as already down are
    /// swallowed until they are released
    pub fn enter(&mut self, pressed: impl IntoIterator<Item = u32>) {
        self.held.clear();
        self.ignored_keys = pressed.into_iter().collect();
    }

    /// Focus lost; returns the logical keys that were still held
    pub fn leave(&mut self) -> Vec<KeyId> {
        self.ignored_keys.clear();
        self.held.drain().map(|(_, id)| id).collect()
    }

    pub fn should_ignore_key(&self, key: u32) -> bool {
        self.ignored_keys.contains(&key)
    }

    /// Record a press and return the key it produced
    pub fn press(&mut self, key: u32) -> Option<KeyId> {
        if self.should_ignore_key(key) {
            return None;
        }
        let id = self.key_info(key)?;
        self.held.insert(key, id);
        Some(id)
    }

    /// Record a release, returning the key its press produced
    pub fn release(&mut self, key: u32) -> Option<KeyId> {
        if self.ignored_keys.remove(&key) {
            return None;
        }
        self.held.remove(&key)
    }
}

impl Default for KeyboardState {
    fn default() -> Self {
        Self::new()
    }
}
