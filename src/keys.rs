//! Logical key identities
//!
//! The input source delivers layout-resolved keys: either a named key or a
//! character. Named keys win over characters, so Space is never treated as
//! `' '` and letters are only taken from `KeyId::Char`.

use std::time::Instant;

use crate::grid::Letter;

/// Keys identified by name rather than by the character they produce
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NamedKey {
    Escape,
    Space,
    Enter,
    Backspace,
    Tab,
    ShiftLeft,
    ShiftRight,
    ControlLeft,
    ControlRight,
    AltLeft,
    AltRight,
    SuperLeft,
    SuperRight,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyId {
    Named(NamedKey),
    Char(char),
}

impl KeyId {
    /// Letter for character keys A-Z (case-folded); named keys never map to a letter
    pub fn letter(self) -> Option<Letter> {
        match self {
            KeyId::Char(c) => Letter::from_char(c),
            KeyId::Named(_) => None,
        }
    }

    /// Uppercase letter character, for matching single-letter commands
    pub fn letter_char(self) -> Option<char> {
        self.letter().map(Letter::as_char)
    }

    pub fn is(self, named: NamedKey) -> bool {
        self == KeyId::Named(named)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyState {
    Pressed,
    Released,
}

/// A single press or release, stamped with a monotonic time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyEvent {
    pub key: KeyId,
    pub state: KeyState,
    pub time: Instant,
}

impl KeyEvent {
    pub fn press(key: KeyId, time: Instant) -> Self {
        Self {
            key,
            state: KeyState::Pressed,
            time,
        }
    }

    pub fn release(key: KeyId, time: Instant) -> Self {
        Self {
            key,
            state: KeyState::Released,
            time,
        }
    }

    pub fn is_press(&self) -> bool {
        self.state == KeyState::Pressed
    }
}
