//! State management module
//!
//! - ModeState: the mode state machine and the effects each input produces
//! - HotkeyTapTracker: tap-versus-hold detection for the hotkey
//! - KeyRepeatState: client-side key repeat timing
//! - KeyboardState: XKB keymap and held-key tracking
//! - WaylandState: seat and keyboard handles

mod keyboard;
pub mod mode;
mod repeat;
mod tap;
mod wayland;

pub use keyboard::KeyboardState;
pub use mode::{Effect, Input, Mode, ModeState};
pub use repeat::KeyRepeatState;
pub use tap::HotkeyTapTracker;
pub use wayland::WaylandState;
