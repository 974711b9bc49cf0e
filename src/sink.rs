//! Collaborator interfaces
//!
//! The controller talks to the platform through two sinks: one synthesizes
//! pointer and keyboard input, the other renders the overlay. Both may be
//! called from the sequencer thread, hence `Send + Sync`.

use thiserror::Error;

use crate::grid::Letter;
use crate::state::Mode;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Button {
    Left,
    Right,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Modifier {
    Control,
}

/// Errors reported by a sink
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("{0} is not available")]
    Unavailable(&'static str),

    #[error("request rejected: {0}")]
    Rejected(String),

    #[error("collaborator disconnected")]
    Disconnected,
}

/// Synthesized pointer and keyboard input
pub trait ActionSink: Send + Sync {
    /// Move the pointer relative to its current position
    fn move_by(&self, dx: f64, dy: f64) -> Result<(), SinkError>;
    /// Move the pointer to a global position
    fn move_to(&self, x: f64, y: f64) -> Result<(), SinkError>;
    fn button_press(&self, button: Button) -> Result<(), SinkError>;
    fn button_release(&self, button: Button) -> Result<(), SinkError>;
    /// Scroll by whole units; positive `dy` scrolls down
    fn scroll(&self, dx: f64, dy: f64) -> Result<(), SinkError>;
    /// Press `modifier`, tap `key`, release `modifier`
    fn send_key_combo(&self, modifier: Modifier, key: char) -> Result<(), SinkError>;
}

/// Overlay rendering target. One-directional: it never calls back.
pub trait PresentationSink: Send + Sync {
    fn set_mode(&self, mode: Mode, first_letter: Option<Letter>) -> Result<(), SinkError>;
    fn request_repaint(&self) -> Result<(), SinkError>;
}
