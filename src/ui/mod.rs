//! UI components for the grid overlay
//!
//! Contains the layer-shell overlay, its request channel, layout math and
//! text rendering.

mod channel;
mod layout;
mod overlay;
mod text_render;

pub use channel::OverlaySource;
pub use overlay::Overlay;
pub use text_render::TextRenderer;
