//! Wayland seat state
//!
//! Tracks the seat and the keyboard bound from it.

use wayland_client::{Proxy, QueueHandle};
use wayland_client::protocol::{wl_keyboard::WlKeyboard, wl_seat::WlSeat};

use crate::State;

pub struct WaylandState {
    /// Queue handle for creating new protocol objects
    pub qh: QueueHandle<State>,
    pub seat: WlSeat,
    pub keyboard: Option<WlKeyboard>,
}

impl WaylandState {
    pub fn new(qh: QueueHandle<State>, seat: WlSeat) -> Self {
        Self {
            qh,
            seat,
            keyboard: None,
        }
    }

    /// Bind or drop the keyboard to follow the seat's capabilities
    pub fn update_keyboard(&mut self, has_keyboard: bool) {
        match (has_keyboard, self.keyboard.is_some()) {
            (true, false) => {
                log::info!("[SEAT] Keyboard available");
                self.keyboard = Some(self.seat.get_keyboard(&self.qh, ()));
            }
            (false, true) => {
                log::info!("[SEAT] Keyboard removed");
                if let Some(keyboard) = self.keyboard.take()
                    && keyboard.version() >= 3
                {
                    keyboard.release();
                }
            }
            _ => {}
        }
    }
}
