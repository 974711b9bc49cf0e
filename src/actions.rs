//! Pointer and keyboard synthesis over wlroots virtual input protocols
//!
//! `zwlr_virtual_pointer_v1` drives motion, buttons and the wheel;
//! `zwp_virtual_keyboard_v1` sends shortcut combos. Both are safe to call
//! from the sequencer thread: every request is flushed immediately.

use std::os::fd::{AsFd, FromRawFd, OwnedFd};
use std::sync::{Mutex, PoisonError};
use std::time::Instant;

use wayland_client::Connection;
use wayland_client::protocol::wl_pointer::{Axis, AxisSource, ButtonState};
use wayland_protocols_misc::zwp_virtual_keyboard_v1::client::zwp_virtual_keyboard_v1::ZwpVirtualKeyboardV1;
use wayland_protocols_wlr::virtual_pointer::v1::client::zwlr_virtual_pointer_v1::ZwlrVirtualPointerV1;

use crate::sink::{ActionSink, Button, Modifier, SinkError};

/// Linux input event codes
const BTN_LEFT: u32 = 0x110;
const BTN_RIGHT: u32 = 0x111;

/// Pixels of axis motion per wheel step
const AXIS_PER_STEP: f64 = 15.0;

/// Evdev keycodes for A-Z on a US layout
const LETTER_KEYCODES: [u32; 26] = [
    30, 48, 46, 32, 18, 33, 34, 35, 23, 36, 37, 38, 50, 49, 24, 25, 16, 19, 31, 20, 22, 47, 17, 45,
    21, 44,
];

const KEY_PRESSED: u32 = 1;
const KEY_RELEASED: u32 = 0;

fn letter_keycode(c: char) -> Option<u32> {
    let c = c.to_ascii_lowercase();
    c.is_ascii_lowercase()
        .then(|| LETTER_KEYCODES[(c as u8 - b'a') as usize])
}

/// Evdev keycode and XKB modifier mask
fn modifier_codes(modifier: Modifier) -> (u32, u32) {
    match modifier {
        Modifier::Control => (29, 0x4),
    }
}

#[derive(Default)]
struct KeyboardSide {
    /// The virtual keyboard needs a keymap before it may send keys
    keymap_set: bool,
    /// Whether the overlay holds keyboard focus; synthesized keys would land
    /// on it, so combos wait for focus to move back to the application
    overlay_focused: bool,
    pending: Vec<(Modifier, char)>,
}

pub struct WaylandActions {
    conn: Connection,
    pointer: ZwlrVirtualPointerV1,
    keyboard: Option<ZwpVirtualKeyboardV1>,
    /// Output size, the extent for absolute motion
    extent: Mutex<(u32, u32)>,
    keyboard_side: Mutex<KeyboardSide>,
    epoch: Instant,
}

impl WaylandActions {
    pub fn new(
        conn: Connection,
        pointer: ZwlrVirtualPointerV1,
        keyboard: Option<ZwpVirtualKeyboardV1>,
        extent: (u32, u32),
    ) -> Self {
        Self {
            conn,
            pointer,
            keyboard,
            extent: Mutex::new(extent),
            keyboard_side: Mutex::new(KeyboardSide::default()),
            epoch: Instant::now(),
        }
    }

    pub fn set_extent(&self, width: u32, height: u32) {
        *self.extent.lock().unwrap_or_else(PoisonError::into_inner) = (width, height);
    }

    /// Install the seat keymap on the virtual keyboard
    pub fn set_keymap(&self, keymap_str: &str) {
        let Some(ref vk) = self.keyboard else {
            return;
        };
        let Some(fd) = create_keymap_memfd(keymap_str) else {
            return;
        };
        let size = (keymap_str.len() + 1) as u32; // +1 for null terminator
        vk.keymap(1, fd.as_fd(), size); // 1 = XKB_V1 format
        self.keyboard_side().keymap_set = true;
        log::debug!("[VK] Keymap set on virtual keyboard (size={})", size);
        let _ = self.flush();
    }

    /// Track overlay keyboard focus; queued combos go out once it is lost
    pub fn on_focus(&self, focused: bool) {
        let pending = {
            let mut side = self.keyboard_side();
            side.overlay_focused = focused;
            if focused {
                return;
            }
            std::mem::take(&mut side.pending)
        };
        for (modifier, key) in pending {
            if let Err(e) = self.press_combo(modifier, key) {
                log::warn!("[VK] Deferred combo failed: {}", e);
            }
        }
    }

    /// Destroy the virtual devices
    pub fn destroy(&self) {
        self.pointer.destroy();
        if let Some(ref vk) = self.keyboard {
            vk.destroy();
        }
        let _ = self.flush();
    }

    fn keyboard_side(&self) -> std::sync::MutexGuard<'_, KeyboardSide> {
        self.keyboard_side
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn time(&self) -> u32 {
        self.epoch.elapsed().as_millis() as u32
    }

    fn flush(&self) -> Result<(), SinkError> {
        self.conn.flush().map_err(|e| {
            log::error!("[VP] Flush failed: {}", e);
            SinkError::Disconnected
        })
    }

    fn press_combo(&self, modifier: Modifier, key: char) -> Result<(), SinkError> {
        let vk = self
            .keyboard
            .as_ref()
            .ok_or(SinkError::Unavailable("zwp_virtual_keyboard_v1"))?;
        let keycode =
            letter_keycode(key).ok_or_else(|| SinkError::Rejected(format!("no keycode for {key:?}")))?;
        let (mod_code, mask) = modifier_codes(modifier);

        let time = self.time();
        vk.key(time, mod_code, KEY_PRESSED);
        vk.modifiers(mask, 0, 0, 0);
        vk.key(time, keycode, KEY_PRESSED);
        vk.key(time, keycode, KEY_RELEASED);
        vk.key(time, mod_code, KEY_RELEASED);
        vk.modifiers(0, 0, 0, 0);
        log::debug!("[VK] Sent {:?}+{}", modifier, key);
        self.flush()
    }
}

impl ActionSink for WaylandActions {
    fn move_by(&self, dx: f64, dy: f64) -> Result<(), SinkError> {
        self.pointer.motion(self.time(), dx, dy);
        self.pointer.frame();
        self.flush()
    }

    fn move_to(&self, x: f64, y: f64) -> Result<(), SinkError> {
        let (width, height) = *self.extent.lock().unwrap_or_else(PoisonError::into_inner);
        if width == 0 || height == 0 {
            return Err(SinkError::Rejected("output size unknown".into()));
        }
        let x = x.clamp(0.0, (width - 1) as f64) as u32;
        let y = y.clamp(0.0, (height - 1) as f64) as u32;
        self.pointer
            .motion_absolute(self.time(), x, y, width, height);
        self.pointer.frame();
        self.flush()
    }

    fn button_press(&self, button: Button) -> Result<(), SinkError> {
        self.pointer
            .button(self.time(), button_code(button), ButtonState::Pressed);
        self.pointer.frame();
        self.flush()
    }

    fn button_release(&self, button: Button) -> Result<(), SinkError> {
        self.pointer
            .button(self.time(), button_code(button), ButtonState::Released);
        self.pointer.frame();
        self.flush()
    }

    fn scroll(&self, dx: f64, dy: f64) -> Result<(), SinkError> {
        let time = self.time();
        self.pointer.axis_source(AxisSource::Wheel);
        for (axis, steps) in [(Axis::HorizontalScroll, dx), (Axis::VerticalScroll, dy)] {
            if steps == 0.0 {
                continue;
            }
            self.pointer
                .axis_discrete(time, axis, steps * AXIS_PER_STEP, steps.round() as i32);
        }
        self.pointer.frame();
        self.flush()
    }

    fn send_key_combo(&self, modifier: Modifier, key: char) -> Result<(), SinkError> {
        {
            let mut side = self.keyboard_side();
            if !side.keymap_set {
                return Err(SinkError::Unavailable("virtual keyboard keymap"));
            }
            if side.overlay_focused {
                log::debug!("[VK] Overlay focused, deferring {:?}+{}", modifier, key);
                side.pending.push((modifier, key));
                return Ok(());
            }
        }
        self.press_combo(modifier, key)
    }
}

fn button_code(button: Button) -> u32 {
    match button {
        Button::Left => BTN_LEFT,
        Button::Right => BTN_RIGHT,
    }
}

/// Create a memfd containing the keymap string (with null terminator) for the virtual keyboard
fn create_keymap_memfd(keymap_str: &str) -> Option<OwnedFd> {
    use std::io::{Seek, Write};

    let fd = unsafe { libc::memfd_create(c"gridclick-keymap".as_ptr(), libc::MFD_CLOEXEC) };
    if fd < 0 {
        log::error!("[VK] memfd_create failed");
        return None;
    }
    let mut file = unsafe { std::fs::File::from_raw_fd(fd) };
    file.write_all(keymap_str.as_bytes()).ok()?;
    file.write_all(&[0]).ok()?;
    file.rewind().ok()?;
    Some(OwnedFd::from(file))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;

    #[test]
    fn letter_keycodes_follow_us_layout() {
        assert_eq!(letter_keycode('a'), Some(30));
        assert_eq!(letter_keycode('C'), Some(46));
        assert_eq!(letter_keycode('q'), Some(16));
        assert_eq!(letter_keycode('z'), Some(44));
        assert_eq!(letter_keycode('1'), None);
        assert_eq!(letter_keycode('é'), None);
    }

    #[test]
    fn control_mask_matches_xkb_default() {
        assert_eq!(modifier_codes(Modifier::Control), (29, 0x4));
    }

    #[test]
    fn buttons_map_to_evdev_codes() {
        assert_eq!(button_code(Button::Left), 0x110);
        assert_eq!(button_code(Button::Right), 0x111);
    }

    #[test]
    fn keymap_memfd_is_null_terminated() {
        let fd = create_keymap_memfd("xkb_keymap {};").unwrap();
        let mut contents = Vec::new();
        std::fs::File::from(fd).read_to_end(&mut contents).unwrap();
        assert_eq!(contents.last(), Some(&0));
        assert_eq!(&contents[..contents.len() - 1], b"xkb_keymap {};");
    }
}
