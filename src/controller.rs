//! The controller
//!
//! Single owner of the mode state and the hotkey tap tracker. Key events are
//! delivered serially on the event loop thread; each one is run through the
//! mode state machine and the resulting effects are carried out against the
//! sinks. Clicks and drag presses go to the sequencer thread, and so does
//! anything that has to stay behind a queued drag release.

use std::io;
use std::sync::Arc;

use crate::config::Settings;
use crate::grid::{GridCell, GridGeometry, Letter, ScreenRect};
use crate::keys::{KeyEvent, KeyId, NamedKey};
use crate::sequencer::Sequencer;
use crate::sink::{ActionSink, Modifier, PresentationSink};
use crate::state::{Effect, HotkeyTapTracker, Input, Mode, ModeState};

pub struct Controller {
    state: ModeState,
    tap: HotkeyTapTracker,
    hotkey: KeyId,
    geometry: GridGeometry,
    step: f64,
    scroll: f64,
    actions: Arc<dyn ActionSink>,
    presentation: Arc<dyn PresentationSink>,
    sequencer: Sequencer,
    /// Forced reset requested, applied by `run_deferred`
    reset_pending: bool,
}

impl Controller {
    pub fn new(
        settings: &Settings,
        rect: ScreenRect,
        actions: Arc<dyn ActionSink>,
        presentation: Arc<dyn PresentationSink>,
    ) -> io::Result<Self> {
        let sequencer = Sequencer::spawn(actions.clone(), presentation.clone(), settings.timing)?;
        Ok(Self {
            state: ModeState::new(settings.grid),
            tap: HotkeyTapTracker::new(settings.tap_threshold),
            hotkey: settings.hotkey,
            geometry: GridGeometry::new(settings.grid, rect),
            step: settings.step,
            scroll: settings.scroll,
            actions,
            presentation,
            sequencer,
            reset_pending: false,
        })
    }

    pub fn mode(&self) -> Mode {
        self.state.mode()
    }

    pub fn first_letter(&self) -> Option<Letter> {
        self.state.first_letter()
    }

    pub fn is_dragging(&self) -> bool {
        self.state.is_dragging()
    }

    pub fn accepts_repeat(&self, key: KeyId) -> bool {
        self.state.accepts_repeat(key)
    }

    /// Output was resized; cell centers follow the new rectangle
    pub fn set_screen_rect(&mut self, rect: ScreenRect) {
        if rect != self.geometry.rect() {
            log::info!("[GRID] Screen now {}x{}", rect.width, rect.height);
            self.geometry = GridGeometry::new(self.geometry.size(), rect);
        }
    }

    /// Entry point for every key press and release
    pub fn handle(&mut self, event: KeyEvent) {
        if event.key == self.hotkey {
            if event.is_press() {
                self.tap.press(event.time);
            } else if self.tap.release(event.time) {
                log::debug!("[KEY] Hotkey tap");
                self.request_forced_reset();
            }
            return;
        }

        let input = if event.is_press() {
            if self.tap.is_armed() {
                log::debug!("[KEY] Hotkey used as modifier, tap cancelled");
                self.tap.interrupt();
            }
            Input::Press(event.key)
        } else {
            Input::Release(event.key)
        };

        let effects = self.state.handle(input);
        if !effects.is_empty() {
            log::debug!("[KEY] {:?} -> {:?}", input, effects);
        }
        self.apply(effects);
    }

    /// Queue a return to grid selection. Never applied synchronously; the
    /// event loop calls `run_deferred` once the current dispatch is done.
    pub fn request_forced_reset(&mut self) {
        self.reset_pending = true;
    }

    pub fn has_deferred(&self) -> bool {
        self.reset_pending
    }

    pub fn run_deferred(&mut self) {
        if std::mem::take(&mut self.reset_pending) {
            log::info!("[MODE] Forced reset");
            let effects = self.state.handle(Input::ForcedReset);
            self.apply(effects);
        }
    }

    /// A press reached the overlay although the controller is hidden. That
    /// happens after a stale click restore re-showed it; hide it again so it
    /// gives up the keyboard. Returns whether the overlay was told to hide.
    pub fn hide_stale_overlay(&self, event: &KeyEvent) -> bool {
        if !event.is_press()
            || event.key == self.hotkey
            || self.reset_pending
            || self.state.mode() != Mode::Hidden
        {
            return false;
        }
        log::debug!("[MODE] {:?} pressed while hidden, hiding overlay", event.key);
        self.present(Mode::Hidden, None, false);
        true
    }

    fn apply(&mut self, effects: Vec<Effect>) {
        // Set once a drag release is queued; later effects must not overtake it
        let mut behind_release = false;
        for effect in effects {
            match effect {
                Effect::Present { mode, first_letter } => {
                    self.present(mode, first_letter, behind_release)
                }
                Effect::Repaint => {
                    if let Err(e) = self.presentation.request_repaint() {
                        log::warn!("[OVERLAY] Repaint failed: {}", e);
                    }
                }
                Effect::MoveToCell(cell) => self.move_to_cell(cell),
                Effect::Nudge(direction) => {
                    let (ux, uy) = direction.unit();
                    if let Err(e) = self.actions.move_by(ux * self.step, uy * self.step) {
                        log::error!("[MOVE] Nudge {:?} failed: {}", direction, e);
                    }
                }
                // Mode is unchanged by a click, so this is the mode at dispatch
                Effect::Click(button) => self.sequencer.click(button, self.state.mode()),
                Effect::BeginDrag => {
                    if !self.sequencer.begin_drag() {
                        log::warn!("[DRAG] Press dropped, drag cancelled");
                        self.state.drag_not_started();
                    }
                }
                Effect::EndDrag => behind_release = self.sequencer.end_drag(),
                Effect::Scroll(direction) => {
                    if let Err(e) = self.actions.scroll(0.0, direction.sign() * self.scroll) {
                        log::error!("[SCROLL] {:?} failed: {}", direction, e);
                    }
                }
                Effect::Copy => {
                    if behind_release && self.sequencer.copy_after_release() {
                        continue;
                    }
                    if let Err(e) = self.actions.send_key_combo(Modifier::Control, 'c') {
                        log::error!("[COPY] Key combo failed: {}", e);
                    }
                }
            }
        }
    }

    /// Notify the overlay, through the sequencer when a queued notification
    /// or release is still pending so the overlay sees them in order
    fn present(&self, mode: Mode, first_letter: Option<Letter>, behind_release: bool) {
        log::info!("[MODE] {:?} (first letter {:?})", mode, first_letter);
        let ordered = behind_release || self.sequencer.has_queued_presents();
        if ordered && self.sequencer.present(mode, first_letter, behind_release) {
            return;
        }
        if let Err(e) = self.presentation.set_mode(mode, first_letter) {
            log::warn!("[OVERLAY] set_mode({:?}) failed: {}", mode, e);
        }
    }

    fn move_to_cell(&self, cell: GridCell) {
        let Some(center) = self.geometry.center(cell) else {
            log::debug!("[MOVE] Cell {} outside grid", cell.label());
            return;
        };
        log::debug!("[MOVE] Cell {} -> ({}, {})", cell.label(), center.x, center.y);
        if let Err(e) = self.actions.move_to(center.x, center.y) {
            log::error!("[MOVE] Move to {} failed: {}", cell.label(), e);
        }
    }

    /// Release a held drag and stop the sequencer after its queue drains
    pub fn shutdown(&mut self) {
        if self.state.is_dragging() {
            log::info!("[DRAG] Releasing held button on shutdown");
            let effects = self.state.handle(Input::Press(KeyId::Named(NamedKey::Escape)));
            self.apply(effects);
        }
        self.sequencer.stop();
    }
}

#[cfg(test)]
mod tests {
    use std::time::{Duration, Instant};

    use super::*;
    use crate::grid::GridSize;
    use crate::sequencer::Timing;
    use crate::sink::Button;
    use crate::sink::testing::{Record, Recorder};

    const ALT: KeyId = KeyId::Named(NamedKey::AltLeft);

    struct Harness {
        controller: Controller,
        sinks: Arc<Recorder>,
        now: Instant,
    }

    impl Harness {
        fn new() -> Self {
            Self::with_settings(Settings {
                timing: Timing::immediate(),
                ..Settings::default()
            })
        }

        fn with_settings(settings: Settings) -> Self {
            let sinks = Arc::new(Recorder::default());
            let controller = Controller::new(
                &settings,
                ScreenRect::new(0.0, 0.0, 2600.0, 1300.0),
                sinks.clone(),
                sinks.clone(),
            )
            .unwrap();
            Self {
                controller,
                sinks,
                now: Instant::now(),
            }
        }

        fn advance(&mut self, ms: u64) {
            self.now += Duration::from_millis(ms);
        }

        fn press(&mut self, key: KeyId) {
            self.controller.handle(KeyEvent::press(key, self.now));
        }

        fn release(&mut self, key: KeyId) {
            self.controller.handle(KeyEvent::release(key, self.now));
        }

        fn tap(&mut self, key: KeyId) {
            self.press(key);
            self.release(key);
        }

        fn type_chars(&mut self, text: &str) {
            for c in text.chars() {
                self.tap(KeyId::Char(c));
            }
        }

        /// Hotkey tap plus the deferred drain the event loop performs
        fn open_grid(&mut self) {
            self.press(ALT);
            self.advance(100);
            self.release(ALT);
            self.controller.run_deferred();
        }

        fn select(&mut self, code: &str) {
            self.open_grid();
            self.type_chars(code);
            self.clear();
        }

        fn clear(&self) {
            self.sinks.clear();
        }

        /// Wait for the sequencer to finish everything queued
        fn finish(mut self) -> Vec<Record> {
            self.controller.shutdown();
            self.sinks.records()
        }
    }

    #[test]
    fn hotkey_tap_opens_grid_only_after_deferred_run() {
        let mut h = Harness::new();
        h.press(ALT);
        h.advance(390);
        h.release(ALT);
        assert_eq!(h.controller.mode(), Mode::Hidden);
        assert!(h.controller.has_deferred());
        assert!(h.sinks.records().is_empty());

        h.controller.run_deferred();
        assert!(!h.controller.has_deferred());
        assert_eq!(h.controller.mode(), Mode::GridSelect);
        assert_eq!(h.sinks.records(), vec![Record::SetMode(Mode::GridSelect, None)]);
    }

    #[test]
    fn held_hotkey_does_not_toggle() {
        let mut h = Harness::new();
        h.press(ALT);
        h.advance(410);
        h.release(ALT);
        h.controller.run_deferred();
        assert_eq!(h.controller.mode(), Mode::Hidden);
        assert!(h.sinks.records().is_empty());
    }

    #[test]
    fn hotkey_combo_does_not_toggle() {
        let mut h = Harness::new();
        h.press(ALT);
        h.tap(KeyId::Named(NamedKey::Tab));
        h.advance(50);
        h.release(ALT);
        h.controller.run_deferred();
        assert_eq!(h.controller.mode(), Mode::Hidden);
    }

    #[test]
    fn tap_resets_from_fine_tune() {
        let mut h = Harness::new();
        h.select("ab");
        assert_eq!(h.controller.mode(), Mode::FineTune);
        h.open_grid();
        assert_eq!(h.controller.mode(), Mode::GridSelect);
        assert_eq!(h.controller.first_letter(), None);
    }

    #[test]
    fn double_tap_before_drain_resets_once() {
        let mut h = Harness::new();
        h.tap(ALT);
        h.tap(ALT);
        h.controller.run_deferred();
        assert_eq!(h.sinks.records(), vec![Record::SetMode(Mode::GridSelect, None)]);
    }

    #[test]
    fn grid_selection_moves_pointer_to_cell_center() {
        let mut h = Harness::new();
        h.open_grid();
        h.clear();
        h.type_chars("a");
        let letter_a = Letter::from_char('A');
        assert_eq!(
            h.sinks.records(),
            vec![Record::SetMode(Mode::GridSelect, letter_a), Record::Repaint]
        );
        h.clear();
        h.type_chars("a");
        assert_eq!(
            h.sinks.records(),
            vec![
                Record::MoveTo(50.0, 25.0),
                Record::SetMode(Mode::FineTune, None),
            ]
        );

        h.select("zz");
        h.open_grid();
        h.clear();
        h.type_chars("ZZ");
        assert!(h.sinks.records().contains(&Record::MoveTo(2550.0, 1275.0)));
    }

    #[test]
    fn resized_screen_moves_cell_centers() {
        let mut h = Harness::new();
        h.controller
            .set_screen_rect(ScreenRect::new(0.0, 0.0, 260.0, 130.0));
        h.open_grid();
        h.clear();
        h.type_chars("aa");
        assert!(h.sinks.records().contains(&Record::MoveTo(5.0, 2.5)));
    }

    #[test]
    fn nudges_use_step() {
        let mut h = Harness::new();
        h.select("mm");
        h.type_chars("hjkl");
        assert_eq!(
            h.sinks.records(),
            vec![
                Record::MoveBy(-15.0, 0.0),
                Record::MoveBy(0.0, 15.0),
                Record::MoveBy(0.0, -15.0),
                Record::MoveBy(15.0, 0.0),
            ]
        );
    }

    #[test]
    fn left_click_round_trip() {
        let mut h = Harness::new();
        h.select("cc");
        h.tap(KeyId::Named(NamedKey::Space));
        assert_eq!(h.controller.mode(), Mode::FineTune);
        assert_eq!(
            h.finish(),
            vec![
                Record::SetMode(Mode::Hidden, None),
                Record::Press(Button::Left),
                Record::Release(Button::Left),
                Record::SetMode(Mode::FineTune, None),
            ]
        );
    }

    #[test]
    fn right_click_with_m() {
        let mut h = Harness::new();
        h.select("cc");
        h.tap(KeyId::Char('m'));
        let records = h.finish();
        assert!(records.contains(&Record::Press(Button::Right)));
        assert!(records.contains(&Record::Release(Button::Right)));
    }

    #[test]
    fn click_restores_captured_mode_even_if_stale() {
        let mut h = Harness::with_settings(Settings {
            timing: Timing {
                click_hide: Duration::from_millis(50),
                ..Timing::immediate()
            },
            ..Settings::default()
        });
        h.select("cc");
        h.tap(KeyId::Named(NamedKey::Space));
        // Escape lands while the click is still sleeping
        h.tap(KeyId::Named(NamedKey::Escape));
        assert_eq!(h.controller.mode(), Mode::Hidden);
        let records = h.finish();
        assert_eq!(records.last(), Some(&Record::SetMode(Mode::FineTune, None)));
    }

    #[test]
    fn escape_while_dragging_releases_before_hidden() {
        let mut h = Harness::new();
        h.select("dd");
        h.press(KeyId::Char('t'));
        assert!(h.controller.is_dragging());
        h.press(KeyId::Named(NamedKey::Escape));
        assert!(!h.controller.is_dragging());
        let records = h.finish();
        let release = records
            .iter()
            .position(|r| *r == Record::Release(Button::Left))
            .unwrap();
        let hidden = records
            .iter()
            .rposition(|r| *r == Record::SetMode(Mode::Hidden, None))
            .unwrap();
        assert!(release < hidden, "{records:?}");
        assert_eq!(hidden, records.len() - 1);
    }

    fn count(records: &[Record], wanted: Record) -> usize {
        records.iter().filter(|r| **r == wanted).count()
    }

    #[test]
    fn escape_behind_click_backlog_keeps_release_first() {
        let mut h = Harness::with_settings(Settings::default());
        h.select("cc");
        for _ in 0..10 {
            h.tap(KeyId::Named(NamedKey::Space));
        }
        h.press(KeyId::Char('t'));
        assert!(h.controller.is_dragging());

        let start = Instant::now();
        h.press(KeyId::Named(NamedKey::Escape));
        assert!(start.elapsed() < Duration::from_millis(100));
        assert_eq!(h.controller.mode(), Mode::Hidden);
        assert!(!h.controller.is_dragging());

        let records = h.finish();
        assert_eq!(
            &records[records.len() - 2..],
            &[Record::Release(Button::Left), Record::SetMode(Mode::Hidden, None)]
        );
        assert_eq!(
            count(&records, Record::Press(Button::Left)),
            count(&records, Record::Release(Button::Left))
        );
    }

    #[test]
    fn mode_change_after_queued_release_stays_in_order() {
        let mut h = Harness::with_settings(Settings {
            timing: Timing {
                click_hide: Duration::from_millis(30),
                ..Timing::immediate()
            },
            ..Settings::default()
        });
        h.select("cc");
        h.tap(KeyId::Named(NamedKey::Space));
        h.press(KeyId::Char('t'));
        h.press(KeyId::Named(NamedKey::Escape));
        // Reopened while the hide is still queued behind the release
        h.open_grid();
        assert_eq!(h.controller.mode(), Mode::GridSelect);
        let records = h.finish();
        assert_eq!(records.last(), Some(&Record::SetMode(Mode::GridSelect, None)));
    }

    #[test]
    fn enter_while_dragging_releases_before_copy() {
        let mut h = Harness::new();
        h.select("ff");
        h.press(KeyId::Char('t'));
        h.press(KeyId::Named(NamedKey::Enter));
        let records = h.finish();
        assert_eq!(
            &records[records.len() - 3..],
            &[
                Record::Release(Button::Left),
                Record::KeyCombo(Modifier::Control, 'c'),
                Record::SetMode(Mode::Hidden, None),
            ]
        );
    }

    #[test]
    fn dropped_drag_press_is_never_released() {
        let mut h = Harness::with_settings(Settings::default());
        h.select("cc");
        for _ in 0..20 {
            h.tap(KeyId::Named(NamedKey::Space));
        }
        h.press(KeyId::Char('t'));
        assert!(!h.controller.is_dragging());
        h.release(KeyId::Char('t'));
        let records = h.finish();
        assert_eq!(
            count(&records, Record::Press(Button::Left)),
            count(&records, Record::Release(Button::Left))
        );
    }

    #[test]
    fn key_while_hidden_hides_stale_overlay() {
        let mut h = Harness::new();
        h.select("cc");
        h.tap(KeyId::Named(NamedKey::Escape));
        h.clear();

        let press = KeyEvent::press(KeyId::Named(NamedKey::Escape), h.now);
        h.controller.handle(press);
        assert!(h.controller.hide_stale_overlay(&press));
        assert_eq!(h.sinks.records(), vec![Record::SetMode(Mode::Hidden, None)]);

        // Releases and the hotkey itself are left alone
        let release = KeyEvent::release(KeyId::Char('a'), h.now);
        assert!(!h.controller.hide_stale_overlay(&release));
        assert!(!h.controller.hide_stale_overlay(&KeyEvent::press(ALT, h.now)));
        // Nor is a press that precedes a pending reset
        h.controller.request_forced_reset();
        assert!(!h.controller.hide_stale_overlay(&press));
    }

    #[test]
    fn visible_modes_never_resend_hidden() {
        let mut h = Harness::new();
        h.select("cc");
        let press = KeyEvent::press(KeyId::Char('h'), h.now);
        h.controller.handle(press);
        assert!(!h.controller.hide_stale_overlay(&press));
    }

    #[test]
    fn drag_press_and_release_pair() {
        let mut h = Harness::new();
        h.select("dd");
        h.press(KeyId::Char('v'));
        h.press(KeyId::Char('v'));
        h.type_chars("jj");
        h.release(KeyId::Char('v'));
        assert!(!h.controller.is_dragging());
        let records = h.finish();
        let presses = records.iter().filter(|r| **r == Record::Press(Button::Left)).count();
        let releases = records.iter().filter(|r| **r == Record::Release(Button::Left)).count();
        assert_eq!((presses, releases), (1, 1));
        assert_eq!(records.last(), Some(&Record::Release(Button::Left)));
    }

    #[test]
    fn shutdown_releases_held_drag() {
        let mut h = Harness::new();
        h.select("dd");
        h.press(KeyId::Char('t'));
        let records = h.finish();
        assert_eq!(
            &records[records.len() - 2..],
            &[Record::Release(Button::Left), Record::SetMode(Mode::Hidden, None)]
        );
    }

    #[test]
    fn scroll_mode_only_j_and_k() {
        let mut h = Harness::new();
        h.select("ee");
        h.tap(KeyId::Char('o'));
        assert_eq!(h.controller.mode(), Mode::Scroll);
        h.clear();
        h.type_chars("abcdefghilmnopqrstuvwxyz");
        assert!(h.sinks.records().is_empty());
        assert_eq!(h.controller.mode(), Mode::Scroll);
        h.type_chars("jk");
        assert_eq!(
            h.sinks.records(),
            vec![Record::Scroll(0.0, 1.0), Record::Scroll(0.0, -1.0)]
        );
    }

    #[test]
    fn enter_copies_then_hides() {
        let mut h = Harness::new();
        h.select("ff");
        h.tap(KeyId::Named(NamedKey::Enter));
        assert_eq!(h.controller.mode(), Mode::Hidden);
        assert_eq!(
            h.sinks.records(),
            vec![
                Record::KeyCombo(Modifier::Control, 'c'),
                Record::SetMode(Mode::Hidden, None),
            ]
        );
    }

    #[test]
    fn out_of_range_second_letter_keeps_first() {
        let mut h = Harness::with_settings(Settings {
            grid: GridSize::new(4, 4),
            timing: Timing::immediate(),
            ..Settings::default()
        });
        h.open_grid();
        h.type_chars("bz");
        assert_eq!(h.controller.mode(), Mode::GridSelect);
        assert_eq!(h.controller.first_letter(), Letter::from_char('B'));
        h.type_chars("d");
        assert_eq!(h.controller.mode(), Mode::FineTune);
    }

    #[test]
    fn presentation_failure_keeps_mode_state() {
        let mut h = Harness::new();
        h.sinks
            .fail_presentation
            .store(true, std::sync::atomic::Ordering::SeqCst);
        h.open_grid();
        h.type_chars("gg");
        assert_eq!(h.controller.mode(), Mode::FineTune);
    }

    #[test]
    fn hidden_ignores_keys() {
        let mut h = Harness::new();
        h.type_chars("ab");
        h.tap(KeyId::Named(NamedKey::Escape));
        assert_eq!(h.controller.mode(), Mode::Hidden);
        assert!(h.sinks.records().is_empty());
    }

    #[test]
    fn repeat_follows_mode() {
        let mut h = Harness::new();
        h.open_grid();
        assert!(!h.controller.accepts_repeat(KeyId::Char('j')));
        h.type_chars("aa");
        assert!(h.controller.accepts_repeat(KeyId::Char('j')));
    }
}
