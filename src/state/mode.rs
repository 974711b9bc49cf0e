//! Mode state machine
//!
//! Pure transition logic. `next_mode` maps the current state and one input to
//! the next state plus the side effects the controller has to carry out, in
//! order. Nothing in here performs I/O or looks at the clock.

use crate::grid::{GridCell, GridSize, Letter};
use crate::keys::{KeyId, NamedKey};
use crate::sink::Button;

/// Top-level operating mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    /// Overlay hidden, keys pass through untouched
    #[default]
    Hidden,
    /// Grid shown, waiting for a two-letter cell code
    GridSelect,
    /// Pointer centered on a cell; nudge, click, drag
    FineTune,
    /// J/K scroll the wheel
    Scroll,
}

impl Mode {
    pub fn is_visible(self) -> bool {
        self != Mode::Hidden
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Left,
    Right,
    Up,
    Down,
}

impl Direction {
    /// Unit vector in screen coordinates (y grows downwards)
    pub fn unit(self) -> (f64, f64) {
        match self {
            Direction::Left => (-1.0, 0.0),
            Direction::Right => (1.0, 0.0),
            Direction::Up => (0.0, -1.0),
            Direction::Down => (0.0, 1.0),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrollDirection {
    Up,
    Down,
}

impl ScrollDirection {
    pub fn sign(self) -> f64 {
        match self {
            ScrollDirection::Up => -1.0,
            ScrollDirection::Down => 1.0,
        }
    }
}

/// Inputs consumed by the state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Input {
    Press(KeyId),
    Release(KeyId),
    /// Unconditional return to grid selection (hotkey tap or external toggle)
    ForcedReset,
}

/// Side effects requested by a transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    /// Tell the overlay which mode to render
    Present {
        mode: Mode,
        first_letter: Option<Letter>,
    },
    Repaint,
    /// Place the pointer at the center of a cell
    MoveToCell(GridCell),
    Nudge(Direction),
    /// Hide / click / restore sequence, run off the input thread
    Click(Button),
    BeginDrag,
    EndDrag,
    Scroll(ScrollDirection),
    /// Copy key combo
    Copy,
}

/// Mode plus per-mode sub-state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModeState {
    mode: Mode,
    /// Non-null only while in GridSelect
    first_letter: Option<Letter>,
    /// Left button held by a drag
    dragging: bool,
    grid: GridSize,
}

/// Result of one step of the machine
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub state: ModeState,
    pub effects: Vec<Effect>,
}

/// Compute the next state and effects for one input.
///
/// Unlisted (mode, input) pairs return the state unchanged with no effects.
pub fn next_mode(current: &ModeState, input: Input) -> Transition {
    let mut state = *current;
    let mut effects = Vec::new();
    match input {
        Input::ForcedReset => state.enter(Mode::GridSelect, &mut effects),
        Input::Press(key) => state.on_press(key, &mut effects),
        Input::Release(key) => state.on_release(key, &mut effects),
    }
    Transition { state, effects }
}

impl ModeState {
    pub fn new(grid: GridSize) -> Self {
        Self {
            mode: Mode::Hidden,
            first_letter: None,
            dragging: false,
            grid,
        }
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn first_letter(&self) -> Option<Letter> {
        self.first_letter
    }

    pub fn is_dragging(&self) -> bool {
        self.dragging
    }

    /// The drag press was never issued; forget the drag so no release follows
    pub fn drag_not_started(&mut self) {
        self.dragging = false;
    }

    /// Apply one input in place and return the effects
    pub fn handle(&mut self, input: Input) -> Vec<Effect> {
        let transition = next_mode(self, input);
        *self = transition.state;
        transition.effects
    }

    /// Whether a held key should auto-repeat in the current mode.
    ///
    /// Only nudges and scrolling repeat; a repeating letter in grid selection
    /// would select a cell on its own.
    pub fn accepts_repeat(&self, key: KeyId) -> bool {
        match (self.mode, key.letter_char()) {
            (Mode::FineTune, Some('H' | 'J' | 'K' | 'L')) => true,
            (Mode::Scroll, Some('J' | 'K')) => true,
            _ => false,
        }
    }

    fn enter(&mut self, mode: Mode, effects: &mut Vec<Effect>) {
        self.mode = mode;
        self.first_letter = None;
        effects.push(Effect::Present {
            mode,
            first_letter: None,
        });
    }

    /// Enter Hidden, releasing a held drag button first
    fn hide(&mut self, effects: &mut Vec<Effect>) {
        self.release_drag(effects);
        self.enter(Mode::Hidden, effects);
    }

    fn release_drag(&mut self, effects: &mut Vec<Effect>) {
        if self.dragging {
            self.dragging = false;
            effects.push(Effect::EndDrag);
        }
    }

    fn on_press(&mut self, key: KeyId, effects: &mut Vec<Effect>) {
        if self.mode == Mode::Hidden {
            return;
        }
        if key.is(NamedKey::Escape) {
            self.hide(effects);
            return;
        }
        match self.mode {
            Mode::GridSelect => self.grid_select_press(key, effects),
            Mode::FineTune => self.fine_tune_press(key, effects),
            Mode::Scroll => self.scroll_press(key, effects),
            Mode::Hidden => {}
        }
    }

    fn on_release(&mut self, key: KeyId, effects: &mut Vec<Effect>) {
        if self.mode == Mode::FineTune
            && self.dragging
            && matches!(key.letter_char(), Some('T' | 'V'))
        {
            self.release_drag(effects);
        }
    }

    fn grid_select_press(&mut self, key: KeyId, effects: &mut Vec<Effect>) {
        if key.is(NamedKey::Backspace) {
            self.first_letter = None;
            effects.push(Effect::Present {
                mode: Mode::GridSelect,
                first_letter: None,
            });
            effects.push(Effect::Repaint);
            return;
        }
        let Some(letter) = key.letter() else {
            return;
        };
        match self.first_letter {
            None => {
                self.first_letter = Some(letter);
                effects.push(Effect::Present {
                    mode: Mode::GridSelect,
                    first_letter: Some(letter),
                });
                effects.push(Effect::Repaint);
            }
            Some(row) => {
                // Out of range: first letter stays set, nothing happens
                if let Some(cell) = self.grid.cell(row, letter) {
                    effects.push(Effect::MoveToCell(cell));
                    self.enter(Mode::FineTune, effects);
                }
            }
        }
    }

    fn fine_tune_press(&mut self, key: KeyId, effects: &mut Vec<Effect>) {
        match key {
            KeyId::Named(NamedKey::Space) => effects.push(Effect::Click(Button::Left)),
            KeyId::Named(NamedKey::Enter) => {
                self.release_drag(effects);
                effects.push(Effect::Copy);
                self.enter(Mode::Hidden, effects);
            }
            KeyId::Named(NamedKey::Backspace) => self.enter(Mode::GridSelect, effects),
            KeyId::Named(_) => {}
            KeyId::Char(_) => match key.letter_char() {
                Some('H') => effects.push(Effect::Nudge(Direction::Left)),
                Some('L') => effects.push(Effect::Nudge(Direction::Right)),
                Some('K') => effects.push(Effect::Nudge(Direction::Up)),
                Some('J') => effects.push(Effect::Nudge(Direction::Down)),
                Some('M') => effects.push(Effect::Click(Button::Right)),
                Some('T' | 'V') => {
                    if !self.dragging {
                        self.dragging = true;
                        effects.push(Effect::BeginDrag);
                    }
                }
                Some('O') => self.enter(Mode::Scroll, effects),
                _ => {}
            },
        }
    }

    fn scroll_press(&mut self, key: KeyId, effects: &mut Vec<Effect>) {
        match key.letter_char() {
            Some('J') => effects.push(Effect::Scroll(ScrollDirection::Down)),
            Some('K') => effects.push(Effect::Scroll(ScrollDirection::Up)),
            _ => {}
        }
    }
}

impl Default for ModeState {
    fn default() -> Self {
        Self::new(GridSize::default())
    }
}
