use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

use crate::grid::GridSize;
use crate::keys::{KeyId, NamedKey};
use crate::keysym;
use crate::sequencer::Timing;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub grid: Grid,
    pub motion: Motion,
    pub hotkey: Hotkey,
    pub timing: ClickTiming,
    pub repeat: Repeat,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Grid {
    /// Clamped to 1..=26 (one letter per row)
    pub rows: usize,
    pub cols: usize,
}

impl Default for Grid {
    fn default() -> Self {
        Self { rows: 26, cols: 26 }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Motion {
    /// Fine-tune nudge distance in pixels
    pub step: f64,
    /// Scroll units per J/K press
    pub scroll: f64,
}

impl Default for Motion {
    fn default() -> Self {
        Self {
            step: 15.0,
            scroll: 1.0,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Hotkey {
    /// XKB keysym name
    pub key: String,
    pub tap_threshold_ms: u64,
}

impl Default for Hotkey {
    fn default() -> Self {
        Self {
            key: "Alt_L".to_string(),
            tap_threshold_ms: 400,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ClickTiming {
    pub click_hide_ms: u64,
    pub click_hold_ms: u64,
    pub click_restore_ms: u64,
    pub drag_settle_ms: u64,
}

impl Default for ClickTiming {
    fn default() -> Self {
        Self {
            click_hide_ms: 30,
            click_hold_ms: 50,
            click_restore_ms: 30,
            drag_settle_ms: 20,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Repeat {
    /// Client-side repeat for nudge and scroll keys
    pub enabled: bool,
}

impl Default for Repeat {
    fn default() -> Self {
        Self { enabled: true }
    }
}

/// Startup parameters consumed by the controller
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub grid: GridSize,
    pub step: f64,
    pub scroll: f64,
    pub hotkey: KeyId,
    pub tap_threshold: Duration,
    pub timing: Timing,
    pub repeat: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Config::default().settings()
    }
}

impl Config {
    pub fn load() -> Self {
        let Some(path) = Self::config_path() else {
            return Self::default();
        };

        let contents = match std::fs::read_to_string(&path) {
            Ok(s) => s,
            Err(e) => {
                if e.kind() != std::io::ErrorKind::NotFound {
                    log::warn!("[CONFIG] Failed to read {}: {}", path.display(), e);
                }
                return Self::default();
            }
        };

        match toml::from_str(&contents) {
            Ok(config) => {
                log::info!("[CONFIG] Loaded from {}", path.display());
                config
            }
            Err(e) => {
                log::warn!(
                    "[CONFIG] Parse error in {}: {} (using defaults)",
                    path.display(),
                    e
                );
                Self::default()
            }
        }
    }

    fn config_path() -> Option<PathBuf> {
        if let Ok(xdg) = std::env::var("XDG_CONFIG_HOME")
            && !xdg.is_empty()
        {
            return Some(PathBuf::from(xdg).join("gridclick/config.toml"));
        }
        if let Ok(home) = std::env::var("HOME") {
            return Some(PathBuf::from(home).join(".config/gridclick/config.toml"));
        }
        None
    }

    /// Resolve the file into controller settings, falling back per field
    pub fn settings(&self) -> Settings {
        let hotkey = keysym::parse_key_name(&self.hotkey.key).unwrap_or_else(|| {
            log::warn!(
                "[CONFIG] Unknown hotkey {:?} (using Alt_L)",
                self.hotkey.key
            );
            KeyId::Named(NamedKey::AltLeft)
        });
        let grid = GridSize::new(self.grid.rows, self.grid.cols);
        if (grid.rows, grid.cols) != (self.grid.rows, self.grid.cols) {
            log::warn!(
                "[CONFIG] Grid {}x{} clamped to {}x{}",
                self.grid.rows,
                self.grid.cols,
                grid.rows,
                grid.cols
            );
        }
        Settings {
            grid,
            step: positive_or(self.motion.step, Motion::default().step),
            scroll: positive_or(self.motion.scroll, Motion::default().scroll),
            hotkey,
            tap_threshold: Duration::from_millis(self.hotkey.tap_threshold_ms),
            timing: Timing {
                click_hide: Duration::from_millis(self.timing.click_hide_ms),
                click_hold: Duration::from_millis(self.timing.click_hold_ms),
                click_restore: Duration::from_millis(self.timing.click_restore_ms),
                drag_settle: Duration::from_millis(self.timing.drag_settle_ms),
            },
            repeat: self.repeat.enabled,
        }
    }
}

fn positive_or(value: f64, fallback: f64) -> f64 {
    if value.is_finite() && value > 0.0 {
        value
    } else {
        log::warn!("[CONFIG] Invalid value {} (using {})", value, fallback);
        fallback
    }
}
