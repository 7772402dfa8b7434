//! Global hotkey listeners.
//!
//! Key codes follow evdev numbering on every platform so a saved
//! `HotkeyConfig` means the same keys everywhere.

#[cfg(target_os = "linux")]
mod linux;
#[cfg(target_os = "macos")]
mod macos;

#[cfg(target_os = "linux")]
pub use linux::{capture_hotkey_combo, start_listener};
#[cfg(target_os = "macos")]
pub use macos::{capture_hotkey_combo, start_listener};

use std::collections::HashSet;
use std::time::{Duration, Instant};

use crate::config::HotkeyConfig;

const DEBOUNCE: Duration = Duration::from_millis(500);

/// Tracks held keys and decides when the configured combo fires.
pub struct HotkeyMatcher {
    held: HashSet<u16>,
    last_trigger: Option<Instant>,
    debounce: Duration,
}

impl Default for HotkeyMatcher {
    fn default() -> Self {
        Self {
            held: HashSet::new(),
            last_trigger: None,
            debounce: DEBOUNCE,
        }
    }
}

impl HotkeyMatcher {
    /// Feed one key transition. Returns true when the combo just fired.
    pub fn key_event(&mut self, code: u16, pressed: bool, hotkey: &HotkeyConfig, now: Instant) -> bool {
        if !pressed {
            self.held.remove(&code);
            return false;
        }
        if !self.held.insert(code) {
            // auto-repeat
            return false;
        }

        let mods_held = hotkey.modifiers.iter().all(|m| self.held.contains(m));
        let fired = mods_held
            && code == hotkey.trigger
            && self
                .last_trigger
                .map_or(true, |last| now.duration_since(last) > self.debounce);
        if fired {
            self.last_trigger = Some(now);
        }
        fired
    }
}

/// Records keys until a non-modifier is pressed with at least one modifier.
#[derive(Default)]
pub struct ComboCapture {
    held: HashSet<u16>,
}

impl ComboCapture {
    pub fn key_event(&mut self, code: u16, pressed: bool) -> Option<HotkeyConfig> {
        if !pressed {
            self.held.remove(&code);
            return None;
        }
        self.held.insert(code);
        if is_modifier(code) || !self.held.iter().any(|k| is_modifier(*k)) {
            return None;
        }

        let mut modifiers: Vec<u16> = self.held.iter().copied().filter(|k| is_modifier(*k)).collect();
        modifiers.sort_unstable();
        let display_name = build_display_name(&modifiers, code);
        Some(HotkeyConfig {
            modifiers,
            trigger: code,
            display_name,
        })
    }
}

fn is_modifier(code: u16) -> bool {
    matches!(
        code,
        29 | 97 | 42 | 54 | 56 | 100 | 125 | 126
        // LCTRL | RCTRL | LSHIFT | RSHIFT | LALT | RALT | LMETA | RMETA
    )
}

fn modifier_name(code: u16) -> &'static str {
    match code {
        29 | 97 => "Ctrl",
        42 | 54 => "Shift",
        56 | 100 => "Alt",
        125 | 126 if cfg!(target_os = "macos") => "Cmd",
        125 | 126 => "Super",
        _ => "",
    }
}

fn trigger_name(code: u16) -> String {
    const LETTERS: [(u16, char); 26] = [
        (30, 'A'), (48, 'B'), (46, 'C'), (32, 'D'), (18, 'E'), (33, 'F'), (34, 'G'),
        (35, 'H'), (23, 'I'), (36, 'J'), (37, 'K'), (38, 'L'), (50, 'M'), (49, 'N'),
        (24, 'O'), (25, 'P'), (16, 'Q'), (19, 'R'), (31, 'S'), (20, 'T'), (22, 'U'),
        (47, 'V'), (17, 'W'), (45, 'X'), (21, 'Y'), (44, 'Z'),
    ];
    match code {
        1 => "Esc".into(),
        14 => "Backspace".into(),
        15 => "Tab".into(),
        28 => "Enter".into(),
        57 => "Space".into(),
        2..=10 => (code - 1).to_string(),
        11 => "0".into(),
        59..=68 => format!("F{}", code - 58),
        87 => "F11".into(),
        88 => "F12".into(),
        99 => "Print".into(),
        _ => LETTERS
            .iter()
            .find(|(c, _)| *c == code)
            .map(|(_, l)| l.to_string())
            .unwrap_or_else(|| format!("Key{code}")),
    }
}

fn build_display_name(modifiers: &[u16], trigger: u16) -> String {
    let mut parts: Vec<String> = Vec::new();
    for &m in modifiers {
        let name = modifier_name(m);
        if !name.is_empty() && !parts.iter().any(|p| p == name) {
            parts.push(name.to_string());
        }
    }
    parts.push(trigger_name(trigger));
    parts.join("+")
}
