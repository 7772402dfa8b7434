use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

/// Key codes for the hotkey combination.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HotkeyConfig {
    /// evdev key codes for modifier keys (e.g. 29 = KEY_LEFTCTRL)
    pub modifiers: Vec<u16>,
    /// evdev key code for the trigger key (e.g. 24 = KEY_O)
    pub trigger: u16,
    /// Human-readable name like "Ctrl+Alt+O"
    pub display_name: String,
}

impl Default for HotkeyConfig {
    fn default() -> Self {
        Self {
            modifiers: vec![29, 56], // KEY_LEFTCTRL, KEY_LEFTALT
            trigger: 24,             // KEY_O
            display_name: "Ctrl+Alt+O".into(),
        }
    }
}

/// Top-level application configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub hotkey: HotkeyConfig,
    /// Pause between hiding the selection overlay and grabbing pixels, so
    /// the compositor has removed the overlay from the screen.
    pub capture_delay_ms: u64,
    /// Interval at which queued events are drained on the UI thread.
    pub event_tick_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            hotkey: HotkeyConfig::default(),
            capture_delay_ms: 80,
            event_tick_ms: 50,
        }
    }
}

impl Config {
    /// Directory: ~/.config/screen-ocr/
    fn dir() -> PathBuf {
        let mut p = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));
        p.push("screen-ocr");
        p
    }

    fn path() -> PathBuf {
        Self::dir().join("config.json")
    }

    /// Load from disk, returning defaults if file doesn't exist or is invalid.
    pub fn load() -> Self {
        let path = Self::path();
        match fs::read_to_string(&path) {
            Ok(data) => Self::parse(&data),
            Err(_) => Self::default(),
        }
    }

    fn parse(data: &str) -> Self {
        serde_json::from_str(data).unwrap_or_else(|e| {
            log::warn!("Invalid config, using defaults: {e}");
            Self::default()
        })
    }

    /// Persist to disk.
    pub fn save(&self) -> Result<(), Box<dyn std::error::Error>> {
        let dir = Self::dir();
        fs::create_dir_all(&dir)?;
        let data = serde_json::to_string_pretty(self)?;
        fs::write(Self::path(), data)?;
        Ok(())
    }

    pub fn capture_delay(&self) -> Duration {
        Duration::from_millis(self.capture_delay_ms)
    }

    /// Drain interval, clamped so a zero in the file cannot spin the UI loop.
    pub fn event_tick(&self) -> Duration {
        Duration::from_millis(self.event_tick_ms.max(10))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_file_fills_defaults() {
        let config = Config::parse(r#"{ "capture_delay_ms": 150 }"#);
        assert_eq!(config.capture_delay(), Duration::from_millis(150));
        assert_eq!(config.event_tick_ms, 50);
        assert_eq!(config.hotkey, HotkeyConfig::default());
    }

    #[test]
    fn invalid_file_falls_back() {
        assert_eq!(Config::parse("not json"), Config::default());
    }

    #[test]
    fn tick_is_clamped() {
        let config = Config {
            event_tick_ms: 0,
            ..Config::default()
        };
        assert_eq!(config.event_tick(), Duration::from_millis(10));
    }

    #[test]
    fn serializes_hotkey() {
        let json = serde_json::to_string(&Config::default()).unwrap();
        let back: Config = serde_json::from_str(&json).unwrap();
        assert_eq!(back.hotkey.display_name, "Ctrl+Alt+O");
        assert_eq!(back.hotkey.modifiers, vec![29, 56]);
    }
}
