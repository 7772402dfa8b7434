use std::sync::mpsc;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use rdev::{listen, Event, EventType, Key};

use super::{ComboCapture, HotkeyMatcher};
use crate::app::AppEvent;
use crate::config::HotkeyConfig;
use crate::error::HotkeyError;

/// Start the hotkey listener on a dedicated OS thread.
/// Queues `CaptureRequested` each time the hotkey fires.
pub fn start_listener(
    sender: async_channel::Sender<AppEvent>,
    shared_hotkey: Arc<Mutex<HotkeyConfig>>,
) -> Result<(), HotkeyError> {
    std::thread::Builder::new()
        .name("hotkey-listener".into())
        .spawn(move || {
            let mut matcher = HotkeyMatcher::default();
            let callback = move |event: Event| {
                let Some((key, pressed)) = key_transition(&event) else {
                    return;
                };
                let hotkey = shared_hotkey
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .clone();
                if matcher.key_event(rdev_key_to_code(key), pressed, &hotkey, Instant::now()) {
                    log::info!("Hotkey triggered: {}", hotkey.display_name);
                    let _ = sender.try_send(AppEvent::CaptureRequested);
                }
            };

            if let Err(e) = listen(callback) {
                log::error!("rdev listener error: {:?}", e);
            }
        })?;
    Ok(())
}

fn key_transition(event: &Event) -> Option<(Key, bool)> {
    match event.event_type {
        EventType::KeyPress(key) => Some((key, true)),
        EventType::KeyRelease(key) => Some((key, false)),
        _ => None,
    }
}

/// Capture a single key combination. Gives up after 10s.
pub fn capture_hotkey_combo() -> Option<HotkeyConfig> {
    let (tx, rx) = mpsc::channel();

    // rdev::listen blocks forever and cannot be stopped; once a combo is
    // sent the callback becomes a no-op and the thread is left detached.
    std::thread::spawn(move || {
        let mut capture = ComboCapture::default();
        let mut done = false;
        let _ = listen(move |event: Event| {
            if done {
                return;
            }
            if let Some((key, pressed)) = key_transition(&event) {
                if let Some(combo) = capture.key_event(rdev_key_to_code(key), pressed) {
                    done = true;
                    let _ = tx.send(combo);
                }
            }
        });
    });

    rx.recv_timeout(Duration::from_secs(10)).ok()
}

/// Map rdev::Key to a numeric code consistent with evdev codes
/// so that HotkeyConfig serialization is cross-platform.
fn rdev_key_to_code(key: Key) -> u16 {
    match key {
        // Modifiers: same codes as evdev
        Key::ControlLeft => 29,
        Key::ControlRight => 97,
        Key::ShiftLeft => 42,
        Key::ShiftRight => 54,
        Key::Alt => 56,
        Key::AltGr => 100,
        Key::MetaLeft => 125,
        Key::MetaRight => 126,
        // Common keys
        Key::Escape => 1,
        Key::BackSpace => 14,
        Key::Tab => 15,
        Key::Return => 28,
        Key::Space => 57,
        Key::PrintScreen => 99,
        // Letters
        Key::KeyA => 30,
        Key::KeyB => 48,
        Key::KeyC => 46,
        Key::KeyD => 32,
        Key::KeyE => 18,
        Key::KeyF => 33,
        Key::KeyG => 34,
        Key::KeyH => 35,
        Key::KeyI => 23,
        Key::KeyJ => 36,
        Key::KeyK => 37,
        Key::KeyL => 38,
        Key::KeyM => 50,
        Key::KeyN => 49,
        Key::KeyO => 24,
        Key::KeyP => 25,
        Key::KeyQ => 16,
        Key::KeyR => 19,
        Key::KeyS => 31,
        Key::KeyT => 20,
        Key::KeyU => 22,
        Key::KeyV => 47,
        Key::KeyW => 17,
        Key::KeyX => 45,
        Key::KeyY => 21,
        Key::KeyZ => 44,
        // Numbers
        Key::Num0 => 11,
        Key::Num1 => 2,
        Key::Num2 => 3,
        Key::Num3 => 4,
        Key::Num4 => 5,
        Key::Num5 => 6,
        Key::Num6 => 7,
        Key::Num7 => 8,
        Key::Num8 => 9,
        Key::Num9 => 10,
        // Function keys
        Key::F1 => 59,
        Key::F2 => 60,
        Key::F3 => 61,
        Key::F4 => 62,
        Key::F5 => 63,
        Key::F6 => 64,
        Key::F7 => 65,
        Key::F8 => 66,
        Key::F9 => 67,
        Key::F10 => 68,
        Key::F11 => 87,
        Key::F12 => 88,
        Key::Unknown(code) => code as u16,
        _ => 0,
    }
}
