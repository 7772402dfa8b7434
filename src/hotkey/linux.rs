use evdev::{Device, EventType, KeyCode};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use super::{ComboCapture, HotkeyMatcher};
use crate::app::AppEvent;
use crate::config::HotkeyConfig;
use crate::error::HotkeyError;

/// Start the hotkey listener on a dedicated OS thread.
/// Queues `CaptureRequested` each time the hotkey fires. Fails up front when
/// no keyboard can be opened.
pub fn start_listener(
    sender: async_channel::Sender<AppEvent>,
    shared_hotkey: Arc<Mutex<HotkeyConfig>>,
) -> Result<(), HotkeyError> {
    let devices = open_keyboard_devices();
    if devices.is_empty() {
        return Err(HotkeyError::NoKeyboards);
    }
    log::info!("Opened {} keyboard device(s)", devices.len());
    for dev in &devices {
        dev.set_nonblocking(true)?;
    }

    std::thread::Builder::new()
        .name("hotkey-listener".into())
        .spawn(move || listener_loop(devices, sender, shared_hotkey))?;
    Ok(())
}

fn listener_loop(
    mut devices: Vec<Device>,
    sender: async_channel::Sender<AppEvent>,
    shared_hotkey: Arc<Mutex<HotkeyConfig>>,
) {
    let mut matcher = HotkeyMatcher::default();

    loop {
        let mut any_event = false;
        let hotkey = shared_hotkey
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();

        for dev in &mut devices {
            let Ok(events) = dev.fetch_events() else {
                continue;
            };
            for event in events {
                if event.event_type() != EventType::KEY || event.value() == 2 {
                    continue;
                }
                any_event = true;
                if matcher.key_event(event.code(), event.value() == 1, &hotkey, Instant::now()) {
                    log::info!("Hotkey triggered: {}", hotkey.display_name);
                    if sender.try_send(AppEvent::CaptureRequested).is_err() {
                        log::info!("Event queue closed, exiting hotkey listener");
                        return;
                    }
                }
            }
        }

        if sender.is_closed() {
            return;
        }
        if !any_event {
            std::thread::sleep(Duration::from_millis(1));
        }
    }
}

/// Open all /dev/input/event* devices that look like keyboards.
fn open_keyboard_devices() -> Vec<Device> {
    let mut devices = Vec::new();
    let Ok(entries) = std::fs::read_dir("/dev/input") else {
        return devices;
    };

    for entry in entries.flatten() {
        let path = entry.path();
        let name = path.file_name().unwrap_or_default().to_string_lossy();
        if !name.starts_with("event") {
            continue;
        }
        if let Ok(dev) = Device::open(&path) {
            let has_key = dev.supported_events().contains(EventType::KEY);
            let has_key_a = dev
                .supported_keys()
                .map(|keys| keys.contains(KeyCode::KEY_A))
                .unwrap_or(false);
            if has_key && has_key_a {
                log::info!(
                    "Opened keyboard: {} ({})",
                    dev.name().unwrap_or("unknown"),
                    path.display()
                );
                devices.push(dev);
            }
        }
    }
    devices
}

/// Capture a single key combination from evdev devices. Gives up after 10s.
pub fn capture_hotkey_combo() -> Option<HotkeyConfig> {
    let mut devices = open_keyboard_devices();
    for dev in &devices {
        let _ = dev.set_nonblocking(true);
    }

    let mut capture = ComboCapture::default();
    let deadline = Instant::now() + Duration::from_secs(10);

    while !devices.is_empty() && Instant::now() < deadline {
        for dev in &mut devices {
            let Ok(events) = dev.fetch_events() else {
                continue;
            };
            for event in events {
                if event.event_type() != EventType::KEY || event.value() == 2 {
                    continue;
                }
                if let Some(combo) = capture.key_event(event.code(), event.value() == 1) {
                    return Some(combo);
                }
            }
        }
        std::thread::sleep(Duration::from_millis(1));
    }
    None
}
