use gtk4::prelude::*;
use libadwaita::prelude::*;

use crate::config::HotkeyConfig;

/// Ask the user for a new capture hotkey.
///
/// Key events are read on a helper thread by the platform listener; the
/// dialog closes as soon as a combo arrives or the capture times out.
/// `on_result` runs on the GTK main thread, with `None` on timeout or when
/// the capture thread could not start.
pub fn show_hotkey_dialog<F>(parent: &libadwaita::ApplicationWindow, on_result: F)
where
    F: Fn(Option<HotkeyConfig>) + 'static,
{
    let dialog = libadwaita::AlertDialog::builder()
        .heading("Change Capture Hotkey")
        .body("Press the new key combination...\n(modifier + key, e.g. Ctrl+Alt+O)\n\nTimes out after 10 seconds.")
        .build();
    dialog.add_response("cancel", "Cancel");

    let (tx, rx) = async_channel::bounded::<Option<HotkeyConfig>>(1);

    let spawned = std::thread::Builder::new()
        .name("hotkey-capture".into())
        .spawn(move || {
            let _ = tx.try_send(crate::hotkey::capture_hotkey_combo());
        });
    if let Err(e) = spawned {
        log::error!("Failed to spawn hotkey capture thread: {e}");
        on_result(None);
        return;
    }

    let dialog_ref = dialog.clone();
    gtk4::glib::spawn_future_local(async move {
        if let Ok(result) = rx.recv().await {
            dialog_ref.close();
            on_result(result);
        }
    });

    dialog.present(Some(parent));
}
