use gtk4::prelude::*;
use libadwaita::prelude::*;

const HEADING: &str = "Screen OCR";

/// Modal error notification.
pub fn show_error(parent: Option<&libadwaita::ApplicationWindow>, body: &str) {
    present(parent, body, true);
}

/// Modal informational notification.
pub fn show_info(parent: Option<&libadwaita::ApplicationWindow>, body: &str) {
    present(parent, body, false);
}

fn present(parent: Option<&libadwaita::ApplicationWindow>, body: &str, is_error: bool) {
    let dialog = libadwaita::AlertDialog::builder()
        .heading(HEADING)
        .body(body)
        .build();
    dialog.add_response("ok", "OK");
    dialog.set_default_response(Some("ok"));
    dialog.set_close_response("ok");
    if is_error {
        dialog.set_response_appearance("ok", libadwaita::ResponseAppearance::Destructive);
    }

    // A dialog attached to a hidden panel would never be seen; float it instead.
    match parent.filter(|w| w.is_visible()) {
        Some(window) => dialog.present(Some(window)),
        None => dialog.present(None::<&gtk4::Widget>),
    }
}
