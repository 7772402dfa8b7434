//! The result viewer, run as its own process (`screen-ocr --result <path>`).

use std::path::Path;

use gtk4::prelude::*;
use gtk4::{gio, glib};
use libadwaita::prelude::*;

const APP_ID: &str = "com.github.screen-ocr.result";
const TITLE: &str = "Screen OCR Result";

/// Suggested file name for saving a result taken at `now`.
pub fn default_file_name(now: chrono::NaiveDateTime) -> String {
    now.format("ocr-%Y%m%d-%H%M%S.txt").to_string()
}

/// Take the hand-off file and show its text until the window is closed.
pub fn run(path: &Path) -> glib::ExitCode {
    let text = match crate::handoff::take_result(path) {
        Ok(text) => text,
        Err(e) => {
            log::error!("Failed to read result file {}: {e}", path.display());
            String::new()
        }
    };
    log::info!("Showing {} chars of recognized text", text.chars().count());

    let application = libadwaita::Application::builder()
        .application_id(APP_ID)
        .flags(gio::ApplicationFlags::NON_UNIQUE)
        .build();
    application.connect_activate(move |app| build_window(app, &text));

    // Our own argv holds --result; GApplication must not try to parse it.
    let program = std::env::args().next().unwrap_or_else(|| "screen-ocr".into());
    application.run_with_args(&[program])
}

fn build_window(app: &libadwaita::Application, text: &str) {
    let window = libadwaita::ApplicationWindow::builder()
        .application(app)
        .title(TITLE)
        .default_width(1200)
        .default_height(900)
        .width_request(720)
        .height_request(480)
        .build();

    let toolbar_view = libadwaita::ToolbarView::new();
    toolbar_view.add_top_bar(&libadwaita::HeaderBar::new());

    let buffer = gtk4::TextBuffer::new(None);
    buffer.set_text(text);
    let text_view = gtk4::TextView::builder()
        .buffer(&buffer)
        .monospace(true)
        .editable(true)
        .wrap_mode(gtk4::WrapMode::WordChar)
        .top_margin(12)
        .bottom_margin(12)
        .left_margin(12)
        .right_margin(12)
        .build();
    let scrolled = gtk4::ScrolledWindow::builder()
        .vexpand(true)
        .child(&text_view)
        .build();

    let save_button = gtk4::Button::with_label("Save");
    save_button.add_css_class("suggested-action");
    let copy_button = gtk4::Button::with_label("Copy");
    let close_button = gtk4::Button::with_label("Close");

    let buttons = gtk4::Box::new(gtk4::Orientation::Horizontal, 8);
    buttons.set_halign(gtk4::Align::End);
    buttons.set_margin_start(12);
    buttons.set_margin_end(12);
    buttons.set_margin_top(8);
    buttons.set_margin_bottom(12);
    buttons.append(&save_button);
    buttons.append(&copy_button);
    buttons.append(&close_button);

    let content = gtk4::Box::new(gtk4::Orientation::Vertical, 0);
    content.append(&scrolled);
    content.append(&buttons);

    let toasts = libadwaita::ToastOverlay::new();
    toasts.set_child(Some(&content));
    toolbar_view.set_content(Some(&toasts));
    window.set_content(Some(&toolbar_view));

    {
        let window_ref = window.clone();
        let buffer = buffer.clone();
        let toasts = toasts.clone();
        save_button.connect_clicked(move |_| {
            save_text(&window_ref, &buffer, &toasts);
        });
    }
    {
        let window_ref = window.clone();
        let buffer = buffer.clone();
        let toasts = toasts.clone();
        copy_button.connect_clicked(move |_| {
            window_ref.clipboard().set_text(&buffer_text(&buffer));
            toasts.add_toast(libadwaita::Toast::new("Copied to clipboard"));
        });
    }
    {
        let window_ref = window.clone();
        close_button.connect_clicked(move |_| window_ref.close());
    }

    window.present();
    text_view.grab_focus();
}

fn buffer_text(buffer: &gtk4::TextBuffer) -> String {
    buffer
        .text(&buffer.start_iter(), &buffer.end_iter(), false)
        .to_string()
}

fn save_text(
    window: &libadwaita::ApplicationWindow,
    buffer: &gtk4::TextBuffer,
    toasts: &libadwaita::ToastOverlay,
) {
    let dialog = gtk4::FileDialog::builder()
        .title("Save OCR Text")
        .initial_name(default_file_name(chrono::Local::now().naive_local()))
        .modal(true)
        .build();

    let contents = buffer_text(buffer);
    let toasts = toasts.clone();
    dialog.save(Some(window), None::<&gio::Cancellable>, move |result| {
        let file = match result {
            Ok(file) => file,
            Err(e) => {
                if !e.matches(gtk4::DialogError::Dismissed) {
                    log::warn!("Save dialog failed: {e}");
                }
                return;
            }
        };
        let Some(path) = file.path() else {
            toasts.add_toast(libadwaita::Toast::new("Cannot save to a non-local location"));
            return;
        };
        match std::fs::write(&path, contents.as_bytes()) {
            Ok(()) => {
                log::info!("Saved OCR text to {}", path.display());
                toasts.add_toast(libadwaita::Toast::new("Saved"));
            }
            Err(e) => {
                log::error!("Failed to save {}: {e}", path.display());
                toasts.add_toast(libadwaita::Toast::new(&format!("Failed to save: {e}")));
            }
        }
    });
}
