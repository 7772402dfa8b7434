mod app;
mod capture;
mod config;
mod error;
mod handoff;
mod hotkey;
mod ocr;
mod selection;
mod ui;

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::PoisonError;

use gtk4::prelude::*;
use gtk4::{gio, glib};
use libadwaita::prelude::*;

use app::{AppEvent, AppState};

fn main() -> glib::ExitCode {
    env_logger::init();

    let args: Vec<String> = std::env::args().collect();
    match handoff::result_path_arg(&args) {
        Some(Ok(path)) => return ui::result_window::run(&path),
        Some(Err(())) => {
            eprintln!("usage: screen-ocr {} <path>", handoff::RESULT_FLAG);
            return glib::ExitCode::FAILURE;
        }
        None => {}
    }

    log::info!("Screen OCR starting");

    let application = libadwaita::Application::builder()
        .application_id("com.github.screen-ocr")
        .build();

    application.connect_activate(on_activate);
    application.run()
}

fn on_activate(app: &libadwaita::Application) {
    // A second launch just raises the existing control panel.
    if let Some(window) = app.active_window() {
        window.present();
        return;
    }

    let (event_tx, event_rx) = async_channel::unbounded::<AppEvent>();

    let state = match AppState::new(event_tx.clone()) {
        Ok(state) => Rc::new(RefCell::new(state)),
        Err(e) => {
            log::error!("Failed to start async runtime: {e}");
            eprintln!("screen-ocr: failed to start async runtime: {e}");
            std::process::exit(1);
        }
    };

    let dashboard = ui::dashboard::build_dashboard(
        app,
        "Loading...",
        &state.borrow().config.hotkey.display_name,
    );

    // Control panel entries and menu actions only enqueue events.
    {
        let sender = event_tx.clone();
        dashboard.capture_row.connect_activated(move |_| {
            let _ = sender.try_send(AppEvent::CaptureRequested);
        });
    }

    let capture_action = gio::SimpleAction::new("capture", None);
    {
        let sender = event_tx.clone();
        capture_action.connect_activate(move |_, _| {
            let _ = sender.try_send(AppEvent::CaptureRequested);
        });
    }
    app.add_action(&capture_action);

    let hide_action = gio::SimpleAction::new("hide-window", None);
    {
        let window = dashboard.window.clone();
        hide_action.connect_activate(move |_, _| window.set_visible(false));
    }
    app.add_action(&hide_action);

    let quit_action = gio::SimpleAction::new("quit", None);
    {
        let sender = event_tx.clone();
        quit_action.connect_activate(move |_, _| {
            let _ = sender.try_send(AppEvent::ShutdownRequested);
        });
    }
    app.add_action(&quit_action);

    // Wire up the "Change" hotkey button
    {
        let state_clone = state.clone();
        let dash_window = dashboard.window.clone();
        dashboard.change_hotkey_button.connect_clicked(move |_| {
            let state_inner = state_clone.clone();
            ui::hotkey_dialog::show_hotkey_dialog(&dash_window, move |result| {
                let Some(new_hotkey) = result else {
                    log::info!("Hotkey change canceled or timed out");
                    return;
                };
                log::info!("New hotkey: {}", new_hotkey.display_name);
                let mut s = state_inner.borrow_mut();
                *s.shared_hotkey
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner) = new_hotkey.clone();
                s.config.hotkey = new_hotkey.clone();
                if let Err(e) = s.config.save() {
                    log::warn!("Failed to save config: {e}");
                }
                if let Some(ref dash) = s.dashboard {
                    dash.hotkey_label.set_text(&new_hotkey.display_name);
                }
            });
        });
    }

    {
        let mut s = state.borrow_mut();
        s.dashboard = Some(dashboard);
        s.hold_guard = Some(app.hold());
    }

    if let Some(ref dash) = state.borrow().dashboard {
        dash.window.present();
    }

    // Without a hotkey the app has no way to be triggered in the background.
    {
        let shared_hotkey = state.borrow().shared_hotkey.clone();
        if let Err(e) = hotkey::start_listener(event_tx.clone(), shared_hotkey) {
            log::error!("Failed to start hotkey listener: {e}");
            eprintln!("screen-ocr: failed to start hotkey listener: {e}");
            std::process::exit(1);
        }
    }

    // Drain the event queue on the main loop
    {
        let tick = state.borrow().config.event_tick();
        let state_clone = state.clone();
        let app_clone = app.clone();
        app::attach_dispatcher(event_rx, tick, move |event| {
            app::handle_app_event(&state_clone, &app_clone, event)
        });
    }

    // Load the OCR engine in the background
    {
        let backend = state.borrow().controller.backend().clone();
        let sender = event_tx;
        let settled_sender = sender.clone();
        let started = backend.preload_async(move |settled| {
            log::info!("OCR backend settled: {settled:?}");
            let _ = settled_sender.try_send(AppEvent::BackendSettled(settled));
        });
        if started.is_none() {
            log::info!("OCR backend already settled (ready: {})", backend.is_ready());
            let _ = sender.try_send(AppEvent::BackendSettled(backend.state()));
        }
    }
}
