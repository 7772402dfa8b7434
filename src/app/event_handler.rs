use std::cell::RefCell;
use std::rc::Rc;

use gtk4::glib;
use gtk4::prelude::*;

use super::controller::{backend_failed_message, grab_failed_message};
use super::pipeline::dispatch_capture;
use super::state::{AppEvent, AppState, update_status};
use crate::error::CaptureError;
use crate::ocr::BackendState;
use crate::selection::{SelectionCallbacks, VirtualScreenRect};
use crate::ui::{dashboard, message, overlay};

/// Handle one queued event on the GTK main thread.
/// Returns `Break` once shutdown has been requested.
pub fn handle_app_event(
    state: &Rc<RefCell<AppState>>,
    app: &libadwaita::Application,
    event: AppEvent,
) -> glib::ControlFlow {
    match event {
        AppEvent::CaptureRequested => begin_capture(state, app),
        AppEvent::TextReady(text) => {
            log::info!("Handing off {} chars to the result window", text.chars().count());
            if let Err(e) = crate::handoff::deliver(&text) {
                log::error!("Result hand-off failed: {e}");
                show_error(state, &format!("Failed to open result window:\n{e}"));
            }
        }
        AppEvent::Error(msg) => {
            log::error!("{msg}");
            show_error(state, &msg);
        }
        AppEvent::Info(msg) => {
            log::info!("{msg}");
            let s = state.borrow();
            message::show_info(s.dashboard.as_ref().map(|d| &d.window), &msg);
        }
        AppEvent::ShutdownRequested => {
            log::info!("Shutdown requested");
            // Release the hold first so quit() is not kept waiting.
            drop(state.borrow_mut().hold_guard.take());
            app.quit();
            return glib::ControlFlow::Break;
        }
        AppEvent::ModelDownloadProgress(done, total) => {
            if let Some(ref dash) = state.borrow().dashboard {
                dashboard::set_download_progress(dash, done, total);
            }
        }
        AppEvent::BackendSettled(settled) => {
            if let Some(ref dash) = state.borrow().dashboard {
                dash.progress_bar.set_visible(false);
            }
            match settled {
                BackendState::Ready => update_status(state, "Ready"),
                BackendState::Failed(reason) => {
                    update_status(state, "Failed");
                    show_error(state, &backend_failed_message(&reason));
                }
                BackendState::Loading => update_status(state, "Loading..."),
            }
        }
    }
    glib::ControlFlow::Continue
}

fn show_error(state: &Rc<RefCell<AppState>>, msg: &str) {
    let s = state.borrow();
    message::show_error(s.dashboard.as_ref().map(|d| &d.window), msg);
}

/// Accept or reject a capture request and, when accepted, put the
/// selection overlay up. The session travels with whichever overlay
/// callback fires.
fn begin_capture(state: &Rc<RefCell<AppState>>, app: &libadwaita::Application) {
    let (controller, delay, rt, grabber, sender) = {
        let s = state.borrow();
        (
            s.controller.clone(),
            s.config.capture_delay(),
            s.tokio_rt.handle().clone(),
            s.grabber.clone(),
            s.backend_sender.clone(),
        )
    };

    log::debug!("Capture requested at stage {}", controller.stage());
    let Some(session) = controller.request() else {
        return;
    };

    let monitors = overlay::monitor_areas();
    let Some(screen) = VirtualScreenRect::union(
        monitors
            .iter()
            .map(|(_, m)| (m.left, m.top, m.width, m.height)),
    ) else {
        let err = CaptureError::Monitors("display reports no monitors".into());
        log::error!("{err}");
        session.finish(AppEvent::Error(grab_failed_message(&err)));
        return;
    };
    log::info!(
        "Virtual screen: {}x{} at ({}, {}) over {} monitor(s)",
        screen.width,
        screen.height,
        screen.left,
        screen.top,
        monitors.len()
    );

    let slot = Rc::new(RefCell::new(Some(session)));
    let cancel_slot = slot.clone();

    let callbacks = SelectionCallbacks::new(
        move |bbox| {
            if let Some(session) = slot.borrow_mut().take() {
                dispatch_capture(&rt, session, bbox, grabber, sender);
            }
        },
        move |reason| {
            if let Some(session) = cancel_slot.borrow_mut().take() {
                session.cancel(reason);
            }
        },
    );

    overlay::show_selection_overlay(app, &monitors, callbacks, delay);
}
