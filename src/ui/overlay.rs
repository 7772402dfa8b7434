//! Region selection overlay, one full-screen window per monitor.

use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use gtk4::prelude::*;
use gtk4::{gdk, glib};
#[cfg(target_os = "linux")]
use gtk4_layer_shell::LayerShell;

use crate::selection::{CancelReason, SelectionCallbacks, SelectionDrag, VirtualScreenRect};

/// Every monitor GDK reports, with its geometry in virtual-screen
/// coordinates.
pub fn monitor_areas() -> Vec<(gdk::Monitor, VirtualScreenRect)> {
    let Some(display) = gdk::Display::default() else {
        return Vec::new();
    };
    let monitors = display.monitors();
    (0..monitors.n_items())
        .filter_map(|i| monitors.item(i))
        .filter_map(|obj| obj.downcast::<gdk::Monitor>().ok())
        .map(|monitor| {
            let g = monitor.geometry();
            let area = VirtualScreenRect {
                left: g.x(),
                top: g.y(),
                width: g.width(),
                height: g.height(),
            };
            (monitor, area)
        })
        .collect()
}

fn install_css() {
    let css_provider = gtk4::CssProvider::new();
    css_provider.load_from_string(
        r#"
        window.selection-overlay {
            background-color: rgba(0, 0, 0, 0.22);
        }
        "#,
    );
    if let Some(display) = gdk::Display::default() {
        gtk4::style_context_add_provider_for_display(
            &display,
            &css_provider,
            gtk4::STYLE_PROVIDER_PRIORITY_APPLICATION,
        );
    }
}

/// The overlay windows of one selection. Finishing on any of them tears
/// all of them down.
#[derive(Clone, Default)]
struct OverlayGroup {
    windows: Rc<RefCell<Vec<gtk4::Window>>>,
}

impl OverlayGroup {
    fn add(&self, window: &gtk4::Window) {
        self.windows.borrow_mut().push(window.clone());
    }

    fn destroy_all(&self) {
        let windows = std::mem::take(&mut *self.windows.borrow_mut());
        for window in windows {
            window.destroy();
        }
    }
}

/// Cover every monitor with an overlay and let the user drag a rectangle.
///
/// Exactly one of the callbacks runs. Completion is delayed by `delay` after
/// the overlays are destroyed so they have left the screen before pixels are
/// grabbed.
pub fn show_selection_overlay(
    app: &libadwaita::Application,
    monitors: &[(gdk::Monitor, VirtualScreenRect)],
    callbacks: SelectionCallbacks,
    delay: Duration,
) {
    install_css();

    let callbacks = Rc::new(RefCell::new(callbacks));
    let group = OverlayGroup::default();

    for (monitor, area) in monitors {
        let window = build_monitor_overlay(app, monitor, *area, &callbacks, &group, delay);
        group.add(&window);
    }
    for window in group.windows.borrow().iter() {
        window.present();
    }
}

fn build_monitor_overlay(
    app: &libadwaita::Application,
    monitor: &gdk::Monitor,
    area: VirtualScreenRect,
    callbacks: &Rc<RefCell<SelectionCallbacks>>,
    group: &OverlayGroup,
    delay: Duration,
) -> gtk4::Window {
    let window = gtk4::Window::builder()
        .application(app)
        .title("Select Region")
        .decorated(false)
        .resizable(false)
        .default_width(area.width)
        .default_height(area.height)
        .build();
    window.add_css_class("selection-overlay");

    let drag_state = Rc::new(RefCell::new(SelectionDrag::default()));

    let area_widget = gtk4::DrawingArea::new();
    area_widget.set_hexpand(true);
    area_widget.set_vexpand(true);
    area_widget.set_cursor_from_name(Some("crosshair"));

    let drag_for_draw = drag_state.clone();
    area_widget.set_draw_func(move |_area, cr, _width, _height| {
        if let Some((x, y, w, h)) = drag_for_draw.borrow().rect() {
            draw_selection(cr, x, y, w, h);
        }
    });

    let gesture = gtk4::GestureDrag::new();
    gesture.set_button(gdk::BUTTON_PRIMARY);
    {
        let drag_state = drag_state.clone();
        let widget = area_widget.clone();
        gesture.connect_drag_begin(move |_, x, y| {
            drag_state.borrow_mut().press(x as i32, y as i32);
            widget.queue_draw();
        });
    }
    {
        let drag_state = drag_state.clone();
        let widget = area_widget.clone();
        gesture.connect_drag_update(move |g, dx, dy| {
            if let Some((sx, sy)) = g.start_point() {
                drag_state
                    .borrow_mut()
                    .motion((sx + dx) as i32, (sy + dy) as i32);
                widget.queue_draw();
            }
        });
    }
    {
        let callbacks = callbacks.clone();
        let group = group.clone();
        gesture.connect_drag_end(move |g, dx, dy| {
            let (sx, sy) = g.start_point().unwrap_or_default();
            let result = drag_state
                .borrow_mut()
                .release((sx + dx) as i32, (sy + dy) as i32, &area);
            group.destroy_all();

            match result {
                Ok(bbox) => {
                    log::info!("Region selected: {bbox}");
                    if let Some(complete) = callbacks.borrow_mut().take_complete() {
                        glib::timeout_add_local_once(delay, move || complete(bbox));
                    }
                }
                Err(reason) => {
                    log::info!("{reason}");
                    callbacks.borrow_mut().cancel(reason);
                }
            }
        });
    }
    area_widget.add_controller(gesture);

    let keys = gtk4::EventControllerKey::new();
    {
        let callbacks = callbacks.clone();
        let group = group.clone();
        keys.connect_key_pressed(move |_, key, _, _| {
            if key != gdk::Key::Escape {
                return glib::Propagation::Proceed;
            }
            group.destroy_all();
            callbacks.borrow_mut().cancel(CancelReason::Canceled);
            glib::Propagation::Stop
        });
    }
    window.add_controller(keys);

    // Compositor- or WM-initiated close of any overlay counts as a cancel.
    {
        let callbacks = callbacks.clone();
        let group = group.clone();
        window.connect_close_request(move |_| {
            group.destroy_all();
            callbacks.borrow_mut().cancel(CancelReason::Canceled);
            glib::Propagation::Stop
        });
    }

    window.set_child(Some(&area_widget));
    place_on_monitor(&window, monitor);
    window
}

fn place_on_monitor(window: &gtk4::Window, monitor: &gdk::Monitor) {
    #[cfg(target_os = "linux")]
    {
        let is_wayland = std::env::var("XDG_SESSION_TYPE")
            .map(|s| s == "wayland")
            .unwrap_or(false);

        if is_wayland && gtk4_layer_shell::is_supported() {
            window.init_layer_shell();
            window.set_layer(gtk4_layer_shell::Layer::Overlay);
            window.set_monitor(Some(monitor));
            for edge in [
                gtk4_layer_shell::Edge::Top,
                gtk4_layer_shell::Edge::Bottom,
                gtk4_layer_shell::Edge::Left,
                gtk4_layer_shell::Edge::Right,
            ] {
                window.set_anchor(edge, true);
            }
            window.set_exclusive_zone(-1);
            window.set_keyboard_mode(gtk4_layer_shell::KeyboardMode::Exclusive);
            return;
        }
    }

    window.fullscreen_on_monitor(monitor);
}

fn draw_selection(cr: &gtk4::cairo::Context, x: i32, y: i32, w: i32, h: i32) {
    let (x, y, w, h) = (x as f64, y as f64, w as f64, h as f64);
    cr.set_source_rgba(1.0, 1.0, 1.0, 0.08);
    cr.rectangle(x, y, w, h);
    let _ = cr.fill();

    // #58a6ff
    cr.set_source_rgb(88.0 / 255.0, 166.0 / 255.0, 1.0);
    cr.set_line_width(2.0);
    cr.rectangle(x, y, w, h);
    let _ = cr.stroke();
}
