use std::time::Duration;

use gtk4::glib;

/// Take every event queued at call time, oldest first, without blocking.
/// Events sent while the batch is handled wait for the next tick.
pub fn drain<T>(rx: &async_channel::Receiver<T>) -> Vec<T> {
    let pending = rx.len();
    let mut events = Vec::with_capacity(pending);
    for _ in 0..pending {
        match rx.try_recv() {
            Ok(event) => events.push(event),
            Err(_) => break,
        }
    }
    events
}

/// Drain `rx` on the GTK main loop every `tick`. Returning `Break` from
/// `handle` stops the dispatcher; the rest of that batch is dropped.
pub fn attach<T, F>(rx: async_channel::Receiver<T>, tick: Duration, mut handle: F) -> glib::SourceId
where
    T: 'static,
    F: FnMut(T) -> glib::ControlFlow + 'static,
{
    glib::timeout_add_local(tick, move || {
        for event in drain(&rx) {
            if matches!(handle(event), glib::ControlFlow::Break) {
                log::info!("Event dispatcher stopped");
                return glib::ControlFlow::Break;
            }
        }
        glib::ControlFlow::Continue
    })
}
