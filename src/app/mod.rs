mod controller;
mod dispatcher;
mod event_handler;
mod pipeline;
mod state;

pub use dispatcher::attach as attach_dispatcher;
pub use event_handler::handle_app_event;
pub use state::{AppEvent, AppState};
