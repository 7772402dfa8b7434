pub mod dashboard;
pub mod hotkey_dialog;
pub mod message;
pub mod overlay;
pub mod result_window;
