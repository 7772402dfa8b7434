use std::sync::{Arc, Mutex};

use gtk4::gio;

use super::controller::CaptureController;
use crate::capture::{ScreenGrabber, XcapGrabber};
use crate::config::{Config, HotkeyConfig};
use crate::ocr::{BackendState, RecognitionBackend, TesseractLoader};
use crate::ui::dashboard::DashboardWidgets;

/// Events sent from background threads to the GTK main thread.
#[derive(Debug, Clone, PartialEq)]
pub enum AppEvent {
    CaptureRequested,
    TextReady(String),
    Error(String),
    Info(String),
    ShutdownRequested,
    ModelDownloadProgress(u64, u64),
    BackendSettled(BackendState),
}

/// Central application state. Lives on the GTK main thread inside Rc<RefCell<>>.
pub struct AppState {
    pub config: Config,
    pub shared_hotkey: Arc<Mutex<HotkeyConfig>>,
    pub tokio_rt: tokio::runtime::Runtime,
    pub controller: CaptureController,
    pub grabber: Arc<dyn ScreenGrabber>,
    pub backend_sender: async_channel::Sender<AppEvent>,

    /// Keeps the application alive while the control panel is hidden.
    pub hold_guard: Option<gio::ApplicationHoldGuard>,

    // UI handles
    pub dashboard: Option<DashboardWidgets>,
}

impl AppState {
    pub fn new(sender: async_channel::Sender<AppEvent>) -> std::io::Result<Self> {
        let config = Config::load();
        let shared_hotkey = Arc::new(Mutex::new(config.hotkey.clone()));
        let tokio_rt = tokio::runtime::Runtime::new()?;

        let progress_sender = sender.clone();
        let loader = TesseractLoader::new(tokio_rt.handle().clone(), move |done, total| {
            let _ = progress_sender.try_send(AppEvent::ModelDownloadProgress(done, total));
        });
        let controller = CaptureController::new(RecognitionBackend::new(loader), sender.clone());

        Ok(Self {
            config,
            shared_hotkey,
            tokio_rt,
            controller,
            grabber: Arc::new(XcapGrabber),
            backend_sender: sender,
            hold_guard: None,
            dashboard: None,
        })
    }
}

/// Helper to update the control panel's status line.
pub fn update_status(state: &std::rc::Rc<std::cell::RefCell<AppState>>, label_text: &str) {
    if let Some(ref dash) = state.borrow().dashboard {
        dash.status_label.set_text(label_text);
    }
}
