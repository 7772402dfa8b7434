//! Capture pipeline state machine.
//!
//! Transitions:
//! - Idle -> AwaitingSelection (request accepted)
//! - AwaitingSelection -> Idle (overlay canceled)
//! - AwaitingSelection -> Capturing (region selected)
//! - Capturing -> Recognizing (pixels grabbed)
//! - Capturing | Recognizing -> Idle (finished, failed or panicked)
//!
//! The stage is shared between the UI thread and the worker that currently
//! owns the [`CaptureSession`]. Only an accepted request creates a session,
//! and dropping the session is the one place the stage returns to Idle, so
//! every exit path (including unwinding) clears the in-progress state.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use image::RgbaImage;

use super::state::AppEvent;
use crate::capture::ScreenGrabber;
use crate::error::{CaptureError, OcrError};
use crate::ocr::{BackendState, RecognitionBackend};
use crate::selection::{BoundingBox, CancelReason};

pub const ALREADY_RUNNING: &str = "OCR is already running.";
pub const STILL_LOADING: &str = "OCR models are still loading. Try again in a moment.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureStage {
    Idle,
    AwaitingSelection,
    Capturing,
    Recognizing,
}

impl fmt::Display for CaptureStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CaptureStage::Idle => write!(f, "Idle"),
            CaptureStage::AwaitingSelection => write!(f, "AwaitingSelection"),
            CaptureStage::Capturing => write!(f, "Capturing"),
            CaptureStage::Recognizing => write!(f, "Recognizing"),
        }
    }
}

pub fn backend_failed_message(reason: &str) -> String {
    format!("Model loading failed:\n{reason}")
}

pub fn grab_failed_message(err: &CaptureError) -> String {
    format!("Failed to capture screen region:\n{err}")
}

pub fn recognition_failed_message(err: &OcrError) -> String {
    format!("OCR failed:\n{err}")
}

fn lock(stage: &Mutex<CaptureStage>) -> MutexGuard<'_, CaptureStage> {
    stage.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Clone)]
pub struct CaptureController {
    stage: Arc<Mutex<CaptureStage>>,
    backend: RecognitionBackend,
    events: async_channel::Sender<AppEvent>,
}

impl CaptureController {
    pub fn new(backend: RecognitionBackend, events: async_channel::Sender<AppEvent>) -> Self {
        Self {
            stage: Arc::new(Mutex::new(CaptureStage::Idle)),
            backend,
            events,
        }
    }

    pub fn stage(&self) -> CaptureStage {
        *lock(&self.stage)
    }

    #[cfg(test)]
    pub fn in_progress(&self) -> bool {
        self.stage() != CaptureStage::Idle
    }

    pub fn backend(&self) -> &RecognitionBackend {
        &self.backend
    }

    /// Try to start a capture. Rejections are reported as events and leave
    /// the stage untouched.
    pub fn request(&self) -> Option<CaptureSession> {
        let mut stage = lock(&self.stage);
        if *stage != CaptureStage::Idle {
            log::info!("Ignoring capture request while stage={}", *stage);
            emit(&self.events, AppEvent::Info(ALREADY_RUNNING.into()));
            return None;
        }

        match self.backend.state() {
            BackendState::Failed(reason) => {
                emit(&self.events, AppEvent::Error(backend_failed_message(&reason)));
                return None;
            }
            BackendState::Loading => {
                log::info!("Capture requested while OCR models are loading");
                emit(&self.events, AppEvent::Info(STILL_LOADING.into()));
                return None;
            }
            BackendState::Ready => {}
        }

        log::info!("Capture stage: {} -> {}", *stage, CaptureStage::AwaitingSelection);
        *stage = CaptureStage::AwaitingSelection;
        Some(CaptureSession {
            stage: self.stage.clone(),
            backend: self.backend.clone(),
            events: self.events.clone(),
        })
    }
}

pub(super) fn emit(events: &async_channel::Sender<AppEvent>, event: AppEvent) {
    if events.try_send(event).is_err() {
        log::warn!("Event queue closed, dropping event");
    }
}

/// The one in-flight capture. Moves from the overlay callbacks to the
/// worker threads; dropping it returns the controller to Idle.
pub struct CaptureSession {
    stage: Arc<Mutex<CaptureStage>>,
    backend: RecognitionBackend,
    events: async_channel::Sender<AppEvent>,
}

impl CaptureSession {
    fn advance(&self, next: CaptureStage) {
        let mut stage = lock(&self.stage);
        log::info!("Capture stage: {} -> {next}", *stage);
        *stage = next;
    }

    /// The user dismissed the overlay. Not an error; nothing is reported.
    pub fn cancel(self, reason: CancelReason) {
        log::info!("Capture canceled: {reason}");
    }

    /// Blocking pixel grab over `bbox`.
    pub fn grab(
        &mut self,
        grabber: &dyn ScreenGrabber,
        bbox: BoundingBox,
    ) -> Result<RgbaImage, CaptureError> {
        self.advance(CaptureStage::Capturing);
        log::info!("Grabbing region {bbox}");
        grabber.grab(bbox)
    }

    /// Blocking recognition of a grabbed image.
    pub fn recognize(&mut self, image: &RgbaImage) -> Result<String, OcrError> {
        self.advance(CaptureStage::Recognizing);
        self.backend.recognize(image)
    }

    /// End the session and report its terminal event. The stage is back to
    /// Idle before the event is queued.
    pub fn finish(self, event: AppEvent) {
        let events = self.events.clone();
        drop(self);
        emit(&events, event);
    }
}

impl Drop for CaptureSession {
    fn drop(&mut self) {
        let mut stage = lock(&self.stage);
        if *stage != CaptureStage::Idle {
            log::info!("Capture stage: {} -> Idle", *stage);
        }
        *stage = CaptureStage::Idle;
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::ocr::tests::{ready_backend, CountingLoader};
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Grabber returning a blank image or a fixed error, counting calls.
    pub(crate) struct StubGrabber {
        pub calls: AtomicUsize,
        pub fail_with: Option<String>,
    }

    impl StubGrabber {
        pub fn ok() -> Self {
            Self { calls: AtomicUsize::new(0), fail_with: None }
        }

        pub fn failing(reason: &str) -> Self {
            Self { calls: AtomicUsize::new(0), fail_with: Some(reason.into()) }
        }
    }

    impl ScreenGrabber for StubGrabber {
        fn grab(&self, bbox: BoundingBox) -> Result<RgbaImage, CaptureError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match &self.fail_with {
                Some(reason) => Err(CaptureError::Monitors(reason.clone())),
                None => Ok(RgbaImage::new(bbox.width(), bbox.height())),
            }
        }
    }

    fn drain(rx: &async_channel::Receiver<AppEvent>) -> Vec<AppEvent> {
        std::iter::from_fn(|| rx.try_recv().ok()).collect()
    }

    const BBOX: BoundingBox = BoundingBox { x1: 50, y1: 50, x2: 250, y2: 300 };

    #[test]
    fn request_while_loading_is_rejected() {
        let (tx, rx) = async_channel::unbounded();
        let controller = CaptureController::new(RecognitionBackend::new(CountingLoader::ok(&[])), tx);

        assert!(controller.request().is_none());
        assert_eq!(controller.stage(), CaptureStage::Idle);
        assert_eq!(drain(&rx), vec![AppEvent::Info(STILL_LOADING.into())]);
    }

    #[test]
    fn failed_backend_reports_same_error_every_time() {
        let loader = CountingLoader::failing("tesseract not installed");
        let loads = loader.loads.clone();
        let backend = RecognitionBackend::new(loader);
        backend.preload_async(|_| {}).unwrap().join().unwrap();
        let (tx, rx) = async_channel::unbounded();
        let controller = CaptureController::new(backend, tx);

        for _ in 0..3 {
            assert!(controller.request().is_none());
        }

        let expected = AppEvent::Error("Model loading failed:\ntesseract not installed".into());
        assert_eq!(drain(&rx), vec![expected.clone(), expected.clone(), expected]);
        assert_eq!(loads.load(Ordering::SeqCst), 1);
        assert_eq!(controller.stage(), CaptureStage::Idle);
    }

    #[test]
    fn second_request_only_informs() {
        let (tx, rx) = async_channel::unbounded();
        let controller = CaptureController::new(ready_backend(&[]), tx);

        let session = controller.request().expect("first request accepted");
        assert_eq!(controller.stage(), CaptureStage::AwaitingSelection);
        assert!(controller.request().is_none());
        assert!(controller.request().is_none());

        assert_eq!(
            drain(&rx),
            vec![AppEvent::Info(ALREADY_RUNNING.into()), AppEvent::Info(ALREADY_RUNNING.into())]
        );
        drop(session);
        assert!(!controller.in_progress());
    }

    #[test]
    fn cancel_returns_to_idle_silently() {
        let (tx, rx) = async_channel::unbounded();
        let controller = CaptureController::new(ready_backend(&[]), tx);

        controller.request().unwrap().cancel(CancelReason::TooSmall);

        assert_eq!(controller.stage(), CaptureStage::Idle);
        assert!(drain(&rx).is_empty());
        assert!(controller.request().is_some());
    }

    #[test]
    fn stages_follow_pipeline() {
        let (tx, rx) = async_channel::unbounded();
        let controller = CaptureController::new(ready_backend(&["Hello", "World"]), tx);
        let grabber = StubGrabber::ok();

        let mut session = controller.request().unwrap();
        let image = session.grab(&grabber, BBOX).unwrap();
        assert_eq!(controller.stage(), CaptureStage::Capturing);
        assert_eq!(image.dimensions(), (200, 250));
        assert!(controller.request().is_none());

        let text = session.recognize(&image).unwrap();
        assert_eq!(controller.stage(), CaptureStage::Recognizing);
        assert!(controller.request().is_none());

        session.finish(AppEvent::TextReady(text));
        assert_eq!(controller.stage(), CaptureStage::Idle);
        assert_eq!(
            drain(&rx),
            vec![
                AppEvent::Info(ALREADY_RUNNING.into()),
                AppEvent::Info(ALREADY_RUNNING.into()),
                AppEvent::TextReady("Hello\nWorld".into()),
            ]
        );
    }

    #[test]
    fn busy_in_every_stage_rejects_without_touching_stage() {
        for busy in [
            CaptureStage::AwaitingSelection,
            CaptureStage::Capturing,
            CaptureStage::Recognizing,
        ] {
            let (tx, rx) = async_channel::unbounded();
            let controller = CaptureController::new(ready_backend(&[]), tx);
            let session = controller.request().unwrap();
            session.advance(busy);

            assert!(controller.request().is_none());
            assert_eq!(controller.stage(), busy);
            assert_eq!(drain(&rx), vec![AppEvent::Info(ALREADY_RUNNING.into())]);

            drop(session);
            assert_eq!(controller.stage(), CaptureStage::Idle);
        }
    }

    #[test]
    fn panic_in_worker_clears_stage() {
        let (tx, _rx) = async_channel::unbounded();
        let controller = CaptureController::new(ready_backend(&[]), tx);
        let mut session = controller.request().unwrap();

        let worker = std::thread::spawn(move || {
            session.advance(CaptureStage::Capturing);
            panic!("grab exploded");
        });
        assert!(worker.join().is_err());

        assert_eq!(controller.stage(), CaptureStage::Idle);
        assert!(controller.request().is_some());
    }

    #[test]
    fn messages_carry_failure_description() {
        let err = CaptureError::Monitors("X server gone".into());
        assert_eq!(
            grab_failed_message(&err),
            "Failed to capture screen region:\nfailed to enumerate monitors: X server gone"
        );
        let err = OcrError::Recognition("bad png".into());
        assert_eq!(recognition_failed_message(&err), "OCR failed:\nbad png");
    }
}
