use std::sync::Arc;

use super::controller::{emit, grab_failed_message, recognition_failed_message, CaptureSession};
use super::state::AppEvent;
use crate::capture::ScreenGrabber;
use crate::selection::BoundingBox;

/// Run grab then recognition for an accepted selection on the tokio runtime.
///
/// Each step runs in its own blocking task. Recognition starts only after
/// the grab succeeded, so the events of one capture are ordered. Exactly one
/// terminal event is sent, even when a step panics.
pub fn dispatch_capture(
    rt: &tokio::runtime::Handle,
    session: CaptureSession,
    bbox: BoundingBox,
    grabber: Arc<dyn ScreenGrabber>,
    sender: async_channel::Sender<AppEvent>,
) {
    rt.spawn(async move {
        let grabbed = tokio::task::spawn_blocking(move || {
            let mut session = session;
            let result = session.grab(grabber.as_ref(), bbox);
            (session, result)
        })
        .await;

        let (session, image) = match grabbed {
            Ok((session, Ok(image))) => (session, image),
            Ok((session, Err(e))) => {
                log::error!("Screen grab failed: {e}");
                session.finish(AppEvent::Error(grab_failed_message(&e)));
                return;
            }
            Err(e) => {
                log::error!("Screen grab task panicked: {e}");
                emit(
                    &sender,
                    AppEvent::Error(format!(
                        "Failed to capture screen region:\ncapture task panicked: {e}"
                    )),
                );
                return;
            }
        };

        let recognized = tokio::task::spawn_blocking(move || {
            let mut session = session;
            let result = session.recognize(&image);
            (session, result)
        })
        .await;

        match recognized {
            Ok((session, Ok(text))) => {
                log::info!("Recognized {} chars", text.chars().count());
                session.finish(AppEvent::TextReady(text));
            }
            Ok((session, Err(e))) => {
                log::error!("Recognition failed: {e}");
                session.finish(AppEvent::Error(recognition_failed_message(&e)));
            }
            Err(e) => {
                log::error!("Recognition task panicked: {e}");
                emit(
                    &sender,
                    AppEvent::Error(format!("OCR failed:\nrecognition task panicked: {e}")),
                );
            }
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::controller::tests::StubGrabber;
    use crate::app::controller::{CaptureController, CaptureStage};
    use crate::error::CaptureError;
    use crate::ocr::tests::ready_backend;
    use image::RgbaImage;
    use std::sync::atomic::Ordering;
    use std::time::Duration;
    use tokio::time::timeout;

    const BBOX: BoundingBox = BoundingBox { x1: 50, y1: 50, x2: 250, y2: 300 };

    struct PanickingGrabber;

    impl ScreenGrabber for PanickingGrabber {
        fn grab(&self, _bbox: BoundingBox) -> Result<RgbaImage, CaptureError> {
            panic!("display connection lost");
        }
    }

    async fn next_event(rx: &async_channel::Receiver<AppEvent>) -> AppEvent {
        timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("timed out waiting for event")
            .expect("channel closed")
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn successful_capture_delivers_joined_text() {
        let (tx, rx) = async_channel::unbounded();
        let controller = CaptureController::new(ready_backend(&["Hello", "World"]), tx.clone());
        let session = controller.request().unwrap();

        dispatch_capture(&tokio::runtime::Handle::current(), session, BBOX, Arc::new(StubGrabber::ok()), tx);

        assert_eq!(next_event(&rx).await, AppEvent::TextReady("Hello\nWorld".into()));
        assert_eq!(controller.stage(), CaptureStage::Idle);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn grab_failure_reports_and_resets() {
        let (tx, rx) = async_channel::unbounded();
        let controller = CaptureController::new(ready_backend(&["unused"]), tx.clone());
        let grabber = Arc::new(StubGrabber::failing("no display"));
        let session = controller.request().unwrap();

        dispatch_capture(&tokio::runtime::Handle::current(), session, BBOX, grabber.clone(), tx);

        match next_event(&rx).await {
            AppEvent::Error(msg) => {
                assert!(msg.starts_with("Failed to capture screen region:"));
                assert!(msg.contains("no display"));
            }
            other => panic!("unexpected event {other:?}"),
        }
        assert_eq!(controller.stage(), CaptureStage::Idle);
        assert!(!controller.in_progress());
        assert_eq!(grabber.calls.load(Ordering::SeqCst), 1);
        assert!(rx.is_empty());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn panicking_grab_still_reports_once() {
        let (tx, rx) = async_channel::unbounded();
        let controller = CaptureController::new(ready_backend(&[]), tx.clone());
        let session = controller.request().unwrap();

        dispatch_capture(&tokio::runtime::Handle::current(), session, BBOX, Arc::new(PanickingGrabber), tx);

        assert!(matches!(next_event(&rx).await, AppEvent::Error(msg) if msg.contains("panicked")));
        assert_eq!(controller.stage(), CaptureStage::Idle);
        assert!(rx.is_empty());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn closed_queue_after_panic_still_resets() {
        let (tx, rx) = async_channel::unbounded();
        let controller = CaptureController::new(ready_backend(&[]), tx.clone());
        let session = controller.request().unwrap();
        drop(rx);

        dispatch_capture(&tokio::runtime::Handle::current(), session, BBOX, Arc::new(PanickingGrabber), tx);

        timeout(Duration::from_secs(5), async {
            while controller.stage() != CaptureStage::Idle {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("stage never returned to Idle");
        assert!(controller.request().is_some());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn empty_recognition_delivers_sentinel() {
        let (tx, rx) = async_channel::unbounded();
        let controller = CaptureController::new(ready_backend(&[]), tx.clone());
        let session = controller.request().unwrap();

        dispatch_capture(&tokio::runtime::Handle::current(), session, BBOX, Arc::new(StubGrabber::ok()), tx);

        assert_eq!(
            next_event(&rx).await,
            AppEvent::TextReady(crate::ocr::NO_TEXT_SENTINEL.into())
        );
    }
}
