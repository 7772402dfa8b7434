//! Recognition backend handle.
//!
//! Wraps a slow-to-initialize OCR engine. Initialization happens once per
//! process, either on the preload thread or on the first `recognize` call,
//! whichever takes the construction lock first. Its outcome is latched: a
//! failed load is never retried.

mod tesseract;

use std::panic::{self, AssertUnwindSafe};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, OnceLock, PoisonError};
use std::thread::JoinHandle;

use image::{ImageFormat, RgbaImage};

use crate::error::OcrError;

pub use tesseract::TesseractLoader;

/// Returned by `recognize` when the engine found nothing.
pub const NO_TEXT_SENTINEL: &str = "[No text detected]";

const LOADER_PANICKED: &str = "model loader panicked";

/// A constructed OCR engine. Reads an image file, returns text fragments
/// in reading order.
pub trait TextEngine: Send + Sync {
    fn predict(&self, image_path: &Path) -> Result<Vec<String>, OcrError>;
}

/// Builds the engine. Called at most once per backend.
pub trait EngineLoader: Send + Sync {
    fn load(&self) -> Result<Box<dyn TextEngine>, OcrError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendState {
    Loading,
    Ready,
    Failed(String),
}

/// Cloneable handle shared between the UI thread and workers.
#[derive(Clone)]
pub struct RecognitionBackend {
    inner: Arc<Inner>,
}

struct Inner {
    loader: Box<dyn EngineLoader>,
    engine: Mutex<Option<Arc<dyn TextEngine>>>,
    outcome: OnceLock<Result<(), String>>,
    preload_started: AtomicBool,
}

impl RecognitionBackend {
    pub fn new(loader: impl EngineLoader + 'static) -> Self {
        Self {
            inner: Arc::new(Inner {
                loader: Box::new(loader),
                engine: Mutex::new(None),
                outcome: OnceLock::new(),
                preload_started: AtomicBool::new(false),
            }),
        }
    }

    /// Start loading the engine on a background thread. Only the first call
    /// spawns; later calls return `None` and drop `on_settled` unused.
    pub fn preload_async<F>(&self, on_settled: F) -> Option<JoinHandle<()>>
    where
        F: FnOnce(BackendState) + Send + 'static,
    {
        if self.inner.preload_started.swap(true, Ordering::AcqRel) {
            log::debug!("OCR preload already started");
            return None;
        }

        let backend = self.clone();
        let spawned = std::thread::Builder::new()
            .name("ocr-preload".into())
            .spawn(move || {
                let result = panic::catch_unwind(AssertUnwindSafe(|| backend.engine()));
                if result.is_err() {
                    backend.settle(Err(LOADER_PANICKED.into()));
                }
                on_settled(backend.state());
            });

        match spawned {
            Ok(handle) => Some(handle),
            Err(e) => {
                self.settle(Err(format!("failed to start model loader: {e}")));
                None
            }
        }
    }

    pub fn state(&self) -> BackendState {
        match self.inner.outcome.get() {
            None => BackendState::Loading,
            Some(Ok(())) => BackendState::Ready,
            Some(Err(reason)) => BackendState::Failed(reason.clone()),
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(self.inner.outcome.get(), Some(Ok(())))
    }

    pub fn load_error(&self) -> Option<String> {
        match self.inner.outcome.get() {
            Some(Err(reason)) => Some(reason.clone()),
            _ => None,
        }
    }

    /// Run OCR over `image`. Blocking; call from a worker thread.
    ///
    /// The image is written to a private temporary PNG for the engine and
    /// removed when this returns, on success or error.
    pub fn recognize(&self, image: &RgbaImage) -> Result<String, OcrError> {
        let engine = self.engine()?;

        let capture = tempfile::Builder::new()
            .prefix("screen-ocr-capture-")
            .suffix(".png")
            .tempfile()?;
        image.save_with_format(capture.path(), ImageFormat::Png)?;

        let fragments = engine.predict(capture.path())?;
        log::info!("OCR returned {} fragment(s)", fragments.len());
        Ok(join_fragments(&fragments))
    }

    fn engine(&self) -> Result<Arc<dyn TextEngine>, OcrError> {
        if let Some(reason) = self.load_error() {
            return Err(OcrError::BackendInit(reason));
        }

        let mut slot = self
            .inner
            .engine
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(engine) = slot.as_ref() {
            return Ok(engine.clone());
        }
        // A concurrent loader may have failed while we waited for the lock.
        if let Some(reason) = self.load_error() {
            return Err(OcrError::BackendInit(reason));
        }

        log::info!("Loading OCR engine...");
        let loaded = panic::catch_unwind(AssertUnwindSafe(|| self.inner.loader.load()))
            .unwrap_or_else(|_| Err(OcrError::BackendInit(LOADER_PANICKED.into())));
        match loaded {
            Ok(engine) => {
                let engine: Arc<dyn TextEngine> = Arc::from(engine);
                *slot = Some(engine.clone());
                self.settle(Ok(()));
                log::info!("OCR engine ready");
                Ok(engine)
            }
            Err(e) => {
                let reason = e.to_string();
                log::error!("OCR engine failed to load: {reason}");
                self.settle(Err(reason.clone()));
                Err(OcrError::BackendInit(reason))
            }
        }
    }

    fn settle(&self, outcome: Result<(), String>) {
        if self.inner.outcome.set(outcome).is_err() {
            log::debug!("OCR backend state already settled");
        }
    }
}

/// Join fragments line by line; empty output becomes the sentinel.
pub fn join_fragments(fragments: &[String]) -> String {
    let text = fragments.join("\n");
    let text = text.trim();
    if text.is_empty() {
        NO_TEXT_SENTINEL.to_string()
    } else {
        text.to_string()
    }
}
