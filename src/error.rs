use thiserror::Error;

/// Failures of the recognition backend.
#[derive(Debug, Error)]
pub enum OcrError {
    /// One-time engine initialization failed. Permanent for the process.
    #[error("{0}")]
    BackendInit(String),
    #[error("{0}")]
    Recognition(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("image encoding failed: {0}")]
    Image(#[from] image::ImageError),
    #[error("model download failed: {0}")]
    Download(#[from] reqwest::Error),
}

/// Failures of the pixel grab step.
#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("failed to enumerate monitors: {0}")]
    Monitors(String),
    #[error("no monitor intersects region ({x1}, {y1}) - ({x2}, {y2})")]
    NoMonitor { x1: i32, y1: i32, x2: i32, y2: i32 },
    #[error("failed to capture monitor {name}: {reason}")]
    Grab { name: String, reason: String },
    #[error("selected region is empty")]
    EmptyRegion,
}

/// Fatal startup failure of the global hotkey listener.
#[derive(Debug, Error)]
pub enum HotkeyError {
    #[error("no keyboard devices found. Is the user in the 'input' group?")]
    NoKeyboards,
    #[error("failed to start hotkey listener: {0}")]
    Io(#[from] std::io::Error),
}
