use std::path::{Path, PathBuf};
use std::process::Command;

use super::{EngineLoader, TextEngine};
use crate::error::OcrError;

const MODEL_URL: &str =
    "https://github.com/tesseract-ocr/tessdata_fast/raw/main/eng.traineddata";
const LANGUAGE: &str = "eng";
const TESSERACT_BIN: &str = "tesseract";

/// Directory for model storage: ~/.local/share/screen-ocr/tessdata/
fn tessdata_dir() -> PathBuf {
    let mut p = dirs::data_dir().unwrap_or_else(|| PathBuf::from("."));
    p.push("screen-ocr");
    p.push("tessdata");
    p
}

fn model_path(dir: &Path) -> PathBuf {
    dir.join(format!("{LANGUAGE}.traineddata"))
}

/// Download the traineddata file, reporting `(bytes_downloaded, total_bytes)`.
/// `total` may be 0 if unknown. Writes to a `.part` file first so an
/// interrupted download is never mistaken for a model.
async fn download_model<F>(dir: &Path, on_progress: F) -> Result<(), OcrError>
where
    F: Fn(u64, u64),
{
    use futures_util::StreamExt;
    use tokio::io::AsyncWriteExt;

    tokio::fs::create_dir_all(dir).await?;

    let response = reqwest::get(MODEL_URL).await?.error_for_status()?;
    let total = response.content_length().unwrap_or(0);
    let mut downloaded: u64 = 0;

    let path = model_path(dir);
    let partial = path.with_extension("traineddata.part");
    let mut file = tokio::fs::File::create(&partial).await?;
    let mut stream = response.bytes_stream();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        file.write_all(&chunk).await?;
        downloaded += chunk.len() as u64;
        on_progress(downloaded, total);
    }

    file.flush().await?;
    drop(file);
    tokio::fs::rename(&partial, &path).await?;
    log::info!("Model downloaded to {}", path.display());
    Ok(())
}

type ProgressFn = Box<dyn Fn(u64, u64) + Send + Sync>;

/// Loads the Tesseract engine: fetches the model on first run, then checks
/// that the `tesseract` binary is runnable.
pub struct TesseractLoader {
    runtime: tokio::runtime::Handle,
    tessdata: PathBuf,
    on_progress: ProgressFn,
}

impl TesseractLoader {
    /// `runtime` drives the model download; `load` must not be called from
    /// one of its worker threads.
    pub fn new<F>(runtime: tokio::runtime::Handle, on_progress: F) -> Self
    where
        F: Fn(u64, u64) + Send + Sync + 'static,
    {
        Self {
            runtime,
            tessdata: tessdata_dir(),
            on_progress: Box::new(on_progress),
        }
    }
}

impl EngineLoader for TesseractLoader {
    fn load(&self) -> Result<Box<dyn TextEngine>, OcrError> {
        if !model_path(&self.tessdata).exists() {
            log::info!("Tesseract model not found, starting download");
            self.runtime
                .block_on(download_model(&self.tessdata, &self.on_progress))
                .map_err(|e| OcrError::BackendInit(format!("Model download failed: {e}")))?;
        }

        let output = Command::new(TESSERACT_BIN)
            .arg("--version")
            .output()
            .map_err(|e| OcrError::BackendInit(format!("Failed to run {TESSERACT_BIN}: {e}")))?;
        if !output.status.success() {
            return Err(OcrError::BackendInit(format!(
                "{TESSERACT_BIN} --version exited with status {}",
                output.status
            )));
        }
        let version = String::from_utf8_lossy(&output.stdout);
        log::info!(
            "Using {}",
            version.lines().next().unwrap_or(TESSERACT_BIN).trim()
        );

        Ok(Box::new(TesseractEngine {
            tessdata: self.tessdata.clone(),
        }))
    }
}

pub struct TesseractEngine {
    tessdata: PathBuf,
}

impl TextEngine for TesseractEngine {
    /// Recognize text in a PNG. CPU-heavy; call from a blocking context.
    fn predict(&self, image_path: &Path) -> Result<Vec<String>, OcrError> {
        let output = Command::new(TESSERACT_BIN)
            .arg(image_path)
            .arg("stdout")
            .arg("--tessdata-dir")
            .arg(&self.tessdata)
            .args(["-l", LANGUAGE])
            .output()?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(OcrError::Recognition(format!(
                "{TESSERACT_BIN} exited with status {}: {}",
                output.status,
                stderr.trim()
            )));
        }

        Ok(parse_lines(&String::from_utf8_lossy(&output.stdout)))
    }
}

/// Split engine output into non-blank lines, preserving order.
fn parse_lines(stdout: &str) -> Vec<String> {
    stdout
        .lines()
        .map(str::trim_end)
        .filter(|line| !line.trim().is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_drops_blank_lines_and_form_feed() {
        let out = "Hello  \n\nWorld\n   \n\u{c}";
        assert_eq!(parse_lines(out), vec!["Hello", "World"]);
    }

    #[test]
    fn parse_keeps_leading_indent() {
        assert_eq!(parse_lines("  fn main() {\n}\n"), vec!["  fn main() {", "}"]);
    }

    #[test]
    fn model_lives_in_tessdata_dir() {
        let dir = Path::new("/tmp/tessdata");
        assert_eq!(model_path(dir), PathBuf::from("/tmp/tessdata/eng.traineddata"));
    }
}
