//! File-based hand-off of recognized text to the result window process.
//!
//! Contract: the controller writes the text as UTF-8 to a private temporary
//! file and launches `screen-ocr --result <path>`. The result process reads
//! the file once and deletes it.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::thread::JoinHandle;

/// Command-line flag that switches the binary into result-window mode.
pub const RESULT_FLAG: &str = "--result";

/// Persist `text` to a new temporary file (mode 0600 on Unix) that outlives
/// this process.
pub fn write_result(text: &str) -> io::Result<PathBuf> {
    let mut file = tempfile::Builder::new()
        .prefix("screen-ocr-result-")
        .suffix(".txt")
        .tempfile()?;
    file.write_all(text.as_bytes())?;
    file.flush()?;
    let (_, path) = file.keep().map_err(|e| e.error)?;
    Ok(path)
}

/// Read the hand-off file and delete it. A missing file yields empty text.
pub fn take_result(path: &Path) -> io::Result<String> {
    let text = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(String::new()),
        Err(e) => return Err(e),
    };
    if let Err(e) = fs::remove_file(path) {
        log::warn!("Failed to delete hand-off file {}: {e}", path.display());
    }
    Ok(text)
}

/// Path passed after [`RESULT_FLAG`], if the process was started as a
/// result window. `Some(Err(()))` means the flag came without a path.
pub fn result_path_arg(args: &[String]) -> Option<Result<PathBuf, ()>> {
    let pos = args.iter().position(|a| a == RESULT_FLAG)?;
    Some(args.get(pos + 1).map(PathBuf::from).ok_or(()))
}

/// Launch the result window as an independent process.
pub fn launch_result_window(path: &Path) -> io::Result<Child> {
    let exe = std::env::current_exe()?;
    Command::new(exe)
        .arg(RESULT_FLAG)
        .arg(path)
        .stdin(Stdio::null())
        .spawn()
}

/// Wait for `child` on a detached thread so it never lingers as a zombie
/// while this long-running process stays up.
pub fn reap(mut child: Child) -> io::Result<JoinHandle<()>> {
    let pid = child.id();
    std::thread::Builder::new()
        .name("result-reaper".into())
        .spawn(move || match child.wait() {
            Ok(status) => log::info!("Result window {pid} exited with {status}"),
            Err(e) => log::warn!("Failed to wait for result window {pid}: {e}"),
        })
}

/// Write `text` and hand it to a new result window. The file is removed
/// again if the process cannot be started.
pub fn deliver(text: &str) -> io::Result<PathBuf> {
    let path = write_result(text)?;
    match launch_result_window(&path) {
        Ok(child) => {
            log::info!(
                "Result window started (pid {}) for {}",
                child.id(),
                path.display()
            );
            if let Err(e) = reap(child) {
                log::warn!("Failed to start result window reaper: {e}");
            }
            Ok(path)
        }
        Err(e) => {
            let _ = fs::remove_file(&path);
            Err(e)
        }
    }
}
