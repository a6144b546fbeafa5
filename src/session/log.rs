use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;

use tracing::{debug, info};

use super::record::CaptureSession;
use crate::error::{CollectorError, Result};

/// Header row of the session log
pub const LOG_HEADER: &str =
    "Start Date,Start Time,End Date,End Time,File Name,File Size (bytes),Triggered?";

const DATE_FORMAT: &str = "%m/%d/%Y";
const TIME_FORMAT: &str = "%H:%M:%S";

/// Format a finished session as one CSV row (no trailing newline).
pub fn format_record(session: &CaptureSession) -> String {
    let end = session.ended_at.unwrap_or(session.started_at);
    [
        session.started_at.format(DATE_FORMAT).to_string(),
        session.started_at.format(TIME_FORMAT).to_string(),
        end.format(DATE_FORMAT).to_string(),
        end.format(TIME_FORMAT).to_string(),
        csv_field(&session.file_name),
        session.file_size.unwrap_or(0).to_string(),
        session.triggered.to_string(),
    ]
    .join(",")
}

fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

/// Append one session row to the log at `path`.
///
/// The file is created on first use and the header row is written whenever
/// the file does not already contain it. Existing rows are never rewritten.
pub fn append_record(path: &Path, session: &CaptureSession) -> Result<()> {
    let has_header = match std::fs::read(path) {
        Ok(bytes) => String::from_utf8_lossy(&bytes)
            .lines()
            .any(|line| line.trim_end() == LOG_HEADER),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => false,
        Err(e) => return Err(CollectorError::io_at("read session log", path, e)),
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .map_err(|e| CollectorError::io_at("create log directory", parent, e))?;
    }

    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| CollectorError::io_at("open session log", path, e))?;

    let mut contents = String::new();
    if !has_header {
        debug!("Writing session log header to {}", path.display());
        contents.push_str(LOG_HEADER);
        contents.push('\n');
    }
    contents.push_str(&format_record(session));
    contents.push('\n');

    file.write_all(contents.as_bytes())
        .and_then(|_| file.flush())
        .map_err(|e| CollectorError::io_at("append session log", path, e))?;

    info!("Logged session {} to {}", session.file_name, path.display());
    Ok(())
}
