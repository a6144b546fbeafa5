use std::fs::{self, File};
use std::io::{self, BufWriter, Read, Write};
use std::path::Path;

use tracing::{info, warn};

use super::config::SessionParams;
use super::log::append_record;
use super::record::CaptureSession;
use crate::audio::wav::{encode_header, payload_len, HEADER_LEN};
use crate::audio::CaptureReport;
use crate::error::{CollectorError, Result};

/// Delete any previous file at `path` and leave a fresh empty one behind.
///
/// Failures are logged; the session proceeds and finalization reports
/// whatever is missing later.
pub(crate) fn reset_file(path: &Path) {
    match fs::remove_file(path) {
        Ok(()) => info!("Removed stale file {}", path.display()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => warn!("Could not remove {}: {}", path.display(), e),
    }

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        if let Err(e) = fs::create_dir_all(parent) {
            warn!("Could not create directory {}: {}", parent.display(), e);
        }
    }

    if let Err(e) = File::create(path) {
        warn!("Could not create {}: {}", path.display(), e);
    }
}

/// Turn the scratch recording into the output container and log the session.
///
/// Must only run after the capture worker has been joined.
pub(crate) fn finalize(
    params: &SessionParams,
    session: &mut CaptureSession,
    report: &CaptureReport,
) -> Result<()> {
    let audio_len = fs::metadata(&params.temp_file)
        .map_err(|e| CollectorError::io_at("measure scratch file", &params.temp_file, e))?
        .len();

    if audio_len != report.bytes_captured {
        warn!(
            "Scratch file holds {} bytes but capture reported {}",
            audio_len, report.bytes_captured
        );
    }

    let header = encode_header(payload_len(audio_len)?);
    write_container(&params.temp_file, &params.output_file, &header, audio_len)?;

    if let Err(e) = fs::remove_file(&params.temp_file) {
        warn!(
            "Could not delete scratch file {}: {}",
            params.temp_file.display(),
            e
        );
    }

    let file_size = fs::metadata(&params.output_file)
        .map_err(|e| CollectorError::io_at("measure output file", &params.output_file, e))?
        .len();
    session.set_file_size(file_size);

    info!(
        "Wrote {} ({} bytes, {} bytes of audio)",
        params.output_file.display(),
        file_size,
        audio_len
    );

    append_record(&params.log_file, session)
}

fn write_container(
    scratch: &Path,
    output: &Path,
    header: &[u8; HEADER_LEN],
    audio_len: u64,
) -> Result<()> {
    let input = File::open(scratch)
        .map_err(|e| CollectorError::io_at("open scratch file", scratch, e))?;
    let mut writer = File::create(output)
        .map(BufWriter::new)
        .map_err(|e| CollectorError::io_at("create output file", output, e))?;

    writer
        .write_all(header)
        .map_err(|e| CollectorError::io_at("write header to", output, e))?;

    let copied = io::copy(&mut input.take(audio_len), &mut writer)
        .map_err(|e| CollectorError::io_at("copy audio into", output, e))?;
    if copied != audio_len {
        return Err(CollectorError::io(
            format!("copy audio into {}", output.display()),
            io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("scratch shrank from {} to {} bytes", audio_len, copied),
            ),
        ));
    }

    writer
        .flush()
        .map_err(|e| CollectorError::io_at("flush", output, e))
}
