use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::source::{AudioSource, ReadChunk};
use crate::error::{CollectorError, Result};

/// Why the capture worker stopped reading
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureEnd {
    /// The stop flag was raised by the controller
    Stopped,
    /// The source ran out of audio
    EndOfStream,
    /// A read or scratch write failed; everything before it was kept
    ReadFailed,
}

/// Summary of one capture run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureReport {
    /// Bytes appended to the scratch file
    pub bytes_captured: u64,
    /// Number of non-empty reads
    pub chunks: u64,
    pub end: CaptureEnd,
}

/// Background worker streaming an audio source into a scratch file.
///
/// The worker is the only writer of the scratch file until [`CaptureLoop::stop`]
/// returns, after which the caller may read it.
pub struct CaptureLoop {
    stop_flag: Arc<AtomicBool>,
    handle: JoinHandle<CaptureReport>,
    scratch_path: PathBuf,
}

impl CaptureLoop {
    /// Start the source and begin appending `buffer_size`-byte reads to `scratch_path`.
    pub fn spawn(
        source: Box<dyn AudioSource>,
        scratch_path: impl Into<PathBuf>,
        buffer_size: usize,
    ) -> Self {
        let stop_flag = Arc::new(AtomicBool::new(false));
        let scratch_path = scratch_path.into();

        let worker_flag = Arc::clone(&stop_flag);
        let worker_path = scratch_path.clone();
        let handle = tokio::task::spawn_blocking(move || {
            run_capture(source, &worker_path, buffer_size.max(1), &worker_flag)
        });

        Self {
            stop_flag,
            handle,
            scratch_path,
        }
    }

    /// Whether the worker has already exited on its own
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Signal the worker and wait for it to release the source.
    pub async fn stop(self) -> CaptureReport {
        self.stop_flag.store(true, Ordering::SeqCst);

        match self.handle.await {
            Ok(report) => report,
            Err(e) => {
                error!("Capture worker panicked: {}", e);
                let bytes_captured = std::fs::metadata(&self.scratch_path)
                    .map(|m| m.len())
                    .unwrap_or(0);
                CaptureReport {
                    bytes_captured,
                    chunks: 0,
                    end: CaptureEnd::ReadFailed,
                }
            }
        }
    }
}

fn open_scratch(path: &Path) -> Result<BufWriter<File>> {
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map(BufWriter::new)
        .map_err(|e| CollectorError::io_at("open scratch file", path, e))
}

fn run_capture(
    mut source: Box<dyn AudioSource>,
    scratch_path: &Path,
    buffer_size: usize,
    stop_flag: &AtomicBool,
) -> CaptureReport {
    let mut report = CaptureReport {
        bytes_captured: 0,
        chunks: 0,
        end: CaptureEnd::Stopped,
    };

    let mut scratch = match open_scratch(scratch_path) {
        Ok(writer) => writer,
        Err(e) => {
            error!("Capture aborted: {}", e);
            source.release();
            report.end = CaptureEnd::ReadFailed;
            return report;
        }
    };

    if let Err(e) = source.start() {
        error!("Failed to start audio source: {}", e);
        source.release();
        report.end = CaptureEnd::ReadFailed;
        return report;
    }

    info!("Capture worker started ({} byte buffers)", buffer_size);

    let mut buf = vec![0u8; buffer_size];
    while !stop_flag.load(Ordering::SeqCst) {
        match source.read_chunk(&mut buf) {
            Ok(ReadChunk::Data(0)) => continue,
            Ok(ReadChunk::Data(n)) => {
                let n = n.min(buf.len());
                if let Err(e) = scratch.write_all(&buf[..n]) {
                    error!(
                        "Failed to append to scratch file {}: {}",
                        scratch_path.display(),
                        e
                    );
                    report.end = CaptureEnd::ReadFailed;
                    break;
                }
                report.bytes_captured += n as u64;
                report.chunks += 1;
            }
            Ok(ReadChunk::EndOfStream) => {
                debug!("Audio source reached end of stream");
                report.end = CaptureEnd::EndOfStream;
                break;
            }
            Err(e) => {
                warn!("Audio read failed, keeping partial capture: {}", e);
                report.end = CaptureEnd::ReadFailed;
                break;
            }
        }
    }

    if let Err(e) = scratch.flush() {
        error!("Failed to flush scratch file {}: {}", scratch_path.display(), e);
        report.end = CaptureEnd::ReadFailed;
    }

    source.stop();
    source.release();

    info!(
        "Capture worker finished: {} bytes in {} chunks ({:?})",
        report.bytes_captured, report.chunks, report.end
    );

    report
}
