use std::time::Duration;

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

/// One recording attempt, from accepted start request to its log row
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptureSession {
    pub started_at: DateTime<Local>,

    /// Set once when the session leaves Recording
    pub ended_at: Option<DateTime<Local>>,

    /// Started by an automatic trigger rather than by hand
    pub triggered: bool,

    /// Sample (calibration) mode
    pub sample: bool,

    /// Target capture length
    pub duration: Duration,

    /// Output file name as written to the log
    pub file_name: String,

    /// Size of the finalized container, header included
    pub file_size: Option<u64>,
}

impl CaptureSession {
    pub fn new(triggered: bool, sample: bool, duration: Duration, file_name: String) -> Self {
        Self {
            started_at: Local::now(),
            ended_at: None,
            triggered,
            sample,
            duration,
            file_name,
            file_size: None,
        }
    }

    /// Record the end of capture. Later calls keep the first timestamp.
    pub fn mark_ended(&mut self) {
        if self.ended_at.is_none() {
            self.ended_at = Some(Local::now());
        }
    }

    pub fn set_file_size(&mut self, size: u64) {
        self.file_size = Some(size);
    }

    /// Wall-clock length of the capture, if it has ended
    pub fn elapsed(&self) -> Option<chrono::Duration> {
        self.ended_at.map(|end| end.signed_duration_since(self.started_at))
    }
}
