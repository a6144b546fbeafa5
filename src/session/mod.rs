//! Capture session management
//!
//! This module provides the [`SessionController`] state machine that manages:
//! - Start parameter validation and duration lookup
//! - The capture worker streaming audio into a scratch file
//! - Timed or explicit stop (whichever comes first)
//! - Finalization into a WAV container and the CSV session log

mod config;
mod controller;
mod finalize;
pub mod log;
mod record;

pub use config::{configured_duration, SessionParams, StartParams, SAMPLE_MODE_DURATION};
pub use controller::{SessionController, SessionPhase, StopTrigger};
pub use log::{append_record, format_record, LOG_HEADER};
pub use record::CaptureSession;
