use std::path::Path;
use thiserror::Error;

/// Errors raised by the collector's capture pipeline and sensor listener.
#[derive(Error, Debug)]
pub enum CollectorError {
    /// The audio source could not be opened for the requested format.
    #[error("Audio device unavailable: {reason}")]
    DeviceUnavailable { reason: String },

    /// A file read, write, create or delete failed.
    #[error("I/O failure ({context}): {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    /// An inbound sensor payload was unreadable or lacked a required field.
    #[error("Malformed payload: {reason}")]
    MalformedPayload { reason: String },

    /// A capture session is already in progress.
    #[error("A capture session is already active")]
    Busy,

    /// A required session start parameter was not supplied.
    #[error("Missing start parameter: {0}")]
    MissingParameter(&'static str),

    /// A byte buffer did not hold a canonical WAV header.
    #[error("Malformed container: {reason}")]
    MalformedContainer { reason: String },

    /// The captured payload does not fit a 32-bit RIFF length field.
    #[error("Audio payload of {0} bytes exceeds the WAV size limit")]
    PayloadTooLarge(u64),
}

impl CollectorError {
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    pub(crate) fn io_at(action: &str, path: &Path, source: std::io::Error) -> Self {
        Self::io(format!("{} {}", action, path.display()), source)
    }
}

/// Result type alias using [`CollectorError`].
pub type Result<T> = std::result::Result<T, CollectorError>;
