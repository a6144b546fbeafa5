pub mod audio;
pub mod config;
pub mod error;
pub mod http;
pub mod session;

pub use audio::{
    encode_header, AudioDevice, AudioFile, AudioFormat, AudioSource, CaptureEnd, CaptureLoop,
    CaptureReport, FileDevice, ReadChunk, ToneDevice, WavHeader,
};
pub use config::{Config, SettingsStore};
pub use error::{CollectorError, Result};
pub use http::{
    create_router, CollectorServer, HeartRateEvent, HeartRateListener, HeartRateRegistry,
    ListenerState,
};
pub use session::{CaptureSession, SessionController, SessionPhase, StartParams};
