pub mod capture;
pub mod file;
pub mod source;
pub mod wav;

pub use capture::{CaptureEnd, CaptureLoop, CaptureReport};
pub use file::{AudioFile, FileDevice};
pub use source::{AudioDevice, AudioFormat, AudioSource, ChannelConfig, Encoding, ReadChunk, ToneDevice};
pub use wav::{encode_header, HeaderWriter, WavFormat, WavHeader, HEADER_LEN};
