use std::path::{Path, PathBuf};

use hound::WavReader;
use tracing::info;

use super::source::{AudioDevice, AudioFormat, AudioSource, ChannelConfig, Encoding, ReadChunk};
use crate::error::{CollectorError, Result};

/// A decoded WAV file
pub struct AudioFile {
    pub path: String,
    pub duration_seconds: f64,
    pub sample_rate: u32,
    pub channels: u16,
    pub bits_per_sample: u16,
    pub samples: Vec<i16>,
}

impl AudioFile {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        info!("Opening audio file: {}", path.display());

        let reader = WavReader::open(path).map_err(|e| CollectorError::MalformedContainer {
            reason: format!("failed to open WAV file {}: {}", path.display(), e),
        })?;

        let spec = reader.spec();
        let samples: Vec<i16> = reader
            .into_samples::<i16>()
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| CollectorError::MalformedContainer {
                reason: format!("failed to read audio samples: {}", e),
            })?;

        let duration_seconds =
            samples.len() as f64 / (spec.sample_rate as f64 * spec.channels.max(1) as f64);

        info!(
            "Audio file loaded: {:.1}s, {}Hz, {} channels, {} samples",
            duration_seconds,
            spec.sample_rate,
            spec.channels,
            samples.len()
        );

        Ok(Self {
            path: path.display().to_string(),
            duration_seconds,
            sample_rate: spec.sample_rate,
            channels: spec.channels,
            bits_per_sample: spec.bits_per_sample,
            samples,
        })
    }

    /// Whether the file matches the format requested from a source
    pub fn matches(&self, format: &AudioFormat) -> bool {
        self.sample_rate == format.sample_rate
            && self.channels == format.channels.count()
            && self.bits_per_sample == 16
            && format.encoding == Encoding::Pcm16Bit
    }

    /// Samples as little-endian PCM bytes
    pub fn pcm_bytes(&self) -> Vec<u8> {
        self.samples.iter().flat_map(|s| s.to_le_bytes()).collect()
    }
}

/// Replays recorded audio as if it came from a live device.
///
/// `.wav` files are decoded and must already be in the requested format.
/// Any other file is treated as headerless little-endian PCM.
#[derive(Debug, Clone)]
pub struct FileDevice {
    path: PathBuf,
}

impl FileDevice {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn is_wav(&self) -> bool {
        self.path
            .extension()
            .map(|ext| ext.eq_ignore_ascii_case("wav"))
            .unwrap_or(false)
    }
}

impl AudioDevice for FileDevice {
    fn open(&self, format: &AudioFormat) -> Result<Box<dyn AudioSource>> {
        let unavailable = |reason: String| CollectorError::DeviceUnavailable { reason };

        if format.channels != ChannelConfig::Mono && !self.is_wav() {
            return Err(unavailable("raw PCM replay only supports mono".to_string()));
        }

        let pcm = if self.is_wav() {
            let audio = AudioFile::open(&self.path).map_err(|e| unavailable(e.to_string()))?;
            if !audio.matches(format) {
                return Err(unavailable(format!(
                    "{} is {}Hz/{}ch/{}bit, expected {}Hz/{}ch/16bit",
                    self.path.display(),
                    audio.sample_rate,
                    audio.channels,
                    audio.bits_per_sample,
                    format.sample_rate,
                    format.channels.count()
                )));
            }
            audio.pcm_bytes()
        } else {
            std::fs::read(&self.path)
                .map_err(|e| unavailable(format!("{}: {}", self.path.display(), e)))?
        };

        info!(
            "File device opened: {} ({} bytes of PCM)",
            self.path.display(),
            pcm.len()
        );

        Ok(Box::new(FileSource {
            pcm,
            cursor: 0,
            running: false,
            released: false,
        }))
    }

    fn name(&self) -> &str {
        "file"
    }
}

struct FileSource {
    pcm: Vec<u8>,
    cursor: usize,
    running: bool,
    released: bool,
}

impl AudioSource for FileSource {
    fn start(&mut self) -> Result<()> {
        if self.released {
            return Err(CollectorError::DeviceUnavailable {
                reason: "file source already released".to_string(),
            });
        }
        self.running = true;
        Ok(())
    }

    fn read_chunk(&mut self, buf: &mut [u8]) -> Result<ReadChunk> {
        if !self.running || self.cursor >= self.pcm.len() {
            return Ok(ReadChunk::EndOfStream);
        }

        let n = buf.len().min(self.pcm.len() - self.cursor);
        buf[..n].copy_from_slice(&self.pcm[self.cursor..self.cursor + n]);
        self.cursor += n;
        Ok(ReadChunk::Data(n))
    }

    fn stop(&mut self) {
        self.running = false;
    }

    fn release(&mut self) {
        self.running = false;
        self.released = true;
        self.pcm = Vec::new();
    }
}
