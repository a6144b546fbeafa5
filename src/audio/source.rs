use std::f32::consts::TAU;
use std::time::{Duration, Instant};

use tracing::{debug, info};

use crate::error::{CollectorError, Result};

/// Input channel layout
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelConfig {
    Mono,
    Stereo,
}

impl ChannelConfig {
    pub fn count(&self) -> u16 {
        match self {
            ChannelConfig::Mono => 1,
            ChannelConfig::Stereo => 2,
        }
    }
}

/// Sample encoding delivered by the source
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    /// Signed 16-bit little-endian PCM
    Pcm16Bit,
}

impl Encoding {
    pub fn bytes_per_sample(&self) -> usize {
        match self {
            Encoding::Pcm16Bit => 2,
        }
    }
}

/// Format requested when opening a source
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioFormat {
    pub sample_rate: u32,
    pub channels: ChannelConfig,
    pub encoding: Encoding,
}

impl AudioFormat {
    /// Format recorded by every capture session: 44.1kHz mono 16-bit PCM
    pub const CAPTURE: AudioFormat = AudioFormat {
        sample_rate: 44_100,
        channels: ChannelConfig::Mono,
        encoding: Encoding::Pcm16Bit,
    };

    pub fn block_align(&self) -> usize {
        usize::from(self.channels.count()) * self.encoding.bytes_per_sample()
    }

    pub fn bytes_per_second(&self) -> usize {
        self.sample_rate as usize * self.block_align()
    }
}

impl Default for AudioFormat {
    fn default() -> Self {
        Self::CAPTURE
    }
}

/// Result of a single buffered read
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadChunk {
    /// `n` bytes were written to the front of the buffer (may be 0)
    Data(usize),
    /// The source has no more audio
    EndOfStream,
}

/// Something that can hand out audio sources, e.g. a microphone or a file.
pub trait AudioDevice: Send + Sync {
    /// Open a source for `format`.
    ///
    /// Fails with [`CollectorError::DeviceUnavailable`] when the device
    /// cannot deliver that format.
    fn open(&self, format: &AudioFormat) -> Result<Box<dyn AudioSource>>;

    /// Smallest read buffer the device accepts for `format`, in bytes.
    ///
    /// Defaults to 20ms of audio rounded down to a whole frame.
    fn min_buffer_size(&self, format: &AudioFormat) -> usize {
        let block = format.block_align().max(1);
        let bytes = format.bytes_per_second() / 50;
        (bytes / block).max(1) * block
    }

    /// Device name for logging
    fn name(&self) -> &str;
}

/// An opened, streaming audio source.
///
/// `read_chunk` blocks until audio is available. `stop` and `release` are
/// idempotent.
pub trait AudioSource: Send {
    fn start(&mut self) -> Result<()>;

    fn read_chunk(&mut self, buf: &mut [u8]) -> Result<ReadChunk>;

    fn stop(&mut self);

    fn release(&mut self);
}

/// Synthetic sine generator paced at the real sample rate.
///
/// Useful for bench runs without a paired microphone.
#[derive(Debug, Clone)]
pub struct ToneDevice {
    pub frequency_hz: f32,
    pub amplitude: f32,
    /// Sleep so that reads arrive at the rate a real device would deliver them
    pub realtime: bool,
}

impl Default for ToneDevice {
    fn default() -> Self {
        Self {
            frequency_hz: 440.0,
            amplitude: 0.25,
            realtime: true,
        }
    }
}

impl AudioDevice for ToneDevice {
    fn open(&self, format: &AudioFormat) -> Result<Box<dyn AudioSource>> {
        if format.channels != ChannelConfig::Mono || format.encoding != Encoding::Pcm16Bit {
            return Err(CollectorError::DeviceUnavailable {
                reason: format!("tone device only produces mono 16-bit PCM, got {:?}", format),
            });
        }
        if format.sample_rate == 0 {
            return Err(CollectorError::DeviceUnavailable {
                reason: "tone device needs a non-zero sample rate".to_string(),
            });
        }

        info!(
            "Tone device opened ({}Hz, {:.0}Hz tone)",
            format.sample_rate, self.frequency_hz
        );

        Ok(Box::new(ToneSource {
            format: *format,
            frequency_hz: self.frequency_hz,
            amplitude: self.amplitude.clamp(0.0, 1.0),
            realtime: self.realtime,
            phase: 0.0,
            started: None,
            bytes_emitted: 0,
            state: SourceState::Opened,
        }))
    }

    fn name(&self) -> &str {
        "tone"
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SourceState {
    Opened,
    Running,
    Stopped,
    Released,
}

struct ToneSource {
    format: AudioFormat,
    frequency_hz: f32,
    amplitude: f32,
    realtime: bool,
    phase: f32,
    started: Option<Instant>,
    bytes_emitted: u64,
    state: SourceState,
}

impl ToneSource {
    /// Block until the wall clock has caught up with the audio emitted so far.
    fn pace(&self) {
        let Some(started) = self.started else {
            return;
        };
        let audio_time = Duration::from_secs_f64(
            self.bytes_emitted as f64 / self.format.bytes_per_second() as f64,
        );
        if let Some(wait) = audio_time.checked_sub(started.elapsed()) {
            std::thread::sleep(wait);
        }
    }
}

impl AudioSource for ToneSource {
    fn start(&mut self) -> Result<()> {
        match self.state {
            SourceState::Opened | SourceState::Stopped => {
                self.state = SourceState::Running;
                self.started = Some(Instant::now());
                self.bytes_emitted = 0;
                Ok(())
            }
            SourceState::Running => Ok(()),
            SourceState::Released => Err(CollectorError::DeviceUnavailable {
                reason: "tone source already released".to_string(),
            }),
        }
    }

    fn read_chunk(&mut self, buf: &mut [u8]) -> Result<ReadChunk> {
        if self.state != SourceState::Running {
            return Ok(ReadChunk::EndOfStream);
        }

        let step = TAU * self.frequency_hz / self.format.sample_rate as f32;
        let whole = buf.len() - buf.len() % 2;
        for frame in buf[..whole].chunks_exact_mut(2) {
            let sample = (self.phase.sin() * self.amplitude * f32::from(i16::MAX)) as i16;
            frame.copy_from_slice(&sample.to_le_bytes());
            self.phase = (self.phase + step) % TAU;
        }

        self.bytes_emitted += whole as u64;
        if self.realtime {
            self.pace();
        }

        Ok(ReadChunk::Data(whole))
    }

    fn stop(&mut self) {
        if self.state == SourceState::Running {
            debug!("Tone source stopped after {} bytes", self.bytes_emitted);
            self.state = SourceState::Stopped;
        }
    }

    fn release(&mut self) {
        self.stop();
        self.state = SourceState::Released;
    }
}
