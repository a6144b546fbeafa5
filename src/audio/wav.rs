// Canonical 44-byte WAV (RIFF) header for the captured PCM stream
//
// The capture pipeline always records mono 16-bit PCM at 44.1kHz, so the
// header only depends on the payload length measured after capture stops.

use crate::error::{CollectorError, Result};

/// Size of the canonical header in bytes
pub const HEADER_LEN: usize = 44;

/// RIFF length field covers everything after itself: the rest of the
/// header (36 bytes) plus the payload.
const RIFF_OVERHEAD: u32 = 36;
const FMT_CHUNK_LEN: u32 = 16;
const FORMAT_TAG_PCM: u16 = 1;

/// Fixed PCM format written into every container
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WavFormat {
    pub channels: u16,
    pub sample_rate: u32,
    pub bits_per_sample: u16,
}

impl WavFormat {
    /// Mono, 16-bit, 44.1kHz
    pub const CAPTURE: WavFormat = WavFormat {
        channels: 1,
        sample_rate: 44_100,
        bits_per_sample: 16,
    };

    pub fn block_align(&self) -> u16 {
        self.channels * self.bits_per_sample / 8
    }

    pub fn byte_rate(&self) -> u32 {
        self.sample_rate * u32::from(self.block_align())
    }
}

/// Sequential little-endian field writer for fixed-layout headers
pub struct HeaderWriter {
    buf: [u8; HEADER_LEN],
    pos: usize,
}

impl HeaderWriter {
    pub fn new() -> Self {
        Self {
            buf: [0; HEADER_LEN],
            pos: 0,
        }
    }

    fn put(mut self, bytes: &[u8]) -> Self {
        let end = self.pos + bytes.len();
        self.buf[self.pos..end].copy_from_slice(bytes);
        self.pos = end;
        self
    }

    /// Four-character chunk tag, e.g. `b"RIFF"`
    pub fn tag(self, tag: &[u8; 4]) -> Self {
        self.put(tag)
    }

    pub fn u16_le(self, value: u16) -> Self {
        self.put(&value.to_le_bytes())
    }

    pub fn u32_le(self, value: u32) -> Self {
        self.put(&value.to_le_bytes())
    }

    pub fn finish(self) -> [u8; HEADER_LEN] {
        debug_assert_eq!(self.pos, HEADER_LEN, "header layout must fill all 44 bytes");
        self.buf
    }
}

impl Default for HeaderWriter {
    fn default() -> Self {
        Self::new()
    }
}

/// Build the canonical header for `audio_byte_length` bytes of capture-format PCM.
pub fn encode_header(audio_byte_length: u32) -> [u8; HEADER_LEN] {
    encode_header_for(WavFormat::CAPTURE, audio_byte_length)
}

fn encode_header_for(format: WavFormat, audio_byte_length: u32) -> [u8; HEADER_LEN] {
    HeaderWriter::new()
        .tag(b"RIFF")
        .u32_le(audio_byte_length.wrapping_add(RIFF_OVERHEAD))
        .tag(b"WAVE")
        .tag(b"fmt ")
        .u32_le(FMT_CHUNK_LEN)
        .u16_le(FORMAT_TAG_PCM)
        .u16_le(format.channels)
        .u32_le(format.sample_rate)
        .u32_le(format.byte_rate())
        .u16_le(format.block_align())
        .u16_le(format.bits_per_sample)
        .tag(b"data")
        .u32_le(audio_byte_length)
        .finish()
}

/// Convert a measured scratch length into the 32-bit header field.
///
/// Lengths that would overflow the RIFF length (payload + 36) are rejected.
pub fn payload_len(measured: u64) -> Result<u32> {
    u32::try_from(measured)
        .ok()
        .filter(|len| len.checked_add(RIFF_OVERHEAD).is_some())
        .ok_or(CollectorError::PayloadTooLarge(measured))
}

/// Fields decoded from a canonical header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WavHeader {
    pub riff_len: u32,
    pub format_tag: u16,
    pub channels: u16,
    pub sample_rate: u32,
    pub byte_rate: u32,
    pub block_align: u16,
    pub bits_per_sample: u16,
    pub data_len: u32,
}

impl WavHeader {
    /// Parse the first 44 bytes of `bytes` as a canonical header.
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < HEADER_LEN {
            return Err(CollectorError::MalformedContainer {
                reason: format!("expected {} header bytes, got {}", HEADER_LEN, bytes.len()),
            });
        }

        let mut reader = HeaderReader { bytes, pos: 0 };
        reader.expect_tag(b"RIFF")?;
        let riff_len = reader.u32_le();
        reader.expect_tag(b"WAVE")?;
        reader.expect_tag(b"fmt ")?;
        let fmt_len = reader.u32_le();
        if fmt_len != FMT_CHUNK_LEN {
            return Err(CollectorError::MalformedContainer {
                reason: format!("unexpected fmt chunk length {}", fmt_len),
            });
        }
        let format_tag = reader.u16_le();
        let channels = reader.u16_le();
        let sample_rate = reader.u32_le();
        let byte_rate = reader.u32_le();
        let block_align = reader.u16_le();
        let bits_per_sample = reader.u16_le();
        reader.expect_tag(b"data")?;
        let data_len = reader.u32_le();

        Ok(Self {
            riff_len,
            format_tag,
            channels,
            sample_rate,
            byte_rate,
            block_align,
            bits_per_sample,
            data_len,
        })
    }

    pub fn format(&self) -> WavFormat {
        WavFormat {
            channels: self.channels,
            sample_rate: self.sample_rate,
            bits_per_sample: self.bits_per_sample,
        }
    }
}

struct HeaderReader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl HeaderReader<'_> {
    fn take<const N: usize>(&mut self) -> [u8; N] {
        let mut out = [0u8; N];
        out.copy_from_slice(&self.bytes[self.pos..self.pos + N]);
        self.pos += N;
        out
    }

    fn expect_tag(&mut self, tag: &[u8; 4]) -> Result<()> {
        let offset = self.pos;
        let found: [u8; 4] = self.take();
        if &found != tag {
            return Err(CollectorError::MalformedContainer {
                reason: format!(
                    "expected {:?} at offset {}, found {:?}",
                    String::from_utf8_lossy(tag),
                    offset,
                    String::from_utf8_lossy(&found)
                ),
            });
        }
        Ok(())
    }

    fn u16_le(&mut self) -> u16 {
        u16::from_le_bytes(self.take())
    }

    fn u32_le(&mut self) -> u32 {
        u32::from_le_bytes(self.take())
    }
}
