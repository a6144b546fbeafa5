// Test doubles shared by the integration tests
#![allow(dead_code)]

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::{self, Receiver, SyncSender};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use sensor_collector::audio::{AudioDevice, AudioFormat, AudioSource, ReadChunk};
use sensor_collector::config::KEY_AUDIO_DURATION;
use sensor_collector::{CollectorError, StartParams};

/// What a scripted source does once its chunks are used up
#[derive(Debug, Clone, Copy)]
pub enum AfterScript {
    EndOfStream,
    Fail,
    /// Keep delivering zero-filled buffers every `Duration`
    Silence(Duration),
}

/// Device whose sources replay fixed chunks
#[derive(Clone)]
pub struct ScriptedDevice {
    pub chunks: Vec<Vec<u8>>,
    pub then: AfterScript,
    pub opens: Arc<AtomicUsize>,
}

impl ScriptedDevice {
    pub fn new(chunks: Vec<Vec<u8>>, then: AfterScript) -> Self {
        Self {
            chunks,
            then,
            opens: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn silence() -> Self {
        Self::new(Vec::new(), AfterScript::Silence(Duration::from_millis(5)))
    }
}

impl AudioDevice for ScriptedDevice {
    fn open(&self, _format: &AudioFormat) -> sensor_collector::Result<Box<dyn AudioSource>> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(ScriptedSource {
            chunks: self.chunks.clone().into_iter().rev().collect(),
            then: self.then,
        }))
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

struct ScriptedSource {
    /// Reversed so `pop` yields the next chunk
    chunks: Vec<Vec<u8>>,
    then: AfterScript,
}

impl AudioSource for ScriptedSource {
    fn start(&mut self) -> sensor_collector::Result<()> {
        Ok(())
    }

    fn read_chunk(&mut self, buf: &mut [u8]) -> sensor_collector::Result<ReadChunk> {
        if let Some(chunk) = self.chunks.pop() {
            let n = chunk.len().min(buf.len());
            buf[..n].copy_from_slice(&chunk[..n]);
            return Ok(ReadChunk::Data(n));
        }

        match self.then {
            AfterScript::EndOfStream => Ok(ReadChunk::EndOfStream),
            AfterScript::Fail => Err(CollectorError::io(
                "read scripted source",
                std::io::Error::new(std::io::ErrorKind::BrokenPipe, "device went away"),
            )),
            AfterScript::Silence(pause) => {
                std::thread::sleep(pause);
                buf.fill(0);
                Ok(ReadChunk::Data(buf.len()))
            }
        }
    }

    fn stop(&mut self) {}

    fn release(&mut self) {}
}

/// Device whose source blocks in `release` until the gate is opened.
///
/// Keeps the controller in Stopping for as long as the test needs.
pub struct GatedDevice {
    gate: Mutex<Option<Receiver<()>>>,
}

impl GatedDevice {
    /// The device plus the sender that opens its gate. Dropping the sender
    /// opens it too.
    pub fn new() -> (Self, SyncSender<()>) {
        let (tx, rx) = mpsc::sync_channel(1);
        let device = Self {
            gate: Mutex::new(Some(rx)),
        };
        (device, tx)
    }
}

impl AudioDevice for GatedDevice {
    fn open(&self, _format: &AudioFormat) -> sensor_collector::Result<Box<dyn AudioSource>> {
        let gate = self.gate.lock().unwrap().take();
        Ok(Box::new(GatedSource { gate }))
    }

    fn name(&self) -> &str {
        "gated"
    }
}

struct GatedSource {
    gate: Option<Receiver<()>>,
}

impl AudioSource for GatedSource {
    fn start(&mut self) -> sensor_collector::Result<()> {
        Ok(())
    }

    fn read_chunk(&mut self, buf: &mut [u8]) -> sensor_collector::Result<ReadChunk> {
        std::thread::sleep(Duration::from_millis(5));
        buf.fill(0);
        Ok(ReadChunk::Data(buf.len()))
    }

    fn stop(&mut self) {}

    fn release(&mut self) {
        if let Some(gate) = self.gate.take() {
            let _ = gate.recv();
        }
    }
}

/// Device that can never be opened
pub struct UnavailableDevice;

impl AudioDevice for UnavailableDevice {
    fn open(&self, _format: &AudioFormat) -> sensor_collector::Result<Box<dyn AudioSource>> {
        Err(CollectorError::DeviceUnavailable {
            reason: "microphone not paired".to_string(),
        })
    }

    fn name(&self) -> &str {
        "unavailable"
    }
}

pub fn settings_with_duration(secs: &str) -> Arc<HashMap<String, String>> {
    let mut map = HashMap::new();
    map.insert(KEY_AUDIO_DURATION.to_string(), secs.to_string());
    Arc::new(map)
}

pub fn params_in(dir: &Path, name: &str, triggered: bool) -> StartParams {
    StartParams::new()
        .with_temp_file(dir.join(format!("{}.raw", name)))
        .with_output_file(dir.join("audio").join(format!("{}.wav", name)))
        .with_log_file(dir.join("AudioRecordLog.csv"))
        .with_triggered(triggered)
}

pub fn log_rows(dir: &Path) -> Vec<String> {
    std::fs::read_to_string(dir.join("AudioRecordLog.csv"))
        .map(|s| s.lines().skip(1).map(str::to_string).collect())
        .unwrap_or_default()
}
