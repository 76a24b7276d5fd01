//! Synthetic audio host for deterministic recording tests
//!
//! Streams a stereo sine tone for a fixed number of chunks, then either
//! stalls (like an idle device) or fails (like an unplugged one).

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};
use sysrec::audio::{AudioDevice, AudioHost, CaptureFormat, InputStream, ReadError};
use sysrec::config::OutputFormat;
use sysrec::recorder::{RecorderSettings, RecordingArtifact, RecordingController, RecordingObserver};
use sysrec::DeviceError;

/// What a stream does after its scripted chunks run out
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AfterChunks {
    Stall,
    Fail,
}

pub struct ToneStream {
    remaining: usize,
    after: AfterChunks,
    format: CaptureFormat,
    phase: f32,
}

impl InputStream for ToneStream {
    fn read_chunk(&mut self) -> Result<Vec<u8>, ReadError> {
        if self.remaining == 0 {
            return match self.after {
                AfterChunks::Stall => {
                    thread::sleep(Duration::from_millis(2));
                    Err(ReadError::Transient("no data".to_string()))
                }
                AfterChunks::Fail => Err(ReadError::Fatal("device unplugged".to_string())),
            };
        }
        self.remaining -= 1;

        let step = 2.0 * std::f32::consts::PI * 440.0 / self.format.sample_rate as f32;
        let mut bytes = Vec::with_capacity(self.format.chunk_bytes());
        for _ in 0..self.format.chunk_frames {
            let sample = (self.phase.sin() * 8000.0) as i16;
            self.phase = (self.phase + step) % (2.0 * std::f32::consts::PI);
            for _ in 0..self.format.channels {
                bytes.extend_from_slice(&sample.to_le_bytes());
            }
        }
        Ok(bytes)
    }
}

pub struct SyntheticHost {
    devices: Vec<AudioDevice>,
    chunks: usize,
    after: AfterChunks,
    pub opens: AtomicUsize,
}

impl SyntheticHost {
    pub fn new(devices: Vec<AudioDevice>, chunks: usize, after: AfterChunks) -> Arc<Self> {
        Arc::new(Self {
            devices,
            chunks,
            after,
            opens: AtomicUsize::new(0),
        })
    }

    /// A microphone at index 0 and "LoopbackTest" at index 1
    pub fn with_loopback(chunks: usize, after: AfterChunks) -> Arc<Self> {
        Self::new(
            vec![device(0, "Built-in Microphone", 1), device(1, "LoopbackTest", 2)],
            chunks,
            after,
        )
    }
}

impl AudioHost for SyntheticHost {
    fn input_devices(&self) -> Result<Vec<AudioDevice>, DeviceError> {
        Ok(self.devices.clone())
    }

    fn open_input(
        &self,
        device: &AudioDevice,
        format: CaptureFormat,
    ) -> Result<Box<dyn InputStream>, DeviceError> {
        if !self.devices.contains(device) {
            return Err(DeviceError::OpenFailed(format!("{} is gone", device.name)));
        }
        self.opens.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(ToneStream {
            remaining: self.chunks,
            after: self.after,
            format,
            phase: 0.0,
        }))
    }
}

pub fn device(index: usize, name: &str, input_channels: u16) -> AudioDevice {
    AudioDevice {
        index,
        name: name.to_string(),
        input_channels,
    }
}

/// Events seen by an observer, in order
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    Started(String),
    Stopped(Option<RecordingArtifact>),
    DeviceError(String),
    Tick,
}

#[derive(Clone, Default)]
pub struct EventLog(pub Arc<Mutex<Vec<Event>>>);

impl EventLog {
    pub fn events(&self) -> Vec<Event> {
        self.0.lock().unwrap().clone()
    }
}

impl RecordingObserver for EventLog {
    fn on_started(&self, device_name: &str) {
        self.0.lock().unwrap().push(Event::Started(device_name.to_string()));
    }

    fn on_stopped(&self, artifact: Option<&RecordingArtifact>) {
        self.0.lock().unwrap().push(Event::Stopped(artifact.cloned()));
    }

    fn on_device_error(&self, reason: &str) {
        self.0.lock().unwrap().push(Event::DeviceError(reason.to_string()));
    }

    fn on_tick(&self, _elapsed_seconds: f64) {
        self.0.lock().unwrap().push(Event::Tick);
    }
}

pub fn settings(dir: &std::path::Path, format: OutputFormat) -> RecorderSettings {
    RecorderSettings {
        output_dir: dir.to_path_buf(),
        format,
        bitrate_kbps: 192,
        keep_container: false,
    }
}

pub fn controller(
    host: Arc<SyntheticHost>,
    dir: &std::path::Path,
    format: OutputFormat,
) -> RecordingController {
    RecordingController::with_settings(host, "Loopback", settings(dir, format))
}

/// Wait until the controller reports at least `seconds` of audio
pub fn wait_for_elapsed(controller: &RecordingController, seconds: f64) {
    let deadline = Instant::now() + Duration::from_secs(10);
    while controller.elapsed_seconds() < seconds {
        assert!(Instant::now() < deadline, "timed out waiting for audio");
        thread::sleep(Duration::from_millis(2));
    }
}

/// Files in `dir`, sorted by name
pub fn files_in(dir: &std::path::Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}
