//! Recording controller
//!
//! Ties device resolution, the capture session and the transcoder together
//! behind toggle/begin/finish commands. Front ends (CLI, tray, hotkey
//! daemons) own a `RecordingController` and observe it through
//! [`RecordingObserver`].

use crate::audio::{AudioDevice, AudioHost, CaptureFormat, CaptureSession, DeviceCatalog};
use crate::config::{Config, OutputFormat};
use crate::encode;
use crate::error::{DeviceError, Result, SysrecError};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// A finished recording on disk
#[derive(Debug, Clone, PartialEq)]
pub struct RecordingArtifact {
    pub file_path: PathBuf,
    pub duration_seconds: f64,
}

/// Callbacks for whatever presents recording status to the user.
///
/// All methods default to doing nothing.
pub trait RecordingObserver: Send {
    /// Capture started on the named device
    fn on_started(&self, _device_name: &str) {}

    /// Recording finished; `None` when nothing could be saved
    fn on_stopped(&self, _artifact: Option<&RecordingArtifact>) {}

    /// Device could not be resolved or opened, or failed mid-recording
    fn on_device_error(&self, _reason: &str) {}

    /// Periodic progress while recording
    fn on_tick(&self, _elapsed_seconds: f64) {}
}

/// Observer that ignores every event
#[derive(Debug, Default)]
pub struct NoopObserver;

impl RecordingObserver for NoopObserver {}

/// What a toggle did
#[derive(Debug, Clone, PartialEq)]
pub enum ToggleOutcome {
    Started(AudioDevice),
    Stopped(RecordingArtifact),
}

/// Output settings the controller needs from [`Config`]
#[derive(Debug, Clone)]
pub struct RecorderSettings {
    pub output_dir: PathBuf,
    pub format: OutputFormat,
    pub bitrate_kbps: u32,
    pub keep_container: bool,
}

impl RecorderSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            output_dir: config.output.resolve_directory(),
            format: config.output.format,
            bitrate_kbps: config.output.bitrate_kbps,
            keep_container: config.output.keep_container,
        }
    }
}

/// Orchestrates one recording at a time
pub struct RecordingController {
    catalog: DeviceCatalog,
    session: CaptureSession,
    settings: RecorderSettings,
    observer: Box<dyn RecordingObserver>,
    /// File stem of the recording in progress
    base_name: Option<String>,
    /// Whether a mid-recording fault was already reported
    fault_reported: bool,
}

impl RecordingController {
    /// Create a controller using `host` for devices and `config` for output
    pub fn new(host: Arc<dyn AudioHost>, config: &Config) -> Self {
        Self::with_settings(
            host,
            &config.audio.loopback_pattern,
            RecorderSettings::from_config(config),
        )
    }

    /// Create a controller with explicit settings
    pub fn with_settings(
        host: Arc<dyn AudioHost>,
        loopback_pattern: &str,
        settings: RecorderSettings,
    ) -> Self {
        Self {
            catalog: DeviceCatalog::new(Arc::clone(&host), loopback_pattern),
            session: CaptureSession::new(host, CaptureFormat::default()),
            settings,
            observer: Box::new(NoopObserver),
            base_name: None,
            fault_reported: false,
        }
    }

    /// Replace the observer
    pub fn with_observer(mut self, observer: Box<dyn RecordingObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Current input devices
    pub fn devices(&self) -> Vec<AudioDevice> {
        self.catalog.enumerate()
    }

    /// Directory recordings are written to
    pub fn output_dir(&self) -> &Path {
        &self.settings.output_dir
    }

    pub fn is_recording(&self) -> bool {
        self.session.is_recording()
    }

    pub fn elapsed_seconds(&self) -> f64 {
        self.session.elapsed_seconds()
    }

    /// Start when idle, finish when recording
    pub fn toggle(&mut self, explicit_device: Option<usize>) -> Result<ToggleOutcome> {
        if self.session.is_recording() {
            self.finish().map(ToggleOutcome::Stopped)
        } else {
            self.begin(explicit_device).map(ToggleOutcome::Started)
        }
    }

    /// Resolve a device and start capturing from it
    pub fn begin(&mut self, explicit_device: Option<usize>) -> Result<AudioDevice> {
        match self.try_begin(explicit_device) {
            Ok(device) => {
                self.observer.on_started(&device.name);
                Ok(device)
            }
            Err(e) => {
                self.observer.on_device_error(&e.to_string());
                Err(e)
            }
        }
    }

    fn try_begin(&mut self, explicit_device: Option<usize>) -> Result<AudioDevice> {
        if !self.session.state().is_idle() {
            return Err(DeviceError::AlreadyRecording.into());
        }

        let device = match explicit_device {
            Some(index) => self.catalog.find(index).ok_or_else(|| {
                DeviceError::OpenFailed(format!("no input device at index {}", index))
            })?,
            None => self
                .catalog
                .resolve_preferred()
                .ok_or(DeviceError::NoDeviceAvailable)?,
        };

        std::fs::create_dir_all(&self.settings.output_dir)?;
        let base_name = unique_base_name(
            &self.settings.output_dir,
            &timestamp_name(chrono::Local::now()),
            self.settings.format,
        );

        self.session.start(&device)?;

        tracing::info!("Recording started: {} -> {}", device.name, base_name);
        self.base_name = Some(base_name);
        self.fault_reported = false;

        Ok(device)
    }

    /// Stop capturing and write the recording
    ///
    /// On failure after the WAV was written, the WAV stays on disk.
    pub fn finish(&mut self) -> Result<RecordingArtifact> {
        let result = self.try_finish();
        match &result {
            Ok(artifact) => self.observer.on_stopped(Some(artifact)),
            Err(SysrecError::Device(DeviceError::NotRecording)) => {}
            Err(e) => {
                tracing::error!("Recording could not be saved: {}", e);
                self.observer.on_stopped(None);
            }
        }
        result
    }

    fn try_finish(&mut self) -> Result<RecordingArtifact> {
        let buffer = self.session.stop()?;
        let base_name = self
            .base_name
            .take()
            .unwrap_or_else(|| timestamp_name(chrono::Local::now()));

        if let Some(reason) = self.session.fault() {
            tracing::warn!("Saving partial recording, capture ended early: {}", reason);
        }

        let format = self.session.format();
        let duration_seconds = format.seconds_for_chunks(buffer.len());
        let dir = &self.settings.output_dir;
        let container = dir.join(format!("{}.wav", base_name));

        encode::to_container(buffer, format, &container)?;

        let file_path = match self.settings.format {
            OutputFormat::Wav => container,
            OutputFormat::Opus => {
                let compressed = dir.join(format!("{}.{}", base_name, OutputFormat::Opus.extension()));
                if let Err(e) =
                    encode::to_compressed(&container, &compressed, self.settings.bitrate_kbps)
                {
                    tracing::warn!("Compression failed, WAV kept at {:?}", container);
                    let _ = std::fs::remove_file(&compressed);
                    return Err(e.into());
                }

                if !self.settings.keep_container {
                    if let Err(e) = std::fs::remove_file(&container) {
                        tracing::warn!("Failed to remove intermediate WAV {:?}: {}", container, e);
                    }
                }
                compressed
            }
        };

        tracing::info!("Saved {:?} ({:.1}s)", file_path, duration_seconds);

        Ok(RecordingArtifact {
            file_path,
            duration_seconds,
        })
    }

    /// Poll progress for a front-end timer.
    ///
    /// Reports elapsed time while recording, and a mid-recording device
    /// fault once. The partial audio stays available to [`finish`](Self::finish).
    pub fn tick(&mut self) -> f64 {
        let elapsed = self.session.elapsed_seconds();
        if self.session.is_recording() {
            self.observer.on_tick(elapsed);

            if !self.fault_reported {
                if let Some(reason) = self.session.fault() {
                    self.fault_reported = true;
                    self.observer
                        .on_device_error(&format!("Capture stopped early: {}", reason));
                }
            }
        }
        elapsed
    }
}

/// `recording_<YYYYMMDD_HHMMSS>` for the given time
pub fn timestamp_name<Tz: chrono::TimeZone>(now: chrono::DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    format!("recording_{}", now.format("%Y%m%d_%H%M%S"))
}

/// Suffix `stem` with a counter if a file from it already exists in `dir`
fn unique_base_name(dir: &Path, stem: &str, format: OutputFormat) -> String {
    let taken = |name: &str| {
        dir.join(format!("{}.wav", name)).exists()
            || dir.join(format!("{}.{}", name, format.extension())).exists()
    };

    if !taken(stem) {
        return stem.to_string();
    }
    (2..)
        .map(|n| format!("{}_{}", stem, n))
        .find(|name| !taken(name))
        .unwrap_or_else(|| stem.to_string())
}
