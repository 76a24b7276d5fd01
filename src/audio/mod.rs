//! Audio capture module
//!
//! Device enumeration and chunked PCM capture. The OS audio subsystem is
//! reached through the [`AudioHost`] trait; the default implementation uses
//! cpal, which works with CoreAudio, WASAPI, PipeWire, PulseAudio and ALSA.

pub mod catalog;
pub mod cpal_host;
pub mod frames;
pub mod session;

pub use catalog::DeviceCatalog;
pub use frames::FrameBuffer;
pub use session::CaptureSession;

use crate::error::DeviceError;
use std::fmt;
use std::sync::Arc;

/// PCM layout requested from every capture device
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureFormat {
    /// Interleaved channel count
    pub channels: u16,
    /// Samples per second, per channel
    pub sample_rate: u32,
    /// Bits per sample (signed integer PCM)
    pub bits_per_sample: u16,
    /// Frames (samples per channel) read per loop iteration
    pub chunk_frames: usize,
}

/// 16-bit stereo at 44.1 kHz, read in 1024-frame chunks (~23 ms)
pub const CAPTURE_FORMAT: CaptureFormat = CaptureFormat {
    channels: 2,
    sample_rate: 44_100,
    bits_per_sample: 16,
    chunk_frames: 1024,
};

impl CaptureFormat {
    /// Size of one sample in bytes
    pub const fn bytes_per_sample(&self) -> usize {
        self.bits_per_sample as usize / 8
    }

    /// Interleaved samples in one chunk
    pub const fn chunk_samples(&self) -> usize {
        self.chunk_frames * self.channels as usize
    }

    /// Raw byte length of one chunk
    pub const fn chunk_bytes(&self) -> usize {
        self.chunk_samples() * self.bytes_per_sample()
    }

    /// Wall-clock length of `chunks` chunks
    pub fn seconds_for_chunks(&self, chunks: usize) -> f64 {
        (chunks * self.chunk_frames) as f64 / self.sample_rate as f64
    }
}

impl Default for CaptureFormat {
    fn default() -> Self {
        CAPTURE_FORMAT
    }
}

/// An input-capable endpoint as seen during one enumeration pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioDevice {
    /// Position in the host's enumeration order. Only stable until the
    /// device list changes.
    pub index: usize,
    /// Display name reported by the host
    pub name: String,
    /// Maximum number of input channels
    pub input_channels: u16,
}

impl fmt::Display for AudioDevice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {} ({} ch)", self.index, self.name, self.input_channels)
    }
}

/// Failure of a single chunk read
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadError {
    /// Samples were dropped or arrived late; the next read may succeed
    Transient(String),
    /// The stream is gone (device unplugged, server died)
    Fatal(String),
}

/// A blocking source of fixed-size PCM chunks
///
/// Created and dropped on the capture thread, so it does not need to be `Send`.
/// Dropping it releases the device.
pub trait InputStream {
    /// Block until one full chunk (`CaptureFormat::chunk_bytes` bytes of
    /// little-endian i16 samples) is available
    fn read_chunk(&mut self) -> Result<Vec<u8>, ReadError>;
}

/// Access to the OS audio subsystem
pub trait AudioHost: Send + Sync {
    /// Every device exposing at least one input channel, in host order
    fn input_devices(&self) -> Result<Vec<AudioDevice>, DeviceError>;

    /// Open `device` for capture in `format`
    fn open_input(
        &self,
        device: &AudioDevice,
        format: CaptureFormat,
    ) -> Result<Box<dyn InputStream>, DeviceError>;
}

/// Factory function to create the platform audio host
pub fn create_host() -> Arc<dyn AudioHost> {
    Arc::new(cpal_host::CpalHost::new())
}
