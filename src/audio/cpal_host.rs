//! cpal-based audio host
//!
//! cpal delivers audio through a callback on its own thread, while the
//! capture loop reads fixed-size chunks. The callback forwards samples over a
//! bounded channel and [`CpalInputStream`] reassembles them into chunks.
//!
//! Note: cpal::Stream is not Send, so streams are opened on the capture
//! thread and dropped there.

use super::{AudioDevice, AudioHost, CaptureFormat, InputStream, ReadError};
use crate::error::DeviceError;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError, TrySendError};
use std::sync::{Arc, OnceLock};
use std::time::Duration;

/// Callback buffers queued between cpal and the capture loop
const CHANNEL_CAPACITY: usize = 64;

/// Longest a single read waits for samples before reporting a stall
const READ_TIMEOUT: Duration = Duration::from_millis(250);

/// Audio host backed by the platform default cpal host
#[derive(Debug, Default)]
pub struct CpalHost;

impl CpalHost {
    pub fn new() -> Self {
        Self
    }
}

/// Highest input channel count across the device's supported configs
fn max_input_channels(device: &cpal::Device) -> u16 {
    device
        .supported_input_configs()
        .map(|configs| configs.map(|c| c.channels()).max().unwrap_or(0))
        .unwrap_or(0)
}

impl AudioHost for CpalHost {
    fn input_devices(&self) -> Result<Vec<AudioDevice>, DeviceError> {
        let host = cpal::default_host();
        let devices = host
            .devices()
            .map_err(|e| DeviceError::OpenFailed(format!("Failed to list devices: {}", e)))?;

        let inputs = devices
            .enumerate()
            .filter_map(|(index, device)| {
                let input_channels = max_input_channels(&device);
                if input_channels == 0 {
                    return None;
                }
                let name = device.name().unwrap_or_else(|_| "unknown".to_string());
                Some(AudioDevice {
                    index,
                    name,
                    input_channels,
                })
            })
            .collect();

        Ok(inputs)
    }

    fn open_input(
        &self,
        device: &AudioDevice,
        format: CaptureFormat,
    ) -> Result<Box<dyn InputStream>, DeviceError> {
        let host = cpal::default_host();
        let cpal_device = host
            .devices()
            .map_err(|e| DeviceError::OpenFailed(e.to_string()))?
            .nth(device.index)
            .ok_or_else(|| {
                DeviceError::OpenFailed(format!("no audio device at index {}", device.index))
            })?;

        // Indices shift when devices come and go
        let name = cpal_device.name().unwrap_or_default();
        if name != device.name {
            return Err(DeviceError::OpenFailed(format!(
                "device at index {} is now '{}', expected '{}'",
                device.index, name, device.name
            )));
        }

        let supported = pick_config(&cpal_device, format)?;
        let sample_format = supported.sample_format();
        let stream_config = cpal::StreamConfig {
            channels: format.channels,
            sample_rate: cpal::SampleRate(format.sample_rate),
            buffer_size: cpal::BufferSize::Default,
        };

        tracing::debug!(
            "Opening '{}': {} Hz, {} channel(s), native format {:?}",
            device.name,
            format.sample_rate,
            format.channels,
            sample_format
        );

        let (tx, rx) = mpsc::sync_channel(CHANNEL_CAPACITY);
        let flags = Arc::new(StreamFlags::default());

        let stream = match sample_format {
            cpal::SampleFormat::I16 => {
                build_stream::<i16>(&cpal_device, &stream_config, tx, Arc::clone(&flags))
            }
            cpal::SampleFormat::F32 => {
                build_stream::<f32>(&cpal_device, &stream_config, tx, Arc::clone(&flags))
            }
            cpal::SampleFormat::U16 => {
                build_stream::<u16>(&cpal_device, &stream_config, tx, Arc::clone(&flags))
            }
            cpal::SampleFormat::I32 => {
                build_stream::<i32>(&cpal_device, &stream_config, tx, Arc::clone(&flags))
            }
            other => Err(DeviceError::OpenFailed(format!(
                "unsupported sample format: {:?}",
                other
            ))),
        }?;

        stream
            .play()
            .map_err(|e| DeviceError::OpenFailed(format!("Failed to start audio stream: {}", e)))?;

        Ok(Box::new(CpalInputStream {
            _stream: stream,
            rx,
            flags,
            pending: Vec::with_capacity(format.chunk_samples() * 2),
            chunk_samples: format.chunk_samples(),
        }))
    }
}

/// Find a supported config with the requested channels and rate,
/// preferring native i16 over formats that need conversion
fn pick_config(
    device: &cpal::Device,
    format: CaptureFormat,
) -> Result<cpal::SupportedStreamConfigRange, DeviceError> {
    let rank = |f: cpal::SampleFormat| match f {
        cpal::SampleFormat::I16 => 0,
        cpal::SampleFormat::F32 => 1,
        cpal::SampleFormat::I32 => 2,
        cpal::SampleFormat::U16 => 3,
        _ => 4,
    };

    device
        .supported_input_configs()
        .map_err(|e| DeviceError::OpenFailed(format!("Failed to get configs: {}", e)))?
        .filter(|c| {
            c.channels() == format.channels
                && c.min_sample_rate().0 <= format.sample_rate
                && c.max_sample_rate().0 >= format.sample_rate
        })
        .min_by_key(|c| rank(c.sample_format()))
        .ok_or_else(|| {
            DeviceError::OpenFailed(format!(
                "device does not support {} channel(s) at {} Hz",
                format.channels, format.sample_rate
            ))
        })
}

/// State shared between cpal's callbacks and the reader
#[derive(Debug, Default)]
struct StreamFlags {
    /// Samples were dropped because the reader fell behind
    overrun: AtomicBool,
    /// Unrecoverable stream error
    fault: OnceLock<String>,
}

/// Build an input stream for a specific sample type, converting to i16
fn build_stream<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    tx: mpsc::SyncSender<Vec<i16>>,
    flags: Arc<StreamFlags>,
) -> Result<cpal::Stream, DeviceError>
where
    T: cpal::Sample + cpal::SizedSample + Send + 'static,
    i16: cpal::FromSample<T>,
{
    let data_flags = Arc::clone(&flags);
    let err_flags = flags;

    device
        .build_input_stream(
            config,
            move |data: &[T], _: &cpal::InputCallbackInfo| {
                let samples: Vec<i16> = data
                    .iter()
                    .map(|&s| <i16 as cpal::FromSample<T>>::from_sample_(s))
                    .collect();

                if let Err(TrySendError::Full(_)) = tx.try_send(samples) {
                    data_flags.overrun.store(true, Ordering::Release);
                }
            },
            move |err| match err {
                cpal::StreamError::DeviceNotAvailable => {
                    let _ = err_flags.fault.set("audio device is no longer available".to_string());
                }
                other => {
                    tracing::warn!("Audio stream error: {}", other);
                    err_flags.overrun.store(true, Ordering::Release);
                }
            },
            None,
        )
        .map_err(|e| DeviceError::OpenFailed(format!("Failed to build audio stream: {}", e)))
}

/// Chunked reader over a running cpal input stream
struct CpalInputStream {
    _stream: cpal::Stream,
    rx: mpsc::Receiver<Vec<i16>>,
    flags: Arc<StreamFlags>,
    pending: Vec<i16>,
    chunk_samples: usize,
}

impl InputStream for CpalInputStream {
    fn read_chunk(&mut self) -> Result<Vec<u8>, ReadError> {
        loop {
            if let Some(reason) = self.flags.fault.get() {
                return Err(ReadError::Fatal(reason.clone()));
            }
            if self.flags.overrun.swap(false, Ordering::AcqRel) {
                return Err(ReadError::Transient("input overflow, samples dropped".to_string()));
            }
            if self.pending.len() >= self.chunk_samples {
                let chunk: Vec<i16> = self.pending.drain(..self.chunk_samples).collect();
                return Ok(samples_to_bytes(&chunk));
            }

            match self.rx.recv_timeout(READ_TIMEOUT) {
                Ok(samples) => self.pending.extend_from_slice(&samples),
                Err(RecvTimeoutError::Timeout) => {
                    return Err(ReadError::Transient(format!(
                        "no audio within {}ms",
                        READ_TIMEOUT.as_millis()
                    )))
                }
                Err(RecvTimeoutError::Disconnected) => {
                    return Err(ReadError::Fatal("audio stream closed".to_string()))
                }
            }
        }
    }
}

/// Serialize i16 samples as little-endian bytes
fn samples_to_bytes(samples: &[i16]) -> Vec<u8> {
    samples.iter().flat_map(|s| s.to_le_bytes()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_samples_to_bytes_little_endian() {
        assert_eq!(samples_to_bytes(&[1, -2]), vec![0x01, 0x00, 0xfe, 0xff]);
        assert!(samples_to_bytes(&[]).is_empty());
    }

    #[test]
    fn test_sample_conversion_from_f32() {
        let full: i16 = <i16 as cpal::FromSample<f32>>::from_sample_(1.0);
        let silent: i16 = <i16 as cpal::FromSample<f32>>::from_sample_(0.0);
        assert_eq!(silent, 0);
        assert!(full > 32000);
    }
}
