//! WAV container stage
//!
//! Writes captured chunks as 16-bit PCM WAV. The WAV is the lossless
//! intermediate between capture and compression, and doubles as a recovery
//! file when compression fails.

use crate::audio::{CaptureFormat, FrameBuffer};
use crate::error::EncodeError;
use std::path::Path;

/// Format fields read back from a WAV header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContainerInfo {
    pub channels: u16,
    pub sample_rate: u32,
    pub bits_per_sample: u16,
    /// Length of the data chunk in bytes
    pub data_bytes: u64,
}

impl ContainerInfo {
    /// Playback length in seconds
    pub fn duration_seconds(&self) -> f64 {
        let frame_bytes = self.channels as u64 * (self.bits_per_sample as u64 / 8);
        if frame_bytes == 0 || self.sample_rate == 0 {
            return 0.0;
        }
        (self.data_bytes / frame_bytes) as f64 / self.sample_rate as f64
    }
}

/// Write `buffer` to `path` as a WAV file described by `format`.
///
/// The declared data length is exactly `buffer.byte_len()`.
pub fn to_container(
    buffer: FrameBuffer,
    format: CaptureFormat,
    path: &Path,
) -> Result<(), EncodeError> {
    let frame_bytes = format.channels as usize * format.bytes_per_sample();
    if format.bits_per_sample != 16 {
        return Err(EncodeError::UnsupportedFormat(format!(
            "{}-bit capture (only 16-bit PCM is written)",
            format.bits_per_sample
        )));
    }
    if buffer.byte_len() % frame_bytes != 0 {
        return Err(EncodeError::UnsupportedFormat(format!(
            "{} bytes is not a whole number of {}-byte frames",
            buffer.byte_len(),
            frame_bytes
        )));
    }

    let spec = hound::WavSpec {
        channels: format.channels,
        sample_rate: format.sample_rate,
        bits_per_sample: format.bits_per_sample,
        sample_format: hound::SampleFormat::Int,
    };

    let mut writer = hound::WavWriter::create(path, spec).map_err(write_error)?;
    for sample in buffer.samples() {
        writer.write_sample(sample).map_err(write_error)?;
    }
    writer.finalize().map_err(write_error)?;

    tracing::debug!(
        "Wrote {} bytes of PCM to {:?}",
        buffer.byte_len(),
        path
    );

    Ok(())
}

/// Read the format fields of an existing WAV file
pub fn read_container_info(path: &Path) -> Result<ContainerInfo, EncodeError> {
    let reader = hound::WavReader::open(path).map_err(read_error)?;
    let spec = reader.spec();

    Ok(ContainerInfo {
        channels: spec.channels,
        sample_rate: spec.sample_rate,
        bits_per_sample: spec.bits_per_sample,
        data_bytes: reader.len() as u64 * (spec.bits_per_sample as u64 / 8),
    })
}

fn write_error(e: hound::Error) -> EncodeError {
    match e {
        hound::Error::IoError(io) => EncodeError::from_write(io),
        other => EncodeError::WriteFailed(other.to_string()),
    }
}

/// Map a hound error raised while reading a container
pub(crate) fn read_error(e: hound::Error) -> EncodeError {
    match e {
        hound::Error::IoError(io) if io.kind() == std::io::ErrorKind::UnexpectedEof => {
            EncodeError::UnsupportedFormat("truncated WAV header".to_string())
        }
        hound::Error::IoError(io) => EncodeError::ReadFailed(io.to_string()),
        other => EncodeError::UnsupportedFormat(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::CAPTURE_FORMAT;

    /// Locate the data chunk in a RIFF file and return its declared size
    fn declared_data_len(bytes: &[u8]) -> u32 {
        let mut pos = 12;
        while pos + 8 <= bytes.len() {
            let id = &bytes[pos..pos + 4];
            let size = u32::from_le_bytes([
                bytes[pos + 4],
                bytes[pos + 5],
                bytes[pos + 6],
                bytes[pos + 7],
            ]);
            if id == b"data" {
                return size;
            }
            pos += 8 + size as usize + (size as usize & 1);
        }
        panic!("no data chunk");
    }

    fn synthetic_buffer(chunks: usize) -> FrameBuffer {
        let chunk_bytes = CAPTURE_FORMAT.chunk_bytes();
        FrameBuffer::from_chunks(
            (0..chunks)
                .map(|i| (0..chunk_bytes).map(|b| (b + i) as u8).collect())
                .collect(),
        )
    }

    #[test]
    fn test_declared_length_matches_buffer() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("take.wav");

        to_container(synthetic_buffer(7), CAPTURE_FORMAT, &path).unwrap();

        let bytes = std::fs::read(&path).unwrap();
        assert_eq!(declared_data_len(&bytes) as usize, 7 * 4096);

        let info = read_container_info(&path).unwrap();
        assert_eq!(info.channels, 2);
        assert_eq!(info.sample_rate, 44_100);
        assert_eq!(info.bits_per_sample, 16);
        assert_eq!(info.data_bytes, 7 * 4096);
    }

    #[test]
    fn test_samples_survive_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("take.wav");
        let buffer = synthetic_buffer(2);
        let expected: Vec<i16> = buffer.samples().collect();

        to_container(buffer, CAPTURE_FORMAT, &path).unwrap();

        let reader = hound::WavReader::open(&path).unwrap();
        let samples: Vec<i16> = reader.into_samples::<i16>().map(|s| s.unwrap()).collect();
        assert_eq!(samples, expected);
    }

    #[test]
    fn test_partial_frame_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.wav");
        let buffer = FrameBuffer::from_chunks(vec![vec![0u8; 6]]);

        let err = to_container(buffer, CAPTURE_FORMAT, &path).unwrap_err();
        assert!(matches!(err, EncodeError::UnsupportedFormat(_)));
        assert!(!path.exists());
    }

    #[test]
    fn test_missing_directory_is_write_failure() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("take.wav");

        let err = to_container(synthetic_buffer(1), CAPTURE_FORMAT, &path).unwrap_err();
        assert!(matches!(err, EncodeError::WriteFailed(_)));
    }

    #[test]
    fn test_garbage_header_is_unsupported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("junk.wav");
        std::fs::write(&path, b"definitely not a riff file").unwrap();

        let err = read_container_info(&path).unwrap_err();
        assert!(matches!(err, EncodeError::UnsupportedFormat(_)));
    }

    #[test]
    fn test_duration_from_info() {
        let info = ContainerInfo {
            channels: 2,
            sample_rate: 44_100,
            bits_per_sample: 16,
            data_bytes: 44_100 * 4 * 3,
        };
        assert_eq!(info.duration_seconds(), 3.0);
    }
}
