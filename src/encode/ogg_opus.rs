//! Ogg Opus compression stage
//!
//! Decodes the WAV container and re-encodes it as constant-bitrate Opus in
//! an Ogg stream. Opus always runs at 48 kHz here, so 44.1 kHz captures are
//! resampled per channel first.

use super::wav::read_error;
use crate::error::EncodeError;
use ogg::writing::PacketWriteEndInfo;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// Opus encoding sample rate
pub const OPUS_SAMPLE_RATE: u32 = 48_000;

/// Opus frame size in samples per channel (20ms at 48kHz)
pub const FRAME_SIZE: usize = 960;

/// Default constant bitrate in kbps
pub const DEFAULT_BITRATE_KBPS: u32 = 192;

/// Bitrates libopus accepts, in kbps
const BITRATE_RANGE_KBPS: std::ops::RangeInclusive<u32> = 6..=510;

/// Encoder lookahead at 48 kHz, written as the stream's pre-skip
const PRE_SKIP: u16 = 312;

/// Largest packet libopus produces for a single frame
const MAX_PACKET_BYTES: usize = 4000;

/// Compress the WAV at `container_path` into an Ogg Opus file at
/// `destination_path` with a constant `bitrate_kbps`.
///
/// The container is left in place.
pub fn to_compressed(
    container_path: &Path,
    destination_path: &Path,
    bitrate_kbps: u32,
) -> Result<(), EncodeError> {
    if !BITRATE_RANGE_KBPS.contains(&bitrate_kbps) {
        return Err(EncodeError::UnsupportedFormat(format!(
            "bitrate {} kbps is outside {}-{} kbps",
            bitrate_kbps,
            BITRATE_RANGE_KBPS.start(),
            BITRATE_RANGE_KBPS.end()
        )));
    }

    let reader = hound::WavReader::open(container_path).map_err(read_error)?;
    let spec = reader.spec();

    if spec.sample_format != hound::SampleFormat::Int || spec.bits_per_sample != 16 {
        return Err(EncodeError::UnsupportedFormat(format!(
            "{}-bit {:?} samples (expected 16-bit integer PCM)",
            spec.bits_per_sample, spec.sample_format
        )));
    }
    let channels = match spec.channels {
        1 => opus::Channels::Mono,
        2 => opus::Channels::Stereo,
        n => {
            return Err(EncodeError::UnsupportedFormat(format!(
                "{} channels (expected mono or stereo)",
                n
            )))
        }
    };
    if spec.sample_rate == 0 {
        return Err(EncodeError::UnsupportedFormat("sample rate of 0 Hz".to_string()));
    }

    let samples: Vec<i16> = reader
        .into_samples::<i16>()
        .collect::<Result<_, _>>()
        .map_err(read_error)?;

    let pcm = resample_interleaved(
        &samples,
        spec.channels as usize,
        spec.sample_rate,
        OPUS_SAMPLE_RATE,
    );

    tracing::debug!(
        "Encoding {} samples ({} Hz -> {} Hz) at {} kbps",
        samples.len(),
        spec.sample_rate,
        OPUS_SAMPLE_RATE,
        bitrate_kbps
    );

    let mut encoder = opus::Encoder::new(OPUS_SAMPLE_RATE, channels, opus::Application::Audio)
        .map_err(|e| EncodeError::WriteFailed(format!("Opus init failed: {}", e)))?;
    encoder
        .set_bitrate(opus::Bitrate::Bits(bitrate_kbps as i32 * 1000))
        .map_err(|e| EncodeError::UnsupportedFormat(format!("Opus bitrate rejected: {}", e)))?;
    encoder
        .set_vbr(false)
        .map_err(|e| EncodeError::WriteFailed(format!("Opus CBR setup failed: {}", e)))?;

    let file = File::create(destination_path).map_err(EncodeError::from_write)?;
    let mut out = BufWriter::new(file);

    write_ogg_opus(
        &mut encoder,
        &mut out,
        &pcm,
        spec.channels as usize,
        spec.sample_rate,
    )?;
    out.flush().map_err(EncodeError::from_write)?;

    Ok(())
}

/// Write the Opus header packets and the encoded audio to `out`
fn write_ogg_opus<W: Write>(
    encoder: &mut opus::Encoder,
    out: &mut W,
    pcm: &[i16],
    channels: usize,
    input_sample_rate: u32,
) -> Result<(), EncodeError> {
    let serial = rand_serial();
    let mut packet_writer = ogg::writing::PacketWriter::new(out);

    // Identification header
    let mut id_header = Vec::with_capacity(19);
    id_header.extend_from_slice(b"OpusHead");
    id_header.push(1); // Version
    id_header.push(channels as u8);
    id_header.extend_from_slice(&PRE_SKIP.to_le_bytes());
    id_header.extend_from_slice(&input_sample_rate.to_le_bytes());
    id_header.extend_from_slice(&0i16.to_le_bytes()); // Output gain
    id_header.push(0); // Channel mapping family

    packet_writer
        .write_packet(id_header, serial, PacketWriteEndInfo::EndPage, 0)
        .map_err(EncodeError::from_write)?;

    // Comment header
    let vendor = concat!("sysrec ", env!("CARGO_PKG_VERSION"));
    let mut comment_header = Vec::new();
    comment_header.extend_from_slice(b"OpusTags");
    comment_header.extend_from_slice(&(vendor.len() as u32).to_le_bytes());
    comment_header.extend_from_slice(vendor.as_bytes());
    comment_header.extend_from_slice(&0u32.to_le_bytes()); // No user comments

    packet_writer
        .write_packet(comment_header, serial, PacketWriteEndInfo::EndPage, 0)
        .map_err(EncodeError::from_write)?;

    let frame_samples = FRAME_SIZE * channels;
    let total_frames = (pcm.len() / channels) as u64;
    let frame_count = pcm.len().div_ceil(frame_samples).max(1);
    let mut granule_pos = PRE_SKIP as u64;

    for index in 0..frame_count {
        let start = (index * frame_samples).min(pcm.len());
        let end = (start + frame_samples).min(pcm.len());

        // Pad the last frame with silence
        let mut frame = vec![0i16; frame_samples];
        frame[..end - start].copy_from_slice(&pcm[start..end]);

        let mut packet = vec![0u8; MAX_PACKET_BYTES];
        let len = encoder
            .encode(&frame, &mut packet)
            .map_err(|e| EncodeError::WriteFailed(format!("Opus encoding failed: {}", e)))?;
        packet.truncate(len);

        let is_last = index + 1 == frame_count;
        let end_info = if is_last {
            // End trimming: the final granule counts real samples only
            granule_pos = PRE_SKIP as u64 + total_frames;
            PacketWriteEndInfo::EndStream
        } else {
            granule_pos += FRAME_SIZE as u64;
            PacketWriteEndInfo::NormalPacket
        };

        packet_writer
            .write_packet(packet, serial, end_info, granule_pos)
            .map_err(EncodeError::from_write)?;
    }

    Ok(())
}

/// Resample interleaved PCM channel by channel
fn resample_interleaved(samples: &[i16], channels: usize, from_rate: u32, to_rate: u32) -> Vec<i16> {
    if from_rate == to_rate || samples.is_empty() || channels == 0 {
        return samples.to_vec();
    }

    let per_channel: Vec<Vec<i16>> = (0..channels)
        .map(|ch| {
            let channel: Vec<i16> = samples.iter().skip(ch).step_by(channels).copied().collect();
            resample(&channel, from_rate, to_rate)
        })
        .collect();

    let frames = per_channel.iter().map(Vec::len).min().unwrap_or(0);
    let mut output = Vec::with_capacity(frames * channels);
    for i in 0..frames {
        for channel in &per_channel {
            output.push(channel[i]);
        }
    }
    output
}

/// Linear interpolation resampling of a single channel
fn resample(samples: &[i16], from_rate: u32, to_rate: u32) -> Vec<i16> {
    if from_rate == to_rate || samples.is_empty() {
        return samples.to_vec();
    }

    let ratio = to_rate as f64 / from_rate as f64;
    let new_len = (samples.len() as u64 * to_rate as u64).div_ceil(from_rate as u64) as usize;
    let mut output = Vec::with_capacity(new_len);

    for i in 0..new_len {
        let src_idx = i as f64 / ratio;
        let idx = src_idx.floor() as usize;
        let frac = src_idx - idx as f64;

        let sample = if idx + 1 < samples.len() {
            samples[idx] as f64 * (1.0 - frac) + samples[idx + 1] as f64 * frac
        } else {
            samples.get(idx).copied().unwrap_or(0) as f64
        };

        output.push(sample.round() as i16);
    }

    output
}

/// Generate a pseudo-random serial number for the Ogg stream
fn rand_serial() -> u32 {
    use std::time::{SystemTime, UNIX_EPOCH};
    let duration = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default();
    (duration.as_secs() as u32) ^ duration.subsec_nanos()
}
