//! Transcoding of captured audio
//!
//! Two stateless stages:
//! - [`to_container`]: raw chunks → 16-bit PCM WAV
//! - [`to_compressed`]: WAV → constant-bitrate Ogg Opus
//!
//! Neither stage touches files other than its declared output.

pub mod ogg_opus;
pub mod wav;

pub use ogg_opus::{to_compressed, DEFAULT_BITRATE_KBPS};
pub use wav::{read_container_info, to_container, ContainerInfo};
