//! sysrec: record system audio to compressed files
//!
//! This library provides the core functionality for:
//! - Enumerating input devices and finding a loopback device (e.g. BlackHole)
//! - Capturing 16-bit stereo PCM at 44.1 kHz on a dedicated capture thread
//! - Writing the capture as WAV, then compressing it to constant-bitrate Ogg Opus
//!
//! # Architecture
//!
//! ```text
//!                        ┌───────────────────────────────┐
//!                        │      RecordingController      │
//!                        └───────────────────────────────┘
//!                                        │
//!              ┌─────────────────────────┼─────────────────────────┐
//!              │                         │                         │
//!              ▼                         ▼                         ▼
//!     ┌────────────────┐        ┌────────────────┐        ┌────────────────┐
//!     │ DeviceCatalog  │        │ CaptureSession │        │   Transcoder   │
//!     │  (enumerate)   │        │ (capture loop) │        │ (wav → opus)   │
//!     └────────────────┘        └────────────────┘        └────────────────┘
//!              │                         │
//!              ▼                         ▼ fixed-size chunks
//!     ┌─────────────────────────────────────────────┐
//!     │          AudioHost (cpal by default)        │
//!     └─────────────────────────────────────────────┘
//! ```
//!
//! Front ends own a [`RecordingController`] and observe it through
//! [`RecordingObserver`]; nothing in the engine is global.

pub mod audio;
pub mod cli;
pub mod config;
pub mod encode;
pub mod error;
pub mod recorder;
pub mod state;

pub use audio::{AudioDevice, AudioHost, CaptureFormat, CaptureSession, DeviceCatalog, FrameBuffer};
pub use cli::{Cli, Commands};
pub use config::Config;
pub use error::{DeviceError, EncodeError, Result, SysrecError};
pub use recorder::{RecordingArtifact, RecordingController, RecordingObserver, ToggleOutcome};
