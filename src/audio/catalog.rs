//! Input device enumeration and loopback device lookup

use super::{AudioDevice, AudioHost};
use std::sync::Arc;

/// Default name fragment of the virtual loopback device
pub const DEFAULT_LOOPBACK_PATTERN: &str = "BlackHole";

/// Read-only view of the host's input devices
#[derive(Clone)]
pub struct DeviceCatalog {
    host: Arc<dyn AudioHost>,
    loopback_pattern: String,
}

impl DeviceCatalog {
    /// Create a catalog that prefers devices whose name contains `loopback_pattern`
    pub fn new(host: Arc<dyn AudioHost>, loopback_pattern: impl Into<String>) -> Self {
        Self {
            host,
            loopback_pattern: loopback_pattern.into(),
        }
    }

    /// Name fragment used by [`resolve_preferred`](Self::resolve_preferred)
    pub fn loopback_pattern(&self) -> &str {
        &self.loopback_pattern
    }

    /// List input-capable devices in host enumeration order.
    ///
    /// A failing host query is logged and treated as "no devices".
    pub fn enumerate(&self) -> Vec<AudioDevice> {
        match self.host.input_devices() {
            Ok(devices) => {
                let devices: Vec<AudioDevice> = devices
                    .into_iter()
                    .filter(|d| d.input_channels > 0)
                    .collect();
                for device in &devices {
                    tracing::debug!("Input device: {}", device);
                }
                devices
            }
            Err(e) => {
                tracing::warn!("Failed to enumerate audio devices: {}", e);
                Vec::new()
            }
        }
    }

    /// Look up a device by its enumeration index
    pub fn find(&self, index: usize) -> Option<AudioDevice> {
        self.enumerate().into_iter().find(|d| d.index == index)
    }

    /// First device whose name matches the loopback pattern (case-insensitive).
    ///
    /// `None` means the caller should fall back to manual selection.
    pub fn resolve_preferred(&self) -> Option<AudioDevice> {
        let device = self
            .enumerate()
            .into_iter()
            .find(|d| self.is_loopback(d));

        match &device {
            Some(d) => tracing::debug!(
                "Found loopback device matching '{}': {}",
                self.loopback_pattern,
                d
            ),
            None => tracing::debug!("No device matches '{}'", self.loopback_pattern),
        }

        device
    }

    /// Whether `device` matches the loopback pattern
    pub fn is_loopback(&self, device: &AudioDevice) -> bool {
        !self.loopback_pattern.is_empty()
            && device
                .name
                .to_lowercase()
                .contains(&self.loopback_pattern.to_lowercase())
    }
}
