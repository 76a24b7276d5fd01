//! Configuration loading and types for sysrec
//!
//! Configuration is loaded in layers:
//! 1. Built-in defaults
//! 2. Config file (~/.config/sysrec/config.toml)
//! 3. Environment variables (SYSREC_*)
//! 4. CLI arguments (highest priority)

use crate::audio::catalog::DEFAULT_LOOPBACK_PATTERN;
use crate::encode::DEFAULT_BITRATE_KBPS;
use crate::error::SysrecError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default configuration file content
pub const DEFAULT_CONFIG: &str = r#"# sysrec configuration
#
# Location: ~/.config/sysrec/config.toml
# All settings can be overridden via CLI flags

[audio]
# Name fragment of the loopback device to record from when no explicit
# device is given (case-insensitive). BlackHole mirrors system output on macOS:
#   brew install blackhole-2ch
loopback_pattern = "BlackHole"

# Explicit device index (see `sysrec devices`). Takes precedence over
# loopback_pattern. Indices change when devices are added or removed.
# device = 2

[output]
# Directory for finished recordings (created if missing)
directory = "~/Recordings"

# Output format: "opus" (compressed) or "wav" (uncompressed, no transcoding)
format = "opus"

# Constant bitrate for compressed output, in kbps (6-510)
bitrate_kbps = 192

# Keep the intermediate WAV next to the compressed file
keep_container = false
"#;

/// Final file format of a recording
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Constant-bitrate Ogg Opus (default)
    #[default]
    Opus,
    /// Uncompressed WAV, the container is the final artifact
    Wav,
}

impl OutputFormat {
    /// File extension of the final artifact
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Opus => "opus",
            OutputFormat::Wav => "wav",
        }
    }
}

/// Root configuration structure
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub audio: AudioConfig,

    #[serde(default)]
    pub output: OutputConfig,
}

/// Audio device selection
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AudioConfig {
    /// Device name fragment preferred when no explicit device is given
    #[serde(default = "default_loopback_pattern")]
    pub loopback_pattern: String,

    /// Explicit device index from `sysrec devices`
    #[serde(default)]
    pub device: Option<usize>,
}

/// Where and how recordings are written
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct OutputConfig {
    /// Output directory, `~` expands to the home directory
    #[serde(default = "default_output_directory")]
    pub directory: String,

    /// Final file format
    #[serde(default)]
    pub format: OutputFormat,

    /// Constant bitrate for compressed output (kbps)
    #[serde(default = "default_bitrate_kbps")]
    pub bitrate_kbps: u32,

    /// Keep the intermediate WAV after successful compression
    #[serde(default)]
    pub keep_container: bool,
}

fn default_loopback_pattern() -> String {
    DEFAULT_LOOPBACK_PATTERN.to_string()
}

fn default_output_directory() -> String {
    "~/Recordings".to_string()
}

fn default_bitrate_kbps() -> u32 {
    DEFAULT_BITRATE_KBPS
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            loopback_pattern: default_loopback_pattern(),
            device: None,
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            directory: default_output_directory(),
            format: OutputFormat::default(),
            bitrate_kbps: default_bitrate_kbps(),
            keep_container: false,
        }
    }
}

impl OutputConfig {
    /// Output directory with `~` expanded
    pub fn resolve_directory(&self) -> PathBuf {
        expand_home(&self.directory)
    }
}

/// Expand a leading `~` to the user's home directory
pub fn expand_home(path: &str) -> PathBuf {
    if path == "~" {
        return dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
    }
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(path)
}

impl Config {
    /// Get the default config file path
    pub fn default_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("", "", "sysrec")
            .map(|dirs| dirs.config_dir().join("config.toml"))
    }
}

/// Load configuration from file, with defaults for missing values
pub fn load_config(path: Option<&Path>) -> Result<Config, SysrecError> {
    // Start with defaults
    let mut config = Config::default();

    // Determine config file path
    let config_path = path.map(PathBuf::from).or_else(Config::default_path);

    // Load from file if it exists
    if let Some(ref path) = config_path {
        if path.exists() {
            tracing::debug!("Loading config from {:?}", path);
            let contents = std::fs::read_to_string(path)
                .map_err(|e| SysrecError::Config(format!("Failed to read config: {}", e)))?;

            config = toml::from_str(&contents)
                .map_err(|e| SysrecError::Config(format!("Invalid config: {}", e)))?;
        } else {
            tracing::debug!("Config file not found at {:?}, using defaults", path);
        }
    }

    apply_env_overrides(&mut config, |key| std::env::var(key).ok())?;

    Ok(config)
}

/// Override config values from SYSREC_* variables supplied by `var`
fn apply_env_overrides(
    config: &mut Config,
    var: impl Fn(&str) -> Option<String>,
) -> Result<(), SysrecError> {
    if let Some(pattern) = var("SYSREC_LOOPBACK") {
        config.audio.loopback_pattern = pattern;
    }
    if let Some(device) = var("SYSREC_DEVICE") {
        let index = device
            .parse()
            .map_err(|_| SysrecError::Config(format!("SYSREC_DEVICE is not an index: {}", device)))?;
        config.audio.device = Some(index);
    }
    if let Some(dir) = var("SYSREC_OUTPUT_DIR") {
        config.output.directory = dir;
    }
    if let Some(bitrate) = var("SYSREC_BITRATE") {
        config.output.bitrate_kbps = bitrate
            .parse()
            .map_err(|_| SysrecError::Config(format!("SYSREC_BITRATE is not a number: {}", bitrate)))?;
    }
    Ok(())
}

/// Write the commented default config to `path` unless a file already exists
pub fn write_default_config(path: &Path) -> Result<bool, SysrecError> {
    if path.exists() {
        return Ok(false);
    }

    // Ensure parent directory exists
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|e| SysrecError::Config(format!("Failed to create config dir: {}", e)))?;
    }

    std::fs::write(path, DEFAULT_CONFIG)
        .map_err(|e| SysrecError::Config(format!("Failed to write config: {}", e)))?;

    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.audio.loopback_pattern, "BlackHole");
        assert_eq!(config.audio.device, None);
        assert_eq!(config.output.directory, "~/Recordings");
        assert_eq!(config.output.format, OutputFormat::Opus);
        assert_eq!(config.output.bitrate_kbps, 192);
        assert!(!config.output.keep_container);
    }

    #[test]
    fn test_default_config_text_parses_to_defaults() {
        let config: Config = toml::from_str(DEFAULT_CONFIG).unwrap();
        assert_eq!(config.audio.loopback_pattern, "BlackHole");
        assert_eq!(config.output.bitrate_kbps, 192);
        assert_eq!(config.output.format, OutputFormat::Opus);
    }

    #[test]
    fn test_parse_partial_config() {
        let toml_str = r#"
            [audio]
            device = 3

            [output]
            format = "wav"
        "#;

        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.audio.device, Some(3));
        assert_eq!(config.audio.loopback_pattern, "BlackHole"); // default
        assert_eq!(config.output.format, OutputFormat::Wav);
        assert_eq!(config.output.bitrate_kbps, 192); // default
    }

    #[test]
    fn test_empty_config_is_default() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.output.directory, "~/Recordings");
    }

    #[test]
    fn test_env_overrides() {
        let vars: HashMap<&str, &str> = [
            ("SYSREC_LOOPBACK", "Soundflower"),
            ("SYSREC_DEVICE", "4"),
            ("SYSREC_OUTPUT_DIR", "/tmp/takes"),
            ("SYSREC_BITRATE", "96"),
        ]
        .into_iter()
        .collect();

        let mut config = Config::default();
        apply_env_overrides(&mut config, |k| vars.get(k).map(|v| v.to_string())).unwrap();

        assert_eq!(config.audio.loopback_pattern, "Soundflower");
        assert_eq!(config.audio.device, Some(4));
        assert_eq!(config.output.directory, "/tmp/takes");
        assert_eq!(config.output.bitrate_kbps, 96);
    }

    #[test]
    fn test_env_override_rejects_bad_device() {
        let mut config = Config::default();
        let result = apply_env_overrides(&mut config, |k| {
            (k == "SYSREC_DEVICE").then(|| "mic".to_string())
        });
        assert!(matches!(result, Err(SysrecError::Config(_))));
    }

    #[test]
    fn test_expand_home() {
        assert_eq!(expand_home("/var/rec"), PathBuf::from("/var/rec"));
        if let Some(home) = dirs::home_dir() {
            assert_eq!(expand_home("~/Recordings"), home.join("Recordings"));
            assert_eq!(expand_home("~"), home);
        }
    }

    #[test]
    fn test_load_config_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[output]\nbitrate_kbps = 128\n").unwrap();

        let config = load_config(Some(&path)).unwrap();
        assert_eq!(config.output.bitrate_kbps, 128);
    }

    #[test]
    fn test_load_config_invalid_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[output\n").unwrap();

        assert!(matches!(load_config(Some(&path)), Err(SysrecError::Config(_))));
    }

    #[test]
    fn test_write_default_config_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        assert!(write_default_config(&path).unwrap());
        assert!(!write_default_config(&path).unwrap());
        assert_eq!(std::fs::read_to_string(&path).unwrap(), DEFAULT_CONFIG);
    }
}
