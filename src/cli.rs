// Command-line interface definitions for sysrec
//
// Kept separate from main.rs so the definitions are part of the library
// and can be checked in tests.

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "sysrec")]
#[command(author, version, about = "Record system audio to compressed files")]
#[command(long_about = "
sysrec records what your machine is playing (or any input device) and
saves it as a compressed Ogg Opus file.

SETUP:
  1. Install a loopback device, e.g. on macOS: brew install blackhole-2ch
  2. Route system output to it (a Multi-Output Device keeps your speakers on)
  3. Run: sysrec devices (the loopback device should be marked)
  4. Run: sysrec record

USAGE:
  Recording runs until Ctrl+C (or --duration) and is saved to ~/Recordings
  as recording_<YYYYMMDD_HHMMSS>.opus.
")]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<std::path::PathBuf>,

    /// Increase verbosity (-v = debug, -vv = trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Quiet mode (errors only)
    #[arg(short, long)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug, PartialEq)]
pub enum Commands {
    /// Record until Ctrl+C (default if no command specified)
    Record {
        /// Device index from `sysrec devices` (default: loopback device)
        #[arg(short, long, value_name = "INDEX")]
        device: Option<usize>,

        /// Stop automatically after this many seconds
        #[arg(long, value_name = "SECS")]
        duration: Option<u64>,

        /// Output directory (overrides config)
        #[arg(short, long, value_name = "DIR")]
        output: Option<std::path::PathBuf>,

        /// Save uncompressed WAV instead of Opus
        #[arg(long)]
        wav: bool,

        /// Constant bitrate for Opus output in kbps
        #[arg(long, value_name = "KBPS")]
        bitrate: Option<u32>,
    },

    /// List input devices and show whether the loopback device is present
    Devices,

    /// Compress an existing WAV (e.g. one left behind by a failed recording)
    Convert {
        /// Path to the WAV file
        file: std::path::PathBuf,

        /// Output path (default: same name with .opus)
        #[arg(short, long, value_name = "FILE")]
        output: Option<std::path::PathBuf>,

        /// Constant bitrate in kbps
        #[arg(long, value_name = "KBPS")]
        bitrate: Option<u32>,
    },

    /// Show current configuration
    Config {
        /// Write the default config file if none exists
        #[arg(long)]
        init: bool,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_record_flags() {
        let cli = Cli::parse_from(["sysrec", "-v", "record", "--device", "2", "--duration", "30", "--wav"]);
        assert_eq!(cli.verbose, 1);
        assert_eq!(
            cli.command,
            Some(Commands::Record {
                device: Some(2),
                duration: Some(30),
                output: None,
                wav: true,
                bitrate: None,
            })
        );
    }

    #[test]
    fn test_no_command_defaults_to_none() {
        let cli = Cli::parse_from(["sysrec"]);
        assert!(cli.command.is_none());
    }
}
