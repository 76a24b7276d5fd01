//! sysrec - record system audio to compressed files
//!
//! Run with `sysrec` or `sysrec record` to record until Ctrl+C.
//! Use `sysrec devices` to find the loopback device index.
//! Use `sysrec convert <file.wav>` to compress a leftover WAV.

use clap::Parser;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;
use sysrec::audio::{self, DeviceCatalog};
use sysrec::config::{self, Config, OutputFormat};
use sysrec::encode;
use sysrec::recorder::{RecordingArtifact, RecordingController, RecordingObserver};
use sysrec::{Cli, Commands};
use tracing_subscriber::EnvFilter;

/// Prints recording progress to the terminal
struct TerminalObserver;

impl RecordingObserver for TerminalObserver {
    fn on_started(&self, device_name: &str) {
        println!("Recording from {}. Press Ctrl+C to stop.", device_name);
    }

    fn on_stopped(&self, artifact: Option<&RecordingArtifact>) {
        println!();
        if artifact.is_none() {
            eprintln!("Recording was not saved.");
        }
    }

    fn on_device_error(&self, reason: &str) {
        eprintln!("\nDevice error: {}", reason);
    }

    fn on_tick(&self, elapsed_seconds: f64) {
        let secs = elapsed_seconds as u64;
        print!("\rRecording {:02}:{:02}", secs / 60, secs % 60);
        let _ = std::io::stdout().flush();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.quiet {
        "error"
    } else {
        match cli.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(format!("sysrec={},warn", log_level))),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    // Load configuration
    let mut config = config::load_config(cli.config.as_deref())?;

    let command = cli.command.unwrap_or(Commands::Record {
        device: None,
        duration: None,
        output: None,
        wav: false,
        bitrate: None,
    });

    // Run the appropriate command
    match command {
        Commands::Record {
            device,
            duration,
            output,
            wav,
            bitrate,
        } => {
            // Apply CLI overrides
            if let Some(dir) = output {
                config.output.directory = dir.to_string_lossy().into_owned();
            }
            if wav {
                config.output.format = OutputFormat::Wav;
            }
            if let Some(kbps) = bitrate {
                config.output.bitrate_kbps = kbps;
            }
            let device = device.or(config.audio.device);
            run_record(&config, device, duration.map(Duration::from_secs)).await?;
        }

        Commands::Devices => {
            show_devices(&config);
        }

        Commands::Convert {
            file,
            output,
            bitrate,
        } => {
            let bitrate = bitrate.unwrap_or(config.output.bitrate_kbps);
            convert_file(&file, output, bitrate)?;
        }

        Commands::Config { init } => {
            show_config(&config, cli.config.as_deref(), init)?;
        }
    }

    Ok(())
}

/// Record until Ctrl+C or the optional duration elapses
async fn run_record(
    config: &Config,
    device: Option<usize>,
    duration: Option<Duration>,
) -> anyhow::Result<()> {
    let mut controller = RecordingController::new(audio::create_host(), config)
        .with_observer(Box::new(TerminalObserver));

    let (mut controller, started) = tokio::task::spawn_blocking(move || {
        let started = controller.begin(device);
        (controller, started)
    })
    .await?;
    started?;

    let deadline = duration.map(|d| tokio::time::Instant::now() + d);
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    let mut ticker = tokio::time::interval(Duration::from_secs(1));

    loop {
        tokio::select! {
            _ = &mut ctrl_c => {
                tracing::debug!("Received Ctrl+C, stopping");
                break;
            }
            _ = wait_until(deadline) => {
                tracing::debug!("Duration reached, stopping");
                break;
            }
            _ = ticker.tick() => {
                controller.tick();
            }
        }
    }

    let artifact = tokio::task::spawn_blocking(move || controller.finish()).await??;
    println!(
        "Saved {} ({:.1}s)",
        artifact.file_path.display(),
        artifact.duration_seconds
    );

    Ok(())
}

/// Sleep until `deadline`, or forever if there is none
async fn wait_until(deadline: Option<tokio::time::Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

/// List input devices, marking the loopback device
fn show_devices(config: &Config) {
    let catalog = DeviceCatalog::new(audio::create_host(), config.audio.loopback_pattern.clone());
    let devices = catalog.enumerate();

    match devices.iter().find(|d| catalog.is_loopback(d)) {
        Some(device) => println!("✅ Loopback device found: {}", device),
        None => println!(
            "❌ No device matching '{}'. Pass --device <INDEX> to record from another input.",
            catalog.loopback_pattern()
        ),
    }
    println!();

    if devices.is_empty() {
        println!("No audio input devices found.");
        return;
    }

    println!("Input devices:");
    for device in &devices {
        let marker = if catalog.is_loopback(device) { " *" } else { "" };
        println!("  {}{}", device, marker);
    }
}

/// Compress a WAV file to Opus
fn convert_file(file: &Path, output: Option<PathBuf>, bitrate_kbps: u32) -> anyhow::Result<()> {
    let info = encode::read_container_info(file)?;
    println!(
        "Audio format: {} Hz, {} channel(s), {}-bit, {:.1}s",
        info.sample_rate,
        info.channels,
        info.bits_per_sample,
        info.duration_seconds()
    );

    let output = output.unwrap_or_else(|| file.with_extension(OutputFormat::Opus.extension()));
    encode::to_compressed(file, &output, bitrate_kbps)?;
    println!("Saved {}", output.display());

    Ok(())
}

/// Print the effective configuration
fn show_config(config: &Config, path: Option<&Path>, init: bool) -> anyhow::Result<()> {
    let config_path = path.map(PathBuf::from).or_else(Config::default_path);

    if init {
        match &config_path {
            Some(path) => {
                if config::write_default_config(path)? {
                    println!("Wrote default config to {}", path.display());
                } else {
                    println!("Config already exists at {}", path.display());
                }
            }
            None => anyhow::bail!("Could not determine config directory"),
        }
    }

    if let Some(path) = &config_path {
        println!("# Config file: {}", path.display());
    }
    println!("# Output directory: {}", config.output.resolve_directory().display());
    println!();
    println!("{}", toml::to_string_pretty(config)?);

    Ok(())
}
