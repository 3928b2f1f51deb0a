use anyhow::{Context, Result};
use clap::Parser;
use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::EnvFilter;
use vidya_audio::{CpalBackend, CpalSettings, DeviceManager};
use vidya_core::{AppConfig, UiCommand};
use vidya_live::{SessionController, TransportRegistry};

/// Seconds of tutor audio the playback ring buffer can hold.
const PLAYBACK_BUFFER_SECS: u32 = 30;

#[derive(Parser)]
#[command(name = "vidya", about = "Live voice tutoring session")]
struct Cli {
    /// Path to the configuration file
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,

    /// Start a session immediately without the TUI; Ctrl-C stops it
    #[arg(long)]
    headless: bool,

    /// Print available audio devices and exit
    #[arg(long)]
    list_devices: bool,
}

fn list_devices() -> Result<()> {
    let devices = DeviceManager::new();
    println!("Input devices:");
    for (name, _) in devices.list_input_devices()? {
        println!("  {name}");
    }
    println!("Output devices:");
    for (name, _) in devices.list_output_devices()? {
        println!("  {name}");
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if cli.list_devices {
        return list_devices();
    }

    let config = AppConfig::load_from_file(&cli.config)
        .with_context(|| format!("failed to load config from {:?}", cli.config))?;

    let log_buffer = Arc::new(Mutex::new(VecDeque::<String>::new()));
    let tui_log_layer = vidya_tui::TuiLogLayer::new(Arc::clone(&log_buffer), 1000);

    let env_filter = EnvFilter::try_new(&config.general.log_level)
        .unwrap_or_else(|_| EnvFilter::new("info"));

    // The TUI owns the terminal, so the fmt layer only writes in headless mode.
    let fmt_layer = cli.headless.then(|| {
        tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_ansi(false)
    });

    let subscriber = tracing_subscriber::Registry::default()
        .with(env_filter)
        .with(fmt_layer)
        .with(tui_log_layer);

    tracing::subscriber::set_global_default(subscriber)
        .context("failed to set tracing subscriber")?;

    tracing::info!("vidya starting");

    let backend = CpalBackend::new(CpalSettings {
        input_device: config.capture.device_name.clone(),
        output_device: config.playback.device_name.clone(),
        capture_rate: config.capture.sample_rate,
        frame_size: config.capture.frame_size,
        playback_rate: config.playback.sample_rate,
        playback_channels: config.playback.channels,
        playback_buffer_secs: PLAYBACK_BUFFER_SECS,
    });

    let (controller, view_rx) = SessionController::new(
        config.session.clone(),
        config.playback.clone(),
        Box::new(backend),
        TransportRegistry::new(),
    );
    let (cmd_tx, cmd_rx) = tokio::sync::mpsc::unbounded_channel::<UiCommand>();
    let controller_handle = tokio::spawn(controller.run(cmd_rx));

    if cli.headless {
        let _ = cmd_tx.send(UiCommand::Start);
        tracing::info!("headless session running, press Ctrl-C to stop");
        tokio::signal::ctrl_c()
            .await
            .context("failed to listen for Ctrl-C")?;
        let _ = cmd_tx.send(UiCommand::Quit);
    } else {
        tracing::info!("TUI active, press 's' to start and 'q' to quit");
        vidya_tui::run(view_rx, cmd_tx.clone(), log_buffer)
            .await
            .context("TUI error")?;
    }

    tracing::info!("shutting down");
    drop(cmd_tx);
    controller_handle
        .await
        .context("session controller task failed")?;

    Ok(())
}
