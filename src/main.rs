use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use sensor_collector::audio::wav::HEADER_LEN;
use sensor_collector::config::KEY_AUDIO_DURATION;
use sensor_collector::{
    AudioDevice, AudioFile, CollectorServer, Config, FileDevice, HeartRateRegistry,
    SessionController, StartParams, ToneDevice, WavHeader,
};
use tracing::{info, warn, Level};

#[derive(Parser)]
#[command(name = "sensor-collector", version, about = "Wearable audio and heart rate collector")]
struct Cli {
    /// Config file (extension optional)
    #[arg(long, default_value = "config/sensor-collector")]
    config: String,

    /// Log debug output
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Receive heart rate events and log them until Ctrl-C
    Listen {
        /// Override the configured port
        #[arg(long)]
        port: Option<u16>,
    },
    /// Record one capture session to completion
    Record {
        /// Mark the session as started by an automatic trigger
        #[arg(long)]
        triggered: bool,
        /// Sample mode (fixed 5 minute capture)
        #[arg(long)]
        sample: bool,
        /// Override the configured duration, in seconds
        #[arg(long)]
        duration: Option<u64>,
        /// Output file name inside the configured output directory
        #[arg(long)]
        name: Option<String>,
        /// Replay a WAV or raw PCM file instead of the tone generator
        #[arg(long)]
        from_file: Option<PathBuf>,
    },
    /// Print the format of a finalized recording
    Inspect { path: PathBuf },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_max_level(if cli.verbose { Level::DEBUG } else { Level::INFO })
        .init();

    let cfg = Config::load_or_default(&cli.config)?;
    info!("Sensor Collector v{}", env!("CARGO_PKG_VERSION"));
    info!("Loaded config: {}", cfg.service.name);

    match cli.command {
        Command::Listen { port } => listen(&cfg, port).await,
        Command::Record {
            triggered,
            sample,
            duration,
            name,
            from_file,
        } => record(cfg, triggered, sample, duration, name, from_file).await,
        Command::Inspect { path } => inspect(&path),
    }
}

async fn listen(cfg: &Config, port: Option<u16>) -> Result<()> {
    let registry = HeartRateRegistry::new();
    registry.register(|event: sensor_collector::HeartRateEvent| {
        info!(
            "Heart rate {} bpm at {}",
            event.heart_rate,
            event.received_at.to_rfc3339()
        );
    });

    let port = port.unwrap_or(cfg.service.http.port);
    let server = CollectorServer::bind((cfg.service.http.bind.as_str(), port), registry)
        .await
        .context("Failed to start collector server")?;
    info!("Listening for heart rate events on {}", server.local_addr()?);

    server
        .run(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!("Failed to listen for Ctrl-C: {}", e);
            }
        })
        .await?;

    Ok(())
}

async fn record(
    cfg: Config,
    triggered: bool,
    sample: bool,
    duration: Option<u64>,
    name: Option<String>,
    from_file: Option<PathBuf>,
) -> Result<()> {
    let mut settings: HashMap<String, String> = cfg.settings.clone();
    if let Some(secs) = duration {
        settings.insert(KEY_AUDIO_DURATION.to_string(), secs.to_string());
    }

    let device: Arc<dyn AudioDevice> = match from_file {
        Some(path) => Arc::new(FileDevice::new(path)),
        None => Arc::new(ToneDevice::default()),
    };
    let controller = SessionController::new(device, Arc::new(settings));

    let file_name = name.unwrap_or_else(|| {
        format!("{}.wav", chrono::Local::now().format("%Y%m%d_%H%M%S"))
    });
    let output_file = cfg.recording.output_dir.join(&file_name);

    let params = StartParams::new()
        .with_temp_file(&cfg.recording.temp_file)
        .with_output_file(&output_file)
        .with_log_file(&cfg.recording.log_file)
        .with_triggered(triggered)
        .with_sample(sample);

    controller
        .start(params)
        .await
        .context("Capture session was not started")?;

    tokio::select! {
        _ = controller.wait_until_idle() => {}
        _ = tokio::signal::ctrl_c() => {
            info!("Interrupted, finalizing capture");
            controller.shutdown().await;
        }
    }

    info!("Session complete: {}", output_file.display());
    Ok(())
}

fn inspect(path: &Path) -> Result<()> {
    let bytes = std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let header = WavHeader::parse(&bytes)?;
    let payload = bytes.len().saturating_sub(HEADER_LEN);

    info!(
        "{}: {}Hz, {} channel(s), {} bits, {} data bytes ({} on disk)",
        path.display(),
        header.sample_rate,
        header.channels,
        header.bits_per_sample,
        header.data_len,
        payload
    );
    if header.data_len as usize != payload {
        warn!("Header data length does not match payload size");
    }

    let audio = AudioFile::open(path)?;
    info!("Duration: {:.1} seconds", audio.duration_seconds);

    Ok(())
}
