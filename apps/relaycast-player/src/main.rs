//! Relaycast Player - headless SHOUTcast/Icecast stream player.
//!
//! Connects to a station, pulls samples at real-time cadence and logs
//! now-playing changes. The demuxed compressed audio can be written to a
//! file or stdout for an external decoder.

mod config;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use relaycast_core::{
    ChannelEventEmitter, ErrorCode, StreamError, StreamEvent, StreamSession,
};
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::signal;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::time::Instant;

use crate::config::PlayerConfig;

/// Relaycast Player - Headless internet radio client.
#[derive(Parser, Debug)]
#[command(name = "relaycast-player")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Station URL (overrides config file).
    #[arg(env = "RELAYCAST_URL")]
    url: Option<String>,

    /// Path to the configuration file (YAML).
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace).
    #[arg(short, long, default_value = "info", env = "RELAYCAST_LOG_LEVEL")]
    log_level: log::LevelFilter,

    /// Write demuxed audio to FILE, or `-` for stdout.
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// User-Agent header (overrides config file).
    #[arg(short = 'u', long, env = "RELAYCAST_USER_AGENT")]
    user_agent: Option<String>,

    /// Do not request in-band metadata.
    #[arg(long)]
    no_metadata: bool,

    /// Pull as fast as the server sends instead of at real-time cadence.
    #[arg(long)]
    no_pace: bool,

    /// Print events as JSON lines on stderr.
    #[arg(long)]
    json: bool,

    /// Stop after this many samples.
    #[arg(short = 'n', long)]
    max_samples: Option<u64>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    env_logger::Builder::new()
        .filter_level(args.log_level)
        .format_timestamp_millis()
        .init();

    log::info!("Relaycast Player v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let mut config =
        PlayerConfig::load(args.config.as_deref()).context("Failed to load configuration")?;

    // Apply CLI overrides
    if let Some(url) = args.url {
        config.url = Some(url);
    }
    if let Some(output) = args.output {
        config.output = Some(output);
    }
    if let Some(user_agent) = args.user_agent {
        config.connection.user_agent = user_agent;
    }
    if args.no_metadata {
        config.connection.request_metadata = false;
    }
    if args.no_pace {
        config.pace = false;
    }

    let url = config
        .url
        .clone()
        .context("No station URL given. Pass one as an argument or set RELAYCAST_URL.")?;

    let (emitter, events) = ChannelEventEmitter::new();
    let event_task = tokio::spawn(report_events(events, args.json));

    let mut session = StreamSession::connect(&url, config.connection.clone(), Arc::new(emitter))
        .await
        .map_err(|e| anyhow::anyhow!("[{}] {}", e.code(), e))
        .with_context(|| format!("Failed to connect to {url}"))?;

    let station = session.station_info();
    log::info!(
        "Connected: {:?} ({}), metadata interval {}",
        station.name,
        station.genre,
        session.metadata_interval()
    );

    let mut output = open_output(config.output.as_deref()).await?;

    // Disconnect the session on Ctrl+C / SIGTERM
    let cancel = session.cancellation_token();
    tokio::spawn(async move {
        shutdown_signal().await;
        log::info!("Shutdown signal received, stopping playback...");
        cancel.cancel();
    });

    let result = play(&mut session, &config, output.as_mut(), args.max_samples).await;

    if let Some(output) = output.as_mut() {
        output.flush().await.context("Failed to flush output")?;
    }
    session.disconnect().await;
    drop(session);
    let _ = event_task.await;

    log::info!("Stopped after {:.1}s of audio", result?.as_secs_f64());
    Ok(())
}

type Output = Box<dyn AsyncWrite + Send + Unpin>;

/// Pull loop. Returns the presentation time reached.
async fn play(
    session: &mut StreamSession,
    config: &PlayerConfig,
    mut output: Option<&mut Output>,
    max_samples: Option<u64>,
) -> Result<Duration> {
    let started = Instant::now();
    let poll_interval = Duration::from_secs(config.poll_interval_secs.max(1));
    let mut last_poll = Instant::now();
    let mut pulled: u64 = 0;

    while max_samples.map_or(true, |max| pulled < max) {
        if last_poll.elapsed() >= poll_interval {
            last_poll = Instant::now();
            if !session.poll_connection() {
                log::warn!("No data within the liveness window, forcing reconnect");
                match session.reconnect().await {
                    Ok(()) | Err(StreamError::Cancelled) => {}
                    Err(e) => return Err(e).context("Reconnect failed"),
                }
            }
        }

        let sample = match session.next_sample().await {
            Ok(sample) => sample,
            Err(StreamError::Cancelled) => break,
            Err(e) => {
                let code = e.code();
                return Err(e).with_context(|| format!("Stream failed ({code})"));
            }
        };
        pulled += 1;

        if let Some(out) = output.as_deref_mut() {
            out.write_all(&sample.data)
                .await
                .context("Failed to write audio")?;
        }

        if config.pace {
            tokio::time::sleep_until(started + sample.timestamp + sample.duration).await;
        }
    }

    log::debug!("Pulled {} samples", pulled);
    Ok(session.elapsed())
}

async fn open_output(path: Option<&std::path::Path>) -> Result<Option<Output>> {
    let Some(path) = path else {
        return Ok(None);
    };
    if path.as_os_str() == "-" {
        return Ok(Some(Box::new(tokio::io::stdout())));
    }
    let file = tokio::fs::File::create(path)
        .await
        .with_context(|| format!("Failed to create output file: {}", path.display()))?;
    log::info!("Writing audio to {}", path.display());
    Ok(Some(Box::new(file)))
}

/// Logs session events until the session is dropped.
async fn report_events(mut events: UnboundedReceiver<StreamEvent>, json: bool) {
    while let Some(event) = events.recv().await {
        match &event {
            StreamEvent::MetadataChanged { title, artist, .. } => {
                log::info!("Now playing: {} - {}", artist, title);
            }
            StreamEvent::Reconnected { .. } => log::info!("Stream reconnected"),
            StreamEvent::StationInfoChanged { station, audio, .. } => log::info!(
                "Station: {:?} [{} {} Hz, {} ch, {} kbps]",
                station.name,
                audio.format,
                audio.sample_rate,
                audio.channels,
                audio.bit_rate
            ),
        }
        if json {
            match serde_json::to_string(&event) {
                Ok(line) => eprintln!("{line}"),
                Err(e) => log::warn!("Failed to serialize event: {}", e),
            }
        }
    }
}

/// Waits for a shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            log::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                log::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
