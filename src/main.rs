use clap::Parser;
use std::error::Error;
use std::path::PathBuf;
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tracing_subscriber::EnvFilter;
use tunebridge::bridge::{self, BridgeHandle, VolumeController};
use tunebridge::config::BridgeConfig;
use tunebridge::host::pipe::{OutputFormat, pipe_messages};
use tunebridge::page::sim::SimPage;
use tunebridge::trace::{load_trace, parse_trace, replay};

/// Application configuration from CLI
#[derive(Parser, Debug, Clone)]
#[command(author, version, about)]
pub struct Config {
    /// Trace of page activity to replay (JSON lines). Reads stdin if omitted.
    #[arg(long)]
    trace: Option<PathBuf>,
    /// Target volume (0.0-1.0) the bridge enforces from page load.
    /// If unset, the TUNEBRIDGE_VOLUME env var will be used as a fallback.
    #[arg(long)]
    volume: Option<f64>,
    /// How delivered updates are printed to stdout
    #[arg(long, value_enum, default_value_t = OutputFormat::Json)]
    format: OutputFormat,
    /// Keep the bridge running this long after the last trace step
    #[arg(long, default_value_t = 1500)]
    linger_ms: u64,
    /// Enable debug logging to stderr
    #[arg(long)]
    pub debug_log: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            trace: None,
            volume: None,
            format: OutputFormat::Json,
            linger_ms: 1500,
            debug_log: false,
        }
    }
}

fn volume_from_env_if_unset(cli: &mut Config) {
    if cli.volume.is_none()
        && let Ok(s) = std::env::var("TUNEBRIDGE_VOLUME")
    {
        match s.trim().parse::<f64>() {
            Ok(v) => cli.volume = Some(v),
            Err(e) => tracing::warn!(value = %s, error = %e, "ignoring TUNEBRIDGE_VOLUME"),
        }
    }
}

fn init_logging(debug_log: bool) {
    let fallback = if debug_log { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn Error + Send + Sync>> {
    let mut cfg = Config::parse();
    init_logging(cfg.debug_log);
    volume_from_env_if_unset(&mut cfg);

    let steps = match cfg.trace.as_deref() {
        Some(path) => load_trace(path).await?,
        None => {
            let mut text = String::new();
            tokio::io::stdin().read_to_string(&mut text).await?;
            parse_trace(&text)?
        }
    };
    tracing::info!(steps = steps.len(), "trace loaded");

    let volume = cfg
        .volume
        .map(VolumeController::with_target)
        .unwrap_or_default();
    let (page, events) = SimPage::new();
    let BridgeHandle {
        commands,
        messages,
        shutdown,
        task,
    } = bridge::spawn(page.clone(), events, BridgeConfig::default(), volume);
    let printer = tokio::spawn(pipe_messages(messages, cfg.format, std::io::stdout()));

    replay(&page, &commands, &steps).await;
    tokio::time::sleep(Duration::from_millis(cfg.linger_ms)).await;

    let _ = shutdown.send(()).await;
    let stats = task.await?;
    let now = printer.await??;
    tracing::info!(
        emitted = stats.emitted,
        faults = stats.extraction_faults,
        corrections = stats.volume_corrections,
        tracks = now.track_changes,
        "replay finished"
    );
    Ok(())
}
