use crate::host::state::NowPlaying;
use crate::state::{LikeStatus, PlaybackSnapshot};
use crate::timer::format_clock;
use std::io::{self, Write};
use tokio::sync::mpsc;
use tracing::warn;

#[derive(clap::ValueEnum, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputFormat {
    /// Raw `STATE_UPDATE` messages, one per line
    #[default]
    Json,
    /// One now-playing line per effective change
    Text,
}

/// One-line now-playing summary.
pub fn summary_line(s: &PlaybackSnapshot) -> String {
    let state = if s.is_playing { "playing" } else { "paused" };
    let mut line = format!(
        "[{state}] {} - {} ({} / {})",
        s.title,
        s.artist,
        format_clock(s.progress_seconds as f64),
        format_clock(s.duration_seconds as f64)
    );
    match s.like_status {
        LikeStatus::Like => line.push_str(" +1"),
        LikeStatus::Dislike => line.push_str(" -1"),
        LikeStatus::Indifferent => {}
    }
    line
}

/// Prints bridge messages until the channel closes (stdout only, for
/// scripting). Returns the final host-side state.
pub async fn pipe_messages<W: Write>(
    mut rx: mpsc::Receiver<String>,
    format: OutputFormat,
    mut out: W,
) -> io::Result<NowPlaying> {
    let mut now = NowPlaying::new();
    while let Some(payload) = rx.recv().await {
        let changed = match now.apply_message(&payload) {
            Ok(changed) => changed,
            Err(e) => {
                warn!(error = %e, "skipping message");
                continue;
            }
        };
        match format {
            OutputFormat::Json => writeln!(out, "{payload}")?,
            OutputFormat::Text => {
                if changed && let Some(s) = now.snapshot.as_ref() {
                    writeln!(out, "{}", summary_line(s))?;
                }
            }
        }
        out.flush()?;
    }
    Ok(now)
}
