//! JSON-lines traces of timed page activity, replayed against a [`SimPage`].
//!
//! ```text
//! # at_ms is relative to the start of replay
//! {"at_ms": 0,    "action": "show_player_bar"}
//! {"at_ms": 0,    "action": "insert_video", "duration": 215.0}
//! {"at_ms": 10,   "action": "set_track", "title": "Song", "artist": "Band"}
//! {"at_ms": 500,  "action": "user_play"}
//! {"at_ms": 4000, "action": "command", "command": {"op": "seek", "to": 90}}
//! ```

use crate::host::commands::{Command, HostCommands};
use crate::page::sim::SimPage;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use tokio::time::{Instant, sleep_until};
use tracing::debug;

#[derive(thiserror::Error, Debug)]
pub enum TraceError {
    #[error("cannot read trace: {0}")]
    Io(#[from] std::io::Error),
    #[error("line {line}: {source}")]
    Parse {
        line: usize,
        #[source]
        source: serde_json::Error,
    },
    #[error("line {line}: step is earlier than the one before it")]
    OutOfOrder { line: usize },
}

fn default_volume() -> f64 {
    1.0
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum TraceAction {
    ShowPlayerBar,
    InsertVideo {
        #[serde(default = "default_volume")]
        volume: f64,
        /// Absent while the media is still loading.
        #[serde(default)]
        duration: Option<f64>,
    },
    RemoveVideo,
    SetTrack {
        title: String,
        artist: String,
        #[serde(default)]
        thumbnail_url: String,
        #[serde(default)]
        has_video: bool,
    },
    SetLike {
        status: String,
    },
    SetDuration {
        duration: f64,
    },
    UserPlay,
    UserPause,
    End,
    Seek {
        to: f64,
    },
    Buffer,
    ExternalVolume {
        volume: f64,
    },
    FailReads {
        count: u32,
    },
    SetPlayerApi {
        present: bool,
    },
    Command {
        command: Command,
    },
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TraceStep {
    pub at_ms: u64,
    #[serde(flatten)]
    pub action: TraceAction,
}

/// Parses a trace. Blank lines and `#` comments are skipped; steps must be
/// in time order.
pub fn parse_trace(text: &str) -> Result<Vec<TraceStep>, TraceError> {
    let mut steps: Vec<TraceStep> = Vec::new();
    for (idx, raw) in text.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let step: TraceStep = serde_json::from_str(line).map_err(|source| TraceError::Parse {
            line: idx + 1,
            source,
        })?;
        if steps.last().is_some_and(|prev| prev.at_ms > step.at_ms) {
            return Err(TraceError::OutOfOrder { line: idx + 1 });
        }
        steps.push(step);
    }
    Ok(steps)
}

pub async fn load_trace(path: &Path) -> Result<Vec<TraceStep>, TraceError> {
    let text = tokio::fs::read_to_string(path).await?;
    parse_trace(&text)
}

/// Plays `steps` against the page and the bridge's command handle, each at
/// its offset from the moment replay starts.
pub async fn replay(page: &SimPage, commands: &HostCommands, steps: &[TraceStep]) {
    let start = Instant::now();
    for step in steps {
        sleep_until(start + Duration::from_millis(step.at_ms)).await;
        debug!(at_ms = step.at_ms, action = ?step.action, "trace step");
        apply(page, commands, &step.action);
    }
}

fn apply(page: &SimPage, commands: &HostCommands, action: &TraceAction) {
    match action {
        TraceAction::ShowPlayerBar => page.show_player_bar(),
        TraceAction::InsertVideo { volume, duration } => {
            page.insert_video(*volume, duration.unwrap_or(f64::NAN));
        }
        TraceAction::RemoveVideo => page.remove_video(),
        TraceAction::SetTrack {
            title,
            artist,
            thumbnail_url,
            has_video,
        } => page.set_track(title, artist, thumbnail_url, *has_video),
        TraceAction::SetLike { status } => page.set_like(status),
        TraceAction::SetDuration { duration } => page.set_duration(*duration),
        TraceAction::UserPlay => page.user_play(),
        TraceAction::UserPause => page.user_pause(),
        TraceAction::End => page.end(),
        TraceAction::Seek { to } => page.seek(*to),
        TraceAction::Buffer => page.buffer(),
        TraceAction::ExternalVolume { volume } => page.external_volume(*volume),
        TraceAction::FailReads { count } => page.fail_reads(*count),
        TraceAction::SetPlayerApi { present } => page.set_player_api(*present),
        TraceAction::Command { command } => commands.send(command.clone()),
    }
}
