//! Host → page command surface.

use crate::bridge::volume::VolumeController;
use crate::page::{ApiCall, ElementCall, api_volume, clamp_fraction};
use crate::timer::sanitize_position;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::warn;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Command {
    Play,
    Pause,
    Next,
    Previous,
    Seek { to: f64 },
    SetVolume { to: f64 },
}

impl Command {
    /// The two writes this command turns into: one on the raw element, one
    /// on the page's internal player API.
    pub fn targets(&self) -> (ElementCall, ApiCall) {
        match *self {
            Command::Play => (ElementCall::Play, ApiCall::PlayVideo),
            Command::Pause => (ElementCall::Pause, ApiCall::PauseVideo),
            Command::Next => (ElementCall::ClickNext, ApiCall::NextVideo),
            Command::Previous => (ElementCall::ClickPrevious, ApiCall::PreviousVideo),
            Command::Seek { to } => {
                let to = sanitize_position(to);
                (ElementCall::SetCurrentTime(to), ApiCall::SeekTo(to))
            }
            Command::SetVolume { to } => {
                let to = clamp_fraction(to);
                (ElementCall::SetVolume(to), ApiCall::SetVolume(api_volume(to)))
            }
        }
    }
}

/// Cloneable handle the host uses to drive the page. Every call is
/// best-effort: there is no acknowledgment and a busy or closed bridge
/// simply loses the command.
#[derive(Debug, Clone)]
pub struct HostCommands {
    tx: mpsc::Sender<Command>,
    volume: VolumeController,
}

impl HostCommands {
    pub fn new(tx: mpsc::Sender<Command>, volume: VolumeController) -> Self {
        Self { tx, volume }
    }

    pub fn play(&self) {
        self.send(Command::Play);
    }

    pub fn pause(&self) {
        self.send(Command::Pause);
    }

    pub fn next(&self) {
        self.send(Command::Next);
    }

    pub fn previous(&self) {
        self.send(Command::Previous);
    }

    pub fn seek(&self, to: f64) {
        self.send(Command::Seek { to });
    }

    pub fn set_volume(&self, to: f64) {
        self.send(Command::SetVolume { to });
    }

    /// Volume commands record the new target before reaching the page, so
    /// the enforcer already corrects toward it.
    pub fn send(&self, command: Command) {
        if let Command::SetVolume { to } = command {
            self.volume.set_target(to);
        }
        if let Err(e) = self.tx.try_send(command) {
            warn!(error = %e, "command not delivered to page");
        }
    }

    pub fn volume(&self) -> &VolumeController {
        &self.volume
    }
}
