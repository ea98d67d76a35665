// state.rs: the host's view of what is playing, fed by bridge messages

use crate::bridge::BridgeMessage;
use crate::state::PlaybackSnapshot;
use tracing::{debug, trace};

#[derive(thiserror::Error, Debug)]
pub enum HostError {
    #[error("malformed bridge message: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Latest known playback state on the host side.
#[derive(Debug, Default, Clone)]
pub struct NowPlaying {
    pub snapshot: Option<PlaybackSnapshot>,
    /// Tracks seen so far, counted from `trackChanged` flags.
    pub track_changes: u64,
    /// Bumped on every update that actually changed something.
    pub version: u64,
    /// Updates received, changed or not.
    pub updates: u64,
}

impl NowPlaying {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decodes and applies one serialized message. Returns whether the state
    /// changed.
    pub fn apply_message(&mut self, payload: &str) -> Result<bool, HostError> {
        let BridgeMessage::StateUpdate(snapshot) = BridgeMessage::decode(payload)?;
        Ok(self.apply(snapshot))
    }

    pub fn apply(&mut self, snapshot: PlaybackSnapshot) -> bool {
        self.updates += 1;
        if snapshot.track_changed {
            self.track_changes += 1;
            debug!(title = %snapshot.title, artist = %snapshot.artist, "now playing");
        }
        let changed = self
            .snapshot
            .as_ref()
            .is_none_or(|prev| !same_state(prev, &snapshot));
        if changed {
            self.version += 1;
        } else {
            trace!("update carried no change");
        }
        self.snapshot = Some(snapshot);
        changed
    }

    pub fn is_playing(&self) -> bool {
        self.snapshot.as_ref().is_some_and(|s| s.is_playing)
    }
}

// The track-changed flag describes the transition, not the state.
fn same_state(a: &PlaybackSnapshot, b: &PlaybackSnapshot) -> bool {
    PlaybackSnapshot { track_changed: false, ..a.clone() }
        == PlaybackSnapshot { track_changed: false, ..b.clone() }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snap(title: &str, progress: u64, changed: bool) -> PlaybackSnapshot {
        PlaybackSnapshot {
            is_playing: true,
            progress_seconds: progress,
            duration_seconds: 200,
            title: title.into(),
            artist: "Band".into(),
            track_changed: changed,
            ..Default::default()
        }
    }

    #[test]
    fn versions_only_move_on_change() {
        let mut now = NowPlaying::new();
        assert!(now.apply(snap("A", 0, true)));
        assert!(!now.apply(snap("A", 0, false)));
        assert!(now.apply(snap("A", 1, false)));
        assert_eq!(now.version, 2);
        assert_eq!(now.updates, 3);
        assert_eq!(now.track_changes, 1);
        assert!(now.is_playing());
    }

    #[test]
    fn decodes_wire_messages() {
        let mut now = NowPlaying::new();
        let payload = r#"{"type":"STATE_UPDATE","isPlaying":false,"progressSeconds":5,
            "durationSeconds":100,"title":"A","artist":"B","thumbnailUrl":"",
            "trackChanged":true,"likeStatus":"DISLIKE","hasVideo":true}"#;
        assert!(now.apply_message(payload).unwrap());
        let s = now.snapshot.as_ref().unwrap();
        assert_eq!(s.progress_seconds, 5);
        assert!(s.has_video);
        assert_eq!(now.track_changes, 1);
    }

    #[test]
    fn rejects_unknown_messages() {
        let mut now = NowPlaying::new();
        assert!(matches!(
            now.apply_message(r#"{"type":"PING"}"#),
            Err(HostError::Decode(_))
        ));
        assert!(now.apply_message("not json").is_err());
        assert_eq!(now.updates, 0);
    }
}
