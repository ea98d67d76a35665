//! Page → host message delivery.

use crate::state::PlaybackSnapshot;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, trace, warn};

/// Messages crossing the boundary, tagged by `type`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BridgeMessage {
    StateUpdate(PlaybackSnapshot),
}

impl BridgeMessage {
    pub fn encode(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn decode(payload: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(payload)
    }
}

/// Fire-and-forget delivery: each snapshot becomes one serialized message
/// offered to the host without waiting. A host that is not draining loses
/// messages rather than stalling the page.
#[derive(Debug)]
pub struct Transport {
    tx: mpsc::Sender<String>,
    delivered: u64,
    dropped: u64,
}

impl Transport {
    pub fn new(tx: mpsc::Sender<String>) -> Self {
        Self {
            tx,
            delivered: 0,
            dropped: 0,
        }
    }

    pub fn delivered(&self) -> u64 {
        self.delivered
    }

    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    pub fn deliver(&mut self, snapshot: &PlaybackSnapshot) -> bool {
        let payload = match BridgeMessage::StateUpdate(snapshot.clone()).encode() {
            Ok(p) => p,
            Err(e) => {
                warn!(error = %e, "failed to encode snapshot");
                self.dropped += 1;
                return false;
            }
        };
        match self.tx.try_send(payload) {
            Ok(()) => {
                trace!(
                    playing = snapshot.is_playing,
                    progress = snapshot.progress_seconds,
                    "state update delivered"
                );
                self.delivered += 1;
                true
            }
            Err(TrySendError::Full(_)) => {
                warn!("host is not draining updates, dropping one");
                self.dropped += 1;
                false
            }
            Err(TrySendError::Closed(_)) => {
                debug!("host side closed, update discarded");
                self.dropped += 1;
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::LikeStatus;

    fn snapshot() -> PlaybackSnapshot {
        PlaybackSnapshot {
            is_playing: true,
            progress_seconds: 61,
            duration_seconds: 200,
            title: "Song".into(),
            artist: "Band".into(),
            thumbnail_url: "https://img/s.jpg".into(),
            track_changed: true,
            like_status: LikeStatus::Dislike,
            has_video: true,
        }
    }

    #[test]
    fn message_is_tagged_state_update_with_flat_fields() {
        let payload = BridgeMessage::StateUpdate(snapshot()).encode().unwrap();
        let value: serde_json::Value = serde_json::from_str(&payload).unwrap();
        assert_eq!(value["type"], "STATE_UPDATE");
        assert_eq!(value["title"], "Song");
        assert_eq!(value["likeStatus"], "DISLIKE");
        assert_eq!(value["hasVideo"], true);
        assert_eq!(value["durationSeconds"], 200);
    }

    #[test]
    fn unknown_message_type_is_rejected() {
        assert!(BridgeMessage::decode(r#"{"type":"HELLO"}"#).is_err());
    }

    #[tokio::test]
    async fn full_channel_drops_instead_of_waiting() {
        let (tx, mut rx) = mpsc::channel(1);
        let mut transport = Transport::new(tx);
        assert!(transport.deliver(&snapshot()));
        assert!(!transport.deliver(&snapshot()));
        assert_eq!((transport.delivered(), transport.dropped()), (1, 1));

        let got = BridgeMessage::decode(&rx.recv().await.unwrap()).unwrap();
        assert_eq!(got, BridgeMessage::StateUpdate(snapshot()));
    }

    #[tokio::test]
    async fn closed_host_is_not_an_error() {
        let (tx, rx) = mpsc::channel(4);
        drop(rx);
        let mut transport = Transport::new(tx);
        assert!(!transport.deliver(&snapshot()));
    }
}
