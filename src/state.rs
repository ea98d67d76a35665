// state.rs: Playback state data structures shared by both sides of the bridge

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LikeStatus {
    Like,
    Dislike,
    #[default]
    Indifferent,
}

impl LikeStatus {
    /// Maps the like button's `like-status` attribute. Anything unexpected,
    /// including a missing attribute, reads as indifferent.
    pub fn from_attribute(attr: Option<&str>) -> Self {
        match attr.map(|s| s.trim().to_ascii_uppercase()).as_deref() {
            Some("LIKE") => LikeStatus::Like,
            Some("DISLIKE") => LikeStatus::Dislike,
            _ => LikeStatus::Indifferent,
        }
    }
}

/// One normalized read of playback state, the unit pushed to the host.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaybackSnapshot {
    pub is_playing: bool,
    pub progress_seconds: u64,
    pub duration_seconds: u64,
    pub title: String,
    pub artist: String,
    pub thumbnail_url: String,
    pub track_changed: bool,
    pub like_status: LikeStatus,
    pub has_video: bool,
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn like_status_from_attribute() {
        assert_eq!(LikeStatus::from_attribute(Some("LIKE")), LikeStatus::Like);
        assert_eq!(LikeStatus::from_attribute(Some(" dislike ")), LikeStatus::Dislike);
        assert_eq!(LikeStatus::from_attribute(Some("INDIFFERENT")), LikeStatus::Indifferent);
        assert_eq!(LikeStatus::from_attribute(Some("bogus")), LikeStatus::Indifferent);
        assert_eq!(LikeStatus::from_attribute(None), LikeStatus::Indifferent);
    }

    #[test]
    fn snapshot_uses_camel_case_fields() {
        let snap = PlaybackSnapshot {
            is_playing: true,
            progress_seconds: 12,
            duration_seconds: 240,
            title: "Song".into(),
            artist: "Band".into(),
            like_status: LikeStatus::Like,
            ..Default::default()
        };
        let value = serde_json::to_value(&snap).unwrap();
        assert_eq!(value["isPlaying"], true);
        assert_eq!(value["progressSeconds"], 12);
        assert_eq!(value["thumbnailUrl"], "");
        assert_eq!(value["likeStatus"], "LIKE");
        assert_eq!(value["trackChanged"], false);
    }
}
