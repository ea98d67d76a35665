//! Reads the page into a normalized [`PlaybackSnapshot`].

use crate::page::{DomError, Page, VideoState};
use crate::state::{LikeStatus, PlaybackSnapshot};
use once_cell::sync::Lazy;
use regex::Regex;

// `1:23 / 4:56` or `1:02:03 / 1:10:00`
static TIME_INFO_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*(\d+(?::\d{1,2}){1,2})\s*/\s*(\d+(?::\d{1,2}){1,2})\s*$")
        .expect("time info pattern is valid")
});

/// Parses `m:ss` or `h:mm:ss` into whole seconds.
pub fn parse_clock(text: &str) -> Option<u64> {
    let mut total: u64 = 0;
    let mut parts = 0;
    for part in text.trim().split(':') {
        let n: u64 = part.parse().ok()?;
        total = total.checked_mul(60)?.checked_add(n)?;
        parts += 1;
    }
    (2..=3).contains(&parts).then_some(total)
}

/// Parses the player bar's `progress / duration` text.
pub fn parse_time_info(text: &str) -> Option<(u64, u64)> {
    let caps = TIME_INFO_RE.captures(text)?;
    Some((parse_clock(&caps[1])?, parse_clock(&caps[2])?))
}

fn whole_seconds(value: f64) -> Option<u64> {
    (value.is_finite() && value >= 0.0).then(|| value.floor() as u64)
}

/// Builds snapshots and remembers the last non-empty track identity so that
/// `track_changed` fires once per real transition.
#[derive(Debug, Default)]
pub struct StateExtractor {
    last_track: Option<(String, String)>,
}

impl StateExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads the page. A missing video element is tolerated (the bar alone
    /// still describes the track); any other failure aborts the read and
    /// leaves the remembered identity untouched.
    pub fn extract<P: Page + ?Sized>(&mut self, page: &P) -> Result<PlaybackSnapshot, DomError> {
        let bar = page.player_bar()?;
        let video: Option<VideoState> = match page.video_state() {
            Ok(v) => Some(v),
            Err(DomError::Missing(_)) => None,
            Err(e) => return Err(e),
        };

        let time_info = parse_time_info(&bar.time_info);
        let progress_seconds = video
            .as_ref()
            .and_then(|v| whole_seconds(v.current_time))
            .or(time_info.map(|(p, _)| p))
            .unwrap_or(0);
        let duration_seconds = video
            .as_ref()
            .filter(|v| v.duration > 0.0)
            .and_then(|v| whole_seconds(v.duration))
            .or(time_info.map(|(_, d)| d))
            .unwrap_or(0);

        let title = bar.title.trim().to_string();
        let artist = bar.artist.trim().to_string();
        let track_changed = self.observe_track(&title, &artist);

        Ok(PlaybackSnapshot {
            is_playing: video.as_ref().is_some_and(|v| !v.paused),
            progress_seconds,
            duration_seconds,
            title,
            artist,
            thumbnail_url: bar.thumbnail_url.trim().to_string(),
            track_changed,
            like_status: LikeStatus::from_attribute(bar.like_status.as_deref()),
            has_video: bar.has_video,
        })
    }

    fn observe_track(&mut self, title: &str, artist: &str) -> bool {
        if title.is_empty() {
            return false;
        }
        let changed = self
            .last_track
            .as_ref()
            .is_none_or(|(t, a)| t != title || a != artist);
        if changed {
            self.last_track = Some((title.to_string(), artist.to_string()));
        }
        changed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::page::sim::SimPage;

    #[test]
    fn parses_clock_forms() {
        assert_eq!(parse_clock("0:00"), Some(0));
        assert_eq!(parse_clock("4:56"), Some(296));
        assert_eq!(parse_clock("1:02:03"), Some(3723));
        assert_eq!(parse_clock("42"), None);
        assert_eq!(parse_clock("a:bc"), None);
    }

    #[test]
    fn parses_time_info() {
        assert_eq!(parse_time_info("1:23 / 4:56"), Some((83, 296)));
        assert_eq!(parse_time_info(" 0:05/1:00:00 "), Some((5, 3600)));
        assert_eq!(parse_time_info(""), None);
        assert_eq!(parse_time_info("Live"), None);
    }

    #[tokio::test]
    async fn track_changed_fires_once_per_transition() {
        let (page, _rx) = SimPage::new();
        page.show_player_bar();
        page.insert_video(1.0, 200.0);
        let mut extractor = StateExtractor::new();

        page.set_track("First", "Band", "", false);
        assert!(extractor.extract(&page).unwrap().track_changed);
        assert!(!extractor.extract(&page).unwrap().track_changed);

        page.set_track("Second", "Band", "", false);
        assert!(extractor.extract(&page).unwrap().track_changed);
        assert!(!extractor.extract(&page).unwrap().track_changed);
    }

    #[tokio::test]
    async fn empty_title_never_signals_change() {
        let (page, _rx) = SimPage::new();
        page.show_player_bar();
        let mut extractor = StateExtractor::new();

        page.set_track("Song", "Band", "", false);
        assert!(extractor.extract(&page).unwrap().track_changed);

        page.set_track("", "", "", false);
        assert!(!extractor.extract(&page).unwrap().track_changed);

        // Same track reappearing after a transient empty bar is not a change.
        page.set_track("Song", "Band", "", false);
        assert!(!extractor.extract(&page).unwrap().track_changed);
    }

    #[tokio::test]
    async fn artist_change_alone_is_a_new_track() {
        let (page, _rx) = SimPage::new();
        page.show_player_bar();
        let mut extractor = StateExtractor::new();
        page.set_track("Intro", "A", "", false);
        extractor.extract(&page).unwrap();
        page.set_track("Intro", "B", "", false);
        assert!(extractor.extract(&page).unwrap().track_changed);
    }

    #[tokio::test]
    async fn failed_read_keeps_identity() {
        let (page, _rx) = SimPage::new();
        page.show_player_bar();
        let mut extractor = StateExtractor::new();
        page.set_track("One", "Band", "", false);
        page.fail_reads(1);
        assert!(extractor.extract(&page).is_err());
        assert!(extractor.extract(&page).unwrap().track_changed);
    }

    #[tokio::test]
    async fn duration_falls_back_to_time_text() {
        let (page, _rx) = SimPage::new();
        page.show_player_bar();
        page.insert_video(1.0, f64::NAN);
        page.set_track("Song", "Band", "https://img/1.jpg", true);
        page.set_like("LIKE");
        let snap = StateExtractor::new().extract(&page).unwrap();
        // No finite duration and no time text: both fall to zero.
        assert_eq!(snap.duration_seconds, 0);
        assert_eq!(snap.like_status, LikeStatus::Like);
        assert!(snap.has_video);
        assert_eq!(snap.thumbnail_url, "https://img/1.jpg");
        assert!(!snap.is_playing);

        page.set_duration(125.0);
        let snap = StateExtractor::new().extract(&page).unwrap();
        assert_eq!(snap.duration_seconds, 125);
    }

    struct LiveBar;

    impl Page for LiveBar {
        fn has_player_bar(&self) -> bool {
            true
        }
        fn video_element(&self) -> Option<crate::page::ElementId> {
            None
        }
        fn video_state(&self) -> Result<VideoState, DomError> {
            Ok(VideoState { paused: false, current_time: f64::NAN, duration: f64::INFINITY, volume: 1.0 })
        }
        fn player_bar(&self) -> Result<crate::page::PlayerBarFields, DomError> {
            Ok(crate::page::PlayerBarFields {
                title: "  Stream ".into(),
                artist: "Host".into(),
                time_info: "2:05 / 1:00:00".into(),
                ..Default::default()
            })
        }
        fn write_element(&mut self, _: crate::page::ElementCall) -> Result<(), DomError> {
            Ok(())
        }
        fn write_player_api(&mut self, _: crate::page::ApiCall) -> Result<(), DomError> {
            Ok(())
        }
    }

    #[test]
    fn non_finite_media_times_use_time_text() {
        let snap = StateExtractor::new().extract(&LiveBar).unwrap();
        assert_eq!(snap.progress_seconds, 125);
        assert_eq!(snap.duration_seconds, 3600);
        assert_eq!(snap.title, "Stream");
        assert!(snap.is_playing);
    }

    #[tokio::test]
    async fn missing_video_is_tolerated() {
        let (page, _rx) = SimPage::new();
        page.show_player_bar();
        page.set_track("Song", "Band", "", false);
        let snap = StateExtractor::new().extract(&page).unwrap();
        assert!(!snap.is_playing);
        assert_eq!(snap.progress_seconds, 0);
    }
}
