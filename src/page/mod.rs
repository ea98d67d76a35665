//! Abstract view of the embedded player page.
//!
//! The bridge never touches a browser directly. Everything it needs from the
//! page goes through [`Page`]: synchronous DOM reads, and the two write
//! targets a command has to hit (the raw media element and the page's
//! internal player API). Events the page dispatches arrive separately, as
//! [`PageEvent`]s on a channel, in dispatch order.

pub mod sim;

use std::fmt;
use tracing::debug;

/// Identity of one media element instance. The page may destroy and recreate
/// its video element at any time; each instance gets a fresh id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ElementId(pub u64);

impl fmt::Display for ElementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "video#{}", self.0)
    }
}

/// Errors raised while reading from or writing to the page.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum DomError {
    #[error("element not present: {0}")]
    Missing(&'static str),
    #[error("DOM read failed: {0}")]
    Read(String),
    #[error("DOM write rejected: {0}")]
    Write(String),
}

/// Live properties of the current video element.
#[derive(Debug, Clone, PartialEq)]
pub struct VideoState {
    pub paused: bool,
    pub current_time: f64,
    /// May be NaN or infinite while the page is still loading media.
    pub duration: f64,
    pub volume: f64,
}

/// Text and attributes read from the player-bar container.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlayerBarFields {
    pub title: String,
    pub artist: String,
    pub thumbnail_url: String,
    /// Raw `like-status` attribute of the like button, if present.
    pub like_status: Option<String>,
    /// Whether the song/video toggle is offered for this track.
    pub has_video: bool,
    /// Time text as rendered in the bar, e.g. `1:23 / 4:56`.
    pub time_info: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaEvent {
    Play,
    Playing,
    Pause,
    Ended,
    Waiting,
    Seeked,
    VolumeChange,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationKind {
    Attributes,
    CharacterData,
    ChildList,
}

/// Events the page dispatches, as seen by the in-page listeners.
#[derive(Debug, Clone, PartialEq)]
pub enum PageEvent {
    Media { element: ElementId, event: MediaEvent },
    VideoInserted(ElementId),
    VideoRemoved(ElementId),
    PlayerBarMutation {
        kind: MutationKind,
        attribute: Option<String>,
    },
}

/// Direct manipulation of the raw media element (or the bar's buttons, for
/// track skipping, which the element itself cannot do).
#[derive(Debug, Clone, PartialEq)]
pub enum ElementCall {
    Play,
    Pause,
    SetCurrentTime(f64),
    SetVolume(f64),
    ClickNext,
    ClickPrevious,
}

/// Calls into the page's internal player API. Volume here is 0-100.
#[derive(Debug, Clone, PartialEq)]
pub enum ApiCall {
    PlayVideo,
    PauseVideo,
    NextVideo,
    PreviousVideo,
    SeekTo(f64),
    SetVolume(u8),
}

/// The embedded page as the bridge sees it.
pub trait Page {
    /// Whether the player-bar container exists yet.
    fn has_player_bar(&self) -> bool;

    /// The current video element, if the page has created one.
    fn video_element(&self) -> Option<ElementId>;

    fn video_state(&self) -> Result<VideoState, DomError>;

    fn player_bar(&self) -> Result<PlayerBarFields, DomError>;

    fn write_element(&mut self, call: ElementCall) -> Result<(), DomError>;

    /// Fails with [`DomError::Missing`] when the page exposes no player API.
    fn write_player_api(&mut self, call: ApiCall) -> Result<(), DomError>;
}

/// Writes one logical change to both targets: the raw element first, then
/// the player API. Either may be the one actually driving playback, so both
/// are always attempted; failures are logged and otherwise ignored. Returns
/// true if at least one target accepted the write.
pub fn dual_write<P: Page + ?Sized>(page: &mut P, element: ElementCall, api: ApiCall) -> bool {
    let element_ok = page
        .write_element(element.clone())
        .map_err(|e| debug!(call = ?element, error = %e, "element write skipped"))
        .is_ok();
    let api_ok = page
        .write_player_api(api.clone())
        .map_err(|e| debug!(call = ?api, error = %e, "player api write skipped"))
        .is_ok();
    element_ok || api_ok
}

/// Scales a 0.0-1.0 fraction to the player API's 0-100 range.
pub fn api_volume(fraction: f64) -> u8 {
    (clamp_fraction(fraction) * 100.0).round() as u8
}

pub fn clamp_fraction(fraction: f64) -> f64 {
    if fraction.is_nan() {
        0.0
    } else {
        fraction.clamp(0.0, 1.0)
    }
}
