//! In-memory player page.
//!
//! `SimPage` behaves like the embedded web player as far as the bridge can
//! tell: it owns a player bar, a replaceable video element and an optional
//! internal player API, and it dispatches the events a browser would,
//! including the echoes of the bridge's own writes. Clones share the same
//! page, so a driver can mutate it while the bridge reads it.

use crate::page::{
    ApiCall, DomError, ElementCall, ElementId, MediaEvent, MutationKind, Page, PageEvent,
    PlayerBarFields, VideoState, api_volume, clamp_fraction,
};
use crate::timer::{PlaybackClock, format_clock};
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::mpsc;

#[derive(Debug)]
struct SimVideo {
    id: ElementId,
    clock: PlaybackClock,
    duration: f64,
    volume: f64,
}

impl SimVideo {
    fn position(&self) -> f64 {
        let pos = self.clock.estimate();
        if self.duration.is_finite() && self.duration > 0.0 {
            pos.min(self.duration)
        } else {
            pos
        }
    }
}

#[derive(Debug)]
struct SimDom {
    player_bar: bool,
    video: Option<SimVideo>,
    next_id: u64,
    title: String,
    artist: String,
    thumbnail_url: String,
    like_status: Option<String>,
    has_video: bool,
    api_present: bool,
    api_volume: Option<u8>,
    failing_reads: u32,
    element_log: Vec<ElementCall>,
    api_log: Vec<ApiCall>,
}

impl Default for SimDom {
    fn default() -> Self {
        Self {
            player_bar: false,
            video: None,
            next_id: 1,
            title: String::new(),
            artist: String::new(),
            thumbnail_url: String::new(),
            like_status: None,
            has_video: false,
            api_present: true,
            api_volume: None,
            failing_reads: 0,
            element_log: Vec::new(),
            api_log: Vec::new(),
        }
    }
}

impl SimDom {
    fn take_fault(&mut self) -> Result<(), DomError> {
        if self.failing_reads > 0 {
            self.failing_reads -= 1;
            return Err(DomError::Read("simulated DOM exception".to_string()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct SimPage {
    dom: Arc<Mutex<SimDom>>,
    events: mpsc::UnboundedSender<PageEvent>,
}

impl SimPage {
    /// Creates an empty page (no player bar, no video) and the receiving end
    /// of its event dispatch queue.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<PageEvent>) {
        let (events, rx) = mpsc::unbounded_channel();
        let page = Self {
            dom: Arc::new(Mutex::new(SimDom::default())),
            events,
        };
        (page, rx)
    }

    fn dispatch(&self, event: PageEvent) {
        // The receiver going away just means nobody is listening any more.
        let _ = self.events.send(event);
    }

    fn media(&self, element: ElementId, event: MediaEvent) {
        self.dispatch(PageEvent::Media { element, event });
    }

    fn mutation(&self, kind: MutationKind, attribute: Option<&str>) {
        self.dispatch(PageEvent::PlayerBarMutation {
            kind,
            attribute: attribute.map(str::to_string),
        });
    }

    /// Dispatches an arbitrary event, as a misbehaving page might.
    pub fn inject(&self, event: PageEvent) {
        self.dispatch(event);
    }

    pub fn show_player_bar(&self) {
        let mut dom = self.dom.lock();
        if dom.player_bar {
            return;
        }
        dom.player_bar = true;
        drop(dom);
        self.mutation(MutationKind::ChildList, None);
    }

    /// Creates a new video element, replacing any existing one.
    pub fn insert_video(&self, volume: f64, duration: f64) -> ElementId {
        let mut dom = self.dom.lock();
        let id = ElementId(dom.next_id);
        dom.next_id += 1;
        let old = dom.video.replace(SimVideo {
            id,
            clock: PlaybackClock::default(),
            duration,
            volume: clamp_fraction(volume),
        });
        drop(dom);
        if let Some(old) = old {
            self.dispatch(PageEvent::VideoRemoved(old.id));
        }
        self.dispatch(PageEvent::VideoInserted(id));
        id
    }

    pub fn remove_video(&self) {
        let old = self.dom.lock().video.take();
        if let Some(old) = old {
            self.dispatch(PageEvent::VideoRemoved(old.id));
        }
    }

    /// Loads a new track into the bar and rewinds the current element.
    pub fn set_track(&self, title: &str, artist: &str, thumbnail_url: &str, has_video: bool) {
        let mut dom = self.dom.lock();
        dom.title = title.to_string();
        dom.artist = artist.to_string();
        dom.thumbnail_url = thumbnail_url.to_string();
        dom.has_video = has_video;
        if let Some(video) = dom.video.as_mut() {
            video.clock.set_position(0.0);
        }
        drop(dom);
        self.mutation(MutationKind::Attributes, Some("title"));
        self.mutation(MutationKind::CharacterData, None);
    }

    pub fn set_like(&self, status: &str) {
        self.dom.lock().like_status = Some(status.to_string());
        self.mutation(MutationKind::Attributes, Some("like-status"));
    }

    pub fn set_duration(&self, duration: f64) {
        if let Some(video) = self.dom.lock().video.as_mut() {
            video.duration = duration;
        }
    }

    /// Playback started by the page itself (user click, autoplay).
    pub fn user_play(&self) {
        self.start_playback();
    }

    pub fn user_pause(&self) {
        self.stop_playback(false);
    }

    /// Playback reached the end of the media.
    pub fn end(&self) {
        self.stop_playback(true);
    }

    pub fn seek(&self, to: f64) {
        let id = {
            let mut dom = self.dom.lock();
            let Some(video) = dom.video.as_mut() else { return };
            video.clock.set_position(to);
            video.id
        };
        self.media(id, MediaEvent::Seeked);
    }

    pub fn buffer(&self) {
        if let Some(id) = self.current_video() {
            self.media(id, MediaEvent::Waiting);
        }
    }

    /// A volume write by the page's own logic (the drift the bridge corrects).
    pub fn external_volume(&self, volume: f64) {
        self.change_volume(volume);
    }

    /// Makes the next `count` DOM reads throw.
    pub fn fail_reads(&self, count: u32) {
        self.dom.lock().failing_reads = count;
    }

    pub fn set_player_api(&self, present: bool) {
        self.dom.lock().api_present = present;
    }

    pub fn current_video(&self) -> Option<ElementId> {
        self.dom.lock().video.as_ref().map(|v| v.id)
    }

    pub fn element_volume(&self) -> Option<f64> {
        self.dom.lock().video.as_ref().map(|v| v.volume)
    }

    pub fn player_api_volume(&self) -> Option<u8> {
        self.dom.lock().api_volume
    }

    pub fn element_calls(&self) -> Vec<ElementCall> {
        self.dom.lock().element_log.clone()
    }

    pub fn api_calls(&self) -> Vec<ApiCall> {
        self.dom.lock().api_log.clone()
    }

    fn start_playback(&self) {
        let id = {
            let mut dom = self.dom.lock();
            let Some(video) = dom.video.as_mut() else { return };
            if video.clock.is_running() {
                return;
            }
            video.clock.mark_playing();
            video.id
        };
        self.media(id, MediaEvent::Play);
        self.media(id, MediaEvent::Playing);
    }

    fn stop_playback(&self, ended: bool) {
        let id = {
            let mut dom = self.dom.lock();
            let Some(video) = dom.video.as_mut() else { return };
            let was_running = video.clock.is_running();
            video.clock.mark_paused();
            if ended && video.duration.is_finite() {
                video.clock.reset(video.duration);
            }
            if !was_running && !ended {
                return;
            }
            video.id
        };
        self.media(id, MediaEvent::Pause);
        if ended {
            self.media(id, MediaEvent::Ended);
        }
    }

    fn change_volume(&self, volume: f64) {
        let volume = clamp_fraction(volume);
        let id = {
            let mut dom = self.dom.lock();
            let Some(video) = dom.video.as_mut() else { return };
            // Browsers only fire `volumechange` when the value actually moves.
            if video.volume == volume {
                return;
            }
            video.volume = volume;
            video.id
        };
        self.media(id, MediaEvent::VolumeChange);
    }
}

impl Page for SimPage {
    fn has_player_bar(&self) -> bool {
        self.dom.lock().player_bar
    }

    fn video_element(&self) -> Option<ElementId> {
        self.current_video()
    }

    fn video_state(&self) -> Result<VideoState, DomError> {
        let mut dom = self.dom.lock();
        dom.take_fault()?;
        let video = dom.video.as_ref().ok_or(DomError::Missing("video"))?;
        Ok(VideoState {
            paused: !video.clock.is_running(),
            current_time: video.position(),
            duration: video.duration,
            volume: video.volume,
        })
    }

    fn player_bar(&self) -> Result<PlayerBarFields, DomError> {
        let mut dom = self.dom.lock();
        dom.take_fault()?;
        if !dom.player_bar {
            return Err(DomError::Missing("player bar"));
        }
        let time_info = dom
            .video
            .as_ref()
            .filter(|v| v.duration.is_finite())
            .map(|v| format!("{} / {}", format_clock(v.position()), format_clock(v.duration)))
            .unwrap_or_default();
        Ok(PlayerBarFields {
            title: dom.title.clone(),
            artist: dom.artist.clone(),
            thumbnail_url: dom.thumbnail_url.clone(),
            like_status: dom.like_status.clone(),
            has_video: dom.has_video,
            time_info,
        })
    }

    fn write_element(&mut self, call: ElementCall) -> Result<(), DomError> {
        {
            let mut dom = self.dom.lock();
            if dom.video.is_none() && !matches!(call, ElementCall::ClickNext | ElementCall::ClickPrevious) {
                return Err(DomError::Missing("video"));
            }
            dom.element_log.push(call.clone());
        }
        match call {
            ElementCall::Play => self.start_playback(),
            ElementCall::Pause => self.stop_playback(false),
            ElementCall::SetCurrentTime(to) => self.seek(to),
            ElementCall::SetVolume(volume) => self.change_volume(volume),
            ElementCall::ClickNext | ElementCall::ClickPrevious => {}
        }
        Ok(())
    }

    fn write_player_api(&mut self, call: ApiCall) -> Result<(), DomError> {
        let mut dom = self.dom.lock();
        if !dom.api_present {
            return Err(DomError::Missing("player api"));
        }
        if let ApiCall::SetVolume(v) = call {
            dom.api_volume = Some(v.min(api_volume(1.0)));
        }
        dom.api_log.push(call);
        Ok(())
    }
}
