// event.rs: the bridge's event loop

use crate::bridge::debounce::Debounce;
use crate::bridge::extract::StateExtractor;
use crate::bridge::observer::{DomObserver, ListenerSet};
use crate::bridge::poll::PollScheduler;
use crate::bridge::transport::Transport;
use crate::bridge::volume::{VolumeController, VolumeEnforcer, VolumeTimer};
use crate::config::BridgeConfig;
use crate::host::commands::Command;
use crate::page::{ElementId, MediaEvent, MutationKind, Page, PageEvent, dual_write};
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, info, trace};

/// Why a snapshot is being taken. Only `Cadence` is subject to the throttle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmitReason {
    PlaybackStarted,
    PlaybackStopped,
    Cadence,
    MediaEvent,
    Mutation,
}

/// Counters exposed for diagnostics and tests.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BridgeStats {
    pub emitted: u64,
    pub extraction_faults: u64,
    pub throttled: u64,
    pub attachments: u64,
    pub volume_corrections: u64,
}

/// All in-page bridge state, owned by one task.
pub struct Bridge<P: Page> {
    page: P,
    config: BridgeConfig,
    observer: DomObserver,
    listeners: ListenerSet,
    volume: VolumeEnforcer,
    poll: PollScheduler,
    extractor: StateExtractor,
    mutations: Debounce,
    transport: Transport,
    stats: BridgeStats,
}

impl<P: Page> Bridge<P> {
    /// Must be called inside a tokio runtime: the probe timer starts here.
    pub fn new(page: P, config: BridgeConfig, volume: VolumeController, transport: Transport) -> Self {
        let enforcer = VolumeEnforcer::new(
            volume,
            config.volume_debounce,
            config.guard_release,
            config.volume_tolerance,
        );
        Self {
            page,
            observer: DomObserver::new(config.probe_interval),
            listeners: ListenerSet::new(),
            volume: enforcer,
            poll: PollScheduler::new(config.poll_interval, config.poll_throttle),
            extractor: StateExtractor::new(),
            mutations: Debounce::new(),
            transport,
            stats: BridgeStats::default(),
            config,
        }
    }

    pub fn stats(&self) -> BridgeStats {
        BridgeStats {
            attachments: self.listeners.attachments(),
            volume_corrections: self.volume.corrections(),
            ..self.stats.clone()
        }
    }

    pub fn is_polling(&self) -> bool {
        self.poll.is_active()
    }

    /// Runs until a shutdown signal arrives, or until the page's event queue
    /// and the command channel are both closed. Returns final stats.
    pub async fn listen(
        mut self,
        mut events: mpsc::UnboundedReceiver<PageEvent>,
        mut commands: mpsc::Receiver<Command>,
        mut shutdown_rx: mpsc::Receiver<()>,
    ) -> BridgeStats {
        let mut events_open = true;
        let mut commands_open = true;
        loop {
            tokio::select! {
                biased;
                Some(()) = shutdown_rx.recv() => break,
                maybe_event = events.recv(), if events_open => match maybe_event {
                    Some(event) => self.handle_page_event(event),
                    None => events_open = false,
                },
                maybe_command = commands.recv(), if commands_open => match maybe_command {
                    Some(command) => self.handle_command(command),
                    None => commands_open = false,
                },
                _ = self.observer.next_probe() => self.handle_probe(),
                _ = self.poll.tick() => self.handle_poll_tick(),
                _ = self.mutations.fired() => self.emit(EmitReason::Mutation),
                timer = self.volume.next_timer() => match timer {
                    VolumeTimer::Settle => {
                        self.volume.settle(&mut self.page);
                    }
                    VolumeTimer::ReleaseGuard => self.volume.release_guard(),
                },
            }
            if !events_open && !commands_open {
                debug!("page and host both gone");
                break;
            }
        }
        self.poll.stop();
        let stats = self.stats();
        info!(
            emitted = stats.emitted,
            faults = stats.extraction_faults,
            delivered = self.transport.delivered(),
            "bridge stopped"
        );
        stats
    }

    fn handle_probe(&mut self) {
        if !self.observer.probe(&self.page) {
            return;
        }
        if let Some(element) = self.page.video_element() {
            self.adopt_video(element);
        }
        // Publish whatever the bar shows, unless starting playback just did.
        if !self.poll.is_active() {
            self.emit(EmitReason::Mutation);
        }
    }

    pub fn handle_page_event(&mut self, event: PageEvent) {
        if !self.observer.is_watching() {
            trace!(?event, "page event before player bar, ignored");
            return;
        }
        match event {
            PageEvent::Media { element, event } => {
                if !self.listeners.accepts(element) {
                    trace!(%element, ?event, "event from unattached element");
                    return;
                }
                self.handle_media_event(event);
            }
            PageEvent::VideoInserted(element) => self.adopt_video(element),
            PageEvent::VideoRemoved(element) => {
                if self.listeners.detach(element) {
                    debug!(%element, "attached video removed");
                    // A detached element can no longer report pause or ended.
                    self.stop_polling();
                }
            }
            PageEvent::PlayerBarMutation { kind, attribute } => {
                if self.is_significant(kind, attribute.as_deref()) {
                    self.mutations.arm(self.config.mutation_debounce);
                }
            }
        }
    }

    fn handle_media_event(&mut self, event: MediaEvent) {
        match event {
            MediaEvent::Play | MediaEvent::Playing => self.start_polling(),
            MediaEvent::Pause | MediaEvent::Ended => self.stop_polling(),
            MediaEvent::Waiting | MediaEvent::Seeked => self.emit(EmitReason::MediaEvent),
            MediaEvent::VolumeChange => self.volume.on_volume_change(),
        }
    }

    fn is_significant(&self, kind: MutationKind, attribute: Option<&str>) -> bool {
        match kind {
            MutationKind::Attributes => attribute.is_some_and(|a| self.config.watches_attribute(a)),
            MutationKind::CharacterData | MutationKind::ChildList => true,
        }
    }

    fn adopt_video(&mut self, element: ElementId) {
        if !self.listeners.attach(element) {
            return;
        }
        info!(%element, "listeners attached");
        self.volume.apply_initial(&mut self.page);
        // The page may have started playback before we were listening.
        if self.page.video_state().is_ok_and(|v| !v.paused) {
            self.start_polling();
        }
    }

    fn start_polling(&mut self) {
        if self.poll.start() {
            debug!("polling started");
            self.emit(EmitReason::PlaybackStarted);
        }
    }

    fn stop_polling(&mut self) {
        // The interval is gone before the final snapshot is read.
        if self.poll.stop() {
            debug!("polling stopped");
            self.emit(EmitReason::PlaybackStopped);
        }
    }

    fn handle_poll_tick(&mut self) {
        if !self.poll.cadence_allowed(Instant::now()) {
            self.stats.throttled += 1;
            trace!("cadence tick throttled");
            return;
        }
        self.emit(EmitReason::Cadence);
    }

    pub fn handle_command(&mut self, command: Command) {
        debug!(?command, "host command");
        match command {
            Command::SetVolume { to } => self.volume.apply_host(&mut self.page, to),
            other => {
                let (element, api) = other.targets();
                dual_write(&mut self.page, element, api);
            }
        }
    }

    fn emit(&mut self, reason: EmitReason) {
        match self.extractor.extract(&self.page) {
            Ok(snapshot) => {
                if snapshot.track_changed {
                    info!(title = %snapshot.title, artist = %snapshot.artist, "track changed");
                }
                trace!(?reason, "emitting snapshot");
                self.transport.deliver(&snapshot);
                self.poll.record_emit(Instant::now());
                self.stats.emitted += 1;
            }
            Err(e) => {
                self.stats.extraction_faults += 1;
                debug!(?reason, error = %e, "extraction failed, skipping update");
            }
        }
    }
}
