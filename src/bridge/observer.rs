//! Player-bar discovery and video listener bookkeeping.

use crate::page::{ElementId, Page};
use std::collections::HashSet;
use std::time::Duration;
use tokio::time::{Instant, Interval, MissedTickBehavior, interval};
use tracing::{debug, info};

/// Probes for the player-bar container until it exists. There is no retry
/// bound: the page may take arbitrarily long to finish loading.
#[derive(Debug)]
pub struct DomObserver {
    probe: Option<Interval>,
    probes: u64,
}

impl DomObserver {
    /// The first probe is due immediately.
    pub fn new(probe_interval: Duration) -> Self {
        let mut probe = interval(probe_interval);
        probe.set_missed_tick_behavior(MissedTickBehavior::Delay);
        Self {
            probe: Some(probe),
            probes: 0,
        }
    }

    pub fn is_watching(&self) -> bool {
        self.probe.is_none()
    }

    pub fn probes(&self) -> u64 {
        self.probes
    }

    /// Next probe deadline; pends forever once the bar has been found.
    pub async fn next_probe(&mut self) {
        match self.probe.as_mut() {
            Some(probe) => {
                probe.tick().await;
            }
            None => futures_util::future::pending::<()>().await,
        }
    }

    /// Returns true exactly once, on the probe that finds the bar.
    pub fn probe<P: Page + ?Sized>(&mut self, page: &P) -> bool {
        if self.is_watching() {
            return false;
        }
        self.probes += 1;
        if page.has_player_bar() {
            self.probe = None;
            info!(probes = self.probes, "player bar found, watching page");
            true
        } else {
            debug!(probes = self.probes, "player bar not present yet");
            false
        }
    }
}

/// The element currently carrying the bridge's listeners.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ListenerAttachment {
    pub element: ElementId,
    pub attached_at: Instant,
}

/// Tracks which elements have listeners. `marked` plays the role of the
/// one-shot marker the page script stamps on an element once bound.
#[derive(Debug, Default)]
pub struct ListenerSet {
    current: Option<ListenerAttachment>,
    marked: HashSet<ElementId>,
    attachments: u64,
}

impl ListenerSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds listeners to `element`, superseding the current attachment.
    /// Returns false when the element was already marked: its listeners are
    /// still live, so it only becomes current again.
    pub fn attach(&mut self, element: ElementId) -> bool {
        let now = Instant::now();
        if !self.marked.insert(element) {
            if self.current.map(|a| a.element) != Some(element) {
                self.current = Some(ListenerAttachment { element, attached_at: now });
            }
            return false;
        }
        if let Some(prev) = self.current {
            debug!(
                previous = %prev.element,
                current = %element,
                held_ms = now.duration_since(prev.attached_at).as_millis() as u64,
                "superseding listener attachment"
            );
        }
        self.current = Some(ListenerAttachment { element, attached_at: now });
        self.attachments += 1;
        true
    }

    /// Clears the attachment if `element` is the current one.
    pub fn detach(&mut self, element: ElementId) -> bool {
        if self.current.is_some_and(|a| a.element == element) {
            self.current = None;
            return true;
        }
        false
    }

    pub fn accepts(&self, element: ElementId) -> bool {
        self.current.is_some_and(|a| a.element == element)
    }

    pub fn current(&self) -> Option<ListenerAttachment> {
        self.current
    }

    /// Number of distinct elements ever bound.
    pub fn attachments(&self) -> u64 {
        self.attachments
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::page::sim::SimPage;

    #[tokio::test(start_paused = true)]
    async fn probes_until_bar_appears() {
        let (page, _rx) = SimPage::new();
        let mut observer = DomObserver::new(Duration::from_millis(500));
        let start = Instant::now();

        for _ in 0..4 {
            observer.next_probe().await;
            assert!(!observer.probe(&page));
        }
        page.show_player_bar();
        observer.next_probe().await;
        assert!(observer.probe(&page));
        assert!(observer.is_watching());
        assert_eq!(observer.probes(), 5);
        assert_eq!(start.elapsed(), Duration::from_millis(2000));

        // Already watching: further probes are no-ops.
        assert!(!observer.probe(&page));
        assert_eq!(observer.probes(), 5);
    }

    #[tokio::test]
    async fn attach_is_one_shot_per_element() {
        let mut set = ListenerSet::new();
        let a = ElementId(1);
        let b = ElementId(2);

        assert!(set.attach(a));
        assert!(!set.attach(a));
        assert!(set.accepts(a));

        assert!(set.attach(b));
        assert!(!set.accepts(a));
        assert!(set.accepts(b));
        assert_eq!(set.attachments(), 2);
    }

    #[tokio::test]
    async fn reinserted_element_becomes_current_without_rebinding() {
        let mut set = ListenerSet::new();
        set.attach(ElementId(1));
        set.attach(ElementId(2));
        assert!(!set.attach(ElementId(1)));
        assert!(set.accepts(ElementId(1)));
        assert_eq!(set.attachments(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn attachment_records_when_it_was_bound() {
        let mut set = ListenerSet::new();
        let start = Instant::now();
        set.attach(ElementId(1));
        tokio::time::advance(Duration::from_millis(250)).await;
        set.attach(ElementId(2));
        let current = set.current().unwrap();
        assert_eq!(current.element, ElementId(2));
        assert_eq!(current.attached_at - start, Duration::from_millis(250));
    }

    #[tokio::test]
    async fn detach_only_clears_current() {
        let mut set = ListenerSet::new();
        set.attach(ElementId(1));
        set.attach(ElementId(2));
        assert!(!set.detach(ElementId(1)));
        assert!(set.detach(ElementId(2)));
        assert!(set.current().is_none());
    }
}
