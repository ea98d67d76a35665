//! Desired-volume enforcement against the page's own volume logic.
//!
//! The page keeps resetting its video element's volume (on track change, on
//! element recreation, from its own saved preference). The host owns the
//! volume it actually wants, held in a [`VolumeController`]; the
//! [`VolumeEnforcer`] watches `volumechange` and writes that target back
//! whenever the element drifts.

use crate::bridge::debounce::Debounce;
use crate::page::{ApiCall, ElementCall, Page, api_volume, clamp_fraction, dual_write};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;
use tracing::{debug, info, trace};

// Any NaN bit pattern works as "no target yet"; clamp_fraction never yields NaN.
const UNSET: u64 = u64::MAX;

#[derive(Debug)]
struct VolumeShared {
    target_bits: AtomicU64,
    setting: AtomicBool,
}

/// Host-owned volume capability shared with the bridge: the target volume
/// and the "currently setting volume" guard. Clones share state.
#[derive(Debug, Clone)]
pub struct VolumeController {
    shared: Arc<VolumeShared>,
}

impl Default for VolumeController {
    fn default() -> Self {
        Self {
            shared: Arc::new(VolumeShared {
                target_bits: AtomicU64::new(UNSET),
                setting: AtomicBool::new(false),
            }),
        }
    }
}

impl VolumeController {
    pub fn new() -> Self {
        Self::default()
    }

    /// A controller whose target is already set, as at page-load time.
    pub fn with_target(fraction: f64) -> Self {
        let ctl = Self::new();
        ctl.set_target(fraction);
        ctl
    }

    pub fn target(&self) -> Option<f64> {
        let bits = self.shared.target_bits.load(Ordering::Acquire);
        (bits != UNSET).then(|| f64::from_bits(bits))
    }

    pub fn set_target(&self, fraction: f64) {
        self.shared
            .target_bits
            .store(clamp_fraction(fraction).to_bits(), Ordering::Release);
    }

    pub fn is_setting(&self) -> bool {
        self.shared.setting.load(Ordering::Acquire)
    }

    fn set_guard(&self, on: bool) {
        self.shared.setting.store(on, Ordering::Release);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VolumeTimer {
    /// The post-`volumechange` debounce closed.
    Settle,
    /// The guard window after our own write closed.
    ReleaseGuard,
}

#[derive(Debug)]
pub struct VolumeEnforcer {
    controller: VolumeController,
    debounce: Debounce,
    guard_release: Debounce,
    debounce_window: Duration,
    guard_window: Duration,
    tolerance: f64,
    corrections: u64,
}

impl VolumeEnforcer {
    pub fn new(
        controller: VolumeController,
        debounce_window: Duration,
        guard_window: Duration,
        tolerance: f64,
    ) -> Self {
        Self {
            controller,
            debounce: Debounce::new(),
            guard_release: Debounce::new(),
            debounce_window,
            guard_window,
            tolerance,
            corrections: 0,
        }
    }

    /// Drift corrections performed so far (host-issued writes excluded).
    pub fn corrections(&self) -> u64 {
        self.corrections
    }

    /// A `volumechange` from the attached element.
    pub fn on_volume_change(&mut self) {
        if self.controller.is_setting() {
            trace!("volumechange during own write, ignored");
            return;
        }
        self.debounce.arm(self.debounce_window);
    }

    /// Resolves when either of the enforcer's timers fires. Cancel-safe.
    pub async fn next_timer(&mut self) -> VolumeTimer {
        tokio::select! {
            _ = self.debounce.fired() => VolumeTimer::Settle,
            _ = self.guard_release.fired() => VolumeTimer::ReleaseGuard,
        }
    }

    pub fn release_guard(&mut self) {
        self.controller.set_guard(false);
    }

    /// Runs when the debounce window closes: compare and correct.
    pub fn settle<P: Page + ?Sized>(&mut self, page: &mut P) -> bool {
        if self.controller.is_setting() {
            return false;
        }
        let Some(target) = self.controller.target() else {
            return false;
        };
        let current = match page.video_state() {
            Ok(state) => state.volume,
            Err(e) => {
                debug!(error = %e, "volume check skipped");
                return false;
            }
        };
        if (current - target).abs() <= self.tolerance {
            return false;
        }
        debug!(current, target, "correcting volume drift");
        self.write(page, target);
        self.corrections += 1;
        true
    }

    /// Applies the target to a freshly detected element without waiting for a
    /// `volumechange`: an element created at its default volume never fires
    /// one, so drift there would otherwise go unnoticed.
    pub fn apply_initial<P: Page + ?Sized>(&mut self, page: &mut P) -> bool {
        let Some(target) = self.controller.target() else {
            return false;
        };
        info!(target, "applying target volume to new element");
        self.write(page, target);
        true
    }

    /// A host-issued volume command: becomes the new target and is written
    /// straight away.
    pub fn apply_host<P: Page + ?Sized>(&mut self, page: &mut P, fraction: f64) {
        let target = clamp_fraction(fraction);
        self.controller.set_target(target);
        // A drift check queued before the command is obsolete now.
        self.debounce.cancel();
        self.write(page, target);
    }

    fn write<P: Page + ?Sized>(&mut self, page: &mut P, target: f64) {
        self.controller.set_guard(true);
        dual_write(
            page,
            ElementCall::SetVolume(target),
            ApiCall::SetVolume(api_volume(target)),
        );
        self.guard_release.arm(self.guard_window);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::page::PageEvent;
    use crate::page::sim::SimPage;

    fn enforcer(ctl: &VolumeController) -> VolumeEnforcer {
        VolumeEnforcer::new(ctl.clone(), Duration::from_millis(100), Duration::from_millis(10), 0.01)
    }

    fn volume_writes(page: &SimPage) -> usize {
        page.element_calls()
            .iter()
            .filter(|c| matches!(c, ElementCall::SetVolume(_)))
            .count()
    }

    #[test]
    fn controller_starts_unset() {
        let ctl = VolumeController::new();
        assert_eq!(ctl.target(), None);
        ctl.set_target(0.25);
        assert_eq!(ctl.target(), Some(0.25));
        ctl.set_target(3.0);
        assert_eq!(ctl.target(), Some(1.0));
        assert!(!ctl.is_setting());
    }

    #[test]
    fn clones_share_target() {
        let host = VolumeController::new();
        let page_side = host.clone();
        host.set_target(0.6);
        assert_eq!(page_side.target(), Some(0.6));
    }

    #[tokio::test(start_paused = true)]
    async fn corrects_drift_once_debounce_closes() {
        let ctl = VolumeController::with_target(0.5);
        let mut enf = enforcer(&ctl);
        let (mut page, _rx) = SimPage::new();
        page.insert_video(0.5, 100.0);

        page.external_volume(0.9);
        enf.on_volume_change();
        assert_eq!(enf.next_timer().await, VolumeTimer::Settle);
        assert!(enf.settle(&mut page));
        assert_eq!(page.element_volume(), Some(0.5));
        assert_eq!(page.player_api_volume(), Some(50));
        assert!(ctl.is_setting());

        assert_eq!(enf.next_timer().await, VolumeTimer::ReleaseGuard);
        enf.release_guard();
        assert!(!ctl.is_setting());
        assert_eq!(enf.corrections(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn drift_within_tolerance_is_left_alone() {
        let ctl = VolumeController::with_target(0.5);
        let mut enf = enforcer(&ctl);
        let (mut page, _rx) = SimPage::new();
        page.insert_video(0.505, 100.0);
        assert!(!enf.settle(&mut page));
        assert_eq!(volume_writes(&page), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn no_target_means_no_correction() {
        let ctl = VolumeController::new();
        let mut enf = enforcer(&ctl);
        let (mut page, _rx) = SimPage::new();
        page.insert_video(1.0, 100.0);
        page.external_volume(0.2);
        assert!(!enf.settle(&mut page));
        assert!(!enf.apply_initial(&mut page));
        assert_eq!(page.element_volume(), Some(0.2));
    }

    #[tokio::test(start_paused = true)]
    async fn own_write_echo_is_ignored() {
        let ctl = VolumeController::with_target(0.3);
        let mut enf = enforcer(&ctl);
        let (mut page, mut rx) = SimPage::new();
        page.insert_video(1.0, 100.0);
        while rx.try_recv().is_ok() {}

        assert!(enf.apply_initial(&mut page));
        // The element echoes our write as a volumechange.
        assert!(matches!(rx.try_recv(), Ok(PageEvent::Media { .. })));
        enf.on_volume_change();
        assert!(!enf.debounce.is_armed());
    }

    #[tokio::test(start_paused = true)]
    async fn host_command_replaces_target() {
        let ctl = VolumeController::with_target(0.8);
        let mut enf = enforcer(&ctl);
        let (mut page, _rx) = SimPage::new();
        page.insert_video(0.8, 100.0);
        enf.apply_host(&mut page, 0.2);
        assert_eq!(ctl.target(), Some(0.2));
        assert_eq!(page.element_volume(), Some(0.2));
        assert_eq!(page.player_api_volume(), Some(20));
        assert_eq!(enf.corrections(), 0);
    }
}
