//! Bridge timing and filtering knobs.

use std::time::Duration;

/// Every constant the bridge's timers and filters depend on. `Default`
/// matches what the embedded player page needs in practice.
#[derive(Debug, Clone, PartialEq)]
pub struct BridgeConfig {
    /// Interval between probes for the player-bar container.
    pub probe_interval: Duration,
    /// Snapshot cadence while media is playing.
    pub poll_interval: Duration,
    /// Minimum gap between a cadence emission and the previous emission.
    pub poll_throttle: Duration,
    /// Coalescing window for player-bar mutations.
    pub mutation_debounce: Duration,
    /// Settling window after an external volume change.
    pub volume_debounce: Duration,
    /// How long the enforcer ignores `volumechange` after its own write.
    pub guard_release: Duration,
    /// Volume drift tolerated before correcting.
    pub volume_tolerance: f64,
    /// Attribute mutations on the player bar that warrant a new snapshot.
    pub watched_attributes: Vec<String>,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            probe_interval: Duration::from_millis(500),
            poll_interval: Duration::from_millis(1000),
            poll_throttle: Duration::from_millis(500),
            mutation_debounce: Duration::from_millis(100),
            volume_debounce: Duration::from_millis(100),
            guard_release: Duration::from_millis(10),
            volume_tolerance: 0.01,
            watched_attributes: ["title", "src", "like-status", "aria-valuenow", "aria-pressed", "value", "hidden"]
                .into_iter()
                .map(String::from)
                .collect(),
        }
    }
}

impl BridgeConfig {
    pub fn watches_attribute(&self, name: &str) -> bool {
        self.watched_attributes.iter().any(|a| a.eq_ignore_ascii_case(name))
    }
}
