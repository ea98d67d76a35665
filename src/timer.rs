use tokio::time::Instant;

/// Small helper to keep media-clock logic isolated. The simulated page uses
/// it as the backing store for a video element's `currentTime`.
#[derive(Debug, PartialEq, Default, Clone)]
pub struct PlaybackClock {
    /// Anchor position in seconds (finite, >= 0).
    anchor_position: f64,
    /// Monotonic instant corresponding to `anchor_position` while running.
    anchor_instant: Option<Instant>,
}

impl PlaybackClock {
    pub fn reset(&mut self, position: f64) {
        self.anchor_position = sanitize_position(position);
        self.anchor_instant = None;
    }

    /// Moves the anchor to `position`, keeping the clock running if it was.
    pub fn set_position(&mut self, position: f64) {
        let running = self.anchor_instant.is_some();
        self.anchor_position = sanitize_position(position);
        self.anchor_instant = running.then(Instant::now);
    }

    pub fn mark_playing(&mut self) {
        if self.anchor_instant.is_none() {
            self.anchor_instant = Some(Instant::now());
        }
    }

    /// Freezes the clock at its current estimate.
    pub fn mark_paused(&mut self) {
        self.anchor_position = self.estimate();
        self.anchor_instant = None;
    }

    pub fn is_running(&self) -> bool {
        self.anchor_instant.is_some()
    }

    pub fn estimate(&self) -> f64 {
        let base = self.anchor_position;
        match self.anchor_instant {
            Some(inst) => {
                let val = base + inst.elapsed().as_secs_f64();
                if val.is_finite() { val } else { base }
            }
            None => base,
        }
    }
}

pub fn sanitize_position(p: f64) -> f64 {
    if !p.is_finite() || p < 0.0 { 0.0 } else { p }
}

/// Formats seconds the way the player bar renders them.
pub fn format_clock(seconds: f64) -> String {
    let total = sanitize_position(seconds) as u64;
    let (h, m, s) = (total / 3600, (total % 3600) / 60, total % 60);
    if h > 0 {
        format!("{h}:{m:02}:{s:02}")
    } else {
        format!("{m}:{s:02}")
    }
}
