//! Coalescing timer for bursts of page activity.

use std::pin::Pin;
use std::time::Duration;
use tokio::time::{Instant, Sleep, sleep};

/// A single re-armable one-shot timer. Arming again replaces the pending
/// deadline, so a burst of triggers fires once, `window` after the last one.
#[derive(Debug, Default)]
pub struct Debounce {
    sleep: Option<Pin<Box<Sleep>>>,
}

impl Debounce {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn arm(&mut self, window: Duration) {
        match self.sleep.as_mut() {
            Some(s) => s.as_mut().reset(Instant::now() + window),
            None => self.sleep = Some(Box::pin(sleep(window))),
        }
    }

    pub fn cancel(&mut self) {
        self.sleep = None;
    }

    pub fn is_armed(&self) -> bool {
        self.sleep.is_some()
    }

    /// Resolves when the armed deadline passes; pends forever when disarmed.
    /// Cancel-safe: dropping it early leaves the deadline armed.
    pub async fn fired(&mut self) {
        if let Some(s) = &mut self.sleep {
            s.as_mut().await;
            self.sleep = None;
        } else {
            futures_util::future::pending::<()>().await;
        }
    }
}
