//! Reconnect pacing.

use std::time::Duration;

const INITIAL: Duration = Duration::from_millis(500);
const CAP: Duration = Duration::from_secs(10);

/// Exponential backoff for link reconnects: 500 ms doubling to a 10 s cap,
/// reset on every successful connection.
#[derive(Debug, Clone)]
pub struct Backoff {
    current: Duration,
}

impl Backoff {
    pub fn new() -> Self {
        Self { current: INITIAL }
    }

    /// The delay to sleep before the next attempt; doubles for the one after.
    pub fn next(&mut self) -> Duration {
        let delay = self.current;
        self.current = (self.current * 2).min(CAP);
        delay
    }

    pub fn reset(&mut self) {
        self.current = INITIAL;
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Self::new()
    }
}
