//! Per-behavior cooldown bookkeeping.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use crate::machines::BehaviorKind;

/// Records when each behavior kind last fired so the arbiter can enforce
/// per-kind rate limits against the monotonic clock.
#[derive(Debug, Default)]
pub struct CooldownRegistry {
    last_fired: HashMap<BehaviorKind, Instant>,
}

impl CooldownRegistry {
    pub fn mark(&mut self, kind: BehaviorKind, now: Instant) {
        self.last_fired.insert(kind, now);
    }

    /// True when the behavior has never fired, or `window` has elapsed
    /// since it last did.
    pub fn ready(&self, kind: BehaviorKind, now: Instant, window: Duration) -> bool {
        match self.last_fired.get(&kind) {
            None => true,
            Some(&at) => now.duration_since(at) >= window,
        }
    }
}
