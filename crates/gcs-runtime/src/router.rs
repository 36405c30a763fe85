//! Game event handling.
//!
//! Card reveals produce at most one decision each: the side is flipped with
//! probability `1 − k` under a knowledge factor `k`, a `RobotsMove` record
//! is always emitted, and the actual gaze bid is scheduled separately by the
//! core. Card drops end a question and reassign the condition uniformly at
//! random among the conditions that are not currently active.

use std::collections::HashSet;

use gcs_types::{Condition, ConditionSnapshot, OutboundMessage, Side};
use rand::{Rng, SeedableRng, rngs::SmallRng};
use tracing::{debug, info};

/// The decision taken for one accepted card reveal.
#[derive(Debug, Clone)]
pub struct RevealOutcome {
    /// The side the robot will look toward (after knowledge noise).
    pub direction: Side,
    /// Whether a gaze bid should actually be scheduled.
    pub triggered: bool,
    /// The `RobotsMove` record, emitted regardless of `triggered`.
    pub log: OutboundMessage,
}

#[derive(Debug)]
pub struct EventRouter {
    handled_cards: HashSet<String>,
    rng: SmallRng,
}

impl EventRouter {
    pub fn new() -> Self {
        Self::with_rng(SmallRng::from_os_rng())
    }

    pub fn with_rng(rng: SmallRng) -> Self {
        Self {
            handled_cards: HashSet::new(),
            rng,
        }
    }

    /// Handle one card reveal. Returns `None` when the card was already
    /// handled; every card id produces at most one outcome per session.
    pub fn handle_card_reveal(
        &mut self,
        card_id: &str,
        side: Side,
        snapshot: &ConditionSnapshot,
    ) -> Option<RevealOutcome> {
        if !self.handled_cards.insert(card_id.to_string()) {
            debug!(card_id, "card already handled, ignoring reveal");
            return None;
        }

        let triggered = !snapshot.gaze_suppressed && snapshot.initiating_enabled;
        let mut direction = side;
        if triggered
            && let Some(k) = snapshot.knowledge
            && self.rng.random::<f64>() > k
        {
            direction = direction.flip();
            info!(card_id, looks = %direction, "knowledge noise flipped the gaze side");
        }

        let gaze_decision = if triggered { direction.as_str() } else { "none" };
        let reason = if triggered {
            ""
        } else if snapshot.gaze_suppressed {
            "Carl condition active"
        } else {
            "Initiating JA toggle off"
        };

        Some(RevealOutcome {
            direction,
            triggered,
            log: OutboundMessage::robots_move(
                card_id,
                gaze_decision,
                snapshot.robot_label(),
                reason,
                chrono::Utc::now().timestamp_millis(),
            ),
        })
    }

    /// Pick the next condition after a question ends: uniform over the
    /// conditions that are not currently active, so the same condition
    /// never repeats back-to-back.
    pub fn handle_card_dropped(&mut self, snapshot: &ConditionSnapshot) -> Condition {
        let candidates: Vec<Condition> = Condition::ALL
            .iter()
            .copied()
            .filter(|c| Some(*c) != snapshot.active)
            .collect();
        let pool = if candidates.is_empty() {
            Condition::ALL.to_vec()
        } else {
            candidates
        };
        let next = pool[self.rng.random_range(0..pool.len())];
        info!(next = %next, "question complete, reassigning condition");
        next
    }
}

impl Default for EventRouter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gcs_types::{ConditionFlags, KNOWLEDGE_HIGH, KNOWLEDGE_LOW};
    use std::collections::HashMap;

    fn router(seed: u64) -> EventRouter {
        EventRouter::with_rng(SmallRng::seed_from_u64(seed))
    }

    fn ryan() -> ConditionSnapshot {
        let mut flags = ConditionFlags::default();
        flags.activate(Condition::Ryan);
        flags.snapshot()
    }

    fn carl() -> ConditionSnapshot {
        let mut flags = ConditionFlags::default();
        flags.activate(Condition::Carl);
        flags.snapshot()
    }

    #[test]
    fn duplicate_card_produces_no_second_outcome() {
        let mut r = router(1);
        assert!(r.handle_card_reveal("c1", Side::Left, &ryan()).is_some());
        assert!(r.handle_card_reveal("c1", Side::Left, &ryan()).is_none());
        assert!(r.handle_card_reveal("c2", Side::Left, &ryan()).is_some());
    }

    #[test]
    fn carl_yields_untriggered_outcome_with_reason() {
        let mut r = router(1);
        let outcome = r.handle_card_reveal("c1", Side::Left, &carl()).unwrap();
        assert!(!outcome.triggered);
        let v = outcome.log.value();
        assert_eq!(v["gazeDecision"], "none");
        assert_eq!(v["reason"], "Carl condition active");
        assert_eq!(v["Robot"], "Carl condition");
    }

    #[test]
    fn initiating_off_yields_toggle_reason() {
        let mut r = router(1);
        let snap = ConditionFlags::default().snapshot();
        let outcome = r.handle_card_reveal("c1", Side::Right, &snap).unwrap();
        assert!(!outcome.triggered);
        assert_eq!(outcome.log.value()["reason"], "Initiating JA toggle off");
        assert_eq!(outcome.log.value()["Robot"], "default");
    }

    #[test]
    fn triggered_log_carries_direction_and_condition() {
        let mut r = router(3);
        let outcome = r.handle_card_reveal("c1", Side::Left, &ryan()).unwrap();
        assert!(outcome.triggered);
        let v = outcome.log.value();
        assert_eq!(v["event"], "RobotsMove");
        assert_eq!(v["Robot"], "Ryan condition");
        assert_eq!(v["gazeDecision"], outcome.direction.as_str());
        assert_eq!(v["reason"], "");
    }

    #[test]
    fn knowledge_noise_flip_rate_matches_factor() {
        for (snap_k, expected) in [(KNOWLEDGE_HIGH, 0.2), (KNOWLEDGE_LOW, 0.8)] {
            let mut snap = ryan();
            snap.knowledge = Some(snap_k);
            let mut r = router(99);
            let trials = 2000;
            let flips = (0..trials)
                .filter(|i| {
                    let out = r
                        .handle_card_reveal(&format!("k{snap_k}-{i}"), Side::Left, &snap)
                        .unwrap();
                    out.direction == Side::Right
                })
                .count();
            let rate = flips as f64 / trials as f64;
            assert!(
                (rate - expected).abs() < 0.05,
                "factor {snap_k}: flip rate {rate} not near {expected}"
            );
        }
    }

    #[test]
    fn no_knowledge_factor_means_no_flips() {
        let mut snap = ryan();
        snap.knowledge = None;
        let mut r = router(5);
        for i in 0..200 {
            let out = r
                .handle_card_reveal(&format!("n{i}"), Side::Left, &snap)
                .unwrap();
            assert_eq!(out.direction, Side::Left);
        }
    }

    #[test]
    fn reassignment_excludes_current_condition() {
        let mut r = router(11);
        for _ in 0..100 {
            assert_ne!(r.handle_card_dropped(&ryan()), Condition::Ryan);
            assert_ne!(r.handle_card_dropped(&carl()), Condition::Carl);
        }
    }

    #[test]
    fn reassignment_is_roughly_uniform_over_candidates() {
        let mut r = router(13);
        let mut counts: HashMap<Condition, usize> = HashMap::new();
        for _ in 0..2000 {
            *counts.entry(r.handle_card_dropped(&ryan())).or_default() += 1;
        }
        let ivan = counts[&Condition::Ivan] as f64;
        let carl = counts[&Condition::Carl] as f64;
        assert!((ivan / 2000.0 - 0.5).abs() < 0.05);
        assert!((carl / 2000.0 - 0.5).abs() < 0.05);
    }

    #[test]
    fn reassignment_without_active_condition_uses_full_set() {
        let mut r = router(17);
        let snap = ConditionFlags::default().snapshot();
        let mut seen = HashSet::new();
        for _ in 0..100 {
            seen.insert(r.handle_card_dropped(&snap));
        }
        assert_eq!(seen.len(), 3);
    }
}
