//! The core task.
//!
//! A single `select!` loop over the 50 ms tick and the inbound event
//! channel. All mutable state (perception context, condition flags,
//! arbiter, router, pending gaze triggers) lives on this task alone.

use std::time::{Duration, Instant};

use gcs_perception::context::PerceptionContext;
use gcs_types::{
    ConditionFlags, CoreEvent, FlagChange, GameEvent, OutboundMessage, Side, StatusSummary,
};
use tokio::sync::{broadcast, mpsc};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::arbiter::{Arbiter, TICK_INTERVAL};
use crate::router::EventRouter;

/// Delay between a card reveal decision and the gaze bid it schedules.
pub const REVEAL_DELAY: Duration = Duration::from_millis(2000);

/// A gaze bid scheduled for a later tick. The joint-attention precondition
/// is re-checked at fire time, not at schedule time.
#[derive(Debug, Clone, Copy)]
struct ScheduledTrigger {
    fire_at: Instant,
    side: Side,
}

/// Owns all behavior state and runs the arbitration loop.
pub struct GazeCore {
    ctx: PerceptionContext,
    flags: ConditionFlags,
    arbiter: Arbiter,
    router: EventRouter,
    pending: Vec<ScheduledTrigger>,
    outbound: mpsc::UnboundedSender<OutboundMessage>,
    status_tx: broadcast::Sender<StatusSummary>,
}

impl GazeCore {
    pub fn new(
        outbound: mpsc::UnboundedSender<OutboundMessage>,
        status_tx: broadcast::Sender<StatusSummary>,
    ) -> Self {
        Self {
            ctx: PerceptionContext::default(),
            flags: ConditionFlags::default(),
            arbiter: Arbiter::new(),
            router: EventRouter::new(),
            pending: Vec::new(),
            outbound,
            status_tx,
        }
    }

    /// Run until a `Shutdown` event arrives or every sender is dropped.
    pub async fn run(mut self, mut events: mpsc::UnboundedReceiver<CoreEvent>) {
        let mut ticker = tokio::time::interval(TICK_INTERVAL);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        info!(tick_ms = TICK_INTERVAL.as_millis() as u64, "gaze core running");

        loop {
            tokio::select! {
                _ = ticker.tick() => self.on_tick(Instant::now()),
                maybe = events.recv() => match maybe {
                    Some(CoreEvent::Shutdown) | None => {
                        info!("gaze core shutting down");
                        break;
                    }
                    Some(event) => self.on_event(event, Instant::now()),
                },
            }
        }
    }

    fn on_tick(&mut self, now: Instant) {
        self.fire_due_triggers(now);
        let snapshot = self.flags.snapshot();
        let (_, status) = self.arbiter.step(&self.ctx, &snapshot, now);
        // Nobody listening is fine; status is best-effort.
        let _ = self.status_tx.send(status);
    }

    fn fire_due_triggers(&mut self, now: Instant) {
        let mut due = Vec::new();
        self.pending.retain(|t| {
            if t.fire_at <= now {
                due.push(*t);
                false
            } else {
                true
            }
        });
        for trigger in due {
            // Fire-time re-check: a bid that started in the meantime wins
            // and the scheduled one is dropped silently.
            if self.arbiter.ja_active() {
                debug!(side = %trigger.side, "dropping scheduled bid, joint attention running");
                continue;
            }
            self.arbiter.trigger_initiating(trigger.side, &self.ctx, now);
        }
    }

    fn on_event(&mut self, event: CoreEvent, now: Instant) {
        match event {
            CoreEvent::Perception(update) => self.ctx.apply_update(update),
            CoreEvent::Game(game) => self.on_game_event(game, now),
            CoreEvent::ManualGaze(side) => self.on_manual_gaze(side, now),
            CoreEvent::Flag(change) => self.on_flag_change(change),
            CoreEvent::Shutdown => {}
        }
    }

    fn on_game_event(&mut self, event: GameEvent, now: Instant) {
        match event {
            GameEvent::CardReveal { card_id, side } => {
                let snapshot = self.flags.snapshot();
                if let Some(outcome) = self.router.handle_card_reveal(&card_id, side, &snapshot) {
                    if outcome.triggered {
                        self.pending.push(ScheduledTrigger {
                            fire_at: now + REVEAL_DELAY,
                            side: outcome.direction,
                        });
                    }
                    if self.outbound.send(outcome.log).is_err() {
                        warn!("outbound log channel closed, dropping RobotsMove record");
                    }
                }
            }
            GameEvent::CardDropped { card_id } => {
                debug!(card_id, "card dropped, question complete");
                let next = self.router.handle_card_dropped(&self.flags.snapshot());
                self.flags.activate(next);
            }
            GameEvent::ServerStatus { status, message } => {
                info!(status, message = message.as_deref().unwrap_or(""), "game server status");
            }
            GameEvent::Unknown { event } => {
                debug!(event = event.as_deref().unwrap_or("<none>"), "unhandled game event");
            }
        }
    }

    /// Manual override: an immediate bid toward `side`, subject to the same
    /// gating as automatic initiation but with no knowledge noise and no
    /// log record.
    fn on_manual_gaze(&mut self, side: Side, now: Instant) {
        let snapshot = self.flags.snapshot();
        if snapshot.gaze_suppressed || !snapshot.initiating_enabled {
            debug!(side = %side, "manual gaze blocked by condition flags");
            return;
        }
        if self.arbiter.ja_active() {
            debug!(side = %side, "manual gaze ignored, joint attention running");
            return;
        }
        self.arbiter.trigger_initiating(side, &self.ctx, now);
    }

    fn on_flag_change(&mut self, change: FlagChange) {
        match change {
            FlagChange::Condition(c) => {
                info!(condition = %c, "activating condition");
                self.flags.activate(c);
            }
            FlagChange::Initiating(on) => self.flags.set_initiating(on),
            FlagChange::Responding(on) => self.flags.set_responding(on),
            FlagChange::KnowledgeHigh(on) => self.flags.set_knowledge_high(on),
            FlagChange::KnowledgeLow(on) => self.flags.set_knowledge_low(on),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gcs_types::{Condition, FacePoint, HeadDirection, PerceptionUpdate};

    fn core() -> (
        GazeCore,
        mpsc::UnboundedReceiver<OutboundMessage>,
        broadcast::Receiver<StatusSummary>,
    ) {
        let (out_tx, out_rx) = mpsc::unbounded_channel();
        let (status_tx, status_rx) = broadcast::channel(16);
        (GazeCore::new(out_tx, status_tx), out_rx, status_rx)
    }

    fn present(core: &mut GazeCore) {
        core.on_event(
            CoreEvent::Perception(PerceptionUpdate {
                user_in_front: true,
                face: FacePoint { x: 0.5, y: 0.5 },
                second_face: None,
                head_direction: HeadDirection::None,
            }),
            Instant::now(),
        );
    }

    fn activate(core: &mut GazeCore, c: Condition) {
        core.on_event(CoreEvent::Flag(FlagChange::Condition(c)), Instant::now());
    }

    #[test]
    fn reveal_schedules_delayed_bid_and_logs() {
        let (mut core, mut out_rx, _status) = core();
        present(&mut core);
        activate(&mut core, Condition::Ryan);
        let t0 = Instant::now();
        core.on_event(
            CoreEvent::Game(GameEvent::CardReveal {
                card_id: "c1".into(),
                side: Side::Left,
            }),
            t0,
        );

        let log = out_rx.try_recv().expect("RobotsMove emitted");
        assert_eq!(log.value()["event"], "RobotsMove");
        assert_eq!(core.pending.len(), 1);

        // Before the delay elapses nothing fires.
        core.on_tick(t0 + Duration::from_millis(100));
        assert!(!core.arbiter.ja_active());
        assert_eq!(core.pending.len(), 1);

        core.on_tick(t0 + REVEAL_DELAY + Duration::from_millis(10));
        assert!(core.arbiter.ja_active());
        assert!(core.pending.is_empty());
    }

    #[test]
    fn fired_trigger_dropped_while_ja_running() {
        let (mut core, _out, _status) = core();
        present(&mut core);
        activate(&mut core, Condition::Ryan);
        let t0 = Instant::now();
        core.on_event(
            CoreEvent::Game(GameEvent::CardReveal {
                card_id: "c1".into(),
                side: Side::Left,
            }),
            t0,
        );
        // A manual bid starts first and occupies the slot at fire time.
        core.on_event(CoreEvent::ManualGaze(Side::Right), t0 + Duration::from_millis(500));
        core.on_tick(t0 + REVEAL_DELAY + Duration::from_millis(10));
        assert!(core.pending.is_empty());
        assert!(core.arbiter.ja_active());
    }

    #[test]
    fn carl_reveal_logs_but_schedules_nothing() {
        let (mut core, mut out_rx, _status) = core();
        present(&mut core);
        activate(&mut core, Condition::Carl);
        core.on_event(
            CoreEvent::Game(GameEvent::CardReveal {
                card_id: "c1".into(),
                side: Side::Right,
            }),
            Instant::now(),
        );
        let log = out_rx.try_recv().unwrap();
        assert_eq!(log.value()["gazeDecision"], "none");
        assert!(core.pending.is_empty());
    }

    #[test]
    fn manual_gaze_blocked_under_carl() {
        let (mut core, _out, _status) = core();
        present(&mut core);
        activate(&mut core, Condition::Carl);
        core.on_event(CoreEvent::ManualGaze(Side::Left), Instant::now());
        assert!(!core.arbiter.ja_active());
    }

    #[test]
    fn manual_gaze_fires_under_ryan() {
        let (mut core, _out, _status) = core();
        present(&mut core);
        activate(&mut core, Condition::Ryan);
        core.on_event(CoreEvent::ManualGaze(Side::Left), Instant::now());
        assert!(core.arbiter.ja_active());
    }

    #[test]
    fn card_dropped_switches_condition_away_from_current() {
        let (mut core, _out, _status) = core();
        activate(&mut core, Condition::Ryan);
        core.on_event(
            CoreEvent::Game(GameEvent::CardDropped { card_id: "c9".into() }),
            Instant::now(),
        );
        assert!(!core.flags.ryan);
        assert!(core.flags.ivan || core.flags.carl);
    }

    #[test]
    fn tick_broadcasts_status() {
        let (mut core, _out, mut status_rx) = core();
        present(&mut core);
        core.on_tick(Instant::now());
        let status = status_rx.try_recv().unwrap();
        assert!(status.user_present);
        assert_eq!(status.behavior.as_deref(), Some("MutualGaze"));
    }

    #[tokio::test]
    async fn run_loop_stops_on_shutdown() {
        let (out_tx, _out_rx) = mpsc::unbounded_channel();
        let (status_tx, _status_rx) = broadcast::channel(16);
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let core = GazeCore::new(out_tx, status_tx);
        let handle = tokio::spawn(core.run(event_rx));
        event_tx.send(CoreEvent::Shutdown).unwrap();
        handle.await.unwrap();
    }
}
