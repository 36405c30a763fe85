//! Per-tick behavior arbitration.
//!
//! A running joint-attention bid is advanced to completion and never
//! preempted. Outside of a bid the arbiter re-evaluates priority every
//! tick: responding joint attention (head turn, gated by the responding
//! toggle, the Carl suppression, and a 7 s cooldown), then dynamic gaze
//! while a second face is visible, then mutual gaze. Without a user in
//! front the gaze parks at the centre.
//!
//! A kept behavior retains its timers; only a priority change replaces it.

use std::time::{Duration, Instant};

use gcs_behavior::cooldown::CooldownRegistry;
use gcs_behavior::machines::{Behavior, BehaviorKind, DynamicGaze, JointAttention, MutualGaze};
use gcs_perception::context::PerceptionContext;
use gcs_types::{ConditionSnapshot, FacePoint, GazeTarget, Side, StatusSummary};
use rand::{SeedableRng, rngs::SmallRng};
use tracing::{debug, info, warn};

/// Arbitration cadence.
pub const TICK_INTERVAL: Duration = Duration::from_millis(50);
/// Minimum spacing between responding joint-attention bids.
pub const RESPONDING_COOLDOWN: Duration = Duration::from_millis(7000);

/// What the priority rules want this tick, before considering what is
/// already running.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Selection {
    Responding(Side),
    Dynamic,
    Mutual,
}

/// The behavior arbiter. Holds at most one running behavior and the
/// cooldown ledger.
#[derive(Debug)]
pub struct Arbiter {
    active: Option<Behavior>,
    cooldowns: CooldownRegistry,
    rng: SmallRng,
}

impl Arbiter {
    pub fn new() -> Self {
        Self::with_rng(SmallRng::from_os_rng())
    }

    /// Deterministic construction for tests.
    pub fn with_rng(rng: SmallRng) -> Self {
        Self {
            active: None,
            cooldowns: CooldownRegistry::default(),
            rng,
        }
    }

    /// Whether a joint-attention bid (either variant) is in flight.
    pub fn ja_active(&self) -> bool {
        self.active.as_ref().is_some_and(Behavior::is_joint_attention)
    }

    pub fn active_kind(&self) -> Option<BehaviorKind> {
        self.active.as_ref().map(Behavior::kind)
    }

    /// Start an initiating joint-attention bid toward `side`. Refused while
    /// any bid is already running; mutual and dynamic gaze are displaced.
    pub fn trigger_initiating(
        &mut self,
        side: Side,
        ctx: &PerceptionContext,
        now: Instant,
    ) -> bool {
        if self.ja_active() {
            debug!(side = %side, "initiating bid refused, joint attention already running");
            return false;
        }
        info!(side = %side, "starting initiating joint attention");
        let origin = ctx.face().unwrap_or_else(FacePoint::center);
        self.active = Some(Behavior::InitiatingJa(JointAttention::new(side, origin, now)));
        self.cooldowns.mark(BehaviorKind::InitiatingJa, now);
        true
    }

    /// One arbitration step: advance or replace the running behavior and
    /// report the resulting gaze target plus a status snapshot.
    pub fn step(
        &mut self,
        ctx: &PerceptionContext,
        snapshot: &ConditionSnapshot,
        now: Instant,
    ) -> (GazeTarget, StatusSummary) {
        // A joint-attention bid runs to completion, user or no user.
        if self.ja_active() {
            if let Some(behavior) = self.active.as_mut()
                && let Some(target) = behavior.apply(ctx, now)
            {
                let status = self.summarize(ctx, snapshot, target, now);
                return (target, status);
            }
            debug!("joint attention finished");
            self.active = None;
        }

        if !ctx.user_in_front() {
            self.active = None;
            let gaze = GazeTarget::center();
            let status = self.summarize(ctx, snapshot, gaze, now);
            return (gaze, status);
        }

        match self.select(ctx, snapshot, now) {
            Selection::Responding(side) => {
                info!(side = %side, "triggering responding joint attention");
                self.cooldowns.mark(BehaviorKind::RespondingJa, now);
                let origin = ctx.face().unwrap_or_else(FacePoint::center);
                self.active =
                    Some(Behavior::RespondingJa(JointAttention::new(side, origin, now)));
            }
            Selection::Dynamic => {
                if self.active_kind() != Some(BehaviorKind::DynamicGaze) {
                    self.active = Some(Behavior::DynamicGaze(DynamicGaze::new(now)));
                }
            }
            Selection::Mutual => {
                if self.active_kind() != Some(BehaviorKind::MutualGaze) {
                    self.active = Some(Behavior::MutualGaze(MutualGaze::new(
                        now,
                        SmallRng::from_rng(&mut self.rng),
                    )));
                }
            }
        }

        let gaze = match self.active.as_mut().and_then(|b| b.apply(ctx, now)) {
            Some(target) => target,
            None => {
                // The precondition vanished between selection and the first
                // step; fall back to centre rather than loop.
                warn!("behavior refused its step, parking at centre");
                self.active = None;
                GazeTarget::center()
            }
        };
        let status = self.summarize(ctx, snapshot, gaze, now);
        (gaze, status)
    }

    fn select(
        &self,
        ctx: &PerceptionContext,
        snapshot: &ConditionSnapshot,
        now: Instant,
    ) -> Selection {
        if !snapshot.gaze_suppressed
            && snapshot.responding_enabled
            && let Some(side) = ctx.head_direction().side()
            && self
                .cooldowns
                .ready(BehaviorKind::RespondingJa, now, RESPONDING_COOLDOWN)
        {
            return Selection::Responding(side);
        }
        if ctx.second_face().is_some() {
            return Selection::Dynamic;
        }
        Selection::Mutual
    }

    fn summarize(
        &self,
        ctx: &PerceptionContext,
        snapshot: &ConditionSnapshot,
        gaze: GazeTarget,
        now: Instant,
    ) -> StatusSummary {
        StatusSummary {
            condition: snapshot.active,
            behavior: self.active.as_ref().map(|b| b.kind().name().to_string()),
            phase: self
                .active
                .as_ref()
                .and_then(|b| b.phase_label(now))
                .map(str::to_string),
            initiating_enabled: snapshot.initiating_enabled,
            responding_enabled: snapshot.responding_enabled,
            knowledge: snapshot.knowledge,
            user_present: ctx.user_in_front(),
            face_count: ctx.face_count(),
            head_direction: ctx.head_direction(),
            gaze,
        }
    }
}

impl Default for Arbiter {
    fn default() -> Self {
        Self::new()
    }
}
