//! Gaze behavior machines.
//!
//! All timing is driven by the `now` instant passed into each step so the
//! machines stay deterministic under test; none of them reads the clock
//! themselves.

use std::time::{Duration, Instant};

use gcs_perception::context::PerceptionContext;
use gcs_types::{FacePoint, GazeTarget, Side};
use rand::{Rng, rngs::SmallRng};

/// Ramp from the current face toward the side target.
pub const JA_ORIENT: Duration = Duration::from_millis(600);
/// Dwell on the side target.
pub const JA_HOLD: Duration = Duration::from_millis(2000);
/// Ramp back to the face.
pub const JA_RETURN: Duration = Duration::from_millis(600);

/// Dwell per face before dynamic gaze alternates.
pub const DYNAMIC_DWELL: Duration = Duration::from_millis(1500);

/// Gaze aversion scheduling window (uniform), and the aversion length.
pub const AVERSION_MIN: Duration = Duration::from_millis(4000);
pub const AVERSION_MAX: Duration = Duration::from_millis(9000);
pub const AVERSION_DURATION: Duration = Duration::from_millis(800);

const SIDE_LEFT_X: f64 = 0.1;
const SIDE_RIGHT_X: f64 = 0.9;
const SIDE_Y: f64 = 0.5;

fn side_point(side: Side) -> FacePoint {
    FacePoint {
        x: match side {
            Side::Left => SIDE_LEFT_X,
            Side::Right => SIDE_RIGHT_X,
        },
        y: SIDE_Y,
    }
}

fn lerp(from: FacePoint, to: FacePoint, t: f64) -> GazeTarget {
    let t = t.clamp(0.0, 1.0);
    GazeTarget::at(from.x + (to.x - from.x) * t, from.y + (to.y - from.y) * t)
}

// ────────────────────────────────────────────────────────────────────────────
// Behavior kinds
// ────────────────────────────────────────────────────────────────────────────

/// Discriminant for arbitration priority and cooldown bookkeeping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BehaviorKind {
    MutualGaze,
    DynamicGaze,
    InitiatingJa,
    RespondingJa,
}

impl BehaviorKind {
    pub fn name(self) -> &'static str {
        match self {
            BehaviorKind::MutualGaze => "MutualGaze",
            BehaviorKind::DynamicGaze => "DynamicGaze",
            BehaviorKind::InitiatingJa => "InitiatingJA",
            BehaviorKind::RespondingJa => "RespondingJA",
        }
    }
}

/// Phase of a running joint-attention bid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JaPhase {
    Orient,
    Hold,
    Return,
}

impl JaPhase {
    pub fn label(self) -> &'static str {
        match self {
            JaPhase::Orient => "Orient",
            JaPhase::Hold => "Hold",
            JaPhase::Return => "Return",
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Joint attention
// ────────────────────────────────────────────────────────────────────────────

/// One joint-attention bid: orient toward a side target, hold, return to
/// the face. Shared by the initiating and responding variants; only the
/// trigger and arbitration priority differ.
#[derive(Debug, Clone, Copy)]
pub struct JointAttention {
    target: Side,
    origin: FacePoint,
    started_at: Instant,
}

impl JointAttention {
    pub fn new(target: Side, origin: FacePoint, started_at: Instant) -> Self {
        Self {
            target,
            origin,
            started_at,
        }
    }

    pub fn target(&self) -> Side {
        self.target
    }

    pub fn phase(&self, now: Instant) -> Option<JaPhase> {
        let elapsed = now.duration_since(self.started_at);
        if elapsed < JA_ORIENT {
            Some(JaPhase::Orient)
        } else if elapsed < JA_ORIENT + JA_HOLD {
            Some(JaPhase::Hold)
        } else if elapsed < JA_ORIENT + JA_HOLD + JA_RETURN {
            Some(JaPhase::Return)
        } else {
            None
        }
    }

    fn step(&self, ctx: &PerceptionContext, now: Instant) -> Option<GazeTarget> {
        let phase = self.phase(now)?;
        let face = ctx.face().unwrap_or(self.origin);
        let aim = side_point(self.target);
        let elapsed = now.duration_since(self.started_at);
        Some(match phase {
            JaPhase::Orient => lerp(
                self.origin,
                aim,
                elapsed.as_secs_f64() / JA_ORIENT.as_secs_f64(),
            ),
            JaPhase::Hold => GazeTarget::at(aim.x, aim.y),
            JaPhase::Return => {
                let t = (elapsed - JA_ORIENT - JA_HOLD).as_secs_f64() / JA_RETURN.as_secs_f64();
                lerp(aim, face, t)
            }
        })
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Mutual gaze
// ────────────────────────────────────────────────────────────────────────────

/// Default social behavior: track the primary face, with a brief gaze
/// aversion at random intervals so the stare never reads as fixed.
#[derive(Debug, Clone)]
pub struct MutualGaze {
    next_aversion_at: Instant,
    averting_until: Option<Instant>,
    aversion_offset: (f64, f64),
    rng: SmallRng,
}

impl MutualGaze {
    pub fn new(now: Instant, mut rng: SmallRng) -> Self {
        let next_aversion_at = now + Self::draw_interval(&mut rng);
        Self {
            next_aversion_at,
            averting_until: None,
            aversion_offset: (0.0, 0.0),
            rng,
        }
    }

    fn draw_interval(rng: &mut SmallRng) -> Duration {
        let span = (AVERSION_MAX - AVERSION_MIN).as_millis() as u64;
        AVERSION_MIN + Duration::from_millis(rng.random_range(0..span))
    }

    pub fn is_averting(&self) -> bool {
        self.averting_until.is_some()
    }

    fn step(&mut self, ctx: &PerceptionContext, now: Instant) -> Option<GazeTarget> {
        let face = ctx.face()?;

        if let Some(until) = self.averting_until {
            if now >= until {
                self.averting_until = None;
                self.next_aversion_at = now + Self::draw_interval(&mut self.rng);
            }
        } else if now >= self.next_aversion_at {
            self.averting_until = Some(now + AVERSION_DURATION);
            self.aversion_offset = (
                self.rng.random_range(-0.25..0.25),
                self.rng.random_range(-0.15..0.15),
            );
        }

        Some(if self.averting_until.is_some() {
            GazeTarget::at(face.x + self.aversion_offset.0, face.y + self.aversion_offset.1)
        } else {
            GazeTarget::at(face.x, face.y)
        })
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Dynamic gaze
// ────────────────────────────────────────────────────────────────────────────

/// Two-person alternation: dwell on each detected face in turn while a
/// second face is visible. Completes as soon as the second face is lost.
#[derive(Debug, Clone, Copy)]
pub struct DynamicGaze {
    focus_primary: bool,
    last_switch: Instant,
}

impl DynamicGaze {
    pub fn new(now: Instant) -> Self {
        Self {
            focus_primary: true,
            last_switch: now,
        }
    }

    pub fn focused_on_primary(&self) -> bool {
        self.focus_primary
    }

    fn step(&mut self, ctx: &PerceptionContext, now: Instant) -> Option<GazeTarget> {
        let primary = ctx.face()?;
        let partner = ctx.second_face()?;

        if now.duration_since(self.last_switch) >= DYNAMIC_DWELL {
            self.focus_primary = !self.focus_primary;
            self.last_switch = now;
        }

        let focus = if self.focus_primary { primary } else { partner };
        Some(GazeTarget::at(focus.x, focus.y))
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Tagged union
// ────────────────────────────────────────────────────────────────────────────

/// The currently-running gaze behavior. The arbiter holds at most one.
#[derive(Debug, Clone)]
pub enum Behavior {
    MutualGaze(MutualGaze),
    DynamicGaze(DynamicGaze),
    InitiatingJa(JointAttention),
    RespondingJa(JointAttention),
}

impl Behavior {
    pub fn kind(&self) -> BehaviorKind {
        match self {
            Behavior::MutualGaze(_) => BehaviorKind::MutualGaze,
            Behavior::DynamicGaze(_) => BehaviorKind::DynamicGaze,
            Behavior::InitiatingJa(_) => BehaviorKind::InitiatingJa,
            Behavior::RespondingJa(_) => BehaviorKind::RespondingJa,
        }
    }

    /// Whether a joint-attention bid is in flight. While true, no other
    /// behavior may preempt and no new bid may start.
    pub fn is_joint_attention(&self) -> bool {
        matches!(self, Behavior::InitiatingJa(_) | Behavior::RespondingJa(_))
    }

    /// Human-readable sub-state for the status line.
    pub fn phase_label(&self, now: Instant) -> Option<&'static str> {
        match self {
            Behavior::MutualGaze(m) => Some(if m.is_averting() { "Averting" } else { "Engaged" }),
            Behavior::DynamicGaze(d) => {
                Some(if d.focused_on_primary() { "Primary" } else { "Partner" })
            }
            Behavior::InitiatingJa(ja) | Behavior::RespondingJa(ja) => {
                ja.phase(now).map(JaPhase::label)
            }
        }
    }

    /// Advance one tick. `None` means the behavior is finished.
    pub fn apply(&mut self, ctx: &PerceptionContext, now: Instant) -> Option<GazeTarget> {
        match self {
            Behavior::MutualGaze(m) => m.step(ctx, now),
            Behavior::DynamicGaze(d) => d.step(ctx, now),
            Behavior::InitiatingJa(ja) | Behavior::RespondingJa(ja) => ja.step(ctx, now),
        }
    }
}
