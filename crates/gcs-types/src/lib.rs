//! `gcs-types` – Shared data model for the Gaze Control System.
//!
//! Everything that crosses a crate boundary lives here: the perception
//! snapshot types, the experimenter condition flags and their read-only
//! snapshot, game events, the outbound log message shape, the per-tick
//! status summary consumed by the renderer, and the global [`GcsError`].

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Accuracy of the robot's simulated knowledge under the "high" flag.
pub const KNOWLEDGE_HIGH: f64 = 0.8;
/// Accuracy of the robot's simulated knowledge under the "low" flag.
pub const KNOWLEDGE_LOW: f64 = 0.2;

// ────────────────────────────────────────────────────────────────────────────
// Geometry
// ────────────────────────────────────────────────────────────────────────────

/// A normalised face position on the camera image, both axes in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FacePoint {
    pub x: f64,
    pub y: f64,
}

impl FacePoint {
    /// Image centre – the protocol default when a coordinate is absent.
    pub fn center() -> Self {
        Self { x: 0.5, y: 0.5 }
    }
}

/// The per-tick gaze side effect handed to the external renderer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GazeTarget {
    pub x: f64,
    pub y: f64,
    pub confidence: f64,
}

impl GazeTarget {
    /// Look straight ahead at full confidence (the idle target).
    pub fn center() -> Self {
        Self {
            x: 0.5,
            y: 0.5,
            confidence: 1.0,
        }
    }

    pub fn at(x: f64, y: f64) -> Self {
        Self {
            x: x.clamp(0.0, 1.0),
            y: y.clamp(0.0, 1.0),
            confidence: 1.0,
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Head direction & sides
// ────────────────────────────────────────────────────────────────────────────

/// Coarse head orientation reported by the perception model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum HeadDirection {
    #[default]
    None,
    Left,
    Right,
    Center,
}

impl HeadDirection {
    /// Parse the wire string. Accepts both the verbose `"Looking Left"`
    /// form and bare `"left"`, case-insensitively; anything else is `None`.
    pub fn parse(raw: &str) -> Self {
        let s = raw.trim().to_ascii_lowercase();
        let s = s.strip_prefix("looking ").unwrap_or(&s);
        match s {
            "left" => HeadDirection::Left,
            "right" => HeadDirection::Right,
            "center" | "centre" => HeadDirection::Center,
            _ => HeadDirection::None,
        }
    }

    /// The lateral side the user is turned toward, if any.
    pub fn side(self) -> Option<Side> {
        match self {
            HeadDirection::Left => Some(Side::Left),
            HeadDirection::Right => Some(Side::Right),
            _ => None,
        }
    }
}

impl std::fmt::Display for HeadDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HeadDirection::None => write!(f, "none"),
            HeadDirection::Left => write!(f, "Left"),
            HeadDirection::Right => write!(f, "Right"),
            HeadDirection::Center => write!(f, "Center"),
        }
    }
}

/// A lateral target side, used for card placement and joint attention.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Left,
    Right,
}

impl Side {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "left" => Some(Side::Left),
            "right" => Some(Side::Right),
            _ => None,
        }
    }

    pub fn flip(self) -> Self {
        match self {
            Side::Left => Side::Right,
            Side::Right => Side::Left,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Side::Left => "left",
            Side::Right => "right",
        }
    }
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Perception updates
// ────────────────────────────────────────────────────────────────────────────

/// One fused perception sample, already normalised to protocol defaults.
/// The context is overwritten wholesale with each update.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PerceptionUpdate {
    pub user_in_front: bool,
    pub face: FacePoint,
    pub second_face: Option<FacePoint>,
    pub head_direction: HeadDirection,
}

// ────────────────────────────────────────────────────────────────────────────
// Conditions
// ────────────────────────────────────────────────────────────────────────────

/// An experimental condition. Carl is the control condition in which the
/// robot performs no automatic joint-attention gaze.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Condition {
    Ryan,
    Ivan,
    Carl,
}

impl Condition {
    pub const ALL: [Condition; 3] = [Condition::Ryan, Condition::Ivan, Condition::Carl];

    /// The label written into `RobotsMove` log records.
    pub fn label(self) -> &'static str {
        match self {
            Condition::Ryan => "Ryan condition",
            Condition::Ivan => "Ivan condition",
            Condition::Carl => "Carl condition",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "ryan" => Some(Condition::Ryan),
            "ivan" => Some(Condition::Ivan),
            "carl" => Some(Condition::Carl),
            _ => None,
        }
    }
}

impl std::fmt::Display for Condition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Condition::Ryan => write!(f, "Ryan"),
            Condition::Ivan => write!(f, "Ivan"),
            Condition::Carl => write!(f, "Carl"),
        }
    }
}

/// The raw experimenter toggles. Mutated by condition reassignment and by
/// flag-change events pushed from the control UI; read by the core only
/// through [`ConditionFlags::snapshot`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ConditionFlags {
    pub ryan: bool,
    pub ivan: bool,
    pub carl: bool,
    pub initiating_enabled: bool,
    pub responding_enabled: bool,
    pub knowledge_high: bool,
    pub knowledge_low: bool,
}

impl ConditionFlags {
    /// Activate a condition, normalising every dependent flag the way the
    /// experiment defines it: Ryan enables initiating gaze with high
    /// knowledge, Ivan with low knowledge, and Carl disables all automatic
    /// gaze behavior.
    pub fn activate(&mut self, condition: Condition) {
        self.ryan = condition == Condition::Ryan;
        self.ivan = condition == Condition::Ivan;
        self.carl = condition == Condition::Carl;
        match condition {
            Condition::Ryan => {
                self.initiating_enabled = true;
                self.responding_enabled = false;
                self.knowledge_high = true;
                self.knowledge_low = false;
            }
            Condition::Ivan => {
                self.initiating_enabled = true;
                self.responding_enabled = false;
                self.knowledge_high = false;
                self.knowledge_low = true;
            }
            Condition::Carl => {
                self.initiating_enabled = false;
                self.responding_enabled = false;
                self.knowledge_high = false;
                self.knowledge_low = false;
            }
        }
    }

    pub fn set_initiating(&mut self, enabled: bool) {
        // Carl suppresses automatic gaze; the toggle is blocked while it is set.
        self.initiating_enabled = enabled && !self.carl;
    }

    pub fn set_responding(&mut self, enabled: bool) {
        self.responding_enabled = enabled && !self.carl;
    }

    /// Knowledge toggles are mutually exclusive and blocked under Carl.
    pub fn set_knowledge_high(&mut self, enabled: bool) {
        self.knowledge_high = enabled && !self.carl;
        if self.knowledge_high {
            self.knowledge_low = false;
        }
    }

    pub fn set_knowledge_low(&mut self, enabled: bool) {
        self.knowledge_low = enabled && !self.carl;
        if self.knowledge_low {
            self.knowledge_high = false;
        }
    }

    /// An immutable view for one arbitration step.
    pub fn snapshot(&self) -> ConditionSnapshot {
        let active = if self.ryan {
            Some(Condition::Ryan)
        } else if self.ivan {
            Some(Condition::Ivan)
        } else if self.carl {
            Some(Condition::Carl)
        } else {
            None
        };
        let knowledge = if self.knowledge_high {
            Some(KNOWLEDGE_HIGH)
        } else if self.knowledge_low {
            Some(KNOWLEDGE_LOW)
        } else {
            None
        };
        ConditionSnapshot {
            active,
            // Read directly so an externally-violated exclusivity invariant
            // still suppresses automatic gaze whenever Carl is set.
            gaze_suppressed: self.carl,
            initiating_enabled: self.initiating_enabled,
            responding_enabled: self.responding_enabled,
            knowledge,
        }
    }
}

/// Read-only condition view consumed by the arbiter and event router.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConditionSnapshot {
    pub active: Option<Condition>,
    pub gaze_suppressed: bool,
    pub initiating_enabled: bool,
    pub responding_enabled: bool,
    pub knowledge: Option<f64>,
}

impl ConditionSnapshot {
    /// The `Robot` field written into `RobotsMove` records: the Carl label
    /// whenever Carl is set, otherwise the active condition, else "default".
    pub fn robot_label(&self) -> &'static str {
        if self.gaze_suppressed {
            Condition::Carl.label()
        } else {
            match self.active {
                Some(c) => c.label(),
                None => "default",
            }
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Game events & core event channel
// ────────────────────────────────────────────────────────────────────────────

/// A message received on the game/log channel.
#[derive(Debug, Clone, PartialEq)]
pub enum GameEvent {
    CardReveal { card_id: String, side: Side },
    CardDropped { card_id: String },
    ServerStatus { status: String, message: Option<String> },
    Unknown { event: Option<String> },
}

/// A flag mutation pushed from the control UI.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FlagChange {
    Condition(Condition),
    Initiating(bool),
    Responding(bool),
    KnowledgeHigh(bool),
    KnowledgeLow(bool),
}

/// Everything the core task consumes from its inbound channel. All three
/// transports (perception, game link, control UI) funnel into one FIFO so
/// the core stays single-threaded and lock-free.
#[derive(Debug, Clone, PartialEq)]
pub enum CoreEvent {
    Perception(PerceptionUpdate),
    Game(GameEvent),
    ManualGaze(Side),
    Flag(FlagChange),
    Shutdown,
}

// ────────────────────────────────────────────────────────────────────────────
// Outbound log messages
// ────────────────────────────────────────────────────────────────────────────

/// A structured log message bound for the experiment's logging server.
/// Immutable once constructed; serialised as-is onto the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OutboundMessage(serde_json::Value);

impl OutboundMessage {
    /// The `RobotsMove` record emitted once per accepted card reveal.
    pub fn robots_move(
        card_id: &str,
        gaze_decision: &str,
        robot: &str,
        reason: &str,
        timestamp_ms: i64,
    ) -> Self {
        Self(serde_json::json!({
            "action": "logEvent",
            "event": "RobotsMove",
            "cardId": card_id,
            "gazeDecision": gaze_decision,
            "Robot": robot,
            "reason": reason,
            "timestamp": timestamp_ms,
        }))
    }

    /// Wrap a generic `{action, event, ...}` shape from the surrounding
    /// experiment so it flows through the same queuing discipline.
    pub fn passthrough(value: serde_json::Value) -> Self {
        Self(value)
    }

    pub fn to_wire(&self) -> String {
        self.0.to_string()
    }

    pub fn value(&self) -> &serde_json::Value {
        &self.0
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Status summary
// ────────────────────────────────────────────────────────────────────────────

/// Per-tick status snapshot streamed to the renderer/control UI.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusSummary {
    pub condition: Option<Condition>,
    pub behavior: Option<String>,
    pub phase: Option<String>,
    pub initiating_enabled: bool,
    pub responding_enabled: bool,
    pub knowledge: Option<f64>,
    pub user_present: bool,
    pub face_count: u8,
    pub head_direction: HeadDirection,
    pub gaze: GazeTarget,
}

impl StatusSummary {
    /// Compact single-line rendering for consoles and status bars.
    pub fn render(&self) -> String {
        let cond = match self.condition {
            Some(c) => c.to_string(),
            None => "None".to_string(),
        };
        let behav = match (&self.behavior, &self.phase) {
            (Some(b), Some(p)) => format!("{b} ({p})"),
            (Some(b), None) => b.clone(),
            (None, _) => {
                if self.user_present {
                    "Idle (User)".to_string()
                } else {
                    "Idle".to_string()
                }
            }
        };
        let knowledge = match self.knowledge {
            Some(k) => format!("K:{:.0}%", k * 100.0),
            None => "K:---".to_string(),
        };
        format!(
            "Cond: {cond} | Behav: {behav} | IJA:{} RJA:{} {knowledge} | User:{} Faces:{} Head:{}",
            if self.initiating_enabled { "ON" } else { "OFF" },
            if self.responding_enabled { "ON" } else { "OFF" },
            if self.user_present { "Y" } else { "N" },
            self.face_count,
            self.head_direction,
        )
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Errors
// ────────────────────────────────────────────────────────────────────────────

/// Global error type spanning transport, protocol, and channel faults.
/// Every failure is local and non-fatal; nothing in this system terminates
/// the process.
#[derive(Error, Debug)]
pub enum GcsError {
    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("transport error: {0}")]
    Transport(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn head_direction_parses_verbose_and_bare_forms() {
        assert_eq!(HeadDirection::parse("Looking Left"), HeadDirection::Left);
        assert_eq!(HeadDirection::parse("Looking Right"), HeadDirection::Right);
        assert_eq!(HeadDirection::parse("left"), HeadDirection::Left);
        assert_eq!(HeadDirection::parse("RIGHT"), HeadDirection::Right);
        assert_eq!(HeadDirection::parse("center"), HeadDirection::Center);
        assert_eq!(HeadDirection::parse("none"), HeadDirection::None);
        assert_eq!(HeadDirection::parse("garbage"), HeadDirection::None);
    }

    #[test]
    fn head_direction_side_is_lateral_only() {
        assert_eq!(HeadDirection::Left.side(), Some(Side::Left));
        assert_eq!(HeadDirection::Right.side(), Some(Side::Right));
        assert_eq!(HeadDirection::Center.side(), None);
        assert_eq!(HeadDirection::None.side(), None);
    }

    #[test]
    fn side_flip_is_involutive() {
        assert_eq!(Side::Left.flip(), Side::Right);
        assert_eq!(Side::Right.flip().flip(), Side::Right);
    }

    #[test]
    fn activate_ryan_normalises_dependent_flags() {
        let mut flags = ConditionFlags::default();
        flags.activate(Condition::Ryan);
        assert!(flags.ryan && !flags.ivan && !flags.carl);
        assert!(flags.initiating_enabled);
        assert!(!flags.responding_enabled);
        assert!(flags.knowledge_high && !flags.knowledge_low);
    }

    #[test]
    fn activate_ivan_selects_low_knowledge() {
        let mut flags = ConditionFlags::default();
        flags.activate(Condition::Ivan);
        assert!(flags.initiating_enabled);
        assert!(flags.knowledge_low && !flags.knowledge_high);
    }

    #[test]
    fn activate_carl_disables_all_automatic_gaze() {
        let mut flags = ConditionFlags::default();
        flags.activate(Condition::Ryan);
        flags.activate(Condition::Carl);
        assert!(flags.carl && !flags.ryan);
        assert!(!flags.initiating_enabled);
        assert!(!flags.responding_enabled);
        assert!(!flags.knowledge_high && !flags.knowledge_low);
    }

    #[test]
    fn knowledge_toggles_are_mutually_exclusive() {
        let mut flags = ConditionFlags::default();
        flags.set_knowledge_high(true);
        flags.set_knowledge_low(true);
        assert!(flags.knowledge_low && !flags.knowledge_high);
        flags.set_knowledge_high(true);
        assert!(flags.knowledge_high && !flags.knowledge_low);
    }

    #[test]
    fn knowledge_toggles_blocked_under_carl() {
        let mut flags = ConditionFlags::default();
        flags.activate(Condition::Carl);
        flags.set_knowledge_high(true);
        assert!(!flags.knowledge_high);
        flags.set_initiating(true);
        assert!(!flags.initiating_enabled);
    }

    #[test]
    fn snapshot_knowledge_maps_to_factors() {
        let mut flags = ConditionFlags::default();
        flags.set_knowledge_high(true);
        assert_eq!(flags.snapshot().knowledge, Some(KNOWLEDGE_HIGH));
        flags.set_knowledge_low(true);
        assert_eq!(flags.snapshot().knowledge, Some(KNOWLEDGE_LOW));
    }

    #[test]
    fn snapshot_tolerates_multiple_true_conditions() {
        // Exclusivity is an external invariant; when it is violated the
        // snapshot still reports gaze suppression from the Carl flag.
        let flags = ConditionFlags {
            ryan: true,
            carl: true,
            ..Default::default()
        };
        let snap = flags.snapshot();
        assert_eq!(snap.active, Some(Condition::Ryan));
        assert!(snap.gaze_suppressed);
        assert_eq!(snap.robot_label(), "Carl condition");
    }

    #[test]
    fn robot_label_defaults_without_condition() {
        let snap = ConditionFlags::default().snapshot();
        assert_eq!(snap.robot_label(), "default");
    }

    #[test]
    fn robots_move_serialises_expected_shape() {
        let msg = OutboundMessage::robots_move("card-7", "left", "Ryan condition", "", 1234);
        let v = msg.value();
        assert_eq!(v["action"], "logEvent");
        assert_eq!(v["event"], "RobotsMove");
        assert_eq!(v["cardId"], "card-7");
        assert_eq!(v["gazeDecision"], "left");
        assert_eq!(v["Robot"], "Ryan condition");
        assert_eq!(v["timestamp"], 1234);
    }

    #[test]
    fn outbound_message_wire_roundtrip() {
        let msg = OutboundMessage::robots_move("c1", "none", "default", "Initiating JA toggle off", 5);
        let back: OutboundMessage = serde_json::from_str(&msg.to_wire()).unwrap();
        assert_eq!(back, msg);
    }

    #[test]
    fn status_summary_renders_compact_line() {
        let status = StatusSummary {
            condition: Some(Condition::Ryan),
            behavior: Some("MutualGaze".to_string()),
            phase: Some("Averting".to_string()),
            initiating_enabled: true,
            responding_enabled: false,
            knowledge: Some(KNOWLEDGE_HIGH),
            user_present: true,
            face_count: 2,
            head_direction: HeadDirection::Left,
            gaze: GazeTarget::center(),
        };
        let line = status.render();
        assert!(line.contains("Cond: Ryan"));
        assert!(line.contains("MutualGaze (Averting)"));
        assert!(line.contains("IJA:ON RJA:OFF K:80%"));
        assert!(line.contains("User:Y Faces:2 Head:Left"));
    }

    #[test]
    fn status_summary_idle_rendering() {
        let status = StatusSummary {
            condition: None,
            behavior: None,
            phase: None,
            initiating_enabled: false,
            responding_enabled: false,
            knowledge: None,
            user_present: false,
            face_count: 0,
            head_direction: HeadDirection::None,
            gaze: GazeTarget::center(),
        };
        let line = status.render();
        assert!(line.contains("Behav: Idle |"));
        assert!(line.contains("K:---"));
    }

    #[test]
    fn gaze_target_at_clamps_to_unit_square() {
        let t = GazeTarget::at(-0.5, 1.5);
        assert_eq!(t.x, 0.0);
        assert_eq!(t.y, 1.0);
    }

    #[test]
    fn gcs_error_display() {
        let err = GcsError::Transport("socket closed".to_string());
        assert!(err.to_string().contains("transport error"));
    }
}
