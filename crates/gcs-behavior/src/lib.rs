//! `gcs-behavior` – Gaze behavior machines.
//!
//! Each social gaze pattern is a small state machine stepped once per tick
//! by the arbiter. A machine owns its timing state; a step that returns
//! `None` means the machine has run to completion (or its precondition no
//! longer holds) and the arbiter should discard it.
//!
//! # Modules
//!
//! - [`machines`] – [`Behavior`][machines::Behavior]: the tagged union of
//!   mutual gaze, dynamic two-person gaze, and the two joint-attention
//!   variants, plus the shared phase timeline.
//! - [`cooldown`] – [`CooldownRegistry`][cooldown::CooldownRegistry]:
//!   per-behavior rate limiting keyed by monotonic fire times.

pub mod cooldown;
pub mod machines;
