//! `gcs-runtime` – Orchestration core.
//!
//! Owns all mutable behavior state and steps it on a 50 ms tick. Everything
//! here runs on a single task; the transports talk to the core exclusively
//! through channels, so no state in this crate is shared or locked.
//!
//! # Modules
//!
//! - [`arbiter`] – [`Arbiter`][arbiter::Arbiter]: per-tick behavior
//!   selection, priority ordering, and the responding-gaze cooldown.
//! - [`router`] – [`EventRouter`][router::EventRouter]: game event handling,
//!   card dedupe, the knowledge noise model, and condition reassignment.
//! - [`core`] – [`GazeCore`][core::GazeCore]: the tick loop itself, delayed
//!   gaze triggers, and status fan-out.

pub mod arbiter;
pub mod core;
pub mod router;
