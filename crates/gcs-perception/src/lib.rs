//! `gcs-perception` – Social perception layer.
//!
//! Turns raw face-detection frames from the vision pipeline into the
//! normalised world model the gaze arbiter reasons over.
//!
//! # Modules
//!
//! - [`context`] – [`PerceptionContext`][context::PerceptionContext]: the
//!   mutable snapshot of who is in front of the robot, overwritten wholesale
//!   with each update.
//! - [`wire`] – decoding of the `faceDetection` message shape, including the
//!   protocol defaults applied when fields are absent.

pub mod context;
pub mod wire;
