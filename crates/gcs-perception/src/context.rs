//! Perception context.
//!
//! Holds the most recent fused perception sample. The vision pipeline is the
//! single source of truth for user presence, so every update replaces the
//! whole snapshot; stale fields from a previous frame never survive into the
//! next arbitration step.

use gcs_types::{FacePoint, HeadDirection, PerceptionUpdate};

/// The robot's current view of the people in front of it.
///
/// Construct with [`PerceptionContext::default`], feed frames via
/// [`PerceptionContext::apply_update`], and read the accessors from the
/// arbitration loop.
#[derive(Debug, Clone, Copy, Default)]
pub struct PerceptionContext {
    user_in_front: bool,
    face: Option<FacePoint>,
    second_face: Option<FacePoint>,
    head_direction: HeadDirection,
}

impl PerceptionContext {
    /// Overwrite the context with a fresh sample.
    pub fn apply_update(&mut self, update: PerceptionUpdate) {
        self.user_in_front = update.user_in_front;
        self.face = update.user_in_front.then_some(update.face);
        self.second_face = update.second_face;
        self.head_direction = update.head_direction;
    }

    pub fn user_in_front(&self) -> bool {
        self.user_in_front
    }

    /// Primary face position, present only while a user is in front.
    pub fn face(&self) -> Option<FacePoint> {
        self.face
    }

    pub fn second_face(&self) -> Option<FacePoint> {
        self.second_face
    }

    pub fn head_direction(&self) -> HeadDirection {
        self.head_direction
    }

    pub fn face_count(&self) -> u8 {
        self.face.is_some() as u8 + self.second_face.is_some() as u8
    }
}
