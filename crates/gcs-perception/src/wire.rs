//! `faceDetection` wire decoding.
//!
//! The vision pipeline pushes JSON frames shaped like:
//!
//! ```json
//! {
//!   "event": "faceDetection",
//!   "userInFront": true,
//!   "faceX": 0.42, "faceY": 0.55,
//!   "secondFaceX": 0.8, "secondFaceY": 0.4,
//!   "headDirection": "Looking Left"
//! }
//! ```
//!
//! Missing or null coordinates default to the image centre (`0.5`), a
//! missing second face decodes to no second face, and a missing head
//! direction decodes to `"none"`.

use gcs_types::{FacePoint, GcsError, HeadDirection, PerceptionUpdate};
use serde_json::Value;
use tracing::warn;

/// Decode one perception frame.
///
/// Returns `Ok(None)` for well-formed JSON that is not a `faceDetection`
/// event; those frames are ignored rather than treated as faults.
pub fn parse_face_detection(text: &str) -> Result<Option<PerceptionUpdate>, GcsError> {
    let value: Value = serde_json::from_str(text)
        .map_err(|e| GcsError::Protocol(format!("invalid perception frame: {e}")))?;

    if value.get("event").and_then(Value::as_str) != Some("faceDetection") {
        warn!(frame = %text, "ignoring non-faceDetection perception frame");
        return Ok(None);
    }

    let coord = |key: &str| value.get(key).and_then(Value::as_f64).unwrap_or(0.5);
    let second = |key: &str| value.get(key).and_then(Value::as_f64);

    let second_face = match (second("secondFaceX"), second("secondFaceY")) {
        (Some(x), Some(y)) => Some(FacePoint { x, y }),
        _ => None,
    };

    let head_direction = value
        .get("headDirection")
        .and_then(Value::as_str)
        .map(HeadDirection::parse)
        .unwrap_or(HeadDirection::None);

    Ok(Some(PerceptionUpdate {
        user_in_front: value
            .get("userInFront")
            .and_then(Value::as_bool)
            .unwrap_or(false),
        face: FacePoint {
            x: coord("faceX"),
            y: coord("faceY"),
        },
        second_face,
        head_direction,
    }))
}
