//! `gcs-middleware` – Transport layer.
//!
//! Three independent links, each on its own task, each talking to the core
//! only through channels:
//!
//! - [`perception_link`] – outbound client to the vision pipeline's
//!   WebSocket; decodes `faceDetection` frames into core events.
//! - [`game_link`] – outbound client to the experiment's logging server;
//!   bidirectional. Outgoing log records survive outages in a FIFO queue,
//!   incoming game events (`cardReveal`, `cardDropped`) become core events.
//! - [`status_server`] – a small WebSocket server for the renderer and the
//!   experimenter console: streams per-tick status out, accepts manual
//!   gaze and flag commands in.
//!
//! All links reconnect with exponential backoff ([`backoff`]); a dead
//! socket never takes the behavior loop down with it.

pub mod backoff;
pub mod game_link;
pub mod perception_link;
pub mod status_server;
