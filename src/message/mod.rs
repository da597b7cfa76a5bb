//! # Notification Messages
//!
//! Turns raw broker payloads into [`Message`] values the renderer can draw.
//!
//! Publishers either send plain UTF-8 text or a small JSON envelope:
//!
//! ```text
//! {"message": "Door open", "priority": "high"}
//! ```
//!
//! Decoding never fails from the caller's point of view. Anything that is not a
//! valid envelope is shown verbatim with [`Priority::Default`]. An envelope with
//! an unrecognised priority keeps its text and falls back to the default priority.

pub mod decoder;

pub use decoder::{decode, DecodeError, Message, Priority};
