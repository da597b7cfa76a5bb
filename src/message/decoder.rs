use crate::color::Rgb;
use serde::Deserialize;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use tracing::{debug, warn};

/// Priority tag carried by a notification, selects the text colour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Priority {
    High,
    Medium,
    Low,
    #[default]
    Default,
}

impl Priority {
    /// Text colour used on the matrix for this priority.
    pub const fn color(self) -> Rgb {
        match self {
            Priority::High => Rgb::RED,
            Priority::Medium => Rgb::YELLOW,
            Priority::Low => Rgb::GREEN,
            Priority::Default => Rgb::BLUE,
        }
    }
}

impl FromStr for Priority {
    type Err = DecodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "high" => Ok(Priority::High),
            "medium" => Ok(Priority::Medium),
            "low" => Ok(Priority::Low),
            "default" => Ok(Priority::Default),
            other => Err(DecodeError::UnknownPriority(other.to_string())),
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Priority::High => write!(f, "high"),
            Priority::Medium => write!(f, "medium"),
            Priority::Low => write!(f, "low"),
            Priority::Default => write!(f, "default"),
        }
    }
}

/// A decoded notification. Immutable once built; the next one replaces it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    text: String,
    priority: Priority,
}

impl Message {
    pub fn new(text: impl Into<String>, priority: Priority) -> Self {
        Self {
            text: text.into(),
            priority,
        }
    }

    /// Raw text shown as-is with the default priority.
    pub fn plain(text: impl Into<String>) -> Self {
        Self::new(text, Priority::Default)
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn priority(&self) -> Priority {
        self.priority
    }

    pub fn color(&self) -> Rgb {
        self.priority.color()
    }
}

/// Reasons a payload could not be read as a structured envelope.
///
/// Never surfaced past [`decode`]; kept typed so the fallback can be logged.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("payload is not a notification envelope: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("unknown priority: {0:?}")]
    UnknownPriority(String),
}

#[derive(Debug, Deserialize)]
struct Envelope {
    message: String,
    #[serde(default)]
    priority: Option<String>,
}

/// Decodes a broker payload, falling back to plain text on any parse failure.
pub fn decode(payload: &str) -> Message {
    let envelope = match serde_json::from_str::<Envelope>(payload) {
        Ok(envelope) => envelope,
        Err(e) => {
            debug!("Treating payload as plain text: {}", DecodeError::from(e));
            return Message::plain(payload);
        }
    };

    let priority = match envelope.priority.as_deref().map(Priority::from_str) {
        None => Priority::Default,
        Some(Ok(priority)) => priority,
        Some(Err(e)) => {
            warn!("{}, using default priority", e);
            Priority::Default
        }
    };

    Message::new(envelope.message, priority)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_with_high_priority_is_red() {
        let msg = decode(r#"{"message":"hi","priority":"high"}"#);
        assert_eq!(msg, Message::new("hi", Priority::High));
        assert_eq!(msg.color(), Rgb::RED);
    }

    #[test]
    fn every_known_priority_maps_to_its_colour() {
        for (tag, priority, color) in [
            ("medium", Priority::Medium, Rgb::YELLOW),
            ("low", Priority::Low, Rgb::GREEN),
            ("default", Priority::Default, Rgb::BLUE),
        ] {
            let msg = decode(&format!(r#"{{"message":"x","priority":"{tag}"}}"#));
            assert_eq!(msg.priority(), priority);
            assert_eq!(msg.color(), color);
        }
    }

    #[test]
    fn plain_text_falls_back_to_default_priority() {
        let msg = decode("not json");
        assert_eq!(msg, Message::plain("not json"));
        assert_eq!(msg.color(), Rgb::BLUE);
    }

    #[test]
    fn missing_priority_is_default() {
        let msg = decode(r#"{"message":"quiet"}"#);
        assert_eq!(msg, Message::new("quiet", Priority::Default));
    }

    #[test]
    fn unknown_priority_keeps_text() {
        let msg = decode(r#"{"message":"hi","priority":"unknown"}"#);
        assert_eq!(msg, Message::new("hi", Priority::Default));
    }

    #[test]
    fn envelope_without_message_field_is_shown_verbatim() {
        let payload = r#"{"text":"hi","priority":"high"}"#;
        assert_eq!(decode(payload), Message::plain(payload));
    }

    #[test]
    fn non_string_message_is_shown_verbatim() {
        let payload = r#"{"message":42}"#;
        assert_eq!(decode(payload), Message::plain(payload));
    }

    #[test]
    fn bare_json_scalars_are_plain_text() {
        assert_eq!(decode("42"), Message::plain("42"));
        assert_eq!(decode(r#""quoted""#), Message::plain(r#""quoted""#));
    }

    #[test]
    fn priority_parsing_is_case_sensitive() {
        assert!(matches!(
            "HIGH".parse::<Priority>(),
            Err(DecodeError::UnknownPriority(_))
        ));
    }
}
