//! Turns a detection response into a display message and a primary emotion.

use crate::detect::{DetectEnvelope, EmotionsField};

pub const INVALID_FORMAT_MESSAGE: &str = "Invalid emotion data format received.";
pub const NO_EMOTIONS_MESSAGE: &str = "No emotions detected.";
const DETECTED_PREFIX: &str = "Detected Emotions: ";

/// Result of interpreting one detection response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Interpretation {
    /// Message retained for display
    pub message: String,
    /// First usable label, used to pick the spoken utterance
    pub primary: Option<String>,
}

/// Map the service response to a display message and primary emotion.
///
/// Labels keep their response order; unusable elements are dropped. The
/// first surviving label is primary regardless of how many were detected.
pub fn interpret(envelope: &DetectEnvelope) -> Interpretation {
    let items = match &envelope.emotions {
        EmotionsField::List(items) => items,
        EmotionsField::Other(_) => {
            return Interpretation {
                message: INVALID_FORMAT_MESSAGE.to_string(),
                primary: None,
            };
        }
    };

    let labels: Vec<&str> = items.iter().filter_map(|e| e.label()).collect();

    if labels.is_empty() {
        return Interpretation {
            message: NO_EMOTIONS_MESSAGE.to_string(),
            primary: None,
        };
    }

    Interpretation {
        message: format!("{}{}", DETECTED_PREFIX, labels.join(", ")),
        primary: Some(labels[0].to_string()),
    }
}
