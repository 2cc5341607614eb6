//! Live Update Message Protocol
//!
//! JSON messages pushed from the preview server to browser tabs.
//!
//! # Message Types
//!
//! ```text
//! { "type": "update", "html": "...", "css": "..." }   re-render
//! { "command": "goto", "slide": 3 }                   navigate (number or string)
//! { "command": "find", "string": "intro" }            navigate to first match
//! { "command": "close_preview" }                      close the tab
//! ```
//!
//! Consumers drop shapes they do not know; only unparseable text is an error.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::render::RenderResult;

/// Message sent over the live-update socket
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum UpdateMessage {
    Render(RenderUpdate),
    Command(Command),
}

/// Re-render payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum RenderUpdate {
    Update { html: String, css: String },
}

/// Navigation command
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum Command {
    /// Scroll to a 1-based slide
    Goto { slide: SlideRef },
    /// Scroll to the first slide containing `string`
    Find { string: String },
    /// Close the preview tab
    ClosePreview,
}

/// Slide reference as sent by operators: `3` or `"3"`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SlideRef {
    Number(serde_json::Number),
    Text(String),
}

impl SlideRef {
    /// Slide number, parsed like a leading integer (`"3rd"` is 3).
    pub fn number(&self) -> Option<i64> {
        match self {
            Self::Number(n) => n
                .as_i64()
                .or_else(|| n.as_f64().filter(|f| f.is_finite()).map(|f| f.trunc() as i64)),
            Self::Text(s) => leading_int(s),
        }
    }

    fn is_truthy(&self) -> bool {
        match self {
            Self::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
            Self::Text(s) => !s.is_empty(),
        }
    }
}

impl From<u32> for SlideRef {
    fn from(n: u32) -> Self {
        Self::Number(n.into())
    }
}

/// Parse an optional sign and digits after leading whitespace.
pub(crate) fn leading_int(s: &str) -> Option<i64> {
    let s = s.trim_start();
    let (negative, digits) = match s.as_bytes().first() {
        Some(b'-') => (true, &s[1..]),
        Some(b'+') => (false, &s[1..]),
        _ => (false, s),
    };
    let end = digits
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(digits.len());
    let value: i64 = digits[..end].parse().ok()?;
    Some(if negative { -value } else { value })
}

impl UpdateMessage {
    /// Create an update message from a render
    pub fn update(result: &RenderResult) -> Self {
        Self::Render(RenderUpdate::Update {
            html: result.html.clone(),
            css: result.css.clone(),
        })
    }

    pub fn goto(slide: impl Into<SlideRef>) -> Self {
        Self::Command(Command::Goto {
            slide: slide.into(),
        })
    }

    pub fn find(string: impl Into<String>) -> Self {
        Self::Command(Command::Find {
            string: string.into(),
        })
    }

    /// Serialize to JSON string
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string())
    }
}

// =============================================================================
// Decoding
// =============================================================================

/// Decoded consumer-side view of a message.
#[derive(Debug, Clone, PartialEq)]
pub enum Decoded {
    Update { html: String, css: String },
    Command(Command),
    /// Valid JSON of a shape this consumer does not act on.
    Ignored,
}

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("malformed message: {0}")]
    Json(#[from] serde_json::Error),

    #[error("update message without string html/css")]
    MalformedUpdate,
}

/// Decode a pushed message the way browser tabs read it.
///
/// `goto` without a truthy `slide` and `find` without a non-empty `string`
/// are ignored.
pub fn decode(text: &str) -> Result<Decoded, DecodeError> {
    let value: Value = serde_json::from_str(text)?;

    if value.get("type").and_then(Value::as_str) == Some("update") {
        let html = value.get("html").and_then(Value::as_str);
        let css = value.get("css").and_then(Value::as_str);
        return match (html, css) {
            (Some(html), Some(css)) => Ok(Decoded::Update {
                html: html.to_string(),
                css: css.to_string(),
            }),
            _ => Err(DecodeError::MalformedUpdate),
        };
    }

    let decoded = match value.get("command").and_then(Value::as_str) {
        Some("goto") => value
            .get("slide")
            .and_then(|s| SlideRef::deserialize(s).ok())
            .filter(SlideRef::is_truthy)
            .map(|slide| Decoded::Command(Command::Goto { slide })),
        Some("find") => value
            .get("string")
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .map(|s| {
                Decoded::Command(Command::Find {
                    string: s.to_string(),
                })
            }),
        Some("close_preview") => Some(Decoded::Command(Command::ClosePreview)),
        _ => None,
    };

    Ok(decoded.unwrap_or(Decoded::Ignored))
}
