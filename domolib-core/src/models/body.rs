//! Response body representation.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A response body as received from the API.
///
/// JSON bodies are parsed; anything else is kept as text when it is valid
/// UTF-8 and as raw bytes otherwise.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum ResponseBody {
    /// No body.
    #[default]
    Empty,
    /// Parsed JSON.
    Json(Value),
    /// UTF-8 text that is not JSON (CSV exports, HTML error pages).
    Text(String),
    /// Binary payload.
    Bytes(Vec<u8>),
}

impl ResponseBody {
    /// Classifies raw bytes using the response content type.
    ///
    /// A JSON content type that fails to parse keeps the raw text so the
    /// caller can still see what the server sent.
    pub fn from_bytes(bytes: &[u8], content_type: Option<&str>) -> Self {
        if bytes.is_empty() {
            return Self::Empty;
        }

        let content_type = content_type.map(str::to_ascii_lowercase);
        let try_json = match content_type.as_deref() {
            Some(ct) => ct.contains("json"),
            None => true,
        };

        if try_json {
            if let Ok(value) = serde_json::from_slice::<Value>(bytes) {
                return Self::Json(value);
            }
        }

        match std::str::from_utf8(bytes) {
            Ok(text) => Self::Text(text.to_string()),
            Err(_) => Self::Bytes(bytes.to_vec()),
        }
    }

    /// Returns the JSON value, if this is a JSON body.
    pub fn as_json(&self) -> Option<&Value> {
        match self {
            Self::Json(value) => Some(value),
            _ => None,
        }
    }

    /// Returns the text, if this is a text body.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            _ => None,
        }
    }

    /// Returns true if there is no body.
    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }

    /// Renders at most `max_chars` characters of the body for log output.
    pub fn preview(&self, max_chars: usize) -> String {
        let full = match self {
            Self::Empty => return String::new(),
            Self::Json(value) => value.to_string(),
            Self::Text(text) => text.clone(),
            Self::Bytes(bytes) => return format!("<{} bytes>", bytes.len()),
        };

        if full.chars().count() <= max_chars {
            full
        } else {
            let truncated: String = full.chars().take(max_chars).collect();
            format!("{truncated}...")
        }
    }
}
