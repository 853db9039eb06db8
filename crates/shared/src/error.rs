use serde::{Deserialize, Serialize};

/// Error body returned by the backend on non-2xx responses.
///
/// The backend does not commit to a schema: most failures carry a
/// `{"detail": ...}` object where `detail` is either a string or a list of
/// validation entries, but plain-text bodies happen too.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ErrorBody {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<serde_json::Value>,
}

/// Longest body excerpt kept in a user-facing message.
const MAX_SUMMARY_CHARS: usize = 200;

impl ErrorBody {
    /// Reduces a raw response body to one human-readable line.
    ///
    /// Returns `None` when the body carries nothing worth showing.
    pub fn summarize(raw: &str) -> Option<String> {
        let raw = raw.trim();
        if raw.is_empty() {
            return None;
        }

        let text = match serde_json::from_str::<ErrorBody>(raw) {
            Ok(ErrorBody {
                detail: Some(serde_json::Value::String(detail)),
            }) => detail,
            Ok(ErrorBody {
                detail: Some(serde_json::Value::Array(entries)),
            }) => entries
                .iter()
                .filter_map(|entry| entry.get("msg").and_then(|msg| msg.as_str()))
                .collect::<Vec<_>>()
                .join("; "),
            Ok(ErrorBody {
                detail: Some(other),
            }) => other.to_string(),
            _ => raw.to_string(),
        };

        let text = text.trim();
        if text.is_empty() {
            return None;
        }
        Some(text.chars().take(MAX_SUMMARY_CHARS).collect())
    }
}
