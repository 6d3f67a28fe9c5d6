use serde_json::Value;
use thiserror::Error;

const MAX_MESSAGE_CHARS: usize = 200;

/// Broad classes of failure. The UI reacts to each class the same way
/// regardless of which request produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The request never completed.
    Network,
    /// The server answered with a non-success status or an unusable body.
    ServerRejection,
    /// Caught on the client before any request was sent.
    Validation,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    #[error("network failure: {0}")]
    Network(String),
    #[error("server rejected request ({status}): {message}")]
    Rejected { status: u16, message: String },
    #[error("unexpected server response: {0}")]
    InvalidResponse(String),
    #[error("{0}")]
    Validation(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

impl Error {
    pub fn validation(message: impl Into<String>) -> Self {
        Error::Validation(message.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Network(_) => ErrorKind::Network,
            Error::Rejected { .. } | Error::InvalidResponse(_) => ErrorKind::ServerRejection,
            Error::Validation(_) => ErrorKind::Validation,
        }
    }

    pub fn is_validation(&self) -> bool {
        self.kind() == ErrorKind::Validation
    }

    /// Short form for the status line.
    pub fn summary(&self) -> String {
        match self {
            Error::Network(message) => format!("Network error: {message}"),
            Error::Rejected { status, message } => format!("Rejected ({status}): {message}"),
            Error::InvalidResponse(message) => format!("Bad response: {message}"),
            Error::Validation(message) => message.clone(),
        }
    }
}

/// Pulls a readable message out of a DRF-style error body.
///
/// Handles `{"error": ...}`, `{"detail": ...}`, field maps such as
/// `{"vin": ["VIN is required."]}` and bare string lists. Anything else is
/// returned trimmed and truncated.
pub fn rejection_message(body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return "no details".to_string();
    }
    let Ok(value) = serde_json::from_str::<Value>(trimmed) else {
        return truncate(trimmed);
    };
    let message = match &value {
        Value::Object(map) => {
            if let Some(message) = map.get("error").or_else(|| map.get("detail")) {
                flatten_messages(message)
            } else {
                map.iter()
                    .map(|(field, messages)| format!("{field}: {}", flatten_messages(messages)))
                    .collect::<Vec<_>>()
                    .join("; ")
            }
        }
        other => flatten_messages(other),
    };
    if message.is_empty() {
        truncate(trimmed)
    } else {
        truncate(&message)
    }
}

fn flatten_messages(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        Value::Array(items) => items
            .iter()
            .map(flatten_messages)
            .filter(|text| !text.is_empty())
            .collect::<Vec<_>>()
            .join(" "),
        Value::Object(map) => map
            .iter()
            .map(|(field, inner)| format!("{field}: {}", flatten_messages(inner)))
            .collect::<Vec<_>>()
            .join("; "),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn truncate(text: &str) -> String {
    if text.chars().count() <= MAX_MESSAGE_CHARS {
        text.to_string()
    } else {
        let mut short: String = text.chars().take(MAX_MESSAGE_CHARS).collect();
        short.push('…');
        short
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_error_key() {
        assert_eq!(
            rejection_message(r#"{"error": "Superuser cannot be deleted."}"#),
            "Superuser cannot be deleted."
        );
    }

    #[test]
    fn joins_field_errors() {
        let message = rejection_message(r#"{"vin": ["VIN is required."], "model": ["Model is required."]}"#);
        assert!(message.contains("vin: VIN is required."));
        assert!(message.contains("model: Model is required."));
    }

    #[test]
    fn falls_back_to_raw_body() {
        assert_eq!(rejection_message("<h1>Server Error</h1>"), "<h1>Server Error</h1>");
        assert_eq!(rejection_message("   "), "no details");
    }

    #[test]
    fn classifies_kinds() {
        assert_eq!(Error::Network("refused".into()).kind(), ErrorKind::Network);
        assert_eq!(
            Error::Rejected {
                status: 400,
                message: "bad".into()
            }
            .kind(),
            ErrorKind::ServerRejection
        );
        assert!(Error::validation("missing VIN").is_validation());
    }
}
