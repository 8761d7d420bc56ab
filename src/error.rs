//! Error types for inbound webhook parsing

use thiserror::Error;

/// Errors that can occur while parsing an inbound-parse payload
#[derive(Error, Debug)]
pub enum ParseError {
    /// The body is not usable multipart data (no boundary, or no closing
    /// delimiter before end of stream)
    #[error("Malformed multipart payload: {0}")]
    MalformedPayload(String),

    /// A named part could not be decoded according to its field rule
    #[error("Failed to decode field {field}: {details}")]
    FieldDecoding { field: String, details: String },

    /// Reading the caller's stream failed
    #[error("Failed to read payload: {0}")]
    Io(#[from] std::io::Error),
}

impl ParseError {
    pub(crate) fn field(field: impl Into<String>, details: impl Into<String>) -> Self {
        Self::FieldDecoding {
            field: field.into(),
            details: details.into(),
        }
    }

    /// Name of the part that failed to decode, if this is a field error
    #[must_use]
    pub fn field_name(&self) -> Option<&str> {
        match self {
            Self::FieldDecoding { field, .. } => Some(field),
            _ => None,
        }
    }
}

/// Result type for inbound parsing operations
pub type Result<T> = std::result::Result<T, ParseError>;
