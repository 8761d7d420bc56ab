//! Parser configuration

use serde::{Deserialize, Serialize};

/// Options controlling how a payload is decoded.
///
/// Deserializable so an embedding service can keep it next to its own
/// settings; every key is optional.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParserConfig {
    /// Charset used for text parts that declare none, either in their own
    /// `Content-Type` or in the `charsets` part
    pub default_charset: String,

    /// Treat a mismatch between the `attachments` count and the attachment
    /// parts actually found as a decoding error
    pub strict_attachment_count: bool,

    /// Reject streams larger than this many bytes
    pub max_payload_bytes: Option<usize>,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            default_charset: "UTF-8".to_string(),
            strict_attachment_count: true,
            max_payload_bytes: None,
        }
    }
}
