//! Inbound-parse webhook payload parser

use crate::config::ParserConfig;
use crate::dispatch::FieldDispatcher;
use crate::error::{ParseError, Result};
use crate::multipart::{boundary_from_content_type, infer_boundary, split_parts};
use crate::part::PartDisposition;
use crate::types::InboundEmail;
use std::io::Read;
use tracing::{debug, warn};

/// Parse a webhook body read from `reader` with the default configuration.
///
/// `content_type` is the `Content-Type` of the webhook request; when it is
/// absent or has no boundary, the boundary is taken from the first line of
/// the body.
pub fn parse_inbound_email<R: Read>(reader: R, content_type: Option<&str>) -> Result<InboundEmail> {
    InboundParser::default().parse(reader, content_type)
}

/// Parse an already buffered webhook body with the default configuration
pub fn parse_inbound_email_bytes(body: &[u8], content_type: Option<&str>) -> Result<InboundEmail> {
    InboundParser::default().parse_bytes(body, content_type)
}

/// Parser holding a [`ParserConfig`]; cheap to share between threads
#[derive(Debug, Clone, Default)]
pub struct InboundParser {
    config: ParserConfig,
}

impl InboundParser {
    #[must_use]
    pub const fn new(config: ParserConfig) -> Self {
        Self { config }
    }

    #[must_use]
    pub const fn config(&self) -> &ParserConfig {
        &self.config
    }

    /// Read the whole stream, then parse it
    pub fn parse<R: Read>(&self, reader: R, content_type: Option<&str>) -> Result<InboundEmail> {
        let mut body = Vec::new();
        match self.config.max_payload_bytes {
            Some(limit) => {
                let limit_plus_one = u64::try_from(limit).unwrap_or(u64::MAX).saturating_add(1);
                reader.take(limit_plus_one).read_to_end(&mut body)?;
                if body.len() > limit {
                    return Err(ParseError::MalformedPayload(format!(
                        "payload exceeds {limit} bytes"
                    )));
                }
            }
            None => {
                let mut reader = reader;
                reader.read_to_end(&mut body)?;
            }
        }

        self.parse_bytes(&body, content_type)
    }

    pub fn parse_bytes(&self, body: &[u8], content_type: Option<&str>) -> Result<InboundEmail> {
        let boundary = content_type
            .and_then(boundary_from_content_type)
            .or_else(|| infer_boundary(body))
            .ok_or_else(|| {
                ParseError::MalformedPayload("no multipart boundary found".to_string())
            })?;
        debug!(boundary = %boundary, bytes = body.len(), "Parsing inbound payload");

        let raw_parts = split_parts(body, &boundary)?;

        let mut parts: Vec<_> = raw_parts
            .iter()
            .enumerate()
            .filter_map(|(index, raw)| {
                let disposition = PartDisposition::from_raw(raw);
                if disposition.is_none() {
                    warn!(index, "Skipping part without a usable Content-Disposition name");
                }
                disposition.map(|d| (d, raw.body))
            })
            .collect();

        // Charset declarations must be known before any text part is decoded
        parts.sort_by_key(|(disposition, _)| !disposition.is_charsets());

        let mut dispatcher = FieldDispatcher::new(&self.config);
        for (disposition, body) in &parts {
            dispatcher.dispatch(disposition, body)?;
        }
        dispatcher.finish()
    }
}
