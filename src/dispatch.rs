//! Routing of named parts to fields of the inbound email

use crate::config::ParserConfig;
use crate::error::{ParseError, Result};
use crate::headers::split_headers;
use crate::part::PartDisposition;
use crate::types::{EmailAddress, Envelope, InboundAttachment, InboundEmail};
use charset::Charset;
use regex::Regex;
use serde::Deserialize;
use std::collections::HashMap;
use tracing::{debug, warn};

static ATTACHMENT_PART: std::sync::LazyLock<Regex> =
    std::sync::LazyLock::new(|| Regex::new(r"^attachment\d+$").unwrap());

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AddressField {
    From,
    To,
    Cc,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TextField {
    Subject,
    Html,
    Text,
    Dkim,
    Spf,
    SpamScore,
    SpamReport,
    SenderIp,
    RawEmail,
}

/// How a part's value is decoded
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FieldRule {
    Envelope,
    Addresses(AddressField),
    Text(TextField),
    Charsets,
    Headers,
    AttachmentCount,
    AttachmentInfo,
    ContentIds,
}

/// Part names known to the dispatcher. Anything not listed here and not
/// an attachment is ignored.
const FIELD_RULES: &[(&str, FieldRule)] = &[
    ("envelope", FieldRule::Envelope),
    ("from", FieldRule::Addresses(AddressField::From)),
    ("to", FieldRule::Addresses(AddressField::To)),
    ("cc", FieldRule::Addresses(AddressField::Cc)),
    ("subject", FieldRule::Text(TextField::Subject)),
    ("html", FieldRule::Text(TextField::Html)),
    ("text", FieldRule::Text(TextField::Text)),
    ("dkim", FieldRule::Text(TextField::Dkim)),
    ("SPF", FieldRule::Text(TextField::Spf)),
    ("spam_score", FieldRule::Text(TextField::SpamScore)),
    ("spam_report", FieldRule::Text(TextField::SpamReport)),
    ("sender_ip", FieldRule::Text(TextField::SenderIp)),
    ("email", FieldRule::Text(TextField::RawEmail)),
    ("charsets", FieldRule::Charsets),
    ("headers", FieldRule::Headers),
    ("attachments", FieldRule::AttachmentCount),
    ("attachment-info", FieldRule::AttachmentInfo),
    ("content-ids", FieldRule::ContentIds),
];

fn rule_for(name: &str) -> Option<FieldRule> {
    FIELD_RULES
        .iter()
        .find(|(known, _)| known.eq_ignore_ascii_case(name))
        .map(|&(_, rule)| rule)
}

/// Per-attachment metadata from the `attachment-info` part
#[derive(Debug, Default, Deserialize)]
struct AttachmentInfo {
    filename: Option<String>,
    name: Option<String>,
    #[serde(rename = "type")]
    content_type: Option<String>,
    #[serde(rename = "content-id")]
    content_id: Option<String>,
}

/// Accumulates decoded parts and assembles the final [`InboundEmail`].
///
/// The `charsets` part must be dispatched before any text part for its
/// declarations to take effect.
pub struct FieldDispatcher<'c> {
    config: &'c ParserConfig,
    email: InboundEmail,
    from: Option<EmailAddress>,
    to: Option<Vec<EmailAddress>>,
    declared_attachments: Option<usize>,
    attachment_info: HashMap<String, AttachmentInfo>,
    content_ids: HashMap<String, String>,
}

impl<'c> FieldDispatcher<'c> {
    #[must_use]
    pub fn new(config: &'c ParserConfig) -> Self {
        Self {
            config,
            email: InboundEmail::default(),
            from: None,
            to: None,
            declared_attachments: None,
            attachment_info: HashMap::new(),
            content_ids: HashMap::new(),
        }
    }

    /// Decode one part into the email under construction
    pub fn dispatch(&mut self, part: &PartDisposition, body: &[u8]) -> Result<()> {
        if part.filename.is_some() || ATTACHMENT_PART.is_match(&part.name) {
            self.push_attachment(part, body);
            return Ok(());
        }

        let Some(rule) = rule_for(&part.name) else {
            debug!(part = %part.name, "Ignoring unknown part");
            return Ok(());
        };
        debug!(part = %part.name, ?rule, bytes = body.len(), "Dispatching part");

        let value = self.decode_text(part, body);
        match rule {
            FieldRule::Envelope => {
                let envelope: Envelope = parse_json(&part.name, &value)?;
                self.email.envelope = Some(envelope);
            }
            FieldRule::Addresses(field) => {
                let addresses = EmailAddress::parse_list(&value).ok_or_else(|| {
                    ParseError::field(&part.name, format!("Could not parse addresses: {value}"))
                })?;
                // An empty dedicated part leaves room for the envelope
                match field {
                    AddressField::From => {
                        if let Some(from) = addresses.into_iter().next() {
                            self.from = Some(from);
                        }
                    }
                    AddressField::To if !addresses.is_empty() => self.to = Some(addresses),
                    AddressField::To => {}
                    AddressField::Cc => self.email.cc = addresses,
                }
            }
            FieldRule::Text(field) => self.set_text(field, value),
            FieldRule::Charsets => {
                self.email.charsets = parse_json(&part.name, &value)?;
            }
            FieldRule::Headers => self.email.headers = split_headers(&value),
            FieldRule::AttachmentCount => {
                let count = value.trim().parse::<usize>().map_err(|e| {
                    ParseError::field(&part.name, format!("Invalid attachment count {value:?}: {e}"))
                })?;
                self.declared_attachments = Some(count);
            }
            FieldRule::AttachmentInfo => {
                self.attachment_info = parse_json(&part.name, &value)?;
            }
            FieldRule::ContentIds => {
                let ids: HashMap<String, String> = parse_json(&part.name, &value)?;
                // Stored as part name -> content id
                self.content_ids = ids.into_iter().map(|(id, part)| (part, id)).collect();
            }
        }

        Ok(())
    }

    fn set_text(&mut self, field: TextField, value: String) {
        let email = &mut self.email;
        match field {
            TextField::Subject => email.subject = value,
            TextField::Html => email.html = Some(value),
            TextField::Text => email.text = Some(value),
            TextField::Dkim => email.dkim = value,
            TextField::Spf => email.spf = value,
            TextField::SpamScore => email.spam_score = Some(value),
            TextField::SpamReport => email.spam_report = Some(value),
            TextField::SenderIp => email.sender_ip = value,
            TextField::RawEmail => email.raw_email = Some(value),
        }
    }

    fn push_attachment(&mut self, part: &PartDisposition, body: &[u8]) {
        debug!(
            part = %part.name,
            filename = ?part.filename,
            size = body.len(),
            "Captured attachment"
        );
        self.email.attachments.push(InboundAttachment {
            part_name: part.name.clone(),
            filename: part.filename.clone().unwrap_or_default(),
            content_type: part.content_type.clone().unwrap_or_default(),
            content_id: None,
            data: body.to_vec(),
        });
    }

    /// Charset from the `charsets` part, matching part names the same way
    /// the dispatch table does
    fn declared_charset(&self, name: &str) -> Option<&str> {
        let charsets = &self.email.charsets;
        charsets
            .get(name)
            .or_else(|| {
                charsets
                    .iter()
                    .find(|(key, _)| key.eq_ignore_ascii_case(name))
                    .map(|(_, charset)| charset)
            })
            .map(String::as_str)
    }

    /// Decode a text part with its own charset, else the one declared in
    /// `charsets`, else the configured default
    fn decode_text(&self, part: &PartDisposition, body: &[u8]) -> String {
        let label = part
            .charset
            .as_deref()
            .or_else(|| self.declared_charset(&part.name))
            .unwrap_or(&self.config.default_charset);

        if let Some(charset) = Charset::for_label_no_replacement(label.as_bytes()) {
            let (decoded, _malformed) = charset.decode_without_bom_handling(body);
            decoded.into_owned()
        } else {
            warn!(part = %part.name, charset = label, "Unsupported charset, decoding as UTF-8");
            String::from_utf8_lossy(body).into_owned()
        }
    }

    /// Resolve envelope fallbacks and attachment metadata, then check the
    /// declared attachment count
    pub fn finish(mut self) -> Result<InboundEmail> {
        let envelope = self.email.envelope.clone().unwrap_or_default();

        self.email.from = match self.from {
            Some(from) => Some(from),
            None => envelope
                .from
                .as_deref()
                .filter(|f| !f.trim().is_empty())
                .map(envelope_address)
                .transpose()?,
        };

        self.email.to = match self.to {
            Some(to) => to,
            None => envelope
                .to
                .iter()
                .map(|addr| envelope_address(addr))
                .collect::<Result<_>>()?,
        };

        for attachment in &mut self.email.attachments {
            let info = self.attachment_info.remove(&attachment.part_name).unwrap_or_default();
            if attachment.filename.is_empty() {
                attachment.filename = info
                    .filename
                    .or(info.name)
                    .unwrap_or_else(|| attachment.part_name.clone());
            }
            if attachment.content_type.is_empty() {
                attachment.content_type = info.content_type.unwrap_or_default();
            }
            attachment.content_id = info
                .content_id
                .or_else(|| self.content_ids.remove(&attachment.part_name));
        }

        if let Some(declared) = self.declared_attachments {
            let found = self.email.attachments.len();
            if declared != found {
                if self.config.strict_attachment_count {
                    return Err(ParseError::field(
                        "attachments",
                        format!("Declared {declared} attachments but found {found}"),
                    ));
                }
                warn!(declared, found, "Attachment count mismatch");
            }
        }

        debug!(
            from = ?self.email.from.as_ref().map(|f| f.email.as_str()),
            to = self.email.to.len(),
            headers = self.email.headers.len(),
            attachments = self.email.attachments.len(),
            "Parsed inbound email"
        );

        Ok(self.email)
    }
}

fn envelope_address(addr: &str) -> Result<EmailAddress> {
    EmailAddress::parse(addr)
        .ok_or_else(|| ParseError::field("envelope", format!("Could not parse address: {addr}")))
}

fn parse_json<T: serde::de::DeserializeOwned>(field: &str, value: &str) -> Result<T> {
    serde_json::from_str(value).map_err(|e| ParseError::field(field, e.to_string()))
}
