//! Core types for parsed inbound emails

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// An email delivered through the inbound-parse webhook
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InboundEmail {
    /// Sender, from the `from` part or else the envelope
    pub from: Option<EmailAddress>,

    /// Recipients, from the `to` part or else the envelope
    pub to: Vec<EmailAddress>,

    /// Carbon-copy recipients
    pub cc: Vec<EmailAddress>,

    pub subject: String,

    /// HTML rendition, if the message had one
    pub html: Option<String>,

    /// Plain text rendition, if the message had one
    pub text: Option<String>,

    /// Charset declared by the provider for each part name
    pub charsets: HashMap<String, String>,

    /// Logical headers of the original message, in order
    pub headers: Vec<InboundHeader>,

    /// DKIM verdict as reported by the provider
    pub dkim: String,

    /// SPF verdict as reported by the provider
    pub spf: String,

    pub spam_score: Option<String>,

    pub spam_report: Option<String>,

    /// IP of the client that delivered the message
    pub sender_ip: String,

    /// SMTP envelope as used for delivery
    pub envelope: Option<Envelope>,

    pub attachments: Vec<InboundAttachment>,

    /// Full MIME message, only sent when raw mode is enabled
    pub raw_email: Option<String>,
}

impl InboundEmail {
    /// First header with the given name, compared case-insensitively
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&InboundHeader> {
        self.headers
            .iter()
            .find(|h| h.name.eq_ignore_ascii_case(name))
    }

    /// `Date` header of the original message
    #[must_use]
    pub fn date(&self) -> Option<DateTime<FixedOffset>> {
        self.header("date")
            .and_then(|h| DateTime::parse_from_rfc2822(h.unfolded_value().trim()).ok())
    }

    /// Spam score as a number, when present and numeric
    #[must_use]
    pub fn spam_score_value(&self) -> Option<f64> {
        self.spam_score
            .as_deref()
            .and_then(|s| s.trim().parse().ok())
    }

    /// Body to show when only one is wanted: text if present, else HTML
    #[must_use]
    pub fn best_body(&self) -> Option<&str> {
        self.text
            .as_deref()
            .filter(|t| !t.trim().is_empty())
            .or(self.html.as_deref())
    }
}

/// Email address with optional display name
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailAddress {
    /// Display name (e.g., "Bob Smith")
    pub name: Option<String>,

    /// Address (e.g., "bob@example.com")
    pub email: String,
}

impl EmailAddress {
    /// Parse a single `Name <addr>`, `"Name" <addr>`, `addr (Name)` or
    /// bare `addr` token
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        let (stripped, comment) = strip_comments(s);
        let s = stripped.trim();

        if let Some(start) = s.find('<')
            && let Some(end) = s[start..].find('>').map(|e| start + e)
        {
            let email = s[start + 1..end].trim();
            if !email.contains('@') {
                return None;
            }

            let name = decode_display_name(s[..start].trim());
            return Some(Self {
                name: (!name.is_empty()).then_some(name).or(comment),
                email: email.to_string(),
            });
        }

        if s.contains('@') && !s.contains(char::is_whitespace) {
            return Some(Self {
                name: comment,
                email: s.to_string(),
            });
        }

        None
    }

    /// Parse a comma or semicolon separated address list.
    ///
    /// Groups (`team: a@x.com, b@x.com;`) contribute their members, so
    /// `undisclosed-recipients:;` is an empty list. Returns `None` if any
    /// non-empty entry is not an address.
    #[must_use]
    pub fn parse_list(s: &str) -> Option<Vec<Self>> {
        split_address_list(s)
            .into_iter()
            .map(Self::parse)
            .collect()
    }

    /// Domain part of the address
    #[must_use]
    pub fn domain(&self) -> &str {
        self.email
            .rsplit_once('@')
            .map_or("", |(_, domain)| domain)
    }
}

impl fmt::Display for EmailAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.name {
            Some(name) => write!(f, "{} <{}>", name, self.email),
            None => write!(f, "{}", self.email),
        }
    }
}

/// Strip quoting from a display name and decode RFC 2047 encoded words
fn decode_display_name(raw: &str) -> String {
    let unquoted = raw
        .strip_prefix('"')
        .and_then(|r| r.strip_suffix('"'))
        .map_or_else(|| raw.to_string(), |r| r.replace("\\\"", "\"").replace("\\\\", "\\"));

    if !unquoted.contains("=?") {
        return unquoted;
    }

    match mailparse::parse_header(format!("X-Name: {unquoted}").as_bytes()) {
        Ok((header, _)) => header.get_value(),
        Err(_) => unquoted,
    }
}

/// Remove `(comments)` outside quoted strings, returning the remaining
/// text and the first non-empty comment
fn strip_comments(s: &str) -> (String, Option<String>) {
    let mut kept = String::with_capacity(s.len());
    let mut comment = String::new();
    let mut first_comment = None;
    let mut in_quotes = false;
    let mut escaped = false;
    let mut depth = 0u32;

    for c in s.chars() {
        if escaped {
            escaped = false;
            if depth > 0 {
                comment.push(c);
            } else {
                kept.push(c);
            }
            continue;
        }
        match c {
            '\\' if in_quotes || depth > 0 => {
                escaped = true;
                if depth == 0 {
                    kept.push(c);
                }
            }
            '"' if depth == 0 => {
                in_quotes = !in_quotes;
                kept.push(c);
            }
            '(' if !in_quotes => {
                if depth > 0 {
                    comment.push(c);
                }
                depth += 1;
            }
            ')' if !in_quotes && depth > 0 => {
                depth -= 1;
                if depth > 0 {
                    comment.push(c);
                } else {
                    let text = comment.trim();
                    if first_comment.is_none() && !text.is_empty() {
                        first_comment = Some(text.to_string());
                    }
                    comment.clear();
                    kept.push(' ');
                }
            }
            _ if depth > 0 => comment.push(c),
            _ => kept.push(c),
        }
    }

    (kept, first_comment)
}

/// Split on `,` or `;` outside quoted strings, comments and angle
/// brackets. A `:` at top level opens a group and drops the group name.
fn split_address_list(s: &str) -> Vec<&str> {
    let mut entries = Vec::new();
    let mut in_quotes = false;
    let mut escaped = false;
    let mut depth = 0u32;
    let mut comment = 0u32;
    let mut start = 0;

    for (i, c) in s.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        let top_level = !in_quotes && depth == 0 && comment == 0;
        match c {
            '\\' if in_quotes || comment > 0 => escaped = true,
            '"' if comment == 0 => in_quotes = !in_quotes,
            '(' if !in_quotes => comment += 1,
            ')' if !in_quotes => comment = comment.saturating_sub(1),
            '<' if !in_quotes && comment == 0 => depth += 1,
            '>' if !in_quotes && comment == 0 => depth = depth.saturating_sub(1),
            ':' if top_level => start = i + 1,
            ',' | ';' if top_level => {
                entries.push(&s[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    entries.push(&s[start..]);

    entries
        .into_iter()
        .map(str::trim)
        .filter(|e| !e.is_empty())
        .collect()
}

/// One logical header of the original message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InboundHeader {
    pub name: String,

    /// Value with the whitespace after the colon removed; folded lines
    /// keep their line breaks
    pub value: String,

    /// The whole logical header exactly as embedded, without its final
    /// line break
    pub raw: String,
}

impl InboundHeader {
    /// Value with folding line breaks removed (RFC 5322 unfolding)
    #[must_use]
    pub fn unfolded_value(&self) -> String {
        self.value.replace("\r\n", "").replace('\n', "")
    }
}

impl fmt::Display for InboundHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// SMTP envelope as reported in the `envelope` part
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    #[serde(default)]
    pub to: Vec<String>,

    #[serde(default)]
    pub from: Option<String>,
}

/// A file attached to the inbound message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InboundAttachment {
    /// Form field that carried the file (e.g. `attachment1`)
    pub part_name: String,

    pub filename: String,

    /// Mimetype, empty when neither the part nor `attachment-info` gave one
    pub content_type: String,

    /// Content-ID for inline attachments
    pub content_id: Option<String>,

    pub data: Vec<u8>,
}

impl InboundAttachment {
    #[must_use]
    pub const fn size(&self) -> usize {
        self.data.len()
    }

    #[must_use]
    pub const fn is_inline(&self) -> bool {
        self.content_id.is_some()
    }
}
