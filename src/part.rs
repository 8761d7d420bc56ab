//! Per-part header extraction

use crate::multipart::RawPart;
use mailparse::MailHeaderMap;

/// What a part's own headers say about it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartDisposition {
    /// Form field name from `Content-Disposition`
    pub name: String,

    /// Present on attachment parts
    pub filename: Option<String>,

    /// Mimetype from the part's `Content-Type`, if it has one
    pub content_type: Option<String>,

    /// `charset` parameter of the part's `Content-Type`
    pub charset: Option<String>,
}

impl PartDisposition {
    /// Extract the disposition of a raw part.
    ///
    /// Returns `None` when the header block cannot be parsed or carries no
    /// usable `name`; such parts are skipped by the parser.
    #[must_use]
    pub fn from_raw(part: &RawPart<'_>) -> Option<Self> {
        let (headers, _) = mailparse::parse_headers(part.headers).ok()?;

        let disposition = headers.get_first_value("Content-Disposition")?;
        let mut params = mailparse::parse_content_disposition(&disposition).params;

        let name = params.remove("name").filter(|n| !n.is_empty())?;
        let filename = params.remove("filename").filter(|f| !f.is_empty());

        let (content_type, charset) = headers
            .get_first_value("Content-Type")
            .map(|value| {
                let mut parsed = mailparse::parse_content_type(&value);
                let charset = parsed.params.remove("charset");
                (Some(parsed.mimetype), charset)
            })
            .unwrap_or_default();

        Some(Self {
            name,
            filename,
            content_type,
            charset,
        })
    }

    /// Whether this is the `charsets` part, which must be decoded first
    #[must_use]
    pub fn is_charsets(&self) -> bool {
        self.name.eq_ignore_ascii_case("charsets")
    }
}
