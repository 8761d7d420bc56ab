//! Boundary discovery and part splitting for `multipart/form-data` bodies

use crate::error::{ParseError, Result};
use memchr::memmem;
use tracing::debug;

/// One form-data part, split but not decoded
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawPart<'a> {
    /// Header block, up to and including the line break of its last line
    pub headers: &'a [u8],

    /// Body bytes; the line break preceding the next delimiter is not
    /// part of the body
    pub body: &'a [u8],
}

/// Read the `boundary` parameter from a `multipart/*` Content-Type value
#[must_use]
pub fn boundary_from_content_type(content_type: &str) -> Option<String> {
    let parsed = mailparse::parse_content_type(content_type);
    if !parsed.mimetype.starts_with("multipart/") {
        return None;
    }
    parsed
        .params
        .get("boundary")
        .filter(|b| !b.is_empty())
        .cloned()
}

/// Guess the boundary from the first non-blank line, which by convention
/// is the opening `--<boundary>` delimiter
#[must_use]
pub fn infer_boundary(body: &[u8]) -> Option<String> {
    body.split(|&b| b == b'\n')
        .map(<[u8]>::trim_ascii)
        .find(|line| !line.is_empty())
        .and_then(|line| line.strip_prefix(b"--"))
        .filter(|boundary| !boundary.is_empty())
        .map(|boundary| String::from_utf8_lossy(boundary).into_owned())
}

/// Split a multipart body into its parts, in payload order.
///
/// Text before the first delimiter is ignored. Delimiter lines may carry
/// surrounding spaces or tabs, and the closing delimiter may end the
/// stream without a line break.
pub fn split_parts<'a>(body: &'a [u8], boundary: &str) -> Result<Vec<RawPart<'a>>> {
    let delimiter = format!("--{boundary}");
    let mut delimiters = find_delimiters(body, delimiter.as_bytes());

    let first = delimiters.next().ok_or_else(|| {
        ParseError::MalformedPayload(format!("boundary {boundary:?} not found in payload"))
    })?;
    if first.closing {
        return Ok(Vec::new());
    }

    let mut parts = Vec::new();
    let mut content_start = first.next_line;
    for delim in delimiters {
        let content = strip_line_break(&body[content_start..delim.line_start]);
        parts.push(split_part(content));

        if delim.closing {
            debug!(parts = parts.len(), "Split multipart payload");
            return Ok(parts);
        }
        content_start = delim.next_line;
    }

    Err(ParseError::MalformedPayload(format!(
        "stream ended before closing boundary {boundary:?}"
    )))
}

struct Delimiter {
    /// Offset of the start of the delimiter's line
    line_start: usize,
    /// Offset just past the delimiter's line
    next_line: usize,
    closing: bool,
}

fn find_delimiters<'a>(body: &'a [u8], delimiter: &'a [u8]) -> impl Iterator<Item = Delimiter> + 'a {
    memmem::find_iter(body, delimiter).filter_map(move |pos| {
        let line_start = memchr::memrchr(b'\n', &body[..pos]).map_or(0, |nl| nl + 1);
        if !body[line_start..pos].iter().all(|b| matches!(b, b' ' | b'\t')) {
            return None;
        }

        let after = pos + delimiter.len();
        let closing = body[after..].starts_with(b"--");
        let rest = if closing { after + 2 } else { after };
        let line_end = memchr::memchr(b'\n', &body[rest..]).map_or(body.len(), |nl| rest + nl);

        // Anything else on the line means the boundary text only appeared
        // as a prefix of some content
        if !body[rest..line_end].iter().all(u8::is_ascii_whitespace) {
            return None;
        }

        Some(Delimiter {
            line_start,
            next_line: (line_end + 1).min(body.len()),
            closing,
        })
    })
}

fn strip_line_break(content: &[u8]) -> &[u8] {
    content
        .strip_suffix(b"\r\n")
        .or_else(|| content.strip_suffix(b"\n"))
        .unwrap_or(content)
}

fn split_part(content: &[u8]) -> RawPart<'_> {
    let mut offset = 0;
    while offset < content.len() {
        let line_end =
            memchr::memchr(b'\n', &content[offset..]).map_or(content.len(), |nl| offset + nl + 1);
        let line = &content[offset..line_end];
        if line == b"\r\n" || line == b"\n" {
            return RawPart {
                headers: &content[..offset],
                body: &content[line_end..],
            };
        }
        offset = line_end;
    }

    RawPart {
        headers: content,
        body: &[],
    }
}
