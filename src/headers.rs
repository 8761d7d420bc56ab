//! Splitting of the `headers` part into logical headers

use crate::types::InboundHeader;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FoldState {
    /// No header is open; a continuation line here has nothing to extend
    StartOfHeader,
    /// The last header may still be extended by whitespace-led lines
    Continuation,
}

/// Split raw header text into logical headers using RFC 822 folding: a
/// line starting with a space or tab belongs to the previous header.
///
/// Each header's `raw` text keeps the original bytes, including the line
/// breaks between folded lines.
#[must_use]
pub fn split_headers(raw: &str) -> Vec<InboundHeader> {
    let mut headers: Vec<InboundHeader> = Vec::new();
    let mut state = FoldState::StartOfHeader;
    // Line break that ended the last line of the open header
    let mut pending_break = "";

    for chunk in raw.split_inclusive('\n') {
        let line = chunk.trim_end_matches(['\r', '\n']);
        let line_break = &chunk[line.len()..];
        if line.trim().is_empty() {
            continue;
        }

        let folded = line.starts_with([' ', '\t']);
        state = match (state, folded) {
            (FoldState::Continuation, true) => {
                if let Some(current) = headers.last_mut() {
                    for target in [&mut current.value, &mut current.raw] {
                        target.push_str(pending_break);
                        target.push_str(line);
                    }
                }
                pending_break = line_break;
                FoldState::Continuation
            }
            (FoldState::StartOfHeader, true) => {
                debug!(line, "Dropping continuation line with no header");
                FoldState::StartOfHeader
            }
            (_, false) => match line.split_once(':') {
                Some((name, value)) => {
                    headers.push(InboundHeader {
                        name: name.trim_end().to_string(),
                        value: value.trim_start().to_string(),
                        raw: line.to_string(),
                    });
                    pending_break = line_break;
                    FoldState::Continuation
                }
                None => {
                    debug!(line, "Dropping header line without a colon");
                    FoldState::StartOfHeader
                }
            },
        };
    }

    headers
}
