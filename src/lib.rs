// Enforce at crate level
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::missing_errors_doc, clippy::missing_panics_doc)]

//! Inbound-Parse Webhook Parser
//!
//! Parses the `multipart/form-data` payload that SendGrid's inbound-parse
//! webhook POSTs for every received email into a strongly-typed
//! [`InboundEmail`].
//!
//! # Features
//!
//! - Boundary taken from the request `Content-Type` or inferred from the body
//! - Text parts decoded with the charsets declared in the `charsets` part
//! - Logical header splitting with RFC 822 folding
//! - Attachments with filenames, content types and content IDs
//! - Envelope fallback for sender and recipients
//!
//! # Example
//!
//! ```rust
//! use inbound_parse::parse_inbound_email_bytes;
//!
//! let body = b"--xYzZY\r\n\
//!     Content-Disposition: form-data; name=\"from\"\r\n\r\n\
//!     Bob Smith <bob@example.com>\r\n\
//!     --xYzZY\r\n\
//!     Content-Disposition: form-data; name=\"subject\"\r\n\r\n\
//!     Hello\r\n\
//!     --xYzZY--\r\n";
//! let email = parse_inbound_email_bytes(body, Some("multipart/form-data; boundary=xYzZY")).unwrap();
//!
//! assert_eq!(email.subject, "Hello");
//! assert_eq!(email.from.unwrap().email, "bob@example.com");
//! ```

mod config;
mod dispatch;
mod error;
mod headers;
mod multipart;
mod parser;
mod part;
mod types;

pub use config::ParserConfig;
pub use error::{ParseError, Result};
pub use headers::split_headers;
pub use multipart::{RawPart, boundary_from_content_type, infer_boundary, split_parts};
pub use parser::{InboundParser, parse_inbound_email, parse_inbound_email_bytes};
pub use part::PartDisposition;
pub use types::*;
