//! # mailfeed-mime
//!
//! Turns a message (header block plus body bytes) into one text string,
//! picking the most readable representation.
//!
//! - Single-part bodies are transfer-decoded and returned as text.
//! - `multipart/alternative` yields its HTML leaf, falling back to plain text.
//! - Every other multipart subtype concatenates all leaves, each preceded by
//!   a newline, in document order.
//!
//! Nested containers are split on their own boundary and flattened into the
//! enclosing container's leaves.
//!
//! ```
//! use mailfeed_mime::{Headers, decode};
//!
//! let headers = Headers::parse(b"Content-Type: text/plain\r\nContent-Transfer-Encoding: base64\r\n\r\n");
//! assert_eq!(decode(&headers, b"SGVsbG8=").unwrap(), "Hello");
//! ```

mod content_type;
mod decode;
pub mod encoding;
mod error;
mod header;
mod part;

pub use content_type::ContentType;
pub use decode::{decode, decode_message, render};
pub use error::{Error, Result};
pub use header::{Headers, split_header};
pub use part::{MAX_DEPTH, MimePart};
