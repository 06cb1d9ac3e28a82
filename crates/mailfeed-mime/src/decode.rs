//! Reduction of a message to one display string.

use crate::content_type::ContentType;
use crate::error::{Error, Result};
use crate::header::{Headers, split_header};
use crate::part::MimePart;

/// Decodes a message from its parsed top-level headers and raw body.
///
/// # Errors
///
/// - [`Error::UnsupportedEncoding`] if the top-level Content-Type is absent
///   or malformed.
/// - [`Error::NoRenderablePart`] for an alternative container without HTML
///   or plain text.
/// - Any error from building the part tree.
pub fn decode(headers: &Headers, body: &[u8]) -> Result<String> {
    let value = headers
        .get("content-type")
        .ok_or_else(|| Error::UnsupportedEncoding("missing Content-Type header".into()))?;
    let content_type = ContentType::parse(value)?;
    let tree = MimePart::parse(content_type, headers, body)?;
    render(&tree)
}

/// Decodes a complete message (header block, empty line, body).
///
/// # Errors
///
/// See [`decode`].
pub fn decode_message(raw: &[u8]) -> Result<String> {
    let (head, body) = split_header(raw);
    decode(&Headers::parse(head), body)
}

/// Picks the text to show for a part tree.
///
/// A leaf renders as its text. An alternative container renders as its
/// first HTML leaf, else its first plain-text leaf. Other containers render
/// every leaf, each preceded by `\n`.
///
/// # Errors
///
/// Returns [`Error::NoRenderablePart`] when an alternative container has
/// neither kind of leaf.
pub fn render(part: &MimePart) -> Result<String> {
    match part {
        MimePart::Leaf { text, .. } => Ok(text.clone()),
        MimePart::Container { content_type, .. } => {
            let leaves = part.leaves();
            if content_type.sub_type == "alternative" {
                let pick = |main: &str, sub: &str| {
                    leaves
                        .iter()
                        .find(|leaf| leaf.content_type().is(main, sub))
                        .and_then(|leaf| leaf.text())
                };
                return pick("text", "html")
                    .or_else(|| pick("text", "plain"))
                    .map(str::to_string)
                    .ok_or(Error::NoRenderablePart);
            }

            Ok(leaves
                .iter()
                .filter_map(|leaf| leaf.text())
                .fold(String::new(), |mut out, text| {
                    out.push('\n');
                    out.push_str(text);
                    out
                }))
        }
    }
}
