//! Recursive MIME entity tree (RFC 2046 section 5.1).

use crate::content_type::ContentType;
use crate::encoding::{TransferEncoding, bytes_to_string};
use crate::error::{Error, Result};
use crate::header::{Headers, split_header};

/// Deepest container nesting accepted before giving up.
pub const MAX_DEPTH: usize = 32;

/// One node of a decoded message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MimePart {
    /// Non-multipart entity with its transfer-decoded text.
    Leaf {
        /// Declared (or implied) type of the entity.
        content_type: ContentType,
        /// Decoded body.
        text: String,
    },
    /// Multipart entity.
    Container {
        /// `multipart/<subtype>` with its parameters.
        content_type: ContentType,
        /// Children in document order.
        children: Vec<Self>,
    },
}

impl MimePart {
    /// Builds the tree for an entity whose type is already known.
    ///
    /// # Errors
    ///
    /// Fails on missing boundaries, undecodable transfer encodings, invalid
    /// nested content types, or nesting beyond [`MAX_DEPTH`].
    pub fn parse(content_type: ContentType, headers: &Headers, body: &[u8]) -> Result<Self> {
        Self::parse_at(content_type, headers, body, 0)
    }

    fn parse_at(
        content_type: ContentType,
        headers: &Headers,
        body: &[u8],
        depth: usize,
    ) -> Result<Self> {
        if depth > MAX_DEPTH {
            return Err(Error::TooDeep(MAX_DEPTH));
        }

        if !content_type.is_multipart() {
            let encoding = TransferEncoding::from_header(headers.get("content-transfer-encoding"));
            let bytes = encoding.decode(body)?;
            let text = bytes_to_string(&bytes, content_type.charset());
            return Ok(Self::Leaf { content_type, text });
        }

        let boundary = content_type
            .boundary()
            .filter(|b| !b.is_empty())
            .ok_or_else(|| Error::MalformedMultipart("missing boundary parameter".into()))?;

        let mut children = Vec::new();
        for raw in split_parts(body, boundary)? {
            let (head, child_body) = split_header(raw);
            let child_headers = Headers::parse(head);
            let child_type = match child_headers.get("content-type") {
                Some(value) => ContentType::parse(value)?,
                None => ContentType::text_plain(),
            };
            children.push(Self::parse_at(child_type, &child_headers, child_body, depth + 1)?);
        }

        Ok(Self::Container {
            content_type,
            children,
        })
    }

    /// Content type of this node.
    #[must_use]
    pub const fn content_type(&self) -> &ContentType {
        match self {
            Self::Leaf { content_type, .. } | Self::Container { content_type, .. } => content_type,
        }
    }

    /// Every leaf below this node, depth-first in document order.
    #[must_use]
    pub fn leaves(&self) -> Vec<&Self> {
        let mut out = Vec::new();
        self.collect_leaves(&mut out);
        out
    }

    fn collect_leaves<'a>(&'a self, out: &mut Vec<&'a Self>) {
        match self {
            Self::Leaf { .. } => out.push(self),
            Self::Container { children, .. } => {
                for child in children {
                    child.collect_leaves(out);
                }
            }
        }
    }

    /// Leaf text, or `None` for containers.
    #[must_use]
    pub fn text(&self) -> Option<&str> {
        match self {
            Self::Leaf { text, .. } => Some(text),
            Self::Container { .. } => None,
        }
    }
}

/// Cuts a multipart body into raw child entities.
///
/// A delimiter is a line holding `--boundary`, optionally followed by
/// whitespace; `--boundary--` closes the body. The line break before a
/// delimiter belongs to the delimiter. Preamble and epilogue are dropped,
/// and a body that ends without a closing delimiter keeps its last part.
fn split_parts<'a>(body: &'a [u8], boundary: &str) -> Result<Vec<&'a [u8]>> {
    let dash = format!("--{boundary}");
    let mut parts = Vec::new();
    let mut current: Option<usize> = None;
    let mut pos = 0;
    let mut closed = false;

    while pos < body.len() {
        let end = body[pos..]
            .iter()
            .position(|&b| b == b'\n')
            .map_or(body.len(), |i| pos + i + 1);
        let line = trim_line(&body[pos..end]);

        if let Some(rest) = line.strip_prefix(dash.as_bytes())
            && (rest.is_empty() || rest == b"--")
        {
            if let Some(start) = current.take() {
                parts.push(strip_line_break(&body[start..pos]));
            }
            if rest == b"--" {
                closed = true;
                break;
            }
            current = Some(end);
        }
        pos = end;
    }

    if !closed && let Some(start) = current {
        parts.push(&body[start..]);
    }
    if parts.is_empty() {
        return Err(Error::MalformedMultipart(format!(
            "no parts delimited by {dash:?}"
        )));
    }
    Ok(parts)
}

fn trim_line(line: &[u8]) -> &[u8] {
    let end = line
        .iter()
        .rposition(|&b| !matches!(b, b'\r' | b'\n' | b' ' | b'\t'))
        .map_or(0, |p| p + 1);
    &line[..end]
}

fn strip_line_break(raw: &[u8]) -> &[u8] {
    raw.strip_suffix(b"\r\n")
        .or_else(|| raw.strip_suffix(b"\n"))
        .unwrap_or(raw)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn multipart(subtype: &str, boundary: &str) -> ContentType {
        ContentType::new("multipart", subtype).with_parameter("boundary", boundary)
    }

    #[test]
    fn split_drops_preamble_and_epilogue() {
        let body = b"preamble\r\n--b\r\n\r\none\r\n--b\r\n\r\ntwo\r\n--b--\r\nepilogue";
        let parts = split_parts(body, "b").unwrap();
        assert_eq!(parts, vec![&b"\r\none"[..], &b"\r\ntwo"[..]]);
    }

    #[test]
    fn inner_line_breaks_survive() {
        let body = b"--b\r\n\r\nline 1\r\nline 2\r\n\r\n--b--";
        let parts = split_parts(body, "b").unwrap();
        assert_eq!(parts, vec![&b"\r\nline 1\r\nline 2\r\n"[..]]);
    }

    #[test]
    fn longer_boundary_is_not_a_delimiter() {
        let body = b"--b\r\n\r\nkeep\r\n--bx\r\nstill\r\n--b--\r\n";
        let parts = split_parts(body, "b").unwrap();
        assert_eq!(parts, vec![&b"\r\nkeep\r\n--bx\r\nstill"[..]]);
    }

    #[test]
    fn missing_close_keeps_last_part() {
        let parts = split_parts(b"--b\n\nonly\n", "b").unwrap();
        assert_eq!(parts, vec![&b"\nonly\n"[..]]);
    }

    #[test]
    fn no_delimiter_is_malformed() {
        assert!(matches!(
            split_parts(b"just text", "b"),
            Err(Error::MalformedMultipart(_))
        ));
    }

    #[test]
    fn missing_boundary_is_malformed() {
        let result = MimePart::parse(
            ContentType::new("multipart", "mixed"),
            &Headers::new(),
            b"--b\r\n\r\nx\r\n--b--",
        );
        assert!(matches!(result, Err(Error::MalformedMultipart(_))));
    }

    #[test]
    fn nested_container_uses_own_boundary() {
        let body = b"--outer\r\n\
Content-Type: multipart/alternative; boundary=inner\r\n\
\r\n\
--inner\r\n\
Content-Type: text/plain\r\n\
\r\n\
plain\r\n\
--inner\r\n\
Content-Type: text/html\r\n\
\r\n\
<b>html</b>\r\n\
--inner--\r\n\
--outer\r\n\
\r\n\
tail\r\n\
--outer--\r\n";
        let tree = MimePart::parse(multipart("mixed", "outer"), &Headers::new(), body).unwrap();

        let MimePart::Container { children, .. } = &tree else {
            panic!("expected container");
        };
        assert_eq!(children.len(), 2);
        assert!(children[0].content_type().is("multipart", "alternative"));
        assert!(children[1].content_type().is("text", "plain"));

        let texts: Vec<_> = tree.leaves().iter().filter_map(|l| l.text()).collect();
        assert_eq!(texts, vec!["plain", "<b>html</b>", "tail"]);
    }

    #[test]
    fn leaf_transfer_encoding_is_applied() {
        let body = b"--b\r\nContent-Transfer-Encoding: base64\r\n\r\nSGk=\r\n--b--";
        let tree = MimePart::parse(multipart("mixed", "b"), &Headers::new(), body).unwrap();
        assert_eq!(tree.leaves()[0].text(), Some("Hi"));
    }

    #[test]
    fn invalid_nested_type_fails() {
        let body = b"--b\r\nContent-Type: garbage\r\n\r\nx\r\n--b--";
        let result = MimePart::parse(multipart("mixed", "b"), &Headers::new(), body);
        assert!(matches!(result, Err(Error::UnsupportedEncoding(_))));
    }

    #[test]
    fn depth_is_bounded() {
        let mut body = b"x".to_vec();
        for level in (0..=MAX_DEPTH + 1).rev() {
            let mut wrapped =
                format!("--l{level}\r\nContent-Type: multipart/mixed; boundary=l{}\r\n\r\n", level + 1)
                    .into_bytes();
            wrapped.extend_from_slice(&body);
            wrapped.extend_from_slice(format!("\r\n--l{level}--").as_bytes());
            body = wrapped;
        }
        let result = MimePart::parse(multipart("mixed", "l0"), &Headers::new(), &body);
        assert!(matches!(result, Err(Error::TooDeep(MAX_DEPTH))));
    }
}
