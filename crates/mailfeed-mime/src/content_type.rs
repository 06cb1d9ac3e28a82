//! Content-Type header values (RFC 2045 section 5.1).

use std::collections::HashMap;
use std::fmt;

use crate::error::{Error, Result};

/// A media type with its parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentType {
    /// Top-level type, lowercased (`text`, `multipart`).
    pub main_type: String,
    /// Subtype, lowercased (`html`, `alternative`).
    pub sub_type: String,
    /// Parameters keyed by lowercased name, values unquoted.
    pub parameters: HashMap<String, String>,
}

impl ContentType {
    /// Creates a content type without parameters.
    #[must_use]
    pub fn new(main_type: impl Into<String>, sub_type: impl Into<String>) -> Self {
        Self {
            main_type: main_type.into(),
            sub_type: sub_type.into(),
            parameters: HashMap::new(),
        }
    }

    /// The implicit type of an entity without a Content-Type header.
    #[must_use]
    pub fn text_plain() -> Self {
        Self::new("text", "plain")
    }

    /// Adds a parameter.
    #[must_use]
    pub fn with_parameter(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.parameters.insert(key.into(), value.into());
        self
    }

    /// The `charset` parameter, if present.
    #[must_use]
    pub fn charset(&self) -> Option<&str> {
        self.parameters.get("charset").map(String::as_str)
    }

    /// The `boundary` parameter, if present.
    #[must_use]
    pub fn boundary(&self) -> Option<&str> {
        self.parameters.get("boundary").map(String::as_str)
    }

    /// True for `multipart/*`.
    #[must_use]
    pub fn is_multipart(&self) -> bool {
        self.main_type == "multipart"
    }

    /// True when the type is exactly `main/sub`.
    #[must_use]
    pub fn is(&self, main: &str, sub: &str) -> bool {
        self.main_type == main && self.sub_type == sub
    }

    /// Parses `type/subtype *(; name=value)`.
    ///
    /// Parameter values may be quoted; a `;` inside quotes does not end the
    /// value. Parameters without `=` are ignored.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnsupportedEncoding`] if the media type is empty, has
    /// no `/`, or contains characters that are not valid in a token.
    pub fn parse(s: &str) -> Result<Self> {
        let mut segments = split_parameters(s).into_iter();
        let media = segments.next().unwrap_or_default();

        let (main, sub) = media
            .split_once('/')
            .ok_or_else(|| Error::UnsupportedEncoding(format!("no subtype in {s:?}")))?;
        let main = main.trim();
        let sub = sub.trim();
        if !is_token(main) || !is_token(sub) {
            return Err(Error::UnsupportedEncoding(format!(
                "invalid media type {media:?}"
            )));
        }

        let mut content_type = Self::new(main.to_ascii_lowercase(), sub.to_ascii_lowercase());
        for segment in segments {
            if let Some((key, value)) = segment.split_once('=') {
                let key = key.trim().to_ascii_lowercase();
                if key.is_empty() {
                    continue;
                }
                content_type.parameters.insert(key, unquote(value.trim()));
            }
        }
        Ok(content_type)
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.main_type, self.sub_type)?;
        let mut keys: Vec<_> = self.parameters.keys().collect();
        keys.sort();
        for key in keys {
            write!(f, "; {key}=\"{}\"", self.parameters[key])?;
        }
        Ok(())
    }
}

/// Splits on `;` outside quoted strings.
fn split_parameters(s: &str) -> Vec<&str> {
    let mut out = Vec::new();
    let mut start = 0;
    let mut in_quotes = false;
    let mut escaped = false;

    for (i, c) in s.char_indices() {
        match c {
            _ if escaped => escaped = false,
            '\\' if in_quotes => escaped = true,
            '"' => in_quotes = !in_quotes,
            ';' if !in_quotes => {
                out.push(s[start..i].trim());
                start = i + 1;
            }
            _ => {}
        }
    }
    out.push(s[start..].trim());
    out
}

fn unquote(value: &str) -> String {
    let Some(inner) = value.strip_prefix('"') else {
        return value.to_string();
    };
    let inner = inner.strip_suffix('"').unwrap_or(inner);

    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(next) = chars.next() {
                out.push(next);
            }
        } else {
            out.push(c);
        }
    }
    out
}

/// RFC 2045 token: printable ASCII minus specials.
fn is_token(s: &str) -> bool {
    !s.is_empty()
        && s.bytes()
            .all(|b| b.is_ascii_graphic() && !b"()<>@,;:\\\"/[]?=".contains(&b))
}
