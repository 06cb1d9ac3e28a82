//! Content-Transfer-Encoding and RFC 2047 encoded-word decoding.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;

use crate::error::{Error, Result};

/// Transfer encodings the decoder understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferEncoding {
    /// `base64`
    Base64,
    /// `quoted-printable`
    QuotedPrintable,
    /// `7bit`, `8bit`, `binary` or anything unrecognised.
    Identity,
}

impl TransferEncoding {
    /// Reads a Content-Transfer-Encoding value; absence means identity.
    #[must_use]
    pub fn from_header(value: Option<&str>) -> Self {
        match value.map(|v| v.trim().to_ascii_uppercase()).as_deref() {
            Some("BASE64") => Self::Base64,
            Some("QUOTED-PRINTABLE") => Self::QuotedPrintable,
            _ => Self::Identity,
        }
    }

    /// Decodes `data` according to this encoding.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Decoding`] when the data is not valid for the encoding.
    pub fn decode(self, data: &[u8]) -> Result<Vec<u8>> {
        match self {
            Self::Base64 => decode_base64(data),
            Self::QuotedPrintable => decode_quoted_printable(data),
            Self::Identity => Ok(data.to_vec()),
        }
    }
}

/// Decodes base64, ignoring line breaks and other whitespace.
///
/// # Errors
///
/// Returns an error if the input is not valid base64.
pub fn decode_base64(data: &[u8]) -> Result<Vec<u8>> {
    let compact: Vec<u8> = data
        .iter()
        .copied()
        .filter(|b| !b.is_ascii_whitespace())
        .collect();
    STANDARD.decode(compact).map_err(Into::into)
}

/// Decodes quoted-printable (RFC 2045 section 6.7).
///
/// `=` at the end of a line is a soft break and joins the lines. Trailing
/// spaces and tabs on an encoded line are dropped.
///
/// # Errors
///
/// Returns an error for `=` followed by anything other than two hex digits
/// or a line break.
pub fn decode_quoted_printable(data: &[u8]) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(data.len());
    let mut lines = data.split(|&b| b == b'\n').peekable();

    while let Some(line) = lines.next() {
        let has_break = lines.peek().is_some();
        let (line, eol): (&[u8], &[u8]) = match line.strip_suffix(b"\r") {
            Some(stripped) => (stripped, b"\r\n"),
            None => (line, b"\n"),
        };
        let line = trim_lwsp_end(line);

        let mut soft = false;
        let mut i = 0;
        while i < line.len() {
            if line[i] != b'=' {
                out.push(line[i]);
                i += 1;
                continue;
            }
            if i + 1 == line.len() {
                soft = true;
                break;
            }
            let hi = line.get(i + 1).copied().and_then(hex_value);
            let lo = line.get(i + 2).copied().and_then(hex_value);
            match (hi, lo) {
                (Some(hi), Some(lo)) => {
                    out.push((hi << 4) | lo);
                    i += 3;
                }
                _ => {
                    return Err(Error::Decoding(format!(
                        "quoted-printable: invalid escape at byte {i}"
                    )));
                }
            }
        }

        if has_break && !soft {
            out.extend_from_slice(eol);
        }
    }
    Ok(out)
}

fn trim_lwsp_end(line: &[u8]) -> &[u8] {
    let end = line
        .iter()
        .rposition(|&b| b != b' ' && b != b'\t')
        .map_or(0, |p| p + 1);
    &line[..end]
}

const fn hex_value(b: u8) -> Option<u8> {
    match b {
        b'0'..=b'9' => Some(b - b'0'),
        b'A'..=b'F' => Some(b - b'A' + 10),
        b'a'..=b'f' => Some(b - b'a' + 10),
        _ => None,
    }
}

/// Characters for bytes 0x80..=0x9F in windows-1252. The five unassigned
/// bytes keep their C1 code points.
const WINDOWS_1252_HIGH: [char; 32] = [
    '\u{20AC}', '\u{0081}', '\u{201A}', '\u{0192}', '\u{201E}', '\u{2026}', '\u{2020}', '\u{2021}',
    '\u{02C6}', '\u{2030}', '\u{0160}', '\u{2039}', '\u{0152}', '\u{008D}', '\u{017D}', '\u{008F}',
    '\u{0090}', '\u{2018}', '\u{2019}', '\u{201C}', '\u{201D}', '\u{2022}', '\u{2013}', '\u{2014}',
    '\u{02DC}', '\u{2122}', '\u{0161}', '\u{203A}', '\u{0153}', '\u{009D}', '\u{017E}', '\u{0178}',
];

fn windows_1252_char(b: u8) -> char {
    match b {
        0x80..=0x9F => WINDOWS_1252_HIGH[usize::from(b - 0x80)],
        _ => char::from(b),
    }
}

/// Converts bytes in `charset` to a string.
///
/// Latin-1 family charsets decode as windows-1252, the way browsers treat
/// them; everything else is treated as UTF-8 with invalid sequences
/// replaced.
#[must_use]
pub fn bytes_to_string(bytes: &[u8], charset: Option<&str>) -> String {
    let latin1 = charset.is_some_and(|c| {
        matches!(
            c.trim().to_ascii_lowercase().as_str(),
            "iso-8859-1" | "latin1" | "latin-1" | "l1" | "windows-1252" | "cp1252"
        )
    });
    if latin1 {
        bytes.iter().map(|&b| windows_1252_char(b)).collect()
    } else {
        String::from_utf8_lossy(bytes).into_owned()
    }
}

/// Decodes RFC 2047 encoded words inside a header value.
///
/// Text outside encoded words is kept as-is. Whitespace between two adjacent
/// encoded words is removed. A malformed encoded word is left undecoded.
#[must_use]
pub fn decode_words(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    let mut pending_space: Option<&str> = None;

    while let Some(start) = rest.find("=?") {
        let (before, candidate) = rest.split_at(start);
        let Some((decoded, consumed)) = decode_word(candidate) else {
            out.push_str(pending_space.take().unwrap_or_default());
            out.push_str(before);
            out.push_str("=?");
            rest = &candidate[2..];
            continue;
        };

        let only_space = before.chars().all(|c| c == ' ' || c == '\t');
        match pending_space.take() {
            Some(_) if only_space => {}
            Some(space) => {
                out.push_str(space);
                out.push_str(before);
            }
            None => out.push_str(before),
        }
        out.push_str(&decoded);
        rest = &candidate[consumed..];

        // Hold back whitespace in case another encoded word follows
        let ws = rest.len() - rest.trim_start_matches([' ', '\t']).len();
        pending_space = Some(&rest[..ws]);
        rest = &rest[ws..];
    }

    out.push_str(pending_space.unwrap_or_default());
    out.push_str(rest);
    out
}

/// Decodes one `=?charset?B|Q?text?=` word, returning the text and its length.
fn decode_word(input: &str) -> Option<(String, usize)> {
    let body = input.strip_prefix("=?")?;
    let (charset, body) = body.split_once('?')?;
    let (encoding, body) = body.split_once('?')?;
    let end = body.find("?=")?;
    let payload = &body[..end];
    if payload.contains([' ', '\t']) {
        return None;
    }

    let consumed = 2 + charset.len() + 1 + encoding.len() + 1 + end + 2;

    // RFC 2231 language suffix
    let charset = charset.split('*').next().unwrap_or(charset);
    let bytes = match encoding {
        "B" | "b" => decode_base64(payload.as_bytes()).ok()?,
        "Q" | "q" => decode_q(payload)?,
        _ => return None,
    };
    Some((bytes_to_string(&bytes, Some(charset)), consumed))
}

fn decode_q(payload: &str) -> Option<Vec<u8>> {
    let bytes = payload.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'_' => {
                out.push(b' ');
                i += 1;
            }
            b'=' => {
                let hi = hex_value(*bytes.get(i + 1)?)?;
                let lo = hex_value(*bytes.get(i + 2)?)?;
                out.push((hi << 4) | lo);
                i += 3;
            }
            b => {
                out.push(b);
                i += 1;
            }
        }
    }
    Some(out)
}
