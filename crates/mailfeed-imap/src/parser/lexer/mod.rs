//! Tokenizer for the response grammar.

#![allow(clippy::missing_errors_doc)]

mod token;

pub use token::Token;

use crate::{Error, Result};

/// Cursor over one response.
pub struct Lexer<'a> {
    input: &'a [u8],
    pos: usize,
}

impl<'a> Lexer<'a> {
    /// Creates a lexer over `input`.
    #[must_use]
    pub const fn new(input: &'a [u8]) -> Self {
        Self { input, pos: 0 }
    }

    /// Current byte offset.
    #[must_use]
    pub const fn position(&self) -> usize {
        self.pos
    }

    /// Unconsumed input.
    #[must_use]
    pub fn remaining(&self) -> &'a [u8] {
        self.input.get(self.pos..).unwrap_or_default()
    }

    /// True once all input is consumed.
    #[must_use]
    pub const fn is_eof(&self) -> bool {
        self.pos >= self.input.len()
    }

    /// Next byte without consuming it.
    #[must_use]
    pub fn peek(&self) -> Option<u8> {
        self.input.get(self.pos).copied()
    }

    /// Consumes one byte.
    pub fn advance(&mut self) -> Option<u8> {
        let byte = self.peek()?;
        self.pos += 1;
        Some(byte)
    }

    /// Consumes up to `n` bytes.
    pub fn skip(&mut self, n: usize) {
        self.pos = (self.pos + n).min(self.input.len());
    }

    /// Reads the next token.
    pub fn next_token(&mut self) -> Result<Token<'a>> {
        let Some(byte) = self.peek() else {
            return Ok(Token::Eof);
        };

        let single = match byte {
            b' ' => Some(Token::Space),
            b'(' => Some(Token::LParen),
            b')' => Some(Token::RParen),
            b'[' => Some(Token::LBracket),
            b']' => Some(Token::RBracket),
            b'*' => Some(Token::Asterisk),
            b'+' => Some(Token::Plus),
            _ => None,
        };
        if let Some(token) = single {
            self.pos += 1;
            return Ok(token);
        }

        match byte {
            b'\r' if self.input.get(self.pos + 1) == Some(&b'\n') => {
                self.pos += 2;
                Ok(Token::Crlf)
            }
            b'\r' => Err(self.error("CR without LF")),
            b'"' => self.read_quoted(),
            b'{' => self.read_literal(),
            _ if is_atom_char(byte) => self.read_atom(),
            _ => Err(self.error(&format!("unexpected byte {byte:#04x}"))),
        }
    }

    fn read_quoted(&mut self) -> Result<Token<'a>> {
        self.pos += 1;
        let mut out = Vec::new();
        loop {
            match self.advance() {
                Some(b'"') => break,
                Some(b'\\') => match self.advance() {
                    Some(c @ (b'"' | b'\\')) => out.push(c),
                    Some(c) => return Err(self.error(&format!("invalid escape \\{}", c as char))),
                    None => return Err(self.error("unterminated quoted string")),
                },
                Some(c) => out.push(c),
                None => return Err(self.error("unterminated quoted string")),
            }
        }
        Ok(Token::QuotedString(String::from_utf8_lossy(&out).into_owned()))
    }

    fn read_literal(&mut self) -> Result<Token<'a>> {
        let rest = self.remaining();
        let len = parse_literal_length(rest).ok_or_else(|| self.error("malformed literal prefix"))?;

        // `{len}` then CRLF
        let header = rest
            .iter()
            .position(|&b| b == b'}')
            .map_or(rest.len(), |close| close + 1);
        self.pos += header;
        if self.advance() != Some(b'\r') || self.advance() != Some(b'\n') {
            return Err(self.error("expected CRLF after literal prefix"));
        }

        let start = self.pos;
        let data = start
            .checked_add(len)
            .and_then(|end| self.input.get(start..end))
            .ok_or_else(|| self.error("truncated literal"))?;
        let end = start + data.len();
        self.pos = end;
        Ok(Token::Literal(data))
    }

    fn read_atom(&mut self) -> Result<Token<'a>> {
        let start = self.pos;
        while self.peek().is_some_and(is_atom_char) {
            self.pos += 1;
        }
        let raw = &self.input[start..self.pos];
        let text = std::str::from_utf8(raw).map_err(|_| self.error("non-UTF-8 atom"))?;

        if raw.iter().all(u8::is_ascii_digit) {
            return text
                .parse()
                .map(Token::Number)
                .map_err(|_| self.error("number out of range"));
        }
        if text.eq_ignore_ascii_case("NIL") {
            return Ok(Token::Nil);
        }
        Ok(Token::Atom(text))
    }

    fn error(&self, message: &str) -> Error {
        Error::Parse {
            position: self.pos,
            message: message.to_string(),
        }
    }

    /// Consumes a token of the same kind as `expected`.
    #[allow(clippy::needless_pass_by_value)]
    pub fn expect(&mut self, expected: Token<'_>) -> Result<()> {
        let token = self.next_token()?;
        if std::mem::discriminant(&token) == std::mem::discriminant(&expected) {
            Ok(())
        } else {
            Err(self.error(&format!("expected {expected:?}, got {token:?}")))
        }
    }

    /// Consumes one SP.
    pub fn expect_space(&mut self) -> Result<()> {
        self.expect(Token::Space)
    }

    /// Reads a number.
    pub fn read_number(&mut self) -> Result<u32> {
        match self.next_token()? {
            Token::Number(n) => Ok(n),
            token => Err(self.error(&format!("expected number, got {token:?}"))),
        }
    }

    /// Reads an atom.
    pub fn read_atom_string(&mut self) -> Result<&'a str> {
        match self.next_token()? {
            Token::Atom(s) => Ok(s),
            token => Err(self.error(&format!("expected atom, got {token:?}"))),
        }
    }

    /// Reads an atom, quoted string or literal as text.
    pub fn read_astring(&mut self) -> Result<String> {
        match self.next_token()? {
            Token::Atom(s) => Ok(s.to_string()),
            Token::Number(n) => Ok(n.to_string()),
            Token::QuotedString(s) => Ok(s),
            Token::Literal(data) => Ok(String::from_utf8_lossy(data).into_owned()),
            token => Err(self.error(&format!("expected string, got {token:?}"))),
        }
    }

    /// Consumes everything up to and including the next CRLF, returned as text.
    pub fn read_text_until_crlf(&mut self) -> String {
        let rest = self.remaining();
        let end = rest
            .windows(2)
            .position(|w| w == b"\r\n")
            .unwrap_or(rest.len());
        self.skip(end + 2);
        String::from_utf8_lossy(&rest[..end]).into_owned()
    }
}

/// Byte allowed inside an atom.
///
/// `\` is accepted so that system flags such as `\Seen` lex as one atom.
#[must_use]
pub const fn is_atom_char(b: u8) -> bool {
    matches!(b, 0x21..=0x7E)
        && !matches!(b, b'(' | b')' | b'{' | b'"' | b'%' | b'*' | b'[' | b']')
}

/// Extracts `n` from a line or buffer starting with `{n}` or `{n+}`.
#[must_use]
pub fn parse_literal_length(input: &[u8]) -> Option<usize> {
    let body = input.strip_prefix(b"{")?;
    let close = body.iter().position(|&b| b == b'}')?;
    let digits = body[..close].strip_suffix(b"+").unwrap_or(&body[..close]);
    if digits.is_empty() || !digits.iter().all(u8::is_ascii_digit) {
        return None;
    }
    std::str::from_utf8(digits).ok()?.parse().ok()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn tokens(input: &[u8]) -> Vec<Token<'_>> {
        let mut lexer = Lexer::new(input);
        let mut out = Vec::new();
        loop {
            let token = lexer.next_token().unwrap();
            if token == Token::Eof {
                return out;
            }
            out.push(token);
        }
    }

    #[test]
    fn tagged_completion() {
        assert_eq!(
            tokens(b"A0001 OK done\r\n"),
            vec![
                Token::Atom("A0001"),
                Token::Space,
                Token::Atom("OK"),
                Token::Space,
                Token::Atom("done"),
                Token::Crlf,
            ]
        );
    }

    #[test]
    fn brackets_split_atoms() {
        assert_eq!(
            tokens(b"BODY[TEXT]"),
            vec![
                Token::Atom("BODY"),
                Token::LBracket,
                Token::Atom("TEXT"),
                Token::RBracket,
            ]
        );
    }

    #[test]
    fn flags_are_single_atoms() {
        assert_eq!(
            tokens(b"(\\Seen \\Deleted)"),
            vec![
                Token::LParen,
                Token::Atom("\\Seen"),
                Token::Space,
                Token::Atom("\\Deleted"),
                Token::RParen,
            ]
        );
    }

    #[test]
    fn numbers_and_nil() {
        assert_eq!(
            tokens(b"42 nil 4a"),
            vec![
                Token::Number(42),
                Token::Space,
                Token::Nil,
                Token::Space,
                Token::Atom("4a"),
            ]
        );
    }

    #[test]
    fn quoted_with_escapes() {
        assert_eq!(
            tokens(b"\"say \\\"hi\\\"\""),
            vec![Token::QuotedString("say \"hi\"".to_string())]
        );
    }

    #[test]
    fn literal_is_taken_verbatim() {
        let input = b"{5}\r\nab\r\nc)";
        assert_eq!(
            tokens(input),
            vec![Token::Literal(b"ab\r\nc"), Token::RParen]
        );
    }

    #[test]
    fn truncated_literal_is_an_error() {
        let mut lexer = Lexer::new(b"{10}\r\nshort");
        assert!(matches!(lexer.next_token(), Err(Error::Parse { .. })));
    }

    #[test]
    fn bare_cr_is_an_error() {
        let mut lexer = Lexer::new(b"\rX");
        assert!(lexer.next_token().is_err());
    }

    #[test]
    fn literal_length_prefixes() {
        assert_eq!(parse_literal_length(b"{12}\r\n"), Some(12));
        assert_eq!(parse_literal_length(b"{7+}"), Some(7));
        assert_eq!(parse_literal_length(b"{}"), None);
        assert_eq!(parse_literal_length(b"{x1}"), None);
        assert_eq!(parse_literal_length(b"12}"), None);
    }

    proptest! {
        #[test]
        fn literal_length_matches_any_size(n in 0usize..10_000_000) {
            let prefix = format!("{{{n}}}\r\n");
            prop_assert_eq!(parse_literal_length(prefix.as_bytes()), Some(n));
        }

        #[test]
        fn lexer_never_panics(input in proptest::collection::vec(any::<u8>(), 0..64)) {
            let mut lexer = Lexer::new(&input);
            for _ in 0..=input.len() {
                match lexer.next_token() {
                    Ok(Token::Eof) | Err(_) => break,
                    Ok(_) => {}
                }
            }
        }
    }
}
