//! Lexer tokens.

/// A single IMAP token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token<'a> {
    /// Unquoted atom (includes `\Seen`-style flags).
    Atom(&'a str),
    /// Quoted string with escapes resolved.
    QuotedString(String),
    /// Literal payload, `{n}` prefix already consumed.
    Literal(&'a [u8]),
    /// All-digit atom.
    Number(u32),
    /// `(`
    LParen,
    /// `)`
    RParen,
    /// `[`
    LBracket,
    /// `]`
    RBracket,
    /// SP
    Space,
    /// `*`
    Asterisk,
    /// `+`
    Plus,
    /// `NIL`
    Nil,
    /// CRLF
    Crlf,
    /// End of input.
    Eof,
}
