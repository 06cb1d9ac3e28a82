//! Response codes, capability data and flag lists.

use crate::parser::lexer::{Lexer, Token};
use crate::types::{Capability, ResponseCode, SeqNum, Uid};
use crate::{Error, Result};

/// Parses `"[" code "]"`.
pub fn parse_response_code(lexer: &mut Lexer<'_>) -> Result<ResponseCode> {
    lexer.expect(Token::LBracket)?;
    let atom = lexer.read_atom_string()?;

    let code = match atom.to_ascii_uppercase().as_str() {
        "ALERT" => ResponseCode::Alert,
        "READ-ONLY" => ResponseCode::ReadOnly,
        "READ-WRITE" => ResponseCode::ReadWrite,
        "UIDNEXT" => {
            lexer.expect_space()?;
            let n = lexer.read_number()?;
            ResponseCode::UidNext(Uid::new(n).ok_or_else(|| zero(lexer, "UIDNEXT"))?)
        }
        "UIDVALIDITY" => {
            lexer.expect_space()?;
            ResponseCode::UidValidity(lexer.read_number()?)
        }
        "UNSEEN" => {
            lexer.expect_space()?;
            let n = lexer.read_number()?;
            ResponseCode::Unseen(SeqNum::new(n).ok_or_else(|| zero(lexer, "UNSEEN"))?)
        }
        "CAPABILITY" => ResponseCode::Capability(parse_capability_data(lexer)?),
        "PERMANENTFLAGS" => {
            lexer.expect_space()?;
            ResponseCode::PermanentFlags(parse_flag_list(lexer)?)
        }
        _ => ResponseCode::Unknown(atom.to_string()),
    };

    while lexer.peek().is_some_and(|b| b != b']') {
        lexer.advance();
    }
    lexer.expect(Token::RBracket)?;

    Ok(code)
}

fn zero(lexer: &Lexer<'_>, what: &str) -> Error {
    Error::Parse {
        position: lexer.position(),
        message: format!("{what} value 0"),
    }
}

/// Parses the space-separated atoms following CAPABILITY.
pub fn parse_capability_data(lexer: &mut Lexer<'_>) -> Result<Vec<Capability>> {
    let mut caps = Vec::new();
    while lexer.peek() == Some(b' ') {
        lexer.advance();
        if let Token::Atom(s) = lexer.next_token()? {
            caps.push(Capability::parse(s));
        }
    }
    Ok(caps)
}

/// Parses `(flag flag ...)`.
///
/// `\*` inside PERMANENTFLAGS lexes as two tokens and is folded back together.
pub fn parse_flag_list(lexer: &mut Lexer<'_>) -> Result<Vec<String>> {
    lexer.expect(Token::LParen)?;
    let mut flags = Vec::new();
    loop {
        match lexer.next_token()? {
            Token::RParen => return Ok(flags),
            Token::Space => {}
            Token::Atom("\\") if lexer.peek() == Some(b'*') => {
                lexer.advance();
                flags.push("\\*".to_string());
            }
            Token::Atom(flag) => flags.push(flag.to_string()),
            token => {
                return Err(Error::Parse {
                    position: lexer.position(),
                    message: format!("unexpected token in flag list: {token:?}"),
                });
            }
        }
    }
}
