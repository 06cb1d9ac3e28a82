//! Response parsing.

#![allow(clippy::missing_errors_doc)]

mod codes;
mod fetch;

use crate::parser::lexer::{Lexer, Token};
use crate::types::{Capability, ResponseCode, SeqNum, Status, Tag, Uid};
use crate::{Error, Result};

use codes::{parse_capability_data, parse_flag_list, parse_response_code};

/// One complete server response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    /// Completion of a tagged command.
    Tagged {
        /// Tag of the command being completed.
        tag: Tag,
        /// OK, NO or BAD.
        status: Status,
        /// Bracketed response code.
        code: Option<ResponseCode>,
        /// Trailing human-readable text.
        text: String,
    },
    /// Server data.
    Untagged(UntaggedResponse),
    /// Continuation request (`+`).
    Continuation {
        /// Trailing text, if any.
        text: Option<String>,
    },
}

/// Untagged server data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UntaggedResponse {
    /// `* OK`
    Ok {
        /// Response code.
        code: Option<ResponseCode>,
        /// Text.
        text: String,
    },
    /// `* NO`
    No {
        /// Response code.
        code: Option<ResponseCode>,
        /// Text.
        text: String,
    },
    /// `* BAD`
    Bad {
        /// Response code.
        code: Option<ResponseCode>,
        /// Text.
        text: String,
    },
    /// `* PREAUTH`
    PreAuth {
        /// Response code.
        code: Option<ResponseCode>,
        /// Text.
        text: String,
    },
    /// `* BYE`
    Bye {
        /// Response code.
        code: Option<ResponseCode>,
        /// Text.
        text: String,
    },
    /// `* CAPABILITY ...`
    Capability(Vec<Capability>),
    /// `* FLAGS (...)`
    Flags(Vec<String>),
    /// `* n EXISTS`
    Exists(u32),
    /// `* n RECENT`
    Recent(u32),
    /// `* n EXPUNGE`
    Expunge(SeqNum),
    /// `* n FETCH (...)`
    Fetch {
        /// Sequence number of the message.
        seq: SeqNum,
        /// Returned data items.
        items: Vec<FetchItem>,
    },
    /// Untagged data this client does not interpret, kept as text.
    Other(String),
}

/// A data item inside a FETCH response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchItem {
    /// UID.
    Uid(Uid),
    /// FLAGS.
    Flags(Vec<String>),
    /// RFC822.SIZE.
    Rfc822Size(u32),
    /// INTERNALDATE.
    InternalDate(String),
    /// A body section.
    Body {
        /// Section specifier, `None` for the full message.
        section: Option<String>,
        /// Partial-fetch origin.
        origin: Option<u32>,
        /// Section bytes; `None` when the server sent NIL.
        data: Option<Vec<u8>>,
    },
}

/// Stateless parser entry point.
pub struct ResponseParser;

impl ResponseParser {
    /// Parses one complete response.
    pub fn parse(input: &[u8]) -> Result<Response> {
        let mut lexer = Lexer::new(input);

        match lexer.next_token()? {
            Token::Asterisk => Self::parse_untagged(&mut lexer),
            Token::Plus => {
                if lexer.peek() == Some(b' ') {
                    lexer.advance();
                }
                let text = lexer.read_text_until_crlf();
                Ok(Response::Continuation {
                    text: (!text.is_empty()).then_some(text),
                })
            }
            Token::Atom(tag) => Self::parse_tagged(&mut lexer, tag),
            token => Err(Error::Parse {
                position: 0,
                message: format!("expected *, + or tag, got {token:?}"),
            }),
        }
    }

    fn parse_tagged(lexer: &mut Lexer<'_>, tag: &str) -> Result<Response> {
        lexer.expect_space()?;
        let status = Self::parse_status(lexer)?;
        let (code, text) = Self::parse_resp_text(lexer)?;
        Ok(Response::Tagged {
            tag: Tag::new(tag),
            status,
            code,
            text,
        })
    }

    fn parse_untagged(lexer: &mut Lexer<'_>) -> Result<Response> {
        lexer.expect_space()?;

        let untagged = match lexer.next_token()? {
            Token::Atom(word) => match word.to_ascii_uppercase().as_str() {
                "OK" => {
                    let (code, text) = Self::parse_resp_text(lexer)?;
                    UntaggedResponse::Ok { code, text }
                }
                "NO" => {
                    let (code, text) = Self::parse_resp_text(lexer)?;
                    UntaggedResponse::No { code, text }
                }
                "BAD" => {
                    let (code, text) = Self::parse_resp_text(lexer)?;
                    UntaggedResponse::Bad { code, text }
                }
                "PREAUTH" => {
                    let (code, text) = Self::parse_resp_text(lexer)?;
                    UntaggedResponse::PreAuth { code, text }
                }
                "BYE" => {
                    let (code, text) = Self::parse_resp_text(lexer)?;
                    UntaggedResponse::Bye { code, text }
                }
                "CAPABILITY" => UntaggedResponse::Capability(parse_capability_data(lexer)?),
                "FLAGS" => {
                    lexer.expect_space()?;
                    UntaggedResponse::Flags(parse_flag_list(lexer)?)
                }
                _ => {
                    let rest = lexer.read_text_until_crlf();
                    UntaggedResponse::Other(format!("{word}{rest}"))
                }
            },
            Token::Number(n) => {
                lexer.expect_space()?;
                let keyword = lexer.read_atom_string()?;
                match keyword.to_ascii_uppercase().as_str() {
                    "EXISTS" => UntaggedResponse::Exists(n),
                    "RECENT" => UntaggedResponse::Recent(n),
                    "EXPUNGE" => UntaggedResponse::Expunge(seq_num(lexer, n)?),
                    "FETCH" => {
                        let seq = seq_num(lexer, n)?;
                        lexer.expect_space()?;
                        let items = fetch::parse_fetch_items(lexer)?;
                        UntaggedResponse::Fetch { seq, items }
                    }
                    _ => {
                        let rest = lexer.read_text_until_crlf();
                        UntaggedResponse::Other(format!("{n} {keyword}{rest}"))
                    }
                }
            }
            token => {
                return Err(Error::Parse {
                    position: lexer.position(),
                    message: format!("unexpected token in untagged response: {token:?}"),
                });
            }
        };

        Ok(Response::Untagged(untagged))
    }

    fn parse_status(lexer: &mut Lexer<'_>) -> Result<Status> {
        let word = lexer.read_atom_string()?;
        match word.to_ascii_uppercase().as_str() {
            "OK" => Ok(Status::Ok),
            "NO" => Ok(Status::No),
            "BAD" => Ok(Status::Bad),
            "PREAUTH" => Ok(Status::PreAuth),
            "BYE" => Ok(Status::Bye),
            _ => Err(Error::Parse {
                position: lexer.position(),
                message: format!("invalid status: {word}"),
            }),
        }
    }

    /// `[SP] ["[" code "]" SP] text`. Some servers omit the text entirely.
    fn parse_resp_text(lexer: &mut Lexer<'_>) -> Result<(Option<ResponseCode>, String)> {
        if lexer.peek() == Some(b' ') {
            lexer.advance();
        }
        let code = if lexer.peek() == Some(b'[') {
            Some(parse_response_code(lexer)?)
        } else {
            None
        };
        if lexer.peek() == Some(b' ') {
            lexer.advance();
        }
        Ok((code, lexer.read_text_until_crlf()))
    }
}

fn seq_num(lexer: &Lexer<'_>, n: u32) -> Result<SeqNum> {
    SeqNum::new(n).ok_or_else(|| Error::Parse {
        position: lexer.position(),
        message: "sequence number 0".to_string(),
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn greeting() {
        let response = ResponseParser::parse(b"* OK Dovecot ready.\r\n").unwrap();
        assert_eq!(
            response,
            Response::Untagged(UntaggedResponse::Ok {
                code: None,
                text: "Dovecot ready.".to_string(),
            })
        );
    }

    #[test]
    fn tagged_no_with_code() {
        let response =
            ResponseParser::parse(b"A0002 NO [AUTHENTICATIONFAILED] Invalid credentials\r\n")
                .unwrap();
        let Response::Tagged {
            tag,
            status,
            code,
            text,
        } = response
        else {
            panic!("expected tagged");
        };
        assert_eq!(tag.as_str(), "A0002");
        assert_eq!(status, Status::No);
        assert_eq!(
            code,
            Some(ResponseCode::Unknown("AUTHENTICATIONFAILED".to_string()))
        );
        assert_eq!(text, "Invalid credentials");
    }

    #[test]
    fn tagged_ok_without_text() {
        let response = ResponseParser::parse(b"A0003 OK\r\n").unwrap();
        assert!(matches!(
            response,
            Response::Tagged { status: Status::Ok, ref text, .. } if text.is_empty()
        ));
    }

    #[test]
    fn uidnext_code() {
        let response = ResponseParser::parse(b"* OK [UIDNEXT 4392] Predicted next UID\r\n").unwrap();
        let Response::Untagged(UntaggedResponse::Ok { code, .. }) = response else {
            panic!("expected untagged OK");
        };
        assert_eq!(code, Some(ResponseCode::UidNext(Uid::new(4392).unwrap())));
    }

    #[test]
    fn exists_and_expunge() {
        assert_eq!(
            ResponseParser::parse(b"* 18 EXISTS\r\n").unwrap(),
            Response::Untagged(UntaggedResponse::Exists(18))
        );
        assert_eq!(
            ResponseParser::parse(b"* 3 EXPUNGE\r\n").unwrap(),
            Response::Untagged(UntaggedResponse::Expunge(SeqNum::new(3).unwrap()))
        );
        assert!(ResponseParser::parse(b"* 0 EXPUNGE\r\n").is_err());
    }

    #[test]
    fn capability_list() {
        let response = ResponseParser::parse(b"* CAPABILITY IMAP4rev1 IDLE AUTH=PLAIN\r\n").unwrap();
        let Response::Untagged(UntaggedResponse::Capability(caps)) = response else {
            panic!("expected capability");
        };
        assert_eq!(
            caps,
            vec![
                Capability::Imap4Rev1,
                Capability::Idle,
                Capability::Auth("PLAIN".to_string())
            ]
        );
    }

    #[test]
    fn flags_list() {
        let response = ResponseParser::parse(b"* FLAGS (\\Answered \\Seen $Junk)\r\n").unwrap();
        assert_eq!(
            response,
            Response::Untagged(UntaggedResponse::Flags(vec![
                "\\Answered".to_string(),
                "\\Seen".to_string(),
                "$Junk".to_string(),
            ]))
        );
    }

    #[test]
    fn unknown_untagged_is_kept() {
        let response = ResponseParser::parse(b"* ENABLED CONDSTORE\r\n").unwrap();
        assert_eq!(
            response,
            Response::Untagged(UntaggedResponse::Other("ENABLED CONDSTORE".to_string()))
        );
    }

    #[test]
    fn continuation_with_and_without_text() {
        assert_eq!(
            ResponseParser::parse(b"+ idling\r\n").unwrap(),
            Response::Continuation {
                text: Some("idling".to_string())
            }
        );
        assert_eq!(
            ResponseParser::parse(b"+\r\n").unwrap(),
            Response::Continuation { text: None }
        );
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(ResponseParser::parse(b")\r\n").is_err());
        assert!(ResponseParser::parse(b"A1 MAYBE\r\n").is_err());
    }
}
