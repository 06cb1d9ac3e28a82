//! FETCH data items.

use crate::parser::lexer::{Lexer, Token};
use crate::types::Uid;
use crate::{Error, Result};

use super::FetchItem;
use super::codes::parse_flag_list;

/// Parses the parenthesised item list of a FETCH response.
pub fn parse_fetch_items(lexer: &mut Lexer<'_>) -> Result<Vec<FetchItem>> {
    lexer.expect(Token::LParen)?;
    let mut items = Vec::new();

    loop {
        let name = match lexer.next_token()? {
            Token::RParen => return Ok(items),
            Token::Space => continue,
            Token::Atom(name) => name,
            token => {
                return Err(Error::Parse {
                    position: lexer.position(),
                    message: format!("unexpected token in FETCH: {token:?}"),
                });
            }
        };

        match name.to_ascii_uppercase().as_str() {
            "UID" => {
                lexer.expect_space()?;
                let n = lexer.read_number()?;
                let uid = Uid::new(n).ok_or_else(|| Error::Parse {
                    position: lexer.position(),
                    message: "UID 0 in FETCH".to_string(),
                })?;
                items.push(FetchItem::Uid(uid));
            }
            "FLAGS" => {
                lexer.expect_space()?;
                items.push(FetchItem::Flags(parse_flag_list(lexer)?));
            }
            "RFC822.SIZE" => {
                lexer.expect_space()?;
                items.push(FetchItem::Rfc822Size(lexer.read_number()?));
            }
            "INTERNALDATE" => {
                lexer.expect_space()?;
                items.push(FetchItem::InternalDate(lexer.read_astring()?));
            }
            "BODY" | "BODY.PEEK" | "RFC822" | "RFC822.HEADER" | "RFC822.TEXT" => {
                let (section, origin) = parse_section_and_origin(lexer);
                lexer.expect_space()?;
                let data = match lexer.next_token()? {
                    Token::Literal(bytes) => Some(bytes.to_vec()),
                    Token::QuotedString(s) => Some(s.into_bytes()),
                    Token::Nil => None,
                    token => {
                        return Err(Error::Parse {
                            position: lexer.position(),
                            message: format!("expected section data, got {token:?}"),
                        });
                    }
                };
                items.push(FetchItem::Body {
                    section,
                    origin,
                    data,
                });
            }
            _ => skip_value(lexer),
        }
    }
}

/// Reads the optional `[section]` and `<origin>` after BODY.
fn parse_section_and_origin(lexer: &mut Lexer<'_>) -> (Option<String>, Option<u32>) {
    let mut section = None;
    if lexer.peek() == Some(b'[') {
        lexer.advance();
        let mut text = String::new();
        while let Some(b) = lexer.advance() {
            if b == b']' {
                break;
            }
            text.push(char::from(b));
        }
        section = (!text.is_empty()).then_some(text);
    }

    let mut origin = None;
    if lexer.peek() == Some(b'<') {
        lexer.advance();
        let mut digits = String::new();
        while let Some(b) = lexer.advance() {
            if b == b'>' {
                break;
            }
            digits.push(char::from(b));
        }
        origin = digits.parse().ok();
    }

    (section, origin)
}

/// Skips the value of an item this client does not interpret.
fn skip_value(lexer: &mut Lexer<'_>) {
    if lexer.peek() == Some(b' ') {
        lexer.advance();
    }
    let mut depth = 0usize;
    while let Some(b) = lexer.peek() {
        match b {
            b'(' => depth += 1,
            b')' if depth == 0 => return,
            b')' => depth -= 1,
            b' ' if depth == 0 => return,
            b'{' => {
                // Step over the literal as a whole so its payload cannot unbalance parens.
                if lexer.next_token().is_err() {
                    return;
                }
                continue;
            }
            _ => {}
        }
        lexer.advance();
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn parse(input: &[u8]) -> Vec<FetchItem> {
        parse_fetch_items(&mut Lexer::new(input)).unwrap()
    }

    #[test]
    fn uid_and_sections() {
        let input = b"(UID 12 BODY[HEADER] {18}\r\nSubject: Daily\r\n\r\n BODY[TEXT] {3}\r\nHi!)";
        let items = parse(input);
        assert_eq!(
            items,
            vec![
                FetchItem::Uid(Uid::new(12).unwrap()),
                FetchItem::Body {
                    section: Some("HEADER".to_string()),
                    origin: None,
                    data: Some(b"Subject: Daily\r\n\r\n".to_vec()),
                },
                FetchItem::Body {
                    section: Some("TEXT".to_string()),
                    origin: None,
                    data: Some(b"Hi!".to_vec()),
                },
            ]
        );
    }

    #[test]
    fn partial_origin_and_nil() {
        let items = parse(b"(BODY[]<0> NIL)");
        assert_eq!(
            items,
            vec![FetchItem::Body {
                section: None,
                origin: Some(0),
                data: None,
            }]
        );
    }

    #[test]
    fn flags_size_and_date() {
        let items = parse(b"(FLAGS (\\Seen) RFC822.SIZE 2048 INTERNALDATE \"17-Jul-1996 02:44:25 -0700\")");
        assert_eq!(
            items,
            vec![
                FetchItem::Flags(vec!["\\Seen".to_string()]),
                FetchItem::Rfc822Size(2048),
                FetchItem::InternalDate("17-Jul-1996 02:44:25 -0700".to_string()),
            ]
        );
    }

    #[test]
    fn unknown_items_are_skipped() {
        let items = parse(b"(MODSEQ (624140003) X-GM-LABELS (\"a\" b) UID 9)");
        assert_eq!(items, vec![FetchItem::Uid(Uid::new(9).unwrap())]);
    }

    #[test]
    fn literal_with_parens_in_unknown_item() {
        let items = parse(b"(X-BLOB {3}\r\n)(( UID 4)");
        assert_eq!(items, vec![FetchItem::Uid(Uid::new(4).unwrap())]);
    }
}
