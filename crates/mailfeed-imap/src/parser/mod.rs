//! Sans-I/O parser for server responses.
//!
//! The [`Lexer`] turns a complete response (CRLF-terminated line with any
//! literals already inlined) into tokens; [`ResponseParser`] builds typed
//! responses from them.
//!
//! ```
//! use mailfeed_imap::parser::{Response, ResponseParser, UntaggedResponse};
//!
//! let response = ResponseParser::parse(b"* 4 EXISTS\r\n").unwrap();
//! assert_eq!(response, Response::Untagged(UntaggedResponse::Exists(4)));
//! ```

pub mod lexer;
pub mod response;

pub use lexer::{Lexer, Token};
pub use response::{FetchItem, Response, ResponseParser, UntaggedResponse};
