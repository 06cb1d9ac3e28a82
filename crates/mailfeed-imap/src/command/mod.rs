//! IMAP commands and their wire encoding.

mod serialize;
mod tag_generator;

use crate::types::{Mailbox, UidSet};

pub use tag_generator::TagGenerator;

use serialize::{write_astring, write_fetch_attributes};

/// A FETCH data item to request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchAttribute {
    /// UID.
    Uid,
    /// FLAGS.
    Flags,
    /// INTERNALDATE.
    InternalDate,
    /// RFC822.SIZE.
    Rfc822Size,
    /// `BODY[section]` or `BODY.PEEK[section]`.
    Body {
        /// Section specifier such as `HEADER` or `TEXT`; `None` is the whole message.
        section: Option<String>,
        /// Leave the \Seen flag untouched.
        peek: bool,
    },
}

impl FetchAttribute {
    /// `BODY[HEADER]`.
    #[must_use]
    pub fn header() -> Self {
        Self::Body {
            section: Some("HEADER".to_string()),
            peek: false,
        }
    }

    /// `BODY[TEXT]`.
    #[must_use]
    pub fn text() -> Self {
        Self::Body {
            section: Some("TEXT".to_string()),
            peek: false,
        }
    }
}

/// Commands the client can issue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// CAPABILITY.
    Capability,
    /// NOOP.
    Noop,
    /// LOGOUT.
    Logout,
    /// LOGIN with a plaintext user name and password.
    Login {
        /// User name.
        username: String,
        /// Password.
        password: String,
    },
    /// SELECT.
    Select {
        /// Mailbox to open.
        mailbox: Mailbox,
    },
    /// IDLE (RFC 2177).
    Idle,
    /// DONE, the untagged continuation that ends IDLE.
    Done,
    /// UID FETCH.
    UidFetch {
        /// UIDs to fetch.
        uids: UidSet,
        /// Data items to return.
        items: Vec<FetchAttribute>,
    },
}

impl Command {
    /// Encodes the command with `tag`, including the trailing CRLF.
    #[must_use]
    pub fn serialize(&self, tag: &str) -> Vec<u8> {
        let mut buf = Vec::with_capacity(64);

        if !matches!(self, Self::Done) {
            buf.extend_from_slice(tag.as_bytes());
            buf.push(b' ');
        }

        match self {
            Self::Capability => buf.extend_from_slice(b"CAPABILITY"),
            Self::Noop => buf.extend_from_slice(b"NOOP"),
            Self::Logout => buf.extend_from_slice(b"LOGOUT"),
            Self::Login { username, password } => {
                buf.extend_from_slice(b"LOGIN ");
                write_astring(&mut buf, username);
                buf.push(b' ');
                write_astring(&mut buf, password);
            }
            Self::Select { mailbox } => {
                buf.extend_from_slice(b"SELECT ");
                write_astring(&mut buf, mailbox.as_str());
            }
            Self::Idle => buf.extend_from_slice(b"IDLE"),
            Self::Done => buf.extend_from_slice(b"DONE"),
            Self::UidFetch { uids, items } => {
                buf.extend_from_slice(b"UID FETCH ");
                buf.extend_from_slice(uids.to_string().as_bytes());
                buf.push(b' ');
                write_fetch_attributes(&mut buf, items);
            }
        }

        buf.extend_from_slice(b"\r\n");
        buf
    }

    /// Command name for logs. Never includes arguments, so credentials stay out.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Capability => "CAPABILITY",
            Self::Noop => "NOOP",
            Self::Logout => "LOGOUT",
            Self::Login { .. } => "LOGIN",
            Self::Select { .. } => "SELECT",
            Self::Idle => "IDLE",
            Self::Done => "DONE",
            Self::UidFetch { .. } => "UID FETCH",
        }
    }
}
