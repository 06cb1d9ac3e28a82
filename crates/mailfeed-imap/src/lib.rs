//! # mailfeed-imap
//!
//! The slice of IMAP4rev1 (RFC 3501) that a mailbox watcher needs: an
//! implicit-TLS connection, LOGIN, SELECT with UIDNEXT reporting, IDLE
//! push notifications (RFC 2177) and UID FETCH of header/text sections.
//!
//! ## Connection States
//!
//! The client uses the type-state pattern so that only commands valid in the
//! current protocol state can be issued:
//!
//! ```text
//! NotAuthenticated ── login() ──→ Authenticated ── select() ──→ Selected
//!                                                                │
//!                                        idle() / uid_fetch() ◄──┘
//! ```
//!
//! ## Example
//!
//! ```ignore
//! use std::time::Duration;
//! use mailfeed_imap::{Client, FetchAttribute, IdleEvent, Uid, UidSet};
//!
//! let stream = mailfeed_imap::connect_tls("imap.example.com", 993).await?;
//! let client = Client::from_stream(stream).await?;
//! let client = client.login("user", "secret").await?;
//! let (mut client, status) = client.select("INBOX").await?;
//!
//! let mut idle = client.idle().await?;
//! if let IdleEvent::Exists(n) = idle.wait(Duration::from_secs(600)).await? {
//!     println!("{n} messages");
//! }
//! idle.done().await?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

pub mod command;
pub mod connection;
mod error;
pub mod parser;
pub mod types;

pub use command::{Command, FetchAttribute, TagGenerator};
pub use connection::{
    Authenticated, Client, FramedStream, IdleEvent, IdleHandle, ImapStream, NotAuthenticated,
    ResponseAccumulator, Selected, connect_tls,
};
pub use error::{Error, Result};
pub use parser::{FetchItem, Response, ResponseParser, UntaggedResponse};
pub use types::{Capability, Mailbox, MailboxStatus, ResponseCode, SeqNum, Status, Tag, Uid, UidSet};

/// Default port for IMAP over implicit TLS.
pub const IMAPS_PORT: u16 = 993;
