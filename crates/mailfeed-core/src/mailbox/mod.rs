//! Mailbox sessions, the fetch cursor and the watcher state machine.

mod session;
mod watcher;

use std::fmt;
use std::future::Future;
use std::num::NonZeroU32;

use mailfeed_imap::Uid;

pub use session::{INBOX, ImapSession, open_selected};
pub use watcher::{IDLE_REISSUE, MailboxWatcher, WatcherState};

use crate::Result;

/// Errors while establishing or driving a mailbox session.
#[derive(Debug, thiserror::Error)]
pub enum MailboxError {
    /// Connection failed.
    #[error("Connection failed: {0}")]
    Connection(String),

    /// Authentication failed.
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// Operation failed.
    #[error("Operation failed: {0}")]
    Operation(String),

    /// The watcher was asked to do something its current state forbids.
    #[error("Cannot {action} while {state}")]
    InvalidTransition {
        /// State the watcher was in.
        state: WatcherState,
        /// What was attempted.
        action: &'static str,
    },
}

/// Where the IMAP server lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerAddr {
    /// Host name, also used for TLS verification.
    pub host: String,
    /// TCP port.
    pub port: u16,
}

impl ServerAddr {
    /// Creates an address.
    #[must_use]
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// Parses `host` or `host:port`, defaulting to the IMAPS port.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        let value = value.trim();
        match value.rsplit_once(':') {
            Some((host, port)) if !host.is_empty() => {
                port.parse().ok().map(|port| Self::new(host, port))
            }
            Some(_) => None,
            None if value.is_empty() => None,
            None => Some(Self::new(value, mailfeed_imap::IMAPS_PORT)),
        }
    }
}

impl fmt::Display for ServerAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// LOGIN credentials.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    /// Account name.
    pub username: String,
    /// Account password.
    pub password: String,
}

impl Credentials {
    /// Creates credentials.
    #[must_use]
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// The next UID that has not been processed.
///
/// Never zero and never decreases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MailCursor(NonZeroU32);

impl MailCursor {
    /// Creates a cursor; zero is raised to one.
    #[must_use]
    pub fn new(next_uid: u32) -> Self {
        Self(NonZeroU32::new(next_uid).unwrap_or(NonZeroU32::MIN))
    }

    /// Cursor value.
    #[must_use]
    pub const fn get(self) -> u32 {
        self.0.get()
    }

    /// Cursor as a UID for `UID FETCH n:*`.
    #[must_use]
    pub const fn as_uid(self) -> Uid {
        Uid(self.0)
    }

    /// True if `uid` has not been processed yet.
    #[must_use]
    pub const fn admits(self, uid: u32) -> bool {
        uid >= self.0.get()
    }

    /// Moves past `max_uid`, ignoring values that would move it backwards.
    pub fn advance_past(&mut self, max_uid: u32) {
        let next = Self::new(max_uid.saturating_add(1));
        if next > *self {
            *self = next;
        }
    }
}

impl fmt::Display for MailCursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One message as returned by the server, before decoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawMessage {
    /// Server-assigned UID.
    pub uid: u32,
    /// `BODY[HEADER]` bytes, including the terminating empty line.
    pub header: Vec<u8>,
    /// `BODY[TEXT]` bytes.
    pub text: Vec<u8>,
}

/// A selected mailbox that can be asked for messages by UID.
///
/// Owned by exactly one fetcher; never shared between tasks.
pub trait MailboxSession: Send {
    /// Returns messages with UID at or after `cursor`, in server order.
    ///
    /// May include one message below the cursor when nothing newer exists.
    fn fetch_from(
        &mut self,
        cursor: MailCursor,
    ) -> impl Future<Output = Result<Vec<RawMessage>>> + Send;

    /// Ends the session, logging out where possible.
    fn close(self) -> impl Future<Output = ()> + Send
    where
        Self: Sized;
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn cursor_starts_at_one() {
        assert_eq!(MailCursor::new(0).get(), 1);
        assert_eq!(MailCursor::new(42).get(), 42);
    }

    #[test]
    fn cursor_admits_from_its_value() {
        let cursor = MailCursor::new(10);
        assert!(!cursor.admits(9));
        assert!(cursor.admits(10));
        assert!(cursor.admits(11));
    }

    #[test]
    fn cursor_saturates() {
        let mut cursor = MailCursor::new(5);
        cursor.advance_past(u32::MAX);
        assert_eq!(cursor.get(), u32::MAX);
    }

    #[test]
    fn server_addr_parsing() {
        assert_eq!(
            ServerAddr::parse("imap.example.com"),
            Some(ServerAddr::new("imap.example.com", 993))
        );
        assert_eq!(
            ServerAddr::parse("localhost:1143"),
            Some(ServerAddr::new("localhost", 1143))
        );
        assert_eq!(ServerAddr::parse("host:notaport"), None);
        assert_eq!(ServerAddr::parse(":993"), None);
        assert_eq!(ServerAddr::parse(""), None);
    }

    #[test]
    fn credentials_debug_hides_password() {
        let debug = format!("{:?}", Credentials::new("me", "hunter2"));
        assert!(debug.contains("me"));
        assert!(!debug.contains("hunter2"));
    }

    proptest! {
        #[test]
        fn cursor_never_decreases(start in 1u32..1000, uids in proptest::collection::vec(0u32..2000, 0..20)) {
            let mut cursor = MailCursor::new(start);
            for uid in uids {
                let before = cursor;
                cursor.advance_past(uid);
                prop_assert!(cursor >= before);
                prop_assert!(cursor.get() > uid || cursor == before);
            }
        }
    }
}
