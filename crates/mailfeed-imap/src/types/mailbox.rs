//! Mailbox names, SELECT results and response codes.

use super::{Capability, SeqNum, Uid};

/// Mailbox name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Mailbox(pub String);

impl Mailbox {
    /// Creates a mailbox name.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// The INBOX mailbox.
    #[must_use]
    pub fn inbox() -> Self {
        Self("INBOX".to_string())
    }

    /// Returns the name.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Mailbox {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// What the server reported while selecting a mailbox.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MailboxStatus {
    /// Number of messages.
    pub exists: u32,
    /// Number of messages with the \Recent flag.
    pub recent: u32,
    /// First unseen message.
    pub unseen: Option<SeqNum>,
    /// UID the next arriving message will receive.
    pub uid_next: Option<Uid>,
    /// UIDVALIDITY of the mailbox.
    pub uid_validity: Option<u32>,
    /// Flags defined for the mailbox.
    pub flags: Vec<String>,
    /// Whether the mailbox was opened read-only.
    pub read_only: bool,
}

/// Bracketed response code on a status response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponseCode {
    /// Message the user must see.
    Alert,
    /// Capabilities advertised inline.
    Capability(Vec<Capability>),
    /// Flags the client may store permanently.
    PermanentFlags(Vec<String>),
    /// Mailbox is read-only.
    ReadOnly,
    /// Mailbox is read-write.
    ReadWrite,
    /// Next UID to be assigned.
    UidNext(Uid),
    /// UIDVALIDITY value.
    UidValidity(u32),
    /// First unseen message.
    Unseen(SeqNum),
    /// Anything else, kept verbatim.
    Unknown(String),
}
