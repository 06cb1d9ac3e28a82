//! Core IMAP types used by the watcher-facing subset of the protocol.

#![allow(clippy::missing_const_for_fn)]

mod capability;
mod identifiers;
mod mailbox;
mod sequence;

pub use capability::{Capability, Status};
pub use identifiers::{SeqNum, Tag, Uid};
pub use mailbox::{Mailbox, MailboxStatus, ResponseCode};
pub use sequence::UidSet;
