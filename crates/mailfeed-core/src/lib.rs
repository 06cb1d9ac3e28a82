//! # mailfeed-core
//!
//! The ingestion pipeline behind Mail Feed:
//!
//! - [`MailboxWatcher`] keeps an IDLE connection open and turns new-mail
//!   pushes into fetch triggers.
//! - [`Fetcher`] pulls everything at or after the [`MailCursor`], decodes it
//!   and emits [`NewsletterItem`]s.
//! - [`FeedStore`] owns every feed in memory, persists appends through
//!   [`FeedRepository`] and renders RSS on read.
//!
//! ```text
//! IDLE push ─→ MailboxWatcher ─trigger─→ Fetcher ─NewsletterItem─→ FeedStore ─→ RSS
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

pub mod date;
mod error;
pub mod feed;
pub mod fetch;
pub mod mailbox;
mod newsletter;

pub use error::{Error, Result};
pub use feed::{Feed, FeedItem, FeedRecord, FeedRepository, FeedStore, StoredItem, render_rss};
pub use fetch::{FetchError, Fetcher, RecipientFilter, RetryPolicy};
pub use mailbox::{
    Credentials, ImapSession, MailCursor, MailboxError, MailboxSession, MailboxWatcher, RawMessage,
    ServerAddr, WatcherState,
};
pub use newsletter::NewsletterItem;
