//! Error types for the core library.

use thiserror::Error;

use crate::fetch::FetchError;
use crate::mailbox::MailboxError;

/// Errors that can occur in core operations.
#[derive(Debug, Error)]
pub enum Error {
    /// IMAP operation failed.
    #[error("IMAP error: {0}")]
    Imap(#[from] mailfeed_imap::Error),

    /// Message body could not be decoded.
    #[error("MIME error: {0}")]
    Mime(#[from] mailfeed_mime::Error),

    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Stored or header timestamp did not parse.
    #[error("Date error: {0}")]
    Date(String),

    /// Mailbox session could not be established or used.
    #[error(transparent)]
    Mailbox(#[from] MailboxError),

    /// A fetch pass gave up.
    #[error(transparent)]
    Fetch(#[from] FetchError),

    /// Feed could not be serialized.
    #[error("Render error: {0}")]
    Render(String),

    /// No unused feed id was found.
    #[error("No unused feed id after {0} attempts")]
    IdCollision(u32),

    /// The other end of a pipeline channel went away.
    #[error("Pipeline channel closed")]
    ChannelClosed,
}

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;
