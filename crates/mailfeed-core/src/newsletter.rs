//! The unit handed from the fetcher to the feed store.

use chrono::{DateTime, Utc};

/// One decoded message bound for a feed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewsletterItem {
    /// Destination inbox id (local part of the recipient).
    pub inbox: String,
    /// Title of the registered feed, or `None` if the inbox is unknown.
    pub feed_title: Option<String>,
    /// Decoded subject.
    pub subject: String,
    /// Selected body text.
    pub body: String,
    /// Message date, whole seconds, UTC.
    pub date: DateTime<Utc>,
}

impl NewsletterItem {
    /// Creates an item for a registered feed.
    #[must_use]
    pub fn new(
        inbox: impl Into<String>,
        feed_title: impl Into<String>,
        subject: impl Into<String>,
        body: impl Into<String>,
        date: DateTime<Utc>,
    ) -> Self {
        Self {
            inbox: inbox.into(),
            feed_title: Some(feed_title.into()),
            subject: subject.into(),
            body: body.into(),
            date,
        }
    }

    /// True when the fetcher found a registered feed for the inbox.
    #[must_use]
    pub const fn is_registered(&self) -> bool {
        self.feed_title.is_some()
    }
}
