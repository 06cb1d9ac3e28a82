//! Feeds: the persisted item log, the in-memory store and RSS rendering.

mod render;
mod repository;
mod store;

use chrono::{DateTime, Utc};

pub use render::{MANAGING_EDITOR, render_rss};
pub use repository::{EmailRecord, FeedRecord, FeedRepository, StoredItem};
pub use store::{FEED_ID_ATTEMPTS, FEED_ID_LEN, FeedStore};

/// One entry in a feed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedItem {
    /// Item title.
    pub subject: String,
    /// Item body.
    pub body: String,
    /// Message date.
    pub date: DateTime<Utc>,
}

impl FeedItem {
    /// Creates an item.
    #[must_use]
    pub fn new(subject: impl Into<String>, body: impl Into<String>, date: DateTime<Utc>) -> Self {
        Self {
            subject: subject.into(),
            body: body.into(),
            date,
        }
    }
}

impl From<StoredItem> for FeedItem {
    fn from(item: StoredItem) -> Self {
        Self {
            subject: item.subject,
            body: item.body,
            date: item.date,
        }
    }
}

/// In-memory view of one feed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Feed {
    /// Feed id.
    pub id: String,
    /// Title shown to readers.
    pub title: String,
    /// When the feed was registered.
    pub created: DateTime<Utc>,
    /// Items in append order.
    pub items: Vec<FeedItem>,
}

impl Feed {
    /// Creates an empty feed for a registry record.
    #[must_use]
    pub fn from_record(record: FeedRecord) -> Self {
        Self {
            id: record.id,
            title: record.name,
            created: record.created,
            items: Vec::new(),
        }
    }
}
