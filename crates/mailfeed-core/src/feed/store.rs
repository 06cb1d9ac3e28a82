//! The authoritative in-memory feed map.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use rand::Rng;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use super::{Feed, FeedItem, FeedRecord, FeedRepository, render_rss};
use crate::{Error, NewsletterItem, Result};

/// Length of generated feed ids.
pub const FEED_ID_LEN: usize = 4;

/// Ids tried before [`FeedStore::create_feed`] gives up.
pub const FEED_ID_ATTEMPTS: u32 = 8;

const FEED_ID_CHARSET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";

/// Every feed, kept in sync with the repository.
///
/// Items only enter through [`append`](Self::append), which is driven by a
/// single consumer. Readers take the read lock only long enough to render.
#[derive(Debug)]
pub struct FeedStore {
    repo: FeedRepository,
    feeds: RwLock<HashMap<String, Feed>>,
    link_base: Option<String>,
}

impl FeedStore {
    /// Creates an empty store. Channel links are `{link_base}/rss/{id}`, or
    /// just the path when no base is given.
    #[must_use]
    pub fn new(repo: FeedRepository, link_base: Option<String>) -> Self {
        Self {
            repo,
            feeds: RwLock::new(HashMap::new()),
            link_base: link_base.map(|base| base.trim_end_matches('/').to_string()),
        }
    }

    /// The repository behind this store.
    #[must_use]
    pub const fn repository(&self) -> &FeedRepository {
        &self.repo
    }

    /// Rebuilds every feed from the repository, replacing the in-memory map.
    ///
    /// Returns the number of feeds loaded.
    ///
    /// # Errors
    ///
    /// Fails if any query fails or a stored date is malformed.
    pub async fn hydrate(&self) -> Result<usize> {
        let mut loaded = HashMap::new();
        let mut items = 0;
        for record in self.repo.list_feeds().await? {
            let stored = self.repo.list_feed_items(&record.id).await?;
            items += stored.len();
            let mut feed = Feed::from_record(record);
            feed.items = stored.into_iter().map(FeedItem::from).collect();
            loaded.insert(feed.id.clone(), feed);
        }

        let count = loaded.len();
        *self.write() = loaded;
        info!(feeds = count, items, "feed store hydrated");
        Ok(count)
    }

    /// Persists `item` and then adds it to its feed.
    ///
    /// Returns `false` when the item was dropped because no feed is
    /// registered for its inbox. A feed registered after hydration is
    /// loaded on first use.
    ///
    /// # Errors
    ///
    /// Fails if persistence fails; the in-memory feed is then unchanged.
    pub async fn append(&self, item: NewsletterItem) -> Result<bool> {
        if item.feed_title.is_none() {
            warn!(inbox = %item.inbox, subject = %item.subject, "no feed for inbox, item dropped");
            return Ok(false);
        }

        let known = self.read().contains_key(&item.inbox);
        if !known {
            let Some(record) = self.repo.get_feed(&item.inbox).await? else {
                warn!(inbox = %item.inbox, subject = %item.subject, "feed not registered, item dropped");
                return Ok(false);
            };
            debug!(feed = %record.id, "loading feed registered after startup");
            self.write()
                .entry(record.id.clone())
                .or_insert_with(|| Feed::from_record(record));
        }

        self.repo
            .create_feed_item(&item.inbox, &item.subject, &item.body, item.date)
            .await?;

        let mut feeds = self.write();
        let Some(feed) = feeds.get_mut(&item.inbox) else {
            // Present above; the map is only replaced by hydrate
            return Ok(false);
        };
        feed.items.push(FeedItem::new(item.subject, item.body, item.date));
        info!(feed = %feed.id, items = feed.items.len(), "item appended");
        Ok(true)
    }

    /// Renders a feed as RSS, or `None` if it does not exist.
    ///
    /// # Errors
    ///
    /// Fails only if serialization fails.
    pub fn render(&self, id: &str) -> Result<Option<String>> {
        let link = self.link_for(id);
        let feeds = self.read();
        feeds.get(id).map(|feed| render_rss(feed, &link)).transpose()
    }

    /// Copy of a feed's current state.
    #[must_use]
    pub fn snapshot(&self, id: &str) -> Option<Feed> {
        self.read().get(id).cloned()
    }

    /// Number of feeds in memory.
    #[must_use]
    pub fn len(&self) -> usize {
        self.read().len()
    }

    /// True if no feeds are loaded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Registers a new, empty feed under a fresh random id.
    ///
    /// # Errors
    ///
    /// Fails if persistence fails or [`FEED_ID_ATTEMPTS`] ids in a row were
    /// already taken.
    pub async fn create_feed(&self, name: &str) -> Result<FeedRecord> {
        for _ in 0..FEED_ID_ATTEMPTS {
            let id = generate_feed_id();
            if self.read().contains_key(&id) {
                continue;
            }
            if let Some(record) = self.repo.create_feed(&id, name).await? {
                self.write()
                    .insert(record.id.clone(), Feed::from_record(record.clone()));
                info!(feed = %record.id, name, "feed created");
                return Ok(record);
            }
        }
        Err(Error::IdCollision(FEED_ID_ATTEMPTS))
    }

    /// Drains `items` into the store until the channel closes.
    ///
    /// The receiver is the channel's only consumer, so this task is the only
    /// writer of feed items.
    pub async fn consume(self: Arc<Self>, mut items: mpsc::Receiver<NewsletterItem>) {
        while let Some(item) = items.recv().await {
            let inbox = item.inbox.clone();
            if let Err(e) = self.append(item).await {
                error!(%inbox, error = %e, "failed to persist item, dropped");
            }
        }
        debug!("item channel closed, store consumer done");
    }

    fn link_for(&self, id: &str) -> String {
        match &self.link_base {
            Some(base) => format!("{base}/rss/{id}"),
            None => format!("/rss/{id}"),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, Feed>> {
        self.feeds.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, Feed>> {
        self.feeds.write().unwrap_or_else(PoisonError::into_inner)
    }
}

fn generate_feed_id() -> String {
    let mut rng = rand::thread_rng();
    (0..FEED_ID_LEN)
        .map(|_| char::from(FEED_ID_CHARSET[rng.gen_range(0..FEED_ID_CHARSET.len())]))
        .collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::{DateTime, TimeZone, Utc};

    fn at(minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 8, minute, 0).unwrap()
    }

    async fn store_with_feed(id: &str, name: &str) -> FeedStore {
        let repo = FeedRepository::in_memory().await.unwrap();
        repo.create_feed(id, name).await.unwrap();
        let store = FeedStore::new(repo, None);
        store.hydrate().await.unwrap();
        store
    }

    #[test]
    fn generated_ids_are_short_lowercase_alphanumerics() {
        for _ in 0..100 {
            let id = generate_feed_id();
            assert_eq!(id.len(), FEED_ID_LEN);
            assert!(id.bytes().all(|b| FEED_ID_CHARSET.contains(&b)));
        }
    }

    #[tokio::test]
    async fn hydrate_tolerates_empty_feeds() {
        let store = store_with_feed("news", "Daily").await;
        assert_eq!(store.len(), 1);
        assert!(store.snapshot("news").unwrap().items.is_empty());
    }

    #[tokio::test]
    async fn append_persists_then_shows() {
        let store = store_with_feed("news", "Daily").await;
        let appended = store
            .append(NewsletterItem::new("news", "Daily", "Hello", "<p>Hi</p>", at(1)))
            .await
            .unwrap();
        assert!(appended);

        let feed = store.snapshot("news").unwrap();
        assert_eq!(feed.items, vec![FeedItem::new("Hello", "<p>Hi</p>", at(1))]);
        let stored = store.repository().list_feed_items("news").await.unwrap();
        assert_eq!(stored.len(), 1);
    }

    #[tokio::test]
    async fn unknown_inbox_is_dropped_without_persisting() {
        let store = store_with_feed("news", "Daily").await;
        let mut item = NewsletterItem::new("ghost", "Ghost", "s", "b", at(2));
        assert!(!store.append(item.clone()).await.unwrap());

        item.feed_title = None;
        assert!(!store.append(item).await.unwrap());

        assert!(store.snapshot("ghost").is_none());
        assert!(store.repository().list_feed_items("ghost").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn feed_registered_after_hydrate_is_loaded_lazily() {
        let store = store_with_feed("news", "Daily").await;
        store.repository().create_feed("late", "Late").await.unwrap();

        assert!(store
            .append(NewsletterItem::new("late", "Late", "s", "b", at(3)))
            .await
            .unwrap());
        assert_eq!(store.snapshot("late").unwrap().title, "Late");
    }

    #[tokio::test]
    async fn rehydrate_reconstructs_append_order() {
        let store = store_with_feed("news", "Daily").await;
        // Dates deliberately out of order
        for (subject, minute) in [("c", 30), ("a", 10), ("b", 20)] {
            store
                .append(NewsletterItem::new("news", "Daily", subject, subject.to_uppercase(), at(minute)))
                .await
                .unwrap();
        }
        let before = store.snapshot("news").unwrap().items;

        let restarted = FeedStore::new(store.repository().clone(), None);
        restarted.hydrate().await.unwrap();
        assert_eq!(restarted.snapshot("news").unwrap().items, before);
        let registered = store.repository().get_feed("news").await.unwrap().unwrap();
        assert_eq!(restarted.snapshot("news").unwrap().created, registered.created);
        assert_eq!(
            restarted.render("news").unwrap(),
            store.render("news").unwrap()
        );

        let xml = restarted.render("news").unwrap().unwrap();
        let positions: Vec<_> = ["<title>c</title>", "<title>a</title>", "<title>b</title>"]
            .iter()
            .map(|title| xml.find(title).unwrap())
            .collect();
        assert!(positions.windows(2).all(|pair| pair[0] < pair[1]));
        assert!(xml.contains("<description>C</description>"));
    }

    #[tokio::test]
    async fn render_unknown_is_none() {
        let store = store_with_feed("news", "Daily").await;
        assert_eq!(store.render("nope").unwrap(), None);
        assert!(store.render("news").unwrap().unwrap().contains("<title>Daily</title>"));
    }

    #[tokio::test]
    async fn link_uses_base_when_configured() {
        let repo = FeedRepository::in_memory().await.unwrap();
        repo.create_feed("news", "Daily").await.unwrap();
        let store = FeedStore::new(repo, Some("https://feeds.example.com/".into()));
        store.hydrate().await.unwrap();
        let xml = store.render("news").unwrap().unwrap();
        assert!(xml.contains("<link>https://feeds.example.com/rss/news</link>"));
    }

    #[tokio::test]
    async fn created_feed_is_immediately_renderable() {
        let repo = FeedRepository::in_memory().await.unwrap();
        let store = FeedStore::new(repo, None);
        let record = store.create_feed("Test").await.unwrap();
        assert_eq!(record.id.len(), FEED_ID_LEN);
        assert!(store.repository().feed_exists(&record.id).await.unwrap());

        let xml = store.render(&record.id).unwrap().unwrap();
        assert!(xml.contains("<title>Test</title>"));
        assert!(!xml.contains("<item>"));
    }

    #[tokio::test]
    async fn consumer_drains_channel() {
        let store = Arc::new(store_with_feed("news", "Daily").await);
        let (tx, rx) = mpsc::channel(1);
        let consumer = tokio::spawn(Arc::clone(&store).consume(rx));

        tx.send(NewsletterItem::new("news", "Daily", "one", "1", at(4)))
            .await
            .unwrap();
        tx.send(NewsletterItem::new("news", "Daily", "two", "2", at(5)))
            .await
            .unwrap();
        drop(tx);
        consumer.await.unwrap();

        let subjects: Vec<_> = store
            .snapshot("news")
            .unwrap()
            .items
            .into_iter()
            .map(|i| i.subject)
            .collect();
        assert_eq!(subjects, vec!["one", "two"]);
    }
}
