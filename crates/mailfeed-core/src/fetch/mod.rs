//! The fetch loop: pull new mail on each trigger and hand items to the store.

mod message;

use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

pub use message::{RecipientFilter, inbox_id};

use crate::feed::FeedRepository;
use crate::mailbox::{MailCursor, MailboxSession, RawMessage};
use crate::{Error, NewsletterItem, Result};

/// A fetch pass that gave up.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FetchError {
    /// Every attempt failed or came back empty.
    #[error("Fetch abandoned after {attempts} attempts: {reason}")]
    Transient {
        /// Attempts made, including the first.
        attempts: u32,
        /// Outcome of the last attempt.
        reason: String,
    },
}

/// How often an empty or failed fetch is retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub retries: u32,
    /// Fixed pause before each retry.
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            retries: 3,
            backoff: Duration::from_secs(1),
        }
    }
}

/// Owns the fetch session and the cursor.
///
/// Each pass fetches everything at or after the cursor, emits one
/// [`NewsletterItem`] per decoded, addressed message and then moves the
/// cursor past the highest UID in the batch.
#[derive(Debug)]
pub struct Fetcher<S> {
    session: S,
    cursor: MailCursor,
    filter: RecipientFilter,
    repo: FeedRepository,
    items: mpsc::Sender<NewsletterItem>,
    policy: RetryPolicy,
}

impl<S: MailboxSession> Fetcher<S> {
    /// Creates a fetcher that accepts any recipient and uses the default
    /// retry policy.
    #[must_use]
    pub fn new(
        session: S,
        cursor: MailCursor,
        repo: FeedRepository,
        items: mpsc::Sender<NewsletterItem>,
    ) -> Self {
        Self {
            session,
            cursor,
            filter: RecipientFilter::any(),
            repo,
            items,
            policy: RetryPolicy::default(),
        }
    }

    /// Restricts which recipients are ingested.
    #[must_use]
    pub fn with_filter(mut self, filter: RecipientFilter) -> Self {
        self.filter = filter;
        self
    }

    /// Overrides the retry policy.
    #[must_use]
    pub const fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// The next UID to be processed.
    #[must_use]
    pub const fn cursor(&self) -> MailCursor {
        self.cursor
    }

    /// Fetches messages at or after the cursor, retrying empty or failed
    /// results.
    ///
    /// Messages below the cursor are discarded first; `UID FETCH n:*`
    /// returns the newest message even when `n` is past it.
    ///
    /// # Errors
    ///
    /// [`FetchError::Transient`] once every attempt has failed.
    pub async fn fetch_once(&mut self) -> std::result::Result<Vec<RawMessage>, FetchError> {
        let attempts = self.policy.retries.saturating_add(1);
        let mut reason = String::new();

        for attempt in 1..=attempts {
            match self.session.fetch_from(self.cursor).await {
                Ok(mut messages) => {
                    let cursor = self.cursor;
                    messages.retain(|m| cursor.admits(m.uid));
                    if !messages.is_empty() {
                        return Ok(messages);
                    }
                    reason = "no new messages".to_string();
                }
                Err(e) => reason = e.to_string(),
            }
            debug!(attempt, cursor = %self.cursor, %reason, "fetch attempt failed");
            if attempt < attempts {
                tokio::time::sleep(self.policy.backoff).await;
            }
        }

        Err(FetchError::Transient { attempts, reason })
    }

    /// Runs one fetch pass and returns the number of items handed on.
    ///
    /// An abandoned fetch is logged and leaves the cursor where it was.
    /// Messages that fail to decode are logged and skipped, and the cursor
    /// still moves past them.
    ///
    /// # Errors
    ///
    /// [`Error::ChannelClosed`] if the store has stopped consuming.
    pub async fn run_pass(&mut self) -> Result<usize> {
        let messages = match self.fetch_once().await {
            Ok(messages) => messages,
            Err(e) => {
                warn!(cursor = %self.cursor, error = %e, "fetch pass abandoned");
                return Ok(0);
            }
        };

        let mut delivered = 0;
        for raw in &messages {
            match message::normalize(raw, &self.filter, &self.repo).await {
                Ok(Some(item)) => {
                    self.items
                        .send(item)
                        .await
                        .map_err(|_| Error::ChannelClosed)?;
                    delivered += 1;
                }
                Ok(None) => {}
                Err(e) => warn!(uid = raw.uid, error = %e, "message skipped"),
            }
        }

        if let Some(max_uid) = messages.iter().map(|m| m.uid).max() {
            self.cursor.advance_past(max_uid);
        }
        info!(
            fetched = messages.len(),
            delivered,
            cursor = %self.cursor,
            "fetch pass complete"
        );
        Ok(delivered)
    }

    /// Runs a pass per trigger until the trigger channel closes, then closes
    /// the session.
    ///
    /// # Errors
    ///
    /// [`Error::ChannelClosed`] if the store stopped consuming first.
    pub async fn run(mut self, mut triggers: mpsc::Receiver<()>) -> Result<()> {
        info!(cursor = %self.cursor, "fetcher started");
        let result = loop {
            if triggers.recv().await.is_none() {
                break Ok(());
            }
            if let Err(e) = self.run_pass().await {
                break Err(e);
            }
        };
        self.session.close().await;
        info!(cursor = %self.cursor, "fetcher stopped");
        result
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};
    use tokio::time::Instant;

    // Tests that pause the clock do so after the repository is open; sqlite
    // works on its own thread and must not see auto-advanced time.
    type Script = VecDeque<Result<Vec<RawMessage>>>;

    /// Replays scripted fetch results and records every cursor asked for.
    struct ScriptedSession {
        script: Script,
        requested: Arc<Mutex<Vec<u32>>>,
        closed: Arc<Mutex<bool>>,
    }

    impl MailboxSession for ScriptedSession {
        async fn fetch_from(&mut self, cursor: MailCursor) -> Result<Vec<RawMessage>> {
            self.requested.lock().unwrap().push(cursor.get());
            self.script.pop_front().unwrap_or_else(|| Ok(Vec::new()))
        }

        async fn close(self) {
            *self.closed.lock().unwrap() = true;
        }
    }

    struct Harness {
        fetcher: Fetcher<ScriptedSession>,
        items: mpsc::Receiver<NewsletterItem>,
        requested: Arc<Mutex<Vec<u32>>>,
        closed: Arc<Mutex<bool>>,
    }

    async fn harness(cursor: u32, script: Script) -> Harness {
        let repo = FeedRepository::in_memory().await.unwrap();
        repo.create_feed("news", "Daily").await.unwrap();
        let requested = Arc::new(Mutex::new(Vec::new()));
        let closed = Arc::new(Mutex::new(false));
        let session = ScriptedSession {
            script,
            requested: Arc::clone(&requested),
            closed: Arc::clone(&closed),
        };
        let (tx, rx) = mpsc::channel(16);
        Harness {
            fetcher: Fetcher::new(session, MailCursor::new(cursor), repo, tx),
            items: rx,
            requested,
            closed,
        }
    }

    fn message(uid: u32, subject: &str) -> RawMessage {
        RawMessage {
            uid,
            header: format!(
                "To: news@example.com\r\nSubject: {subject}\r\n\
                 Date: Mon, 3 Jun 2024 10:00:00 +0000\r\nContent-Type: text/plain\r\n\r\n"
            )
            .into_bytes(),
            text: format!("body of {subject}").into_bytes(),
        }
    }

    fn broken(uid: u32) -> RawMessage {
        RawMessage {
            uid,
            header: b"To: news@example.com\r\nDate: Mon, 3 Jun 2024 10:00:00 +0000\r\n\r\n".to_vec(),
            text: b"no content type".to_vec(),
        }
    }

    fn failure() -> Result<Vec<RawMessage>> {
        Err(Error::Mailbox(crate::MailboxError::Operation("timeout".into())))
    }

    /// Scripted I/O and the store thread nudge the paused clock a little
    /// past the sleeps themselves.
    fn assert_backoff(started: Instant, expected: Duration) {
        let elapsed = started.elapsed();
        assert!(
            elapsed >= expected && elapsed < expected + Duration::from_millis(100),
            "waited {elapsed:?}, expected about {expected:?}"
        );
    }

    #[tokio::test]
    async fn retries_three_times_with_fixed_backoff() {
        let script = Script::from([Ok(Vec::new()), failure(), Ok(Vec::new()), failure()]);
        let mut h = harness(10, script).await;
        tokio::time::pause();

        let started = Instant::now();
        let err = h.fetcher.fetch_once().await.unwrap_err();
        assert_backoff(started, Duration::from_secs(3));
        assert_eq!(
            err,
            FetchError::Transient {
                attempts: 4,
                reason: "Operation failed: timeout".into()
            }
        );
        assert_eq!(*h.requested.lock().unwrap(), vec![10, 10, 10, 10]);
    }

    #[tokio::test]
    async fn late_success_is_returned() {
        let script = Script::from([failure(), Ok(vec![message(10, "a")])]);
        let mut h = harness(10, script).await;
        tokio::time::pause();

        let started = Instant::now();
        let messages = h.fetcher.fetch_once().await.unwrap();
        assert_backoff(started, Duration::from_secs(1));
        assert_eq!(messages.len(), 1);
    }

    #[tokio::test]
    async fn exhausted_pass_leaves_cursor_unchanged() {
        let mut h = harness(10, Script::new()).await;
        tokio::time::pause();
        assert_eq!(h.fetcher.run_pass().await.unwrap(), 0);
        assert_eq!(h.fetcher.cursor(), MailCursor::new(10));
        assert!(h.items.try_recv().is_err());
    }

    #[tokio::test]
    async fn stale_message_below_cursor_is_not_replayed() {
        let script = Script::from([Ok(vec![message(9, "old")])]);
        let mut h = harness(10, script).await;
        tokio::time::pause();
        assert_eq!(h.fetcher.run_pass().await.unwrap(), 0);
        assert_eq!(h.fetcher.cursor(), MailCursor::new(10));
    }

    #[tokio::test]
    async fn cursor_moves_past_whole_batch() {
        let script = Script::from([Ok(vec![
            message(10, "first"),
            broken(11),
            message(12, "third"),
        ])]);
        let mut h = harness(10, script).await;

        assert_eq!(h.fetcher.run_pass().await.unwrap(), 2);
        assert_eq!(h.fetcher.cursor(), MailCursor::new(13));

        let first = h.items.recv().await.unwrap();
        let third = h.items.recv().await.unwrap();
        assert_eq!(first.subject, "first");
        assert_eq!(third.subject, "third");
        assert_eq!(third.body, "body of third");
    }

    #[tokio::test]
    async fn batch_of_only_bad_messages_still_advances() {
        let script = Script::from([Ok(vec![broken(20), broken(21)])]);
        let mut h = harness(20, script).await;
        assert_eq!(h.fetcher.run_pass().await.unwrap(), 0);
        assert_eq!(h.fetcher.cursor(), MailCursor::new(22));
    }

    #[tokio::test]
    async fn closed_store_stops_the_pass() {
        let script = Script::from([Ok(vec![message(5, "a")])]);
        let mut h = harness(5, script).await;
        drop(h.items);
        assert!(matches!(
            h.fetcher.run_pass().await,
            Err(Error::ChannelClosed)
        ));
    }

    #[tokio::test]
    async fn run_stops_and_closes_when_triggers_end() {
        let script = Script::from([Ok(vec![message(3, "a")])]);
        let h = harness(3, script).await;
        let (trigger, triggers) = mpsc::channel(1);
        let mut items = h.items;
        let closed = h.closed;

        let task = tokio::spawn(h.fetcher.run(triggers));
        trigger.send(()).await.unwrap();
        assert_eq!(items.recv().await.unwrap().subject, "a");
        drop(trigger);

        task.await.unwrap().unwrap();
        assert!(*closed.lock().unwrap());
    }
}
