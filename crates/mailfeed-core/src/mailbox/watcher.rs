//! IDLE watcher.
//!
//! ```text
//! Disconnected ─connect→ Authenticated ─select→ Selected ─watch→ Watching
//!      │                      │                    │               │
//!      └──────────────────────┴───── close ────────┴───────────────┴─→ Closed
//! ```
//!
//! The watcher owns its own connection. Fetching happens on a second,
//! independent [`ImapSession`](super::ImapSession) handed out by
//! [`MailboxWatcher::establish`].

use std::fmt;
use std::time::Duration;

use mailfeed_imap::{
    Authenticated, Client, IdleEvent, ImapStream, NotAuthenticated, Selected, connect_tls,
};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, error, info, trace, warn};

use super::session::{INBOX, ImapSession, login_error, open_selected};
use super::{Credentials, MailCursor, MailboxError, ServerAddr};

/// How long one IDLE command is kept open before it is re-issued.
pub const IDLE_REISSUE: Duration = Duration::from_secs(25 * 60);

type MailboxResult<T> = std::result::Result<T, MailboxError>;

/// Observable watcher state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatcherState {
    /// No connection.
    Disconnected,
    /// Logged in, no mailbox selected.
    Authenticated,
    /// Inbox selected, not idling yet.
    Selected,
    /// IDLE task running.
    Watching,
    /// Released; terminal.
    Closed,
}

impl fmt::Display for WatcherState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Disconnected => "disconnected",
            Self::Authenticated => "authenticated",
            Self::Selected => "selected",
            Self::Watching => "watching",
            Self::Closed => "closed",
        };
        f.write_str(name)
    }
}

enum Phase<S> {
    Disconnected,
    Authenticated(Client<S, Authenticated>),
    Selected(Client<S, Selected>),
    Watching {
        task: JoinHandle<()>,
        stop: oneshot::Sender<()>,
    },
    Closed,
}

impl<S> Phase<S> {
    const fn state(&self) -> WatcherState {
        match self {
            Self::Disconnected => WatcherState::Disconnected,
            Self::Authenticated(_) => WatcherState::Authenticated,
            Self::Selected(_) => WatcherState::Selected,
            Self::Watching { .. } => WatcherState::Watching,
            Self::Closed => WatcherState::Closed,
        }
    }
}

/// Turns IDLE pushes on the inbox into fetch triggers.
pub struct MailboxWatcher<S = ImapStream> {
    phase: Phase<S>,
}

impl<S> fmt::Debug for MailboxWatcher<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MailboxWatcher")
            .field("state", &self.phase.state())
            .finish()
    }
}

impl MailboxWatcher<ImapStream> {
    /// Opens the IDLE connection and the fetch session over TLS.
    ///
    /// The returned cursor is the inbox's UIDNEXT, so mail that arrived
    /// before startup is never replayed. If the fetch session cannot be
    /// opened the IDLE connection is logged out before returning.
    ///
    /// # Errors
    ///
    /// [`MailboxError::Connection`] or [`MailboxError::Authentication`] for
    /// either connection; [`MailboxError::Operation`] if SELECT fails or the
    /// server does not report UIDNEXT.
    pub async fn establish(
        addr: &ServerAddr,
        credentials: &Credentials,
    ) -> MailboxResult<(Self, MailCursor, ImapSession<ImapStream>)> {
        let idle_stream = connect_tls(&addr.host, addr.port)
            .await
            .map_err(|e| MailboxError::Connection(format!("{addr}: {e}")))?;
        let mut watcher = Self::new();
        if let Err(e) = watcher.connect(idle_stream, credentials).await {
            watcher.close().await;
            return Err(e);
        }
        if let Err(e) = watcher.select().await {
            watcher.close().await;
            return Err(e);
        }

        let fetch_stream = match connect_tls(&addr.host, addr.port).await {
            Ok(stream) => stream,
            Err(e) => {
                watcher.close().await;
                return Err(MailboxError::Connection(format!("{addr}: {e}")));
            }
        };
        match Self::open_session(fetch_stream, credentials).await {
            Ok((cursor, session)) => {
                info!(%addr, %cursor, "mailbox established");
                Ok((watcher, cursor, session))
            }
            Err(e) => {
                watcher.close().await;
                Err(e)
            }
        }
    }
}

impl<S> MailboxWatcher<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    /// Creates a watcher with no connection.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            phase: Phase::Disconnected,
        }
    }

    /// Current state.
    #[must_use]
    pub const fn state(&self) -> WatcherState {
        self.phase.state()
    }

    /// Opens the fetch session and reads the starting cursor from SELECT.
    ///
    /// # Errors
    ///
    /// See [`MailboxWatcher::establish`].
    pub async fn open_session(
        stream: S,
        credentials: &Credentials,
    ) -> MailboxResult<(MailCursor, ImapSession<S>)> {
        let (client, status) = open_selected(stream, credentials).await?;
        let Some(uid_next) = status.uid_next else {
            if let Err(e) = client.logout().await {
                debug!(error = %e, "LOGOUT after missing UIDNEXT failed");
            }
            return Err(MailboxError::Operation(format!(
                "SELECT {INBOX} did not report UIDNEXT"
            )));
        };
        Ok((MailCursor::new(uid_next.get()), ImapSession::new(client)))
    }

    /// Reads the greeting and logs in on the watcher's connection.
    ///
    /// # Errors
    ///
    /// Fails outside `Disconnected`, or with a connection or authentication
    /// error. On failure the watcher stays `Disconnected`.
    pub async fn connect(&mut self, stream: S, credentials: &Credentials) -> MailboxResult<()> {
        self.expect(WatcherState::Disconnected, "connect")?;

        let client: Client<S, NotAuthenticated> = Client::from_stream(stream)
            .await
            .map_err(|e| MailboxError::Connection(e.to_string()))?;
        let client = client
            .login(&credentials.username, &credentials.password)
            .await
            .map_err(login_error)?;

        debug!(user = %credentials.username, "watcher authenticated");
        self.phase = Phase::Authenticated(client);
        Ok(())
    }

    /// Selects the inbox.
    ///
    /// # Errors
    ///
    /// Fails outside `Authenticated`. A failed SELECT drops the connection
    /// and leaves the watcher `Disconnected`.
    pub async fn select(&mut self) -> MailboxResult<()> {
        self.expect(WatcherState::Authenticated, "select")?;
        let Phase::Authenticated(client) = std::mem::replace(&mut self.phase, Phase::Disconnected)
        else {
            return Err(self.invalid("select"));
        };

        let (client, status) = client
            .select(INBOX)
            .await
            .map_err(|e| MailboxError::Operation(format!("SELECT {INBOX}: {e}")))?;
        debug!(exists = status.exists, "watcher selected {INBOX}");
        self.phase = Phase::Selected(client);
        Ok(())
    }

    /// Starts idling and sends `()` on `notify` whenever the message count
    /// changes.
    ///
    /// Triggers coalesce: when `notify` is full the new one is dropped. The
    /// IDLE task ends when [`close`](Self::close) is called, when `notify`
    /// is closed, or when the connection fails.
    ///
    /// # Errors
    ///
    /// Fails outside `Selected`.
    pub fn watch(&mut self, notify: mpsc::Sender<()>) -> MailboxResult<()> {
        self.expect(WatcherState::Selected, "watch")?;
        let Phase::Selected(client) = std::mem::replace(&mut self.phase, Phase::Disconnected) else {
            return Err(self.invalid("watch"));
        };

        let (stop_tx, stop_rx) = oneshot::channel();
        let task = tokio::spawn(idle_loop(client, notify, stop_rx));
        self.phase = Phase::Watching {
            task,
            stop: stop_tx,
        };
        info!("watching {INBOX} for new mail");
        Ok(())
    }

    /// Releases whatever the watcher holds. Valid in every state.
    pub async fn close(&mut self) {
        match std::mem::replace(&mut self.phase, Phase::Closed) {
            Phase::Disconnected | Phase::Closed => {}
            Phase::Authenticated(client) => log_out(client.logout().await),
            Phase::Selected(client) => log_out(client.logout().await),
            Phase::Watching { task, stop } => {
                // The task may already have exited on its own
                let _ = stop.send(());
                if let Err(e) = task.await {
                    warn!(error = %e, "IDLE task did not finish cleanly");
                }
            }
        }
        debug!("watcher closed");
    }

    fn expect(&self, state: WatcherState, action: &'static str) -> MailboxResult<()> {
        if self.state() == state {
            Ok(())
        } else {
            Err(self.invalid(action))
        }
    }

    fn invalid(&self, action: &'static str) -> MailboxError {
        MailboxError::InvalidTransition {
            state: self.state(),
            action,
        }
    }
}

impl<S> Default for MailboxWatcher<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<S> Drop for MailboxWatcher<S> {
    fn drop(&mut self) {
        // Without an async context the best we can do is ask the task to stop
        if let Phase::Watching { stop, .. } = std::mem::replace(&mut self.phase, Phase::Closed) {
            let _ = stop.send(());
        }
    }
}

fn log_out(result: mailfeed_imap::Result<()>) {
    if let Err(e) = result {
        debug!(error = %e, "LOGOUT on watcher connection failed");
    }
}

enum Round {
    Reissue,
    Stopped,
}

async fn idle_loop<S>(
    mut client: Client<S, Selected>,
    notify: mpsc::Sender<()>,
    mut stop: oneshot::Receiver<()>,
) where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    loop {
        match idle_round(&mut client, &notify, &mut stop).await {
            Ok(Round::Reissue) => trace!("re-issuing IDLE"),
            Ok(Round::Stopped) => break,
            Err(e) => {
                error!(error = %e, "IDLE connection failed, no further triggers");
                return;
            }
        }
    }
    log_out(client.logout().await);
}

async fn idle_round<S>(
    client: &mut Client<S, Selected>,
    notify: &mpsc::Sender<()>,
    stop: &mut oneshot::Receiver<()>,
) -> mailfeed_imap::Result<Round>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    let mut idle = client.idle().await?;
    let deadline = Instant::now() + IDLE_REISSUE;

    let round = loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            break Round::Reissue;
        }

        let event = tokio::select! {
            biased;
            _ = &mut *stop => None,
            event = idle.wait(remaining) => Some(event),
        };
        let Some(event) = event else {
            break Round::Stopped;
        };

        match event? {
            IdleEvent::Exists(count) => {
                debug!(count, "mailbox count changed");
                if !trigger(notify) {
                    break Round::Stopped;
                }
            }
            IdleEvent::Timeout | IdleEvent::Terminated => break Round::Reissue,
            other => trace!(?other, "IDLE event ignored"),
        }
    };

    if let Some(count) = idle.done().await? {
        debug!(count, "mailbox count changed while ending IDLE");
        if !trigger(notify) {
            return Ok(Round::Stopped);
        }
    }
    Ok(round)
}

/// Queues a fetch. False once the fetcher is gone.
fn trigger(notify: &mpsc::Sender<()>) -> bool {
    match notify.try_send(()) {
        Ok(()) | Err(mpsc::error::TrySendError::Full(())) => true,
        Err(mpsc::error::TrySendError::Closed(())) => false,
    }
}
