//! IMAP-backed mailbox session.

use mailfeed_imap::{
    Client, FetchAttribute, FetchItem, ImapStream, MailboxStatus, NotAuthenticated, Selected,
    UidSet,
};
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::debug;

use super::{Credentials, MailCursor, MailboxError, MailboxSession, RawMessage};
use crate::Result;

/// Mailbox every session selects.
pub const INBOX: &str = "INBOX";

/// Logs in and selects the inbox on an already-connected stream.
///
/// # Errors
///
/// Returns [`MailboxError::Connection`] for transport failures,
/// [`MailboxError::Authentication`] if LOGIN is rejected, and
/// [`MailboxError::Operation`] if SELECT fails.
pub async fn open_selected<S>(
    stream: S,
    credentials: &Credentials,
) -> std::result::Result<(Client<S, Selected>, MailboxStatus), MailboxError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let client: Client<S, NotAuthenticated> = Client::from_stream(stream)
        .await
        .map_err(|e| MailboxError::Connection(e.to_string()))?;

    let client = client
        .login(&credentials.username, &credentials.password)
        .await
        .map_err(login_error)?;

    client
        .select(INBOX)
        .await
        .map_err(|e| MailboxError::Operation(format!("SELECT {INBOX}: {e}")))
}

/// Classifies a LOGIN failure.
pub(super) fn login_error(e: mailfeed_imap::Error) -> MailboxError {
    match e {
        mailfeed_imap::Error::Auth(reason) => MailboxError::Authentication(reason),
        other if other.is_transport() => MailboxError::Connection(other.to_string()),
        other => MailboxError::Authentication(other.to_string()),
    }
}

/// The fetch-side connection: a selected inbox read by UID.
#[derive(Debug)]
pub struct ImapSession<S = ImapStream> {
    client: Client<S, Selected>,
}

impl<S> ImapSession<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    /// Wraps a selected client.
    #[must_use]
    pub const fn new(client: Client<S, Selected>) -> Self {
        Self { client }
    }
}

impl<S> MailboxSession for ImapSession<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    async fn fetch_from(&mut self, cursor: MailCursor) -> Result<Vec<RawMessage>> {
        let items = vec![
            FetchAttribute::Uid,
            FetchAttribute::header(),
            FetchAttribute::text(),
        ];
        let responses = self
            .client
            .uid_fetch(&UidSet::from_onwards(cursor.as_uid()), items)
            .await?;

        let mut messages = Vec::with_capacity(responses.len());
        for (seq, items) in responses {
            let mut uid = None;
            let mut header = None;
            let mut text = None;

            for item in items {
                match item {
                    FetchItem::Uid(u) => uid = Some(u.get()),
                    FetchItem::Body { section, data, .. } => match section.as_deref() {
                        Some("HEADER") => header = data,
                        Some("TEXT") => text = data,
                        _ => {}
                    },
                    _ => {}
                }
            }

            let Some(uid) = uid else {
                debug!(seq = seq.get(), "FETCH response without UID ignored");
                continue;
            };
            messages.push(RawMessage {
                uid,
                header: header.unwrap_or_default(),
                text: text.unwrap_or_default(),
            });
        }
        Ok(messages)
    }

    async fn close(self) {
        if let Err(e) = self.client.logout().await {
            debug!(error = %e, "LOGOUT on fetch session failed");
        }
    }
}
