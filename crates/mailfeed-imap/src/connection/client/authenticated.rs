//! SELECT.

use tokio::io::{AsyncRead, AsyncWrite};

use super::Client;
use super::states::{Authenticated, Selected};
use crate::command::Command;
use crate::parser::{Response, UntaggedResponse};
use crate::types::{Mailbox, MailboxStatus, ResponseCode};
use crate::Result;

impl<S> Client<S, Authenticated>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Opens `mailbox` read-write.
    pub async fn select(mut self, mailbox: &str) -> Result<(Client<S, Selected>, MailboxStatus)> {
        let responses = self
            .run(&Command::Select {
                mailbox: Mailbox::new(mailbox),
            })
            .await?;
        let status = mailbox_status(&responses);
        tracing::debug!(
            mailbox,
            exists = status.exists,
            uid_next = ?status.uid_next,
            "mailbox selected"
        );
        Ok((self.transition(), status))
    }
}

/// Folds SELECT responses into a status snapshot.
pub(super) fn mailbox_status(responses: &[Response]) -> MailboxStatus {
    let mut status = MailboxStatus::default();
    for response in responses {
        let code = match response {
            Response::Untagged(UntaggedResponse::Exists(n)) => {
                status.exists = *n;
                continue;
            }
            Response::Untagged(UntaggedResponse::Recent(n)) => {
                status.recent = *n;
                continue;
            }
            Response::Untagged(UntaggedResponse::Flags(flags)) => {
                status.flags.clone_from(flags);
                continue;
            }
            Response::Untagged(UntaggedResponse::Ok { code: Some(code), .. })
            | Response::Tagged { code: Some(code), .. } => code,
            _ => continue,
        };
        match code {
            ResponseCode::UidNext(uid) => status.uid_next = Some(*uid),
            ResponseCode::UidValidity(v) => status.uid_validity = Some(*v),
            ResponseCode::Unseen(seq) => status.unseen = Some(*seq),
            ResponseCode::ReadOnly => status.read_only = true,
            ResponseCode::ReadWrite => status.read_only = false,
            _ => {}
        }
    }
    status
}
