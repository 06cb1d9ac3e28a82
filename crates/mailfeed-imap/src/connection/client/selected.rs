//! Commands valid with a mailbox open.

use tokio::io::{AsyncRead, AsyncWrite};

use super::Client;
use super::states::Selected;
use crate::command::{Command, FetchAttribute};
use crate::parser::{FetchItem, Response, UntaggedResponse};
use crate::types::{SeqNum, UidSet};
use crate::Result;

impl<S> Client<S, Selected>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Runs UID FETCH and returns the FETCH responses in server order.
    ///
    /// Servers answer `n:*` with the highest existing message even when its
    /// UID is below `n`; callers filtering by cursor must drop those.
    pub async fn uid_fetch(
        &mut self,
        uids: &UidSet,
        items: Vec<FetchAttribute>,
    ) -> Result<Vec<(SeqNum, Vec<FetchItem>)>> {
        let responses = self
            .run(&Command::UidFetch {
                uids: uids.clone(),
                items,
            })
            .await?;

        Ok(responses
            .into_iter()
            .filter_map(|response| match response {
                Response::Untagged(UntaggedResponse::Fetch { seq, items }) => Some((seq, items)),
                _ => None,
            })
            .collect())
    }
}
