//! Type-state client.
//!
//! The connection states are zero-sized markers:
//!
//! - [`NotAuthenticated`]: greeting received
//! - [`Authenticated`]: LOGIN accepted
//! - [`Selected`]: a mailbox is open
//!
//! Transitions consume the client, so a command can only be issued in a
//! state where the protocol allows it.

#![allow(clippy::missing_errors_doc)]

mod authenticated;
mod not_authenticated;
mod selected;
mod states;

use std::marker::PhantomData;

use tokio::io::{AsyncRead, AsyncWrite};

pub use self::states::{Authenticated, NotAuthenticated, Selected};
use super::framed::{FramedStream, ResponseAccumulator};
use crate::command::{Command, TagGenerator};
use crate::parser::{Response, ResponseParser, UntaggedResponse};
use crate::types::{Capability, Status};
use crate::{Error, Result};

/// IMAP client in protocol state `State`.
pub struct Client<S, State> {
    pub(crate) stream: FramedStream<S>,
    pub(crate) tags: TagGenerator,
    pub(crate) capabilities: Vec<Capability>,
    _state: PhantomData<State>,
}

impl<S, State> std::fmt::Debug for Client<S, State> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("state", &std::any::type_name::<State>())
            .field("capabilities", &self.capabilities)
            .finish_non_exhaustive()
    }
}

impl<S, State> Client<S, State> {
    /// Moves the connection into another state.
    pub(crate) fn transition<Next>(self) -> Client<S, Next> {
        Client {
            stream: self.stream,
            tags: self.tags,
            capabilities: self.capabilities,
            _state: PhantomData,
        }
    }
}

impl<S, State> Client<S, State>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Capabilities last advertised by the server.
    #[must_use]
    pub fn capabilities(&self) -> &[Capability] {
        &self.capabilities
    }

    /// True when the server advertised IDLE.
    #[must_use]
    pub fn supports_idle(&self) -> bool {
        self.capabilities.contains(&Capability::Idle)
    }

    /// Sends NOOP.
    pub async fn noop(&mut self) -> Result<()> {
        self.run(&Command::Noop).await.map(drop)
    }

    /// Sends CAPABILITY and replaces the cached list.
    pub async fn capability(&mut self) -> Result<Vec<Capability>> {
        let responses = self.run(&Command::Capability).await?;
        for response in responses {
            if let Response::Untagged(UntaggedResponse::Capability(caps)) = response {
                self.capabilities = caps;
            }
        }
        Ok(self.capabilities.clone())
    }

    /// Sends LOGOUT and closes the connection.
    ///
    /// The server may drop the socket right after BYE, so read errors after
    /// the command is written are not reported.
    pub async fn logout(mut self) -> Result<()> {
        let tag = self.tags.next();
        self.stream
            .write_command(&Command::Logout.serialize(&tag))
            .await?;
        if let Err(e) = ResponseAccumulator::new(tag).read_until_tagged(&mut self.stream).await {
            tracing::trace!(error = %e, "connection closed during LOGOUT");
        }
        Ok(())
    }

    /// Issues `command`, reads through its completion and parses every response.
    ///
    /// Fails unless the tagged completion is OK. The tagged response is the
    /// last element of the returned list.
    pub(crate) async fn run(&mut self, command: &Command) -> Result<Vec<Response>> {
        let tag = self.tags.next();
        tracing::trace!(tag, command = command.name(), "sending command");
        self.stream.write_command(&command.serialize(&tag)).await?;

        let raw = ResponseAccumulator::new(tag.as_str())
            .read_until_tagged(&mut self.stream)
            .await?;
        let responses = raw
            .iter()
            .map(|bytes| ResponseParser::parse(bytes))
            .collect::<Result<Vec<_>>>()?;

        Self::check_tagged_ok(&responses, &tag)?;
        Ok(responses)
    }

    /// Maps the tagged completion for `tag` to a result.
    pub(crate) fn check_tagged_ok(responses: &[Response], tag: &str) -> Result<()> {
        match responses.last() {
            Some(Response::Tagged {
                tag: got,
                status,
                text,
                ..
            }) if got.as_str() == tag => match status {
                Status::Ok | Status::PreAuth => Ok(()),
                Status::No => Err(Error::No(text.clone())),
                Status::Bad => Err(Error::Bad(text.clone())),
                Status::Bye => Err(Error::Bye(text.clone())),
            },
            _ => Err(Error::Protocol(format!("missing tagged completion for {tag}"))),
        }
    }
}
