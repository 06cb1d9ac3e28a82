//! IDLE (RFC 2177).

#![allow(clippy::missing_errors_doc)]

use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::time::timeout;

use super::client::{Client, Selected};
use super::framed::FramedStream;
use crate::command::Command;
use crate::parser::{Response, ResponseParser, UntaggedResponse};
use crate::types::{SeqNum, Status};
use crate::{Error, Result};

/// Something the server pushed while idling.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdleEvent {
    /// Mailbox now holds this many messages.
    Exists(u32),
    /// A message was expunged.
    Expunge(SeqNum),
    /// Recent count changed.
    Recent(u32),
    /// Any other untagged response, such as a flag update.
    Other(UntaggedResponse),
    /// Nothing arrived within the wait window; IDLE is still active.
    Timeout,
    /// The server completed the IDLE command on its own; IDLE is over.
    Terminated,
}

/// An IDLE command in progress.
///
/// Holds the connection borrowed until [`IdleHandle::done`] is called.
/// An EXISTS the server sent before accepting IDLE is held back and
/// returned by the first [`IdleHandle::wait`].
pub struct IdleHandle<'a, S> {
    stream: &'a mut FramedStream<S>,
    tag: String,
    terminated: bool,
    pending: Option<u32>,
}

impl<S> IdleHandle<'_, S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Waits up to `duration` for the next event.
    ///
    /// Cancel safe: a response cut off by the timeout or by a dropped
    /// future is completed by the next call.
    pub async fn wait(&mut self, duration: Duration) -> Result<IdleEvent> {
        if let Some(count) = self.pending.take() {
            return Ok(IdleEvent::Exists(count));
        }
        if self.terminated {
            return Ok(IdleEvent::Terminated);
        }
        let Ok(read) = timeout(duration, self.stream.read_response()).await else {
            return Ok(IdleEvent::Timeout);
        };
        let event = self.classify(&read?)?;
        if event == IdleEvent::Terminated {
            self.terminated = true;
        }
        Ok(event)
    }

    fn classify(&self, raw: &[u8]) -> Result<IdleEvent> {
        match ResponseParser::parse(raw)? {
            Response::Untagged(UntaggedResponse::Exists(n)) => Ok(IdleEvent::Exists(n)),
            Response::Untagged(UntaggedResponse::Recent(n)) => Ok(IdleEvent::Recent(n)),
            Response::Untagged(UntaggedResponse::Expunge(seq)) => Ok(IdleEvent::Expunge(seq)),
            Response::Untagged(UntaggedResponse::Bye { text, .. }) => Err(Error::Bye(text)),
            Response::Untagged(other) => Ok(IdleEvent::Other(other)),
            Response::Continuation { .. } => Err(Error::Protocol(
                "continuation request while idling".to_string(),
            )),
            Response::Tagged {
                tag, status, text, ..
            } if tag.as_str() == self.tag => completion(status, text).map(|()| IdleEvent::Terminated),
            Response::Tagged { tag, .. } => Err(Error::Protocol(format!(
                "completion for unknown tag {tag} while idling"
            ))),
        }
    }

    /// Sends DONE and reads through the IDLE completion.
    ///
    /// Returns the last EXISTS count that was not handed out by
    /// [`IdleHandle::wait`], including any that raced with DONE.
    pub async fn done(self) -> Result<Option<u32>> {
        let mut exists = self.pending;
        if self.terminated {
            return Ok(exists);
        }
        self.stream
            .write_command(&Command::Done.serialize(""))
            .await?;
        loop {
            let raw = self.stream.read_response().await?;
            match ResponseParser::parse(&raw)? {
                Response::Tagged {
                    tag, status, text, ..
                } if tag.as_str() == self.tag => return completion(status, text).map(|()| exists),
                Response::Untagged(UntaggedResponse::Bye { text, .. }) => {
                    return Err(Error::Bye(text));
                }
                Response::Untagged(UntaggedResponse::Exists(n)) => exists = Some(n),
                _ => {}
            }
        }
    }
}

fn completion(status: Status, text: String) -> Result<()> {
    match status {
        Status::Ok => Ok(()),
        Status::No => Err(Error::No(text)),
        Status::Bad => Err(Error::Bad(text)),
        Status::Bye => Err(Error::Bye(text)),
        Status::PreAuth => Err(Error::Protocol("PREAUTH as IDLE completion".to_string())),
    }
}

impl<S> Client<S, Selected>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Starts IDLE and waits for the server's continuation.
    ///
    /// RFC 2177 asks clients to re-issue IDLE at least every 29 minutes.
    pub async fn idle(&mut self) -> Result<IdleHandle<'_, S>> {
        let tag = self.tags.next();
        self.stream
            .write_command(&Command::Idle.serialize(&tag))
            .await?;

        let mut pending = None;
        loop {
            let raw = self.stream.read_response().await?;
            match ResponseParser::parse(&raw)? {
                Response::Continuation { .. } => break,
                Response::Tagged { status, text, .. } => {
                    completion(status, text)?;
                    return Err(Error::Protocol("IDLE completed before it started".to_string()));
                }
                Response::Untagged(UntaggedResponse::Bye { text, .. }) => {
                    return Err(Error::Bye(text));
                }
                Response::Untagged(UntaggedResponse::Exists(n)) => pending = Some(n),
                Response::Untagged(_) => {}
            }
        }

        tracing::trace!(tag, "idling");
        Ok(IdleHandle {
            stream: &mut self.stream,
            tag,
            terminated: false,
            pending,
        })
    }
}
