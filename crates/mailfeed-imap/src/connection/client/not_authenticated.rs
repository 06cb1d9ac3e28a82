//! Greeting and LOGIN.

use tokio::io::{AsyncRead, AsyncWrite};

use super::Client;
use super::states::{Authenticated, NotAuthenticated};
use crate::command::{Command, TagGenerator};
use crate::connection::framed::FramedStream;
use crate::parser::{Response, ResponseParser, UntaggedResponse};
use crate::types::ResponseCode;
use crate::{Error, Result};

impl<S> Client<S, NotAuthenticated>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Reads the server greeting from a freshly connected stream.
    pub async fn from_stream(stream: S) -> Result<Self> {
        let mut framed = FramedStream::new(stream);
        let greeting = framed.read_response().await?;

        let capabilities = match ResponseParser::parse(&greeting)? {
            Response::Untagged(UntaggedResponse::Bye { text, .. }) => return Err(Error::Bye(text)),
            Response::Untagged(
                UntaggedResponse::Ok {
                    code: Some(ResponseCode::Capability(caps)),
                    ..
                }
                | UntaggedResponse::PreAuth {
                    code: Some(ResponseCode::Capability(caps)),
                    ..
                },
            ) => caps,
            Response::Untagged(UntaggedResponse::Ok { .. } | UntaggedResponse::PreAuth { .. }) => {
                Vec::new()
            }
            other => {
                return Err(Error::Protocol(format!("unexpected greeting: {other:?}")));
            }
        };

        Ok(Self {
            stream: framed,
            tags: TagGenerator::default(),
            capabilities,
            _state: std::marker::PhantomData,
        })
    }

    /// Logs in with a user name and password.
    ///
    /// A NO completion is reported as [`Error::Auth`].
    pub async fn login(mut self, username: &str, password: &str) -> Result<Client<S, Authenticated>> {
        let command = Command::Login {
            username: username.to_string(),
            password: password.to_string(),
        };
        let responses = match self.run(&command).await {
            Ok(responses) => responses,
            Err(Error::No(text)) => return Err(Error::Auth(text)),
            Err(e) => return Err(e),
        };

        for response in responses {
            match response {
                Response::Untagged(UntaggedResponse::Capability(caps))
                | Response::Tagged {
                    code: Some(ResponseCode::Capability(caps)),
                    ..
                } => self.capabilities = caps,
                _ => {}
            }
        }

        Ok(self.transition())
    }
}
