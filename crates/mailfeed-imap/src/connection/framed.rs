//! Line framing with inline literals.
//!
//! A response is one CRLF-terminated line, except that a line ending in
//! `{n}` is followed by exactly `n` raw bytes and then the rest of the
//! response. [`FramedStream::read_response`] returns the whole thing as one
//! buffer so the parser never has to suspend.

#![allow(clippy::missing_errors_doc)]

use std::io;

use bytes::BytesMut;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::parser::lexer::parse_literal_length;
use crate::{Error, Result};

const BUFFER_SIZE: usize = 8192;

/// Longest line accepted outside of literals.
const MAX_LINE_LENGTH: usize = 1024 * 1024;

/// Largest literal accepted; newsletters with inline images stay well below this.
const MAX_LITERAL_SIZE: usize = 64 * 1024 * 1024;

/// Buffered IMAP transport.
///
/// Bytes read from the transport stay in `read_buffer` until a complete
/// response has been framed, so [`FramedStream::read_response`] can be
/// dropped at any await point without losing input.
pub struct FramedStream<S> {
    stream: S,
    read_buffer: BytesMut,
    /// Bytes at the front of `read_buffer` already known to be whole lines
    /// and literals of the response being framed.
    scanned: usize,
    write_buffer: BytesMut,
}

impl<S> FramedStream<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Wraps a connected stream.
    pub fn new(stream: S) -> Self {
        Self {
            stream,
            read_buffer: BytesMut::with_capacity(BUFFER_SIZE),
            scanned: 0,
            write_buffer: BytesMut::with_capacity(BUFFER_SIZE),
        }
    }

    /// Reads one complete response including any literals.
    ///
    /// Cancel safe.
    pub async fn read_response(&mut self) -> Result<Vec<u8>> {
        loop {
            if let Some(len) = self.frame()? {
                self.scanned = 0;
                return Ok(self.read_buffer.split_to(len).to_vec());
            }
            self.read_buffer.reserve(BUFFER_SIZE);
            if self.stream.read_buf(&mut self.read_buffer).await? == 0 {
                return Err(Error::Io(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "connection closed by server",
                )));
            }
        }
    }

    /// Advances `scanned` over what is buffered and returns the length of
    /// the first response once all of it has arrived.
    fn frame(&mut self) -> Result<Option<usize>> {
        loop {
            let rest = &self.read_buffer[self.scanned..];
            let Some(pos) = rest.windows(2).position(|w| w == b"\r\n") else {
                if rest.len() > MAX_LINE_LENGTH {
                    return Err(Error::Protocol("response line too long".to_string()));
                }
                return Ok(None);
            };
            let line_end = self.scanned + pos + 2;

            let Some(len) = trailing_literal_length(&self.read_buffer[self.scanned..line_end])
            else {
                return Ok(Some(line_end));
            };
            if len > MAX_LITERAL_SIZE {
                return Err(Error::Protocol(format!(
                    "literal of {len} bytes exceeds {MAX_LITERAL_SIZE}"
                )));
            }
            if self.read_buffer.len() < line_end + len {
                return Ok(None);
            }
            self.scanned = line_end + len;
        }
    }

    /// Writes and flushes one encoded command.
    pub async fn write_command(&mut self, data: &[u8]) -> Result<()> {
        self.write_buffer.clear();
        self.write_buffer.extend_from_slice(data);
        self.stream.write_all(&self.write_buffer).await?;
        self.stream.flush().await?;
        Ok(())
    }

    /// Shared access to the transport.
    pub const fn get_ref(&self) -> &S {
        &self.stream
    }

    /// Unwraps the transport, dropping anything still buffered.
    pub fn into_inner(self) -> S {
        self.stream
    }
}

/// Length of a `{n}` literal announced at the end of `line`.
fn trailing_literal_length(line: &[u8]) -> Option<usize> {
    let body = line.strip_suffix(b"\r\n")?;
    if !body.ends_with(b"}") {
        return None;
    }
    let open = body.iter().rposition(|&b| b == b'{')?;
    parse_literal_length(&body[open..])
}

/// Collects raw responses up to the tagged completion of one command.
pub struct ResponseAccumulator {
    tag: String,
    responses: Vec<Vec<u8>>,
}

impl ResponseAccumulator {
    /// Accumulator waiting for `tag`.
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            responses: Vec::new(),
        }
    }

    /// Reads until the response tagged with this accumulator's tag is seen.
    /// The tagged response is the last element.
    pub async fn read_until_tagged<S>(&mut self, framed: &mut FramedStream<S>) -> Result<Vec<Vec<u8>>>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        loop {
            let response = framed.read_response().await?;
            let done = response
                .strip_prefix(self.tag.as_bytes())
                .is_some_and(|rest| rest.first() == Some(&b' '));
            self.responses.push(response);
            if done {
                return Ok(std::mem::take(&mut self.responses));
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio_test::io::Builder;

    #[test]
    fn literal_at_line_end() {
        assert_eq!(trailing_literal_length(b"* 1 FETCH (BODY[TEXT] {42}\r\n"), Some(42));
        assert_eq!(trailing_literal_length(b"* 1 FETCH (BODY[TEXT] {7+}\r\n"), Some(7));
        assert_eq!(trailing_literal_length(b"* OK {curly} text\r\n"), None);
        assert_eq!(trailing_literal_length(b"* OK no literal\r\n"), None);
        assert_eq!(trailing_literal_length(b"{5}"), None);
    }

    #[tokio::test]
    async fn reads_literal_spanning_reads() {
        let mock = Builder::new()
            .read(b"* 1 FETCH (UID 7 BODY[TEXT] {11}\r\n")
            .read(b"hello")
            .read(b" world)\r\n")
            .build();
        let mut framed = FramedStream::new(mock);
        let response = framed.read_response().await.unwrap();
        assert_eq!(
            response,
            b"* 1 FETCH (UID 7 BODY[TEXT] {11}\r\nhello world)\r\n"
        );
    }

    #[tokio::test]
    async fn crlf_split_across_reads() {
        let mock = Builder::new().read(b"* OK ready\r").read(b"\n").build();
        let mut framed = FramedStream::new(mock);
        assert_eq!(framed.read_response().await.unwrap(), b"* OK ready\r\n");
    }

    #[tokio::test]
    async fn literal_split_mid_data_is_framed_once_complete() {
        let mock = Builder::new()
            .read(b"* 1 FETCH (BODY[] {3}\r\nab")
            .read(b"c)\r\n* 2 EXISTS\r\n")
            .build();
        let mut framed = FramedStream::new(mock);
        assert_eq!(
            framed.read_response().await.unwrap(),
            b"* 1 FETCH (BODY[] {3}\r\nabc)\r\n"
        );
        assert_eq!(framed.read_response().await.unwrap(), b"* 2 EXISTS\r\n");
    }

    #[tokio::test(start_paused = true)]
    async fn timed_out_read_keeps_partial_response() {
        let mock = Builder::new()
            .read(b"* 1 FETCH (BODY[] {5}\r\nhe")
            .wait(Duration::from_secs(30))
            .read(b"llo)\r\n* 9 EXISTS\r\n")
            .build();
        let mut framed = FramedStream::new(mock);

        let first = tokio::time::timeout(Duration::from_secs(10), framed.read_response()).await;
        assert!(first.is_err());

        assert_eq!(
            framed.read_response().await.unwrap(),
            b"* 1 FETCH (BODY[] {5}\r\nhello)\r\n"
        );
        assert_eq!(framed.read_response().await.unwrap(), b"* 9 EXISTS\r\n");
    }

    #[tokio::test(start_paused = true)]
    async fn timed_out_read_keeps_partial_line() {
        let mock = Builder::new()
            .read(b"* 4 EXI")
            .wait(Duration::from_secs(30))
            .read(b"STS\r\n")
            .build();
        let mut framed = FramedStream::new(mock);

        let first = tokio::time::timeout(Duration::from_secs(10), framed.read_response()).await;
        assert!(first.is_err());
        assert_eq!(framed.read_response().await.unwrap(), b"* 4 EXISTS\r\n");
    }

    #[tokio::test]
    async fn eof_is_an_io_error() {
        let mock = Builder::new().read(b"* OK partial").build();
        let mut framed = FramedStream::new(mock);
        let err = framed.read_response().await.unwrap_err();
        assert!(matches!(err, Error::Io(ref e) if e.kind() == io::ErrorKind::UnexpectedEof));
    }

    #[tokio::test]
    async fn oversized_literal_is_refused() {
        let mock = Builder::new()
            .read(b"* 1 FETCH (BODY[] {999999999999}\r\n")
            .build();
        let mut framed = FramedStream::new(mock);
        assert!(matches!(
            framed.read_response().await,
            Err(Error::Protocol(_))
        ));
    }

    #[tokio::test]
    async fn accumulator_stops_at_own_tag() {
        let mock = Builder::new()
            .read(b"* 3 EXISTS\r\n")
            .read(b"A00010 OK not ours\r\n")
            .read(b"A0001 OK done\r\n")
            .build();
        let mut framed = FramedStream::new(mock);
        let responses = ResponseAccumulator::new("A0001")
            .read_until_tagged(&mut framed)
            .await
            .unwrap();
        assert_eq!(responses.len(), 3);
        assert_eq!(responses[2], b"A0001 OK done\r\n");
    }

    #[tokio::test]
    async fn write_command_flushes_bytes() {
        let mock = Builder::new().write(b"A0001 NOOP\r\n").build();
        let mut framed = FramedStream::new(mock);
        framed.write_command(b"A0001 NOOP\r\n").await.unwrap();
    }
}
