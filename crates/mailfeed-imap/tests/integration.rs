//! Full-session tests against a scripted in-memory server.

#![allow(clippy::unwrap_used)]

use std::io::{self, Cursor};
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};

use mailfeed_imap::{Client, FetchAttribute, FetchItem, IdleEvent, Uid, UidSet};

/// Serves a canned byte script and records everything the client writes.
struct MockStream {
    script: Cursor<Vec<u8>>,
    sent: Arc<Mutex<Vec<u8>>>,
}

impl MockStream {
    fn new(script: &[u8]) -> (Self, Arc<Mutex<Vec<u8>>>) {
        let sent = Arc::new(Mutex::new(Vec::new()));
        let stream = Self {
            script: Cursor::new(script.to_vec()),
            sent: Arc::clone(&sent),
        };
        (stream, sent)
    }
}

impl AsyncRead for MockStream {
    fn poll_read(
        mut self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let pos = usize::try_from(self.script.position()).unwrap();
        let data = self.script.get_ref();
        let remaining = data.get(pos..).unwrap_or_default();
        let n = remaining.len().min(buf.remaining());
        buf.put_slice(&remaining[..n]);
        self.script.set_position((pos + n) as u64);
        Poll::Ready(Ok(()))
    }
}

impl AsyncWrite for MockStream {
    fn poll_write(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        self.sent.lock().unwrap().extend_from_slice(buf);
        Poll::Ready(Ok(buf.len()))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }
}

const HEADER: &[u8] = b"From: Daily <daily@example.com>\r\nTo: news@feeds.example\r\nSubject: Hello\r\n\r\n";

fn session_script() -> Vec<u8> {
    let mut script = Vec::new();
    script.extend_from_slice(b"* OK [CAPABILITY IMAP4rev1 IDLE AUTH=PLAIN] ready\r\n");
    script.extend_from_slice(b"A0001 OK Logged in\r\n");
    script.extend_from_slice(b"* 1 EXISTS\r\n* OK [UIDNEXT 8] next\r\nA0002 OK [READ-WRITE] selected\r\n");
    script.extend_from_slice(b"+ idling\r\n");
    script.extend_from_slice(b"* 2 EXISTS\r\n");
    script.extend_from_slice(b"A0003 OK IDLE terminated\r\n");
    script.extend_from_slice(format!("* 2 FETCH (UID 8 BODY[HEADER] {{{}}}\r\n", HEADER.len()).as_bytes());
    script.extend_from_slice(HEADER);
    script.extend_from_slice(b" BODY[TEXT] {11}\r\n<p>Hi</p>\r\n)\r\n");
    script.extend_from_slice(b"A0004 OK Fetch completed\r\n");
    script.extend_from_slice(b"* BYE bye\r\nA0005 OK Logout completed\r\n");
    script
}

#[tokio::test]
async fn watch_then_fetch_session() {
    let (stream, sent) = MockStream::new(&session_script());

    let client = Client::from_stream(stream).await.unwrap();
    assert!(client.supports_idle());
    let client = client.login("news@feeds.example", "secret").await.unwrap();
    let (mut client, status) = client.select("INBOX").await.unwrap();
    assert_eq!(status.uid_next, Uid::new(8));

    let mut idle = client.idle().await.unwrap();
    assert_eq!(
        idle.wait(Duration::from_secs(1)).await.unwrap(),
        IdleEvent::Exists(2)
    );
    idle.done().await.unwrap();

    let fetched = client
        .uid_fetch(
            &UidSet::from_onwards(status.uid_next.unwrap()),
            vec![FetchAttribute::Uid, FetchAttribute::header(), FetchAttribute::text()],
        )
        .await
        .unwrap();
    assert_eq!(fetched.len(), 1);
    let (_, items) = &fetched[0];
    assert_eq!(items[0], FetchItem::Uid(Uid::new(8).unwrap()));
    assert!(matches!(
        &items[1],
        FetchItem::Body { section: Some(s), data: Some(d), .. } if s == "HEADER" && d == HEADER
    ));
    assert!(matches!(
        &items[2],
        FetchItem::Body { section: Some(s), data: Some(d), .. } if s == "TEXT" && d == b"<p>Hi</p>\r\n"
    ));

    client.logout().await.unwrap();

    let sent = String::from_utf8(sent.lock().unwrap().clone()).unwrap();
    assert_eq!(
        sent,
        "A0001 LOGIN news@feeds.example secret\r\n\
         A0002 SELECT INBOX\r\n\
         A0003 IDLE\r\n\
         DONE\r\n\
         A0004 UID FETCH 8:* (UID BODY[HEADER] BODY[TEXT])\r\n\
         A0005 LOGOUT\r\n"
    );
}

#[tokio::test]
async fn closed_connection_surfaces_io_error() {
    let (stream, _) = MockStream::new(b"* OK ready\r\n");
    let client = Client::from_stream(stream).await.unwrap();
    let err = client.login("u", "p").await.unwrap_err();
    assert!(err.is_transport());
}
