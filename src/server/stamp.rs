//! Header stamping for responses hyper writes on its own
//!
//! hyper answers some malformed requests itself (400 for an unparsable
//! request line, 431 for oversized headers) without calling the service, so
//! those responses never pass through the request handler. `StampingIo`
//! wraps the connection and inserts the fallback header lines into them.
//!
//! The service records the body length of every response it produces in a
//! [`ResponseLedger`] before hyper writes it. A response head written while
//! the ledger is empty was generated by hyper.

use hyper::body::Bytes;
use std::collections::VecDeque;
use std::io;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{ready, Context, Poll};
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};

const HEAD_END: &[u8] = b"\r\n\r\n";

/// Body lengths of handler responses, in the order hyper writes them
#[derive(Debug, Default)]
pub struct ResponseLedger {
    bodies: Mutex<VecDeque<u64>>,
}

impl ResponseLedger {
    pub fn record(&self, body_len: u64) {
        if let Ok(mut bodies) = self.bodies.lock() {
            bodies.push_back(body_len);
        }
    }

    fn next(&self) -> Option<u64> {
        self.bodies.lock().ok().and_then(|mut bodies| bodies.pop_front())
    }
}

#[derive(Debug, Clone, Copy)]
enum Phase {
    /// Collecting a response head up to its blank line
    Head,
    /// Passing through this many body bytes
    Body(u64),
}

/// Connection IO that stamps hyper-generated responses
pub struct StampingIo<T> {
    inner: T,
    ledger: Arc<ResponseLedger>,
    header_lines: Bytes,
    phase: Phase,
    head: Vec<u8>,
    /// Bytes accepted from hyper, not yet written to `inner`
    out: Vec<u8>,
    written: usize,
}

impl<T> StampingIo<T> {
    pub fn new(inner: T, ledger: Arc<ResponseLedger>, header_lines: Bytes) -> Self {
        Self {
            inner,
            ledger,
            header_lines,
            phase: Phase::Head,
            head: Vec::new(),
            out: Vec::new(),
            written: 0,
        }
    }

    fn accept(&mut self, mut data: &[u8]) {
        while !data.is_empty() {
            match self.phase {
                Phase::Body(remaining) => {
                    let n = usize::try_from(remaining).map_or(data.len(), |r| r.min(data.len()));
                    self.out.extend_from_slice(&data[..n]);
                    data = &data[n..];
                    let left = remaining.saturating_sub(u64::try_from(n).unwrap_or(remaining));
                    self.phase = if left == 0 {
                        Phase::Head
                    } else {
                        Phase::Body(left)
                    };
                }
                Phase::Head => {
                    let before = self.head.len();
                    self.head.extend_from_slice(data);
                    // The blank line may straddle two writes
                    let from = before.saturating_sub(HEAD_END.len() - 1);
                    match find(&self.head[from..], HEAD_END) {
                        Some(pos) => {
                            let end = from + pos + HEAD_END.len();
                            self.head.truncate(end);
                            data = &data[end - before..];
                            self.finish_head();
                        }
                        None => data = &[],
                    }
                }
            }
        }
    }

    fn finish_head(&mut self) {
        let head = std::mem::take(&mut self.head);
        if let Some(body_len) = self.ledger.next() {
            self.out.extend_from_slice(&head);
            self.phase = if body_len == 0 {
                Phase::Head
            } else {
                Phase::Body(body_len)
            };
        } else {
            // hyper's own responses have no body
            let blank = head.len() - 2;
            self.out.extend_from_slice(&head[..blank]);
            self.out.extend_from_slice(&self.header_lines);
            self.out.extend_from_slice(&head[blank..]);
            self.phase = Phase::Head;
        }
    }
}

impl<T: AsyncWrite + Unpin> StampingIo<T> {
    fn poll_drain(&mut self, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        while self.written < self.out.len() {
            let n = ready!(Pin::new(&mut self.inner).poll_write(cx, &self.out[self.written..]))?;
            if n == 0 {
                return Poll::Ready(Err(io::ErrorKind::WriteZero.into()));
            }
            self.written += n;
        }
        self.out.clear();
        self.written = 0;
        Poll::Ready(Ok(()))
    }
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

impl<T: AsyncRead + Unpin> AsyncRead for StampingIo<T> {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().inner).poll_read(cx, buf)
    }
}

impl<T: AsyncWrite + Unpin> AsyncWrite for StampingIo<T> {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        let this = self.get_mut();
        ready!(this.poll_drain(cx))?;
        this.accept(buf);
        // Whatever is left goes out on the next write or flush
        if let Poll::Ready(Err(e)) = this.poll_drain(cx) {
            return Poll::Ready(Err(e));
        }
        Poll::Ready(Ok(buf.len()))
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        ready!(this.poll_drain(cx))?;
        Pin::new(&mut this.inner).poll_flush(cx)
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        ready!(this.poll_drain(cx))?;
        Pin::new(&mut this.inner).poll_shutdown(cx)
    }
}
