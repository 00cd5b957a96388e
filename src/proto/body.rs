//! Request body pump (`spec.md` §4.6): bridges a foreign producer into the
//! codec's pull-based DATA callback, generalized from the teacher's
//! `proto::streams::streams::StreamRef::send_data` capacity/backpressure
//! shape into this spec's would-block/deferred-poll model.

use std::cell::RefCell;
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context, Poll, Waker};

use bytes::{Bytes, BytesMut};
use tokio::io::AsyncRead;

/// What happened when the codec asked for more body bytes.
pub enum DataPoll {
    /// `n` bytes were written into the codec-provided buffer.
    Ready { len: usize, end_stream: bool },
    /// The producer would block; a one-shot poll has been armed and
    /// `resume_data` will be called on the stream once it's ready.
    Deferred,
    Error(std::io::Error),
}

/// A request body producer. Implemented directly for pollable sources;
/// `BlockingBody` adapts a source that can only offer synchronous reads.
pub trait BodySource {
    fn poll_data(&mut self, cx: &mut Context<'_>, buf: &mut [u8]) -> DataPoll;
}

/// Forwards every byte successfully handed to the codec, approximating
/// "data hitting the wire" the way `spec.md` §4.6's optional request logger
/// does; a no-op default is provided so wiring one in is opt-in.
pub trait BodyLogger {
    fn log_bytes(&mut self, bytes: &[u8]);
}

pub struct NullLogger;

impl BodyLogger for NullLogger {
    fn log_bytes(&mut self, _bytes: &[u8]) {}
}

/// Adapts any `tokio::io::AsyncRead` into a `BodySource`.
pub struct PollableBody<R> {
    inner: R,
}

impl<R: AsyncRead + Unpin> PollableBody<R> {
    pub fn new(inner: R) -> PollableBody<R> {
        PollableBody { inner }
    }
}

impl<R: AsyncRead + Unpin> BodySource for PollableBody<R> {
    fn poll_data(&mut self, cx: &mut Context<'_>, buf: &mut [u8]) -> DataPoll {
        let mut read_buf = tokio::io::ReadBuf::new(buf);
        match Pin::new(&mut self.inner).poll_read(cx, &mut read_buf) {
            Poll::Ready(Ok(())) => {
                let len = read_buf.filled().len();
                DataPoll::Ready { len, end_stream: len == 0 }
            }
            Poll::Ready(Err(e)) => DataPoll::Error(e),
            Poll::Pending => DataPoll::Deferred,
        }
    }
}

/// Adapter for a producer that can only offer blocking reads: maintains a
/// scratch buffer that an external async read fills, draining it into the
/// codec on each `poll_data` call (`spec.md` §4.6's "Blocking" branch).
///
/// `poll_data` stashes the polling task's waker whenever it defers; `fill`/
/// `mark_eof`/`mark_error` (called by whatever external read completion
/// handler produced the result) wake it back up — this plays the role of
/// `spec.md` §4.6's "resume_data" call for this producer, so a deferred read
/// resumes the pump instead of hanging the request forever.
pub struct BlockingBody {
    scratch: BytesMut,
    eof: bool,
    error: Option<std::io::Error>,
    pending: bool,
    waker: Option<Waker>,
}

impl BlockingBody {
    pub fn new() -> BlockingBody {
        BlockingBody {
            scratch: BytesMut::new(),
            eof: false,
            error: None,
            pending: false,
            waker: None,
        }
    }

    /// Called by the external async read completion handler once bytes are
    /// available.
    pub fn fill(&mut self, bytes: Bytes) {
        self.scratch.extend_from_slice(&bytes);
        self.pending = false;
        self.wake();
    }

    pub fn mark_eof(&mut self) {
        self.eof = true;
        self.pending = false;
        self.wake();
    }

    pub fn mark_error(&mut self, err: std::io::Error) {
        self.error = Some(err);
        self.pending = false;
        self.wake();
    }

    pub fn is_pending(&self) -> bool {
        self.pending
    }

    pub fn begin_read(&mut self) {
        self.pending = true;
    }

    fn wake(&mut self) {
        if let Some(waker) = self.waker.take() {
            waker.wake();
        }
    }
}

impl Default for BlockingBody {
    fn default() -> Self {
        BlockingBody::new()
    }
}

impl BodySource for BlockingBody {
    fn poll_data(&mut self, cx: &mut Context<'_>, buf: &mut [u8]) -> DataPoll {
        if !self.scratch.is_empty() {
            let n = std::cmp::min(buf.len(), self.scratch.len());
            buf[..n].copy_from_slice(&self.scratch[..n]);
            let _ = self.scratch.split_to(n);
            return DataPoll::Ready { len: n, end_stream: false };
        }

        if let Some(err) = self.error.take() {
            return DataPoll::Error(err);
        }

        if self.eof {
            return DataPoll::Ready { len: 0, end_stream: true };
        }

        self.waker = Some(cx.waker().clone());
        if !self.pending {
            self.begin_read();
        }
        DataPoll::Deferred
    }
}

/// Lets a `BlockingBody` be shared between the stream (which needs a boxed
/// `BodySource`) and whatever external task performs the blocking read and
/// calls `fill`/`mark_eof`/`mark_error` on it.
impl BodySource for Rc<RefCell<BlockingBody>> {
    fn poll_data(&mut self, cx: &mut Context<'_>, buf: &mut [u8]) -> DataPoll {
        self.borrow_mut().poll_data(cx, buf)
    }
}
