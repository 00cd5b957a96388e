//! Message IO façade (`spec.md` §6): the dispatch table an enclosing HTTP
//! session would call into, implemented as inherent methods on `Client`
//! wrapping a `proto::connection::Connection`. Generalized from the
//! teacher's `client::Client`/`client::Builder`/`client::SendRequest` split
//! into a single handle type, since this crate has no separate "handshake
//! future" stage worth modeling (the preface and initial SETTINGS are
//! already queued by `codec::Session::new`).

use std::cell::RefCell;
use std::future::Future;
use std::io;
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context, Poll};
use std::time::Duration;

use bytes::Bytes;
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio_util::sync::CancellationToken;

use crate::error::{Error, StreamError};
use crate::message::{CompletionCallback, Message, Metrics, Priority, ResponseHead};
use crate::proto::body::BodyLogger;
use crate::proto::connection::ConnectionConfig;
use crate::proto::store::Key;
use crate::proto::stream::{Shared, StreamState};
use crate::proto::Connection;

/// Handshake-time configuration (`spec.md` §4.3/§4.9 expansion). Mirrors the
/// teacher's `client::Builder`, minus the knobs (push promise, max streams
/// the *peer* may open) that only matter for a server or for push support
/// this client never enables.
#[derive(Debug, Clone, Default)]
pub struct Builder {
    config: ConnectionConfig,
}

impl Builder {
    pub fn new() -> Builder {
        Builder::default()
    }

    /// Scratch buffer size for each socket read (`spec.md` §4.2 step 2).
    pub fn read_chunk_size(&mut self, size: usize) -> &mut Builder {
        self.config.read_chunk_size = size;
        self
    }

    /// Overrides the default 32 MiB local connection window (`spec.md` §4.1).
    pub fn local_window_size(&mut self, size: u32) -> &mut Builder {
        self.config.session.initial_window_size = size;
        self
    }

    /// Overrides the default 64 KiB HPACK dynamic table size (`spec.md` §4.1).
    pub fn header_table_size(&mut self, size: usize) -> &mut Builder {
        self.config.session.header_table_size = size;
        self
    }

    /// Bounds how many unconfirmed `RST_STREAM`s may linger in
    /// `closing_streams` at once (`spec.md` §4.9 expansion).
    pub fn max_concurrent_reset_streams(&mut self, max: usize) -> &mut Builder {
        self.config.max_concurrent_reset_streams = max;
        self
    }

    /// Bounds how long an unconfirmed `RST_STREAM` may linger before being
    /// dropped regardless of whether the peer ever acknowledges it.
    pub fn reset_stream_duration(&mut self, duration: Duration) -> &mut Builder {
        self.config.reset_stream_duration = duration;
        self
    }

    /// Builds the client over an already-connected socket. TLS/ALPN
    /// negotiation and the choice of `h2` vs. `http/1.1` happen in the
    /// enclosing session before the socket reaches here (`spec.md` §1, §6).
    pub fn handshake<T: AsyncRead + AsyncWrite + Unpin>(&self, socket: T) -> Client<T> {
        Client { conn: Connection::with_full_config(socket, self.config.clone()) }
    }
}

/// Opaque handle returned by `send_item`, standing in for "message identity"
/// (`spec.md` §9's cyclic-ownership note): every other operation in this
/// façade takes one of these rather than exposing the connection's internal
/// key type directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamHandle(Key);

/// The client-facing wrapper over a single HTTP/2 connection. Not `Send` or
/// `Sync` (`spec.md` §5): every stream's shared state is `Rc`-rooted, so a
/// `Client<T>` must stay on the task that created it.
pub struct Client<T> {
    conn: Connection<T>,
}

impl<T: AsyncRead + AsyncWrite + Unpin> Client<T> {
    pub fn new(socket: T) -> Client<T> {
        Builder::new().handshake(socket)
    }

    pub fn set_logger(&mut self, logger: Box<dyn BodyLogger>) {
        self.conn.set_logger(logger);
    }

    /// Drives the connection's socket I/O once; the caller's executor is
    /// expected to poll this from a task, same contract as the teacher's
    /// `Connection: Future` (`spec.md` §4.2).
    pub fn poll_io(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Error>> {
        self.conn.poll_io(cx)
    }

    /// `destroy`: frees the connection IO. Dropping the `Client` already
    /// does this; the method exists to spell out intent at the call site,
    /// matching the teacher's pattern.
    pub fn destroy(self) {
        drop(self);
    }

    /// `stolen`: not supported. Nothing in this façade ever reassigns a
    /// stream's ownership mid-flight, so a caller reaching this is a misuse
    /// of the API, not a recoverable runtime condition.
    pub fn stolen(&self) -> ! {
        panic!("h2io::Client: stream ownership transfer (\"stolen\") is not supported");
    }

    /// `run(msg, blocking)`: not supported. HTTP/2 is always driven from
    /// above by the caller's executor; there is no synchronous single-call
    /// request/response path that doesn't also drive the socket.
    pub fn run(&mut self, _handle: StreamHandle, _blocking: bool) -> ! {
        panic!("h2io::Client: run() is not supported; drive poll_io from an executor instead");
    }

    /// `send_item(item, cb, data)` (`spec.md` §4.3/§6): submits a request,
    /// returning a handle used by every other operation in this table. `cb`
    /// and `data` are the completion callback + opaque pointer pair
    /// (`spec.md` §3); idiomatic Rust folds them into one `FnOnce` closure
    /// (`CompletionCallback`) rather than threading a raw pointer, and
    /// `Connection::finished` invokes it with the message once the stream
    /// tears down (`spec.md` §4.9 step 5).
    pub fn send_item(&mut self, message: Message, completion: Option<CompletionCallback>) -> Result<StreamHandle, Error> {
        let message = match completion {
            Some(cb) => message.with_completion(cb),
            None => message,
        };
        self.conn.submit(message).map(StreamHandle)
    }

    /// Convenience for `send_item` that skips the metrics/sniffer/body/
    /// completion plumbing. See `Message` for the full builder when those
    /// are needed.
    pub fn send_request(&mut self, request: http::Request<()>) -> Result<StreamHandle, Error> {
        self.send_item(Message::new(request), None)
    }

    /// `finished(msg)` (`spec.md` §4.9): tears the stream down.
    pub fn finished(&mut self, handle: StreamHandle) {
        self.conn.finished(handle.0);
    }

    pub fn pause(&mut self, handle: StreamHandle) {
        self.conn.pause(handle.0);
    }

    pub fn unpause(&mut self, handle: StreamHandle, cx: &mut Context<'_>) {
        self.conn.unpause(handle.0, cx);
    }

    pub fn is_paused(&self, handle: StreamHandle) -> bool {
        self.conn.is_paused(handle.0)
    }

    /// `skip(msg, blocking)` (`spec.md` §4.7): discards the remainder of the
    /// response body without reading it.
    pub fn skip(&mut self, handle: StreamHandle) {
        self.conn.skip(handle.0);
    }

    /// Cancels the stream locally: sends RST_STREAM(CANCEL) and fails any
    /// waiting reader. Distinct from `get_cancellable`'s token, which only
    /// aborts a pending `run_until_read_async` without touching the stream
    /// (`spec.md` §8 scenario 6).
    pub fn cancel(&mut self, handle: StreamHandle) {
        self.conn.cancel(handle.0);
    }

    /// Re-prioritizes an in-flight stream (`spec.md` §8's PRIORITY round-trip
    /// law).
    pub fn set_priority(&mut self, handle: StreamHandle, priority: Priority) {
        self.conn.set_priority(handle.0, priority);
    }

    /// `close_async(conn, cb)` (`spec.md` §4.8): `false` if GOAWAY already
    /// went out.
    pub fn close_async(&mut self) -> bool {
        self.conn.close_async()
    }

    /// `is_open`: `session.check_request_allowed() ∧ ¬is_shutdown ∧ error
    /// == null`, realized here as "no fatal error latched, and we haven't
    /// sent our own GOAWAY".
    pub fn is_open(&self) -> bool {
        self.conn.is_open()
    }

    /// `in_progress(msg)`: the stream still has a live entry in
    /// `active_streams`.
    pub fn in_progress(&self, handle: StreamHandle) -> bool {
        self.conn.in_progress(handle.0)
    }

    /// `is_reusable`: same as `is_open`.
    pub fn is_reusable(&self) -> bool {
        self.is_open()
    }

    /// `get_cancellable(msg)`: the stream's cancellation token, for handing
    /// to a future `run_until_read_async` call (or to cancel one in flight).
    pub fn get_cancellable(&self, handle: StreamHandle) -> Option<CancellationToken> {
        self.conn.cancel_token(handle.0)
    }

    /// `spec.md` §7's restart classification: `true` means the terminal
    /// error latched on this stream (`REFUSED_STREAM`, or a GOAWAY that
    /// dropped a never-processed stream) is safe to retry on a fresh
    /// stream/connection, so the enclosing session should treat the outcome
    /// as `RESTARTING` rather than `RESPONSE_END`. Reads from the same
    /// `Shared` handle `get_response_istream`/`ResponseBody::error` use, so
    /// it stays answerable even after the stream has been torn down with
    /// `finished`.
    pub fn can_be_restarted(&self, handle: StreamHandle) -> bool {
        self.conn.shared_state(handle.0).map(|s| s.borrow().restartable).unwrap_or(false)
    }

    /// `get_response_istream(msg)` (`spec.md` §6): wraps the decoded body in
    /// a client-facing `AsyncRead`. A stream with no body (e.g. a 204) reads
    /// as an immediate EOF, matching "substitute an empty source" — the
    /// state machine itself already advanced straight through `ReadData` in
    /// that case, so there's nothing further to subscribe to here.
    pub fn get_response_istream(&self, handle: StreamHandle) -> Option<ResponseBody> {
        let shared = self.conn.shared_state(handle.0)?;
        Some(ResponseBody { shared, leftover: Bytes::new() })
    }

    pub fn response_head(&self, handle: StreamHandle) -> Option<ResponseHead> {
        let shared = self.conn.shared_state(handle.0)?;
        let head = shared.borrow().response.clone();
        Some(head)
    }

    pub fn metrics(&self, handle: StreamHandle) -> Option<Metrics> {
        let shared = self.conn.shared_state(handle.0)?;
        let metrics = shared.borrow().metrics.clone();
        Some(metrics)
    }

    /// `run_until_read(msg, cancel)` (`spec.md` §6): drives the connection
    /// until this stream's state reaches `READ_DATA` (response headers are
    /// in; body has started, or the stream already finished without one).
    /// There is no external reactor to busy-spin against in this crate
    /// (`spec.md` §4.2 keeps the event loop caller-owned), so "synchronous
    /// loop of io_run" is realized as an async poll loop with no
    /// cancellation path; use `run_until_read_async` for a cancellable wait.
    pub async fn run_until_read(&mut self, handle: StreamHandle) -> Result<(), Error> {
        self.wait_for_read_data(handle, None).await
    }

    /// `run_until_read_async(msg, priority, cancel, cb)` (`spec.md` §6): same
    /// wait, cancellable via `cancel`. `priority` is applied via
    /// `set_priority` before registering the wait, matching the teacher's
    /// "priority accompanies the async read request" ordering.
    pub async fn run_until_read_async(
        &mut self,
        handle: StreamHandle,
        priority: Priority,
        cancel: CancellationToken,
    ) -> Result<(), Error> {
        self.set_priority(handle, priority);
        self.wait_for_read_data(handle, Some(cancel)).await
    }

    /// Registers/clears `pending_read` around the wait so no completion path
    /// — success, error, cancel, or the future simply being dropped — ever
    /// leaves one stuck set (`spec.md` §8 testable property 8).
    async fn wait_for_read_data(&mut self, handle: StreamHandle, cancel: Option<CancellationToken>) -> Result<(), Error> {
        let key = handle.0;
        self.conn.mark_pending_read(key);

        struct ClearOnDrop<'a, T: AsyncRead + AsyncWrite + Unpin> {
            conn: &'a mut Connection<T>,
            key: Key,
        }

        impl<'a, T: AsyncRead + AsyncWrite + Unpin> Drop for ClearOnDrop<'a, T> {
            fn drop(&mut self) {
                self.conn.clear_pending_read(self.key);
            }
        }

        let mut guard = ClearOnDrop { conn: &mut self.conn, key };

        let mut io_wait = std::future::poll_fn(move |cx| loop {
            // A stream can fail (RST_STREAM, a GOAWAY that drops it, ...)
            // without its state ever reaching READ_DATA; check the latched
            // error first so a reset stream doesn't hang this wait forever.
            if let Some(shared) = guard.conn.shared_state(key) {
                if let Some(err) = shared.borrow().error.clone() {
                    return Poll::Ready(Err(err.into()));
                }
            }
            if guard.conn.stream_state(key).map(|s| s >= StreamState::ReadData).unwrap_or(true) {
                return Poll::Ready(Ok(()));
            }
            match guard.conn.poll_io(cx) {
                Poll::Ready(Ok(())) => continue,
                Poll::Ready(Err(e)) => return Poll::Ready(Err(e)),
                Poll::Pending => return Poll::Pending,
            }
        });

        // Races the io-wait above against cancellation (`spec.md` §4.7/§8
        // scenario 6). Boxed so the cancelled-future's internal wait-list
        // registration survives being polled from this combinator without
        // requiring `WaitForCancellationFutureOwned: Unpin`; cancelling
        // completes this call with `Cancelled` without touching the stream
        // itself — only `finished` tears it down.
        let mut cancelled: Option<Pin<Box<dyn Future<Output = ()>>>> =
            cancel.map(|token| Box::pin(token.cancelled_owned()) as Pin<Box<dyn Future<Output = ()>>>);

        std::future::poll_fn(move |cx| {
            if let Some(fut) = cancelled.as_mut() {
                if fut.as_mut().poll(cx).is_ready() {
                    return Poll::Ready(Err(Error::Cancelled));
                }
            }
            Pin::new(&mut io_wait).poll(cx)
        })
        .await
    }
}

/// A response body reader, handed back by `get_response_istream`. Reads
/// bytes `Connection` has already buffered for this stream; yields EOF once
/// `shared.body_eof` is set and the buffer has drained.
pub struct ResponseBody {
    shared: Rc<RefCell<Shared>>,
    leftover: Bytes,
}

impl ResponseBody {
    pub fn is_end_stream(&self) -> bool {
        let shared = self.shared.borrow();
        self.leftover.is_empty() && shared.body.is_empty() && shared.body_eof
    }

    pub fn error(&self) -> Option<StreamError> {
        self.shared.borrow().error.clone()
    }

    /// See `Client::can_be_restarted`; exposed here too since a caller
    /// holding a `ResponseBody` rarely wants to go back to the `Client` just
    /// to check this alongside `error()`.
    pub fn can_be_restarted(&self) -> bool {
        self.shared.borrow().restartable
    }
}

impl AsyncRead for ResponseBody {
    fn poll_read(self: Pin<&mut Self>, cx: &mut Context<'_>, buf: &mut ReadBuf<'_>) -> Poll<io::Result<()>> {
        let this = self.get_mut();

        if this.leftover.is_empty() {
            let mut shared = this.shared.borrow_mut();
            if let Some(err) = &shared.error {
                return Poll::Ready(Err(io::Error::new(io::ErrorKind::Other, err.to_string())));
            }
            match shared.body.pop_front() {
                Some(chunk) => this.leftover = chunk,
                None => {
                    if shared.body_eof {
                        return Poll::Ready(Ok(()));
                    }
                    shared.reader_waker = Some(cx.waker().clone());
                    return Poll::Pending;
                }
            }
        }

        let n = std::cmp::min(buf.remaining(), this.leftover.len());
        buf.put_slice(&this.leftover[..n]);
        this.leftover = this.leftover.split_off(n);
        Poll::Ready(Ok(()))
    }
}
