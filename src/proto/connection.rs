//! Connection IO core (`spec.md` §3, §4.3, §4.5, §4.7, §4.8, §4.9): owns the
//! codec `Session`, the `Io` socket driver, and the stream `Store`; drives
//! inbound frame dispatch and the request body pump, and implements the
//! shutdown/teardown sequence. Generalized from the teacher's
//! `proto::connection::Connection`, which plays the same owning role over
//! its own `Codec`/`Streams` pair.

use std::task::{Context, Poll};
use std::time::{Duration, Instant};

use bytes::Bytes;
use http::StatusCode;
use log::{debug, trace};
use tokio::io::{AsyncRead, AsyncWrite};

use crate::codec::{Session, SessionCallbacks, SessionConfig};
use crate::error::{Error, StreamError, UserError};
use crate::frame::{Head, Kind, Pseudo, Reason, Settings, StreamDependency, StreamId};
use crate::message::{Completion, CompletionKind, Message, Priority};
use crate::proto::body::{BodyLogger, DataPoll};
use crate::proto::io::Io;
use crate::proto::store::{Key, Store};
use crate::proto::stream::{Stream, StreamState};

const BODY_CHUNK: usize = 16 * 1024;
const DEFAULT_READ_CHUNK: usize = 8 * 1024;
const DEFAULT_MAX_CONCURRENT_RESET_STREAMS: usize = 10;
const DEFAULT_RESET_STREAM_DURATION: Duration = Duration::from_secs(10);

/// Handshake-time knobs `client::Builder` exposes on top of `SessionConfig`
/// (`spec.md` §4.3/§4.9 expansion): the socket read chunk size, and the
/// bound on how long (and how many) unconfirmed `RST_STREAM`s are allowed
/// to linger in `closing` before being dropped regardless.
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    pub session: SessionConfig,
    pub read_chunk_size: usize,
    pub max_concurrent_reset_streams: usize,
    pub reset_stream_duration: Duration,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        ConnectionConfig {
            session: SessionConfig::default(),
            read_chunk_size: DEFAULT_READ_CHUNK,
            max_concurrent_reset_streams: DEFAULT_MAX_CONCURRENT_RESET_STREAMS,
            reset_stream_duration: DEFAULT_RESET_STREAM_DURATION,
        }
    }
}

/// Hop-by-hop header names that never cross onto the wire in an HTTP/2
/// HEADERS frame (`spec.md` §4.3 step 2, §6). Compared case-insensitively;
/// `http::HeaderName` already normalizes to lowercase so a literal match
/// suffices.
const HOP_BY_HOP: &[&str] = ["connection", "keep-alive", "proxy-connection", "transfer-encoding", "upgrade"].as_slice();

/// A stream whose RST_STREAM has been queued but not yet confirmed flushed
/// to the socket (`spec.md` §3's `closing_streams`). Kept alive, rather than
/// freed immediately, so nothing reuses its stream id bookkeeping while the
/// frame is still in flight.
struct ClosingStream {
    #[allow(dead_code)]
    stream: Stream,
    /// `Session::queued_end()` at the moment the RST_STREAM was appended;
    /// once `Session::flushed_bytes()` reaches this, the frame is on the
    /// wire and this entry can be dropped.
    flush_target: u64,
    queued_at: Instant,
}

pub struct Connection<T> {
    session: Session,
    io: Io<T>,
    store: Store,
    closing: Vec<ClosingStream>,
    error: Option<Error>,
    remote_goaway: Option<(StreamId, Reason)>,
    /// No new streams accepted; GOAWAY is sent as soon as `store` drains
    /// (`spec.md` §4.8's graceful terminate).
    draining: bool,
    body_scratch: Box<[u8]>,
    logger: Option<Box<dyn BodyLogger>>,
    max_concurrent_reset_streams: usize,
    reset_stream_duration: Duration,
}

impl<T: AsyncRead + AsyncWrite + Unpin> Connection<T> {
    pub fn new(socket: T) -> Connection<T> {
        Connection::with_config(socket, SessionConfig::default())
    }

    pub fn with_config(socket: T, config: SessionConfig) -> Connection<T> {
        Connection::with_full_config(socket, ConnectionConfig { session: config, ..ConnectionConfig::default() })
    }

    pub fn with_full_config(socket: T, config: ConnectionConfig) -> Connection<T> {
        Connection {
            session: Session::with_config(config.session),
            io: Io::with_chunk_size(socket, config.read_chunk_size),
            store: Store::new(),
            closing: Vec::new(),
            error: None,
            remote_goaway: None,
            draining: false,
            body_scratch: vec![0u8; BODY_CHUNK].into_boxed_slice(),
            logger: None,
            max_concurrent_reset_streams: config.max_concurrent_reset_streams,
            reset_stream_duration: config.reset_stream_duration,
        }
    }

    /// Installs the optional request-body logger (`spec.md` §4.6's "approximation
    /// of data hitting the wire"); every byte handed to the codec for a request
    /// body is forwarded here exactly once.
    pub fn set_logger(&mut self, logger: Box<dyn BodyLogger>) {
        self.logger = Some(logger);
    }

    pub fn is_closed(&self) -> bool {
        self.error.is_some()
    }

    pub fn is_open(&self) -> bool {
        self.error.is_none() && !self.session.goaway_sent() && self.remote_goaway.is_none()
    }

    pub fn is_shutting_down(&self) -> bool {
        self.draining
    }

    pub fn active_count(&self) -> usize {
        self.store.len()
    }

    pub fn peer_goaway(&self) -> Option<(StreamId, Reason)> {
        self.remote_goaway
    }

    /// `in_progress(msg)` (`spec.md` §6): the stream still has a live entry
    /// in `active_streams`.
    pub fn in_progress(&self, key: Key) -> bool {
        self.store.get(key).is_some()
    }

    pub fn stream_state(&self, key: Key) -> Option<StreamState> {
        self.store.get(key).map(|s| s.state)
    }

    /// Clones the handle to a stream's reader-visible state, for a
    /// `client::ResponseBody` to read from independently of `&Connection`.
    pub fn shared_state(&self, key: Key) -> Option<std::rc::Rc<std::cell::RefCell<crate::proto::stream::Shared>>> {
        self.store.get(key).map(|s| s.shared.clone())
    }

    pub fn cancel_token(&self, key: Key) -> Option<tokio_util::sync::CancellationToken> {
        self.store.get(key).map(|s| s.cancel.clone())
    }

    /// Bookkeeping for `client::Client::run_until_read_async`'s "every
    /// `pending_read` is eventually completed" invariant (`spec.md` §8);
    /// the façade sets this around its wait loop and clears it when that
    /// loop ends for any reason, including the waiting future being dropped.
    pub fn mark_pending_read(&mut self, key: Key) {
        if let Some(stream) = self.store.get_mut(key) {
            stream.pending_read = true;
        }
    }

    pub fn clear_pending_read(&mut self, key: Key) {
        if let Some(stream) = self.store.get_mut(key) {
            stream.pending_read = false;
        }
    }

    /// Submits a new request (`spec.md` §4.3 steps 1-4): registers a
    /// `Stream`, allocates a stream id, and writes its HEADERS into the
    /// session's output buffer. The caller drives `poll_io` afterwards to
    /// flush it. The `Stream` is built *before* id allocation is attempted
    /// so that running out of ids (step 6) still has somewhere to record
    /// the restartable failure and a stream to hand through `finished`.
    pub fn submit(&mut self, message: Message) -> Result<Key, Error> {
        if let Some(err) = &self.error {
            return Err(err.clone());
        }
        if self.draining || self.remote_goaway.is_some() {
            return Err(UserError::ShuttingDown.into());
        }
        if message.request.method().as_str().is_empty() {
            return Err(UserError::MissingMethod.into());
        }

        let Message { request, priority, expect_continue, body, sniffer, completion } = message;

        let weight = priority.weight();
        let pseudo = Pseudo::request(request.method().clone(), request.uri());
        let mut fields = http::HeaderMap::with_capacity(request.headers().len());
        for (name, value) in request.headers().iter() {
            if HOP_BY_HOP.iter().any(|h| name.as_str().eq_ignore_ascii_case(h)) {
                continue;
            }
            fields.append(name.clone(), value.clone());
        }
        let end_stream = body.is_none();

        let mut stream = Stream::new(priority, expect_continue, body, sniffer, request, completion);
        stream.advance(StreamState::WriteHeaders);
        let key = self.store.insert(stream);

        let stream_id = match self.session.allocate_stream_id() {
            Ok(id) => id,
            Err(_) => {
                // `spec.md` §4.3 step 6: mark it restartable, fail it, and
                // drive it through the normal teardown path — there was
                // never anything on the wire for the peer to be confused by.
                let stream = &mut self.store[key];
                stream.set_can_be_restarted(true);
                stream.fail(StreamError::Connection(Error::StreamIdsExhausted));
                self.finished(key);
                return Err(Error::StreamIdsExhausted);
            }
        };

        self.store.bind_id(key, stream_id);
        let stream = &mut self.store[key];
        stream.id = stream_id;

        let dependency = StreamDependency { stream_id: StreamId::ZERO, weight, is_exclusive: false };
        // `spec.md` §4.3 step 4: a 100-continue request submits HEADERS only;
        // its body (if any) is deferred until the 100 response actually
        // arrives, so it never rides the initial HEADERS frame.
        self.session.submit_headers(stream_id, pseudo, fields, Some(dependency), end_stream);

        let stream = &mut self.store[key];
        stream.sent_end_stream = end_stream;
        stream.advance(if end_stream { StreamState::WriteDone } else { StreamState::WriteData });

        Ok(key)
    }

    pub fn pause(&mut self, key: Key) {
        if let Some(stream) = self.store.get_mut(key) {
            stream.paused = true;
        }
    }

    pub fn unpause(&mut self, key: Key, cx: &mut Context<'_>) {
        if let Some(stream) = self.store.get_mut(key) {
            stream.paused = false;
        }
        self.pump_bodies(cx);
    }

    pub fn is_paused(&self, key: Key) -> bool {
        self.store.get(key).map(|s| s.paused).unwrap_or(false)
    }

    /// Re-prioritizes an already-submitted stream (`spec.md` §8 round-trip
    /// law: "exactly one PRIORITY frame ... each time the message's priority
    /// property changes while `stream_id != 0`"). A no-op if the priority is
    /// unchanged or the stream id hasn't been allocated yet.
    pub fn set_priority(&mut self, key: Key, priority: Priority) {
        let Some(stream) = self.store.get_mut(key) else { return };
        if stream.priority == priority || stream.id == StreamId::ZERO {
            return;
        }
        stream.priority = priority;
        let dependency = StreamDependency { stream_id: StreamId::ZERO, weight: priority.weight(), is_exclusive: false };
        self.session.submit_priority(stream.id, dependency);
    }

    /// Discards the remainder of a response body without reading it
    /// (`spec.md` §4.7's `skip` operation): drops buffered chunks and marks
    /// EOF so a waiting reader unblocks immediately.
    pub fn skip(&mut self, key: Key) {
        if let Some(stream) = self.store.get(key) {
            let mut shared = stream.shared.borrow_mut();
            shared.body.clear();
            shared.body_eof = true;
            shared.wake_reader();
        }
    }

    /// Cancels a stream locally (`spec.md` §4.7): sends RST_STREAM and fails
    /// any waiting reader/completion handle with `StreamError::Cancelled`.
    pub fn cancel(&mut self, key: Key) {
        if let Some(stream) = self.store.get_mut(key) {
            let id = stream.id;
            stream.fail(StreamError::Cancelled);
            self.session.submit_rst_stream(id, Reason::Cancel);
        }
    }

    /// Stream teardown (`spec.md` §4.9): moves the stream out of the active
    /// registry. Step 5's stored completion callback (if any) is invoked
    /// here, with the message and the completion kind/restart classification
    /// — before the RST_STREAM/closing-list bookkeeping below, which is
    /// purely about the wire, not about what the caller gets told. Unless
    /// the whole connection is already tearing down, a RST_STREAM is queued
    /// and the stream lingers in `closing` until that frame is confirmed
    /// flushed (step 3); while draining, streams are dropped directly since
    /// the peer is being told to go away anyway (step 4).
    pub fn finished(&mut self, key: Key) {
        let Some(mut stream) = self.store.remove(key) else { return };

        let complete = stream.state >= StreamState::ReadDone;
        if let Some(cb) = stream.completion.take() {
            let kind = if complete { CompletionKind::Complete } else { CompletionKind::Interrupted };
            let completion = Completion { kind, restartable: stream.can_be_restarted };
            if let Some(request) = stream.request.take() {
                let message = Message {
                    request,
                    priority: stream.priority,
                    expect_continue: stream.expect_continue,
                    body: None,
                    sniffer: None,
                    completion: None,
                };
                cb(message, completion);
            }
        }

        if self.draining {
            self.maybe_terminate();
            return;
        }

        let id = stream.id;
        let reason = if complete { Reason::NoError } else { Reason::Cancel };
        self.session.submit_rst_stream(id, reason);
        let flush_target = self.session.queued_end();

        // Peer never acknowledging RST_STREAM (by flushing it back to us in
        // some observable way) would otherwise grow `closing` without bound;
        // cap it by dropping the oldest entry, per `client::Builder`'s
        // `max_concurrent_reset_streams`.
        if self.closing.len() >= self.max_concurrent_reset_streams {
            self.closing.remove(0);
        }
        self.closing.push(ClosingStream { stream, flush_target, queued_at: Instant::now() });
    }

    /// Frees any `closing` stream whose RST_STREAM has actually reached the
    /// wire (`spec.md` §4.9's "eventual send-callback ... removes it"), or
    /// that has lingered past `reset_stream_duration` regardless.
    fn reap_closing(&mut self) {
        let flushed = self.session.flushed_bytes();
        let max_age = self.reset_stream_duration;
        self.closing.retain(|c| c.flush_target > flushed && c.queued_at.elapsed() < max_age);
    }

    /// Request-from-above close (`spec.md` §4.8 / §6 `close_async`): stops
    /// accepting new submissions immediately; GOAWAY itself is deferred
    /// until no request is active, so in-flight streams finish normally.
    /// Returns `false` if GOAWAY has already gone out.
    pub fn close_async(&mut self) -> bool {
        if self.session.goaway_sent() {
            return false;
        }
        self.draining = true;
        self.maybe_terminate();
        true
    }

    /// Back-compat alias: immediate-effect shutdown request.
    pub fn shutdown(&mut self) -> bool {
        self.close_async()
    }

    fn maybe_terminate(&mut self) {
        if self.draining && self.store.is_empty() && !self.session.goaway_sent() {
            // This client never accepts a peer-initiated stream (push is
            // always disabled), so there is nothing meaningful to name here.
            self.session.submit_go_away(StreamId::ZERO, Reason::NoError);
        }
    }

    /// Drives the socket: flushes pending output, pumps request bodies, and
    /// reads+dispatches inbound frames. Returns `Poll::Pending` once neither
    /// direction can make progress without a future wakeup.
    pub fn poll_io(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Error>> {
        if let Some(err) = &self.error {
            return Poll::Ready(Err(err.clone()));
        }

        self.session.register_waker(cx);
        self.pump_bodies(cx);

        let write_result = {
            let Connection { session, io, .. } = self;
            io.poll_write_ready(cx, session)
        };

        if let Poll::Ready(Err(e)) = &write_result {
            let e = e.clone();
            self.fail(e.clone());
            return Poll::Ready(Err(e));
        }
        if write_result.is_ready() {
            self.reap_closing();
        }

        let read_result = {
            let Connection { session, io, store, remote_goaway, .. } = self;
            let mut cb = Callbacks { store, remote_goaway };
            io.poll_read_ready(cx, session, &mut cb)
        };

        match read_result {
            Poll::Ready(Ok(_)) => Poll::Ready(Ok(())),
            Poll::Ready(Err(e)) => {
                self.fail(e.clone());
                Poll::Ready(Err(e))
            }
            Poll::Pending => Poll::Pending,
        }
    }

    fn pump_bodies(&mut self, cx: &mut Context<'_>) {
        let Connection { session, store, body_scratch, logger, .. } = self;

        for key in store.keys() {
            let Some(stream) = store.get_mut(key) else { continue };

            if stream.state != StreamState::WriteData || stream.paused {
                continue;
            }
            if stream.expect_continue && !stream.continue_received {
                continue;
            }

            let Some(body) = stream.body.as_mut() else {
                stream.advance(StreamState::WriteDone);
                continue;
            };

            match body.poll_data(cx, body_scratch.as_mut()) {
                DataPoll::Ready { len, end_stream } => {
                    let chunk = Bytes::copy_from_slice(&body_scratch[..len]);
                    if len > 0 {
                        if let Some(logger) = logger.as_mut() {
                            logger.log_bytes(&chunk);
                        }
                    }
                    session.submit_data_continue(stream.id, chunk, end_stream);
                    if end_stream {
                        stream.sent_end_stream = true;
                        stream.body = None;
                        stream.advance(StreamState::WriteDone);
                    }
                }
                DataPoll::Deferred => {}
                DataPoll::Error(err) => {
                    let id = stream.id;
                    stream.body = None;
                    stream.fail(StreamError::Connection(Error::Io(err)));
                    stream.advance(StreamState::WriteDone);
                    session.submit_rst_stream(id, Reason::InternalError);
                }
            }
        }
    }

    /// First fatal error wins (`spec.md` §7): every open stream is failed
    /// with a clone of it and no further IO is attempted.
    fn fail(&mut self, err: Error) {
        if self.error.is_some() {
            return;
        }
        self.error = Some(err.clone());
        self.store.for_each_mut(|_key, stream| stream.fail(StreamError::Connection(err.clone())));
        // The socket is dead; nothing will ever confirm these RST_STREAMs.
        self.closing.clear();
    }
}

/// Borrows only the `Store`/GOAWAY fields of `Connection`, so it can be
/// constructed alongside a live `&mut Session` borrow from the same struct.
struct Callbacks<'a> {
    store: &'a mut Store,
    remote_goaway: &'a mut Option<(StreamId, Reason)>,
}

impl<'a> SessionCallbacks for Callbacks<'a> {
    fn on_begin_frame(&mut self, head: &Head) {
        trace!("frame: kind={:?} stream={:?}", head.kind(), head.stream_id());

        match head.kind() {
            // `spec.md` §4.5: HEADERS arriving while we're done writing our
            // request moves us into the response-headers state; this is the
            // "response start" timestamping point.
            Kind::Headers => {
                if let Some(stream) = self.store.find_by_id(head.stream_id()) {
                    if stream.state == StreamState::WriteDone {
                        stream.advance(StreamState::ReadHeaders);
                        let mut shared = stream.shared.borrow_mut();
                        shared.metrics.mark_response_start();
                    }
                }
            }
            // DATA beginning while we're still in ReadHeaders means a body
            // is coming; latch into ReadDataStart until sniffing (if any)
            // is satisfied.
            Kind::Data => {
                if let Some(stream) = self.store.find_by_id(head.stream_id()) {
                    if stream.state == StreamState::ReadHeaders {
                        stream.advance(StreamState::ReadDataStart);
                    }
                }
            }
            _ => {}
        }
    }

    fn on_header(&mut self, stream_id: StreamId, pseudo: &Pseudo, fields: &http::HeaderMap, end_stream: bool) {
        let Some(stream) = self.store.find_by_id(stream_id) else { return };

        if let Some(status) = pseudo.status {
            if status.is_informational() {
                // Informational responses (including 100 Continue) never
                // advance state past ReadHeaders; clear any partial response
                // state so the eventual final response starts fresh.
                if status == StatusCode::CONTINUE && stream.expect_continue {
                    stream.continue_received = true;
                    stream.advance(StreamState::WriteData);
                }
                let mut shared = stream.shared.borrow_mut();
                shared.response.status = Some(status);
                shared.response.headers.clear();
                shared.wake_completion();
                return;
            }
        }

        // Trailers: a second HEADERS frame arriving once the body has
        // already started is appended to the response headers rather than
        // replacing the status line.
        let is_trailers = stream.state >= StreamState::ReadDataStart;

        {
            let mut shared = stream.shared.borrow_mut();
            if !is_trailers {
                if let Some(status) = pseudo.status {
                    shared.response.status = Some(status);
                }
            }
            for (name, value) in fields.iter() {
                shared.response.headers.append(name.clone(), value.clone());
            }
            let approx_bytes: u64 = fields.iter().map(|(n, v)| (n.as_str().len() + v.len()) as u64).sum();
            shared.metrics.record_header_bytes(approx_bytes);
            shared.wake_completion();
        }

        if is_trailers {
            if end_stream {
                stream.advance(StreamState::ReadData);
                stream.advance(StreamState::ReadDone);
                let mut shared = stream.shared.borrow_mut();
                shared.body_eof = true;
                shared.metrics.mark_response_end();
                shared.wake_reader();
            }
            return;
        }

        let status_204 = pseudo.status == Some(StatusCode::NO_CONTENT);

        if end_stream || status_204 {
            // No body is coming: pass straight through ReadDataStart/ReadData
            // on the way to ReadDone (`spec.md` §8's round-trip law).
            stream.advance(StreamState::ReadDataStart);
            stream.advance(StreamState::ReadData);
            stream.advance(StreamState::ReadDone);
            let mut shared = stream.shared.borrow_mut();
            shared.body_eof = true;
            shared.metrics.mark_response_end();
            shared.wake_reader();
        } else {
            stream.advance(StreamState::ReadHeaders);
        }
    }

    fn on_data_chunk(&mut self, stream_id: StreamId, data: &Bytes, end_stream: bool) {
        let Some(stream) = self.store.find_by_id(stream_id) else { return };
        stream.advance(StreamState::ReadDataStart);

        {
            let mut shared = stream.shared.borrow_mut();
            shared.metrics.record_body_bytes(data.len() as u64);
            shared.body.push_back(data.clone());
            if end_stream {
                shared.body_eof = true;
                shared.metrics.mark_response_end();
            }
        }

        if stream.state == StreamState::ReadDataStart {
            let satisfied = stream.feed_sniffer(data);
            if end_stream || satisfied {
                stream.advance(StreamState::ReadData);
            }
        }

        let mut shared = stream.shared.borrow_mut();
        shared.wake_reader();
        drop(shared);

        if end_stream {
            stream.advance(StreamState::ReadDone);
        }
    }

    fn on_rst_stream(&mut self, stream_id: StreamId, reason: Reason) {
        let Some(key) = self.store.find_key(stream_id) else { return };
        let stream = &mut self.store[key];
        // A stream refused before its final response headers arrived never
        // did anything the peer can't safely re-process on a fresh stream.
        let refused = reason == Reason::RefusedStream && stream.state <= StreamState::ReadHeaders;
        stream.set_can_be_restarted(refused);
        stream.fail(if refused { StreamError::Refused } else { StreamError::Reset(reason) });
    }

    fn on_window_update(&mut self, stream_id: StreamId, increment: u32) {
        trace!("WINDOW_UPDATE stream={:?} increment={}", stream_id, increment);
    }

    fn on_settings(&mut self, settings: &Settings) {
        debug!("peer SETTINGS: {:?}", settings);
    }

    fn on_go_away(&mut self, last_stream_id: StreamId, reason: Reason) {
        *self.remote_goaway = Some((last_stream_id, reason));
        let last: u32 = last_stream_id.into();

        self.store.for_each_mut(|_key, stream| {
            let id: u32 = stream.id.into();
            let still_reading = stream.state < StreamState::ReadDone;

            // Per RFC 7540 §6.8, streams above last_stream_id were never
            // processed; streams at or below it that are still mid-response
            // when GOAWAY lands are errored too rather than left to hang.
            if id > last || still_reading {
                stream.set_can_be_restarted(id > last && stream.state <= StreamState::ReadHeaders);
                stream.fail(StreamError::Connection(Error::Protocol(reason)));
            }
        });
    }

    fn on_ping_ack(&mut self, _payload: [u8; 8]) {
        trace!("PING ack received");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::Request;
    use tokio_test::io::{Builder, Mock};

    #[test]
    fn submit_writes_a_headers_frame_for_a_bodyless_get() {
        let mock = Builder::new().build();
        let mut conn = Connection::new(mock);

        let request = Request::builder().method("GET").uri("https://example.com/").body(()).unwrap();
        let key = conn.submit(Message::new(request)).unwrap();

        assert!(conn.store.get(key).is_some());
        assert_eq!(conn.store[key].state, StreamState::WriteDone);
        assert!(conn.session.wants_write());
    }

    #[test]
    fn shutdown_is_idempotent() {
        let mut conn = Connection::new(Builder::new().build());
        conn.shutdown();
        assert!(conn.is_shutting_down());
        let pending_after_first = conn.session.get_output_window().len();
        conn.shutdown();
        assert_eq!(conn.session.get_output_window().len(), pending_after_first);
    }

    fn submit_get(conn: &mut Connection<Mock>) -> Key {
        let request = Request::builder().method("GET").uri("https://example.com/").body(()).unwrap();
        conn.submit(Message::new(request)).unwrap()
    }

    /// `spec.md` §8 boundary behavior: `REFUSED_STREAM` on stream close sets
    /// `can_be_restarted`; any other reason does not.
    #[test]
    fn refused_stream_is_restartable_other_reasons_are_not() {
        let mut conn = Connection::new(Builder::new().build());
        let refused_key = submit_get(&mut conn);
        let other_key = submit_get(&mut conn);

        let refused_id = conn.store[refused_key].id;
        let other_id = conn.store[other_key].id;

        {
            let Connection { store, remote_goaway, .. } = &mut conn;
            let mut cb = Callbacks { store, remote_goaway };
            cb.on_rst_stream(refused_id, Reason::RefusedStream);
            cb.on_rst_stream(other_id, Reason::Cancel);
        }

        assert!(conn.store[refused_key].can_be_restarted);
        assert!(!conn.store[other_key].can_be_restarted);
    }

    /// `spec.md` §8 boundary behavior: a peer GOAWAY with `last_stream_id = k`
    /// lets streams `<= k` alone (once they're done reading) and errors
    /// streams `> k`; after it lands, `is_open()` goes false and `submit`
    /// rejects new requests.
    #[test]
    fn peer_goaway_closes_the_connection_to_new_submissions() {
        let mut conn = Connection::new(Builder::new().build());
        let kept_key = submit_get(&mut conn);
        let dropped_key = submit_get(&mut conn);
        conn.store[kept_key].advance(StreamState::ReadDone);

        let kept_id = conn.store[kept_key].id;

        {
            let Connection { store, remote_goaway, .. } = &mut conn;
            let mut cb = Callbacks { store, remote_goaway };
            cb.on_go_away(kept_id, Reason::NoError);
        }

        assert!(conn.store[kept_key].shared.borrow().error.is_none());
        assert!(conn.store[dropped_key].shared.borrow().error.is_some());

        assert!(!conn.is_open());
        assert!(matches!(conn.submit(Message::new(
            Request::builder().method("GET").uri("https://example.com/").body(()).unwrap()
        )), Err(Error::User(UserError::ShuttingDown))));
    }
}
