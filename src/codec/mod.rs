//! The Session wrapper (`spec.md` §4.1): owns the frame codec and HPACK
//! state, thin by design — everything it exposes is a pass-through onto
//! `frame::*` encode/decode plus bookkeeping the spec names explicitly
//! (`in_callback`, initial SETTINGS, stream id allocation, auto-PONG).
//!
//! Grounded on the teacher's `codec::framed_read` (decode loop +
//! CONTINUATION reassembly) and `proto::framed_write` (output buffer
//! pattern), adapted from a `Stream`/`Sink` pair into this pull-based shape.

use std::collections::VecDeque;
use std::task::{Context, Waker};

use bytes::{Bytes, BytesMut};
use http::HeaderMap;
use log::{debug, trace, warn};

use crate::error::Error;
use crate::frame::{
    self, Data, GoAway, Head, Headers, Kind, Ping, Priority, Pseudo, Reason, Reset, Settings, StreamDependency,
    StreamId, WindowUpdate,
};
use crate::hpack;

pub const INITIAL_WINDOW_SIZE: u32 = 32 * 1024 * 1024;
pub const HEADER_TABLE_SIZE: usize = 64 * 1024;
const PREFACE: &[u8] = b"PRI * HTTP/2.0\r\n\r\nSM\r\n\r\n";

/// The handful of handshake knobs `client::Builder` exposes (`spec.md` §6).
#[derive(Debug, Clone, Copy)]
pub struct SessionConfig {
    pub header_table_size: usize,
    pub initial_window_size: u32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        SessionConfig {
            header_table_size: HEADER_TABLE_SIZE,
            initial_window_size: INITIAL_WINDOW_SIZE,
        }
    }
}

/// Fired as the session decodes each frame; mirrors `spec.md` §4.5's
/// dispatch table. `Connection` is the sole implementor.
pub trait SessionCallbacks {
    fn on_begin_frame(&mut self, head: &Head);
    fn on_header(&mut self, stream_id: StreamId, pseudo: &Pseudo, fields: &HeaderMap, end_stream: bool);
    fn on_data_chunk(&mut self, stream_id: StreamId, data: &Bytes, end_stream: bool);
    fn on_rst_stream(&mut self, stream_id: StreamId, reason: Reason);
    fn on_window_update(&mut self, stream_id: StreamId, increment: u32);
    fn on_settings(&mut self, settings: &Settings);
    fn on_go_away(&mut self, last_stream_id: StreamId, reason: Reason);
    fn on_ping_ack(&mut self, payload: [u8; 8]);
}

#[derive(Debug)]
pub enum SubmitError {
    StreamIdExhausted,
}

struct PartialHeaders {
    stream_id: StreamId,
    buf: BytesMut,
    end_stream: bool,
}

pub struct Session {
    encoder: hpack::Encoder,
    decoder: hpack::Decoder,
    read_buf: BytesMut,
    write_buf: BytesMut,
    write_cursor: usize,
    next_stream_id: u32,
    partial_headers: Option<PartialHeaders>,
    pending_pongs: VecDeque<Ping>,
    preface_sent: bool,
    settings_acked: bool,
    goaway_sent: bool,
    in_callback: u32,
    /// Total bytes ever handed to the socket driver (monotonic, survives the
    /// write buffer being cleared once fully drained). Lets `Connection`
    /// tell when a previously-queued frame (e.g. a RST_STREAM) has actually
    /// reached the wire, per `spec.md` §4.9's "eventual send-callback".
    total_written: u64,
    /// The waker of whoever is currently driving this connection
    /// (`Connection::poll_io`), cached so `resume_data` has someone to wake.
    waker: Option<Waker>,
}

impl Session {
    pub fn new() -> Session {
        Session::with_config(SessionConfig::default())
    }

    pub fn with_config(config: SessionConfig) -> Session {
        let mut session = Session {
            encoder: hpack::Encoder::new(config.header_table_size),
            decoder: hpack::Decoder::new(config.header_table_size),
            read_buf: BytesMut::new(),
            write_buf: BytesMut::new(),
            write_cursor: 0,
            next_stream_id: 1,
            partial_headers: None,
            pending_pongs: VecDeque::new(),
            preface_sent: false,
            settings_acked: false,
            goaway_sent: false,
            in_callback: 0,
            total_written: 0,
            waker: None,
        };
        session.send_preface_and_settings(config);
        session
    }

    fn send_preface_and_settings(&mut self, config: SessionConfig) {
        self.write_buf.extend_from_slice(PREFACE);
        self.preface_sent = true;

        let mut settings = Settings::default();
        settings.set_header_table_size(config.header_table_size as u32);
        settings.set_enable_push(false);
        settings.set_initial_window_size(config.initial_window_size);
        settings.encode(&mut self.write_buf);

        // Connection-level window: bump it to the configured size via an
        // initial WINDOW_UPDATE (the default connection window is 64 KiB).
        if config.initial_window_size > 65_535 {
            let bump = config.initial_window_size - 65_535;
            WindowUpdate::new(StreamId::ZERO, bump).encode(&mut self.write_buf);
        }
    }

    pub fn in_callback(&self) -> u32 {
        self.in_callback
    }

    pub fn wants_write(&self) -> bool {
        self.write_cursor < self.write_buf.len()
    }

    /// `spec.md` §4.1: whether the connection still cares about inbound
    /// bytes. Once our own GOAWAY has gone out there is nothing left this
    /// client is waiting to hear — `maybe_terminate` only sends it once
    /// `active_streams` is empty, so by then nothing here needs a response.
    pub fn wants_read(&self) -> bool {
        !self.goaway_sent
    }

    /// The unsent tail of the output buffer; the socket driver writes from
    /// here and reports progress back via `advance_output`.
    pub fn get_output_window(&mut self) -> &[u8] {
        &self.write_buf[self.write_cursor..]
    }

    pub fn advance_output(&mut self, n: usize) {
        self.write_cursor += n;
        self.total_written += n as u64;
        if self.write_cursor == self.write_buf.len() {
            self.write_buf.clear();
            self.write_cursor = 0;
        }
    }

    /// Bytes actually handed to the socket so far (monotonic).
    pub fn flushed_bytes(&self) -> u64 {
        self.total_written
    }

    /// Absolute wire position of the end of everything queued right now
    /// (flushed plus still-buffered). A frame just appended to the output
    /// buffer ends exactly here; comparing a stashed value of this against
    /// `flushed_bytes()` later tells you whether that frame has gone out.
    pub fn queued_end(&self) -> u64 {
        self.total_written + (self.write_buf.len() - self.write_cursor) as u64
    }

    /// Feeds newly-read bytes into the decoder, firing zero or more
    /// callbacks. Returns the number of complete frames processed.
    pub fn feed_input<C: SessionCallbacks>(&mut self, input: &[u8], cb: &mut C) -> Result<usize, Error> {
        self.read_buf.extend_from_slice(input);
        let mut processed = 0;

        loop {
            if self.read_buf.len() < frame::HEADER_LEN {
                break;
            }

            let (head, len) = Head::parse(&self.read_buf[..frame::HEADER_LEN]);
            let total = frame::HEADER_LEN + len;

            if self.read_buf.len() < total {
                break;
            }

            let frame_bytes = self.read_buf.split_to(total);
            let payload = Bytes::copy_from_slice(&frame_bytes[frame::HEADER_LEN..]);

            self.in_callback += 1;
            let result = self.dispatch(head, payload, cb);
            self.in_callback -= 1;
            result?;

            processed += 1;
        }

        Ok(processed)
    }

    fn dispatch<C: SessionCallbacks>(&mut self, head: Head, payload: Bytes, cb: &mut C) -> Result<(), Error> {
        cb.on_begin_frame(&head);

        match head.kind() {
            Kind::Headers => self.handle_headers(head, payload, cb),
            Kind::Continuation => self.handle_continuation(head, payload, cb),
            Kind::Data => {
                let data = Data::load(head, payload)?;
                cb.on_data_chunk(data.stream_id(), data.payload(), data.is_end_stream());
                Ok(())
            }
            Kind::Settings => {
                let settings = Settings::load(head, &payload)?;
                if settings.is_ack() {
                    self.settings_acked = true;
                } else {
                    if let Some(table_size) = settings.header_table_size() {
                        self.encoder.update_max_size(table_size as usize);
                    }
                    cb.on_settings(&settings);
                    Settings::ack().encode(&mut self.write_buf);
                }
                Ok(())
            }
            Kind::Ping => {
                let ping = Ping::load(head, payload)?;
                if ping.is_ack() {
                    cb.on_ping_ack(ping.payload());
                } else {
                    // PING responses SHOULD be prioritized; queued here and
                    // drained opportunistically by `get_output_window`
                    // (called every time the driver refills), folding the
                    // teacher's standalone `PingPong` adapter into Session.
                    self.pending_pongs.push_back(Ping::pong(ping.payload()));
                    self.drain_pongs();
                }
                Ok(())
            }
            Kind::Reset => {
                let reset = Reset::load(head, payload)?;
                cb.on_rst_stream(reset.stream_id(), reset.reason());
                Ok(())
            }
            Kind::GoAway => {
                let goaway = GoAway::load(head, payload)?;
                cb.on_go_away(goaway.last_stream_id(), goaway.reason());
                Ok(())
            }
            Kind::WindowUpdate => {
                let wu = WindowUpdate::load(head, payload)?;
                cb.on_window_update(wu.stream_id(), wu.size_increment());
                Ok(())
            }
            Kind::Priority => {
                let _ = Priority::load(head, payload);
                Ok(())
            }
            Kind::PushPromise => {
                // ENABLE_PUSH=0 is always sent; a conforming peer never
                // sends this. Treat it as a protocol error.
                Err(Error::Protocol(Reason::ProtocolError))
            }
            Kind::Unknown => {
                debug!("ignoring unknown frame kind on stream {:?}", head.stream_id());
                Ok(())
            }
        }
    }

    fn handle_headers<C: SessionCallbacks>(&mut self, head: Head, payload: Bytes, cb: &mut C) -> Result<(), Error> {
        let flags = frame::HeadersFlag::load(head.flag());

        if !flags.is_end_headers() {
            self.partial_headers = Some(PartialHeaders {
                stream_id: head.stream_id(),
                buf: BytesMut::from(&payload[..]),
                end_stream: flags.is_end_stream(),
            });
            return Ok(());
        }

        let headers = Headers::load(head, payload, &mut self.decoder)?;
        let end_stream = headers.is_end_stream();
        let stream_id = headers.stream_id();
        let pseudo = headers.pseudo().clone();
        let fields = headers.into_fields();
        cb.on_header(stream_id, &pseudo, &fields, end_stream);
        Ok(())
    }

    fn handle_continuation<C: SessionCallbacks>(&mut self, head: Head, payload: Bytes, cb: &mut C) -> Result<(), Error> {
        let mut partial = self.partial_headers.take().ok_or(Error::Protocol(Reason::ProtocolError))?;

        if partial.stream_id != head.stream_id() {
            return Err(Error::Protocol(Reason::ProtocolError));
        }

        partial.buf.extend_from_slice(&payload);
        let end_headers = frame::HeadersFlag::load(head.flag()).is_end_headers();

        if !end_headers {
            self.partial_headers = Some(partial);
            return Ok(());
        }

        let mut flags = frame::HeadersFlag::default();
        if partial.end_stream {
            flags.set_end_stream();
        }
        let full_head = Head::new(Kind::Headers, flags.into(), partial.stream_id);
        let reassembled = Bytes::from(partial.buf.freeze());
        let headers = Headers::load(full_head, reassembled, &mut self.decoder)?;

        let end_stream = headers.is_end_stream();
        let stream_id = headers.stream_id();
        let pseudo = headers.pseudo().clone();
        let fields = headers.into_fields();
        cb.on_header(stream_id, &pseudo, &fields, end_stream);
        Ok(())
    }

    fn drain_pongs(&mut self) {
        while let Some(pong) = self.pending_pongs.pop_front() {
            pong.encode(&mut self.write_buf);
        }
    }

    pub fn allocate_stream_id(&mut self) -> Result<StreamId, SubmitError> {
        if self.next_stream_id > (1 << 31) - 2 {
            return Err(SubmitError::StreamIdExhausted);
        }
        let id = StreamId::new(self.next_stream_id);
        self.next_stream_id += 2;
        Ok(id)
    }

    /// Encodes a HEADERS frame (plus any CONTINUATION frames needed) for a
    /// new request, per `spec.md` §4.3 step 2-3.
    pub fn submit_headers(
        &mut self,
        stream_id: StreamId,
        pseudo: Pseudo,
        fields: HeaderMap,
        dependency: Option<StreamDependency>,
        end_stream: bool,
    ) {
        trace!("submitting HEADERS stream={:?} end_stream={}", stream_id, end_stream);
        self.drain_pongs();

        let mut headers = Headers::new(stream_id, pseudo, fields);
        if end_stream {
            headers.set_end_stream();
        }
        if let Some(dep) = dependency {
            headers.set_priority(dep);
        }

        let mut cont = headers.encode(&mut self.encoder, &mut self.write_buf);
        while let Some(c) = cont.take() {
            cont = c.encode(&mut self.encoder, &mut self.write_buf);
        }
    }

    fn submit_data(&mut self, stream_id: StreamId, data: Bytes, end_stream: bool) {
        self.drain_pongs();
        Data::new(stream_id, data, end_stream).encode(&mut self.write_buf);
    }

    /// `spec.md` §4.1's named entry point for handing a stream's body pump
    /// another chunk: every DATA frame after the initial HEADERS is, from
    /// the codec's point of view, a continuation of that stream's body.
    pub fn submit_data_continue(&mut self, stream_id: StreamId, data: Bytes, end_stream: bool) {
        self.submit_data(stream_id, data, end_stream);
    }

    /// Caches the waker of whoever is currently driving this connection's
    /// I/O (`Connection::poll_io`), so an out-of-band `resume_data` call can
    /// wake the right task.
    pub fn register_waker(&mut self, cx: &Context<'_>) {
        self.waker = Some(cx.waker().clone());
    }

    /// `spec.md` §4.1: a body producer that deferred a `poll_data` call
    /// invokes this (indirectly, by waking up whatever it stashed) once
    /// bytes/EOF/an error become available, so the connection gets polled
    /// again and the pump retries the stream. This pull-based codec re-scans
    /// every `WRITE_DATA` stream on the next pass rather than tracking
    /// per-stream readiness, so `stream_id` isn't consulted — it's accepted
    /// to match the spec's named entry point.
    pub fn resume_data(&mut self, _stream_id: StreamId) {
        if let Some(waker) = self.waker.take() {
            waker.wake();
        }
    }

    pub fn submit_priority(&mut self, stream_id: StreamId, dependency: StreamDependency) {
        self.drain_pongs();
        Priority::new(stream_id, dependency).encode(&mut self.write_buf);
    }

    pub fn submit_rst_stream(&mut self, stream_id: StreamId, reason: Reason) {
        self.drain_pongs();
        Reset::new(stream_id, reason).encode(&mut self.write_buf);
    }

    pub fn submit_go_away(&mut self, last_stream_id: StreamId, reason: Reason) {
        self.drain_pongs();
        GoAway::new(last_stream_id, reason).encode(&mut self.write_buf);
        self.goaway_sent = true;
    }

    pub fn goaway_sent(&self) -> bool {
        self.goaway_sent
    }

    pub fn preface_sent(&self) -> bool {
        self.preface_sent
    }

    pub fn settings_acked(&self) -> bool {
        self.settings_acked
    }

    pub fn submit_ping(&mut self, payload: [u8; 8]) {
        Ping::ping(payload).encode(&mut self.write_buf);
    }

    pub fn warn_unhandled(&self, what: &str) {
        warn!("h2io: unhandled session event: {}", what);
    }
}

impl Default for Session {
    fn default() -> Self {
        Session::new()
    }
}
