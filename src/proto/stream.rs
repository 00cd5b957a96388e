//! Per-stream state machine (`spec.md` §4.4) and the data shared between the
//! `Connection` (writer side) and whatever handle the caller holds (reader
//! side), generalized from the teacher's `proto::streams::streams::Stream`
//! into the forward-only, client-specific 8-state sequence the spec names.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;
use std::task::Waker;

use bytes::{Bytes, BytesMut};
use http::Request;
use log::warn;
use tokio_util::sync::CancellationToken;

use crate::error::StreamError;
use crate::frame::StreamId;
use crate::message::{CompletionCallback, Metrics, Priority, ResponseHead, Sniffer};
use crate::proto::body::BodySource;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum StreamState {
    None,
    WriteHeaders,
    WriteData,
    WriteDone,
    ReadHeaders,
    ReadDataStart,
    ReadData,
    ReadDone,
}

impl StreamState {
    /// Attempts to move forward to `next`; backward attempts are a logged
    /// no-op, matching `spec.md` §4.4's "log and ignore" rule.
    pub fn advance(&mut self, next: StreamState) {
        if next > *self {
            *self = next;
        } else if next < *self {
            warn!("ignored backward stream state transition: {:?} -> {:?}", *self, next);
        }
    }
}

/// Data visible to both the `Connection` and a caller-held handle
/// (`client::Handle`), shared via `Rc<RefCell<_>>` since `spec.md` §5
/// forbids cross-thread use of one connection (no `Arc<Mutex<_>>` needed).
#[derive(Debug, Default)]
pub struct Shared {
    pub response: ResponseHead,
    pub metrics: Metrics,
    pub body: VecDeque<Bytes>,
    pub body_eof: bool,
    pub error: Option<StreamError>,
    pub reader_waker: Option<Waker>,
    pub completion_waker: Option<Waker>,
    /// Mirrors `Stream::can_be_restarted`, surfaced here so a caller holding
    /// only a `client::ResponseBody`/handle (i.e. after the `Stream` itself
    /// may already be gone) can still learn `spec.md` §7's restart
    /// classification.
    pub restartable: bool,
}

impl Shared {
    pub fn wake_reader(&mut self) {
        if let Some(w) = self.reader_waker.take() {
            w.wake();
        }
    }

    pub fn wake_completion(&mut self) {
        if let Some(w) = self.completion_waker.take() {
            w.wake();
        }
    }
}

pub struct Stream {
    pub id: StreamId,
    pub state: StreamState,
    pub shared: Rc<RefCell<Shared>>,
    pub priority: Priority,
    pub expect_continue: bool,
    pub can_be_restarted: bool,
    pub paused: bool,
    pub in_sniff: bool,
    pub body: Option<Box<dyn BodySource>>,
    pub pending_read: bool,
    pub sent_end_stream: bool,
    /// Set once a 100-continue informational response arrives; gates body
    /// submission for streams created with `expect_continue`.
    pub continue_received: bool,
    pub sniffer: Option<Box<dyn Sniffer>>,
    /// Body bytes buffered so far while in `ReadDataStart`, fed to `sniffer`
    /// on every new chunk; cleared once the latch is satisfied.
    pub sniff_buf: BytesMut,
    /// Backs `client::get_cancellable` (`spec.md` §6): cancelling this aborts
    /// a pending `run_until_read_async` without touching the stream itself.
    pub cancel: CancellationToken,
    /// The request this stream was submitted with, kept around so
    /// `Connection::finished` can hand it back to the completion callback
    /// (`spec.md` §3/§4.9 step 5). Only ever taken once, at teardown.
    pub request: Option<Request<()>>,
    /// The completion callback + opaque pointer from `spec.md` §3, folded
    /// into a single closure (`CompletionCallback`).
    pub completion: Option<CompletionCallback>,
}

impl Stream {
    pub fn new(
        priority: Priority,
        expect_continue: bool,
        body: Option<Box<dyn BodySource>>,
        sniffer: Option<Box<dyn Sniffer>>,
        request: Request<()>,
        completion: Option<CompletionCallback>,
    ) -> Stream {
        Stream {
            id: StreamId::ZERO,
            state: StreamState::None,
            shared: Rc::new(RefCell::new(Shared::default())),
            priority,
            expect_continue,
            can_be_restarted: false,
            paused: false,
            in_sniff: false,
            body,
            pending_read: false,
            sent_end_stream: false,
            continue_received: false,
            sniffer,
            sniff_buf: BytesMut::new(),
            cancel: CancellationToken::new(),
            request: Some(request),
            completion,
        }
    }

    /// Sets `can_be_restarted` and mirrors it into `Shared` so it's
    /// observable from a `client::ResponseBody`/`Client::can_be_restarted`
    /// even after this `Stream` is gone (`spec.md` §7).
    pub fn set_can_be_restarted(&mut self, value: bool) {
        self.can_be_restarted = value;
        self.shared.borrow_mut().restartable = value;
    }

    /// Feeds newly-arrived body bytes to the sniffer while latched in
    /// `ReadDataStart` (`spec.md` §4.4). Returns `true` once sniffing is
    /// satisfied (or there never was a sniffer), meaning the state machine
    /// may advance to `ReadData`. Re-entrant calls (the sniffer's decoder
    /// setup synchronously demanding more bytes, which re-drives the read
    /// path) are guarded by `in_sniff` and conservatively report "not yet".
    pub fn feed_sniffer(&mut self, chunk: &[u8]) -> bool {
        self.sniff_buf.extend_from_slice(chunk);

        let Some(sniffer) = self.sniffer.as_mut() else { return true };
        if self.in_sniff {
            return false;
        }

        self.in_sniff = true;
        let satisfied = sniffer.feed(&self.sniff_buf);
        self.in_sniff = false;

        if satisfied {
            self.sniff_buf.clear();
        }
        satisfied
    }

    pub fn advance(&mut self, next: StreamState) {
        self.state.advance(next);
    }

    pub fn fail(&mut self, err: StreamError) {
        let mut shared = self.shared.borrow_mut();
        if shared.error.is_none() {
            // first observed error wins, per spec.md §7's "propagation policy"
            shared.error = Some(err);
        }
        if !self.can_be_restarted {
            // spec.md §6: RESPONSE_END is also recorded "on interrupted
            // finish when not restartable".
            shared.metrics.mark_response_end();
        }
        shared.wake_reader();
        shared.wake_completion();
    }
}

impl std::fmt::Debug for Stream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Stream")
            .field("id", &self.id)
            .field("state", &self.state)
            .field("paused", &self.paused)
            .field("can_be_restarted", &self.can_be_restarted)
            .finish()
    }
}
