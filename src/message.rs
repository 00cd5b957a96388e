//! Minimal stand-ins for the message/metrics objects the enclosing HTTP
//! session (out of scope here, per `spec.md` §1) is assumed to supply.

use std::time::Instant;

use http::{HeaderMap, Request, StatusCode};

use crate::proto::body::BodySource;

/// Relative priority, mapped onto the 5-level scheme `spec.md` §4.3 step 3
/// names; translated to an RFC 7540 stream-dependency weight at submit time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Priority {
    VeryLow,
    Low,
    Normal,
    High,
    VeryHigh,
}

impl Priority {
    /// RFC 7540's default stream weight is 16; the other four levels split
    /// the remaining range around it per `spec.md` §4.3 step 3 ("min,
    /// half-between-min-and-default, default, half-between-default-and-max,
    /// max"), so the mapping stays monotonic end to end.
    pub fn weight(self) -> u8 {
        match self {
            Priority::VeryLow => 1,
            Priority::Low => 8,
            Priority::Normal => 16,
            Priority::High => 136,
            Priority::VeryHigh => 255,
        }
    }
}

impl Default for Priority {
    fn default() -> Self {
        Priority::Normal
    }
}

/// Inspects the first bytes of a response body to infer its media type when
/// declared information (e.g. `Content-Type`) is insufficient (`spec.md`
/// §4.4's "sniffing latch", GLOSSARY). `feed` is called with everything
/// buffered so far each time more bytes arrive while still unsatisfied, and
/// returns `true` once it has seen enough to decide.
pub trait Sniffer {
    fn feed(&mut self, buffered: &[u8]) -> bool;
}

/// Whether a finished stream reached the end of its response or was torn
/// down before getting there (`spec.md` §4.9 step 1's completion kind).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionKind {
    Complete,
    Interrupted,
}

/// Handed to the stored completion callback when a stream is torn down
/// (`spec.md` §3's "completion callback + opaque pointer", §4.9 step 5).
/// `restartable` mirrors `spec.md` §7's restart classification: the
/// enclosing session should re-queue the message (`RESTARTING`) rather than
/// surface the error (`RESPONSE_END`) when this is `true`.
#[derive(Debug, Clone, Copy)]
pub struct Completion {
    pub kind: CompletionKind,
    pub restartable: bool,
}

/// The "completion callback + opaque pointer" pair `spec.md` §3/§4.9 step 5
/// names, folded into a single `FnOnce` the way idiomatic Rust replaces a
/// C-style `fn(cb, data)` pair: whatever "data" the enclosing session needs
/// at completion time is simply captured by the closure.
pub type CompletionCallback = Box<dyn FnOnce(Message, Completion)>;

/// A submittable request: method/uri/headers plus an optional body
/// producer. `expect_continue` requests the 100-continue deferred-body path
/// from `spec.md` §4.3 step 4. `completion` is the callback+opaque-pointer
/// pair from `spec.md` §6's `send_item(item, cb, data)` row.
pub struct Message {
    pub request: Request<()>,
    pub priority: Priority,
    pub expect_continue: bool,
    pub body: Option<Box<dyn BodySource>>,
    pub sniffer: Option<Box<dyn Sniffer>>,
    pub completion: Option<CompletionCallback>,
}

impl Message {
    pub fn new(request: Request<()>) -> Message {
        Message {
            request,
            priority: Priority::default(),
            expect_continue: false,
            body: None,
            sniffer: None,
            completion: None,
        }
    }

    pub fn with_body(mut self, body: Box<dyn BodySource>) -> Message {
        self.body = Some(body);
        self
    }

    pub fn with_priority(mut self, priority: Priority) -> Message {
        self.priority = priority;
        self
    }

    pub fn with_sniffer(mut self, sniffer: Box<dyn Sniffer>) -> Message {
        self.sniffer = Some(sniffer);
        self
    }

    pub fn expecting_continue(mut self) -> Message {
        self.expect_continue = true;
        self
    }

    /// Attaches the completion callback + opaque pointer, folded into one
    /// closure per `CompletionCallback` (`spec.md` §6's `send_item(item, cb,
    /// data)` row).
    pub fn with_completion(mut self, completion: CompletionCallback) -> Message {
        self.completion = Some(completion);
        self
    }
}

/// Counters and timestamps surfaced to the caller per `spec.md` §6.
#[derive(Debug, Default, Clone)]
pub struct Metrics {
    pub response_header_bytes_received: u64,
    pub response_body_bytes_received: u64,
    pub response_start: Option<Instant>,
    pub response_end: Option<Instant>,
}

impl Metrics {
    pub fn new() -> Metrics {
        Metrics::default()
    }

    pub(crate) fn record_header_bytes(&mut self, n: u64) {
        self.response_header_bytes_received += n;
    }

    pub(crate) fn record_body_bytes(&mut self, n: u64) {
        self.response_body_bytes_received += n;
    }

    /// `RESPONSE_START` (`spec.md` §6): first response HEADERS begins.
    pub(crate) fn mark_response_start(&mut self) {
        if self.response_start.is_none() {
            self.response_start = Some(Instant::now());
        }
    }

    /// `RESPONSE_END` (`spec.md` §6): client-stream EOF, or an interrupted
    /// finish that isn't restartable.
    pub(crate) fn mark_response_end(&mut self) {
        if self.response_end.is_none() {
            self.response_end = Some(Instant::now());
        }
    }
}

/// Built incrementally by `on_header` (`spec.md` §4.5) as HEADERS frames
/// (informational, then final) arrive.
#[derive(Debug, Default, Clone)]
pub struct ResponseHead {
    pub status: Option<StatusCode>,
    pub headers: HeaderMap,
}

impl ResponseHead {
    pub fn is_informational(&self) -> bool {
        matches!(self.status, Some(s) if s.is_informational())
    }
}
