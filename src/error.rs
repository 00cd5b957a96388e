//! Error taxonomy: connection-fatal errors vs. per-stream errors, plus the
//! RFC 7540 error-code type re-exported from `frame`.

use std::io;

use thiserror::Error;

pub use crate::frame::Reason;

/// A connection-fatal error. Once one of these surfaces, the `Connection`
/// is done: no further frames are read or written, and every still-open
/// stream is failed with a clone of this error (or a derived `StreamError`).
#[derive(Debug, Error)]
pub enum Error {
    #[error("io error: {0}")]
    Io(#[source] io::Error),

    #[error("protocol error: {0:?}")]
    Protocol(Reason),

    #[error("hpack error: {0}")]
    Hpack(#[from] crate::hpack::DecoderError),

    #[error("usage error: {0}")]
    User(#[from] UserError),

    #[error("operation cancelled")]
    Cancelled,

    #[error("stream id space exhausted; open a new connection")]
    StreamIdsExhausted,
}

impl Error {
    pub fn reason(&self) -> Reason {
        match self {
            Error::Protocol(r) => *r,
            Error::Hpack(_) => Reason::CompressionError,
            Error::Io(_) => Reason::InternalError,
            Error::User(_) => Reason::InternalError,
            Error::Cancelled => Reason::Cancel,
            Error::StreamIdsExhausted => Reason::NoError,
        }
    }
}

impl Clone for Error {
    fn clone(&self) -> Self {
        match self {
            Error::Io(e) => Error::Io(io::Error::new(e.kind(), e.to_string())),
            Error::Protocol(r) => Error::Protocol(*r),
            Error::Hpack(e) => Error::Hpack(e.clone()),
            Error::User(e) => Error::User(e.clone()),
            Error::Cancelled => Error::Cancelled,
            Error::StreamIdsExhausted => Error::StreamIdsExhausted,
        }
    }
}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Error {
        Error::Io(e)
    }
}

impl From<Reason> for Error {
    fn from(r: Reason) -> Error {
        Error::Protocol(r)
    }
}

impl From<crate::frame::Error> for Error {
    fn from(e: crate::frame::Error) -> Error {
        match e {
            crate::frame::Error::Hpack(d) => Error::Hpack(d),
            other => Error::Protocol(other.into()),
        }
    }
}

/// Misuse of the public API — handshake ordering, calling a method on a
/// stream that's already finished, building a malformed request, etc.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum UserError {
    #[error("handshake must complete before submitting requests")]
    NotHandshaked,

    #[error("connection is shutting down; no new requests are accepted")]
    ShuttingDown,

    #[error("missing request method")]
    MissingMethod,

    #[error("malformed request headers")]
    MalformedHeaders,

    #[error("request body already finished")]
    BodyWriteAfterEnd,

    #[error("stream has already finished")]
    StreamAlreadyFinished,

    #[error("too many concurrent reset streams; peer is not acknowledging RST_STREAM")]
    TooManyResetStreams,
}

/// A per-stream error: either the connection died out from under it, or the
/// peer reset it, or the local side cancelled it.
#[derive(Debug, Error, Clone)]
pub enum StreamError {
    #[error("connection error: {0}")]
    Connection(#[source] Error),

    #[error("stream reset by peer: {0:?}")]
    Reset(Reason),

    #[error("stream cancelled locally")]
    Cancelled,

    #[error("stream refused by peer before being processed")]
    Refused,
}

impl StreamError {
    /// Per `spec.md` §4.4/§4.5: a stream refused before any response state
    /// was observed is eligible for transparent restart on a fresh stream.
    pub fn is_refused(&self) -> bool {
        matches!(self, StreamError::Refused)
    }
}

impl From<StreamError> for Error {
    /// Collapses a per-stream error down to a connection-shaped one, for
    /// callers (like `run_until_read`) whose return type predates per-stream
    /// errors existing as their own type.
    fn from(e: StreamError) -> Error {
        match e {
            StreamError::Connection(err) => err,
            StreamError::Reset(reason) => Error::Protocol(reason),
            StreamError::Cancelled => Error::Cancelled,
            StreamError::Refused => Error::Protocol(Reason::RefusedStream),
        }
    }
}
