//! Client-side HTTP/2 multiplexed transport, driven by an externally owned
//! event loop (`spec.md` §1). This crate owns the wire protocol — frame
//! codec, HPACK, per-stream state machine, request body pump, and the
//! message-level dispatch table a calling HTTP client would sit on top of —
//! and nothing else: no connection pool, no TLS/ALPN, no HTTP/1.x fallback,
//! no redirect or cookie handling. Those live in the enclosing session this
//! crate is meant to be embedded in.
//!
//! A connection is built from an already-connected, already-negotiated
//! socket (`tokio::io::{AsyncRead, AsyncWrite}`) via [`client::Client`] or
//! [`client::Builder`], driven by polling [`client::Client::poll_io`] from a
//! caller-owned task, and used to submit requests ([`message::Message`])
//! whose responses arrive through [`client::Client::get_response_istream`].

pub mod client;
pub mod codec;
pub mod error;
pub mod frame;
pub mod hpack;
pub mod message;
pub mod proto;

pub use client::{Builder, Client, ResponseBody, StreamHandle};
pub use error::{Error, StreamError, UserError};
pub use message::{Message, Metrics, Priority, ResponseHead, Sniffer};
