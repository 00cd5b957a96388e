//! Frame-builder helpers for scripting a fake HTTP/2 peer, generalized from
//! the teacher's `h2_test_support::frames` onto this crate's own `frame` and
//! `hpack` types directly (there's no separate proto-test crate here).

use bytes::BytesMut;
use http::StatusCode;

use h2io::frame::{Data, GoAway, Headers, Priority, Pseudo, Reason, Reset, Settings, StreamDependency, StreamId};
use h2io::hpack;

fn encode_headers(stream_id: u32, status: StatusCode, end_stream: bool) -> Vec<u8> {
    let mut headers = Headers::new(StreamId::new(stream_id), Pseudo::response(status), Default::default());
    if end_stream {
        headers.set_end_stream();
    }

    let mut dst = BytesMut::new();
    let mut encoder = hpack::Encoder::new(4096);
    assert!(headers.encode(&mut encoder, &mut dst).is_none(), "test response headers must fit in one frame");
    dst.to_vec()
}

/// A HEADERS frame carrying only `:status`, ending the stream (a bodyless
/// response).
pub fn headers_end_stream(stream_id: u32, status: StatusCode) -> Vec<u8> {
    encode_headers(stream_id, status, true)
}

/// A HEADERS frame carrying only `:status`, with more frames (DATA or
/// trailers) to follow.
pub fn headers(stream_id: u32, status: StatusCode) -> Vec<u8> {
    encode_headers(stream_id, status, false)
}

/// A 100-continue interim response (RFC 7540 / RFC 7231 §6.2.1): a HEADERS
/// frame with `:status: 100` that never carries `END_STREAM`.
pub fn headers_100_continue(stream_id: u32) -> Vec<u8> {
    encode_headers(stream_id, StatusCode::CONTINUE, false)
}

pub fn data(stream_id: u32, payload: &[u8], end_stream: bool) -> Vec<u8> {
    let frame = Data::new(StreamId::new(stream_id), bytes::Bytes::copy_from_slice(payload), end_stream);
    let mut dst = BytesMut::new();
    frame.encode(&mut dst);
    dst.to_vec()
}

pub fn rst_stream(stream_id: u32, reason: Reason) -> Vec<u8> {
    let frame = Reset::new(StreamId::new(stream_id), reason);
    let mut dst = BytesMut::new();
    frame.encode(&mut dst);
    dst.to_vec()
}

pub fn goaway(last_stream_id: u32, reason: Reason) -> Vec<u8> {
    let frame = GoAway::new(StreamId::new(last_stream_id), reason);
    let mut dst = BytesMut::new();
    frame.encode(&mut dst);
    dst.to_vec()
}

pub fn settings() -> Vec<u8> {
    let frame = Settings::default();
    let mut dst = BytesMut::new();
    frame.encode(&mut dst);
    dst.to_vec()
}

pub fn settings_ack() -> Vec<u8> {
    let frame = Settings::ack();
    let mut dst = BytesMut::new();
    frame.encode(&mut dst);
    dst.to_vec()
}

pub fn priority_frame(stream_id: u32, weight: u8) -> Vec<u8> {
    let dep = StreamDependency { stream_id: StreamId::ZERO, weight, is_exclusive: false };
    let frame = Priority::new(StreamId::new(stream_id), dep);
    let mut dst = BytesMut::new();
    frame.encode(&mut dst);
    dst.to_vec()
}
