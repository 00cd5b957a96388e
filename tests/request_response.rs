//! End-to-end request/response scenarios driven over an in-memory duplex
//! socket, generalized from the teacher's `tests/flow_control.rs` style
//! (mock peer scripted by hand, client driven to completion) onto this
//! crate's own `Client` façade.

mod support;

use bytes::Bytes;
use http::{Request, StatusCode};
use tokio::io::AsyncReadExt;

use h2io::client::{Builder, Client};
use h2io::frame::{Kind, Reason, Reset};
use h2io::message::Priority;

use support::frames;
use support::mock_io;

#[tokio::test]
async fn get_200_with_small_body() {
    let _ = env_logger::try_init();

    let (socket, mut peer) = mock_io::pair();
    let mut client = Client::new(socket);

    let request = Request::builder().method("GET").uri("https://example.org/x").body(()).unwrap();
    let handle = client.send_request(request).unwrap();

    let client_fut = async {
        client.run_until_read(handle).await.unwrap();

        let mut body = client.get_response_istream(handle).unwrap();
        let mut buf = Vec::new();
        body.read_to_end(&mut buf).await.unwrap();
        assert_eq!(buf, b"hello");

        let head = client.response_head(handle).unwrap();
        assert_eq!(head.status, Some(StatusCode::OK));

        let metrics = client.metrics(handle).unwrap();
        assert!(metrics.response_header_bytes_received > 0);
        assert!(metrics.response_body_bytes_received > 0);
        assert!(metrics.response_start.is_some());

        client.finished(handle);
    };

    let peer_fut = async {
        peer.recv_preface().await;

        let (head, _) = peer.recv_frame().await;
        assert_eq!(head.kind(), Kind::Headers);
        assert!(head.flag() & 0x1 != 0, "bodyless GET must carry END_STREAM on HEADERS");

        peer.send(&frames::headers(1, StatusCode::OK)).await;
        peer.send(&frames::data(1, b"hello", true)).await;

        let (head, payload) = peer.recv_frame().await;
        assert_eq!(head.kind(), Kind::Reset);
        let reset = Reset::load(head, Bytes::from(payload)).unwrap();
        assert_eq!(reset.reason(), Reason::NoError);
    };

    tokio::join!(client_fut, peer_fut);
}

#[tokio::test]
async fn no_content_response_reads_as_empty_stream() {
    let _ = env_logger::try_init();

    let (socket, mut peer) = mock_io::pair();
    let mut client = Client::new(socket);

    let request = Request::builder().method("GET").uri("https://example.org/x").body(()).unwrap();
    let handle = client.send_request(request).unwrap();

    let client_fut = async {
        client.run_until_read(handle).await.unwrap();

        let mut body = client.get_response_istream(handle).unwrap();
        assert!(body.is_end_stream());

        let mut buf = Vec::new();
        body.read_to_end(&mut buf).await.unwrap();
        assert!(buf.is_empty());
    };

    let peer_fut = async {
        peer.recv_preface().await;
        let _ = peer.recv_frame().await;
        peer.send(&frames::headers_end_stream(1, StatusCode::NO_CONTENT)).await;
    };

    tokio::join!(client_fut, peer_fut);
}

#[tokio::test]
async fn priority_change_emits_exactly_one_priority_frame() {
    let _ = env_logger::try_init();

    let (socket, mut peer) = mock_io::pair();
    let mut builder = Builder::new();
    let mut client = builder.handshake(socket);

    let request = Request::builder().method("GET").uri("https://example.org/x").body(()).unwrap();
    let handle = client.send_request(request).unwrap();

    // The stream id is allocated synchronously at submit time, so the
    // priority change doesn't need to wait for the HEADERS frame to flush.
    client.set_priority(handle, Priority::High);
    // Same priority again: must be a no-op, not a second PRIORITY frame.
    client.set_priority(handle, Priority::High);

    let client_fut = async {
        client.run_until_read(handle).await.unwrap();
    };

    let peer_fut = async {
        peer.recv_preface().await;

        let (head, _) = peer.recv_frame().await;
        assert_eq!(head.kind(), Kind::Headers);

        let (head, _) = peer.recv_frame().await;
        assert_eq!(head.kind(), Kind::Priority);

        peer.send(&frames::headers_end_stream(1, StatusCode::OK)).await;
    };

    tokio::join!(client_fut, peer_fut);
}
