//! Three concurrent requests where the peer resets one mid-flight
//! (`spec.md` §8 scenario 3): streams 1 and 5 complete normally, stream 3's
//! terminal error is the peer's reset reason, and the connection stays
//! reusable throughout.

mod support;

use http::{Request, StatusCode};
use tokio::io::AsyncReadExt;

use h2io::client::Client;
use h2io::frame::{Kind, Reason};

use support::frames;
use support::mock_io;

#[tokio::test]
async fn one_rst_stream_among_three_concurrent_gets() {
    let _ = env_logger::try_init();

    let (socket, mut peer) = mock_io::pair();
    let mut client = Client::new(socket);

    let get = |path: &str| Request::builder().method("GET").uri(format!("https://example.org/{path}")).body(()).unwrap();

    let h1 = client.send_request(get("one")).unwrap();
    let h3 = client.send_request(get("three")).unwrap();
    let h5 = client.send_request(get("five")).unwrap();

    let client_fut = async {
        client.run_until_read(h1).await.unwrap();
        client.run_until_read(h5).await.unwrap();

        let mut body1 = Vec::new();
        client.get_response_istream(h1).unwrap().read_to_end(&mut body1).await.unwrap();
        assert_eq!(body1, b"one");

        let mut body5 = Vec::new();
        client.get_response_istream(h5).unwrap().read_to_end(&mut body5).await.unwrap();
        assert_eq!(body5, b"five");

        // Stream 3 never reaches READ_DATA; its terminal error surfaces
        // through the shared state directly instead.
        let err = loop {
            if let Some(body3) = client.get_response_istream(h3) {
                if let Some(e) = body3.error() {
                    break e;
                }
            }
            client.run_until_read(h1).await.ok();
            if client.response_head(h3).is_none() && !client.in_progress(h3) {
                break h2io::StreamError::Connection(h2io::Error::Protocol(Reason::InternalError));
            }
        };
        assert!(matches!(err, h2io::StreamError::Reset(Reason::InternalError)));

        assert!(client.is_reusable());
    };

    let peer_fut = async {
        peer.recv_preface().await;

        // HEADERS for streams 1, 3, 5, in submission order.
        for _ in 0..3 {
            let (head, _) = peer.recv_frame().await;
            assert_eq!(head.kind(), Kind::Headers);
        }

        peer.send(&frames::headers(1, StatusCode::OK)).await;
        peer.send(&frames::data(1, b"one", true)).await;

        peer.send(&frames::rst_stream(3, Reason::InternalError)).await;

        peer.send(&frames::headers(5, StatusCode::OK)).await;
        peer.send(&frames::data(5, b"five", true)).await;
    };

    tokio::join!(client_fut, peer_fut);
}
