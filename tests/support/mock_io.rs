//! In-memory duplex byte pipe, generalized from the teacher's
//! `h2_test_support::mock_io` (a hand-rolled `tokio_io`-era duplex) onto
//! `tokio::io::duplex`, which already gives exactly the `AsyncRead +
//! AsyncWrite` pair a scripted fake-peer test needs.

use tokio::io::{AsyncReadExt, AsyncWriteExt, DuplexStream};

use h2io::frame::Head;

const CHANNEL_CAPACITY: usize = 128 * 1024;

/// `(client_socket, peer)` — `client_socket` is handed to `h2io::Client`;
/// `peer` is driven directly by the test to script frames in and read
/// frames out.
pub fn pair() -> (DuplexStream, Peer) {
    let (client_socket, peer_socket) = tokio::io::duplex(CHANNEL_CAPACITY);
    (client_socket, Peer { io: peer_socket })
}

pub struct Peer {
    io: DuplexStream,
}

impl Peer {
    pub async fn send(&mut self, bytes: &[u8]) {
        self.io.write_all(bytes).await.expect("peer write");
    }

    pub async fn recv(&mut self, len: usize) -> Vec<u8> {
        let mut buf = vec![0u8; len];
        self.io.read_exact(&mut buf).await.expect("peer read");
        buf
    }

    /// Reads and discards the fixed 24-byte client preface, the initial
    /// SETTINGS frame, and the WINDOW_UPDATE that follows it whenever the
    /// configured connection window exceeds the RFC 7540 default of 64 KiB
    /// (true of `Client::new`'s 32 MiB default, and every test here that
    /// doesn't override `Builder::local_window_size`).
    pub async fn recv_preface(&mut self) {
        let preface = self.recv(24).await;
        assert_eq!(&preface[..], b"PRI * HTTP/2.0\r\n\r\nSM\r\n\r\n");

        let (settings_head, _) = self.recv_frame().await;
        assert_eq!(settings_head.kind(), h2io::frame::Kind::Settings);

        let (window_update_head, _) = self.recv_frame().await;
        assert_eq!(window_update_head.kind(), h2io::frame::Kind::WindowUpdate);
    }

    /// Reads and discards a single SETTINGS ACK frame (the reply to the
    /// peer's own SETTINGS, if it sends one).
    pub async fn recv_settings_ack(&mut self) {
        let head = self.recv(9).await;
        assert_eq!(head[3], 4, "expected a SETTINGS frame");
        assert_eq!(head[4] & 0x1, 0x1, "expected the ACK flag set");
    }

    /// Reads one full frame (9-octet header plus payload) and hands back the
    /// parsed `Head` alongside the raw payload, for scripts that need to
    /// inspect kind/flags/stream id without decoding HPACK.
    pub async fn recv_frame(&mut self) -> (Head, Vec<u8>) {
        let header = self.recv(9).await;
        let (head, len) = Head::parse(&header);
        let payload = self.recv(len).await;
        (head, payload)
    }
}
