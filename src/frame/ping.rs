use bytes::{BufMut, Bytes, BytesMut};
use log::trace;

use super::head::{Head, Kind, StreamId};
use super::Error;

const ACK_FLAG: u8 = 0x1;

#[derive(Debug, Clone)]
pub struct Ping {
    ack: bool,
    payload: [u8; 8],
}

impl Ping {
    pub fn ping(payload: [u8; 8]) -> Ping {
        Ping { ack: false, payload }
    }

    pub fn pong(payload: [u8; 8]) -> Ping {
        Ping { ack: true, payload }
    }

    pub fn is_ack(&self) -> bool {
        self.ack
    }

    pub fn payload(&self) -> [u8; 8] {
        self.payload
    }

    /// Builds a `Ping` frame from a decoded frame header and payload.
    pub fn load(head: Head, payload: Bytes) -> Result<Ping, Error> {
        // PING frames are not associated with any individual stream. If a PING
        // frame is received with a stream identifier field value other than
        // 0x0, the recipient MUST respond with a connection error
        // (Section 5.4.1) of type PROTOCOL_ERROR.
        if !head.stream_id().is_zero() {
            return Err(Error::InvalidStreamId);
        }

        // In addition to the frame header, PING frames MUST contain 8 octets of opaque
        // data in the payload.
        if payload.len() != 8 {
            return Err(Error::BadFrameSize);
        }

        // The PING frame defines the following flags:
        //
        // ACK (0x1): When set, bit 0 indicates that this PING frame is a PING
        //    response. An endpoint MUST set this flag in PING responses. An
        //    endpoint MUST NOT respond to PING frames containing this flag.
        let ack = head.flag() & ACK_FLAG != 0;

        let mut buf = [0u8; 8];
        buf.copy_from_slice(&payload);

        Ok(Ping { ack, payload: buf })
    }

    pub fn encode(&self, dst: &mut BytesMut) {
        trace!("encoding PING; ack={} len=8", self.ack);

        let flags = if self.ack { ACK_FLAG } else { 0 };
        let head = Head::new(Kind::Ping, flags, StreamId::ZERO);

        head.encode(8, dst);
        dst.put_slice(&self.payload);
    }
}
