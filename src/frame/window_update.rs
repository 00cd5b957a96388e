use bytes::{Buf, BufMut, Bytes, BytesMut};

use super::head::{Head, Kind, StreamId};
use super::Error;

#[derive(Debug, Clone, Copy)]
pub struct WindowUpdate {
    stream_id: StreamId,
    increment: u32,
}

impl WindowUpdate {
    pub fn new(stream_id: StreamId, increment: u32) -> WindowUpdate {
        WindowUpdate { stream_id, increment }
    }

    pub fn stream_id(&self) -> StreamId {
        self.stream_id
    }

    pub fn size_increment(&self) -> u32 {
        self.increment
    }

    pub fn load(head: Head, payload: Bytes) -> Result<WindowUpdate, Error> {
        if payload.len() != 4 {
            return Err(Error::InvalidPayloadLength);
        }

        let mut buf = payload;
        // high bit is reserved
        let increment = buf.get_u32() & !(1 << 31);

        if increment == 0 {
            return Err(Error::InvalidPayloadLength);
        }

        Ok(WindowUpdate { stream_id: head.stream_id(), increment })
    }

    pub fn encode(&self, dst: &mut BytesMut) {
        let head = Head::new(Kind::WindowUpdate, 0, self.stream_id);
        head.encode(4, dst);
        dst.put_u32(self.increment);
    }
}
