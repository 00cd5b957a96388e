use bytes::{Buf, BufMut, Bytes, BytesMut};

use super::head::{Head, Kind, StreamId};
use super::Error;

#[derive(Debug, Clone, Copy)]
pub struct StreamDependency {
    pub stream_id: StreamId,
    pub weight: u8,
    pub is_exclusive: bool,
}

impl StreamDependency {
    pub fn load(src: &[u8]) -> StreamDependency {
        let id = u32::from_be_bytes([src[0], src[1], src[2], src[3]]);
        let is_exclusive = id & (1 << 31) != 0;
        StreamDependency {
            stream_id: StreamId::new(id),
            weight: src[4],
            is_exclusive,
        }
    }

    pub fn encode<B: BufMut>(&self, dst: &mut B) {
        let mut id: u32 = self.stream_id.into();
        if self.is_exclusive {
            id |= 1 << 31;
        }
        dst.put_u32(id);
        dst.put_u8(self.weight);
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Priority {
    stream_id: StreamId,
    dependency: StreamDependency,
}

impl Priority {
    pub fn new(stream_id: StreamId, dependency: StreamDependency) -> Priority {
        Priority { stream_id, dependency }
    }

    pub fn dependency(&self) -> StreamDependency {
        self.dependency
    }

    pub fn load(head: Head, payload: Bytes) -> Result<Priority, Error> {
        if head.stream_id().is_zero() {
            return Err(Error::InvalidStreamId);
        }
        if payload.len() != 5 {
            return Err(Error::InvalidPayloadLength);
        }

        Ok(Priority {
            stream_id: head.stream_id(),
            dependency: StreamDependency::load(&payload),
        })
    }

    pub fn encode(&self, dst: &mut BytesMut) {
        let head = Head::new(Kind::Priority, 0, self.stream_id);
        head.encode(5, dst);
        self.dependency.encode(dst);
    }
}
