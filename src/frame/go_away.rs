use bytes::{Buf, BufMut, Bytes, BytesMut};

use super::head::{Head, Kind, StreamId};
use super::{Error, Reason};

#[derive(Debug, Clone)]
pub struct GoAway {
    last_stream_id: StreamId,
    error_code: Reason,
    debug_data: Bytes,
}

impl GoAway {
    pub fn new(last_stream_id: StreamId, error_code: Reason) -> GoAway {
        GoAway { last_stream_id, error_code, debug_data: Bytes::new() }
    }

    pub fn last_stream_id(&self) -> StreamId {
        self.last_stream_id
    }

    pub fn reason(&self) -> Reason {
        self.error_code
    }

    pub fn debug_data(&self) -> &Bytes {
        &self.debug_data
    }

    pub fn load(head: Head, mut payload: Bytes) -> Result<GoAway, Error> {
        if !head.stream_id().is_zero() {
            return Err(Error::InvalidStreamId);
        }
        if payload.len() < 8 {
            return Err(Error::PayloadLengthTooShort);
        }

        let last_stream_id = StreamId::new(payload.get_u32());
        let error_code = Reason::from(payload.get_u32());
        let debug_data = payload;

        Ok(GoAway { last_stream_id, error_code, debug_data })
    }

    pub fn encode(&self, dst: &mut BytesMut) {
        let head = Head::new(Kind::GoAway, 0, StreamId::ZERO);
        head.encode(8 + self.debug_data.len(), dst);
        dst.put_u32(self.last_stream_id.into());
        dst.put_u32(self.error_code.into());
        dst.put_slice(&self.debug_data);
    }
}
