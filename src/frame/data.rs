use bytes::{Buf, BufMut, Bytes, BytesMut};

use super::head::{Head, Kind, StreamId};
use super::Error;

const END_STREAM: u8 = 0x1;
const PADDED: u8 = 0x8;

#[derive(Debug)]
pub struct Data {
    stream_id: StreamId,
    data: Bytes,
    end_stream: bool,
}

impl Data {
    pub fn new(stream_id: StreamId, data: Bytes, end_stream: bool) -> Data {
        Data { stream_id, data, end_stream }
    }

    pub fn stream_id(&self) -> StreamId {
        self.stream_id
    }

    pub fn is_end_stream(&self) -> bool {
        self.end_stream
    }

    pub fn payload(&self) -> &Bytes {
        &self.data
    }

    pub fn into_payload(self) -> Bytes {
        self.data
    }

    pub fn load(head: Head, mut payload: Bytes) -> Result<Data, Error> {
        if head.stream_id().is_zero() {
            return Err(Error::InvalidStreamId);
        }

        if head.flag() & PADDED != 0 {
            if payload.is_empty() {
                return Err(Error::TooMuchPadding);
            }
            let pad_len = payload.get_u8() as usize;
            if pad_len > payload.len() {
                return Err(Error::TooMuchPadding);
            }
            payload.truncate(payload.len() - pad_len);
        }

        Ok(Data {
            stream_id: head.stream_id(),
            data: payload,
            end_stream: head.flag() & END_STREAM != 0,
        })
    }

    pub fn encode(&self, dst: &mut BytesMut) {
        let flags = if self.end_stream { END_STREAM } else { 0 };
        let head = Head::new(Kind::Data, flags, self.stream_id);
        head.encode(self.data.len(), dst);
        dst.put_slice(&self.data);
    }
}
