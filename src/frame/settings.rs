use bytes::{Buf, BufMut, Bytes, BytesMut};

use super::head::{Head, Kind, StreamId};
use super::Error;

pub const DEFAULT_SETTINGS_HEADER_TABLE_SIZE: usize = 4096;
pub const DEFAULT_MAX_FRAME_SIZE: usize = 16_384;

const ACK_FLAG: u8 = 0x1;

const HEADER_TABLE_SIZE: u16 = 0x1;
const ENABLE_PUSH: u16 = 0x2;
const MAX_CONCURRENT_STREAMS: u16 = 0x3;
const INITIAL_WINDOW_SIZE: u16 = 0x4;
const MAX_FRAME_SIZE: u16 = 0x5;
const MAX_HEADER_LIST_SIZE: u16 = 0x6;

#[derive(Debug, Default, Clone, Copy)]
pub struct Settings {
    ack: bool,
    header_table_size: Option<u32>,
    enable_push: Option<bool>,
    max_concurrent_streams: Option<u32>,
    initial_window_size: Option<u32>,
    max_frame_size: Option<u32>,
    max_header_list_size: Option<u32>,
}

impl Settings {
    pub fn ack() -> Settings {
        Settings { ack: true, ..Settings::default() }
    }

    pub fn is_ack(&self) -> bool {
        self.ack
    }

    pub fn header_table_size(&self) -> Option<u32> {
        self.header_table_size
    }

    pub fn set_header_table_size(&mut self, v: u32) {
        self.header_table_size = Some(v);
    }

    pub fn enable_push(&self) -> Option<bool> {
        self.enable_push
    }

    pub fn set_enable_push(&mut self, v: bool) {
        self.enable_push = Some(v);
    }

    pub fn initial_window_size(&self) -> Option<u32> {
        self.initial_window_size
    }

    pub fn set_initial_window_size(&mut self, v: u32) {
        self.initial_window_size = Some(v);
    }

    pub fn max_concurrent_streams(&self) -> Option<u32> {
        self.max_concurrent_streams
    }

    pub fn max_frame_size(&self) -> Option<u32> {
        self.max_frame_size
    }

    pub fn max_header_list_size(&self) -> Option<u32> {
        self.max_header_list_size
    }

    pub fn load(head: Head, payload: &Bytes) -> Result<Settings, Error> {
        if !head.stream_id().is_zero() {
            return Err(Error::InvalidStreamId);
        }

        let ack = head.flag() & ACK_FLAG != 0;

        if ack {
            if !payload.is_empty() {
                return Err(Error::InvalidPayloadAckSettings);
            }
            return Ok(Settings::ack());
        }

        if payload.len() % 6 != 0 {
            return Err(Error::PartialSettingLength);
        }

        let mut settings = Settings::default();
        let mut buf = payload.clone();

        while buf.has_remaining() {
            let id = buf.get_u16();
            let value = buf.get_u32();

            match id {
                HEADER_TABLE_SIZE => settings.header_table_size = Some(value),
                ENABLE_PUSH => settings.enable_push = Some(value != 0),
                MAX_CONCURRENT_STREAMS => settings.max_concurrent_streams = Some(value),
                INITIAL_WINDOW_SIZE => settings.initial_window_size = Some(value),
                MAX_FRAME_SIZE => settings.max_frame_size = Some(value),
                MAX_HEADER_LIST_SIZE => settings.max_header_list_size = Some(value),
                _ => {} // unknown settings are ignored per RFC 7540 §6.5.2
            }
        }

        Ok(settings)
    }

    pub fn encode(&self, dst: &mut BytesMut) {
        let flags = if self.ack { ACK_FLAG } else { 0 };
        let head = Head::new(Kind::Settings, flags, StreamId::ZERO);

        let mut len = 0;
        macro_rules! count {
            ($opt:expr) => {
                if $opt.is_some() {
                    len += 6;
                }
            };
        }
        count!(self.header_table_size);
        count!(self.enable_push);
        count!(self.max_concurrent_streams);
        count!(self.initial_window_size);
        count!(self.max_frame_size);
        count!(self.max_header_list_size);

        head.encode(len, dst);

        macro_rules! write {
            ($id:expr, $opt:expr) => {
                if let Some(v) = $opt {
                    dst.put_u16($id);
                    dst.put_u32(v);
                }
            };
        }
        write!(HEADER_TABLE_SIZE, self.header_table_size);
        write!(ENABLE_PUSH, self.enable_push.map(|b| b as u32));
        write!(MAX_CONCURRENT_STREAMS, self.max_concurrent_streams);
        write!(INITIAL_WINDOW_SIZE, self.initial_window_size);
        write!(MAX_FRAME_SIZE, self.max_frame_size);
        write!(MAX_HEADER_LIST_SIZE, self.max_header_list_size);
    }
}
