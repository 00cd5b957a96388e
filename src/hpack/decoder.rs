use bytes::{Buf, Bytes};
use http::{HeaderName, HeaderValue, Method, StatusCode};
use thiserror::Error;

use super::dynamic_table::DynamicTable;
use super::header::Header;
use super::primitive::{decode_int, decode_string};
use super::static_table;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DecoderError {
    #[error("HPACK block ended mid-representation")]
    NeedMore,
    #[error("header field index {0} out of range")]
    InvalidIndex(usize),
    #[error("invalid Huffman encoding")]
    InvalidHuffman,
    #[error("header field is not valid utf-8")]
    InvalidUtf8,
    #[error("invalid {0} pseudo-header value")]
    InvalidPseudoHeader(&'static str),
    #[error("pseudo-header repeated in the same header block")]
    RepeatedPseudo,
    #[error("pseudo-header field appeared after a regular field")]
    PseudoAfterRegular,
    #[error("dynamic table size update exceeded the SETTINGS-advertised maximum")]
    TableSizeTooLarge,
}

pub struct Decoder {
    table: DynamicTable,
}

impl Decoder {
    pub fn new(max_size: usize) -> Self {
        Decoder {
            table: DynamicTable::new(max_size),
        }
    }

    pub fn queue_size_update(&mut self, max_size: usize) {
        self.table.set_max_size(max_size);
    }

    /// Decodes a full header block, invoking `f` for each field in wire
    /// order. `src` must contain the entire (possibly reassembled across
    /// CONTINUATION frames) block.
    pub fn decode<F: FnMut(Header)>(&mut self, src: &mut Bytes, mut f: F) -> Result<(), DecoderError> {
        let mut seen_regular = false;

        while src.has_remaining() {
            let first = src[0];

            if first & 0x80 != 0 {
                // Indexed Header Field (§6.1)
                src.advance(1);
                let index = decode_int(first, 7, src).map_err(|_| DecoderError::NeedMore)?;
                let (name, value) = self.lookup(index)?;
                if name.starts_with(':') && seen_regular {
                    return Err(DecoderError::PseudoAfterRegular);
                }
                seen_regular |= !name.starts_with(':');
                f(self.to_header(&name, &value)?);
            } else if first & 0x40 != 0 {
                // Literal with Incremental Indexing (§6.2.1)
                src.advance(1);
                let index = decode_int(first, 6, src).map_err(|_| DecoderError::NeedMore)?;
                let (name, value) = self.literal_name_value(index, src)?;
                if name.starts_with(':') && seen_regular {
                    return Err(DecoderError::PseudoAfterRegular);
                }
                seen_regular |= !name.starts_with(':');
                self.table.insert(&name, &value);
                f(self.to_header(&name, &value)?);
            } else if first & 0x20 != 0 {
                // Dynamic Table Size Update (§6.3)
                src.advance(1);
                let max = decode_int(first, 5, src).map_err(|_| DecoderError::NeedMore)?;
                self.table.set_max_size(max);
            } else {
                // Literal Without / Never Indexed (§6.2.2 / §6.2.3); both use
                // a 4-bit prefix and neither inserts into the dynamic table.
                src.advance(1);
                let index = decode_int(first, 4, src).map_err(|_| DecoderError::NeedMore)?;
                let (name, value) = self.literal_name_value(index, src)?;
                if name.starts_with(':') && seen_regular {
                    return Err(DecoderError::PseudoAfterRegular);
                }
                seen_regular |= !name.starts_with(':');
                f(self.to_header(&name, &value)?);
            }
        }

        Ok(())
    }

    fn literal_name_value(&mut self, index: usize, src: &mut Bytes) -> Result<(String, String), DecoderError> {
        let name = if index == 0 {
            let raw = decode_string(src).map_err(|_| DecoderError::NeedMore)?;
            String::from_utf8(raw.to_vec()).map_err(|_| DecoderError::InvalidUtf8)?
        } else {
            self.lookup(index)?.0
        };
        let raw_value = decode_string(src).map_err(|_| DecoderError::NeedMore)?;
        let value = String::from_utf8(raw_value.to_vec()).map_err(|_| DecoderError::InvalidUtf8)?;
        Ok((name, value))
    }

    fn lookup(&self, index: usize) -> Result<(String, String), DecoderError> {
        let static_len = static_table::STATIC_TABLE.len();
        if index == 0 {
            return Err(DecoderError::InvalidIndex(index));
        }
        if index <= static_len {
            let (n, v) = static_table::get(index).ok_or(DecoderError::InvalidIndex(index))?;
            return Ok((n.to_string(), v.to_string()));
        }
        let dyn_index = index - static_len - 1;
        self.table
            .get(dyn_index)
            .map(|(n, v)| (n.to_string(), v.to_string()))
            .ok_or(DecoderError::InvalidIndex(index))
    }

    fn to_header(&self, name: &str, value: &str) -> Result<Header, DecoderError> {
        Ok(match name {
            ":authority" => Header::Authority(value.to_string()),
            ":method" => Header::Method(
                Method::from_bytes(value.as_bytes()).map_err(|_| DecoderError::InvalidPseudoHeader("method"))?,
            ),
            ":scheme" => Header::Scheme(value.to_string()),
            ":path" => Header::Path(value.to_string()),
            ":status" => Header::Status(
                value
                    .parse::<u16>()
                    .ok()
                    .and_then(|c| StatusCode::from_u16(c).ok())
                    .ok_or(DecoderError::InvalidPseudoHeader("status"))?,
            ),
            _ if name.starts_with(':') => return Err(DecoderError::InvalidPseudoHeader("unknown")),
            _ => Header::Field {
                name: HeaderName::from_bytes(name.as_bytes()).ok(),
                value: HeaderValue::from_str(value).map_err(|_| DecoderError::InvalidUtf8)?,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hpack::encoder::Encoder;
    use bytes::BytesMut;

    #[test]
    fn round_trips_request_headers() {
        let mut enc = Encoder::new(4096);
        let mut dec = Decoder::new(4096);

        let headers = vec![
            Header::Method(Method::GET),
            Header::Scheme("https".into()),
            Header::Authority("example.com".into()),
            Header::Path("/".into()),
            Header::Field {
                name: Some(HeaderName::from_static("user-agent")),
                value: HeaderValue::from_static("h2io-test"),
            },
        ];

        let mut buf = BytesMut::new();
        let mut iter = headers.into_iter().peekable();
        enc.encode(&mut iter, &mut buf);

        let mut seen = Vec::new();
        let mut bytes = buf.freeze();
        dec.decode(&mut bytes, |h| seen.push(h.name_str().to_string())).unwrap();

        assert_eq!(seen, vec![":method", ":scheme", ":authority", ":path", "user-agent"]);
    }

    #[test]
    fn repeat_sends_use_dynamic_table_index() {
        let mut enc = Encoder::new(4096);
        let mut dec = Decoder::new(4096);

        for _ in 0..2 {
            let headers = vec![Header::Authority("example.com".into())];
            let mut buf = BytesMut::new();
            let mut iter = headers.into_iter().peekable();
            enc.encode(&mut iter, &mut buf);

            let mut bytes = buf.freeze();
            let mut seen = Vec::new();
            dec.decode(&mut bytes, |h| seen.push(h.value_str().into_owned())).unwrap();
            assert_eq!(seen, vec!["example.com".to_string()]);
        }
    }
}
