//! RFC 7541 §5: integer and string literal primitives.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use super::huffman;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NeedMore;

/// Encodes `value` as an N-bit-prefix integer (§5.1), OR-ing the low bits of
/// the prefix byte with `prefix_bits` (the high bits already set by the
/// caller for e.g. indexed-field / literal-with-incremental-indexing type
/// tags).
pub fn encode_int<B: BufMut>(value: usize, prefix_len: u8, prefix_bits: u8, dst: &mut B) {
    let max_prefix = (1usize << prefix_len) - 1;

    if value < max_prefix {
        dst.put_u8(prefix_bits | value as u8);
        return;
    }

    dst.put_u8(prefix_bits | max_prefix as u8);
    let mut rem = value - max_prefix;

    while rem >= 128 {
        dst.put_u8(((rem % 128) | 128) as u8);
        rem /= 128;
    }
    dst.put_u8(rem as u8);
}

/// Decodes an N-bit-prefix integer. `first` is the already-consumed prefix
/// byte; returns the decoded value and whether the prefix bits were all set
/// (i.e. more bytes followed).
pub fn decode_int(first: u8, prefix_len: u8, src: &mut Bytes) -> Result<usize, NeedMore> {
    let max_prefix = (1usize << prefix_len) - 1;
    let prefix_val = (first as usize) & max_prefix;

    if prefix_val < max_prefix {
        return Ok(prefix_val);
    }

    let mut value = max_prefix;
    let mut m = 0u32;

    loop {
        if !src.has_remaining() {
            return Err(NeedMore);
        }
        let byte = src.get_u8();
        value += ((byte & 0x7f) as usize) << m;
        m += 7;

        if byte & 0x80 == 0 {
            break;
        }
        if m > 32 {
            // Defends against absurdly long continuations; RFC integers
            // this crate deals with (table sizes, string lengths) never
            // approach this.
            return Err(NeedMore);
        }
    }

    Ok(value)
}

/// Encodes a string literal (§5.2): a 1-bit Huffman flag + 7-bit-prefixed
/// length, followed by the (optionally Huffman-coded) octets. Always prefers
/// Huffman coding when it's smaller, matching the common HPACK encoder
/// convention.
pub fn encode_string(value: &[u8], dst: &mut BytesMut) {
    let huff_len = huffman::encoded_len(value);

    if huff_len < value.len() {
        encode_int(huff_len, 7, 0x80, dst);
        let mut coded = Vec::with_capacity(huff_len);
        huffman::encode(value, &mut coded);
        dst.extend_from_slice(&coded);
    } else {
        encode_int(value.len(), 7, 0x00, dst);
        dst.extend_from_slice(value);
    }
}

/// Decodes a string literal, returning the raw (decoded) bytes.
pub fn decode_string(src: &mut Bytes) -> Result<Bytes, NeedMore> {
    if !src.has_remaining() {
        return Err(NeedMore);
    }
    let first = src.get_u8();
    let huff = first & 0x80 != 0;
    let len = decode_int(first, 7, src)?;

    if src.remaining() < len {
        return Err(NeedMore);
    }
    let raw = src.copy_to_bytes(len);

    if huff {
        huffman::decode(&raw)
            .map(Bytes::from)
            .map_err(|_| NeedMore)
    } else {
        Ok(raw)
    }
}
