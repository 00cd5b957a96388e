use bytes::BytesMut;

use super::dynamic_table::DynamicTable;
use super::header::Header;
use super::primitive::{encode_int, encode_string};
use super::static_table;

/// RFC 7541 §6 representation type tags (OR'd with the prefix byte).
const INDEXED: u8 = 0x80;
const LITERAL_INC_INDEX: u8 = 0x40;

/// Result of a single `encode` call: headers may not all fit in the
/// caller-provided buffer in one shot (the frame layer splits across
/// CONTINUATION frames), so encoding is resumable.
pub enum Encode {
    Full,
    Partial,
}

pub struct Encoder {
    table: DynamicTable,
}

impl Encoder {
    pub fn new(max_size: usize) -> Self {
        Encoder {
            table: DynamicTable::new(max_size),
        }
    }

    pub fn update_max_size(&mut self, max_size: usize) {
        self.table.set_max_size(max_size);
    }

    /// Encodes as many of `headers` as fit, consuming them from the front.
    /// Returns `Encode::Partial` if `headers` still has elements left,
    /// mirroring the teacher's `Iterator`-draining `encode` signature.
    pub fn encode<I: Iterator<Item = Header>>(&mut self, headers: &mut std::iter::Peekable<I>, dst: &mut BytesMut) -> Encode {
        while let Some(header) = headers.peek() {
            let name = header.name_str().to_string();
            let value = header.value_str().into_owned();

            if let Some((index, full)) = self.table.find(&name, &value) {
                self.encode_dynamic_indexed(index, full, &name, &value, dst);
            } else if let Some((index, full)) = static_table::find(&name, &value) {
                self.encode_static_indexed(index, full, &value, dst);
            } else {
                self.encode_literal(&name, &value, dst);
            }

            headers.next();
        }

        Encode::Full
    }

    fn encode_static_indexed(&mut self, index: usize, full_match: bool, value: &str, dst: &mut BytesMut) {
        if full_match {
            encode_int(index, 7, INDEXED, dst);
        } else {
            encode_int(index, 6, LITERAL_INC_INDEX, dst);
            encode_string(value.as_bytes(), dst);
            let name = static_table::get(index).map(|(n, _)| n).unwrap_or("");
            self.table.insert(name, value);
        }
    }

    fn encode_dynamic_indexed(&mut self, index: usize, full_match: bool, name: &str, value: &str, dst: &mut BytesMut) {
        // Dynamic table indices sit after the 61 static entries.
        let wire_index = static_table::STATIC_TABLE.len() + index + 1;
        if full_match {
            encode_int(wire_index, 7, INDEXED, dst);
        } else {
            encode_int(wire_index, 6, LITERAL_INC_INDEX, dst);
            encode_string(value.as_bytes(), dst);
            self.table.insert(name, value);
        }
    }

    fn encode_literal(&mut self, name: &str, value: &str, dst: &mut BytesMut) {
        encode_int(0, 6, LITERAL_INC_INDEX, dst);
        encode_string(name.as_bytes(), dst);
        encode_string(value.as_bytes(), dst);
        self.table.insert(name, value);
    }

    /// Encodes a literal that must never be indexed (§7.1.3 sensitive
    /// headers, e.g. `authorization`). Not reachable from `encode` above;
    /// exposed for callers that know a field is sensitive.
    pub fn encode_never_indexed(&mut self, name: &str, value: &str, dst: &mut BytesMut) {
        const NEVER_INDEXED: u8 = 0x10;
        encode_int(0, 4, NEVER_INDEXED, dst);
        encode_string(name.as_bytes(), dst);
        encode_string(value.as_bytes(), dst);
    }
}
