//! A condensed, in-crate RFC 7541 (HPACK) implementation.
//!
//! In the original implementation this spec is modeled on, HPACK is part of
//! an external codec library; here it's implemented directly, in the same
//! spirit the teacher's own frame codec is implemented in-tree.

mod decoder;
mod dynamic_table;
mod encoder;
mod header;
mod huffman;
mod primitive;
mod static_table;

pub use decoder::{Decoder, DecoderError};
pub use encoder::{Encode, Encoder};
pub use header::Header;

pub const DEFAULT_HEADER_TABLE_SIZE: usize = 4096;
