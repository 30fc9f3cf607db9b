// Codec primitives and block headers

mod types;
mod block;
mod hash;
mod base58;
pub mod serialize;

pub use types::*;
pub use block::*;
pub use hash::*;
pub use base58::*;
pub use serialize::{
    Serializable, bit_field_to_bytes, bytes_to_bit_field, encode_varint, int_to_little_endian,
    little_endian_to_int, read_varint, write_varint,
};
