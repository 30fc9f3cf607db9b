// BIP37 transaction filtering

mod murmur;
mod bloom;

pub use murmur::murmur3;
pub use bloom::{
    BIP37_CONSTANT, BloomFilter, BloomFlag, FilterLoadMessage, MAX_BLOOM_FILTER_SIZE, MAX_HASH_FUNCS,
};
