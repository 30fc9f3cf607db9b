// BIP37 bloom filter and the filterload message

use super::murmur::murmur3;
use crate::core::serialize::{push_var_bytes, read_array, read_u32_le, read_var_bytes};
use crate::core::{Serializable, bit_field_to_bytes, bytes_to_bit_field};
use crate::error::{Result, WireError};
use crate::network::Payload;
use serde::{Deserialize, Serialize};
use std::io::Read;

/// Seed multiplier for the i-th hash function
pub const BIP37_CONSTANT: u32 = 0xfba4c795;

/// Largest filter a peer will accept, in bytes
pub const MAX_BLOOM_FILTER_SIZE: u32 = 36_000;

/// Most hash functions a peer will accept
pub const MAX_HASH_FUNCS: u32 = 50;

/// How the peer should update the filter when it matches an output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BloomFlag {
    /// Never update
    None,
    /// Add the outpoint of every matched output
    #[default]
    All,
    /// Add outpoints only for pay-to-pubkey and multisig outputs
    PubKeyOnly,
}

impl BloomFlag {
    pub fn as_u8(self) -> u8 {
        match self {
            BloomFlag::None => 0,
            BloomFlag::All => 1,
            BloomFlag::PubKeyOnly => 2,
        }
    }

    pub fn from_u8(value: u8) -> Result<Self> {
        match value {
            0 => Ok(BloomFlag::None),
            1 => Ok(BloomFlag::All),
            2 => Ok(BloomFlag::PubKeyOnly),
            other => Err(WireError::invalid("bloom flag", format!("unknown flag {}", other))),
        }
    }
}

/// Probabilistic set of items a light client is interested in.
///
/// Bits are only ever set, so the filter grows noisier as items are added.
/// Mutation needs `&mut self`; share a finished filter by reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BloomFilter {
    size: u32,
    bit_field: Vec<bool>,
    function_count: u32,
    tweak: u32,
}

impl BloomFilter {
    /// Create an empty filter of `size` bytes
    pub fn new(size: u32, function_count: u32, tweak: u32) -> Result<Self> {
        if size == 0 || size > MAX_BLOOM_FILTER_SIZE {
            return Err(WireError::invalid(
                "bloom filter size",
                format!("{} not in 1..={}", size, MAX_BLOOM_FILTER_SIZE),
            ));
        }
        if function_count > MAX_HASH_FUNCS {
            return Err(WireError::invalid(
                "bloom function count",
                format!("{} exceeds {}", function_count, MAX_HASH_FUNCS),
            ));
        }

        Ok(Self {
            size,
            bit_field: vec![false; size as usize * 8],
            function_count,
            tweak,
        })
    }

    pub fn size(&self) -> u32 {
        self.size
    }

    pub fn function_count(&self) -> u32 {
        self.function_count
    }

    pub fn tweak(&self) -> u32 {
        self.tweak
    }

    /// Bit positions selected for `item`, one per hash function
    fn bit_positions<'a>(&'a self, item: &'a [u8]) -> impl Iterator<Item = usize> + 'a {
        let bit_count = self.bit_field.len() as u32;
        (0..self.function_count).map(move |i| {
            let seed = i.wrapping_mul(BIP37_CONSTANT).wrapping_add(self.tweak);
            (murmur3(item, seed) % bit_count) as usize
        })
    }

    /// Insert an item
    pub fn add(&mut self, item: &[u8]) {
        let positions: Vec<usize> = self.bit_positions(item).collect();
        for bit in positions {
            self.bit_field[bit] = true;
        }
    }

    /// Whether `item` may have been added. False positives are possible,
    /// false negatives are not.
    pub fn contains(&self, item: &[u8]) -> bool {
        self.bit_positions(item).all(|bit| self.bit_field[bit])
    }

    /// Filter bits packed into bytes
    pub fn filter_bytes(&self) -> Vec<u8> {
        bit_field_to_bytes(&self.bit_field).expect("bit field length is always size * 8")
    }

    /// Build the filterload message announcing this filter
    pub fn filter_load(&self, flag: BloomFlag) -> FilterLoadMessage {
        FilterLoadMessage {
            filter: self.filter_bytes(),
            function_count: self.function_count,
            tweak: self.tweak,
            flag,
        }
    }
}

/// `filterload` payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterLoadMessage {
    pub filter: Vec<u8>,
    pub function_count: u32,
    pub tweak: u32,
    pub flag: BloomFlag,
}

impl FilterLoadMessage {
    /// Rebuild the filter a peer announced
    pub fn to_filter(&self) -> Result<BloomFilter> {
        let mut filter = BloomFilter::new(self.filter.len() as u32, self.function_count, self.tweak)?;
        filter.bit_field = bytes_to_bit_field(&self.filter);
        Ok(filter)
    }
}

impl Serializable for FilterLoadMessage {
    fn serialize(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(self.filter.len() + 12);
        push_var_bytes(&mut buf, &self.filter);
        buf.extend_from_slice(&self.function_count.to_le_bytes());
        buf.extend_from_slice(&self.tweak.to_le_bytes());
        buf.push(self.flag.as_u8());
        buf
    }

    fn deserialize<R: Read + ?Sized>(reader: &mut R) -> Result<Self> {
        let filter = read_var_bytes(reader, "filterload filter", MAX_BLOOM_FILTER_SIZE as usize)?;
        let function_count = read_u32_le(reader, "filterload function count")?;
        let tweak = read_u32_le(reader, "filterload tweak")?;
        let [flag] = read_array::<1, _>(reader, "filterload flag")?;

        Ok(Self {
            filter,
            function_count,
            tweak,
            flag: BloomFlag::from_u8(flag)?,
        })
    }
}

impl Payload for FilterLoadMessage {
    const COMMAND: &'static str = "filterload";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add() {
        let mut bf = BloomFilter::new(10, 5, 99).unwrap();

        bf.add(b"Hello World");
        assert_eq!(hex::encode(bf.filter_bytes()), "0000000a080000000140");

        bf.add(b"Goodbye!");
        assert_eq!(hex::encode(bf.filter_bytes()), "4000600a080000010940");
    }

    #[test]
    fn test_filter_load() {
        let mut bf = BloomFilter::new(10, 5, 99).unwrap();
        bf.add(b"Hello World");
        bf.add(b"Goodbye!");

        let message = bf.filter_load(BloomFlag::All);
        assert_eq!(
            hex::encode(message.serialize()),
            "0a4000600a080000010940050000006300000001"
        );
        assert_eq!(FilterLoadMessage::from_bytes(&message.serialize()).unwrap(), message);
    }

    #[test]
    fn test_add_is_idempotent() {
        let mut once = BloomFilter::new(10, 5, 99).unwrap();
        once.add(b"Hello World");

        let mut twice = once.clone();
        twice.add(b"Hello World");
        assert_eq!(once, twice);
    }

    #[test]
    fn test_contains() {
        let mut bf = BloomFilter::new(10, 5, 99).unwrap();
        bf.add(b"Hello World");

        assert!(bf.contains(b"Hello World"));
        assert!(!bf.contains(b"Goodbye!"));
    }

    #[test]
    fn test_zero_functions_sets_nothing() {
        let mut bf = BloomFilter::new(4, 0, 7).unwrap();
        bf.add(b"anything");
        assert_eq!(bf.filter_bytes(), vec![0u8; 4]);

        let payload = bf.filter_load(BloomFlag::None).serialize();
        assert_eq!(hex::encode(payload), "0400000000000000000700000000");
    }

    #[test]
    fn test_limits() {
        assert!(BloomFilter::new(0, 5, 0).is_err());
        assert!(BloomFilter::new(MAX_BLOOM_FILTER_SIZE + 1, 5, 0).is_err());
        assert!(BloomFilter::new(MAX_BLOOM_FILTER_SIZE, MAX_HASH_FUNCS, 0).is_ok());
        assert!(BloomFilter::new(10, MAX_HASH_FUNCS + 1, 0).is_err());
    }

    #[test]
    fn test_filter_load_rejects_unknown_flag() {
        let mut payload = BloomFilter::new(1, 1, 0).unwrap().filter_load(BloomFlag::None).serialize();
        *payload.last_mut().unwrap() = 9;
        assert!(FilterLoadMessage::from_bytes(&payload).is_err());
    }

    #[test]
    fn test_to_filter_matches_original() {
        let mut bf = BloomFilter::new(10, 5, 99).unwrap();
        bf.add(b"Hello World");

        let rebuilt = bf.filter_load(BloomFlag::All).to_filter().unwrap();
        assert_eq!(rebuilt, bf);
        assert!(rebuilt.contains(b"Hello World"));
    }
}
