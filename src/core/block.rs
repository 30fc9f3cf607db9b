// Block header

use crate::consensus::Target;
use crate::core::serialize::{read_array, read_i32_le, read_u32_le};
use crate::core::{Hash256, Serializable, hash256};
use crate::error::Result;
use std::fmt;
use std::io::Read;

/// Serialized size of a block header
pub const BLOCK_HEADER_SIZE: usize = 80;

/// Merkle root shared by the mainnet and testnet genesis blocks
const GENESIS_MERKLE_ROOT: [u8; 32] = [
    0x3b, 0xa3, 0xed, 0xfd, 0x7a, 0x7b, 0x12, 0xb2, 0x7a, 0xc7, 0x2c, 0x3e, 0x67, 0x76, 0x8f, 0x61,
    0x7f, 0xc8, 0x1b, 0xc3, 0x88, 0x8a, 0x51, 0x32, 0x3a, 0x9f, 0xb8, 0xaa, 0x4b, 0x1e, 0x5e, 0x4a,
];

/// Block header - 80 bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockHeader {
    /// Block version, also carries soft-fork signaling bits
    pub version: i32,
    /// Hash of the previous block
    pub prev_block_hash: Hash256,
    /// Merkle root of all transactions in the block
    pub merkle_root: Hash256,
    /// Block timestamp (Unix epoch)
    pub timestamp: u32,
    /// Difficulty target (compact format)
    pub bits: u32,
    /// Nonce for proof-of-work
    pub nonce: u32,
}

impl BlockHeader {
    /// Create a new block header
    pub fn new(
        version: i32,
        prev_block_hash: Hash256,
        merkle_root: Hash256,
        timestamp: u32,
        bits: u32,
        nonce: u32,
    ) -> Self {
        Self {
            version,
            prev_block_hash,
            merkle_root,
            timestamp,
            bits,
            nonce,
        }
    }

    /// Mainnet genesis header (block 0)
    pub fn mainnet_genesis() -> Self {
        Self::new(
            1,
            Hash256::zero(),
            Hash256::new(GENESIS_MERKLE_ROOT),
            1231006505,
            0x1d00ffff,
            2083236893,
        )
    }

    /// Testnet3 genesis header
    pub fn testnet_genesis() -> Self {
        Self::new(
            1,
            Hash256::zero(),
            Hash256::new(GENESIS_MERKLE_ROOT),
            1296688602,
            0x1d00ffff,
            414098458,
        )
    }

    /// Calculate the hash of this block header
    pub fn hash(&self) -> Hash256 {
        hash256(&Serializable::serialize(self))
    }

    /// Proof-of-work target encoded by `bits`
    pub fn target(&self) -> Target {
        Target::from_bits(self.bits)
    }

    /// Difficulty relative to the lowest (genesis-era) difficulty
    pub fn difficulty(&self) -> f64 {
        self.target().difficulty()
    }

    /// Whether the header hash, read as a little-endian number, is below the target
    pub fn check_pow(&self) -> bool {
        self.target().is_met_by(&self.hash())
    }

    /// BIP9: top three version bits are 001
    pub fn signals_bip9(&self) -> bool {
        (self.version as u32) >> 29 == 0b001
    }

    /// BIP91 (segwit2x activation) uses bit 4
    pub fn signals_bip91(&self) -> bool {
        ((self.version as u32) >> 4) & 1 == 1
    }

    /// BIP141 (segwit) uses bit 1
    pub fn signals_bip141(&self) -> bool {
        ((self.version as u32) >> 1) & 1 == 1
    }
}

impl Serializable for BlockHeader {
    /// Serialize the block header (always 80 bytes)
    fn serialize(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(BLOCK_HEADER_SIZE);
        buf.extend_from_slice(&self.version.to_le_bytes());
        buf.extend_from_slice(self.prev_block_hash.as_bytes());
        buf.extend_from_slice(self.merkle_root.as_bytes());
        buf.extend_from_slice(&self.timestamp.to_le_bytes());
        buf.extend_from_slice(&self.bits.to_le_bytes());
        buf.extend_from_slice(&self.nonce.to_le_bytes());
        buf
    }

    fn deserialize<R: Read + ?Sized>(reader: &mut R) -> Result<Self> {
        let version = read_i32_le(reader, "header version")?;
        let prev_block_hash = Hash256::new(read_array(reader, "header prev_block_hash")?);
        let merkle_root = Hash256::new(read_array(reader, "header merkle_root")?);
        let timestamp = read_u32_le(reader, "header timestamp")?;
        let bits = read_u32_le(reader, "header bits")?;
        let nonce = read_u32_le(reader, "header nonce")?;

        Ok(Self {
            version,
            prev_block_hash,
            merkle_root,
            timestamp,
            bits,
            nonce,
        })
    }
}

impl fmt::Display for BlockHeader {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "block {} (version {:#010x}, prev {}, merkle {}, time {}, bits {:#010x}, nonce {})",
            self.hash(),
            self.version,
            self.prev_block_hash,
            self.merkle_root,
            self.timestamp,
            self.bits,
            self.nonce
        )
    }
}
