// Hashing utilities for Bitcoin

use crate::core::Hash256;
use crate::error::{Result, WireError};
use sha2::{Digest, Sha256};

/// SHA256 double hash (Bitcoin convention)
/// hash256 = SHA256(SHA256(data))
pub fn hash256(data: &[u8]) -> Hash256 {
    let first_hash = Sha256::digest(data);
    let second_hash = Sha256::digest(first_hash);
    let mut result = [0u8; 32];
    result.copy_from_slice(&second_hash);
    Hash256::new(result)
}

/// Single SHA256 hash
pub fn sha256_hash(data: &[u8]) -> [u8; 32] {
    let hash = Sha256::digest(data);
    let mut result = [0u8; 32];
    result.copy_from_slice(&hash);
    result
}

/// RIPEMD160(SHA256(data)) - used for address payloads
pub fn hash160(data: &[u8]) -> [u8; 20] {
    use ripemd::{Digest as RipemdDigest, Ripemd160};
    let sha = Sha256::digest(data);
    let ripemd = Ripemd160::digest(sha);
    let mut result = [0u8; 20];
    result.copy_from_slice(&ripemd);
    result
}

/// First four bytes of hash256, used by envelopes and base58check
pub fn checksum(data: &[u8]) -> [u8; 4] {
    let hash = hash256(data);
    let mut result = [0u8; 4];
    result.copy_from_slice(&hash.as_bytes()[..4]);
    result
}

/// Parent node of two merkle children: hash256(left || right)
pub fn merkle_parent(left: &Hash256, right: &Hash256) -> Hash256 {
    let mut combined = [0u8; 64];
    combined[..32].copy_from_slice(left.as_bytes());
    combined[32..].copy_from_slice(right.as_bytes());
    hash256(&combined)
}

/// Hash one merkle level into the level above it.
/// An odd last node is paired with itself.
pub fn merkle_parent_level(hashes: &[Hash256]) -> Result<Vec<Hash256>> {
    if hashes.len() < 2 {
        return Err(WireError::invalid(
            "merkle level",
            format!("cannot take a parent level of {} hashes", hashes.len()),
        ));
    }

    Ok(hashes
        .chunks(2)
        .map(|pair| match pair {
            [left, right] => merkle_parent(left, right),
            [single] => merkle_parent(single, single),
            _ => unreachable!("chunks(2) yields one or two items"),
        })
        .collect())
}

/// Merkle root of a full list of leaf hashes
pub fn merkle_root(hashes: &[Hash256]) -> Result<Hash256> {
    let mut level = match hashes {
        [] => return Err(WireError::invalid("merkle leaves", "no hashes supplied")),
        [only] => return Ok(*only),
        _ => merkle_parent_level(hashes)?,
    };

    while level.len() > 1 {
        level = merkle_parent_level(&level)?;
    }

    Ok(level[0])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn display(s: &str) -> Hash256 {
        Hash256::from_hex(s).unwrap()
    }

    #[test]
    fn test_hash256_known_value() {
        // Checksum of an empty payload, as seen in every verack frame
        assert_eq!(checksum(b""), [0x5d, 0xf6, 0xe0, 0xe2]);
    }

    #[test]
    fn test_hash256_deterministic() {
        let hash = hash256(b"hello world");
        assert_eq!(hash, hash256(b"hello world"));
        assert_ne!(hash, hash256(b"hello world!"));
    }

    #[test]
    fn test_hash160() {
        // hash160 of the empty string
        assert_eq!(
            hex::encode(hash160(b"")),
            "b472a266d0bd89c13706a4132ccfb16f7c3b9fcb"
        );
    }

    #[test]
    fn test_merkle_parent_level_odd() {
        let leaves = [Hash256::new([1; 32]), Hash256::new([2; 32]), Hash256::new([3; 32])];
        let level = merkle_parent_level(&leaves).unwrap();

        assert_eq!(level.len(), 2);
        assert_eq!(level[0], merkle_parent(&leaves[0], &leaves[1]));
        assert_eq!(level[1], merkle_parent(&leaves[2], &leaves[2]));
    }

    #[test]
    fn test_merkle_parent_level_needs_two() {
        assert!(merkle_parent_level(&[Hash256::zero()]).is_err());
    }

    #[test]
    fn test_merkle_root_single_leaf() {
        let leaf = Hash256::new([7; 32]);
        assert_eq!(merkle_root(&[leaf]).unwrap(), leaf);
        assert!(merkle_root(&[]).is_err());
    }

    #[test]
    fn test_merkle_root_block_100000() {
        // Transactions of mainnet block 100000
        let leaves = [
            display("8c14f0db3df150123e6f3dbbf30f8b955a8249b62ac1d1ff16284aefa3d06d87"),
            display("fff2525b8931402dd09222c50775608f75787bd2b87e56995a7bdd30f79702c4"),
            display("6359f0868171b1d194cbee1af2f16ea598ae8fad666d9b012c8ed2b79a236ec4"),
            display("e9a66845e05d5abc0ad04ec80f774a7e585c6e8db975962d069a522137b80c1d"),
        ];
        let root = merkle_root(&leaves).unwrap();
        assert_eq!(
            root.to_hex(),
            "f3e94742aca4b5ef85488dc37c06c3282295ffec960994b2c0d5ac2a25a95766"
        );
    }
}
