// merkleblock message: a header plus a partial merkle tree

use super::tree::{MAX_TRANSACTIONS, MerkleTree, build_proof};
use crate::core::serialize::{encode_varint, push_var_bytes, read_array, read_count, read_var_bytes};
use crate::core::{BlockHeader, Hash256, Serializable, bytes_to_bit_field};
use crate::error::{Result, WireError};
use crate::network::Payload;
use std::fmt;
use std::io::Read;

/// Flag bytes needed to describe every node of the largest possible tree
const MAX_FLAG_BYTES: usize = (2 * MAX_TRANSACTIONS as usize).div_ceil(8);

/// Filtered block as sent in reply to a getdata for a filtered block
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MerkleBlock {
    pub header: BlockHeader,
    /// Number of transactions in the full block
    pub total: u32,
    /// Depth-first hashes of the partial tree
    pub hashes: Vec<Hash256>,
    /// Depth-first traversal bits, LSB-first per byte
    pub flags: Vec<u8>,
}

impl MerkleBlock {
    pub fn new(header: BlockHeader, total: u32, hashes: Vec<Hash256>, flags: Vec<u8>) -> Self {
        Self {
            header,
            total,
            hashes,
            flags,
        }
    }

    /// Build the proof a full node would send for `txids`, revealing the
    /// transactions marked in `matches`
    pub fn from_transactions(header: BlockHeader, txids: &[Hash256], matches: &[bool]) -> Result<Self> {
        let (hashes, flags) = build_proof(txids, matches)?;
        Ok(Self::new(header, txids.len() as u32, hashes, flags))
    }

    /// Rebuild the partial tree and check it against the header's merkle root.
    ///
    /// Returns the matched transaction ids in block order.
    pub fn verify(&self) -> Result<Vec<Hash256>> {
        let mut tree = MerkleTree::new(self.total)?;
        let matches = tree.populate(&bytes_to_bit_field(&self.flags), &self.hashes)?;

        let computed = tree
            .root()
            .ok_or_else(|| WireError::malformed("root was not reconstructed"))?;
        if computed != self.header.merkle_root {
            log::debug!("merkle root mismatch for block {}", self.header.hash());
            return Err(WireError::ProofInvalid {
                computed,
                advertised: self.header.merkle_root,
            });
        }

        Ok(matches)
    }

    /// Whether the proof commits to the header's merkle root
    pub fn is_valid(&self) -> bool {
        self.verify().is_ok()
    }
}

impl Serializable for MerkleBlock {
    fn serialize(&self) -> Vec<u8> {
        let mut buf = Serializable::serialize(&self.header);
        buf.extend_from_slice(&self.total.to_le_bytes());
        buf.extend(encode_varint(self.hashes.len() as u64));
        for hash in &self.hashes {
            buf.extend_from_slice(hash.as_bytes());
        }
        push_var_bytes(&mut buf, &self.flags);
        buf
    }

    fn deserialize<R: Read + ?Sized>(reader: &mut R) -> Result<Self> {
        let header = BlockHeader::deserialize(reader)?;
        let total = u32::from_le_bytes(read_array(reader, "merkleblock total")?);

        let count = read_count(reader, "merkleblock hashes", MAX_TRANSACTIONS as usize)?;
        let mut hashes = Vec::with_capacity(count.min(1024));
        for _ in 0..count {
            hashes.push(Hash256::new(read_array(reader, "merkleblock hash")?));
        }

        let flags = read_var_bytes(reader, "merkleblock flags", MAX_FLAG_BYTES)?;

        Ok(Self {
            header,
            total,
            hashes,
            flags,
        })
    }
}

impl Payload for MerkleBlock {
    const COMMAND: &'static str = "merkleblock";
}

impl fmt::Display for MerkleBlock {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(f, "{}", self.header)?;
        writeln!(f, "total: {}", self.total)?;
        for hash in &self.hashes {
            writeln!(f, "  {}", hash)?;
        }
        write!(f, "flags: {}", hex::encode(&self.flags))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{hash256, merkle_root};

    const MERKLE_BLOCK: &str = "00000020df3b053dc46f162a9b00c7f0d5124e2676d47bbe7c5d0793a500000000000000ef445fef2ed495c275892206ca533e7411907971013ab83e3b47bd0d692d14d4dc7c835b67d8001ac157e670bf0d00000aba412a0d1480e370173072c9562becffe87aa661c1e4a6dbc305d38ec5dc088a7cf92e6458aca7b32edae818f9c2c98c37e06bf72ae0ce80649a38655ee1e27d34d9421d940b16732f24b94023e9d572a7f9ab8023434a4feb532d2adfc8c2c2158785d1bd04eb99df2e86c54bc13e139862897217400def5d72c280222c4cbaee7261831e1550dbb8fa82853e9fe506fc5fda3f7b919d8fe74b6282f92763cef8e625f977af7c8619c32a369b832bc2d051ecd9c73c51e76370ceabd4f25097c256597fa898d404ed53425de608ac6bfe426f6e2bb457f1c554866eb69dcb8d6bf6f880e9a59b3cd053e6c7060eeacaacf4dac6697dac20e4bd3f38a2ea2543d1ab7953e3430790a9f81e1c67f5b58c825acf46bd02848384eebe9af917274cdfbb1a28a5d58a23a17977def0de10d644258d9c54f886d47d293a411cb6226103b55635";

    fn sample() -> MerkleBlock {
        MerkleBlock::from_bytes(&hex::decode(MERKLE_BLOCK).unwrap()).unwrap()
    }

    fn synthetic_header(root: Hash256) -> BlockHeader {
        BlockHeader::new(0x20000000, Hash256::zero(), root, 1_600_000_000, 0x207fffff, 0)
    }

    #[test]
    fn test_parse() {
        let mb = sample();
        assert_eq!(mb.header.version, 0x20000000);
        assert_eq!(
            mb.header.prev_block_hash.to_hex(),
            "00000000000000a593075d7cbe7bd476264e12d5f0c7009b2a166fc43d053bdf"
        );
        assert_eq!(
            mb.header.merkle_root.to_hex(),
            "d4142d690dbd473b3eb83a0171799011743e53ca06228975c295d42eef5f44ef"
        );
        assert_eq!(mb.header.timestamp, 1535343836);
        assert_eq!(mb.header.bits, 0x1a00d867);
        assert_eq!(mb.total, 3519);
        assert_eq!(mb.hashes.len(), 10);
        assert_eq!(
            mb.hashes[0].to_hex(),
            "8a08dcc58ed305c3dba6e4c161a67ae8ffec2b56c972301770e380140d2a41ba"
        );
        assert_eq!(mb.flags, vec![0xb5, 0x56, 0x35]);
        assert_eq!(hex::encode(mb.serialize()), MERKLE_BLOCK);
    }

    #[test]
    fn test_verify() {
        let mb = sample();
        assert!(mb.header.check_pow());
        assert_eq!(
            mb.header.hash().to_hex(),
            "00000000000000cac712b726e4326e596170574c01a16001692510c44025eb30"
        );

        let matches = mb.verify().unwrap();
        assert_eq!(matches.len(), 1);
        assert_eq!(
            matches[0].to_hex(),
            "6122b61c413a297dd486f8549c8d2544d610def0de7779a1238ad5a5281abbdf"
        );
        assert!(mb.is_valid());
    }

    #[test]
    fn test_tampered_hash_is_invalid() {
        let mut mb = sample();
        mb.hashes[3].0[0] ^= 0x01;

        match mb.verify() {
            Err(WireError::ProofInvalid { advertised, computed }) => {
                assert_eq!(advertised, mb.header.merkle_root);
                assert_ne!(computed, advertised);
            }
            other => panic!("expected ProofInvalid, got {:?}", other),
        }
        assert!(!mb.is_valid());
    }

    #[test]
    fn test_truncated_hashes_are_malformed() {
        let mut mb = sample();
        mb.hashes.pop();
        assert!(matches!(mb.verify(), Err(WireError::ProofMalformed(_))));
    }

    #[test]
    fn test_extra_flag_byte_is_malformed() {
        let mut mb = sample();
        mb.flags.push(0x00);
        assert!(matches!(mb.verify(), Err(WireError::ProofMalformed(_))));
    }

    #[test]
    fn test_zero_total_is_malformed() {
        let mut mb = sample();
        mb.total = 0;
        assert!(matches!(mb.verify(), Err(WireError::ProofMalformed(_))));
    }

    #[test]
    fn test_synthetic_seven_transactions() {
        let txids: Vec<Hash256> = (0u8..7).map(|i| hash256(&[i, 0xaa])).collect();
        let root = merkle_root(&txids).unwrap();
        let matches = [false, false, true, false, false, false, true];

        let mb = MerkleBlock::from_transactions(synthetic_header(root), &txids, &matches).unwrap();
        assert_eq!(mb.total, 7);
        assert_eq!(mb.verify().unwrap(), vec![txids[2], txids[6]]);

        let parsed = MerkleBlock::from_bytes(&mb.serialize()).unwrap();
        assert_eq!(parsed, mb);

        let mut wrong_root = mb.clone();
        wrong_root.header.merkle_root = Hash256::new([0x11; 32]);
        assert!(matches!(wrong_root.verify(), Err(WireError::ProofInvalid { .. })));

        let mut tampered = mb.clone();
        tampered.hashes[0].0[0] ^= 0x01;
        assert!(matches!(tampered.verify(), Err(WireError::ProofInvalid { .. })));
        assert!(!tampered.is_valid());

        let mut truncated = mb.clone();
        truncated.hashes.pop();
        assert!(matches!(truncated.verify(), Err(WireError::ProofMalformed(_))));
        assert!(!truncated.is_valid());
    }

    #[test]
    fn test_single_transaction_block() {
        let txid = hash256(b"coinbase");
        let mb = MerkleBlock::from_transactions(synthetic_header(txid), &[txid], &[true]).unwrap();
        assert_eq!(mb.hashes, vec![txid]);
        assert_eq!(mb.flags, vec![0x01]);
        assert_eq!(mb.verify().unwrap(), vec![txid]);
    }

    #[test]
    fn test_no_match_sends_root_only() {
        let txids: Vec<Hash256> = (0u8..4).map(|i| hash256(&[i])).collect();
        let root = merkle_root(&txids).unwrap();
        let mb = MerkleBlock::from_transactions(synthetic_header(root), &txids, &[false; 4]).unwrap();

        assert_eq!(mb.hashes, vec![root]);
        assert_eq!(mb.flags, vec![0x00]);
        assert!(mb.verify().unwrap().is_empty());
    }

    #[test]
    fn test_truncated_payload() {
        let bytes = hex::decode(MERKLE_BLOCK).unwrap();
        let err = MerkleBlock::from_bytes(&bytes[..bytes.len() - 1]).unwrap_err();
        assert!(matches!(err, WireError::Length { .. }));
    }
}
