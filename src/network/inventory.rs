// getdata: request objects by inventory vector

use super::message::Payload;
use crate::core::serialize::{encode_varint, read_array, read_count, read_u32_le};
use crate::core::{Hash256, Serializable};
use crate::error::Result;
use std::io::Read;

/// Most inventory entries in one message
pub const MAX_INV_ENTRIES: usize = 50_000;

/// Kind of object an inventory entry refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InvType {
    Tx,
    Block,
    /// Block delivered as a merkleblock filtered by the loaded bloom filter
    FilteredBlock,
    CompactBlock,
    /// Type code this crate has no name for, kept as received
    Unknown(u32),
}

impl InvType {
    pub fn as_u32(self) -> u32 {
        match self {
            InvType::Tx => 1,
            InvType::Block => 2,
            InvType::FilteredBlock => 3,
            InvType::CompactBlock => 4,
            InvType::Unknown(code) => code,
        }
    }

    pub fn from_u32(code: u32) -> Self {
        match code {
            1 => InvType::Tx,
            2 => InvType::Block,
            3 => InvType::FilteredBlock,
            4 => InvType::CompactBlock,
            other => InvType::Unknown(other),
        }
    }
}

/// `getdata` request
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct GetDataMessage {
    pub items: Vec<(InvType, Hash256)>,
}

impl GetDataMessage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, inv_type: InvType, hash: Hash256) {
        self.items.push((inv_type, hash));
    }
}

impl Serializable for GetDataMessage {
    fn serialize(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(3 + 36 * self.items.len());
        buf.extend(encode_varint(self.items.len() as u64));
        for (inv_type, hash) in &self.items {
            buf.extend_from_slice(&inv_type.as_u32().to_le_bytes());
            buf.extend_from_slice(hash.as_bytes());
        }
        buf
    }

    fn deserialize<R: Read + ?Sized>(reader: &mut R) -> Result<Self> {
        let count = read_count(reader, "getdata count", MAX_INV_ENTRIES)?;
        let mut items = Vec::with_capacity(count.min(1024));
        for _ in 0..count {
            let inv_type = InvType::from_u32(read_u32_le(reader, "getdata type")?);
            let hash = Hash256::new(read_array(reader, "getdata hash")?);
            items.push((inv_type, hash));
        }
        Ok(Self { items })
    }
}

impl Payload for GetDataMessage {
    const COMMAND: &'static str = "getdata";
}
