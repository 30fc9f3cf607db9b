// Header sync messages: getheaders and headers

use super::control::PROTOCOL_VERSION;
use super::message::Payload;
use crate::core::serialize::{encode_varint, read_array, read_count, read_i32_le};
use crate::core::{BlockHeader, Hash256, Serializable, read_varint};
use crate::error::{Result, WireError};
use std::io::Read;

/// Most headers a peer sends in one reply
pub const MAX_HEADERS: usize = 2000;

/// Most hashes in a block locator
pub const MAX_LOCATOR_HASHES: usize = 101;

/// `getheaders` request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GetHeadersMessage {
    pub version: i32,
    /// Known block hashes, newest first
    pub locator: Vec<Hash256>,
    /// Stop hash; zero asks for as many headers as the peer will send
    pub end_block: Hash256,
}

impl GetHeadersMessage {
    /// Request headers following `start_block`
    pub fn new(start_block: Hash256) -> Self {
        Self {
            version: PROTOCOL_VERSION,
            locator: vec![start_block],
            end_block: Hash256::zero(),
        }
    }

    pub fn with_end_block(mut self, end_block: Hash256) -> Self {
        self.end_block = end_block;
        self
    }
}

impl Serializable for GetHeadersMessage {
    fn serialize(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(4 + 1 + 32 * (self.locator.len() + 1));
        buf.extend_from_slice(&self.version.to_le_bytes());
        buf.extend(encode_varint(self.locator.len() as u64));
        for hash in &self.locator {
            buf.extend_from_slice(hash.as_bytes());
        }
        buf.extend_from_slice(self.end_block.as_bytes());
        buf
    }

    fn deserialize<R: Read + ?Sized>(reader: &mut R) -> Result<Self> {
        let version = read_i32_le(reader, "getheaders version")?;
        let count = read_count(reader, "getheaders locator", MAX_LOCATOR_HASHES)?;
        let locator = (0..count)
            .map(|_| Ok(Hash256::new(read_array(reader, "getheaders locator hash")?)))
            .collect::<Result<Vec<_>>>()?;
        let end_block = Hash256::new(read_array(reader, "getheaders end block")?);

        Ok(Self {
            version,
            locator,
            end_block,
        })
    }
}

impl Payload for GetHeadersMessage {
    const COMMAND: &'static str = "getheaders";
}

/// `headers` reply
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct HeadersMessage {
    pub headers: Vec<BlockHeader>,
}

impl HeadersMessage {
    pub fn new(headers: Vec<BlockHeader>) -> Self {
        Self { headers }
    }

    /// Check that every header meets its own target and that the headers
    /// form a chain starting right after `previous`
    pub fn check_chain(&self, previous: Hash256) -> Result<()> {
        let mut expected_prev = previous;
        for (i, header) in self.headers.iter().enumerate() {
            if header.prev_block_hash != expected_prev {
                return Err(WireError::invalid(
                    "headers chain",
                    format!(
                        "header {} builds on {}, expected {}",
                        i, header.prev_block_hash, expected_prev
                    ),
                ));
            }
            let hash = header.hash();
            if !header.check_pow() {
                return Err(WireError::invalid(
                    "headers proof of work",
                    format!("header {} ({}) does not meet bits {:#010x}", i, hash, header.bits),
                ));
            }
            expected_prev = hash;
        }
        Ok(())
    }
}

impl Serializable for HeadersMessage {
    fn serialize(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(3 + 81 * self.headers.len());
        buf.extend(encode_varint(self.headers.len() as u64));
        for header in &self.headers {
            buf.extend(Serializable::serialize(header));
            buf.push(0);
        }
        buf
    }

    fn deserialize<R: Read + ?Sized>(reader: &mut R) -> Result<Self> {
        let count = read_count(reader, "headers count", MAX_HEADERS)?;
        let mut headers = Vec::with_capacity(count);
        for i in 0..count {
            headers.push(BlockHeader::deserialize(reader)?);
            let tx_count = read_varint(reader)?;
            if tx_count != 0 {
                return Err(WireError::UnexpectedData {
                    context: "headers",
                    detail: format!("header {} carries {} transactions", i, tx_count),
                });
            }
        }
        Ok(Self { headers })
    }
}

impl Payload for HeadersMessage {
    const COMMAND: &'static str = "headers";
}
