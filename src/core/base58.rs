// Base58Check encoding

use crate::core::checksum;
use crate::error::{Result, WireError};

/// Encode `payload` followed by its 4-byte hash256 checksum in base58
pub fn base58_check_encode(payload: &[u8]) -> String {
    let mut data = Vec::with_capacity(payload.len() + 4);
    data.extend_from_slice(payload);
    data.extend_from_slice(&checksum(payload));
    bs58::encode(data).into_string()
}

/// Decode a base58check string and return the payload without its checksum.
///
/// The output is sized from the decoded data, so any payload length works.
pub fn base58_check_decode(encoded: &str) -> Result<Vec<u8>> {
    let mut data = bs58::decode(encoded)
        .into_vec()
        .map_err(|e| WireError::invalid("base58 string", e.to_string()))?;

    if data.len() < 4 {
        return Err(WireError::Length {
            field: "base58check data",
            expected: 4,
            actual: data.len(),
        });
    }

    let received = data.split_off(data.len() - 4);
    let expected = checksum(&data);
    if received != expected {
        return Err(WireError::Checksum {
            context: "base58check",
            expected: hex::encode(expected),
            got: hex::encode(received),
        });
    }

    Ok(data)
}
