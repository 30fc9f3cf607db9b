// Message framing: magic | command | length | checksum | payload

use super::Network;
use crate::core::checksum;
use crate::core::serialize::{read_array, read_bytes};
use crate::error::{Result, WireError};
use std::fmt;
use std::io::Read;

/// Bytes before the payload
pub const ENVELOPE_HEADER_SIZE: usize = 24;

/// Largest payload a peer may announce
pub const MAX_PAYLOAD_SIZE: usize = 4_000_000;

const COMMAND_SIZE: usize = 12;

/// A framed P2P message with its payload still encoded
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkEnvelope {
    magic: [u8; 4],
    command: String,
    payload: Vec<u8>,
}

/// Decoded 24-byte frame header, waiting for its payload
#[derive(Debug)]
pub(crate) struct FrameHeader {
    magic: [u8; 4],
    command: String,
    length: usize,
    checksum: [u8; 4],
}

fn check_command(command: &str) -> Result<()> {
    if command.is_empty() || command.len() > COMMAND_SIZE {
        return Err(WireError::invalid(
            "envelope command",
            format!("'{}' must be 1 to {} bytes", command, COMMAND_SIZE),
        ));
    }
    if !command.bytes().all(|b| b.is_ascii_graphic()) {
        return Err(WireError::invalid(
            "envelope command",
            format!("{:?} is not printable ASCII", command),
        ));
    }
    Ok(())
}

/// Reject a frame from another network before reading the rest of it
pub(crate) fn check_magic(magic: [u8; 4], network: Network) -> Result<()> {
    if magic != network.magic() {
        return Err(WireError::ProtocolMismatch {
            expected: hex::encode(network.magic()),
            got: hex::encode(magic),
        });
    }
    Ok(())
}

impl FrameHeader {
    pub(crate) fn parse(bytes: &[u8; ENVELOPE_HEADER_SIZE], network: Network) -> Result<Self> {
        let mut magic = [0u8; 4];
        magic.copy_from_slice(&bytes[..4]);
        check_magic(magic, network)?;

        let raw_command = &bytes[4..16];
        let end = raw_command
            .iter()
            .rposition(|&b| b != 0)
            .map_or(0, |last| last + 1);
        let command = String::from_utf8(raw_command[..end].to_vec())
            .map_err(|_| WireError::invalid("envelope command", hex::encode(raw_command)))?;
        check_command(&command)?;

        let length = u32::from_le_bytes([bytes[16], bytes[17], bytes[18], bytes[19]]) as usize;
        if length > MAX_PAYLOAD_SIZE {
            return Err(WireError::PayloadTooLarge {
                length,
                max: MAX_PAYLOAD_SIZE,
            });
        }

        let mut checksum = [0u8; 4];
        checksum.copy_from_slice(&bytes[20..24]);

        Ok(Self {
            magic,
            command,
            length,
            checksum,
        })
    }

    pub(crate) fn payload_len(&self) -> usize {
        self.length
    }

    /// Attach the payload, checking it against the header's checksum
    pub(crate) fn into_envelope(self, payload: Vec<u8>) -> Result<NetworkEnvelope> {
        let computed = checksum(&payload);
        if computed != self.checksum {
            return Err(WireError::Checksum {
                context: "envelope payload",
                expected: hex::encode(self.checksum),
                got: hex::encode(computed),
            });
        }

        Ok(NetworkEnvelope {
            magic: self.magic,
            command: self.command,
            payload,
        })
    }
}

impl NetworkEnvelope {
    pub fn new(command: &str, payload: Vec<u8>, network: Network) -> Result<Self> {
        check_command(command)?;
        if payload.len() > MAX_PAYLOAD_SIZE {
            return Err(WireError::PayloadTooLarge {
                length: payload.len(),
                max: MAX_PAYLOAD_SIZE,
            });
        }

        Ok(Self {
            magic: network.magic(),
            command: command.to_string(),
            payload,
        })
    }

    /// Read one envelope from `reader`.
    ///
    /// A stream that ends before any magic byte is a closed connection,
    /// not a malformed frame.
    pub fn parse<R: Read + ?Sized>(reader: &mut R, network: Network) -> Result<Self> {
        let magic: [u8; 4] = match read_array(reader, "envelope magic") {
            Err(WireError::Length { actual: 0, .. }) => return Err(WireError::ConnectionClosed),
            other => other?,
        };
        check_magic(magic, network)?;
        let rest = read_bytes(reader, ENVELOPE_HEADER_SIZE - 4, "envelope header")?;

        let mut header = [0u8; ENVELOPE_HEADER_SIZE];
        header[..4].copy_from_slice(&magic);
        header[4..].copy_from_slice(&rest);

        let frame = FrameHeader::parse(&header, network)?;
        let payload = read_bytes(reader, frame.payload_len(), "envelope payload")?;
        frame.into_envelope(payload)
    }

    pub fn magic(&self) -> [u8; 4] {
        self.magic
    }

    pub fn command(&self) -> &str {
        &self.command
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Frame bytes. Fields are only set through `new` or `parse`, so the
    /// command fits its 12 bytes and the length fits a u32.
    pub fn serialize(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(ENVELOPE_HEADER_SIZE + self.payload.len());
        buf.extend_from_slice(&self.magic);

        let mut command = [0u8; COMMAND_SIZE];
        command[..self.command.len()].copy_from_slice(self.command.as_bytes());
        buf.extend_from_slice(&command);

        buf.extend_from_slice(&(self.payload.len() as u32).to_le_bytes());
        buf.extend_from_slice(&checksum(&self.payload));
        buf.extend_from_slice(&self.payload);
        buf
    }

    /// Network the magic belongs to
    pub fn network(&self) -> Option<Network> {
        Network::from_magic(self.magic)
    }
}

impl fmt::Display for NetworkEnvelope {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}: {}", self.command, hex::encode(&self.payload))
    }
}
