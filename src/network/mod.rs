// P2P wire protocol: envelopes, messages and a peer session

mod envelope;
mod message;
mod control;
mod headers;
mod inventory;
mod peer;

pub use envelope::{ENVELOPE_HEADER_SIZE, MAX_PAYLOAD_SIZE, NetworkEnvelope};
pub use message::{GenericMessage, Message, Payload};
pub use control::{
    DEFAULT_USER_AGENT, MAX_USER_AGENT_LENGTH, PROTOCOL_VERSION, PingMessage, PongMessage,
    VerAckMessage, VersionMessage,
};
pub use headers::{GetHeadersMessage, HeadersMessage, MAX_HEADERS, MAX_LOCATOR_HASHES};
pub use inventory::{GetDataMessage, InvType, MAX_INV_ENTRIES};
pub use peer::Peer;

use crate::core::BlockHeader;
use crate::error::{Result, WireError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Which chain a session talks to. Selects the envelope magic and default port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    #[default]
    Mainnet,
    Testnet,
}

impl Network {
    /// Magic bytes that open every envelope on this network
    pub fn magic(self) -> [u8; 4] {
        match self {
            Network::Mainnet => [0xf9, 0xbe, 0xb4, 0xd9],
            Network::Testnet => [0x0b, 0x11, 0x09, 0x07],
        }
    }

    pub fn default_port(self) -> u16 {
        match self {
            Network::Mainnet => 8333,
            Network::Testnet => 18333,
        }
    }

    pub fn genesis(self) -> BlockHeader {
        match self {
            Network::Mainnet => BlockHeader::mainnet_genesis(),
            Network::Testnet => BlockHeader::testnet_genesis(),
        }
    }

    /// Network whose magic is `magic`, if any
    pub fn from_magic(magic: [u8; 4]) -> Option<Self> {
        [Network::Mainnet, Network::Testnet]
            .into_iter()
            .find(|network| network.magic() == magic)
    }
}

impl FromStr for Network {
    type Err = WireError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "mainnet" | "main" => Ok(Network::Mainnet),
            "testnet" | "test" | "testnet3" => Ok(Network::Testnet),
            other => Err(WireError::invalid("network", format!("unknown network '{}'", other))),
        }
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Network::Mainnet => write!(f, "mainnet"),
            Network::Testnet => write!(f, "testnet"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_magic_and_ports() {
        assert_eq!(hex::encode(Network::Mainnet.magic()), "f9beb4d9");
        assert_eq!(hex::encode(Network::Testnet.magic()), "0b110907");
        assert_eq!(Network::Mainnet.default_port(), 8333);
        assert_eq!(Network::Testnet.default_port(), 18333);
        assert_eq!(Network::from_magic([0x0b, 0x11, 0x09, 0x07]), Some(Network::Testnet));
        assert_eq!(Network::from_magic([0; 4]), None);
    }

    #[test]
    fn test_parse_network() {
        assert_eq!("mainnet".parse::<Network>().unwrap(), Network::Mainnet);
        assert_eq!("Testnet".parse::<Network>().unwrap(), Network::Testnet);
        assert!("regtest".parse::<Network>().is_err());
        assert_eq!(Network::Testnet.to_string(), "testnet");
    }

    #[test]
    fn test_genesis_per_network() {
        assert_eq!(
            Network::Testnet.genesis().hash().to_hex(),
            "000000000933ea01ad0ee984209779baaec3ced90fa3f408719526f8d77f4943"
        );
    }
}
