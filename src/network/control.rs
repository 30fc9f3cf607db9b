// Session control messages: version, verack, ping, pong

use super::message::Payload;
use crate::core::Serializable;
use crate::core::serialize::{
    push_var_bytes, read_array, read_i32_le, read_i64_le, read_u64_le, read_var_string,
};
use crate::error::Result;
use std::io::Read;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

/// Protocol version announced in version and getheaders messages
pub const PROTOCOL_VERSION: i32 = 70015;

pub const DEFAULT_USER_AGENT: &str = "/programmingbitcoin:0.1/";

/// Longest user agent accepted from a peer
pub const MAX_USER_AGENT_LENGTH: usize = 256;

/// `version` payload, the first message each side sends
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionMessage {
    pub version: i32,
    pub services: u64,
    pub timestamp: i64,
    pub receiver_services: u64,
    pub receiver_ip: IpAddr,
    pub receiver_port: u16,
    pub sender_services: u64,
    pub sender_ip: IpAddr,
    pub sender_port: u16,
    pub nonce: u64,
    pub user_agent: String,
    pub latest_block: i32,
    pub relay: bool,
}

impl VersionMessage {
    /// Version message with default fields. The caller supplies the clock
    /// reading and the random nonce.
    pub fn new(timestamp: i64, nonce: u64) -> Self {
        Self {
            version: PROTOCOL_VERSION,
            services: 0,
            timestamp,
            receiver_services: 0,
            receiver_ip: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            receiver_port: 8333,
            sender_services: 0,
            sender_ip: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            sender_port: 8333,
            nonce,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            latest_block: 0,
            relay: false,
        }
    }
}

/// 16-byte network address, IPv4 in its IPv6-mapped form
fn ip_to_bytes(ip: &IpAddr) -> [u8; 16] {
    match ip {
        IpAddr::V4(v4) => v4.to_ipv6_mapped().octets(),
        IpAddr::V6(v6) => v6.octets(),
    }
}

fn ip_from_bytes(bytes: [u8; 16]) -> IpAddr {
    let v6 = Ipv6Addr::from(bytes);
    match v6.to_ipv4_mapped() {
        Some(v4) => IpAddr::V4(v4),
        None => IpAddr::V6(v6),
    }
}

impl Serializable for VersionMessage {
    fn serialize(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(86 + self.user_agent.len());
        buf.extend_from_slice(&self.version.to_le_bytes());
        buf.extend_from_slice(&self.services.to_le_bytes());
        buf.extend_from_slice(&self.timestamp.to_le_bytes());
        buf.extend_from_slice(&self.receiver_services.to_le_bytes());
        buf.extend_from_slice(&ip_to_bytes(&self.receiver_ip));
        buf.extend_from_slice(&self.receiver_port.to_be_bytes());
        buf.extend_from_slice(&self.sender_services.to_le_bytes());
        buf.extend_from_slice(&ip_to_bytes(&self.sender_ip));
        buf.extend_from_slice(&self.sender_port.to_be_bytes());
        buf.extend_from_slice(&self.nonce.to_le_bytes());
        push_var_bytes(&mut buf, self.user_agent.as_bytes());
        buf.extend_from_slice(&self.latest_block.to_le_bytes());
        buf.push(self.relay as u8);
        buf
    }

    fn deserialize<R: Read + ?Sized>(reader: &mut R) -> Result<Self> {
        let version = read_i32_le(reader, "version")?;
        let services = read_u64_le(reader, "version services")?;
        let timestamp = read_i64_le(reader, "version timestamp")?;
        let receiver_services = read_u64_le(reader, "version receiver services")?;
        let receiver_ip = ip_from_bytes(read_array(reader, "version receiver ip")?);
        let receiver_port = u16::from_be_bytes(read_array(reader, "version receiver port")?);
        let sender_services = read_u64_le(reader, "version sender services")?;
        let sender_ip = ip_from_bytes(read_array(reader, "version sender ip")?);
        let sender_port = u16::from_be_bytes(read_array(reader, "version sender port")?);
        let nonce = read_u64_le(reader, "version nonce")?;
        let user_agent = read_var_string(reader, "version user agent", MAX_USER_AGENT_LENGTH)?;
        let latest_block = read_i32_le(reader, "version latest block")?;

        // Peers older than BIP37 stop before the relay byte and always relay
        let mut relay = [0u8; 1];
        let relay = match reader.read(&mut relay)? {
            0 => true,
            _ => relay[0] != 0,
        };

        Ok(Self {
            version,
            services,
            timestamp,
            receiver_services,
            receiver_ip,
            receiver_port,
            sender_services,
            sender_ip,
            sender_port,
            nonce,
            user_agent,
            latest_block,
            relay,
        })
    }
}

impl Payload for VersionMessage {
    const COMMAND: &'static str = "version";
}

/// `verack` acknowledges the remote version; empty payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct VerAckMessage;

impl Serializable for VerAckMessage {
    fn serialize(&self) -> Vec<u8> {
        Vec::new()
    }

    fn deserialize<R: Read + ?Sized>(_reader: &mut R) -> Result<Self> {
        Ok(VerAckMessage)
    }
}

impl Payload for VerAckMessage {
    const COMMAND: &'static str = "verack";
}

/// `ping` keepalive
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PingMessage {
    pub nonce: u64,
}

impl PingMessage {
    pub fn new(nonce: u64) -> Self {
        Self { nonce }
    }

    /// The reply echoing this nonce
    pub fn pong(&self) -> PongMessage {
        PongMessage { nonce: self.nonce }
    }
}

impl Serializable for PingMessage {
    fn serialize(&self) -> Vec<u8> {
        self.nonce.to_le_bytes().to_vec()
    }

    fn deserialize<R: Read + ?Sized>(reader: &mut R) -> Result<Self> {
        Ok(Self {
            nonce: read_u64_le(reader, "ping nonce")?,
        })
    }
}

impl Payload for PingMessage {
    const COMMAND: &'static str = "ping";
}

/// `pong` reply carrying the ping's nonce
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PongMessage {
    pub nonce: u64,
}

impl Serializable for PongMessage {
    fn serialize(&self) -> Vec<u8> {
        self.nonce.to_le_bytes().to_vec()
    }

    fn deserialize<R: Read + ?Sized>(reader: &mut R) -> Result<Self> {
        Ok(Self {
            nonce: read_u64_le(reader, "pong nonce")?,
        })
    }
}

impl Payload for PongMessage {
    const COMMAND: &'static str = "pong";
}
