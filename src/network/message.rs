// Network protocol messages

use super::control::{PingMessage, PongMessage, VerAckMessage, VersionMessage};
use super::envelope::NetworkEnvelope;
use super::headers::{GetHeadersMessage, HeadersMessage};
use super::inventory::GetDataMessage;
use super::Network;
use crate::core::Serializable;
use crate::error::{Result, WireError};
use crate::filter::FilterLoadMessage;
use crate::merkle::MerkleBlock;

/// A message type with a fixed command string
pub trait Payload: Serializable {
    const COMMAND: &'static str;

    /// Frame this payload for `network`. Fails when the encoding exceeds
    /// the payload limit.
    fn to_envelope(&self, network: Network) -> Result<NetworkEnvelope> {
        NetworkEnvelope::new(Self::COMMAND, self.serialize(), network)
    }

    /// Decode the payload of an envelope carrying this command
    fn from_envelope(envelope: &NetworkEnvelope) -> Result<Self> {
        if envelope.command() != Self::COMMAND {
            return Err(WireError::invalid(
                "envelope command",
                format!("expected {}, got {}", Self::COMMAND, envelope.command()),
            ));
        }
        Self::from_bytes(envelope.payload())
    }
}

/// Message for a command without a dedicated type; the payload is kept opaque
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenericMessage {
    command: String,
    payload: Vec<u8>,
}

impl GenericMessage {
    pub fn new(command: &str, payload: Vec<u8>) -> Result<Self> {
        // Reuse the envelope's command checks
        NetworkEnvelope::new(command, Vec::new(), Network::Mainnet)?;
        Ok(Self {
            command: command.to_string(),
            payload,
        })
    }

    pub fn command(&self) -> &str {
        &self.command
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }
}

/// Every message this crate understands, plus a passthrough for the rest
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    Version(VersionMessage),
    Verack(VerAckMessage),
    Ping(PingMessage),
    Pong(PongMessage),
    GetHeaders(GetHeadersMessage),
    Headers(HeadersMessage),
    GetData(GetDataMessage),
    MerkleBlock(MerkleBlock),
    FilterLoad(FilterLoadMessage),
    Generic(GenericMessage),
}

impl Message {
    pub fn command(&self) -> &str {
        match self {
            Message::Version(_) => VersionMessage::COMMAND,
            Message::Verack(_) => VerAckMessage::COMMAND,
            Message::Ping(_) => PingMessage::COMMAND,
            Message::Pong(_) => PongMessage::COMMAND,
            Message::GetHeaders(_) => GetHeadersMessage::COMMAND,
            Message::Headers(_) => HeadersMessage::COMMAND,
            Message::GetData(_) => GetDataMessage::COMMAND,
            Message::MerkleBlock(_) => MerkleBlock::COMMAND,
            Message::FilterLoad(_) => FilterLoadMessage::COMMAND,
            Message::Generic(generic) => generic.command(),
        }
    }

    /// Encoded payload, without framing
    pub fn payload(&self) -> Vec<u8> {
        match self {
            Message::Version(m) => m.serialize(),
            Message::Verack(m) => m.serialize(),
            Message::Ping(m) => m.serialize(),
            Message::Pong(m) => m.serialize(),
            Message::GetHeaders(m) => m.serialize(),
            Message::Headers(m) => m.serialize(),
            Message::GetData(m) => m.serialize(),
            Message::MerkleBlock(m) => m.serialize(),
            Message::FilterLoad(m) => m.serialize(),
            Message::Generic(m) => m.payload.clone(),
        }
    }

    /// Decode an envelope's payload according to its command
    pub fn from_envelope(envelope: &NetworkEnvelope) -> Result<Self> {
        let payload = envelope.payload();
        let message = match envelope.command() {
            VersionMessage::COMMAND => Message::Version(VersionMessage::from_bytes(payload)?),
            VerAckMessage::COMMAND => Message::Verack(VerAckMessage::from_bytes(payload)?),
            PingMessage::COMMAND => Message::Ping(PingMessage::from_bytes(payload)?),
            PongMessage::COMMAND => Message::Pong(PongMessage::from_bytes(payload)?),
            GetHeadersMessage::COMMAND => Message::GetHeaders(GetHeadersMessage::from_bytes(payload)?),
            HeadersMessage::COMMAND => Message::Headers(HeadersMessage::from_bytes(payload)?),
            GetDataMessage::COMMAND => Message::GetData(GetDataMessage::from_bytes(payload)?),
            MerkleBlock::COMMAND => Message::MerkleBlock(MerkleBlock::from_bytes(payload)?),
            FilterLoadMessage::COMMAND => Message::FilterLoad(FilterLoadMessage::from_bytes(payload)?),
            other => Message::Generic(GenericMessage {
                command: other.to_string(),
                payload: payload.to_vec(),
            }),
        };
        Ok(message)
    }

    /// Frame this message for `network`
    pub fn to_envelope(&self, network: Network) -> Result<NetworkEnvelope> {
        NetworkEnvelope::new(self.command(), self.payload(), network)
    }
}
