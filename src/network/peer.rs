// Peer session over an ordered byte stream

use super::control::{VerAckMessage, VersionMessage};
use super::envelope::{ENVELOPE_HEADER_SIZE, FrameHeader, NetworkEnvelope, check_magic};
use super::headers::{GetHeadersMessage, HeadersMessage};
use super::message::{Message, Payload};
use super::Network;
use crate::core::{BlockHeader, Hash256};
use crate::error::{Result, WireError};
use log::{debug, info, warn};
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::{TcpStream, ToSocketAddrs};

/// Read until `buf` is full or the stream ends, returning the bytes read
async fn fill<R: AsyncRead + Unpin>(reader: &mut R, buf: &mut [u8]) -> Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        let n = reader.read(&mut buf[filled..]).await?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    Ok(filled)
}

/// Fill `buf` completely, reporting a short read against `field`
async fn read_full<R: AsyncRead + Unpin>(reader: &mut R, buf: &mut [u8], field: &'static str) -> Result<()> {
    let actual = fill(reader, buf).await?;
    if actual != buf.len() {
        return Err(WireError::Length {
            field,
            expected: buf.len(),
            actual,
        });
    }
    Ok(())
}

/// One connection to a remote node.
///
/// Messages are read strictly in order. While waiting for a particular
/// command the session answers `version` with `verack` and `ping` with
/// `pong`; everything else it is not waiting for is dropped.
pub struct Peer<S> {
    stream: S,
    network: Network,
    user_agent: String,
    remote_version: Option<VersionMessage>,
}

impl Peer<TcpStream> {
    /// Open a TCP connection to `addr`
    pub async fn connect<A: ToSocketAddrs>(addr: A, network: Network) -> Result<Self> {
        let stream = TcpStream::connect(addr).await?;
        if let Ok(remote) = stream.peer_addr() {
            info!("connected to {} on {}", remote, network);
        }
        Ok(Self::new(stream, network))
    }
}

impl<S: AsyncRead + AsyncWrite + Unpin> Peer<S> {
    pub fn new(stream: S, network: Network) -> Self {
        Self {
            stream,
            network,
            user_agent: super::control::DEFAULT_USER_AGENT.to_string(),
            remote_version: None,
        }
    }

    /// User agent announced in our version message
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    pub fn network(&self) -> Network {
        self.network
    }

    /// Version message the remote sent, once received
    pub fn remote_version(&self) -> Option<&VersionMessage> {
        self.remote_version.as_ref()
    }

    /// Frame and send a message
    pub async fn send(&mut self, message: &Message) -> Result<()> {
        let envelope = message.to_envelope(self.network)?;
        self.send_envelope(&envelope).await
    }

    pub async fn send_envelope(&mut self, envelope: &NetworkEnvelope) -> Result<()> {
        debug!("sending {} ({} bytes)", envelope.command(), envelope.payload().len());
        self.stream.write_all(&envelope.serialize()).await?;
        self.stream.flush().await?;
        Ok(())
    }

    /// Read the next envelope from the stream.
    ///
    /// Errors match `NetworkEnvelope::parse`: end of stream before the
    /// magic is `ConnectionClosed`, a short read is `Length`, and a foreign
    /// magic is rejected before the rest of the header is awaited.
    pub async fn read_envelope(&mut self) -> Result<NetworkEnvelope> {
        let mut magic = [0u8; 4];
        match fill(&mut self.stream, &mut magic).await? {
            0 => return Err(WireError::ConnectionClosed),
            4 => {}
            actual => {
                return Err(WireError::Length {
                    field: "envelope magic",
                    expected: 4,
                    actual,
                });
            }
        }
        check_magic(magic, self.network)?;

        let mut header = [0u8; ENVELOPE_HEADER_SIZE];
        header[..4].copy_from_slice(&magic);
        read_full(&mut self.stream, &mut header[4..], "envelope header").await?;

        let frame = FrameHeader::parse(&header, self.network)?;
        let mut payload = vec![0u8; frame.payload_len()];
        read_full(&mut self.stream, &mut payload, "envelope payload").await?;

        let envelope = frame.into_envelope(payload)?;
        debug!("received {} ({} bytes)", envelope.command(), envelope.payload().len());
        Ok(envelope)
    }

    /// Read until one of `commands` arrives, answering version and ping
    /// along the way
    pub async fn wait_for(&mut self, commands: &[&str]) -> Result<Message> {
        loop {
            let envelope = self.read_envelope().await?;
            let message = Message::from_envelope(&envelope).inspect_err(|e| {
                warn!("rejected {} from peer: {}", envelope.command(), e);
            })?;

            match &message {
                Message::Version(version) => {
                    info!(
                        "peer version {} agent {} height {}",
                        version.version, version.user_agent, version.latest_block
                    );
                    self.remote_version = Some(version.clone());
                    self.send(&Message::Verack(VerAckMessage)).await?;
                }
                Message::Ping(ping) => {
                    self.send(&Message::Pong(ping.pong())).await?;
                }
                _ => {}
            }

            if commands.contains(&message.command()) {
                return Ok(message);
            }
            debug!("ignoring {}", message.command());
        }
    }

    /// Exchange version and verack with the remote
    pub async fn handshake(&mut self) -> Result<()> {
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs() as i64)
            .unwrap_or_default();
        let mut version = VersionMessage::new(timestamp, rand::random::<u64>());
        version.user_agent = self.user_agent.clone();
        version.receiver_port = self.network.default_port();
        version.sender_port = self.network.default_port();

        self.send(&Message::Version(version)).await?;
        self.wait_for(&[VerAckMessage::COMMAND]).await?;
        info!("handshake complete on {}", self.network);
        Ok(())
    }

    /// Request the headers following `start` and check their proof of work
    /// and linkage
    pub async fn get_headers(&mut self, start: Hash256) -> Result<Vec<BlockHeader>> {
        let request = GetHeadersMessage::new(start);
        self.send(&Message::GetHeaders(request)).await?;

        match self.wait_for(&[HeadersMessage::COMMAND]).await? {
            Message::Headers(headers) => {
                headers.check_chain(start)?;
                info!("received {} headers after {}", headers.headers.len(), start);
                Ok(headers.headers)
            }
            other => Err(WireError::UnexpectedData {
                context: "headers reply",
                detail: format!("got {}", other.command()),
            }),
        }
    }
}
