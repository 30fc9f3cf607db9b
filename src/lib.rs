// Bitcoin P2P wire primitives for light (SPV) clients

pub mod core;
pub mod consensus;
pub mod filter;
pub mod merkle;
pub mod network;
pub mod config;
pub mod error;
pub mod cli;

// Re-exports for convenience
pub use core::{BlockHeader, Hash256, Serializable};
pub use consensus::Target;
pub use filter::{BloomFilter, BloomFlag, FilterLoadMessage};
pub use merkle::{MerkleBlock, MerkleTree};
pub use network::{Message, Network, NetworkEnvelope, Payload, Peer};
pub use config::Config;
pub use error::{Result, WireError};
pub use cli::{Cli, CliHandler};
