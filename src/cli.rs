// CLI commands

use crate::config::Config;
use crate::consensus::{Target, calculate_new_bits};
use crate::core::{BlockHeader, Serializable, base58_check_decode, base58_check_encode};
use crate::merkle::MerkleBlock;
use crate::network::{Network, Payload, Peer};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "spv-wire")]
#[command(about = "Bitcoin P2P wire toolkit for light clients", long_about = None)]
pub struct Cli {
    /// JSON configuration file
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Use testnet regardless of the configured network
    #[arg(long, global = true)]
    pub testnet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Decode an 80-byte block header
    Header {
        /// Serialized header as hex
        hex: String,
    },

    /// Verify a merkleblock payload and list the matched transactions
    #[command(name = "merkleblock")]
    MerkleBlock {
        /// Serialized merkleblock payload as hex
        hex: String,
    },

    /// Expand compact bits into the target and difficulty
    Bits {
        /// Compact bits as hex, e.g. 1d00ffff
        bits: String,
    },

    /// Compute the next compact bits after a difficulty period
    Retarget {
        /// Compact bits of the finished period, as hex
        bits: String,
        /// Seconds the period took
        seconds: i64,
    },

    /// Build a bloom filter and print the framed filterload message
    #[command(name = "filterload")]
    FilterLoad {
        /// Items to insert, as hex
        #[arg(required = true)]
        items: Vec<String>,
    },

    /// Base58Check encode or decode
    Base58 {
        /// Hex payload to encode, or the string to decode
        input: String,
        #[arg(short, long)]
        decode: bool,
    },

    /// Handshake with a node and download headers from genesis
    Sync {
        /// Node address as host:port
        address: String,
        /// Stop after this many headers
        #[arg(long, default_value = "2000")]
        headers: usize,
    },
}

fn parse_hex(input: &str) -> Result<Vec<u8>, String> {
    hex::decode(input.trim()).map_err(|e| format!("Invalid hex: {}", e))
}

fn parse_bits(input: &str) -> Result<u32, String> {
    let digits = input.trim().trim_start_matches("0x");
    u32::from_str_radix(digits, 16).map_err(|e| format!("Invalid bits '{}': {}", input, e))
}

/// CLI handler
pub struct CliHandler {
    config: Config,
}

impl CliHandler {
    /// Create a handler from the global flags
    pub fn new(config_path: Option<&PathBuf>, testnet: bool) -> Result<Self, String> {
        let mut config = match config_path {
            Some(path) => {
                log::info!("Loading config from {}", path.display());
                Config::load(path)?
            }
            None => Config::default(),
        };
        if testnet {
            config.network = Network::Testnet;
        }

        Ok(Self { config })
    }

    /// Handle CLI command
    pub fn handle(&self, command: Commands) -> Result<(), String> {
        match command {
            Commands::Header { hex } => self.header(&hex),
            Commands::MerkleBlock { hex } => self.merkle_block(&hex),
            Commands::Bits { bits } => self.bits(&bits),
            Commands::Retarget { bits, seconds } => self.retarget(&bits, seconds),
            Commands::FilterLoad { items } => self.filter_load(&items),
            Commands::Base58 { input, decode } => self.base58(&input, decode),
            Commands::Sync { address, headers } => self.sync(&address, headers),
        }
    }

    fn header(&self, input: &str) -> Result<(), String> {
        let header = BlockHeader::from_bytes(&parse_hex(input)?).map_err(|e| e.to_string())?;

        println!("Hash: {}", header.hash());
        println!("Previous: {}", header.prev_block_hash);
        println!("Merkle root: {}", header.merkle_root);
        println!("Timestamp: {}", header.timestamp);
        println!("Bits: {:#010x}", header.bits);
        println!("Target: {}", header.target());
        println!("Difficulty: {:.2}", header.difficulty());
        println!(
            "BIP9: {}  BIP91: {}  BIP141: {}",
            header.signals_bip9(),
            header.signals_bip91(),
            header.signals_bip141()
        );

        if header.check_pow() {
            println!("✓ Proof of work valid");
            Ok(())
        } else {
            Err("Proof of work does not meet target".to_string())
        }
    }

    fn merkle_block(&self, input: &str) -> Result<(), String> {
        let block = MerkleBlock::from_bytes(&parse_hex(input)?).map_err(|e| e.to_string())?;

        println!("Block: {}", block.header.hash());
        println!("Transactions in block: {}", block.total);

        let matches = block.verify().map_err(|e| e.to_string())?;
        println!("✓ Merkle proof valid ({} matched)", matches.len());
        for txid in matches {
            println!("  {}", txid);
        }
        Ok(())
    }

    fn bits(&self, input: &str) -> Result<(), String> {
        let target = Target::from_bits(parse_bits(input)?);
        println!("Target: {}", target);
        println!("Difficulty: {:.2}", target.difficulty());
        Ok(())
    }

    fn retarget(&self, input: &str, seconds: i64) -> Result<(), String> {
        let previous = parse_bits(input)?;
        let next = calculate_new_bits(previous, seconds);
        println!("Previous bits: {:08x}", previous);
        println!("New bits: {:08x}", next);
        println!("New target: {}", Target::from_bits(next));
        Ok(())
    }

    fn filter_load(&self, items: &[String]) -> Result<(), String> {
        let mut filter = self.config.bloom.build().map_err(|e| e.to_string())?;
        for item in items {
            filter.add(&parse_hex(item)?);
        }

        let message = filter.filter_load(self.config.bloom.flag);
        log::info!(
            "filter of {} bytes, {} functions, tweak {}",
            filter.size(),
            filter.function_count(),
            filter.tweak()
        );
        let envelope = message.to_envelope(self.config.network).map_err(|e| e.to_string())?;
        println!("{}", hex::encode(envelope.serialize()));
        Ok(())
    }

    fn base58(&self, input: &str, decode: bool) -> Result<(), String> {
        if decode {
            let payload = base58_check_decode(input.trim()).map_err(|e| e.to_string())?;
            println!("{}", hex::encode(payload));
        } else {
            println!("{}", base58_check_encode(&parse_hex(input)?));
        }
        Ok(())
    }

    fn sync(&self, address: &str, limit: usize) -> Result<(), String> {
        let runtime = tokio::runtime::Runtime::new()
            .map_err(|e| format!("Failed to start runtime: {}", e))?;
        runtime.block_on(self.download_headers(address, limit))
    }

    async fn download_headers(&self, address: &str, limit: usize) -> Result<(), String> {
        let network = self.config.network;
        let mut peer = Peer::connect(address, network)
            .await
            .map_err(|e| format!("Failed to connect: {}", e))?
            .with_user_agent(self.config.user_agent.clone());

        peer.handshake().await.map_err(|e| format!("Handshake failed: {}", e))?;
        if let Some(version) = peer.remote_version() {
            println!("✓ Connected to {} (height {})", version.user_agent, version.latest_block);
        }

        let mut tip = network.genesis().hash();
        let mut fetched = 0;
        while fetched < limit {
            let headers = peer.get_headers(tip).await.map_err(|e| e.to_string())?;
            let Some(last) = headers.last() else {
                break;
            };
            tip = last.hash();
            fetched += headers.len();
            println!("  {} headers, tip {}", fetched, tip);
        }

        println!("✓ {} headers verified", fetched);
        Ok(())
    }
}
