// Runtime configuration loaded from JSON

use crate::filter::{BloomFilter, BloomFlag};
use crate::network::{DEFAULT_USER_AGENT, Network};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Bloom filter parameters. A missing tweak is drawn at random per session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BloomConfig {
    pub size: u32,
    pub function_count: u32,
    pub tweak: Option<u32>,
    pub flag: BloomFlag,
}

impl Default for BloomConfig {
    fn default() -> Self {
        Self {
            size: 30,
            function_count: 5,
            tweak: None,
            flag: BloomFlag::All,
        }
    }
}

impl BloomConfig {
    /// Empty filter with these parameters
    pub fn build(&self) -> crate::error::Result<BloomFilter> {
        let tweak = self.tweak.unwrap_or_else(rand::random::<u32>);
        BloomFilter::new(self.size, self.function_count, tweak)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub network: Network,
    pub user_agent: String,
    pub bloom: BloomConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            network: Network::Mainnet,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            bloom: BloomConfig::default(),
        }
    }
}

impl Config {
    /// Load from a JSON file. Fields missing from the file keep their defaults.
    pub fn load(path: &Path) -> Result<Self, String> {
        let text = fs::read_to_string(path)
            .map_err(|e| format!("Failed to read config {}: {}", path.display(), e))?;
        Self::from_json(&text)
    }

    pub fn from_json(text: &str) -> Result<Self, String> {
        serde_json::from_str(text).map_err(|e| format!("Invalid config: {}", e))
    }
}
