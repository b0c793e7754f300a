//! CLI Configuration
//!
//! Handles loading and saving client configuration from TOML files.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use stash_client::ClientConfig;
use stash_fhe::FHEConfig;
use thiserror::Error;

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Config not found: {0}")]
    NotFound(PathBuf),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Full CLI configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StashConfig {
    /// Ledger connection
    #[serde(default)]
    pub network: NetworkSettings,

    /// Encryption scheme parameters
    #[serde(default)]
    pub fhe: FHEConfig,

    /// Submission behaviour
    #[serde(default)]
    pub submission: SubmissionSettings,

    /// Logging settings
    #[serde(default)]
    pub logging: LoggingSettings,
}

impl StashConfig {
    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a file
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(self)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, content)?;
        Ok(())
    }

    /// Create configuration for a named network
    pub fn for_network(network: &str) -> Self {
        match network {
            "sepolia" => Self::sepolia(),
            _ => Self::local(),
        }
    }

    /// In-memory ledger with small keys
    pub fn local() -> Self {
        Self {
            network: NetworkSettings {
                name: "local".to_string(),
                chain_id: 31337,
                rpc_url: "http://127.0.0.1:8545".to_string(),
                ..Default::default()
            },
            fhe: FHEConfig::insecure_testing(),
            ..Default::default()
        }
    }

    /// Sepolia testnet
    pub fn sepolia() -> Self {
        Self {
            network: NetworkSettings::default(),
            submission: SubmissionSettings {
                confirmation_timeout_ms: 120_000,
                ..Default::default()
            },
            ..Default::default()
        }
    }

    /// Client settings derived from this configuration
    pub fn client_config(&self) -> ClientConfig {
        ClientConfig {
            fhe: self.fhe.clone(),
            confirmation_timeout_ms: self.submission.confirmation_timeout_ms,
            max_play_seconds: self.submission.max_play_seconds,
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.client_config()
            .validate()
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;

        if self.network.chain_id == 0 {
            return Err(ConfigError::Invalid("chain_id must be non-zero".to_string()));
        }

        for (name, address) in [
            ("contract_address", &self.network.contract_address),
            ("fhe_contract_address", &self.network.fhe_contract_address),
        ] {
            if let Some(address) = address {
                parse_address(address)
                    .map_err(|e| ConfigError::Invalid(format!("{}: {}", name, e)))?;
            }
        }

        if !matches!(self.logging.format.as_str(), "text" | "json") {
            return Err(ConfigError::Invalid(format!(
                "unknown log format: {}",
                self.logging.format
            )));
        }

        Ok(())
    }
}

/// Ledger connection settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkSettings {
    /// Network name (local, sepolia)
    pub name: String,

    /// EVM chain id
    pub chain_id: u64,

    /// JSON-RPC endpoint
    pub rpc_url: String,

    /// Deployed song stash contract
    pub contract_address: Option<String>,

    /// Deployed FHE gateway contract
    pub fhe_contract_address: Option<String>,
}

impl Default for NetworkSettings {
    fn default() -> Self {
        Self {
            name: "sepolia".to_string(),
            chain_id: 11_155_111,
            rpc_url: "https://rpc.sepolia.org".to_string(),
            contract_address: None,
            fhe_contract_address: None,
        }
    }
}

/// Submission settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmissionSettings {
    /// Receipt wait before a transaction is reported as pending
    pub confirmation_timeout_ms: u64,

    /// Longest accepted play session in seconds
    pub max_play_seconds: u64,
}

impl Default for SubmissionSettings {
    fn default() -> Self {
        let client = ClientConfig::default();
        Self {
            confirmation_timeout_ms: client.confirmation_timeout_ms,
            max_play_seconds: client.max_play_seconds,
        }
    }
}

/// Logging settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingSettings {
    /// Log level
    pub level: String,

    /// Output format (text, json)
    pub format: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "text".to_string(),
        }
    }
}

/// Parse a `0x`-prefixed 20-byte address
pub fn parse_address(text: &str) -> Result<[u8; 20], String> {
    let hex_part = text
        .strip_prefix("0x")
        .ok_or_else(|| "address must start with 0x".to_string())?;
    let bytes = hex::decode(hex_part).map_err(|e| e.to_string())?;
    <[u8; 20]>::try_from(bytes.as_slice())
        .map_err(|_| format!("address must be 20 bytes, got {}", bytes.len()))
}

/// Get default data directory
pub fn default_data_dir(network: &str) -> PathBuf {
    let base = directories::ProjectDirs::from("io", "secret-song-stash", "stash")
        .map(|d| d.data_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from(".stash"));

    base.join(network)
}

/// Get default config file path
pub fn default_config_path(data_dir: &Path) -> PathBuf {
    data_dir.join("config.toml")
}
