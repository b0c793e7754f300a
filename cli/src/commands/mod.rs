//! CLI Commands

mod config;
mod demo;
mod encrypt;
mod keygen;

pub use config::ConfigCommand;
pub use demo::DemoCommand;
pub use encrypt::EncryptCommand;
pub use keygen::KeygenCommand;

use std::path::PathBuf;

use crate::config::{default_config_path, StashConfig};

/// Paths and network selected by the global flags
pub struct Context {
    pub network: String,
    pub data_dir: PathBuf,
    pub config_path: PathBuf,
    explicit_config: bool,
}

impl Context {
    pub fn new(network: String, data_dir: PathBuf, config_path: Option<PathBuf>) -> Self {
        let explicit_config = config_path.is_some();
        let config_path = config_path.unwrap_or_else(|| default_config_path(&data_dir));
        Self {
            network,
            data_dir,
            config_path,
            explicit_config,
        }
    }

    /// The configuration file when present, else the network preset.
    /// An explicitly named file must exist.
    pub fn load_config(&self) -> anyhow::Result<StashConfig> {
        if self.explicit_config || self.config_path.exists() {
            Ok(StashConfig::load(&self.config_path)?)
        } else {
            Ok(StashConfig::for_network(&self.network))
        }
    }
}
