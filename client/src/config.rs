//! Client configuration

use std::time::Duration;

use serde::{Deserialize, Serialize};
use stash_fhe::{FHEConfig, DEFAULT_MAX_PLAY_SECONDS};

use crate::errors::{ClientError, ClientResult};

/// Configuration for a client session
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Scheme parameters for the session key
    pub fhe: FHEConfig,
    /// How long `submit` waits for a receipt before returning with the
    /// transaction still pending (milliseconds)
    pub confirmation_timeout_ms: u64,
    /// Longest play session accepted as an encrypted duration (seconds)
    pub max_play_seconds: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            fhe: FHEConfig::default(),
            confirmation_timeout_ms: 60_000,
            max_play_seconds: DEFAULT_MAX_PLAY_SECONDS,
        }
    }
}

impl ClientConfig {
    /// Small keys and short waits for tests and local demos
    pub fn insecure_testing() -> Self {
        Self {
            fhe: FHEConfig::insecure_testing(),
            confirmation_timeout_ms: 2_000,
            ..Default::default()
        }
    }

    pub fn confirmation_timeout(&self) -> Duration {
        Duration::from_millis(self.confirmation_timeout_ms)
    }

    pub fn validate(&self) -> ClientResult<()> {
        self.fhe.validate()?;
        if self.confirmation_timeout_ms == 0 {
            return Err(ClientError::Validation(
                "confirmation_timeout_ms must be positive".into(),
            ));
        }
        if self.max_play_seconds == 0 {
            return Err(ClientError::Validation(
                "max_play_seconds must be positive".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ClientConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.max_play_seconds, 86_400);
        assert_eq!(config.confirmation_timeout(), Duration::from_secs(60));
    }

    #[test]
    fn test_invalid_config() {
        let mut config = ClientConfig::insecure_testing();
        config.max_play_seconds = 0;
        assert!(matches!(config.validate(), Err(ClientError::Validation(_))));

        let mut config = ClientConfig::insecure_testing();
        config.fhe.modulus_bits = 100;
        assert!(config.validate().is_err());
    }
}
