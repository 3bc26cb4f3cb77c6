//! Configuration for the escrow engine

use serde::{Deserialize, Serialize};

/// Escrow engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Service name
    pub service_name: String,

    /// Central pool wallet escrowed funds release to
    pub central_wallet: String,

    /// Days after registration the donor may reclaim an unclaimed escrow
    pub cancel_after_days: i64,

    /// Maximum simultaneous release submissions against the external ledger
    pub max_concurrent_releases: usize,

    /// Deadline for a whole release batch (milliseconds)
    pub batch_deadline_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            service_name: "escrow-engine".to_string(),
            central_wallet: String::new(),
            cancel_after_days: 30,          // ~1 month reclaim window
            max_concurrent_releases: 16,
            batch_deadline_ms: 60_000,      // 60s per batch
        }
    }
}

impl Config {
    /// Load from TOML file
    pub fn from_file(path: impl AsRef<std::path::Path>) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)
            .map_err(|e| crate::Error::Config(format!("Failed to parse config: {}", e)))?;
        Ok(config)
    }

    /// Load from environment variables
    pub fn from_env() -> crate::Result<Self> {
        let mut config = Config::default();

        if let Ok(addr) = std::env::var("CENTRAL_WALLET_ADDRESS") {
            config.central_wallet = addr;
        }

        if let Ok(days) = std::env::var("ESCROW_CANCEL_AFTER_DAYS") {
            config.cancel_after_days = days
                .parse()
                .map_err(|e| crate::Error::Config(format!("ESCROW_CANCEL_AFTER_DAYS: {}", e)))?;
        }

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.cancel_after_days, 30);
        assert_eq!(config.max_concurrent_releases, 16);
    }
}
