//! Configuration for the distribution service

use serde::{Deserialize, Serialize};

/// Distribution service configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Service name
    pub service_name: String,

    /// Central pool wallet payouts are sent from
    pub central_wallet: String,

    /// Maximum simultaneous payout submissions against the external ledger
    pub max_concurrent_transfers: usize,

    /// Deadline for a whole distribution batch (milliseconds)
    pub batch_deadline_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            service_name: "distribution".to_string(),
            central_wallet: String::new(),
            max_concurrent_transfers: 16,
            batch_deadline_ms: 120_000, // 2min per batch
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

        if let Ok(n) = std::env::var("DISTRIBUTION_MAX_CONCURRENT") {
            config.max_concurrent_transfers = n
                .parse()
                .map_err(|e| crate::Error::Config(format!("DISTRIBUTION_MAX_CONCURRENT: {}", e)))?;
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
        assert_eq!(config.max_concurrent_transfers, 16);
        assert_eq!(config.batch_deadline_ms, 120_000);
    }
}
