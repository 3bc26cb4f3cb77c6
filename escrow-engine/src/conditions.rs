//! Hash-lock condition generation and verification
//!
//! A fulfillment is the secret preimage; the condition is its SHA-256 digest,
//! hex-encoded to exactly 64 characters. The fulfillment mixes disaster
//! metadata with a timestamp and a cryptographically random nonce, so two
//! donors targeting the same disaster and region never share a preimage.

use crate::{Error, Result};
use chrono::Utc;
use pool_ledger::types::DisasterTrigger;
use rand::RngCore;
use sha2::{Digest, Sha256};

/// Required hex length of a condition (SHA-256, 32 bytes)
pub const CONDITION_HEX_LEN: usize = 64;

/// Prefix marking fulfillments minted by this system
const FULFILLMENT_PREFIX: &str = "RELIEFRAIL";

/// A freshly generated condition with its secret preimage.
///
/// The fulfillment must be encrypted before it touches storage; see
/// [`crate::vault`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConditionPair {
    /// Public commitment, 64 uppercase hex characters
    pub condition: String,

    /// Secret preimage satisfying the condition
    pub fulfillment: String,
}

/// Generate a condition/fulfillment pair for a disaster trigger.
///
/// Fails with [`Error::InvalidConditionLength`] if the encoding ever
/// deviates from 64 hex characters.
pub fn create_condition(trigger: &DisasterTrigger) -> Result<ConditionPair> {
    let timestamp = Utc::now().to_rfc3339();

    let mut nonce = [0u8; 8];
    rand::rngs::OsRng.fill_bytes(&mut nonce);

    let fulfillment = format!(
        "{}:{}:{}:{}:{}:{}",
        FULFILLMENT_PREFIX,
        trigger.disaster_type,
        trigger.region,
        trigger.threshold,
        timestamp,
        hex::encode(nonce),
    );

    let digest = Sha256::digest(fulfillment.as_bytes());
    let condition = hex::encode_upper(digest);

    if condition.len() != CONDITION_HEX_LEN {
        return Err(Error::InvalidConditionLength(condition.len()));
    }

    Ok(ConditionPair {
        condition,
        fulfillment,
    })
}

/// Verify that a fulfillment satisfies a condition (case-insensitive).
pub fn verify(condition: &str, fulfillment: &str) -> bool {
    let digest = Sha256::digest(fulfillment.as_bytes());
    hex::encode(digest).eq_ignore_ascii_case(condition)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn trigger() -> DisasterTrigger {
        DisasterTrigger {
            disaster_type: "flood".to_string(),
            region: "sylhet".to_string(),
            threshold: 120,
        }
    }

    #[test]
    fn test_condition_is_64_hex_chars() {
        let pair = create_condition(&trigger()).unwrap();
        assert_eq!(pair.condition.len(), CONDITION_HEX_LEN);
        assert!(pair.condition.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_verify_roundtrip_case_insensitive() {
        let pair = create_condition(&trigger()).unwrap();
        assert!(verify(&pair.condition, &pair.fulfillment));
        assert!(verify(&pair.condition.to_lowercase(), &pair.fulfillment));
        assert!(!verify(&pair.condition, "wrong preimage"));
    }

    #[test]
    fn test_identical_metadata_yields_distinct_pairs() {
        // Nonce prevents replay/collision across calls with the same trigger
        let t = trigger();
        let a = create_condition(&t).unwrap();
        let b = create_condition(&t).unwrap();
        assert_ne!(a.fulfillment, b.fulfillment);
        assert_ne!(a.condition, b.condition);
    }

    #[test]
    fn test_fulfillment_embeds_trigger_metadata() {
        let pair = create_condition(&trigger()).unwrap();
        assert!(pair.fulfillment.starts_with("RELIEFRAIL:flood:sylhet:120:"));
    }
}
