//! User directory seam
//!
//! Payout recipients come from an external user directory. The directory also
//! keeps a mirrored application-level balance per user; mirror credits are
//! best-effort and never gate the authoritative pool bookkeeping.

use crate::Result;
use async_trait::async_trait;
use parking_lot::Mutex;
use pool_ledger::types::{Amount, Recipient};
use std::collections::HashMap;

/// Lookup and mirror-credit interface to the user directory
#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// All registered recipients in `region`
    async fn find_by_region(&self, region: &str) -> Result<Vec<Recipient>>;

    /// Credit a user's mirrored application balance after a confirmed payout
    async fn credit_mirrored_balance(&self, user_id: u64, amount: Amount) -> Result<()>;
}

/// In-memory [`UserDirectory`] backed by a static recipient list.
///
/// Used by tests and single-node deployments without a directory service.
#[derive(Default)]
pub struct StaticDirectory {
    recipients: Mutex<Vec<Recipient>>,
    mirrored: Mutex<HashMap<u64, Amount>>,
}

impl StaticDirectory {
    /// Empty directory
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a recipient
    pub fn add(&self, recipient: Recipient) {
        self.recipients.lock().push(recipient);
    }

    /// Current mirrored balance for `user_id`
    pub fn mirrored_balance(&self, user_id: u64) -> Amount {
        self.mirrored
            .lock()
            .get(&user_id)
            .copied()
            .unwrap_or(Amount::ZERO)
    }
}

#[async_trait]
impl UserDirectory for StaticDirectory {
    async fn find_by_region(&self, region: &str) -> Result<Vec<Recipient>> {
        Ok(self
            .recipients
            .lock()
            .iter()
            .filter(|r| r.region == region)
            .cloned()
            .collect())
    }

    async fn credit_mirrored_balance(&self, user_id: u64, amount: Amount) -> Result<()> {
        let mut mirrored = self.mirrored.lock();
        let balance = mirrored.entry(user_id).or_insert(Amount::ZERO);
        *balance = balance.saturating_add(amount);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pool_ledger::types::WalletAddress;

    fn recipient(user_id: u64, region: &str) -> Recipient {
        Recipient {
            user_id,
            wallet_address: WalletAddress::new(format!("rUser{user_id}")),
            region: region.to_string(),
        }
    }

    #[tokio::test]
    async fn test_find_by_region_filters() {
        let dir = StaticDirectory::new();
        dir.add(recipient(1, "sylhet"));
        dir.add(recipient(2, "khulna"));
        dir.add(recipient(3, "sylhet"));

        let found = dir.find_by_region("sylhet").await.unwrap();
        assert_eq!(found.len(), 2);
        assert!(found.iter().all(|r| r.region == "sylhet"));
        assert!(dir.find_by_region("dhaka").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_mirrored_balance_accumulates() {
        let dir = StaticDirectory::new();
        dir.credit_mirrored_balance(7, Amount::from_drops(33)).await.unwrap();
        dir.credit_mirrored_balance(7, Amount::from_drops(33)).await.unwrap();
        assert_eq!(dir.mirrored_balance(7), Amount::from_drops(66));
        assert_eq!(dir.mirrored_balance(8), Amount::ZERO);
    }
}
