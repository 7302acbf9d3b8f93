//! Block explorer links for rewards and transactions.

const EXPLORER_URL: &str = "https://explorer.aptoslabs.com";

/// Builds explorer URLs on one network.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExplorerLinks {
    network: String,
}

impl ExplorerLinks {
    pub fn new(network: impl Into<String>) -> Self {
        Self {
            network: network.into(),
        }
    }

    /// Page of the minted reward token.
    pub fn reward(&self, token_data_id: &str) -> String {
        format!(
            "{}/token/{}/0?network={}",
            EXPLORER_URL, token_data_id, self.network
        )
    }

    /// Overview page of the mint transaction.
    pub fn transaction(&self, txn_hash: &str) -> String {
        format!(
            "{}/txn/{}/userTxnOverview?network={}",
            EXPLORER_URL, txn_hash, self.network
        )
    }
}
