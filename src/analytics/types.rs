// =============================================================================
// CORE DATA STRUCTURES
// =============================================================================

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Outcome of resolving a per-transaction fact.
///
/// Distinguishes "nothing to do" (wallet not present, arrays missing) from
/// "something went wrong" (resolver failure) so callers never have to encode
/// both as an empty value.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution<T> {
    Resolved(T),
    NotApplicable,
    Failed(String),
}

impl<T> Resolution<T> {
    pub fn resolved(self) -> Option<T> {
        match self {
            Resolution::Resolved(value) => Some(value),
            _ => None,
        }
    }

    pub fn is_resolved(&self) -> bool {
        matches!(self, Resolution::Resolved(_))
    }
}

/// Native balance movement for one account within one transaction
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SolDelta {
    /// Signed change in lamports
    pub lamports: i64,
    /// Signed change in SOL
    pub sol: f64,
    /// Balance after the transaction, in SOL
    pub post_balance_sol: f64,
}

impl SolDelta {
    pub fn is_zero(&self) -> bool {
        self.lamports == 0
    }
}

/// Running summary of activity with one counterparty address.
///
/// Never created for the analyzed wallet itself or the system program.
/// Fields only grow (or advance to a later timestamp) as transactions fold in.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CounterpartyInteraction {
    pub address: String,
    /// SOL attributed as sent to this counterparty
    pub total_sent: f64,
    /// SOL attributed as received from this counterparty
    pub total_received: f64,
    pub transaction_count: u32,
    pub last_interaction: DateTime<Utc>,
}

/// Trade direction, fixed at classification time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TradeSide {
    Buy,
    Sell,
}

/// Classified fungible-token trade
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenTrade {
    pub signature: String,
    /// Milliseconds since epoch
    pub timestamp_ms: i64,
    pub mint: String,
    pub amount: f64,
    pub side: TradeSide,
    /// Approximate price in SOL: the wallet's absolute native delta for the
    /// whole transaction, shared by every token change within it
    pub price_sol: f64,
}

/// Classified NFT trade
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NftTrade {
    pub signature: String,
    pub timestamp_ms: i64,
    pub mint: String,
    pub collection: String,
    pub side: TradeSide,
    pub price_sol: f64,
}

/// Sentinel collection name when metadata resolution comes up empty
pub const UNKNOWN_COLLECTION: &str = "Unknown Collection";

/// Transaction log classification label
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransactionKind {
    SolTransfer,
    TokenTransfer,
    NftTransaction,
}

impl TransactionKind {
    pub fn label(&self) -> &'static str {
        match self {
            TransactionKind::SolTransfer => "SOL Transfer",
            TransactionKind::TokenTransfer => "Token Transfer",
            TransactionKind::NftTransaction => "NFT Transaction",
        }
    }
}

impl std::fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// One line of the chronological transaction log
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionLogEntry {
    pub signature: String,
    pub timestamp: DateTime<Utc>,
    /// Signed SOL delta for the analyzed wallet
    pub balance_change_sol: f64,
    pub post_balance_sol: f64,
    pub kind: TransactionKind,
}

/// Final aggregate for one analysis run. Constructed once, immutable after.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalletAnalytics {
    pub wallet: String,
    /// Sum of all classified trades' prices, in SOL
    pub total_volume_sol: f64,
    pub unique_counterparties: usize,
    pub token_trades: Vec<TokenTrade>,
    pub nft_trades: Vec<NftTrade>,
    /// Top counterparties by total sent, descending
    pub top_counterparties: Vec<CounterpartyInteraction>,
    /// Realized P&L from the average-cost engine
    pub realized_pnl_sol: f64,
    /// SOL-flow profit: sum of positive wallet deltas
    pub total_profit_sol: f64,
    /// SOL-flow loss: sum of absolute negative wallet deltas
    pub total_loss_sol: f64,
    pub net_balance_sol: f64,
    pub transaction_log: Vec<TransactionLogEntry>,
    /// Transactions dropped due to per-item fetch or classification failures
    pub skipped_transactions: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolution_accessors() {
        let resolved: Resolution<u32> = Resolution::Resolved(7);
        assert!(resolved.is_resolved());
        assert_eq!(resolved.resolved(), Some(7));

        let skipped: Resolution<u32> = Resolution::NotApplicable;
        assert_eq!(skipped.resolved(), None);

        let failed: Resolution<u32> = Resolution::Failed("boom".to_string());
        assert!(!failed.is_resolved());
    }

    #[test]
    fn test_trade_side_serialization() {
        assert_eq!(serde_json::to_string(&TradeSide::Buy).unwrap(), "\"buy\"");
        assert_eq!(serde_json::to_string(&TradeSide::Sell).unwrap(), "\"sell\"");
    }

    #[test]
    fn test_transaction_kind_labels() {
        assert_eq!(TransactionKind::SolTransfer.label(), "SOL Transfer");
        assert_eq!(TransactionKind::TokenTransfer.label(), "Token Transfer");
        assert_eq!(TransactionKind::NftTransaction.label(), "NFT Transaction");
    }
}
