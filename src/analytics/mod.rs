/// Transaction classification and aggregation pipeline
///
/// Takes a wallet's raw ledger transactions plus their pre/post balance
/// snapshots and produces counterparty summaries, classified token and NFT
/// trades, realized P&L, and a chronological transaction log.
pub mod aggregator;
pub mod balance;
pub mod classify;
pub mod interactions;
pub mod pnl;
pub mod program_ids;
pub mod types;

pub use aggregator::{AbortFlag, AnalyticsConfig, AnalyticsError, WalletAnalyzer};
pub use types::WalletAnalytics;
