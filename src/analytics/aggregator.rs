// Analytics aggregation orchestrator
//
// Drives the full pipeline for one wallet: signature backfill (paginated,
// bounded by a lookback window), batched concurrent detail fetching with an
// inter-batch delay, per-transaction classification and folding, and final
// assembly of the immutable WalletAnalytics result.
//
// Per-item failures are caught at the batch-item boundary, counted, and
// skipped; only the signature listing itself can abort a run.

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use futures::future::join_all;
use solana_sdk::pubkey::Pubkey;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::watch;
use tokio::time::sleep;

use crate::analytics::classify::{classify_nft_trades, classify_token_trades, log_entry_for};
use crate::analytics::interactions::{InteractionConfig, InteractionLedger};
use crate::analytics::pnl::{realized_pnl_for, Fill};
use crate::analytics::types::{NftTrade, TokenTrade, TransactionLogEntry, WalletAnalytics};
use crate::logger::{self, format_signature_short, LogTag};
use crate::metadata::MetadataResolver;
use crate::rpc::{RpcClient, RpcError, SignatureRecord, TransactionDetails};

// =============================================================================
// CONFIGURATION
// =============================================================================

#[derive(Debug, Clone)]
pub struct AnalyticsConfig {
    /// Signatures requested per backfill page
    pub signature_page_limit: usize,
    /// Hard cap on signatures per run (None = window-bounded only)
    pub max_signatures: Option<usize>,
    /// Maximum age of transactions included in a run (None = full history)
    pub lookback_days: Option<i64>,
    /// Transaction details fetched concurrently per batch
    pub detail_batch_size: usize,
    /// Cooperative throttle between batches, to respect RPC rate limits
    pub batch_delay_ms: u64,
    /// Counterparties kept in the final ranking
    pub top_counterparties: usize,
    pub interaction: InteractionConfig,
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            signature_page_limit: 1000,
            max_signatures: None,
            lookback_days: Some(365),
            detail_batch_size: 8,
            batch_delay_ms: 100,
            top_counterparties: 10,
            interaction: InteractionConfig::default(),
        }
    }
}

// =============================================================================
// ERRORS AND CONTROL
// =============================================================================

#[derive(Debug, Error)]
pub enum AnalyticsError {
    #[error("invalid wallet address: {0}")]
    InvalidAddress(String),
    #[error("failed to list signatures: {0}")]
    SignatureFetch(#[source] RpcError),
    #[error("analysis cancelled")]
    Cancelled,
}

/// Cooperative cancellation handle, checked between batches
#[derive(Debug, Clone, Default)]
pub struct AbortFlag(Arc<AtomicBool>);

impl AbortFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

// =============================================================================
// ANALYZER
// =============================================================================

pub struct WalletAnalyzer {
    rpc: Arc<RpcClient>,
    resolver: Arc<dyn MetadataResolver>,
    config: AnalyticsConfig,
    progress: watch::Sender<f64>,
    abort: AbortFlag,
}

/// Accumulated state for one run, folded between suspension points
#[derive(Default)]
struct RunState {
    ledger: InteractionLedger,
    token_trades: Vec<TokenTrade>,
    nft_trades: Vec<NftTrade>,
    transaction_log: Vec<TransactionLogEntry>,
    total_profit_sol: f64,
    total_loss_sol: f64,
    skipped: u64,
}

impl WalletAnalyzer {
    pub fn new(
        rpc: Arc<RpcClient>,
        resolver: Arc<dyn MetadataResolver>,
        config: AnalyticsConfig,
    ) -> Self {
        let (progress, _) = watch::channel(0.0);
        Self {
            rpc,
            resolver,
            config,
            progress,
            abort: AbortFlag::new(),
        }
    }

    /// Fraction of signatures processed, [0, 1], monotone within a run
    pub fn progress_receiver(&self) -> watch::Receiver<f64> {
        self.progress.subscribe()
    }

    /// Handle a caller can use to stop the run between batches
    pub fn abort_flag(&self) -> AbortFlag {
        self.abort.clone()
    }

    /// Run the full pipeline for one wallet address.
    ///
    /// Idempotent given the same ledger state: replaying from scratch yields
    /// the same result.
    pub async fn analyze(&self, wallet: &str) -> Result<WalletAnalytics, AnalyticsError> {
        Pubkey::from_str(wallet)
            .map_err(|_| AnalyticsError::InvalidAddress(wallet.to_string()))?;

        let _ = self.progress.send(0.0);

        let signatures = self.collect_signatures(wallet).await?;
        let total = signatures.len();
        logger::log(
            LogTag::Analytics,
            "RUN",
            &format!("analyzing {} transactions for {}", total, wallet),
        );

        let mut state = RunState::default();
        let mut processed = 0usize;

        for batch in signatures.chunks(self.config.detail_batch_size.max(1)) {
            if self.abort.is_cancelled() {
                logger::warning(LogTag::Analytics, "run cancelled between batches");
                return Err(AnalyticsError::Cancelled);
            }

            let fetches = batch
                .iter()
                .map(|record| self.rpc.get_transaction(&record.signature));
            let results = join_all(fetches).await;

            for (record, result) in batch.iter().zip(results) {
                match result {
                    Ok(Some(tx)) => self.fold_transaction(&tx, wallet, &mut state).await,
                    Ok(None) => {
                        state.skipped += 1;
                        logger::debug(
                            LogTag::Analytics,
                            &format!(
                                "no ledger record for {}",
                                format_signature_short(&record.signature)
                            ),
                        );
                    }
                    Err(e) => {
                        state.skipped += 1;
                        logger::warning(
                            LogTag::Analytics,
                            &format!(
                                "skipping {}: {}",
                                format_signature_short(&record.signature),
                                e
                            ),
                        );
                    }
                }
            }

            processed += batch.len();
            if total > 0 {
                let _ = self.progress.send(processed as f64 / total as f64);
            }

            if processed < total {
                sleep(Duration::from_millis(self.config.batch_delay_ms)).await;
            }
        }

        let result = self.assemble(wallet, state);
        let _ = self.progress.send(1.0);
        Ok(result)
    }

    /// Fold one fetched transaction into the run state. Classification
    /// failures never abort the run.
    async fn fold_transaction(
        &self,
        tx: &TransactionDetails,
        wallet: &str,
        state: &mut RunState,
    ) {
        if let Some(entry) = log_entry_for(tx, wallet) {
            if entry.balance_change_sol > 0.0 {
                state.total_profit_sol += entry.balance_change_sol;
            } else if entry.balance_change_sol < 0.0 {
                state.total_loss_sol += entry.balance_change_sol.abs();
            }
            state.transaction_log.push(entry);
        }

        state
            .ledger
            .fold_transaction(tx, wallet, &self.config.interaction);

        let token_trades = classify_token_trades(tx, wallet, self.resolver.as_ref()).await;
        state.token_trades.extend(token_trades);

        let nft_trades = classify_nft_trades(tx, wallet, self.resolver.as_ref()).await;
        state.nft_trades.extend(nft_trades);
    }

    /// Paginated signature backfill, newest first, bounded by the lookback
    /// window and the optional signature cap.
    async fn collect_signatures(
        &self,
        wallet: &str,
    ) -> Result<Vec<SignatureRecord>, AnalyticsError> {
        let cutoff = self
            .config
            .lookback_days
            .map(|days| Utc::now() - ChronoDuration::days(days));

        let mut collected: Vec<SignatureRecord> = Vec::new();
        let mut before: Option<String> = None;

        loop {
            let remaining = self
                .config
                .max_signatures
                .map(|cap| cap.saturating_sub(collected.len()))
                .unwrap_or(usize::MAX);
            if remaining == 0 {
                break;
            }

            let page_limit = self.config.signature_page_limit.min(remaining);
            let page = self
                .rpc
                .get_signatures_for_address(wallet, page_limit, before.as_deref())
                .await
                .map_err(AnalyticsError::SignatureFetch)?;

            if page.is_empty() {
                break;
            }

            let exhausted = page.len() < page_limit;
            let oldest_block_time = page.iter().filter_map(|r| r.block_time).min();
            before = page.last().map(|r| r.signature.clone());
            collected.extend(page);

            if exhausted {
                break;
            }
            if let (Some(cutoff), Some(oldest)) = (cutoff, oldest_block_time) {
                if oldest < cutoff.timestamp() {
                    break;
                }
            }

            sleep(Duration::from_millis(self.config.batch_delay_ms)).await;
        }

        Ok(filter_by_cutoff(collected, cutoff))
    }

    fn assemble(&self, wallet: &str, mut state: RunState) -> WalletAnalytics {
        // Newest first, the order a dashboard log reads in
        state
            .transaction_log
            .sort_by(|a, b| b.timestamp.cmp(&a.timestamp));

        let mut fills: Vec<Fill> = state.token_trades.iter().map(Fill::from).collect();
        fills.extend(state.nft_trades.iter().map(Fill::from));
        let realized_pnl_sol = realized_pnl_for(fills);

        WalletAnalytics {
            wallet: wallet.to_string(),
            total_volume_sol: total_volume(&state.token_trades, &state.nft_trades),
            unique_counterparties: state.ledger.len(),
            top_counterparties: state.ledger.ranked_by_sent(self.config.top_counterparties),
            token_trades: state.token_trades,
            nft_trades: state.nft_trades,
            realized_pnl_sol,
            total_profit_sol: state.total_profit_sol,
            total_loss_sol: state.total_loss_sol,
            net_balance_sol: state.total_profit_sol - state.total_loss_sol,
            transaction_log: state.transaction_log,
            skipped_transactions: state.skipped,
        }
    }
}

/// Total traded volume: the sum of every classified trade's price
pub fn total_volume(token_trades: &[TokenTrade], nft_trades: &[NftTrade]) -> f64 {
    let token_volume: f64 = token_trades.iter().map(|t| t.price_sol).sum();
    let nft_volume: f64 = nft_trades.iter().map(|t| t.price_sol).sum();
    token_volume + nft_volume
}

/// Drop signatures older than the lookback cutoff
fn filter_by_cutoff(
    records: Vec<SignatureRecord>,
    cutoff: Option<DateTime<Utc>>,
) -> Vec<SignatureRecord> {
    match cutoff {
        Some(cutoff) => records
            .into_iter()
            .filter(|record| {
                record
                    .block_time
                    .map(|t| t >= cutoff.timestamp())
                    .unwrap_or(true)
            })
            .collect(),
        None => records,
    }
}
