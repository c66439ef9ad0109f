// Counterparty aggregation
//
// Folds per-transaction balance deltas into a running per-counterparty
// ledger: SOL sent to / received from each address, interaction counts, and
// last-seen times. Signer accounts and the system program are never
// counterparties, and fee-sized movements are dropped by a dust filter.

use chrono::{DateTime, TimeZone, Utc};
use std::collections::HashMap;

use crate::analytics::balance::{account_index_of, sol_delta_at};
use crate::analytics::program_ids::SYSTEM_PROGRAM_ID;
use crate::analytics::types::{CounterpartyInteraction, Resolution};
use crate::logger::{self, LogTag};
use crate::rpc::TransactionDetails;

/// Tuning for counterparty attribution
#[derive(Debug, Clone)]
pub struct InteractionConfig {
    /// Minimum counterparty delta magnitude, in lamports. Movements below
    /// this are rent/fee noise and never create or update an entry.
    pub dust_threshold_lamports: u64,
}

impl Default for InteractionConfig {
    fn default() -> Self {
        Self {
            // Above ATA rent (2_039_280 lamports) and priority-fee movements
            dust_threshold_lamports: 3_000_000,
        }
    }
}

/// Per-counterparty ledger for one analysis run.
///
/// Entries are keyed by address; arrival order is kept so that rankings have
/// a deterministic tie-break.
#[derive(Debug, Default)]
pub struct InteractionLedger {
    entries: HashMap<String, CounterpartyInteraction>,
    arrival: Vec<String>,
}

impl InteractionLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, address: &str) -> Option<&CounterpartyInteraction> {
        self.entries.get(address)
    }

    /// Fold one transaction into the ledger.
    ///
    /// Transactions that did not move the analyzed wallet's balance, or where
    /// the wallet's index is unresolvable, are skipped entirely.
    pub fn fold_transaction(
        &mut self,
        tx: &TransactionDetails,
        wallet: &str,
        config: &InteractionConfig,
    ) {
        let wallet_index = match account_index_of(tx, wallet) {
            Some(index) => index,
            None => return,
        };

        let wallet_delta = match sol_delta_at(tx, wallet_index) {
            Resolution::Resolved(delta) if !delta.is_zero() => delta,
            _ => return,
        };

        let timestamp = block_timestamp(tx);

        for (index, key) in tx.transaction.message.account_keys.iter().enumerate() {
            if index == wallet_index || key.signer || key.pubkey == SYSTEM_PROGRAM_ID {
                continue;
            }

            let delta = match sol_delta_at(tx, index) {
                Resolution::Resolved(delta) => delta,
                _ => continue,
            };

            if delta.lamports.unsigned_abs() < config.dust_threshold_lamports {
                continue;
            }

            // Anti-correlated signs classify the relationship; same-sign
            // movements (both paying into a pool, say) are not attributable
            let (sent, received) = if wallet_delta.lamports < 0 && delta.lamports > 0 {
                (delta.sol, 0.0)
            } else if wallet_delta.lamports > 0 && delta.lamports < 0 {
                (0.0, delta.sol.abs())
            } else {
                continue;
            };

            self.record(&key.pubkey, sent, received, timestamp);
        }
    }

    fn record(&mut self, address: &str, sent: f64, received: f64, timestamp: DateTime<Utc>) {
        if !self.entries.contains_key(address) {
            self.arrival.push(address.to_string());
            logger::debug(LogTag::Analytics, &format!("new counterparty: {}", address));
            self.entries.insert(
                address.to_string(),
                CounterpartyInteraction {
                    address: address.to_string(),
                    total_sent: 0.0,
                    total_received: 0.0,
                    transaction_count: 0,
                    last_interaction: timestamp,
                },
            );
        }

        if let Some(entry) = self.entries.get_mut(address) {
            entry.total_sent += sent;
            entry.total_received += received;
            entry.transaction_count += 1;
            entry.last_interaction = entry.last_interaction.max(timestamp);
        }
    }

    /// Counterparties ranked by total sent, descending. Ties keep arrival
    /// order (stable sort over the arrival sequence).
    pub fn ranked_by_sent(&self, limit: usize) -> Vec<CounterpartyInteraction> {
        let mut ranked: Vec<CounterpartyInteraction> = self
            .arrival
            .iter()
            .filter_map(|address| self.entries.get(address).cloned())
            .collect();

        ranked.sort_by(|a, b| {
            b.total_sent
                .partial_cmp(&a.total_sent)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        ranked.truncate(limit);
        ranked
    }
}

/// Block time as a UTC timestamp; transactions without one read as epoch
pub fn block_timestamp(tx: &TransactionDetails) -> DateTime<Utc> {
    tx.block_time
        .and_then(|secs| Utc.timestamp_opt(secs, 0).single())
        .unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
}
