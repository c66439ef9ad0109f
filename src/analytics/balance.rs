// Balance-delta extraction
//
// Computes per-account native balance changes for a single transaction from
// its meta.preBalances/postBalances snapshots. Missing or short balance
// arrays are a recoverable condition, reported as NotApplicable rather than
// an error.

use crate::analytics::types::{Resolution, SolDelta};
use crate::rpc::{lamports_delta_to_sol, lamports_to_sol, TransactionDetails};

/// Locate an address's index in the transaction's account list
pub fn account_index_of(tx: &TransactionDetails, address: &str) -> Option<usize> {
    tx.transaction
        .message
        .account_keys
        .iter()
        .position(|key| key.pubkey == address)
}

/// Native balance delta for the account at a given index.
///
/// NotApplicable when the transaction has no meta or the balance arrays do
/// not cover the index.
pub fn sol_delta_at(tx: &TransactionDetails, index: usize) -> Resolution<SolDelta> {
    let meta = match &tx.meta {
        Some(meta) => meta,
        None => return Resolution::NotApplicable,
    };

    if index >= meta.pre_balances.len() || index >= meta.post_balances.len() {
        return Resolution::NotApplicable;
    }

    let pre = meta.pre_balances[index];
    let post = meta.post_balances[index];
    let lamports = (post as i64) - (pre as i64);

    Resolution::Resolved(SolDelta {
        lamports,
        sol: lamports_delta_to_sol(lamports),
        post_balance_sol: lamports_to_sol(post),
    })
}

/// Native balance delta for a specific address.
///
/// NotApplicable when the address is not among the transaction's accounts.
pub fn sol_delta_for(tx: &TransactionDetails, address: &str) -> Resolution<SolDelta> {
    match account_index_of(tx, address) {
        Some(index) => sol_delta_at(tx, index),
        None => Resolution::NotApplicable,
    }
}
