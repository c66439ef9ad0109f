// Token and NFT trade classification
//
// Inspects a transaction's instruction set and token-balance deltas to decide
// whether it represents a fungible-token trade or an NFT trade, infer the
// direction (buy/sell), and attach an approximate SOL price.
//
// Price approximation: one transaction-wide figure, the wallet's absolute
// native delta, is shared by every token balance change in the transaction.
// Exact for single-instrument swaps; multi-leg transactions misattribute
// price. This is a known accuracy limit, not a bug to fix silently.

use chrono::Utc;
use std::collections::HashMap;

use crate::analytics::balance::{account_index_of, sol_delta_for};
use crate::analytics::program_ids::is_nft_program;
use crate::analytics::types::{
    NftTrade, Resolution, SolDelta, TokenTrade, TradeSide, TransactionKind, TransactionLogEntry,
    UNKNOWN_COLLECTION,
};
use crate::analytics::interactions::block_timestamp;
use crate::logger::{self, format_signature_short, LogTag};
use crate::metadata::MetadataResolver;
use crate::rpc::{TokenBalance, TransactionDetails};

/// Signature of a transaction (first entry of the signature list)
pub fn signature_of(tx: &TransactionDetails) -> &str {
    tx.transaction
        .signatures
        .first()
        .map(|s| s.as_str())
        .unwrap_or("")
}

fn timestamp_ms(tx: &TransactionDetails) -> i64 {
    tx.block_time
        .map(|secs| secs * 1000)
        .unwrap_or_else(|| Utc::now().timestamp_millis())
}

/// True when any instruction targets a known NFT marketplace/metadata program
pub fn is_nft_transaction(tx: &TransactionDetails) -> bool {
    tx.transaction
        .message
        .instructions
        .iter()
        .filter_map(|ix| ix.program_id.as_deref())
        .any(is_nft_program)
}

/// Owning wallet of a token-balance record: the embedded owner field when the
/// node supplied one, otherwise a resolver lookup by account address.
async fn record_owner(
    tx: &TransactionDetails,
    record: &TokenBalance,
    resolver: &dyn MetadataResolver,
) -> Resolution<String> {
    if let Some(owner) = &record.owner {
        return Resolution::Resolved(owner.clone());
    }

    let account = match tx
        .transaction
        .message
        .account_keys
        .get(record.account_index as usize)
    {
        Some(key) => key.pubkey.clone(),
        None => return Resolution::NotApplicable,
    };

    match resolver.token_account_owner(&account).await {
        Ok(info) => Resolution::Resolved(info.owner),
        Err(e) => Resolution::Failed(format!("owner of {}: {}", account, e)),
    }
}

// =============================================================================
// FUNGIBLE-TOKEN PATH
// =============================================================================

/// Classify fungible-token balance changes belonging to the wallet.
///
/// A post record with no matching pre record is a freshly created token
/// account and counts as a buy from zero. Records owned by other wallets are
/// skipped so a counterparty's balance change is never misattributed.
pub async fn classify_token_trades(
    tx: &TransactionDetails,
    wallet: &str,
    resolver: &dyn MetadataResolver,
) -> Vec<TokenTrade> {
    let mut trades = Vec::new();

    let meta = match &tx.meta {
        Some(meta) => meta,
        None => return trades,
    };

    // The whole transaction shares one approximate price: the wallet's own
    // native delta. Without a resolvable wallet index nothing is classified.
    let wallet_delta = match sol_delta_for(tx, wallet) {
        Resolution::Resolved(delta) => delta,
        _ => return trades,
    };
    let price_sol = wallet_delta.sol.abs();

    let post_balances = match &meta.post_token_balances {
        Some(balances) => balances,
        None => return trades,
    };
    let pre_by_index: HashMap<u32, &TokenBalance> = meta
        .pre_token_balances
        .as_deref()
        .unwrap_or(&[])
        .iter()
        .map(|b| (b.account_index, b))
        .collect();

    let signature = signature_of(tx);
    let ts = timestamp_ms(tx);

    for post in post_balances {
        let pre_amount = pre_by_index
            .get(&post.account_index)
            .map(|pre| pre.raw_amount())
            .unwrap_or(0);
        let raw_delta = post.raw_amount() - pre_amount;
        if raw_delta == 0 {
            continue;
        }

        match record_owner(tx, post, resolver).await {
            Resolution::Resolved(owner) if owner == wallet => {}
            Resolution::Failed(reason) => {
                logger::warning(
                    LogTag::Analytics,
                    &format!(
                        "token record skipped in {}: {}",
                        format_signature_short(signature),
                        reason
                    ),
                );
                continue;
            }
            _ => continue,
        }

        let decimals = post.ui_token_amount.decimals;
        let amount = (raw_delta.unsigned_abs() as f64) / 10f64.powi(decimals as i32);

        trades.push(TokenTrade {
            signature: signature.to_string(),
            timestamp_ms: ts,
            mint: post.mint.clone(),
            amount,
            side: if raw_delta > 0 {
                TradeSide::Buy
            } else {
                TradeSide::Sell
            },
            price_sol,
        });
    }

    trades
}

// =============================================================================
// NFT PATH
// =============================================================================

/// Classify NFT trades: the transaction must touch a known NFT program and
/// move the wallet's native balance. Supply-of-exactly-one is the NFT signal;
/// fungible mints fail that check.
pub async fn classify_nft_trades(
    tx: &TransactionDetails,
    wallet: &str,
    resolver: &dyn MetadataResolver,
) -> Vec<NftTrade> {
    let mut trades = Vec::new();

    if !is_nft_transaction(tx) {
        return trades;
    }

    let meta = match &tx.meta {
        Some(meta) => meta,
        None => return trades,
    };

    let wallet_delta = match sol_delta_for(tx, wallet) {
        Resolution::Resolved(delta) if !delta.is_zero() => delta,
        _ => return trades,
    };

    let side = if wallet_delta.lamports < 0 {
        TradeSide::Buy
    } else {
        TradeSide::Sell
    };
    let price_sol = wallet_delta.sol.abs();

    let post_balances = match &meta.post_token_balances {
        Some(balances) => balances,
        None => return trades,
    };
    let pre_by_index: HashMap<u32, &TokenBalance> = meta
        .pre_token_balances
        .as_deref()
        .unwrap_or(&[])
        .iter()
        .map(|b| (b.account_index, b))
        .collect();

    let signature = signature_of(tx);
    let ts = timestamp_ms(tx);

    for post in post_balances {
        let pre_amount = pre_by_index
            .get(&post.account_index)
            .map(|pre| pre.raw_amount())
            .unwrap_or(0);
        if post.raw_amount() == pre_amount {
            continue;
        }

        match record_owner(tx, post, resolver).await {
            Resolution::Resolved(owner) if owner == wallet => {}
            Resolution::Failed(reason) => {
                logger::warning(
                    LogTag::Analytics,
                    &format!(
                        "nft record skipped in {}: {}",
                        format_signature_short(signature),
                        reason
                    ),
                );
                continue;
            }
            _ => continue,
        }

        let supply = match resolver.mint_supply(&post.mint).await {
            Ok(supply) => supply,
            Err(e) => {
                logger::warning(
                    LogTag::Analytics,
                    &format!(
                        "supply lookup failed for {} in {}: {}",
                        post.mint,
                        format_signature_short(signature),
                        e
                    ),
                );
                continue;
            }
        };
        if supply != 1 {
            continue;
        }

        let collection = match resolver.collection(&post.mint).await {
            Ok(Some(collection)) => collection,
            Ok(None) => UNKNOWN_COLLECTION.to_string(),
            Err(e) => {
                logger::debug(
                    LogTag::Metadata,
                    &format!("collection lookup failed for {}: {}", post.mint, e),
                );
                UNKNOWN_COLLECTION.to_string()
            }
        };

        trades.push(NftTrade {
            signature: signature.to_string(),
            timestamp_ms: ts,
            mint: post.mint.clone(),
            collection,
            side,
            price_sol,
        });
    }

    trades
}

// =============================================================================
// TRANSACTION LOG
// =============================================================================

/// Classification label for the transaction log
pub fn transaction_kind(tx: &TransactionDetails) -> TransactionKind {
    if is_nft_transaction(tx) {
        return TransactionKind::NftTransaction;
    }

    let has_token_activity = tx
        .meta
        .as_ref()
        .map(|meta| {
            meta.pre_token_balances.as_deref().unwrap_or(&[]).len() > 0
                || meta.post_token_balances.as_deref().unwrap_or(&[]).len() > 0
        })
        .unwrap_or(false);

    if has_token_activity {
        TransactionKind::TokenTransfer
    } else {
        TransactionKind::SolTransfer
    }
}

/// Transaction log entry for the analyzed wallet; None when the wallet has no
/// resolvable balance index in the transaction.
pub fn log_entry_for(tx: &TransactionDetails, wallet: &str) -> Option<TransactionLogEntry> {
    let index = account_index_of(tx, wallet)?;
    let delta: SolDelta = match crate::analytics::balance::sol_delta_at(tx, index) {
        Resolution::Resolved(delta) => delta,
        _ => return None,
    };

    Some(TransactionLogEntry {
        signature: signature_of(tx).to_string(),
        timestamp: block_timestamp(tx),
        balance_change_sol: delta.sol,
        post_balance_sol: delta.post_balance_sol,
        kind: transaction_kind(tx),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::{MetadataError, TokenAccountInfo};
    use async_trait::async_trait;
    use serde_json::json;
    use std::collections::HashMap;

    const WALLET: &str = "WaLLetAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA";
    const NFT_PROGRAM: &str = "meshj2Qsd9TyZG8rGK3U4yZxh1zHqZ9MJsAVK4Fd7zZ";

    /// Deterministic in-memory resolver
    #[derive(Default)]
    struct StaticResolver {
        owners: HashMap<String, TokenAccountInfo>,
        supplies: HashMap<String, u64>,
        collections: HashMap<String, String>,
        fail_supply: bool,
    }

    #[async_trait]
    impl MetadataResolver for StaticResolver {
        async fn token_account_owner(
            &self,
            account: &str,
        ) -> Result<TokenAccountInfo, MetadataError> {
            self.owners
                .get(account)
                .cloned()
                .ok_or_else(|| MetadataError::AccountNotFound(account.to_string()))
        }

        async fn mint_supply(&self, mint: &str) -> Result<u64, MetadataError> {
            if self.fail_supply {
                return Err(MetadataError::AccountNotFound(mint.to_string()));
            }
            self.supplies
                .get(mint)
                .copied()
                .ok_or_else(|| MetadataError::AccountNotFound(mint.to_string()))
        }

        async fn collection(&self, mint: &str) -> Result<Option<String>, MetadataError> {
            Ok(self.collections.get(mint).cloned())
        }
    }

    struct TokenRecord {
        account_index: u32,
        mint: &'static str,
        owner: Option<&'static str>,
        pre: Option<&'static str>,
        post: &'static str,
        decimals: u8,
    }

    fn token_balance_json(record: &TokenRecord, amount: &str) -> serde_json::Value {
        json!({
            "accountIndex": record.account_index,
            "mint": record.mint,
            "owner": record.owner,
            "uiTokenAmount": {
                "amount": amount,
                "decimals": record.decimals,
                "uiAmount": null,
                "uiAmountString": amount
            }
        })
    }

    fn tx_fixture(
        wallet_pre: u64,
        wallet_post: u64,
        program_ids: Vec<&str>,
        records: Vec<TokenRecord>,
    ) -> TransactionDetails {
        let keys = vec![
            json!({ "pubkey": WALLET, "signer": true, "writable": true }),
            json!({ "pubkey": "TokenAccountBBB", "signer": false, "writable": true }),
            json!({ "pubkey": "TokenAccountCCC", "signer": false, "writable": true }),
        ];
        let instructions: Vec<_> = program_ids
            .iter()
            .map(|id| json!({ "programId": id }))
            .collect();
        let pre_token: Vec<_> = records
            .iter()
            .filter_map(|r| r.pre.map(|amount| token_balance_json(r, amount)))
            .collect();
        let post_token: Vec<_> = records
            .iter()
            .map(|r| token_balance_json(r, r.post))
            .collect();

        serde_json::from_value(json!({
            "slot": 1,
            "blockTime": 1700000000,
            "transaction": {
                "signatures": ["sig-classify"],
                "message": { "accountKeys": keys, "instructions": instructions }
            },
            "meta": {
                "err": null,
                "fee": 5000,
                "preBalances": [wallet_pre, 2_039_280u64, 2_039_280u64],
                "postBalances": [wallet_post, 2_039_280u64, 2_039_280u64],
                "preTokenBalances": pre_token,
                "postTokenBalances": post_token
            }
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn test_token_buy_classification() {
        let tx = tx_fixture(
            2_000_000_000,
            1_500_000_000,
            vec![],
            vec![TokenRecord {
                account_index: 1,
                mint: "MintAAA",
                owner: Some(WALLET),
                pre: Some("100"),
                post: "600",
                decimals: 2,
            }],
        );
        let resolver = StaticResolver::default();

        let trades = classify_token_trades(&tx, WALLET, &resolver).await;
        assert_eq!(trades.len(), 1);
        assert_eq!(trades[0].side, TradeSide::Buy);
        assert_eq!(trades[0].amount, 5.0);
        assert_eq!(trades[0].price_sol, 0.5);
        assert_eq!(trades[0].mint, "MintAAA");
        assert_eq!(trades[0].timestamp_ms, 1_700_000_000_000);
    }

    #[tokio::test]
    async fn test_token_sell_classification() {
        let tx = tx_fixture(
            1_500_000_000,
            2_000_000_000,
            vec![],
            vec![TokenRecord {
                account_index: 1,
                mint: "MintAAA",
                owner: Some(WALLET),
                pre: Some("600"),
                post: "100",
                decimals: 2,
            }],
        );
        let resolver = StaticResolver::default();

        let trades = classify_token_trades(&tx, WALLET, &resolver).await;
        assert_eq!(trades.len(), 1);
        assert_eq!(trades[0].side, TradeSide::Sell);
        assert_eq!(trades[0].amount, 5.0);
    }

    #[tokio::test]
    async fn test_missing_pre_record_is_buy_from_zero() {
        let tx = tx_fixture(
            2_000_000_000,
            1_000_000_000,
            vec![],
            vec![TokenRecord {
                account_index: 1,
                mint: "MintNew",
                owner: Some(WALLET),
                pre: None,
                post: "1000000",
                decimals: 6,
            }],
        );
        let resolver = StaticResolver::default();

        let trades = classify_token_trades(&tx, WALLET, &resolver).await;
        assert_eq!(trades.len(), 1);
        assert_eq!(trades[0].side, TradeSide::Buy);
        assert_eq!(trades[0].amount, 1.0);
    }

    #[tokio::test]
    async fn test_other_wallets_records_are_skipped() {
        let tx = tx_fixture(
            2_000_000_000,
            1_500_000_000,
            vec![],
            vec![TokenRecord {
                account_index: 1,
                mint: "MintAAA",
                owner: Some("SomeoneElse"),
                pre: Some("0"),
                post: "500",
                decimals: 2,
            }],
        );
        let resolver = StaticResolver::default();

        let trades = classify_token_trades(&tx, WALLET, &resolver).await;
        assert!(trades.is_empty());
    }

    #[tokio::test]
    async fn test_owner_resolved_via_resolver_when_field_absent() {
        let tx = tx_fixture(
            2_000_000_000,
            1_500_000_000,
            vec![],
            vec![TokenRecord {
                account_index: 1,
                mint: "MintAAA",
                owner: None,
                pre: Some("0"),
                post: "500",
                decimals: 2,
            }],
        );
        let mut resolver = StaticResolver::default();
        resolver.owners.insert(
            "TokenAccountBBB".to_string(),
            TokenAccountInfo {
                owner: WALLET.to_string(),
                mint: "MintAAA".to_string(),
            },
        );

        let trades = classify_token_trades(&tx, WALLET, &resolver).await;
        assert_eq!(trades.len(), 1);
    }

    #[tokio::test]
    async fn test_resolver_failure_skips_record_not_transaction() {
        let tx = tx_fixture(
            2_000_000_000,
            1_500_000_000,
            vec![],
            vec![
                TokenRecord {
                    account_index: 1,
                    mint: "MintAAA",
                    owner: None, // resolver has no entry -> per-record failure
                    pre: Some("0"),
                    post: "500",
                    decimals: 2,
                },
                TokenRecord {
                    account_index: 2,
                    mint: "MintBBB",
                    owner: Some(WALLET),
                    pre: Some("0"),
                    post: "300",
                    decimals: 2,
                },
            ],
        );
        let resolver = StaticResolver::default();

        let trades = classify_token_trades(&tx, WALLET, &resolver).await;
        assert_eq!(trades.len(), 1);
        assert_eq!(trades[0].mint, "MintBBB");
    }

    #[tokio::test]
    async fn test_unresolvable_wallet_classifies_nothing() {
        let tx = tx_fixture(
            2_000_000_000,
            1_500_000_000,
            vec![],
            vec![TokenRecord {
                account_index: 1,
                mint: "MintAAA",
                owner: Some(WALLET),
                pre: Some("0"),
                post: "500",
                decimals: 2,
            }],
        );
        let resolver = StaticResolver::default();

        let trades = classify_token_trades(&tx, "NotInTransaction", &resolver).await;
        assert!(trades.is_empty());
    }

    #[tokio::test]
    async fn test_nft_buy_classification() {
        let tx = tx_fixture(
            3_000_000_000,
            1_000_000_000,
            vec![NFT_PROGRAM],
            vec![TokenRecord {
                account_index: 1,
                mint: "NftMint",
                owner: Some(WALLET),
                pre: Some("0"),
                post: "1",
                decimals: 0,
            }],
        );
        let mut resolver = StaticResolver::default();
        resolver.supplies.insert("NftMint".to_string(), 1);
        resolver
            .collections
            .insert("NftMint".to_string(), "CoolApes".to_string());

        let trades = classify_nft_trades(&tx, WALLET, &resolver).await;
        assert_eq!(trades.len(), 1);
        assert_eq!(trades[0].side, TradeSide::Buy);
        assert_eq!(trades[0].price_sol, 2.0);
        assert_eq!(trades[0].collection, "CoolApes");
    }

    #[tokio::test]
    async fn test_nft_sell_uses_positive_delta() {
        let tx = tx_fixture(
            1_000_000_000,
            3_000_000_000,
            vec![NFT_PROGRAM],
            vec![TokenRecord {
                account_index: 1,
                mint: "NftMint",
                owner: Some(WALLET),
                pre: Some("1"),
                post: "0",
                decimals: 0,
            }],
        );
        let mut resolver = StaticResolver::default();
        resolver.supplies.insert("NftMint".to_string(), 1);

        let trades = classify_nft_trades(&tx, WALLET, &resolver).await;
        assert_eq!(trades.len(), 1);
        assert_eq!(trades[0].side, TradeSide::Sell);
        assert_eq!(trades[0].collection, UNKNOWN_COLLECTION);
    }

    #[tokio::test]
    async fn test_fungible_supply_fails_nft_signal() {
        let tx = tx_fixture(
            3_000_000_000,
            1_000_000_000,
            vec![NFT_PROGRAM],
            vec![TokenRecord {
                account_index: 1,
                mint: "FungibleMint",
                owner: Some(WALLET),
                pre: Some("0"),
                post: "1000",
                decimals: 6,
            }],
        );
        let mut resolver = StaticResolver::default();
        resolver.supplies.insert("FungibleMint".to_string(), 1_000_000_000);

        let trades = classify_nft_trades(&tx, WALLET, &resolver).await;
        assert!(trades.is_empty());
    }

    #[tokio::test]
    async fn test_no_nft_program_means_no_nft_trades() {
        let tx = tx_fixture(
            3_000_000_000,
            1_000_000_000,
            vec![],
            vec![TokenRecord {
                account_index: 1,
                mint: "NftMint",
                owner: Some(WALLET),
                pre: Some("0"),
                post: "1",
                decimals: 0,
            }],
        );
        let mut resolver = StaticResolver::default();
        resolver.supplies.insert("NftMint".to_string(), 1);

        let trades = classify_nft_trades(&tx, WALLET, &resolver).await;
        assert!(trades.is_empty());
    }

    #[tokio::test]
    async fn test_zero_wallet_delta_means_no_nft_trade() {
        let tx = tx_fixture(
            1_000_000_000,
            1_000_000_000,
            vec![NFT_PROGRAM],
            vec![TokenRecord {
                account_index: 1,
                mint: "NftMint",
                owner: Some(WALLET),
                pre: Some("0"),
                post: "1",
                decimals: 0,
            }],
        );
        let mut resolver = StaticResolver::default();
        resolver.supplies.insert("NftMint".to_string(), 1);

        let trades = classify_nft_trades(&tx, WALLET, &resolver).await;
        assert!(trades.is_empty());
    }

    #[tokio::test]
    async fn test_supply_failure_skips_record() {
        let tx = tx_fixture(
            3_000_000_000,
            1_000_000_000,
            vec![NFT_PROGRAM],
            vec![TokenRecord {
                account_index: 1,
                mint: "NftMint",
                owner: Some(WALLET),
                pre: Some("0"),
                post: "1",
                decimals: 0,
            }],
        );
        let resolver = StaticResolver {
            fail_supply: true,
            ..StaticResolver::default()
        };

        let trades = classify_nft_trades(&tx, WALLET, &resolver).await;
        assert!(trades.is_empty());
    }

    #[test]
    fn test_log_entry_and_kind() {
        let tx = tx_fixture(
            2_000_000_000,
            1_500_000_000,
            vec![],
            vec![TokenRecord {
                account_index: 1,
                mint: "MintAAA",
                owner: Some(WALLET),
                pre: Some("0"),
                post: "500",
                decimals: 2,
            }],
        );
        let entry = log_entry_for(&tx, WALLET).unwrap();
        assert_eq!(entry.kind, TransactionKind::TokenTransfer);
        assert_eq!(entry.balance_change_sol, -0.5);
        assert_eq!(entry.post_balance_sol, 1.5);
        assert_eq!(entry.signature, "sig-classify");
    }

    #[test]
    fn test_log_entry_kinds_for_sol_and_nft() {
        let sol_tx = tx_fixture(2_000_000_000, 1_500_000_000, vec![], vec![]);
        assert_eq!(
            log_entry_for(&sol_tx, WALLET).unwrap().kind,
            TransactionKind::SolTransfer
        );

        let nft_tx = tx_fixture(2_000_000_000, 1_500_000_000, vec![NFT_PROGRAM], vec![]);
        assert_eq!(
            log_entry_for(&nft_tx, WALLET).unwrap().kind,
            TransactionKind::NftTransaction
        );
    }

    #[test]
    fn test_log_entry_absent_without_wallet_index() {
        let tx = tx_fixture(2_000_000_000, 1_500_000_000, vec![], vec![]);
        assert!(log_entry_for(&tx, "NotInTransaction").is_none());
    }
}
