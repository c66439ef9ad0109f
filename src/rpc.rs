/// Centralized RPC client for Solana
///
/// Raw JSON-RPC over HTTP against a main endpoint with optional fallback
/// endpoints. Fallbacks are only consulted on rate-limit (429) responses or
/// transport failures; RPC-level errors from a healthy endpoint are final.
///
/// All transaction queries use the jsonParsed encoding so that account keys
/// carry signer flags and instructions carry resolved program ids.
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;
use thiserror::Error;
use tokio::time::sleep;

use crate::global::Configs;
use crate::logger::{self, format_signature_short, LogTag};

/// Lamports per SOL, the chain's native display divisor
pub const LAMPORTS_PER_SOL: u64 = 1_000_000_000;

/// Converts lamports to SOL amount
pub fn lamports_to_sol(lamports: u64) -> f64 {
    (lamports as f64) / (LAMPORTS_PER_SOL as f64)
}

/// Converts a signed lamport delta to SOL
pub fn lamports_delta_to_sol(lamports: i64) -> f64 {
    (lamports as f64) / (LAMPORTS_PER_SOL as f64)
}

/// Converts SOL amount to lamports
pub fn sol_to_lamports(sol_amount: f64) -> u64 {
    (sol_amount * (LAMPORTS_PER_SOL as f64)) as u64
}

// =============================================================================
// ERROR TYPES
// =============================================================================

#[derive(Debug, Error)]
pub enum RpcError {
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("rpc error response: {0}")]
    Rpc(String),
    #[error("invalid response: {0}")]
    InvalidResponse(String),
    #[error("all endpoints rate limited or unreachable")]
    AllEndpointsFailed,
}

pub type RpcResult<T> = Result<T, RpcError>;

// =============================================================================
// WIRE MODEL (jsonParsed getTransaction response)
// =============================================================================

/// One entry from getSignaturesForAddress
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignatureRecord {
    pub signature: String,
    pub slot: Option<u64>,
    #[serde(rename = "blockTime")]
    pub block_time: Option<i64>,
    #[serde(default)]
    pub err: Option<Value>,
}

/// Full transaction details from getTransaction
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionDetails {
    pub slot: u64,
    #[serde(rename = "blockTime")]
    pub block_time: Option<i64>,
    pub transaction: TransactionData,
    pub meta: Option<TransactionMeta>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionData {
    pub message: ParsedMessage,
    pub signatures: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParsedMessage {
    #[serde(rename = "accountKeys")]
    pub account_keys: Vec<AccountKey>,
    #[serde(default)]
    pub instructions: Vec<ParsedInstruction>,
}

/// Account entry with signer/writable flags (jsonParsed encoding)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountKey {
    pub pubkey: String,
    #[serde(default)]
    pub signer: bool,
    #[serde(default)]
    pub writable: bool,
}

/// Instruction with resolved program id; `parsed` is present for programs
/// the RPC node knows how to decode
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParsedInstruction {
    #[serde(rename = "programId")]
    pub program_id: Option<String>,
    #[serde(default)]
    pub program: Option<String>,
    #[serde(default)]
    pub parsed: Option<Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionMeta {
    pub err: Option<Value>,
    pub fee: u64,
    #[serde(rename = "preBalances")]
    pub pre_balances: Vec<u64>,
    #[serde(rename = "postBalances")]
    pub post_balances: Vec<u64>,
    #[serde(rename = "preTokenBalances")]
    pub pre_token_balances: Option<Vec<TokenBalance>>,
    #[serde(rename = "postTokenBalances")]
    pub post_token_balances: Option<Vec<TokenBalance>>,
    #[serde(rename = "logMessages")]
    pub log_messages: Option<Vec<String>>,
}

/// Token balance snapshot tagged with the owning account entry's index
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenBalance {
    #[serde(rename = "accountIndex")]
    pub account_index: u32,
    pub mint: String,
    pub owner: Option<String>,
    #[serde(rename = "uiTokenAmount")]
    pub ui_token_amount: UiTokenAmount,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UiTokenAmount {
    pub amount: String,
    pub decimals: u8,
    #[serde(rename = "uiAmount")]
    pub ui_amount: Option<f64>,
    #[serde(rename = "uiAmountString")]
    pub ui_amount_string: Option<String>,
}

impl TokenBalance {
    /// Raw integer amount; malformed strings read as zero
    pub fn raw_amount(&self) -> i128 {
        self.ui_token_amount.amount.parse::<i128>().unwrap_or(0)
    }
}

// =============================================================================
// CALL STATISTICS
// =============================================================================

/// Per-URL and per-method call counters
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RpcStats {
    pub calls_per_url: HashMap<String, u64>,
    pub calls_per_method: HashMap<String, u64>,
}

impl RpcStats {
    pub fn record_call(&mut self, url: &str, method: &str) {
        *self.calls_per_url.entry(url.to_string()).or_insert(0) += 1;
        *self.calls_per_method.entry(method.to_string()).or_insert(0) += 1;
    }

    pub fn total_calls(&self) -> u64 {
        self.calls_per_url.values().sum()
    }
}

// =============================================================================
// RPC CLIENT
// =============================================================================

pub struct RpcClient {
    client: Client,
    rpc_url: String,
    fallback_urls: Vec<String>,
    max_retries: usize,
    retry_base_delay_ms: u64,
    stats: Mutex<RpcStats>,
}

impl RpcClient {
    pub fn new(rpc_url: &str) -> Self {
        Self {
            client: Client::new(),
            rpc_url: rpc_url.to_string(),
            fallback_urls: Vec::new(),
            max_retries: 3,
            retry_base_delay_ms: 1000,
            stats: Mutex::new(RpcStats::default()),
        }
    }

    pub fn from_configs(configs: &Configs) -> Self {
        let mut client = Self::new(&configs.rpc_url);
        client.fallback_urls = configs.rpc_fallbacks.clone();
        client
    }

    pub fn url(&self) -> &str {
        &self.rpc_url
    }

    pub fn get_stats(&self) -> RpcStats {
        self.stats
            .lock()
            .map(|s| s.clone())
            .unwrap_or_default()
    }

    fn record_call(&self, url: &str, method: &str) {
        if let Ok(mut stats) = self.stats.lock() {
            stats.record_call(url, method);
        }
    }

    fn is_rate_limit_error(message: &str) -> bool {
        message.contains("429") || message.to_lowercase().contains("too many requests")
    }

    /// Issue one JSON-RPC call against a specific endpoint
    async fn post_rpc_once(&self, url: &str, method: &str, params: Value) -> RpcResult<Value> {
        self.record_call(url, method);

        let payload = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": method,
            "params": params,
        });

        let response = self
            .client
            .post(url)
            .header("Content-Type", "application/json")
            .json(&payload)
            .send()
            .await?;

        if response.status().as_u16() == 429 {
            return Err(RpcError::Rpc("429 too many requests".to_string()));
        }

        let body: Value = response.json().await?;

        if let Some(error) = body.get("error") {
            return Err(RpcError::Rpc(error.to_string()));
        }

        body.get("result")
            .cloned()
            .ok_or_else(|| RpcError::InvalidResponse("missing result field".to_string()))
    }

    /// Issue a JSON-RPC call with retry, exponential backoff, and fallback
    /// rotation on rate-limit or transport failures
    pub async fn post_rpc(&self, method: &str, params: Value) -> RpcResult<Value> {
        let mut attempts = 0;
        let mut delay = self.retry_base_delay_ms;

        loop {
            let mut rate_limited = false;

            match self.post_rpc_once(&self.rpc_url, method, params.clone()).await {
                Ok(result) => return Ok(result),
                Err(RpcError::Rpc(msg)) if Self::is_rate_limit_error(&msg) => {
                    rate_limited = true;
                    logger::warning(
                        LogTag::Rpc,
                        &format!("main endpoint rate limited for {}, trying fallbacks", method),
                    );
                }
                Err(RpcError::Network(e)) => {
                    rate_limited = true;
                    logger::warning(
                        LogTag::Rpc,
                        &format!("main endpoint unreachable for {}: {}", method, e),
                    );
                }
                Err(e) => return Err(e),
            }

            if rate_limited {
                for url in &self.fallback_urls {
                    match self.post_rpc_once(url, method, params.clone()).await {
                        Ok(result) => return Ok(result),
                        Err(e) => {
                            logger::debug(
                                LogTag::Rpc,
                                &format!("fallback {} failed for {}: {}", url, method, e),
                            );
                        }
                    }
                }
            }

            attempts += 1;
            if attempts >= self.max_retries {
                return Err(RpcError::AllEndpointsFailed);
            }

            logger::warning(
                LogTag::Rpc,
                &format!(
                    "{} attempt {} failed, retrying in {}ms",
                    method, attempts, delay
                ),
            );
            sleep(Duration::from_millis(delay)).await;
            delay *= 2;
        }
    }

    // =========================================================================
    // TYPED METHODS
    // =========================================================================

    /// Fetch a page of signatures for an address, newest first.
    /// `before` is the pagination cursor for historical backfill.
    pub async fn get_signatures_for_address(
        &self,
        address: &str,
        limit: usize,
        before: Option<&str>,
    ) -> RpcResult<Vec<SignatureRecord>> {
        let mut options = json!({ "limit": limit });
        if let Some(cursor) = before {
            options["before"] = json!(cursor);
        }

        let result = self
            .post_rpc("getSignaturesForAddress", json!([address, options]))
            .await?;

        serde_json::from_value(result)
            .map_err(|e| RpcError::InvalidResponse(format!("signature list: {}", e)))
    }

    /// Fetch full transaction details. Returns Ok(None) when the ledger has
    /// no record of the signature (absent, not an error).
    pub async fn get_transaction(&self, signature: &str) -> RpcResult<Option<TransactionDetails>> {
        let params = json!([
            signature,
            { "encoding": "jsonParsed", "maxSupportedTransactionVersion": 0 }
        ]);

        let result = self.post_rpc("getTransaction", params).await?;

        if result.is_null() {
            logger::debug(
                LogTag::Rpc,
                &format!("transaction not found: {}", format_signature_short(signature)),
            );
            return Ok(None);
        }

        let details: TransactionDetails = serde_json::from_value(result)
            .map_err(|e| RpcError::InvalidResponse(format!("transaction details: {}", e)))?;
        Ok(Some(details))
    }

    /// Fetch jsonParsed account info; Ok(None) when the account does not exist
    pub async fn get_parsed_account(&self, address: &str) -> RpcResult<Option<Value>> {
        let result = self
            .post_rpc(
                "getAccountInfo",
                json!([address, { "encoding": "jsonParsed" }]),
            )
            .await?;

        let value = result.get("value").cloned().unwrap_or(Value::Null);
        if value.is_null() {
            return Ok(None);
        }
        Ok(Some(value))
    }

    /// Fetch raw base64 account data; Ok(None) when the account does not exist
    pub async fn get_account_data(&self, address: &str) -> RpcResult<Option<Vec<u8>>> {
        let result = self
            .post_rpc("getAccountInfo", json!([address, { "encoding": "base64" }]))
            .await?;

        let value = result.get("value").cloned().unwrap_or(Value::Null);
        if value.is_null() {
            return Ok(None);
        }

        let encoded = value
            .get("data")
            .and_then(|d| d.as_array())
            .and_then(|arr| arr.first())
            .and_then(|v| v.as_str())
            .ok_or_else(|| RpcError::InvalidResponse("missing account data".to_string()))?;

        use base64::{engine::general_purpose, Engine as _};
        general_purpose::STANDARD
            .decode(encoded)
            .map(Some)
            .map_err(|e| RpcError::InvalidResponse(format!("account data base64: {}", e)))
    }

    /// Fetch a mint's total supply in raw units
    pub async fn get_token_supply(&self, mint: &str) -> RpcResult<u64> {
        let result = self.post_rpc("getTokenSupply", json!([mint])).await?;

        result
            .get("value")
            .and_then(|v| v.get("amount"))
            .and_then(|a| a.as_str())
            .and_then(|s| s.parse::<u64>().ok())
            .ok_or_else(|| RpcError::InvalidResponse("missing token supply amount".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_lamports_conversion() {
        assert_eq!(lamports_to_sol(1_000_000_000), 1.0);
        assert_eq!(lamports_to_sol(500_000_000), 0.5);
        assert_eq!(lamports_delta_to_sol(-250_000_000), -0.25);
        assert_eq!(sol_to_lamports(2.5), 2_500_000_000);
    }

    #[test]
    fn test_transaction_details_deserialization() {
        let raw = json!({
            "slot": 12345,
            "blockTime": 1700000000,
            "transaction": {
                "signatures": ["sig1"],
                "message": {
                    "accountKeys": [
                        { "pubkey": "WalletAAA", "signer": true, "writable": true },
                        { "pubkey": "OtherBBB", "signer": false, "writable": true }
                    ],
                    "instructions": [
                        { "programId": "11111111111111111111111111111111" }
                    ]
                }
            },
            "meta": {
                "err": null,
                "fee": 5000,
                "preBalances": [1000000000u64, 0],
                "postBalances": [899995000u64, 100000000],
                "preTokenBalances": [],
                "postTokenBalances": [
                    {
                        "accountIndex": 1,
                        "mint": "MintCCC",
                        "owner": "WalletAAA",
                        "uiTokenAmount": {
                            "amount": "42",
                            "decimals": 0,
                            "uiAmount": 42.0,
                            "uiAmountString": "42"
                        }
                    }
                ]
            }
        });

        let details: TransactionDetails = serde_json::from_value(raw).unwrap();
        assert_eq!(details.slot, 12345);
        assert_eq!(details.transaction.message.account_keys.len(), 2);
        assert!(details.transaction.message.account_keys[0].signer);

        let meta = details.meta.unwrap();
        assert_eq!(meta.pre_balances[0], 1_000_000_000);
        let token = &meta.post_token_balances.unwrap()[0];
        assert_eq!(token.account_index, 1);
        assert_eq!(token.raw_amount(), 42);
    }

    #[test]
    fn test_raw_amount_malformed_string() {
        let balance = TokenBalance {
            account_index: 0,
            mint: "m".to_string(),
            owner: None,
            ui_token_amount: UiTokenAmount {
                amount: "not-a-number".to_string(),
                decimals: 6,
                ui_amount: None,
                ui_amount_string: None,
            },
        };
        assert_eq!(balance.raw_amount(), 0);
    }

    #[test]
    fn test_stats_recording() {
        let mut stats = RpcStats::default();
        stats.record_call("https://a", "getTransaction");
        stats.record_call("https://a", "getTransaction");
        stats.record_call("https://b", "getTokenSupply");
        assert_eq!(stats.total_calls(), 3);
        assert_eq!(stats.calls_per_method["getTransaction"], 2);
    }
}
