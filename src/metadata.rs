/// On-chain metadata resolution
///
/// Looks up the facts the classifier needs about token accounts and mints:
/// the wallet owning a token account, a mint's total supply, and the
/// collection a mint belongs to. Backed by the RPC client with per-process
/// in-memory caches; trait-based so tests can substitute a deterministic
/// fake.
use async_trait::async_trait;
use solana_sdk::pubkey::Pubkey;
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::RwLock;

use crate::logger::{self, LogTag};
use crate::rpc::{RpcClient, RpcError};

/// Metaplex Token Metadata program
pub const TOKEN_METADATA_PROGRAM_ID: &str = "metaqbxxUerdq28cj1RbAWkYQm3ybzjb6a8bt518x1s";

#[derive(Debug, Error)]
pub enum MetadataError {
    #[error("account not found: {0}")]
    AccountNotFound(String),
    #[error("unparsable account data: {0}")]
    Unparsable(String),
    #[error(transparent)]
    Rpc(#[from] RpcError),
}

/// Ownership facts for one SPL token account
#[derive(Debug, Clone)]
pub struct TokenAccountInfo {
    pub owner: String,
    pub mint: String,
}

/// External collaborator interface consumed by the classifier
#[async_trait]
pub trait MetadataResolver: Send + Sync {
    /// Resolve the wallet owning a token account, plus its mint
    async fn token_account_owner(&self, account: &str) -> Result<TokenAccountInfo, MetadataError>;

    /// Resolve a mint's total supply in raw units
    async fn mint_supply(&self, mint: &str) -> Result<u64, MetadataError>;

    /// Resolve the collection a mint belongs to, if any
    async fn collection(&self, mint: &str) -> Result<Option<String>, MetadataError>;
}

// =============================================================================
// RPC-BACKED RESOLVER
// =============================================================================

pub struct RpcMetadataResolver {
    rpc: Arc<RpcClient>,
    owner_cache: RwLock<HashMap<String, TokenAccountInfo>>,
    supply_cache: RwLock<HashMap<String, u64>>,
    collection_cache: RwLock<HashMap<String, Option<String>>>,
}

impl RpcMetadataResolver {
    pub fn new(rpc: Arc<RpcClient>) -> Self {
        Self {
            rpc,
            owner_cache: RwLock::new(HashMap::new()),
            supply_cache: RwLock::new(HashMap::new()),
            collection_cache: RwLock::new(HashMap::new()),
        }
    }

    /// Derive the Metaplex metadata account address for a mint
    fn metadata_account_for(mint: &str) -> Result<String, MetadataError> {
        let program = Pubkey::from_str(TOKEN_METADATA_PROGRAM_ID)
            .map_err(|e| MetadataError::Unparsable(format!("metadata program id: {}", e)))?;
        let mint_key = Pubkey::from_str(mint)
            .map_err(|e| MetadataError::Unparsable(format!("mint address {}: {}", mint, e)))?;

        let (address, _bump) = Pubkey::find_program_address(
            &[b"metadata", program.as_ref(), mint_key.as_ref()],
            &program,
        );
        Ok(address.to_string())
    }
}

#[async_trait]
impl MetadataResolver for RpcMetadataResolver {
    async fn token_account_owner(&self, account: &str) -> Result<TokenAccountInfo, MetadataError> {
        if let Some(cached) = self.owner_cache.read().await.get(account) {
            return Ok(cached.clone());
        }

        let value = self
            .rpc
            .get_parsed_account(account)
            .await?
            .ok_or_else(|| MetadataError::AccountNotFound(account.to_string()))?;

        let info = value
            .get("data")
            .and_then(|d| d.get("parsed"))
            .and_then(|p| p.get("info"))
            .ok_or_else(|| MetadataError::Unparsable(format!("token account {}", account)))?;

        let owner = info
            .get("owner")
            .and_then(|o| o.as_str())
            .ok_or_else(|| MetadataError::Unparsable(format!("token account owner {}", account)))?;
        let mint = info
            .get("mint")
            .and_then(|m| m.as_str())
            .ok_or_else(|| MetadataError::Unparsable(format!("token account mint {}", account)))?;

        let resolved = TokenAccountInfo {
            owner: owner.to_string(),
            mint: mint.to_string(),
        };

        self.owner_cache
            .write()
            .await
            .insert(account.to_string(), resolved.clone());
        Ok(resolved)
    }

    async fn mint_supply(&self, mint: &str) -> Result<u64, MetadataError> {
        if let Some(cached) = self.supply_cache.read().await.get(mint) {
            return Ok(*cached);
        }

        let supply = self.rpc.get_token_supply(mint).await?;
        self.supply_cache
            .write()
            .await
            .insert(mint.to_string(), supply);
        Ok(supply)
    }

    async fn collection(&self, mint: &str) -> Result<Option<String>, MetadataError> {
        if let Some(cached) = self.collection_cache.read().await.get(mint) {
            return Ok(cached.clone());
        }

        let metadata_account = Self::metadata_account_for(mint)?;
        let collection = match self.rpc.get_account_data(&metadata_account).await? {
            Some(data) => match parse_collection_key(&data) {
                Ok(key) => key,
                Err(e) => {
                    logger::debug(
                        LogTag::Metadata,
                        &format!("metadata for {} unparsable: {}", mint, e),
                    );
                    None
                }
            },
            None => None,
        };

        self.collection_cache
            .write()
            .await
            .insert(mint.to_string(), collection.clone());
        Ok(collection)
    }
}

// =============================================================================
// METADATA ACCOUNT PARSING
// =============================================================================

/// Sequential reader over borsh-encoded account data
struct ByteWalker<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> ByteWalker<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8], MetadataError> {
        if self.pos + len > self.data.len() {
            return Err(MetadataError::Unparsable(format!(
                "truncated at offset {} (need {} bytes)",
                self.pos, len
            )));
        }
        let slice = &self.data[self.pos..self.pos + len];
        self.pos += len;
        Ok(slice)
    }

    fn read_u8(&mut self) -> Result<u8, MetadataError> {
        Ok(self.take(1)?[0])
    }

    fn read_u32(&mut self) -> Result<u32, MetadataError> {
        let bytes = self.take(4)?;
        Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    /// Borsh string: u32 length prefix + bytes
    fn skip_string(&mut self) -> Result<(), MetadataError> {
        let len = self.read_u32()? as usize;
        self.take(len)?;
        Ok(())
    }
}

/// Walk a Metaplex metadata account and extract the collection key.
///
/// Layout (in field order): key u8, update_authority 32, mint 32,
/// name/symbol/uri strings, seller_fee u16, creators Option<Vec<34 bytes>>,
/// primary_sale u8, is_mutable u8, edition_nonce Option<u8>,
/// token_standard Option<u8>, collection Option<{verified u8, key 32}>.
pub fn parse_collection_key(data: &[u8]) -> Result<Option<String>, MetadataError> {
    let mut walker = ByteWalker::new(data);

    walker.read_u8()?; // key
    walker.take(32)?; // update_authority
    walker.take(32)?; // mint
    walker.skip_string()?; // name
    walker.skip_string()?; // symbol
    walker.skip_string()?; // uri
    walker.take(2)?; // seller_fee_basis_points

    if walker.read_u8()? == 1 {
        let creator_count = walker.read_u32()? as usize;
        walker.take(creator_count.saturating_mul(34))?; // address + verified + share
    }

    walker.read_u8()?; // primary_sale_happened
    walker.read_u8()?; // is_mutable

    if walker.read_u8()? == 1 {
        walker.read_u8()?; // edition_nonce
    }
    if walker.read_u8()? == 1 {
        walker.read_u8()?; // token_standard
    }

    if walker.read_u8()? == 1 {
        walker.read_u8()?; // verified
        let key = walker.take(32)?;
        return Ok(Some(bs58::encode(key).into_string()));
    }

    Ok(None)
}
