/// Program IDs for transaction classification
///
/// Contains the program ids needed to recognize NFT marketplace activity and
/// to exclude system accounts from counterparty attribution. The NFT
/// allow-list is a data table (program id, marketplace name) so new
/// marketplaces can be added without touching classification logic.

// =============================================================================
// CORE PROGRAM IDS
// =============================================================================

/// System program (also the no-op target of many instructions)
pub const SYSTEM_PROGRAM_ID: &str = "11111111111111111111111111111111";

/// SPL Token program
pub const TOKEN_PROGRAM_ID: &str = "TokenkegQfeZyiNwAJbNbGKPFXCWuBvf9Ss623VQ5DA";

/// Token Extensions program (Token-2022)
pub const TOKEN_2022_PROGRAM_ID: &str = "TokenzQdBNbLqP5VEhdkAS6EPFLC1PHnBqCXEpPxuEb";

// =============================================================================
// NFT MARKETPLACE / METADATA PROGRAM TABLE
// =============================================================================

/// Known NFT marketplace and metadata programs. A transaction touching any
/// of these is treated as NFT-related by the classifier.
pub const NFT_PROGRAMS: &[(&str, &str)] = &[
    ("metaqbxxUerdq28cj1RbAWkYQm3ybzjb6a8bt518x1s", "Metaplex Token Metadata"),
    ("p1exdMJcjVao65QdewkaZRUnU6VPSXhus9n2GzWfh98", "Metaplex Auction"),
    ("meshj2Qsd9TyZG8rGK3U4yZxh1zHqZ9MJsAVK4Fd7zZ", "Magic Eden v2"),
    ("M2mx93ekt1fmXSVkTrUL9xVFHkmME8HTUi5Cyc5aF7K", "Magic Eden v1"),
    ("TSWAPaqyCSx2KABk68Shruf4rp7CxcNi8hAsbdwmHbN", "Tensor Swap"),
];

/// Marketplace name for a program id, if it is a known NFT program
pub fn nft_marketplace_name(program_id: &str) -> Option<&'static str> {
    NFT_PROGRAMS
        .iter()
        .find(|(id, _)| *id == program_id)
        .map(|(_, name)| *name)
}

/// Check whether a program id belongs to the NFT allow-list
pub fn is_nft_program(program_id: &str) -> bool {
    nft_marketplace_name(program_id).is_some()
}

/// Check whether a program id is an SPL token program (classic or 2022)
pub fn is_token_program(program_id: &str) -> bool {
    program_id == TOKEN_PROGRAM_ID || program_id == TOKEN_2022_PROGRAM_ID
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nft_program_lookup() {
        assert_eq!(
            nft_marketplace_name("meshj2Qsd9TyZG8rGK3U4yZxh1zHqZ9MJsAVK4Fd7zZ"),
            Some("Magic Eden v2")
        );
        assert!(is_nft_program("metaqbxxUerdq28cj1RbAWkYQm3ybzjb6a8bt518x1s"));
        assert!(!is_nft_program(SYSTEM_PROGRAM_ID));
    }

    #[test]
    fn test_token_program_check() {
        assert!(is_token_program(TOKEN_PROGRAM_ID));
        assert!(is_token_program(TOKEN_2022_PROGRAM_ID));
        assert!(!is_token_program(SYSTEM_PROGRAM_ID));
    }
}
