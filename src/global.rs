use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Runtime configuration loaded from configs.json
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Configs {
    pub rpc_url: String,
    #[serde(default)]
    pub rpc_fallbacks: Vec<String>,
}

impl Default for Configs {
    fn default() -> Self {
        Self {
            rpc_url: "https://api.mainnet-beta.solana.com".to_string(),
            rpc_fallbacks: Vec::new(),
        }
    }
}

/// Reads a configs.json file and returns a Configs object
pub fn read_configs<P: AsRef<Path>>(path: P) -> Result<Configs, Box<dyn std::error::Error>> {
    let data = fs::read_to_string(path)?;
    let configs: Configs = serde_json::from_str(&data)?;
    Ok(configs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let configs = Configs::default();
        assert!(configs.rpc_url.starts_with("https://"));
        assert!(configs.rpc_fallbacks.is_empty());
    }

    #[test]
    fn test_config_deserialization() {
        let json = r#"{"rpc_url":"https://example.com","rpc_fallbacks":["https://backup.example.com"]}"#;
        let configs: Configs = serde_json::from_str(json).unwrap();
        assert_eq!(configs.rpc_url, "https://example.com");
        assert_eq!(configs.rpc_fallbacks.len(), 1);
    }
}
