//! Network registry

use super::constants::networks;

/// Chain-specific details for a known network
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkConfig {
    /// Chain ID for the network
    pub chain_id: u64,
    /// USDC contract address
    pub usdc_contract: String,
    /// EIP-712 domain name of the USDC contract
    pub usdc_name: String,
    /// Network name
    pub name: String,
    /// Whether this is a testnet
    pub is_testnet: bool,
}

impl NetworkConfig {
    fn known(name: &str, chain_id: u64, usdc_name: &str, is_testnet: bool) -> Self {
        Self {
            chain_id,
            usdc_contract: networks::get_usdc_address(name)
                .unwrap_or_default()
                .to_string(),
            usdc_name: usdc_name.to_string(),
            name: name.to_string(),
            is_testnet,
        }
    }

    /// Base mainnet configuration
    pub fn base_mainnet() -> Self {
        Self::known(networks::BASE_MAINNET, 8453, "USD Coin", false)
    }

    /// Base Sepolia testnet configuration
    pub fn base_sepolia() -> Self {
        Self::known(networks::BASE_SEPOLIA, 84532, "USDC", true)
    }

    /// Avalanche mainnet configuration
    pub fn avalanche_mainnet() -> Self {
        Self::known(networks::AVALANCHE_MAINNET, 43114, "USD Coin", false)
    }

    /// Avalanche Fuji testnet configuration
    pub fn avalanche_fuji() -> Self {
        Self::known(networks::AVALANCHE_FUJI, 43113, "USD Coin", true)
    }

    /// Get network config by name
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            networks::BASE_MAINNET => Some(Self::base_mainnet()),
            networks::BASE_SEPOLIA => Some(Self::base_sepolia()),
            networks::AVALANCHE_MAINNET => Some(Self::avalanche_mainnet()),
            networks::AVALANCHE_FUJI => Some(Self::avalanche_fuji()),
            _ => None,
        }
    }
}

/// Check a declared chain id against the registry.
///
/// Unknown networks accept any chain id; known networks must match exactly.
pub fn chain_id_matches(network: &str, chain_id: u64) -> bool {
    NetworkConfig::from_name(network).map_or(true, |config| config.chain_id == chain_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_networks() {
        let base = NetworkConfig::from_name("base").unwrap();
        assert_eq!(base.chain_id, 8453);
        assert_eq!(
            base.usdc_contract,
            "0x833589fCD6eDb6E08f4c7C32D4f71b54bdA02913"
        );
        assert!(!base.is_testnet);

        let sepolia = NetworkConfig::from_name("base-sepolia").unwrap();
        assert_eq!(sepolia.chain_id, 84532);
        assert_eq!(sepolia.usdc_name, "USDC");
        assert!(sepolia.is_testnet);

        assert!(NetworkConfig::from_name("unknown").is_none());
    }

    #[test]
    fn test_chain_id_matches() {
        assert!(chain_id_matches("base", 8453));
        assert!(!chain_id_matches("base", 84532));
        assert!(chain_id_matches("private-devnet", 1001));
    }
}
