//! Common constants for networks and schemes

/// Known network identifiers
pub mod networks {
    /// Base mainnet
    pub const BASE_MAINNET: &str = "base";
    /// Base Sepolia testnet
    pub const BASE_SEPOLIA: &str = "base-sepolia";
    /// Avalanche C-Chain mainnet
    pub const AVALANCHE_MAINNET: &str = "avalanche";
    /// Avalanche Fuji testnet
    pub const AVALANCHE_FUJI: &str = "avalanche-fuji";

    /// Get USDC contract address for a network
    pub fn get_usdc_address(network: &str) -> Option<&'static str> {
        match network {
            BASE_MAINNET => Some("0x833589fCD6eDb6E08f4c7C32D4f71b54bdA02913"),
            BASE_SEPOLIA => Some("0x036CbD53842c5426634e7929541eC2318f3dCF7e"),
            AVALANCHE_MAINNET => Some("0xB97EF9Ef8734C71904D8002F8b6Bc66Dd9c48a6E"),
            AVALANCHE_FUJI => Some("0x5425890298aed601595a70AB815c96711a31Bc65"),
            _ => None,
        }
    }

    /// Check if a network is in the built-in registry
    pub fn is_known(network: &str) -> bool {
        matches!(
            network,
            BASE_MAINNET | BASE_SEPOLIA | AVALANCHE_MAINNET | AVALANCHE_FUJI
        )
    }
}

/// Payment schemes
pub mod schemes {
    /// EIP-3009 transfer with authorization
    pub const TRANSFER_WITH_AUTHORIZATION: &str = "transfer-with-authorization";
}

/// HTTP header carrying the base64 payment payload
pub const PAYMENT_HEADER: &str = "X-PAYMENT";

/// HTTP header carrying the base64 settlement outcome
pub const PAYMENT_RESPONSE_HEADER: &str = "X-PAYMENT-RESPONSE";

/// Domain version used when neither the requirement nor configuration sets one
pub const DEFAULT_DOMAIN_VERSION: &str = "2";
