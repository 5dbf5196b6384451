//! Process-wide configuration
//!
//! Built once at startup (from code or from the environment) and shared read-only by
//! every request handler afterwards.

use crate::crypto::domain::DomainDefaults;
use crate::types::{networks, FacilitatorConfig, NetworkConfig, DEFAULT_FACILITATOR_URL};
use crate::{Result, X402Error};
use ethereum_types::U256;
use rust_decimal::Decimal;
use std::str::FromStr;
use std::time::Duration;

/// Default bound on a whole settlement attempt
pub const DEFAULT_SETTLEMENT_TIMEOUT: Duration = Duration::from_secs(60);
/// Default bound on waiting for a transaction receipt in direct mode
pub const DEFAULT_RECEIPT_TIMEOUT: Duration = Duration::from_secs(45);
/// Default bound on submitting a transaction in direct mode
pub const DEFAULT_SUBMIT_TIMEOUT: Duration = Duration::from_secs(15);

/// Price of one request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Price {
    /// Smallest token units
    Atomic(U256),
    /// Display units, converted with the token's decimals (e.g. 0.01 USDC with 6 decimals)
    Decimal { amount: Decimal, decimals: u32 },
}

impl Price {
    /// USDC-style price with 6 decimals
    pub fn usdc(amount: Decimal) -> Self {
        Price::Decimal {
            amount,
            decimals: 6,
        }
    }

    /// Amount in smallest token units
    pub fn to_atomic(&self) -> Result<U256> {
        let atomic = match self {
            Price::Atomic(value) => *value,
            Price::Decimal { amount, decimals } => {
                if *decimals > 18 {
                    return Err(X402Error::config(format!(
                        "Token decimals {} exceed 18",
                        decimals
                    )));
                }
                let scaled = amount
                    .checked_mul(Decimal::from(10u64.pow(*decimals)))
                    .ok_or_else(|| X402Error::config("Price overflows token units"))?
                    .normalize();
                if !scaled.fract().is_zero() {
                    return Err(X402Error::config(format!(
                        "Price {} is finer than {} decimals",
                        amount, decimals
                    )));
                }
                if scaled.is_sign_negative() {
                    return Err(X402Error::config("Price cannot be negative"));
                }
                U256::from_dec_str(&scaled.trunc().to_string())
                    .map_err(|_| X402Error::config(format!("Invalid price {}", amount)))?
            }
        };

        if atomic.is_zero() {
            return Err(X402Error::config("Price must be greater than zero"));
        }
        Ok(atomic)
    }
}

/// What the server charges and where the money goes
#[derive(Debug, Clone)]
pub struct PaymentConfig {
    /// Network identifier advertised to clients
    pub network: String,
    /// Chain id; required for networks outside the built-in registry
    pub chain_id: Option<u64>,
    /// Token contract; defaults to USDC on known networks
    pub asset: Option<String>,
    /// Recipient wallet address
    pub pay_to: String,
    /// Price per request
    pub price: Price,
    /// Token EIP-712 domain name; defaults to the registry's USDC name when the asset is USDC
    pub token_name: Option<String>,
    /// Token EIP-712 domain version
    pub token_version: Option<String>,
    /// Payment description
    pub description: Option<String>,
    /// MIME type of the expected response
    pub mime_type: Option<String>,
    /// Validity window a client should sign for, in seconds
    pub max_timeout_seconds: u64,
    /// Resource root URL for constructing full resource URLs
    pub resource_root_url: Option<String>,
}

impl PaymentConfig {
    /// Create a new payment config
    pub fn new(network: impl Into<String>, pay_to: impl Into<String>, price: Price) -> Self {
        Self {
            network: network.into(),
            chain_id: None,
            asset: None,
            pay_to: pay_to.into(),
            price,
            token_name: None,
            token_version: None,
            description: None,
            mime_type: None,
            max_timeout_seconds: 60,
            resource_root_url: None,
        }
    }

    /// Set the chain id
    pub fn with_chain_id(mut self, chain_id: u64) -> Self {
        self.chain_id = Some(chain_id);
        self
    }

    /// Set the token contract
    pub fn with_asset(mut self, asset: impl Into<String>) -> Self {
        self.asset = Some(asset.into());
        self
    }

    /// Set the token's EIP-712 domain name and version
    pub fn with_token_domain(mut self, name: impl Into<String>, version: impl Into<String>) -> Self {
        self.token_name = Some(name.into());
        self.token_version = Some(version.into());
        self
    }

    /// Set the payment description
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Set the MIME type
    pub fn with_mime_type(mut self, mime_type: impl Into<String>) -> Self {
        self.mime_type = Some(mime_type.into());
        self
    }

    /// Set the maximum timeout
    pub fn with_max_timeout_seconds(mut self, max_timeout_seconds: u64) -> Self {
        self.max_timeout_seconds = max_timeout_seconds;
        self
    }

    /// Set the resource root URL
    pub fn with_resource_root_url(mut self, url: impl Into<String>) -> Self {
        self.resource_root_url = Some(url.into());
        self
    }

    /// Chain id, from configuration or the network registry
    pub fn resolved_chain_id(&self) -> Result<u64> {
        match (self.chain_id, NetworkConfig::from_name(&self.network)) {
            (Some(chain_id), _) => Ok(chain_id),
            (None, Some(known)) => Ok(known.chain_id),
            (None, None) => Err(X402Error::NetworkNotSupported {
                network: self.network.clone(),
            }),
        }
    }

    /// Token contract, from configuration or the network's USDC
    pub fn resolved_asset(&self) -> Result<String> {
        match &self.asset {
            Some(asset) => Ok(asset.clone()),
            None => networks::get_usdc_address(&self.network)
                .map(str::to_string)
                .ok_or_else(|| {
                    X402Error::config(format!(
                        "No asset configured and network '{}' has no default token",
                        self.network
                    ))
                }),
        }
    }

    /// Process-level domain defaults
    pub fn domain_defaults(&self) -> DomainDefaults {
        let usdc_name = || {
            let known = NetworkConfig::from_name(&self.network)?;
            let is_usdc = self
                .asset
                .as_ref()
                .map_or(true, |asset| asset.eq_ignore_ascii_case(&known.usdc_contract));
            is_usdc.then_some(known.usdc_name)
        };

        DomainDefaults::new(
            self.token_name.clone().or_else(usdc_name),
            self.token_version.clone(),
        )
    }
}

/// How the server finalizes payments
#[derive(Debug, Clone)]
pub enum SettlementMode {
    /// Delegate verification/settlement to a facilitator service
    Facilitator(FacilitatorConfig),
    /// Call the token contract directly with the server's own key
    Direct(DirectSettlementConfig),
}

impl SettlementMode {
    pub fn name(&self) -> &'static str {
        match self {
            SettlementMode::Facilitator(_) => "facilitator",
            SettlementMode::Direct(_) => "direct",
        }
    }
}

/// Configuration of direct on-chain settlement
#[derive(Clone)]
pub struct DirectSettlementConfig {
    /// JSON-RPC endpoint of a node on the payment network
    pub rpc_url: String,
    /// Hex private key paying gas for settlement transactions
    pub private_key: String,
    /// Bound on signing the transaction, and separately on broadcasting it
    pub submit_timeout: Duration,
    /// Bound on waiting for the receipt
    pub receipt_timeout: Duration,
    /// Delay between receipt polls
    pub poll_interval: Duration,
}

impl std::fmt::Debug for DirectSettlementConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DirectSettlementConfig")
            .field("rpc_url", &self.rpc_url)
            .field("private_key", &"<redacted>")
            .field("submit_timeout", &self.submit_timeout)
            .field("receipt_timeout", &self.receipt_timeout)
            .field("poll_interval", &self.poll_interval)
            .finish()
    }
}

impl DirectSettlementConfig {
    pub fn new(rpc_url: impl Into<String>, private_key: impl Into<String>) -> Self {
        Self {
            rpc_url: rpc_url.into(),
            private_key: private_key.into(),
            submit_timeout: DEFAULT_SUBMIT_TIMEOUT,
            receipt_timeout: DEFAULT_RECEIPT_TIMEOUT,
            poll_interval: Duration::from_secs(1),
        }
    }

    pub fn with_receipt_timeout(mut self, timeout: Duration) -> Self {
        self.receipt_timeout = timeout;
        self
    }

    pub fn with_submit_timeout(mut self, timeout: Duration) -> Self {
        self.submit_timeout = timeout;
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn validate(&self) -> Result<()> {
        let parsed = url::Url::parse(&self.rpc_url)
            .map_err(|e| X402Error::config(format!("Invalid RPC URL: {}", e)))?;
        if parsed.scheme() != "http" && parsed.scheme() != "https" {
            return Err(X402Error::config("RPC URL must be http:// or https://"));
        }
        Ok(())
    }
}

/// What to do when a settlement attempt ends ambiguously
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TimeoutPolicy {
    /// Report the ambiguous outcome and leave reconciliation to an operator
    #[default]
    ManualReconciliation,
    /// Re-submit up to `attempts` more times while the authorization stays valid for at
    /// least `min_remaining`
    RetryWhileFresh {
        attempts: u32,
        min_remaining: Duration,
    },
}

/// Complete gate configuration
#[derive(Debug, Clone)]
pub struct GateConfig {
    pub payment: PaymentConfig,
    pub settlement: SettlementMode,
    /// Bound on one settlement attempt
    pub settlement_timeout: Duration,
    /// Tolerance applied to both ends of the validity window
    pub clock_skew: Duration,
    pub timeout_policy: TimeoutPolicy,
    /// Address the demo server binds to
    pub bind_address: String,
}

impl GateConfig {
    pub fn new(payment: PaymentConfig, settlement: SettlementMode) -> Self {
        Self {
            payment,
            settlement,
            settlement_timeout: DEFAULT_SETTLEMENT_TIMEOUT,
            clock_skew: Duration::ZERO,
            timeout_policy: TimeoutPolicy::default(),
            bind_address: "0.0.0.0:4021".to_string(),
        }
    }

    pub fn with_settlement_timeout(mut self, timeout: Duration) -> Self {
        self.settlement_timeout = timeout;
        self
    }

    pub fn with_clock_skew(mut self, skew: Duration) -> Self {
        self.clock_skew = skew;
        self
    }

    pub fn with_timeout_policy(mut self, policy: TimeoutPolicy) -> Self {
        self.timeout_policy = policy;
        self
    }

    /// Load configuration from process environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());
        let require =
            |key: &str| get(key).ok_or_else(|| X402Error::config(format!("{} must be set", key)));

        let network = get("X402_NETWORK").unwrap_or_else(|| networks::BASE_SEPOLIA.to_string());
        let decimals = parse_var(&get, "X402_TOKEN_DECIMALS")?.unwrap_or(6u32);
        let price_text = get("X402_PRICE").unwrap_or_else(|| "0.01".to_string());
        let amount = Decimal::from_str(&price_text)
            .map_err(|_| X402Error::config(format!("X402_PRICE is not a decimal: {}", price_text)))?;

        let mut payment = PaymentConfig::new(
            network,
            require("X402_PAY_TO")?,
            Price::Decimal { amount, decimals },
        );
        payment.chain_id = parse_var(&get, "X402_CHAIN_ID")?;
        payment.asset = get("X402_ASSET");
        payment.token_name = get("X402_TOKEN_NAME");
        payment.token_version = get("X402_TOKEN_VERSION");
        payment.description = get("X402_DESCRIPTION");
        payment.resource_root_url = get("X402_RESOURCE_ROOT_URL");
        if let Some(seconds) = parse_var(&get, "X402_MAX_TIMEOUT_SECONDS")? {
            payment.max_timeout_seconds = seconds;
        }

        let mode = get("X402_SETTLEMENT_MODE").unwrap_or_else(|| "facilitator".to_string());
        let settlement = match mode.as_str() {
            "facilitator" => {
                let mut facilitator = FacilitatorConfig::new(
                    get("X402_FACILITATOR_URL").unwrap_or_else(|| DEFAULT_FACILITATOR_URL.to_string()),
                );
                if let Some(verify) = parse_var::<bool, _>(&get, "X402_FACILITATOR_VERIFY")? {
                    facilitator = facilitator.with_verify_before_execution(verify);
                }
                SettlementMode::Facilitator(facilitator)
            }
            "direct" => {
                let mut direct = DirectSettlementConfig::new(
                    require("X402_RPC_URL")?,
                    require("X402_SETTLER_PRIVATE_KEY")?,
                );
                if let Some(seconds) = parse_var(&get, "X402_RECEIPT_TIMEOUT_SECS")? {
                    direct = direct.with_receipt_timeout(Duration::from_secs(seconds));
                }
                SettlementMode::Direct(direct)
            }
            other => {
                return Err(X402Error::config(format!(
                    "X402_SETTLEMENT_MODE must be 'facilitator' or 'direct', got '{}'",
                    other
                )))
            }
        };

        let mut config = GateConfig::new(payment, settlement);
        if let Some(seconds) = parse_var(&get, "X402_SETTLEMENT_TIMEOUT_SECS")? {
            config.settlement_timeout = Duration::from_secs(seconds);
        }
        if let Some(seconds) = parse_var(&get, "X402_CLOCK_SKEW_SECS")? {
            config.clock_skew = Duration::from_secs(seconds);
        }
        if let Some(attempts) = parse_var::<u32, _>(&get, "X402_TIMEOUT_RETRIES")? {
            if attempts > 0 {
                config.timeout_policy = TimeoutPolicy::RetryWhileFresh {
                    attempts,
                    min_remaining: config.settlement_timeout,
                };
            }
        }
        if let Some(bind) = get("BIND_ADDRESS") {
            config.bind_address = bind;
        }

        Ok(config)
    }
}

fn parse_var<T, G>(get: &G, key: &str) -> Result<Option<T>>
where
    T: FromStr,
    G: Fn(&str) -> Option<String>,
{
    get(key)
        .map(|value| {
            value
                .trim()
                .parse::<T>()
                .map_err(|_| X402Error::config(format!("{} has an invalid value: {}", key, value)))
        })
        .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    const PAY_TO: &str = "0x209693Bc6afc0C5328bA36FaF03C514EF312287C";

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_price_conversion() {
        let price = Price::usdc(Decimal::from_str("0.0001").unwrap());
        assert_eq!(price.to_atomic().unwrap(), U256::from(100u64));

        let price = Price::usdc(Decimal::from_str("0.1").unwrap());
        assert_eq!(price.to_atomic().unwrap(), U256::from(100_000u64));

        let too_fine = Price::usdc(Decimal::from_str("0.0000001").unwrap());
        assert!(too_fine.to_atomic().is_err());

        assert!(Price::Atomic(U256::zero()).to_atomic().is_err());
        assert!(Price::usdc(Decimal::from_str("-1").unwrap())
            .to_atomic()
            .is_err());
    }

    #[test]
    fn test_defaults_for_known_network() {
        let config = PaymentConfig::new(
            "base-sepolia",
            PAY_TO,
            Price::usdc(Decimal::from_str("0.01").unwrap()),
        );
        assert_eq!(config.resolved_chain_id().unwrap(), 84532);
        assert_eq!(
            config.resolved_asset().unwrap(),
            "0x036CbD53842c5426634e7929541eC2318f3dCF7e"
        );
        let defaults = config.domain_defaults();
        assert_eq!(defaults.name.as_deref(), Some("USDC"));
        assert_eq!(defaults.version, None);
    }

    #[test]
    fn test_custom_asset_gets_no_usdc_name() {
        let config = PaymentConfig::new("base", PAY_TO, Price::Atomic(U256::from(1u64)))
            .with_asset("0x0000000000000000000000000000000000000001");
        assert_eq!(config.domain_defaults().name, None);
    }

    #[test]
    fn test_unknown_network_requires_chain_id() {
        let config = PaymentConfig::new("devnet", PAY_TO, Price::Atomic(U256::from(1u64)));
        assert!(matches!(
            config.resolved_chain_id(),
            Err(X402Error::NetworkNotSupported { .. })
        ));
        assert_eq!(config.with_chain_id(1001).resolved_chain_id().unwrap(), 1001);
    }

    #[test]
    fn test_from_lookup_facilitator_defaults() {
        let config = GateConfig::from_lookup(lookup(&[("X402_PAY_TO", PAY_TO)])).unwrap();
        assert_eq!(config.payment.network, "base-sepolia");
        assert_eq!(
            config.payment.price.to_atomic().unwrap(),
            U256::from(10_000u64)
        );
        assert_eq!(config.settlement.name(), "facilitator");
        assert_eq!(config.timeout_policy, TimeoutPolicy::ManualReconciliation);
        assert_eq!(config.clock_skew, Duration::ZERO);
    }

    #[test]
    fn test_from_lookup_direct_mode() {
        let config = GateConfig::from_lookup(lookup(&[
            ("X402_PAY_TO", PAY_TO),
            ("X402_SETTLEMENT_MODE", "direct"),
            ("X402_RPC_URL", "http://localhost:8545"),
            ("X402_SETTLER_PRIVATE_KEY", "0x01"),
            ("X402_SETTLEMENT_TIMEOUT_SECS", "20"),
            ("X402_TIMEOUT_RETRIES", "2"),
            ("X402_CLOCK_SKEW_SECS", "3"),
        ]))
        .unwrap();

        match &config.settlement {
            SettlementMode::Direct(direct) => {
                assert_eq!(direct.rpc_url, "http://localhost:8545");
                assert!(!format!("{:?}", direct).contains("0x01"));
            }
            other => panic!("unexpected mode {:?}", other),
        }
        assert_eq!(
            config.timeout_policy,
            TimeoutPolicy::RetryWhileFresh {
                attempts: 2,
                min_remaining: Duration::from_secs(20)
            }
        );
        assert_eq!(config.clock_skew, Duration::from_secs(3));
    }

    #[test]
    fn test_from_lookup_errors() {
        assert!(GateConfig::from_lookup(lookup(&[])).is_err());
        assert!(GateConfig::from_lookup(lookup(&[
            ("X402_PAY_TO", PAY_TO),
            ("X402_SETTLEMENT_MODE", "carrier-pigeon"),
        ]))
        .is_err());
        assert!(GateConfig::from_lookup(lookup(&[
            ("X402_PAY_TO", PAY_TO),
            ("X402_SETTLEMENT_MODE", "direct"),
        ]))
        .is_err());
        assert!(GateConfig::from_lookup(lookup(&[
            ("X402_PAY_TO", PAY_TO),
            ("X402_CHAIN_ID", "eighty"),
        ]))
        .is_err());
    }
}
