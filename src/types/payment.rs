//! Payment-related types

use super::constants::schemes;
use crate::{Result, X402Error};
use base64::{engine::general_purpose, Engine as _};
use ethereum_types::{Address, H256, U256};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// x402 protocol version
pub const X402_VERSION: u32 = 1;

/// Requirement-level overrides for the token's EIP-712 domain
///
/// These take precedence over process configuration when the domain is derived.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomainOverrides {
    /// Token EIP-712 domain name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Token EIP-712 domain version
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

impl DomainOverrides {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.version.is_none()
    }
}

/// One acceptable way to pay for a resource
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentRequirement {
    /// Payment scheme identifier
    pub scheme: String,
    /// Network identifier (e.g., "base-sepolia")
    pub network: String,
    /// Chain id the authorization must be signed for
    #[serde(rename = "chainId")]
    pub chain_id: u64,
    /// Required payment amount in atomic token units
    #[serde(rename = "maxAmountRequired")]
    pub max_amount_required: String,
    /// Token contract address
    pub asset: String,
    /// Recipient wallet address for the payment
    #[serde(rename = "payTo")]
    pub pay_to: String,
    /// URL or path of the protected resource
    pub resource: String,
    /// Human-readable description of the resource
    pub description: String,
    /// MIME type of the expected response
    #[serde(rename = "mimeType", skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    /// Validity window length a client should sign for, in seconds
    #[serde(rename = "maxTimeoutSeconds")]
    pub max_timeout_seconds: u64,
    /// Domain name/version the client must sign with
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extra: Option<DomainOverrides>,
}

impl PaymentRequirement {
    /// Required amount as an integer
    pub fn amount(&self) -> Result<U256> {
        U256::from_dec_str(&self.max_amount_required).map_err(|_| {
            X402Error::config(format!(
                "Invalid required amount '{}'",
                self.max_amount_required
            ))
        })
    }
}

/// HTTP 402 body advertising the accepted payment
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentRequirementsResponse {
    /// Protocol version
    #[serde(rename = "x402Version")]
    pub x402_version: u32,
    /// Human-readable error message
    pub error: String,
    /// Acceptable payment methods
    pub accepts: Vec<PaymentRequirement>,
}

impl PaymentRequirementsResponse {
    pub fn new(error: impl Into<String>, accepts: Vec<PaymentRequirement>) -> Self {
        Self {
            x402_version: X402_VERSION,
            error: error.into(),
            accepts,
        }
    }
}

/// Payment payload sent by the client in the `X-PAYMENT` header
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentPayload {
    /// Protocol version identifier
    #[serde(rename = "x402Version")]
    pub x402_version: u32,
    /// Payment scheme identifier
    pub scheme: String,
    /// Network identifier
    pub network: String,
    /// Signed authorization
    pub payload: SignedAuthorization,
}

impl PaymentPayload {
    /// Create a new payment payload for the transfer-with-authorization scheme
    pub fn new(network: impl Into<String>, payload: SignedAuthorization) -> Self {
        Self {
            x402_version: X402_VERSION,
            scheme: schemes::TRANSFER_WITH_AUTHORIZATION.to_string(),
            network: network.into(),
            payload,
        }
    }

    /// Decode a base64-encoded payment payload
    pub fn from_base64(encoded: &str) -> Result<Self> {
        let decoded = general_purpose::STANDARD
            .decode(encoded.trim())
            .map_err(|e| X402Error::malformed(format!("payment header is not base64: {}", e)))?;
        serde_json::from_slice(&decoded)
            .map_err(|e| X402Error::malformed(format!("payment header is not a payload: {}", e)))
    }

    /// Encode the payment payload to base64
    pub fn to_base64(&self) -> Result<String> {
        let json = serde_json::to_string(self)?;
        Ok(general_purpose::STANDARD.encode(json))
    }

    /// Payer claimed by the authorization
    pub fn payer(&self) -> &str {
        &self.payload.authorization.from
    }
}

/// EIP-3009 authorization together with its signature
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignedAuthorization {
    /// EIP-712 signature over the authorization
    pub signature: AuthorizationSignature,
    /// EIP-3009 authorization parameters
    pub authorization: Authorization,
}

/// Signature encodings accepted from clients
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AuthorizationSignature {
    /// 65-byte `r || s || v` hex string
    Packed(String),
    /// Separate components: 32-byte `r`, 32-byte `s`, 1-byte `v`
    Split { v: u8, r: String, s: String },
}

impl From<String> for AuthorizationSignature {
    fn from(packed: String) -> Self {
        AuthorizationSignature::Packed(packed)
    }
}

/// EIP-3009 authorization parameters as sent on the wire
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Authorization {
    /// Payer's wallet address
    pub from: String,
    /// Recipient's wallet address
    pub to: String,
    /// Payment amount in atomic units
    pub value: String,
    /// Unix timestamp when authorization becomes valid
    #[serde(rename = "validAfter")]
    pub valid_after: String,
    /// Unix timestamp when authorization expires
    #[serde(rename = "validBefore")]
    pub valid_before: String,
    /// 32-byte nonce chosen by the payer
    pub nonce: String,
}

impl Authorization {
    pub fn new(
        from: impl Into<String>,
        to: impl Into<String>,
        value: impl Into<String>,
        valid_after: impl Into<String>,
        valid_before: impl Into<String>,
        nonce: impl Into<String>,
    ) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            value: value.into(),
            valid_after: valid_after.into(),
            valid_before: valid_before.into(),
            nonce: nonce.into(),
        }
    }

    /// Parse every field into its typed form
    pub fn parse(&self) -> Result<ParsedAuthorization> {
        let nonce_hex = self.nonce.trim_start_matches("0x");
        if nonce_hex.len() != 64 {
            return Err(X402Error::malformed("nonce must be 32 bytes"));
        }

        Ok(ParsedAuthorization {
            from: parse_address(&self.from, "from")?,
            to: parse_address(&self.to, "to")?,
            value: U256::from_dec_str(&self.value)
                .map_err(|_| X402Error::malformed(format!("invalid value '{}'", self.value)))?,
            valid_after: parse_timestamp(&self.valid_after, "validAfter")?,
            valid_before: parse_timestamp(&self.valid_before, "validBefore")?,
            nonce: H256::from_str(nonce_hex)
                .map_err(|_| X402Error::malformed(format!("invalid nonce '{}'", self.nonce)))?,
        })
    }
}

/// Authorization with typed fields
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParsedAuthorization {
    pub from: Address,
    pub to: Address,
    pub value: U256,
    pub valid_after: u64,
    pub valid_before: u64,
    pub nonce: H256,
}

impl ParsedAuthorization {
    /// Wire representation of these fields
    pub fn to_wire(&self) -> Authorization {
        Authorization {
            from: format!("{:?}", self.from),
            to: format!("{:?}", self.to),
            value: self.value.to_string(),
            valid_after: self.valid_after.to_string(),
            valid_before: self.valid_before.to_string(),
            nonce: format!("{:?}", self.nonce),
        }
    }
}

/// Parse a 20-byte hex address (with or without `0x`, any case)
pub fn parse_address(value: &str, field: &str) -> Result<Address> {
    let hex_part = value.trim().trim_start_matches("0x").trim_start_matches("0X");
    if hex_part.len() != 40 {
        return Err(X402Error::malformed(format!(
            "{} is not a 20-byte address: '{}'",
            field, value
        )));
    }
    Address::from_str(hex_part)
        .map_err(|_| X402Error::malformed(format!("{} is not a hex address: '{}'", field, value)))
}

fn parse_timestamp(value: &str, field: &str) -> Result<u64> {
    value
        .parse::<u64>()
        .map_err(|_| X402Error::malformed(format!("invalid {} timestamp '{}'", field, value)))
}
