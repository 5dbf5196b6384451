//! Facilitator configuration and wire types

use super::payment::{PaymentPayload, PaymentRequirement, X402_VERSION};
use crate::{Result, X402Error};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Default facilitator URL
pub const DEFAULT_FACILITATOR_URL: &str = "https://x402.org/facilitator";

/// Facilitator operations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FacilitatorEndpoint {
    Verify,
    Settle,
    Supported,
}

impl FacilitatorEndpoint {
    /// Path relative to the facilitator base URL
    pub fn path(self) -> &'static str {
        match self {
            FacilitatorEndpoint::Verify => "verify",
            FacilitatorEndpoint::Settle => "settle",
            FacilitatorEndpoint::Supported => "supported",
        }
    }
}

impl fmt::Display for FacilitatorEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path())
    }
}

/// Produces extra headers (credentials, tracing context) for one facilitator call
pub type AuthHeaderProvider =
    Arc<dyn Fn(FacilitatorEndpoint) -> Result<Vec<(String, String)>> + Send + Sync>;

/// Where and how to reach a facilitator
#[derive(Clone)]
pub struct FacilitatorConfig {
    /// Base URL, without trailing slash
    pub url: String,
    /// Per-request timeout; unbounded when unset
    pub timeout: Option<Duration>,
    /// Ask the facilitator to verify before the service runs
    pub verify_before_execution: bool,
    pub auth_headers: Option<AuthHeaderProvider>,
}

impl fmt::Debug for FacilitatorConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FacilitatorConfig")
            .field("url", &self.url)
            .field("timeout", &self.timeout)
            .field("verify_before_execution", &self.verify_before_execution)
            .field("auth_headers", &self.auth_headers.as_ref().map(|_| "<provider>"))
            .finish()
    }
}

impl FacilitatorConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into().trim_end_matches('/').to_string(),
            timeout: None,
            verify_before_execution: false,
            auth_headers: None,
        }
    }

    /// Reject empty or non-HTTP URLs
    pub fn validate(&self) -> Result<()> {
        if self.url.is_empty() {
            return Err(X402Error::config("Facilitator URL cannot be empty"));
        }

        let parsed = url::Url::parse(&self.url)
            .map_err(|e| X402Error::config(format!("Invalid facilitator URL: {}", e)))?;
        match parsed.scheme() {
            "http" | "https" => Ok(()),
            other => Err(X402Error::config(format!(
                "Facilitator URL scheme must be http or https, got '{}'",
                other
            ))),
        }
    }

    /// URL of `endpoint` under this facilitator
    pub fn endpoint_url(&self, endpoint: FacilitatorEndpoint) -> String {
        format!("{}/{}", self.url, endpoint.path())
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_verify_before_execution(mut self, enabled: bool) -> Self {
        self.verify_before_execution = enabled;
        self
    }

    pub fn with_auth_headers<F>(mut self, provider: F) -> Self
    where
        F: Fn(FacilitatorEndpoint) -> Result<Vec<(String, String)>> + Send + Sync + 'static,
    {
        self.auth_headers = Some(Arc::new(provider));
        self
    }

    /// Send `Authorization: Bearer <token>` on every call
    pub fn with_bearer_token(self, token: impl Into<String>) -> Self {
        let value = format!("Bearer {}", token.into());
        self.with_auth_headers(move |_| Ok(vec![("Authorization".to_string(), value.clone())]))
    }
}

impl Default for FacilitatorConfig {
    fn default() -> Self {
        Self::new(DEFAULT_FACILITATOR_URL)
    }
}

/// Body of `/verify` and `/settle`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FacilitatorRequest {
    #[serde(rename = "x402Version")]
    pub x402_version: u32,
    pub payment_payload: PaymentPayload,
    pub payment_requirements: PaymentRequirement,
}

impl FacilitatorRequest {
    pub fn new(payment: &PaymentPayload, requirement: &PaymentRequirement) -> Self {
        Self {
            x402_version: X402_VERSION,
            payment_payload: payment.clone(),
            payment_requirements: requirement.clone(),
        }
    }
}

/// Answer of `/verify`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyResponse {
    pub is_valid: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub invalid_reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payer: Option<String>,
}

/// Answer of `/settle`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettleResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_reason: Option<String>,
    /// Transaction hash; facilitators send an empty string when nothing was broadcast
    #[serde(default, deserialize_with = "empty_as_none")]
    pub transaction: Option<String>,
    pub network: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payer: Option<String>,
}

fn empty_as_none<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value: Option<String> = Option::deserialize(deserializer)?;
    Ok(value.filter(|s| !s.is_empty()))
}

/// Answer of `/supported`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SupportedKinds {
    pub kinds: Vec<SupportedKind>,
}

/// One scheme/network pair a facilitator handles
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SupportedKind {
    #[serde(rename = "x402Version")]
    pub x402_version: u32,
    pub scheme: String,
    pub network: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
}

impl SupportedKinds {
    /// Whether `scheme` on `network` is handled
    pub fn supports(&self, scheme: &str, network: &str) -> bool {
        self.kinds
            .iter()
            .any(|kind| kind.scheme == scheme && kind.network == network)
    }
}
