//! Settlement outcome reported to clients

use crate::X402Error;
use base64::{engine::general_purpose, Engine as _};
use serde::{Deserialize, Serialize};

/// Final status of a settlement attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SettlementStatus {
    /// Transfer confirmed (receipt or facilitator confirmation)
    Settled,
    /// Transfer definitely did not happen
    Failed,
    /// Transfer may or may not have happened; needs reconciliation
    Ambiguous,
}

/// Result of one settlement attempt, returned to the caller
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettlementOutcome {
    pub success: bool,
    pub status: SettlementStatus,
    /// Transaction hash, when one is known
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transaction: Option<String>,
    pub network: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payer: Option<String>,
    /// Machine-readable reason code on failure
    #[serde(rename = "errorReason", skip_serializing_if = "Option::is_none")]
    pub error_reason: Option<String>,
    /// Human-readable failure detail
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SettlementOutcome {
    /// A confirmed settlement
    pub fn settled(
        network: impl Into<String>,
        transaction: Option<String>,
        payer: Option<String>,
    ) -> Self {
        Self {
            success: true,
            status: SettlementStatus::Settled,
            transaction,
            network: network.into(),
            payer,
            error_reason: None,
            error: None,
        }
    }

    /// Outcome describing a settlement error
    pub fn from_error(network: impl Into<String>, payer: Option<String>, error: &X402Error) -> Self {
        let transaction = error.transaction().map(str::to_string);

        Self {
            success: false,
            status: if error.is_ambiguous() {
                SettlementStatus::Ambiguous
            } else {
                SettlementStatus::Failed
            },
            transaction,
            network: network.into(),
            payer,
            error_reason: Some(error.reason_code().to_string()),
            error: Some(error.to_string()),
        }
    }

    /// Encode for the `X-PAYMENT-RESPONSE` header
    pub fn to_base64(&self) -> crate::Result<String> {
        let json = serde_json::to_string(self)?;
        Ok(general_purpose::STANDARD.encode(json))
    }
}
