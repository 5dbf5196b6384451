//! Error types for the payment gate
//!
//! Every terminal outcome of a paid request maps to one [`X402Error`] variant. Each
//! variant carries a stable machine-readable code ([`X402Error::reason_code`]) and a
//! human-readable message (its `Display` output).

use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Result type used throughout the crate
pub type Result<T> = std::result::Result<T, X402Error>;

/// Errors produced while gating, verifying and settling a payment
#[derive(Debug, Error)]
pub enum X402Error {
    /// The payment payload is structurally invalid (bad encoding, missing or unparseable fields)
    #[error("Malformed payment request: {0}")]
    MalformedRequest(String),

    /// The typed-data domain could not be derived from the requirement
    #[error("Typed-data domain mismatch: {0}")]
    DomainMismatch(String),

    /// A business constraint of the authorization was not met
    #[error("Payment validation failed: {reason}")]
    ValidationFailed { reason: ValidationReason },

    /// The signature did not recover to the claimed payer, or could not be decoded
    #[error("Invalid signature: {reason}")]
    SignatureInvalid { reason: SignatureFailure },

    /// The monetized service failed; the authorization was not consumed
    #[error("Service execution failed: {0}")]
    ServiceExecutionFailed(String),

    /// Settlement definitely did not happen
    #[error("Settlement failed on {network}: {reason}")]
    SettlementFailed {
        network: String,
        reason: SettlementFailure,
    },

    /// Settlement did not complete in time; the transfer may or may not have landed
    #[error("Settlement on {network} timed out after {elapsed:?}, outcome is ambiguous{}", transaction_suffix(.transaction))]
    SettlementTimeout {
        network: String,
        transaction: Option<String>,
        elapsed: Duration,
    },

    /// The settlement request went out but no answer came back that could be understood;
    /// the transfer may or may not have landed
    #[error("Settlement on {network} is unconfirmed, outcome is ambiguous: {reason}{}", transaction_suffix(.transaction))]
    SettlementUnconfirmed {
        network: String,
        transaction: Option<String>,
        reason: String,
    },

    /// Invalid process configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Network name not present in the registry
    #[error("Network not supported: {network}")]
    NetworkNotSupported { network: String },

    /// Non-success answer from a facilitator endpoint
    #[error("Facilitator error: {0}")]
    FacilitatorError(String),

    /// JSON-RPC level failure talking to a chain node
    #[error("RPC error: {0}")]
    Rpc(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Base64 decode error: {0}")]
    Base64(#[from] base64::DecodeError),
}

fn transaction_suffix(transaction: &Option<String>) -> String {
    match transaction {
        Some(tx) => format!(" (transaction {})", tx),
        None => String::new(),
    }
}

/// Distinct reasons an authorization fails business validation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationReason {
    SchemeMismatch { expected: String, actual: String },
    NetworkMismatch { expected: String, actual: String },
    RecipientMismatch { expected: String, actual: String },
    InsufficientAmount { required: String, provided: String },
    InvalidValidityWindow { valid_after: u64, valid_before: u64 },
    NotYetValid { valid_after: u64, now: i64 },
    Expired { valid_before: u64, now: i64 },
    /// The facilitator refused the authorization during remote pre-verification
    FacilitatorRejected(String),
}

impl ValidationReason {
    pub fn code(&self) -> &'static str {
        match self {
            ValidationReason::SchemeMismatch { .. } => "scheme_mismatch",
            ValidationReason::NetworkMismatch { .. } => "network_mismatch",
            ValidationReason::RecipientMismatch { .. } => "recipient_mismatch",
            ValidationReason::InsufficientAmount { .. } => "insufficient_amount",
            ValidationReason::InvalidValidityWindow { .. } => "invalid_validity_window",
            ValidationReason::NotYetValid { .. } => "authorization_not_yet_valid",
            ValidationReason::Expired { .. } => "authorization_expired",
            ValidationReason::FacilitatorRejected(_) => "facilitator_rejected",
        }
    }
}

impl fmt::Display for ValidationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationReason::SchemeMismatch { expected, actual } => {
                write!(f, "scheme '{}' does not match required '{}'", actual, expected)
            }
            ValidationReason::NetworkMismatch { expected, actual } => {
                write!(f, "network '{}' does not match required '{}'", actual, expected)
            }
            ValidationReason::RecipientMismatch { expected, actual } => {
                write!(f, "payee {} does not match recipient {}", actual, expected)
            }
            ValidationReason::InsufficientAmount { required, provided } => {
                write!(f, "value {} is below required amount {}", provided, required)
            }
            ValidationReason::InvalidValidityWindow {
                valid_after,
                valid_before,
            } => write!(
                f,
                "validAfter {} is not before validBefore {}",
                valid_after, valid_before
            ),
            ValidationReason::NotYetValid { valid_after, now } => {
                write!(f, "authorization not valid until {} (now {})", valid_after, now)
            }
            ValidationReason::Expired { valid_before, now } => {
                write!(f, "authorization expired at {} (now {})", valid_before, now)
            }
            ValidationReason::FacilitatorRejected(reason) => {
                write!(f, "facilitator rejected authorization: {}", reason)
            }
        }
    }
}

/// Why signature verification did not accept the authorization
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignatureFailure {
    /// Bad hex, wrong length or unusable recovery byte
    Malformed(String),
    /// Well-formed signature from which no public key could be recovered
    Unrecoverable { domain: String },
    /// Recovered a different signer than the claimed payer
    SignerMismatch {
        expected: String,
        recovered: String,
        domain: String,
    },
}

impl fmt::Display for SignatureFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SignatureFailure::Malformed(detail) => write!(f, "malformed signature: {}", detail),
            SignatureFailure::Unrecoverable { domain } => {
                write!(f, "no signer could be recovered under domain {}", domain)
            }
            SignatureFailure::SignerMismatch {
                expected,
                recovered,
                domain,
            } => write!(
                f,
                "recovered signer {} does not match payer {} under domain {}",
                recovered, expected, domain
            ),
        }
    }
}

/// Definite settlement failures
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SettlementFailure {
    /// The facilitator answered but refused or failed the settlement
    Facilitator(String),
    /// The request never reached its peer, e.g. the connection was refused
    Transport(String),
    /// The transfer transaction was mined but reverted
    Reverted { transaction: String },
    /// The node rejected the transaction before it was mined
    Rpc(String),
}

impl SettlementFailure {
    pub fn code(&self) -> &'static str {
        match self {
            SettlementFailure::Facilitator(_) => "facilitator_settlement_failed",
            SettlementFailure::Transport(_) => "settlement_transport_error",
            SettlementFailure::Reverted { .. } => "transaction_reverted",
            SettlementFailure::Rpc(_) => "transaction_rejected",
        }
    }
}

impl fmt::Display for SettlementFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SettlementFailure::Facilitator(reason) => write!(f, "facilitator: {}", reason),
            SettlementFailure::Transport(reason) => write!(f, "transport: {}", reason),
            SettlementFailure::Reverted { transaction } => {
                write!(f, "transaction {} reverted", transaction)
            }
            SettlementFailure::Rpc(reason) => write!(f, "node rejected transaction: {}", reason),
        }
    }
}

impl X402Error {
    /// Create a malformed request error
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::MalformedRequest(message.into())
    }

    /// Create a domain mismatch error
    pub fn domain_mismatch(message: impl Into<String>) -> Self {
        Self::DomainMismatch(message.into())
    }

    /// Create a validation error
    pub fn validation(reason: ValidationReason) -> Self {
        Self::ValidationFailed { reason }
    }

    /// Create a malformed signature error
    pub fn malformed_signature(message: impl Into<String>) -> Self {
        Self::SignatureInvalid {
            reason: SignatureFailure::Malformed(message.into()),
        }
    }

    /// Create a settlement failure
    pub fn settlement_failed(network: impl Into<String>, reason: SettlementFailure) -> Self {
        Self::SettlementFailed {
            network: network.into(),
            reason,
        }
    }

    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a facilitator error
    pub fn facilitator_error(message: impl Into<String>) -> Self {
        Self::FacilitatorError(message.into())
    }

    /// Create an RPC error
    pub fn rpc(message: impl Into<String>) -> Self {
        Self::Rpc(message.into())
    }

    /// Machine-readable reason code reported to clients
    pub fn reason_code(&self) -> &'static str {
        match self {
            X402Error::MalformedRequest(_) | X402Error::Base64(_) | X402Error::Json(_) => {
                "malformed_request"
            }
            X402Error::DomainMismatch(_) => "domain_mismatch",
            X402Error::ValidationFailed { reason } => reason.code(),
            X402Error::SignatureInvalid { reason } => match reason {
                SignatureFailure::Malformed(_) => "signature_malformed",
                _ => "invalid_signature",
            },
            X402Error::ServiceExecutionFailed(_) => "service_execution_failed",
            X402Error::SettlementFailed { reason, .. } => reason.code(),
            X402Error::SettlementTimeout { .. } => "settlement_timeout",
            X402Error::SettlementUnconfirmed { .. } => "settlement_unconfirmed",
            X402Error::Config(_) => "configuration_error",
            X402Error::NetworkNotSupported { .. } => "network_not_supported",
            X402Error::FacilitatorError(_) => "facilitator_error",
            X402Error::Rpc(_) => "rpc_error",
            X402Error::Http(_) => "http_error",
        }
    }

    /// Whether the outcome of the request could not be determined
    pub fn is_ambiguous(&self) -> bool {
        matches!(
            self,
            X402Error::SettlementTimeout { .. } | X402Error::SettlementUnconfirmed { .. }
        )
    }

    /// Transaction an ambiguous or reverted settlement is known to have broadcast
    pub fn transaction(&self) -> Option<&str> {
        match self {
            X402Error::SettlementTimeout { transaction, .. }
            | X402Error::SettlementUnconfirmed { transaction, .. } => transaction.as_deref(),
            X402Error::SettlementFailed {
                reason: SettlementFailure::Reverted { transaction },
                ..
            } => Some(transaction),
            _ => None,
        }
    }
}

/// Whether a failed HTTP request certainly never reached its peer
///
/// Anything else (timeouts, dropped connections, unreadable bodies) may have been acted on.
pub fn never_sent(error: &reqwest::Error) -> bool {
    error.is_connect() || error.is_builder()
}
