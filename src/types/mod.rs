//! Core types for the payment gate
//!
//! - [`payment`] - payment requirement, payload and authorization wire types
//! - [`settlement`] - settlement outcome reported to clients
//! - [`facilitator`] - facilitator configuration and wire types
//! - [`network`] - registry of known networks
//! - [`constants`] - protocol constants (networks, schemes, headers)
//!
//! # Examples
//!
//! ```
//! use x402_gate::types::{Authorization, AuthorizationSignature, PaymentPayload, SignedAuthorization};
//!
//! # fn example() -> x402_gate::Result<()> {
//! let authorization = Authorization::new(
//!     "0x857b06519E91e3A54538791bDbb0E22373e36b66",   // from
//!     "0x209693Bc6afc0C5328bA36FaF03C514EF312287C",   // to
//!     "1000000",                                        // value
//!     "1745323800",                                     // validAfter
//!     "1745323985",                                     // validBefore
//!     "0xf3746613c2d920b5fdabc0856f2aeb2d4f88ee6037b8cc5d04a71a4462f13480", // nonce
//! );
//!
//! let payment = PaymentPayload::new(
//!     "base-sepolia",
//!     SignedAuthorization {
//!         signature: AuthorizationSignature::Packed("0x2d6a...".to_string()),
//!         authorization,
//!     },
//! );
//!
//! // Encode to base64 for the X-PAYMENT header
//! let encoded = payment.to_base64()?;
//! # Ok(())
//! # }
//! ```

pub mod constants;
pub mod facilitator;
pub mod network;
pub mod payment;
pub mod settlement;

// Re-export commonly used types
pub use constants::{
    networks, schemes, DEFAULT_DOMAIN_VERSION, PAYMENT_HEADER, PAYMENT_RESPONSE_HEADER,
};
pub use facilitator::{
    AuthHeaderProvider, FacilitatorConfig, FacilitatorEndpoint, FacilitatorRequest,
    SettleResponse, SupportedKind, SupportedKinds, VerifyResponse, DEFAULT_FACILITATOR_URL,
};
pub use network::NetworkConfig;
pub use payment::{
    parse_address, Authorization, AuthorizationSignature, DomainOverrides, ParsedAuthorization,
    PaymentPayload, PaymentRequirement, PaymentRequirementsResponse, SignedAuthorization,
    X402_VERSION,
};
pub use settlement::{SettlementOutcome, SettlementStatus};
