//! Cryptographic utilities for payment verification
//!
//! - [`eip712`] - EIP-712 hashing of the fixed `TransferWithAuthorization` schema
//! - [`domain`] - derivation of the typed-data domain from a payment requirement
//! - [`signature`] - signature decoding, signer recovery and verification
//!
//! # Examples
//!
//! ```
//! use x402_gate::crypto::domain::{DomainBuilder, DomainDefaults};
//! use x402_gate::crypto::signature::verify_authorization;
//! use x402_gate::types::{PaymentPayload, PaymentRequirement};
//!
//! fn check(requirement: &PaymentRequirement, payment: &PaymentPayload) -> x402_gate::Result<bool> {
//!     let builder = DomainBuilder::new(DomainDefaults::default());
//!     let domain = builder.build(requirement)?;
//!     let authorization = payment.payload.authorization.parse()?;
//!     let verification = verify_authorization(&domain, &authorization, &payment.payload.signature)?;
//!     Ok(verification.verified)
//! }
//! ```

pub mod domain;
pub mod eip712;
pub mod signature;


// Re-export commonly used items
pub use domain::{DomainBuilder, DomainDefaults};
pub use eip712::{keccak256, Domain};
pub use signature::{
    generate_nonce, recover_signer, verify_authorization, SignatureParts, SignatureVerification,
};
