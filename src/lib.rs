//! # x402 payment gate
//!
//! Gate any request handler behind a signed EIP-3009 `transferWithAuthorization`,
//! verified off-chain against an EIP-712 domain and settled after the handler succeeds.
//!
//! ## Features
//!
//! - **HTTP-native payments**: `402 Payment Required` with a machine-readable requirement
//! - **Off-chain verification**: business rules, typed-data domain derivation and signer recovery
//! - **Two settlement modes**: delegate to a facilitator, or call the token contract directly
//! - **Honest outcomes**: a settlement timeout is reported as ambiguous, never as success or failure
//! - **Axum middleware**: drop-in layer for any router (default `axum` feature)
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use axum::{routing::get, Router};
//! use x402_gate::middleware::{payment_gate, PaymentGate};
//! use x402_gate::GateConfig;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = GateConfig::from_env()?;
//!     let gate = PaymentGate::from_config(&config)?;
//!
//!     let app = Router::new()
//!         .route("/weather", get(|| async { "sunny" }))
//!         .layer(axum::middleware::from_fn_with_state(gate, payment_gate));
//!
//!     let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
//!     axum::serve(listener, app).await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! - **`types`**: wire types, network registry and protocol constants
//! - **`config`**: process configuration and environment loading
//! - **`requirements`**: payment requirement generation
//! - **`crypto`**: EIP-712 hashing, domain derivation and signature verification
//! - **`validation`**: business checks on a claimed authorization
//! - **`settlement`**: settlers, the request state machine and the orchestrator
//! - **`facilitator`**: HTTP client for facilitator services
//! - **`blockchain`**: alloy provider access for direct settlement
//! - **`wallet`**: secp256k1 signing of authorizations
//! - **`middleware`**: axum integration
//!
//! The gate keeps no nonce ledger. Replay protection is the job of whoever executes the
//! transfer: the token contract or the facilitator.

pub mod blockchain;
pub mod config;
pub mod crypto;
pub mod error;
pub mod facilitator;
pub mod requirements;
pub mod settlement;
pub mod types;
pub mod validation;
pub mod wallet;

#[cfg(feature = "axum")]
pub mod middleware;

#[cfg(test)]
mod testing;

// Re-exports for convenience
pub use blockchain::{BlockchainClient, ChainClient};
pub use config::{GateConfig, PaymentConfig, Price, SettlementMode, TimeoutPolicy};
pub use error::{Result, X402Error};
pub use requirements::RequirementGenerator;
pub use settlement::{build_settler, Orchestrator, OrchestratorConfig, Settler};
pub use types::*;
pub use validation::AuthorizationValidator;
pub use wallet::Wallet;

/// Current version of the crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
