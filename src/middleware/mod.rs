//! Axum integration
//!
//! [`PaymentGate`] holds the requirement generator and the settlement orchestrator;
//! [`payment_gate`] is the middleware function wiring them around a router.
//!
//! # Examples
//!
//! ```no_run
//! use axum::{routing::get, Router};
//! use x402_gate::middleware::{payment_gate, PaymentGate};
//! use x402_gate::types::FacilitatorConfig;
//! use x402_gate::{GateConfig, PaymentConfig, Price, SettlementMode};
//! use rust_decimal::Decimal;
//!
//! # fn example() -> x402_gate::Result<()> {
//! let payment = PaymentConfig::new(
//!     "base-sepolia",
//!     "0x209693Bc6afc0C5328bA36FaF03C514EF312287C",
//!     Price::usdc(Decimal::new(1, 2)),
//! )
//! .with_description("Weather report");
//! let settlement = SettlementMode::Facilitator(FacilitatorConfig::new("https://x402.org/facilitator"));
//!
//! let gate = PaymentGate::from_config(&GateConfig::new(payment, settlement))?;
//! let app: Router = Router::new()
//!     .route("/weather", get(|| async { "sunny" }))
//!     .layer(axum::middleware::from_fn_with_state(gate, payment_gate));
//! # Ok(())
//! # }
//! ```
//!
//! # Payment Flow
//!
//! 1. No `X-PAYMENT` header: 402 with the payment requirement
//! 2. Header present: decode, validate, recover the signer
//! 3. Payment verified: run the handler
//! 4. Handler succeeded: settle, then attach `X-PAYMENT-RESPONSE`
//! 5. Handler failed: return its response untouched, nothing is settled

pub mod payment;
pub mod response;


pub use payment::{payment_gate, PaymentGate, ServiceFailure};
pub use response::{error_response, status_for, ErrorBody};
