//! Settlement of verified authorizations
//!
//! - [`Settler`] - the capability of finalizing a transfer, chosen once at startup
//! - [`facilitator`] - settlement delegated to a facilitator service
//! - [`direct`] - settlement by calling the token contract from the server's own wallet
//! - [`state`] - per-request lifecycle
//! - [`orchestrator`] - verify, execute, settle in that order
//!
//! # Examples
//!
//! ```no_run
//! use std::sync::Arc;
//! use x402_gate::config::SettlementMode;
//! use x402_gate::settlement::{build_settler, Orchestrator, OrchestratorConfig};
//! use x402_gate::crypto::DomainDefaults;
//! use x402_gate::types::FacilitatorConfig;
//!
//! # fn example() -> x402_gate::Result<()> {
//! let mode = SettlementMode::Facilitator(FacilitatorConfig::new("https://x402.org/facilitator"));
//! let settler = build_settler(&mode, 84532)?;
//! let orchestrator = Orchestrator::new(settler, OrchestratorConfig::new(DomainDefaults::default()));
//! # Ok(())
//! # }
//! ```

pub mod direct;
pub mod facilitator;
pub mod orchestrator;
pub mod state;

#[cfg(test)]
mod tests;

use crate::blockchain::BlockchainClient;
use crate::config::SettlementMode;
use crate::facilitator::FacilitatorClient;
use crate::types::{PaymentPayload, PaymentRequirement, SettlementOutcome};
use crate::Result;
use async_trait::async_trait;
use std::sync::Arc;

pub use direct::{
    encode_transfer_with_authorization, transferWithAuthorizationCall, DirectSettler,
};
pub use facilitator::FacilitatorSettler;
pub use orchestrator::{Orchestrator, OrchestratorConfig, Rejection, Settled};
pub use state::{InvalidTransition, SettlementState, SettlementTrace};

/// Finalizes a verified authorization
#[async_trait]
pub trait Settler: Send + Sync {
    /// Short name of the settlement mode, for logs
    fn mode(&self) -> &'static str;

    /// Optional remote check before the service runs
    async fn verify(
        &self,
        _requirement: &PaymentRequirement,
        _payment: &PaymentPayload,
    ) -> Result<()> {
        Ok(())
    }

    /// Execute the transfer
    ///
    /// Returns the confirmed outcome, `SettlementFailed` when the transfer definitely did
    /// not happen, or an ambiguous error (`SettlementTimeout`, `SettlementUnconfirmed`)
    /// when that cannot be known.
    async fn settle(
        &self,
        requirement: &PaymentRequirement,
        payment: &PaymentPayload,
    ) -> Result<SettlementOutcome>;

    /// Transaction already broadcast for `payment` by an attempt that was cut off
    /// before it returned
    async fn interrupted_transaction(&self, _payment: &PaymentPayload) -> Option<String> {
        None
    }
}

/// Build the settler for `mode`; `chain_id` signs direct-mode transactions
pub fn build_settler(mode: &SettlementMode, chain_id: u64) -> Result<Arc<dyn Settler>> {
    match mode {
        SettlementMode::Facilitator(config) => {
            let client = FacilitatorClient::new(config.clone())?;
            Ok(Arc::new(FacilitatorSettler::new(
                client,
                config.verify_before_execution,
            )))
        }
        SettlementMode::Direct(config) => {
            config.validate()?;
            let chain = BlockchainClient::new(&config.rpc_url, &config.private_key, chain_id)?;
            tracing::info!(
                "Direct settlement from {:?} on chain {}",
                chain.address(),
                chain_id
            );
            Ok(Arc::new(DirectSettler::new(
                chain,
                config.submit_timeout,
                config.receipt_timeout,
                config.poll_interval,
            )))
        }
    }
}
