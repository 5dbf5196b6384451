//! Settlement through a facilitator service

use super::Settler;
use crate::error::{never_sent, SettlementFailure, ValidationReason};
use crate::facilitator::FacilitatorClient;
use crate::types::{PaymentPayload, PaymentRequirement, SettlementOutcome};
use crate::{Result, X402Error};
use async_trait::async_trait;
use std::time::Instant;

/// [`Settler`] that delegates to a [`FacilitatorClient`]
#[derive(Debug, Clone)]
pub struct FacilitatorSettler {
    client: FacilitatorClient,
    verify_before_execution: bool,
}

impl FacilitatorSettler {
    pub fn new(client: FacilitatorClient, verify_before_execution: bool) -> Self {
        Self {
            client,
            verify_before_execution,
        }
    }

    pub fn client(&self) -> &FacilitatorClient {
        &self.client
    }
}

#[async_trait]
impl Settler for FacilitatorSettler {
    fn mode(&self) -> &'static str {
        "facilitator"
    }

    async fn verify(
        &self,
        requirement: &PaymentRequirement,
        payment: &PaymentPayload,
    ) -> Result<()> {
        if !self.verify_before_execution {
            return Ok(());
        }

        let response = self
            .client
            .verify(payment, requirement)
            .await
            .map_err(|e| match e {
                X402Error::Http(e) => {
                    X402Error::facilitator_error(format!("verify request failed: {}", e))
                }
                other => other,
            })?;

        if response.is_valid {
            Ok(())
        } else {
            Err(X402Error::validation(ValidationReason::FacilitatorRejected(
                response
                    .invalid_reason
                    .unwrap_or_else(|| "unspecified".to_string()),
            )))
        }
    }

    async fn settle(
        &self,
        requirement: &PaymentRequirement,
        payment: &PaymentPayload,
    ) -> Result<SettlementOutcome> {
        let started = Instant::now();
        let network = requirement.network.clone();

        match self.client.settle(payment, requirement).await {
            Ok(response) if response.success => {
                let payer = response.payer.or_else(|| Some(payment.payer().to_string()));
                Ok(SettlementOutcome::settled(network, response.transaction, payer))
            }
            Ok(response) => Err(X402Error::settlement_failed(
                network,
                SettlementFailure::Facilitator(
                    response
                        .error_reason
                        .unwrap_or_else(|| "unspecified".to_string()),
                ),
            )),
            Err(X402Error::Http(e)) if never_sent(&e) => Err(X402Error::settlement_failed(
                network,
                SettlementFailure::Transport(e.to_string()),
            )),
            Err(X402Error::Http(e)) if e.is_timeout() => Err(X402Error::SettlementTimeout {
                network,
                transaction: None,
                elapsed: started.elapsed(),
            }),
            // The request reached the facilitator, which may have broadcast the transfer
            Err(X402Error::Http(e)) => {
                tracing::warn!("Facilitator settle answer unusable: {}", e);
                Err(X402Error::SettlementUnconfirmed {
                    network,
                    transaction: None,
                    reason: e.to_string(),
                })
            }
            Err(X402Error::FacilitatorError(message)) => Err(X402Error::settlement_failed(
                network,
                SettlementFailure::Facilitator(message),
            )),
            Err(other) => Err(other),
        }
    }
}
