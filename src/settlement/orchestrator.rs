//! Verify, execute, then settle
//!
//! One call to [`Orchestrator::process`] drives a request through
//! `Pending -> Verified -> Executing -> Settling -> Settled | Failed`. Settlement never
//! starts before the service succeeded, and the service never runs for an authorization
//! that failed verification.

use super::state::{SettlementState, SettlementTrace};
use super::Settler;
use crate::config::{TimeoutPolicy, DEFAULT_SETTLEMENT_TIMEOUT};
use crate::crypto::domain::{DomainBuilder, DomainDefaults};
use crate::crypto::signature::verify_authorization;
use crate::error::SignatureFailure;
use crate::types::{ParsedAuthorization, PaymentPayload, PaymentRequirement, SettlementOutcome};
use crate::validation::AuthorizationValidator;
use crate::{GateConfig, Result, X402Error};
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Tunables of the orchestrator
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    pub domain_defaults: DomainDefaults,
    pub clock_skew: Duration,
    /// Bound on one settlement attempt
    pub settlement_timeout: Duration,
    pub timeout_policy: TimeoutPolicy,
}

impl OrchestratorConfig {
    pub fn new(domain_defaults: DomainDefaults) -> Self {
        Self {
            domain_defaults,
            clock_skew: Duration::ZERO,
            settlement_timeout: DEFAULT_SETTLEMENT_TIMEOUT,
            timeout_policy: TimeoutPolicy::default(),
        }
    }

    /// Take timeouts, skew and policy from the process configuration
    pub fn from_gate(config: &GateConfig, domain_defaults: DomainDefaults) -> Self {
        Self {
            domain_defaults,
            clock_skew: config.clock_skew,
            settlement_timeout: config.settlement_timeout,
            timeout_policy: config.timeout_policy,
        }
    }

    pub fn with_clock_skew(mut self, skew: Duration) -> Self {
        self.clock_skew = skew;
        self
    }

    pub fn with_settlement_timeout(mut self, timeout: Duration) -> Self {
        self.settlement_timeout = timeout;
        self
    }

    pub fn with_timeout_policy(mut self, policy: TimeoutPolicy) -> Self {
        self.timeout_policy = policy;
        self
    }
}

/// A request that was served and paid for
#[derive(Debug)]
pub struct Settled<T> {
    pub output: T,
    pub outcome: SettlementOutcome,
    pub trace: SettlementTrace,
}

/// A request that ended in `Failed`
#[derive(Debug)]
pub struct Rejection<E> {
    pub error: X402Error,
    /// The service's own error when execution failed
    pub service_error: Option<E>,
    /// Settlement block, present once settlement was attempted
    pub outcome: Option<SettlementOutcome>,
    pub trace: SettlementTrace,
}

/// Drives one paid request through its lifecycle
#[derive(Clone)]
pub struct Orchestrator {
    settler: Arc<dyn Settler>,
    validator: AuthorizationValidator,
    domains: DomainBuilder,
    config: OrchestratorConfig,
}

impl fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Orchestrator")
            .field("settler", &self.settler.mode())
            .field("config", &self.config)
            .finish()
    }
}

fn unix_now() -> i64 {
    chrono::Utc::now().timestamp()
}

fn enter(trace: &mut SettlementTrace, state: SettlementState) {
    if let Err(e) = trace.advance(state) {
        tracing::error!("{}", e);
    }
}

impl Orchestrator {
    pub fn new(settler: Arc<dyn Settler>, config: OrchestratorConfig) -> Self {
        Self {
            validator: AuthorizationValidator::new(config.clock_skew),
            domains: DomainBuilder::new(config.domain_defaults.clone()),
            settler,
            config,
        }
    }

    pub fn settler(&self) -> &Arc<dyn Settler> {
        &self.settler
    }

    pub fn domain_builder(&self) -> &DomainBuilder {
        &self.domains
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    /// Local verification: business rules, domain derivation, signature
    pub fn verify(
        &self,
        requirement: &PaymentRequirement,
        payment: &PaymentPayload,
        now: i64,
    ) -> Result<ParsedAuthorization> {
        let authorization = self.validator.validate(payment, requirement, now)?;
        let domain = self.domains.build(requirement)?;
        let verification =
            verify_authorization(&domain, &authorization, &payment.payload.signature)?;

        if verification.verified {
            return Ok(authorization);
        }

        let reason = match verification.recovered {
            Some(recovered) => SignatureFailure::SignerMismatch {
                expected: format!("{:?}", authorization.from),
                recovered: format!("{:?}", recovered),
                domain: domain.to_string(),
            },
            None => SignatureFailure::Unrecoverable {
                domain: domain.to_string(),
            },
        };
        Err(X402Error::SignatureInvalid { reason })
    }

    /// Verify `payment`, run `execute`, and settle if it succeeded
    pub async fn process<F, Fut, T, E>(
        &self,
        requirement: &PaymentRequirement,
        payment: &PaymentPayload,
        execute: F,
    ) -> std::result::Result<Settled<T>, Rejection<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = std::result::Result<T, E>>,
        E: fmt::Display,
    {
        let mut trace = SettlementTrace::new();
        let payer = payment.payer().to_string();

        let verified = match self.verify(requirement, payment, unix_now()) {
            Ok(authorization) => self
                .settler
                .verify(requirement, payment)
                .await
                .map(|()| authorization),
            Err(error) => Err(error),
        };
        let authorization = match verified {
            Ok(authorization) => authorization,
            Err(error) => {
                tracing::warn!(
                    "Rejected payment from {} ({}): {}",
                    payer,
                    error.reason_code(),
                    error
                );
                enter(&mut trace, SettlementState::Failed);
                return Err(Rejection {
                    error,
                    service_error: None,
                    outcome: None,
                    trace,
                });
            }
        };
        enter(&mut trace, SettlementState::Verified);

        enter(&mut trace, SettlementState::Executing);
        let output = match execute().await {
            Ok(output) => output,
            Err(service_error) => {
                tracing::warn!(
                    "Service failed for payer {}, authorization left unsettled: {}",
                    payer,
                    service_error
                );
                enter(&mut trace, SettlementState::Failed);
                return Err(Rejection {
                    error: X402Error::ServiceExecutionFailed(service_error.to_string()),
                    service_error: Some(service_error),
                    outcome: None,
                    trace,
                });
            }
        };

        enter(&mut trace, SettlementState::Settling);
        match self.settle(requirement, payment, &authorization).await {
            Ok(outcome) => {
                tracing::info!(
                    "Settled payment from {} on {} via {} (transaction {:?})",
                    payer,
                    outcome.network,
                    self.settler.mode(),
                    outcome.transaction
                );
                enter(&mut trace, SettlementState::Settled);
                Ok(Settled {
                    output,
                    outcome,
                    trace,
                })
            }
            Err(error) => {
                tracing::error!("Settlement for payer {} did not complete: {}", payer, error);
                enter(&mut trace, SettlementState::Failed);
                let outcome =
                    SettlementOutcome::from_error(&requirement.network, Some(payer), &error);
                Err(Rejection {
                    error,
                    service_error: None,
                    outcome: Some(outcome),
                    trace,
                })
            }
        }
    }

    async fn settle(
        &self,
        requirement: &PaymentRequirement,
        payment: &PaymentPayload,
        authorization: &ParsedAuthorization,
    ) -> Result<SettlementOutcome> {
        let mut attempt = 0u32;
        let mut earlier_ambiguous: Option<X402Error> = None;

        loop {
            attempt += 1;
            let started = Instant::now();
            let result = match tokio::time::timeout(
                self.config.settlement_timeout,
                self.settler.settle(requirement, payment),
            )
            .await
            {
                Ok(result) => result,
                Err(_) => Err(X402Error::SettlementTimeout {
                    network: requirement.network.clone(),
                    transaction: self.settler.interrupted_transaction(payment).await,
                    elapsed: started.elapsed(),
                }),
            };

            match result {
                Ok(outcome) => return Ok(outcome),
                Err(error) if error.is_ambiguous() => {
                    if !self.may_retry(attempt, authorization, unix_now()) {
                        return Err(error);
                    }
                    tracing::warn!(
                        "Settlement attempt {} is ambiguous, retrying: {}",
                        attempt,
                        error
                    );
                    earlier_ambiguous = Some(error);
                }
                Err(error) => {
                    // An earlier attempt may still land, so the outcome stays ambiguous
                    return Err(match earlier_ambiguous {
                        Some(earlier) => {
                            tracing::warn!(
                                "Settlement attempt {} failed after an ambiguous attempt: {}",
                                attempt,
                                error
                            );
                            earlier
                        }
                        None => error,
                    });
                }
            }
        }
    }

    fn may_retry(&self, attempt: u32, authorization: &ParsedAuthorization, now: i64) -> bool {
        match self.config.timeout_policy {
            TimeoutPolicy::ManualReconciliation => false,
            TimeoutPolicy::RetryWhileFresh {
                attempts,
                min_remaining,
            } => {
                let remaining = authorization.valid_before as i128 - now as i128;
                attempt <= attempts && remaining >= min_remaining.as_secs() as i128
            }
        }
    }
}
