//! Payment gate middleware for axum

use super::response::{error_response, payment_required};
use crate::config::GateConfig;
use crate::requirements::RequirementGenerator;
use crate::settlement::{build_settler, Orchestrator, OrchestratorConfig};
use crate::types::{PaymentPayload, PaymentRequirement, PAYMENT_HEADER, PAYMENT_RESPONSE_HEADER};
use crate::{Result, X402Error};
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use http::HeaderValue;
use std::fmt;
use std::sync::Arc;
use tracing::Instrument;

/// Shared, immutable state of the gate
#[derive(Clone, Debug)]
pub struct PaymentGate {
    generator: Arc<RequirementGenerator>,
    orchestrator: Orchestrator,
}

/// Unsuccessful response of the protected handler, passed back to the client unchanged
pub struct ServiceFailure(pub Response);

impl fmt::Display for ServiceFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "handler responded with status {}", self.0.status())
    }
}

impl PaymentGate {
    pub fn new(generator: RequirementGenerator, orchestrator: Orchestrator) -> Self {
        Self {
            generator: Arc::new(generator),
            orchestrator,
        }
    }

    /// Build the generator, settler and orchestrator described by `config`
    pub fn from_config(config: &GateConfig) -> Result<Self> {
        let generator = RequirementGenerator::new(&config.payment)?;
        let chain_id = config.payment.resolved_chain_id()?;
        let settler = build_settler(&config.settlement, chain_id)?;
        let orchestrator = Orchestrator::new(
            settler,
            OrchestratorConfig::from_gate(config, generator.domain_defaults().clone()),
        );

        tracing::info!(
            "Payment gate on {} (chain {}) settling via {}",
            config.payment.network,
            chain_id,
            orchestrator.settler().mode()
        );
        Ok(Self::new(generator, orchestrator))
    }

    pub fn orchestrator(&self) -> &Orchestrator {
        &self.orchestrator
    }

    /// Requirement advertised for `path`
    pub fn requirement_for(&self, path: &str) -> PaymentRequirement {
        self.generator.generate(path)
    }

    /// Gate one request
    pub async fn handle(&self, request: Request, next: Next) -> Response {
        let request_id = uuid::Uuid::new_v4();
        let span = tracing::info_span!(
            "payment",
            request_id = %request_id,
            path = %request.uri().path()
        );
        self.handle_inner(request, next).instrument(span).await
    }

    async fn handle_inner(&self, request: Request, next: Next) -> Response {
        let requirement = self.requirement_for(request.uri().path());

        let payment = match request.headers().get(PAYMENT_HEADER) {
            None => return payment_required(&requirement),
            Some(header) => header
                .to_str()
                .map_err(|_| X402Error::malformed("payment header is not valid ASCII"))
                .and_then(PaymentPayload::from_base64),
        };
        let payment = match payment {
            Ok(payment) => payment,
            Err(error) => {
                tracing::warn!("Undecodable payment header: {}", error);
                return error_response(&error, Some(&requirement), None);
            }
        };

        let result = self
            .orchestrator
            .process(&requirement, &payment, move || async move {
                let response = next.run(request).await;
                let status = response.status();
                if status.is_client_error() || status.is_server_error() {
                    Err(ServiceFailure(response))
                } else {
                    Ok(response)
                }
            })
            .await;

        match result {
            Ok(settled) => {
                let mut response = settled.output;
                match settled.outcome.to_base64() {
                    Ok(encoded) => match HeaderValue::from_str(&encoded) {
                        Ok(value) => {
                            response
                                .headers_mut()
                                .insert(PAYMENT_RESPONSE_HEADER, value);
                        }
                        Err(e) => tracing::error!("Settlement header is not a header value: {}", e),
                    },
                    Err(e) => tracing::error!("Failed to encode settlement response: {}", e),
                }
                response
            }
            Err(rejection) => match rejection.service_error {
                Some(ServiceFailure(response)) => response,
                None => error_response(&rejection.error, Some(&requirement), rejection.outcome),
            },
        }
    }
}

/// Axum middleware function gating the wrapped routes behind payment
pub async fn payment_gate(
    State(gate): State<PaymentGate>,
    request: Request,
    next: Next,
) -> Response {
    gate.handle(request, next).await
}
