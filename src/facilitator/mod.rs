//! Facilitator client for payment verification and settlement
//!
//! A facilitator is a remote service that checks a signed authorization (`/verify`) and
//! executes it on chain (`/settle`). The gate trusts its answers and does not confirm
//! settlement on chain itself.
//!
//! # Examples
//!
//! ```no_run
//! use x402_gate::facilitator::FacilitatorClient;
//! use x402_gate::types::{FacilitatorConfig, PaymentPayload, PaymentRequirement};
//!
//! # async fn example(payment: PaymentPayload, requirement: PaymentRequirement) -> x402_gate::Result<()> {
//! let client = FacilitatorClient::new(FacilitatorConfig::new("https://x402.org/facilitator"))?;
//!
//! if client.verify(&payment, &requirement).await?.is_valid {
//!     let settled = client.settle(&payment, &requirement).await?;
//!     println!("settled in {:?}", settled.transaction);
//! }
//! # Ok(())
//! # }
//! ```

use crate::types::{
    FacilitatorConfig, FacilitatorEndpoint, FacilitatorRequest, PaymentPayload,
    PaymentRequirement, SettleResponse, SupportedKinds, VerifyResponse,
};
use crate::{Result, X402Error};
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;


/// HTTP client for one facilitator
#[derive(Debug, Clone)]
pub struct FacilitatorClient {
    config: FacilitatorConfig,
    client: Client,
}

impl FacilitatorClient {
    pub fn new(config: FacilitatorConfig) -> Result<Self> {
        config.validate()?;

        let mut builder = Client::builder();
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|e| X402Error::config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { config, client })
    }

    /// Base URL of this facilitator
    pub fn url(&self) -> &str {
        &self.config.url
    }

    /// Ask whether `payment` satisfies `requirement`, without executing it
    pub async fn verify(
        &self,
        payment: &PaymentPayload,
        requirement: &PaymentRequirement,
    ) -> Result<VerifyResponse> {
        let body = FacilitatorRequest::new(payment, requirement);
        let response: VerifyResponse = self.post(FacilitatorEndpoint::Verify, &body).await?;
        tracing::debug!(
            "Facilitator verify answered isValid={} reason={:?}",
            response.is_valid,
            response.invalid_reason
        );
        Ok(response)
    }

    /// Execute the transfer
    pub async fn settle(
        &self,
        payment: &PaymentPayload,
        requirement: &PaymentRequirement,
    ) -> Result<SettleResponse> {
        let body = FacilitatorRequest::new(payment, requirement);
        self.post(FacilitatorEndpoint::Settle, &body).await
    }

    /// Schemes and networks the facilitator handles
    pub async fn supported(&self) -> Result<SupportedKinds> {
        let endpoint = FacilitatorEndpoint::Supported;
        let request = self.client.get(self.config.endpoint_url(endpoint));
        self.send(endpoint, request).await
    }

    async fn post<R: DeserializeOwned>(
        &self,
        endpoint: FacilitatorEndpoint,
        body: &FacilitatorRequest,
    ) -> Result<R> {
        tracing::debug!(
            "Facilitator {} request body: {}",
            endpoint,
            serde_json::to_string(body).unwrap_or_default()
        );
        let request = self
            .client
            .post(self.config.endpoint_url(endpoint))
            .json(body);
        self.send(endpoint, request).await
    }

    async fn send<R: DeserializeOwned>(
        &self,
        endpoint: FacilitatorEndpoint,
        mut request: RequestBuilder,
    ) -> Result<R> {
        if let Some(provider) = &self.config.auth_headers {
            for (name, value) in provider(endpoint)? {
                request = request.header(name, value);
            }
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!("Facilitator {} answered {}: {}", endpoint, status, body);
            return Err(X402Error::facilitator_error(format!(
                "{} returned status {}: {}",
                endpoint, status, body
            )));
        }

        Ok(response.json().await?)
    }
}
