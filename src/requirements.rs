//! Payment requirement generation
//!
//! Everything that can be wrong with the configured price, recipient, asset or network is
//! caught once in [`RequirementGenerator::new`]; afterwards generating a requirement for a
//! resource cannot fail.

use crate::config::PaymentConfig;
use crate::crypto::domain::DomainDefaults;
use crate::types::network::chain_id_matches;
use crate::types::{parse_address, schemes, DomainOverrides, PaymentRequirement};
use crate::{Result, X402Error};

/// Produces the requirement advertised for a protected resource
#[derive(Debug, Clone)]
pub struct RequirementGenerator {
    template: PaymentRequirement,
    resource_root_url: Option<String>,
    domain_defaults: DomainDefaults,
}

impl RequirementGenerator {
    /// Validate `config` and prepare the requirement template
    pub fn new(config: &PaymentConfig) -> Result<Self> {
        let chain_id = config.resolved_chain_id()?;
        if !chain_id_matches(&config.network, chain_id) {
            return Err(X402Error::config(format!(
                "chain id {} does not belong to network '{}'",
                chain_id, config.network
            )));
        }

        let asset = config.resolved_asset()?;
        parse_address(&asset, "asset")
            .map_err(|_| X402Error::config(format!("Invalid asset address: {}", asset)))?;
        parse_address(&config.pay_to, "payTo").map_err(|_| {
            X402Error::config(format!("Invalid recipient address: {}", config.pay_to))
        })?;

        let amount = config.price.to_atomic()?;
        let domain_defaults = config.domain_defaults();

        // Advertise the domain so clients sign exactly what the builder will recompute
        let extra = DomainOverrides {
            name: domain_defaults.name.clone(),
            version: config.token_version.clone(),
        };

        let template = PaymentRequirement {
            scheme: schemes::TRANSFER_WITH_AUTHORIZATION.to_string(),
            network: config.network.clone(),
            chain_id,
            max_amount_required: amount.to_string(),
            asset,
            pay_to: config.pay_to.clone(),
            resource: String::new(),
            description: config.description.clone().unwrap_or_default(),
            mime_type: config.mime_type.clone(),
            max_timeout_seconds: config.max_timeout_seconds,
            extra: (!extra.is_empty()).then_some(extra),
        };

        Ok(Self {
            template,
            resource_root_url: config
                .resource_root_url
                .as_ref()
                .map(|url| url.trim_end_matches('/').to_string()),
            domain_defaults,
        })
    }

    /// Requirement for `resource` (a path or a full URL)
    pub fn generate(&self, resource: &str) -> PaymentRequirement {
        let mut requirement = self.template.clone();
        requirement.resource = match &self.resource_root_url {
            Some(root) if resource.starts_with('/') => format!("{}{}", root, resource),
            _ => resource.to_string(),
        };
        requirement
    }

    /// Domain defaults matching the advertised requirement
    pub fn domain_defaults(&self) -> &DomainDefaults {
        &self.domain_defaults
    }
}
