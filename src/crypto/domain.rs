//! Typed-data domain derivation
//!
//! The domain a server recomputes must be byte-identical to the one the client signed.
//! Name and version resolve in a fixed order: requirement override, then process default,
//! then protocol default (version only).

use super::eip712::Domain;
use crate::types::network::chain_id_matches;
use crate::types::{parse_address, PaymentRequirement, DEFAULT_DOMAIN_VERSION};
use crate::{Result, X402Error};

/// Process-wide domain defaults
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DomainDefaults {
    pub name: Option<String>,
    pub version: Option<String>,
}

impl DomainDefaults {
    pub fn new(name: Option<String>, version: Option<String>) -> Self {
        Self { name, version }
    }
}

/// Builds the EIP-712 domain for a requirement
#[derive(Debug, Clone, Default)]
pub struct DomainBuilder {
    defaults: DomainDefaults,
}

impl DomainBuilder {
    pub fn new(defaults: DomainDefaults) -> Self {
        Self { defaults }
    }

    pub fn defaults(&self) -> &DomainDefaults {
        &self.defaults
    }

    /// Resolve the domain name
    pub fn resolve_name(&self, requirement: &PaymentRequirement) -> Option<String> {
        requirement
            .extra
            .as_ref()
            .and_then(|extra| extra.name.clone())
            .or_else(|| self.defaults.name.clone())
    }

    /// Resolve the domain version
    pub fn resolve_version(&self, requirement: &PaymentRequirement) -> String {
        requirement
            .extra
            .as_ref()
            .and_then(|extra| extra.version.clone())
            .or_else(|| self.defaults.version.clone())
            .unwrap_or_else(|| DEFAULT_DOMAIN_VERSION.to_string())
    }

    /// Derive the domain the payer must have signed
    pub fn build(&self, requirement: &PaymentRequirement) -> Result<Domain> {
        let name = self.resolve_name(requirement).ok_or_else(|| {
            X402Error::domain_mismatch(format!(
                "no token name configured for asset {}",
                requirement.asset
            ))
        })?;

        if !chain_id_matches(&requirement.network, requirement.chain_id) {
            return Err(X402Error::domain_mismatch(format!(
                "chain id {} does not belong to network '{}'",
                requirement.chain_id, requirement.network
            )));
        }

        let verifying_contract = parse_address(&requirement.asset, "asset").map_err(|_| {
            X402Error::domain_mismatch(format!(
                "asset '{}' is not a contract address",
                requirement.asset
            ))
        })?;

        Ok(Domain {
            name,
            version: self.resolve_version(requirement),
            chain_id: requirement.chain_id,
            verifying_contract,
        })
    }
}
