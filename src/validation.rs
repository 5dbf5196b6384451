//! Business-level validation of a claimed authorization
//!
//! Checks run in a fixed order and stop at the first failure: scheme and network,
//! recipient, amount, then the validity window. Nothing here touches the network or
//! tracks nonces; replay protection belongs to whoever executes the transfer.

use crate::error::ValidationReason;
use crate::types::{parse_address, ParsedAuthorization, PaymentPayload, PaymentRequirement};
use crate::{Result, X402Error};
use std::time::Duration;

/// Validates authorizations against a requirement and a clock
#[derive(Debug, Clone, Copy, Default)]
pub struct AuthorizationValidator {
    clock_skew: Duration,
}

impl AuthorizationValidator {
    /// Create a validator tolerating `clock_skew` on both ends of the window
    pub fn new(clock_skew: Duration) -> Self {
        Self { clock_skew }
    }

    pub fn clock_skew(&self) -> Duration {
        self.clock_skew
    }

    /// Validate `payment` against `requirement` at unix time `now`
    pub fn validate(
        &self,
        payment: &PaymentPayload,
        requirement: &PaymentRequirement,
        now: i64,
    ) -> Result<ParsedAuthorization> {
        if payment.scheme != requirement.scheme {
            return Err(X402Error::validation(ValidationReason::SchemeMismatch {
                expected: requirement.scheme.clone(),
                actual: payment.scheme.clone(),
            }));
        }
        if payment.network != requirement.network {
            return Err(X402Error::validation(ValidationReason::NetworkMismatch {
                expected: requirement.network.clone(),
                actual: payment.network.clone(),
            }));
        }

        let authorization = payment.payload.authorization.parse()?;

        let recipient = parse_address(&requirement.pay_to, "payTo")
            .map_err(|e| X402Error::config(format!("Invalid requirement recipient: {}", e)))?;
        if authorization.to != recipient {
            return Err(X402Error::validation(ValidationReason::RecipientMismatch {
                expected: requirement.pay_to.clone(),
                actual: payment.payload.authorization.to.clone(),
            }));
        }

        let required = requirement.amount()?;
        if authorization.value < required {
            return Err(X402Error::validation(ValidationReason::InsufficientAmount {
                required: required.to_string(),
                provided: authorization.value.to_string(),
            }));
        }

        self.check_window(&authorization, now)?;

        Ok(authorization)
    }

    fn check_window(&self, authorization: &ParsedAuthorization, now: i64) -> Result<()> {
        let (valid_after, valid_before) = (authorization.valid_after, authorization.valid_before);
        if valid_after >= valid_before {
            return Err(X402Error::validation(
                ValidationReason::InvalidValidityWindow {
                    valid_after,
                    valid_before,
                },
            ));
        }

        let skew = self.clock_skew.as_secs() as i128;
        let now_wide = now as i128;

        if now_wide + skew < valid_after as i128 {
            return Err(X402Error::validation(ValidationReason::NotYetValid {
                valid_after,
                now,
            }));
        }
        if now_wide - skew >= valid_before as i128 {
            return Err(X402Error::validation(ValidationReason::Expired {
                valid_before,
                now,
            }));
        }

        Ok(())
    }
}
