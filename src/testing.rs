//! Fixtures shared by the settlement and middleware tests

use crate::config::{PaymentConfig, Price};
use crate::crypto::eip712::Domain;
use crate::crypto::signature::generate_nonce;
use crate::error::SettlementFailure;
use crate::requirements::RequirementGenerator;
use crate::settlement::Settler;
use crate::types::{
    parse_address, ParsedAuthorization, PaymentPayload, PaymentRequirement, SettlementOutcome,
};
use crate::wallet::Wallet;
use crate::{Result, X402Error};
use async_trait::async_trait;
use ethereum_types::U256;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

pub const NETWORK: &str = "devnet";
pub const CHAIN_ID: u64 = 1001;
pub const TOKEN: &str = "0x036CbD53842c5426634e7929541eC2318f3dCF7e";
pub const PAY_TO: &str = "0x209693Bc6afc0C5328bA36FaF03C514EF312287C";
pub const TX_HASH: &str = "0x5b1c6e2c9c6f3b0a8d1e7f4a2b3c4d5e6f708192a3b4c5d6e7f8091a2b3c4d5e";

pub fn payment_config() -> PaymentConfig {
    PaymentConfig::new(NETWORK, PAY_TO, Price::Atomic(U256::from(100_000u64)))
        .with_chain_id(CHAIN_ID)
        .with_asset(TOKEN)
        .with_token_domain("TOK", "2")
        .with_description("Weather report")
}

pub fn generator() -> RequirementGenerator {
    match RequirementGenerator::new(&payment_config()) {
        Ok(generator) => generator,
        Err(e) => panic!("fixture config rejected: {}", e),
    }
}

pub fn requirement() -> PaymentRequirement {
    generator().generate("/weather")
}

/// Domain a client signs under, for `chain_id`
pub fn domain(chain_id: u64) -> Domain {
    Domain {
        name: "TOK".to_string(),
        version: "2".to_string(),
        chain_id,
        verifying_contract: parse_address(TOKEN, "asset").unwrap(),
    }
}

pub fn now() -> i64 {
    chrono::Utc::now().timestamp()
}

pub fn authorization(payer: &Wallet, value: u64, valid_before: i64) -> ParsedAuthorization {
    ParsedAuthorization {
        from: payer.address(),
        to: parse_address(PAY_TO, "payTo").unwrap(),
        value: U256::from(value),
        valid_after: 0,
        valid_before: valid_before as u64,
        nonce: generate_nonce(),
    }
}

/// Payment of `value` signed under `domain(chain_id)`, valid for the next hour
pub fn signed_payment(payer: &Wallet, chain_id: u64, value: u64) -> PaymentPayload {
    let auth = authorization(payer, value, now() + 3600);
    payer
        .create_payment(NETWORK, &domain(chain_id), &auth)
        .unwrap()
}

/// What a [`ScriptedSettler`] does on one `settle` call
#[derive(Debug, Clone)]
pub enum Step {
    Settle,
    Fail(&'static str),
    Hang,
}

/// Settler replaying a script of outcomes, counting calls
#[derive(Debug)]
pub struct ScriptedSettler {
    script: Mutex<VecDeque<Step>>,
    calls: AtomicUsize,
}

impl ScriptedSettler {
    pub fn new(steps: impl IntoIterator<Item = Step>) -> Self {
        Self {
            script: Mutex::new(steps.into_iter().collect()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Settler for ScriptedSettler {
    fn mode(&self) -> &'static str {
        "scripted"
    }

    async fn settle(
        &self,
        requirement: &PaymentRequirement,
        payment: &PaymentPayload,
    ) -> Result<SettlementOutcome> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let step = self
            .script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Step::Settle);

        match step {
            Step::Settle => Ok(SettlementOutcome::settled(
                &requirement.network,
                Some(TX_HASH.to_string()),
                Some(payment.payer().to_string()),
            )),
            Step::Fail(reason) => Err(X402Error::settlement_failed(
                &requirement.network,
                SettlementFailure::Facilitator(reason.to_string()),
            )),
            Step::Hang => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Err(X402Error::facilitator_error("woke from hang"))
            }
        }
    }
}

/// Address of a listener that accepts connections and never answers
pub async fn silent_server() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((stream, _)) = listener.accept().await {
            held.push(stream);
        }
    });
    format!("http://{}", address)
}
