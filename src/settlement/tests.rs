//! Tests for settlement orchestration

use super::direct::{encode_transfer_with_authorization, transferWithAuthorizationCall};
use super::state::SettlementState::{Executing, Failed, Pending, Settling, Verified};
use super::*;
use crate::blockchain::{BroadcastError, ChainClient, SignedCall, TransactionReceipt};
use crate::config::TimeoutPolicy;
use crate::crypto::signature::SignatureParts;
use crate::error::{SettlementFailure, SignatureFailure, ValidationReason};
use crate::testing::{self, ScriptedSettler, Step};
use crate::types::{FacilitatorConfig, SettlementStatus};
use crate::wallet::Wallet;
use crate::X402Error;
use alloy::sol_types::SolCall;
use ethereum_types::{Address, H256};
use mockito::Server;
use serde_json::json;
use std::collections::VecDeque;
use std::str::FromStr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

fn orchestrator(settler: Arc<dyn Settler>, timeout: Duration, policy: TimeoutPolicy) -> Orchestrator {
    let config = OrchestratorConfig::new(testing::generator().domain_defaults().clone())
        .with_settlement_timeout(timeout)
        .with_timeout_policy(policy);
    Orchestrator::new(settler, config)
}

async fn run(
    orchestrator: &Orchestrator,
    payment: &crate::types::PaymentPayload,
    executions: &AtomicUsize,
) -> std::result::Result<Settled<&'static str>, Rejection<String>> {
    orchestrator
        .process(&testing::requirement(), payment, move || async move {
            executions.fetch_add(1, Ordering::SeqCst);
            Ok::<_, String>("sunny")
        })
        .await
}

#[tokio::test]
async fn test_valid_payment_reaches_settled() {
    let payer = Wallet::random();
    let settler = Arc::new(ScriptedSettler::new([Step::Settle]));
    let orchestrator = orchestrator(
        settler.clone(),
        Duration::from_secs(5),
        TimeoutPolicy::ManualReconciliation,
    );
    let executions = AtomicUsize::new(0);

    let payment = testing::signed_payment(&payer, testing::CHAIN_ID, 100_000);
    let settled = run(&orchestrator, &payment, &executions).await.unwrap();

    assert_eq!(settled.output, "sunny");
    assert!(settled.outcome.success);
    assert_eq!(settled.outcome.status, SettlementStatus::Settled);
    assert_eq!(settled.outcome.transaction.as_deref(), Some(testing::TX_HASH));
    assert_eq!(
        settled.trace.states(),
        &[
            Pending,
            Verified,
            Executing,
            Settling,
            SettlementState::Settled
        ]
    );
    assert_eq!(executions.load(Ordering::SeqCst), 1);
    assert_eq!(settler.calls(), 1);
}

#[tokio::test]
async fn test_wrong_chain_id_in_signed_domain_is_signature_invalid() {
    let payer = Wallet::random();
    let settler = Arc::new(ScriptedSettler::new([]));
    let orchestrator = orchestrator(
        settler.clone(),
        Duration::from_secs(5),
        TimeoutPolicy::ManualReconciliation,
    );
    let executions = AtomicUsize::new(0);

    let payment = testing::signed_payment(&payer, 1002, 100_000);
    let rejection = run(&orchestrator, &payment, &executions).await.unwrap_err();

    match &rejection.error {
        X402Error::SignatureInvalid {
            reason: SignatureFailure::SignerMismatch { domain, .. },
        } => assert!(domain.contains("1001"), "domain {}", domain),
        other => panic!("expected signer mismatch, got {:?}", other),
    }
    assert_eq!(rejection.trace.states(), &[Pending, Failed]);
    assert!(rejection.outcome.is_none());
    assert_eq!(executions.load(Ordering::SeqCst), 0);
    assert_eq!(settler.calls(), 0);
}

#[tokio::test]
async fn test_validation_failure_has_no_side_effects() {
    let payer = Wallet::random();
    let settler = Arc::new(ScriptedSettler::new([]));
    let orchestrator = orchestrator(
        settler.clone(),
        Duration::from_secs(5),
        TimeoutPolicy::ManualReconciliation,
    );
    let executions = AtomicUsize::new(0);

    let payment = testing::signed_payment(&payer, testing::CHAIN_ID, 99_999);
    let rejection = run(&orchestrator, &payment, &executions).await.unwrap_err();

    assert_eq!(rejection.error.reason_code(), "insufficient_amount");
    assert_eq!(executions.load(Ordering::SeqCst), 0);
    assert_eq!(settler.calls(), 0);
}

#[tokio::test]
async fn test_service_failure_never_settles() {
    let payer = Wallet::random();
    let settler = Arc::new(ScriptedSettler::new([]));
    let orchestrator = orchestrator(
        settler.clone(),
        Duration::from_secs(5),
        TimeoutPolicy::ManualReconciliation,
    );

    let payment = testing::signed_payment(&payer, testing::CHAIN_ID, 100_000);
    let rejection = orchestrator
        .process(&testing::requirement(), &payment, || async {
            Err::<(), _>("upstream down".to_string())
        })
        .await
        .unwrap_err();

    assert!(matches!(rejection.error, X402Error::ServiceExecutionFailed(_)));
    assert_eq!(rejection.service_error.as_deref(), Some("upstream down"));
    assert_eq!(
        rejection.trace.states(),
        &[Pending, Verified, Executing, Failed]
    );
    assert!(!rejection.trace.visited(Settling));
    assert_eq!(settler.calls(), 0);
}

#[tokio::test]
async fn test_definite_settlement_failure() {
    let payer = Wallet::random();
    let settler = Arc::new(ScriptedSettler::new([Step::Fail("insufficient_funds")]));
    let orchestrator = orchestrator(
        settler.clone(),
        Duration::from_secs(5),
        TimeoutPolicy::RetryWhileFresh {
            attempts: 3,
            min_remaining: Duration::ZERO,
        },
    );
    let executions = AtomicUsize::new(0);

    let payment = testing::signed_payment(&payer, testing::CHAIN_ID, 100_000);
    let rejection = run(&orchestrator, &payment, &executions).await.unwrap_err();

    assert!(matches!(
        rejection.error,
        X402Error::SettlementFailed {
            reason: SettlementFailure::Facilitator(_),
            ..
        }
    ));
    let outcome = rejection.outcome.unwrap();
    assert_eq!(outcome.status, SettlementStatus::Failed);
    assert!(!outcome.success);
    assert_eq!(
        rejection.trace.states(),
        &[Pending, Verified, Executing, Settling, Failed]
    );
    // Definite failures are never retried
    assert_eq!(settler.calls(), 1);
}

#[tokio::test]
async fn test_facilitator_timeout_is_ambiguous() {
    let payer = Wallet::random();
    let config = FacilitatorConfig::new(testing::silent_server().await)
        .with_timeout(Duration::from_millis(100));
    let settler = Arc::new(FacilitatorSettler::new(
        crate::facilitator::FacilitatorClient::new(config).unwrap(),
        false,
    ));
    let orchestrator = orchestrator(
        settler,
        Duration::from_secs(10),
        TimeoutPolicy::ManualReconciliation,
    );
    let executions = AtomicUsize::new(0);

    let payment = testing::signed_payment(&payer, testing::CHAIN_ID, 100_000);
    let rejection = run(&orchestrator, &payment, &executions).await.unwrap_err();

    assert!(matches!(rejection.error, X402Error::SettlementTimeout { .. }));
    assert!(rejection.error.is_ambiguous());
    let outcome = rejection.outcome.unwrap();
    assert_eq!(outcome.status, SettlementStatus::Ambiguous);
    assert!(!outcome.success);
    assert_eq!(outcome.error_reason.as_deref(), Some("settlement_timeout"));
    assert_eq!(executions.load(Ordering::SeqCst), 1);
    assert_eq!(rejection.trace.current(), Failed);
}

#[tokio::test]
async fn test_orchestrator_bounds_a_hanging_settler() {
    let payer = Wallet::random();
    let settler = Arc::new(ScriptedSettler::new([Step::Hang]));
    let orchestrator = orchestrator(
        settler.clone(),
        Duration::from_millis(50),
        TimeoutPolicy::ManualReconciliation,
    );
    let executions = AtomicUsize::new(0);

    let payment = testing::signed_payment(&payer, testing::CHAIN_ID, 100_000);
    let rejection = run(&orchestrator, &payment, &executions).await.unwrap_err();

    assert!(rejection.error.is_ambiguous());
    assert_eq!(settler.calls(), 1);
}

#[tokio::test]
async fn test_retry_while_fresh_resubmits_after_timeout() {
    let payer = Wallet::random();
    let settler = Arc::new(ScriptedSettler::new([Step::Hang, Step::Settle]));
    let orchestrator = orchestrator(
        settler.clone(),
        Duration::from_millis(50),
        TimeoutPolicy::RetryWhileFresh {
            attempts: 2,
            min_remaining: Duration::from_secs(60),
        },
    );
    let executions = AtomicUsize::new(0);

    let payment = testing::signed_payment(&payer, testing::CHAIN_ID, 100_000);
    let settled = run(&orchestrator, &payment, &executions).await.unwrap();

    assert!(settled.outcome.success);
    assert_eq!(settler.calls(), 2);
    assert_eq!(executions.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_retry_stops_after_attempt_budget() {
    let payer = Wallet::random();
    let settler = Arc::new(ScriptedSettler::new([Step::Hang, Step::Hang, Step::Hang]));
    let orchestrator = orchestrator(
        settler.clone(),
        Duration::from_millis(30),
        TimeoutPolicy::RetryWhileFresh {
            attempts: 1,
            min_remaining: Duration::ZERO,
        },
    );
    let executions = AtomicUsize::new(0);

    let payment = testing::signed_payment(&payer, testing::CHAIN_ID, 100_000);
    let rejection = run(&orchestrator, &payment, &executions).await.unwrap_err();

    assert!(rejection.error.is_ambiguous());
    assert_eq!(settler.calls(), 2);
}

#[tokio::test]
async fn test_no_retry_when_authorization_is_about_to_expire() {
    let payer = Wallet::random();
    let settler = Arc::new(ScriptedSettler::new([Step::Hang, Step::Settle]));
    let orchestrator = orchestrator(
        settler.clone(),
        Duration::from_millis(30),
        TimeoutPolicy::RetryWhileFresh {
            attempts: 5,
            // Payment is valid for one hour
            min_remaining: Duration::from_secs(7200),
        },
    );
    let executions = AtomicUsize::new(0);

    let payment = testing::signed_payment(&payer, testing::CHAIN_ID, 100_000);
    let rejection = run(&orchestrator, &payment, &executions).await.unwrap_err();

    assert!(rejection.error.is_ambiguous());
    assert_eq!(settler.calls(), 1);
}

#[tokio::test]
async fn test_failure_after_timeout_stays_ambiguous() {
    let payer = Wallet::random();
    let settler = Arc::new(ScriptedSettler::new([Step::Hang, Step::Fail("nonce_used")]));
    let orchestrator = orchestrator(
        settler.clone(),
        Duration::from_millis(30),
        TimeoutPolicy::RetryWhileFresh {
            attempts: 3,
            min_remaining: Duration::ZERO,
        },
    );
    let executions = AtomicUsize::new(0);

    let payment = testing::signed_payment(&payer, testing::CHAIN_ID, 100_000);
    let rejection = run(&orchestrator, &payment, &executions).await.unwrap_err();

    assert!(matches!(rejection.error, X402Error::SettlementTimeout { .. }));
    assert_eq!(
        rejection.outcome.unwrap().status,
        SettlementStatus::Ambiguous
    );
    assert_eq!(settler.calls(), 2);
}

#[tokio::test]
async fn test_facilitator_pre_verification_rejects_before_execution() {
    let mut server = Server::new_async().await;
    let verify = server
        .mock("POST", "/verify")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(json!({ "isValid": false, "invalidReason": "nonce_already_used" }).to_string())
        .create_async()
        .await;
    let settle = server
        .mock("POST", "/settle")
        .expect(0)
        .create_async()
        .await;

    let mode = crate::config::SettlementMode::Facilitator(
        FacilitatorConfig::new(server.url()).with_verify_before_execution(true),
    );
    let settler = build_settler(&mode, testing::CHAIN_ID).unwrap();
    assert_eq!(settler.mode(), "facilitator");
    let orchestrator = orchestrator(
        settler,
        Duration::from_secs(5),
        TimeoutPolicy::ManualReconciliation,
    );
    let executions = AtomicUsize::new(0);

    let payment = testing::signed_payment(&Wallet::random(), testing::CHAIN_ID, 100_000);
    let rejection = run(&orchestrator, &payment, &executions).await.unwrap_err();

    match rejection.error {
        X402Error::ValidationFailed {
            reason: ValidationReason::FacilitatorRejected(reason),
        } => assert_eq!(reason, "nonce_already_used"),
        other => panic!("expected facilitator rejection, got {:?}", other),
    }
    assert_eq!(executions.load(Ordering::SeqCst), 0);
    verify.assert_async().await;
    settle.assert_async().await;
}

#[tokio::test]
async fn test_facilitator_settlement_end_to_end() {
    let mut server = Server::new_async().await;
    let _settle = server
        .mock("POST", "/settle")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            json!({ "success": true, "transaction": testing::TX_HASH, "network": testing::NETWORK })
                .to_string(),
        )
        .create_async()
        .await;

    let mode =
        crate::config::SettlementMode::Facilitator(FacilitatorConfig::new(server.url()));
    let orchestrator = orchestrator(
        build_settler(&mode, testing::CHAIN_ID).unwrap(),
        Duration::from_secs(5),
        TimeoutPolicy::ManualReconciliation,
    );
    let payer = Wallet::random();
    let executions = AtomicUsize::new(0);

    let payment = testing::signed_payment(&payer, testing::CHAIN_ID, 100_000);
    let settled = run(&orchestrator, &payment, &executions).await.unwrap();

    assert_eq!(settled.outcome.transaction.as_deref(), Some(testing::TX_HASH));
    assert_eq!(
        settled.outcome.payer,
        Some(format!("{:?}", payer.address()))
    );
}

#[tokio::test]
async fn test_unreadable_facilitator_answer_is_ambiguous() {
    let mut server = Server::new_async().await;
    let settle = server
        .mock("POST", "/settle")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"success": tru"#)
        .expect(1)
        .create_async()
        .await;

    let mode =
        crate::config::SettlementMode::Facilitator(FacilitatorConfig::new(server.url()));
    let orchestrator = orchestrator(
        build_settler(&mode, testing::CHAIN_ID).unwrap(),
        Duration::from_secs(5),
        TimeoutPolicy::ManualReconciliation,
    );
    let executions = AtomicUsize::new(0);

    let payment = testing::signed_payment(&Wallet::random(), testing::CHAIN_ID, 100_000);
    let rejection = run(&orchestrator, &payment, &executions).await.unwrap_err();

    // The facilitator got the request and may have broadcast the transfer
    assert!(matches!(
        rejection.error,
        X402Error::SettlementUnconfirmed { .. }
    ));
    assert!(rejection.error.is_ambiguous());
    let outcome = rejection.outcome.unwrap();
    assert_eq!(outcome.status, SettlementStatus::Ambiguous);
    assert_eq!(outcome.error_reason.as_deref(), Some("settlement_unconfirmed"));
    settle.assert_async().await;
}

#[tokio::test]
async fn test_unreachable_facilitator_is_definite_failure() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let url = format!("http://{}", listener.local_addr().unwrap());
    drop(listener);

    let mode = crate::config::SettlementMode::Facilitator(FacilitatorConfig::new(url));
    let orchestrator = orchestrator(
        build_settler(&mode, testing::CHAIN_ID).unwrap(),
        Duration::from_secs(5),
        TimeoutPolicy::ManualReconciliation,
    );
    let executions = AtomicUsize::new(0);

    let payment = testing::signed_payment(&Wallet::random(), testing::CHAIN_ID, 100_000);
    let rejection = run(&orchestrator, &payment, &executions).await.unwrap_err();

    assert_eq!(rejection.error.reason_code(), "settlement_transport_error");
    assert!(!rejection.error.is_ambiguous());
    assert_eq!(rejection.outcome.unwrap().status, SettlementStatus::Failed);
}

#[tokio::test]
async fn test_concurrent_requests_are_independent() {
    let settler = Arc::new(ScriptedSettler::new([Step::Hang]));
    let orchestrator = orchestrator(
        settler.clone(),
        Duration::from_millis(200),
        TimeoutPolicy::ManualReconciliation,
    );
    let stuck_payer = Wallet::random();
    let other_payer = Wallet::random();
    let stuck = testing::signed_payment(&stuck_payer, testing::CHAIN_ID, 100_000);
    let other = testing::signed_payment(&other_payer, testing::CHAIN_ID, 100_000);
    let executions = AtomicUsize::new(0);

    let (first, second) = tokio::join!(
        run(&orchestrator, &stuck, &executions),
        run(&orchestrator, &other, &executions)
    );

    // One of them hung in settlement, the other settled
    let outcomes = [first.is_ok(), second.is_ok()];
    assert_eq!(outcomes.iter().filter(|ok| **ok).count(), 1);
    assert_eq!(executions.load(Ordering::SeqCst), 2);
}

#[derive(Debug, Clone)]
enum Broadcast {
    Accept,
    Reject(&'static str),
    Unreachable(&'static str),
    Unconfirmed(&'static str),
    Hang,
}

struct MockChain {
    sign_error: Option<&'static str>,
    broadcast: Broadcast,
    receipts: Mutex<VecDeque<Option<TransactionReceipt>>>,
    signed: Mutex<Vec<(Address, Vec<u8>)>>,
    broadcasts: AtomicUsize,
}

impl MockChain {
    fn new(broadcast: Broadcast, receipts: Vec<Option<TransactionReceipt>>) -> Self {
        Self {
            sign_error: None,
            broadcast,
            receipts: Mutex::new(receipts.into()),
            signed: Mutex::new(Vec::new()),
            broadcasts: AtomicUsize::new(0),
        }
    }

    fn failing_to_sign(reason: &'static str) -> Self {
        Self {
            sign_error: Some(reason),
            ..Self::new(Broadcast::Accept, vec![])
        }
    }
}

fn tx_hash() -> H256 {
    H256::from_str(&testing::TX_HASH[2..]).unwrap()
}

#[async_trait::async_trait]
impl ChainClient for MockChain {
    async fn sign_call(&self, to: Address, data: Vec<u8>) -> crate::Result<SignedCall> {
        if let Some(reason) = self.sign_error {
            return Err(X402Error::rpc(reason));
        }
        self.signed.lock().unwrap().push((to, data.clone()));
        Ok(SignedCall {
            hash: tx_hash(),
            raw: data,
        })
    }

    async fn broadcast(&self, call: &SignedCall) -> std::result::Result<H256, BroadcastError> {
        self.broadcasts.fetch_add(1, Ordering::SeqCst);
        match self.broadcast {
            Broadcast::Accept => Ok(call.hash),
            Broadcast::Reject(reason) => Err(BroadcastError::Rejected(reason.to_string())),
            Broadcast::Unreachable(reason) => Err(BroadcastError::NotSent(reason.to_string())),
            Broadcast::Unconfirmed(reason) => {
                Err(BroadcastError::Unconfirmed(reason.to_string()))
            }
            Broadcast::Hang => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Ok(call.hash)
            }
        }
    }

    async fn transaction_receipt(&self, hash: H256) -> crate::Result<Option<TransactionReceipt>> {
        assert_eq!(hash, tx_hash());
        Ok(self.receipts.lock().unwrap().pop_front().flatten())
    }
}

fn receipt(success: bool) -> Option<TransactionReceipt> {
    Some(TransactionReceipt {
        transaction_hash: tx_hash(),
        success,
        block_number: Some(42),
    })
}

fn direct_with(
    chain: MockChain,
    submit: Duration,
    receipt: Duration,
) -> DirectSettler<MockChain> {
    DirectSettler::new(chain, submit, receipt, Duration::from_millis(10))
}

fn direct(chain: MockChain) -> DirectSettler<MockChain> {
    direct_with(chain, Duration::from_millis(100), Duration::from_millis(200))
}

#[test]
fn test_transfer_calldata_layout() {
    assert_eq!(
        transferWithAuthorizationCall::SELECTOR,
        [0xe3, 0xee, 0x16, 0x0e]
    );

    let payer = Wallet::random();
    let auth = testing::authorization(&payer, 100_000, 1_900_000_000);
    let signature = payer.sign_authorization(&testing::domain(1001), &auth).unwrap();
    let data = encode_transfer_with_authorization(&auth, &signature);

    assert_eq!(data.len(), 4 + 9 * 32);
    assert_eq!(&data[..4], transferWithAuthorizationCall::SELECTOR.as_slice());
    assert_eq!(&data[4 + 12..4 + 32], payer.address().as_bytes());
    assert_eq!(&data[4 + 5 * 32..4 + 6 * 32], auth.nonce.as_bytes());
    assert_eq!(data[4 + 7 * 32 - 1], signature.v);
    assert_eq!(&data[4 + 8 * 32..], signature.s.as_bytes());
}

#[tokio::test]
async fn test_direct_settlement_confirms_receipt() {
    let settler = direct(MockChain::new(Broadcast::Accept, vec![None, None, receipt(true)]));
    let payer = Wallet::random();
    let payment = testing::signed_payment(&payer, testing::CHAIN_ID, 100_000);

    let outcome = settler.settle(&testing::requirement(), &payment).await.unwrap();
    assert!(outcome.success);
    assert_eq!(outcome.transaction.as_deref(), Some(testing::TX_HASH));

    let signed = settler.chain().signed.lock().unwrap();
    assert_eq!(signed.len(), 1);
    assert_eq!(format!("{:?}", signed[0].0), testing::TOKEN.to_lowercase());
    let parts = SignatureParts::from_signature(&payment.payload.signature).unwrap();
    assert_eq!(
        signed[0].1,
        encode_transfer_with_authorization(&payment.payload.authorization.parse().unwrap(), &parts)
    );
    // A finished attempt leaves nothing behind
    assert_eq!(settler.interrupted_transaction(&payment).await, None);
}

#[tokio::test]
async fn test_direct_settlement_revert_is_definite() {
    let settler = direct(MockChain::new(Broadcast::Accept, vec![receipt(false)]));
    let payment = testing::signed_payment(&Wallet::random(), testing::CHAIN_ID, 100_000);

    let err = settler
        .settle(&testing::requirement(), &payment)
        .await
        .unwrap_err();
    match err {
        X402Error::SettlementFailed {
            reason: SettlementFailure::Reverted { transaction },
            ..
        } => assert_eq!(transaction, testing::TX_HASH),
        other => panic!("expected revert, got {:?}", other),
    }
}

#[tokio::test]
async fn test_direct_settlement_receipt_timeout_carries_transaction() {
    let settler = direct(MockChain::new(Broadcast::Accept, vec![]));
    let payment = testing::signed_payment(&Wallet::random(), testing::CHAIN_ID, 100_000);

    let err = settler
        .settle(&testing::requirement(), &payment)
        .await
        .unwrap_err();
    match err {
        X402Error::SettlementTimeout { transaction, .. } => {
            assert_eq!(transaction.as_deref(), Some(testing::TX_HASH))
        }
        other => panic!("expected timeout, got {:?}", other),
    }
}

#[tokio::test]
async fn test_direct_settlement_definite_submission_failures() {
    let payment = testing::signed_payment(&Wallet::random(), testing::CHAIN_ID, 100_000);

    let rejected = direct(MockChain::new(Broadcast::Reject("nonce too low"), vec![]));
    let err = rejected
        .settle(&testing::requirement(), &payment)
        .await
        .unwrap_err();
    assert_eq!(err.reason_code(), "transaction_rejected");
    assert!(!err.is_ambiguous());

    let unreachable = direct(MockChain::new(
        Broadcast::Unreachable("connection refused"),
        vec![],
    ));
    let err = unreachable
        .settle(&testing::requirement(), &payment)
        .await
        .unwrap_err();
    assert_eq!(err.reason_code(), "settlement_transport_error");
    assert!(!err.is_ambiguous());

    let unsigned = direct(MockChain::failing_to_sign("execution reverted"));
    let err = unsigned
        .settle(&testing::requirement(), &payment)
        .await
        .unwrap_err();
    assert_eq!(err.reason_code(), "transaction_rejected");
    assert_eq!(unsigned.chain().broadcasts.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_direct_settlement_lost_broadcast_answer_is_ambiguous() {
    let payment = testing::signed_payment(&Wallet::random(), testing::CHAIN_ID, 100_000);

    let settler = direct(MockChain::new(
        Broadcast::Unconfirmed("connection reset by peer"),
        vec![],
    ));
    let err = settler
        .settle(&testing::requirement(), &payment)
        .await
        .unwrap_err();
    match &err {
        X402Error::SettlementUnconfirmed {
            transaction,
            reason,
            ..
        } => {
            assert_eq!(transaction.as_deref(), Some(testing::TX_HASH));
            assert!(reason.contains("reset"));
        }
        other => panic!("expected unconfirmed, got {:?}", other),
    }
    assert!(err.is_ambiguous());

    // Accepted by the node after all
    let landed = direct(MockChain::new(
        Broadcast::Unconfirmed("connection reset by peer"),
        vec![None, receipt(true)],
    ));
    let outcome = landed
        .settle(&testing::requirement(), &payment)
        .await
        .unwrap();
    assert_eq!(outcome.transaction.as_deref(), Some(testing::TX_HASH));
}

#[tokio::test]
async fn test_direct_settlement_unanswered_broadcast_keeps_transaction() {
    let settler = direct(MockChain::new(Broadcast::Hang, vec![]));
    let payment = testing::signed_payment(&Wallet::random(), testing::CHAIN_ID, 100_000);

    let err = settler
        .settle(&testing::requirement(), &payment)
        .await
        .unwrap_err();
    match err {
        X402Error::SettlementTimeout { transaction, .. } => {
            assert_eq!(transaction.as_deref(), Some(testing::TX_HASH))
        }
        other => panic!("expected timeout, got {:?}", other),
    }
}

#[tokio::test]
async fn test_attempt_cut_off_by_settlement_timeout_reports_transaction() {
    // Inner budget outlives the orchestrator's bound on the attempt
    let settler = Arc::new(direct_with(
        MockChain::new(Broadcast::Accept, vec![]),
        Duration::from_millis(100),
        Duration::from_millis(500),
    ));
    let orchestrator = orchestrator(
        settler.clone(),
        Duration::from_millis(200),
        TimeoutPolicy::ManualReconciliation,
    );
    let executions = AtomicUsize::new(0);

    let payment = testing::signed_payment(&Wallet::random(), testing::CHAIN_ID, 100_000);
    let rejection = run(&orchestrator, &payment, &executions).await.unwrap_err();

    match &rejection.error {
        X402Error::SettlementTimeout { transaction, .. } => {
            assert_eq!(transaction.as_deref(), Some(testing::TX_HASH))
        }
        other => panic!("expected timeout, got {:?}", other),
    }
    let outcome = rejection.outcome.unwrap();
    assert_eq!(outcome.status, SettlementStatus::Ambiguous);
    assert_eq!(outcome.transaction.as_deref(), Some(testing::TX_HASH));
    assert_eq!(settler.chain().broadcasts.load(Ordering::SeqCst), 1);
}

#[test]
fn test_build_direct_settler_validates_config() {
    let bad_url = crate::config::SettlementMode::Direct(crate::config::DirectSettlementConfig::new(
        "not a url",
        "0x4c0883a69102937d6231471b5dbb6204fe5129617082792ae468d01a3f362318",
    ));
    assert!(build_settler(&bad_url, testing::CHAIN_ID).is_err());

    let bad_key = crate::config::SettlementMode::Direct(crate::config::DirectSettlementConfig::new(
        "http://localhost:8545",
        "0xnope",
    ));
    assert!(build_settler(&bad_key, testing::CHAIN_ID).is_err());

    let good = crate::config::SettlementMode::Direct(crate::config::DirectSettlementConfig::new(
        "http://localhost:8545",
        "0x4c0883a69102937d6231471b5dbb6204fe5129617082792ae468d01a3f362318",
    ));
    assert_eq!(build_settler(&good, testing::CHAIN_ID).unwrap().mode(), "direct");
}
