//! Settlement by calling `transferWithAuthorization` on the token contract

use super::Settler;
use crate::blockchain::{BroadcastError, ChainClient, SignedCall, TransactionReceipt};
use crate::crypto::signature::SignatureParts;
use crate::error::SettlementFailure;
use crate::types::{
    parse_address, ParsedAuthorization, PaymentPayload, PaymentRequirement, SettlementOutcome,
};
use crate::{Result, X402Error};
use alloy::primitives::{Address as ChainAddress, FixedBytes, U256 as ChainU256};
use alloy::sol;
use alloy::sol_types::SolCall;
use async_trait::async_trait;
use ethereum_types::{H256, U256};
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

// EIP-3009 entry point taking the signature split into v, r, s
sol! {
    interface IERC3009 {
        function transferWithAuthorization(
            address from,
            address to,
            uint256 value,
            uint256 validAfter,
            uint256 validBefore,
            bytes32 nonce,
            uint8 v,
            bytes32 r,
            bytes32 s
        ) external;
    }
}

pub use IERC3009::transferWithAuthorizationCall;

fn chain_uint(value: U256) -> ChainU256 {
    let mut word = [0u8; 32];
    value.to_big_endian(&mut word);
    ChainU256::from_be_bytes(word)
}

/// ABI-encoded calldata for the transfer
pub fn encode_transfer_with_authorization(
    authorization: &ParsedAuthorization,
    signature: &SignatureParts,
) -> Vec<u8> {
    transferWithAuthorizationCall {
        from: ChainAddress::from(authorization.from.0),
        to: ChainAddress::from(authorization.to.0),
        value: chain_uint(authorization.value),
        validAfter: ChainU256::from(authorization.valid_after),
        validBefore: ChainU256::from(authorization.valid_before),
        nonce: FixedBytes(authorization.nonce.0),
        v: signature.v,
        r: FixedBytes(signature.r.0),
        s: FixedBytes(signature.s.0),
    }
    .abi_encode()
}

/// [`Settler`] that submits the transfer itself and waits for its receipt
#[derive(Debug)]
pub struct DirectSettler<C> {
    chain: C,
    submit_timeout: Duration,
    receipt_timeout: Duration,
    poll_interval: Duration,
    // Signed transactions of unfinished attempts, by authorization nonce
    in_flight: Mutex<HashMap<H256, String>>,
}

impl<C: ChainClient> DirectSettler<C> {
    pub fn new(
        chain: C,
        submit_timeout: Duration,
        receipt_timeout: Duration,
        poll_interval: Duration,
    ) -> Self {
        Self {
            chain,
            submit_timeout,
            receipt_timeout,
            poll_interval,
            in_flight: Mutex::new(HashMap::new()),
        }
    }

    pub fn chain(&self) -> &C {
        &self.chain
    }

    async fn wait_for_receipt(&self, hash: H256) -> TransactionReceipt {
        loop {
            match self.chain.transaction_receipt(hash).await {
                Ok(Some(receipt)) => return receipt,
                Ok(None) => {}
                Err(e) => tracing::warn!("Receipt lookup for {:?} failed: {}", hash, e),
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }

    async fn broadcast_and_confirm(
        &self,
        network: String,
        signed: &SignedCall,
        payer: String,
        started: Instant,
    ) -> Result<SettlementOutcome> {
        let transaction = format!("{:?}", signed.hash);

        let doubt = match tokio::time::timeout(self.submit_timeout, self.chain.broadcast(signed))
            .await
        {
            Ok(Ok(_)) => None,
            Ok(Err(BroadcastError::NotSent(reason))) => {
                return Err(X402Error::settlement_failed(
                    network,
                    SettlementFailure::Transport(reason),
                ))
            }
            Ok(Err(BroadcastError::Rejected(reason))) => {
                return Err(X402Error::settlement_failed(
                    network,
                    SettlementFailure::Rpc(reason),
                ))
            }
            Ok(Err(BroadcastError::Unconfirmed(reason))) => {
                tracing::warn!("Broadcast of {} unconfirmed: {}", transaction, reason);
                Some(reason)
            }
            Err(_) => {
                tracing::warn!(
                    "Broadcast of {} unanswered after {:?}",
                    transaction,
                    self.submit_timeout
                );
                None
            }
        };

        // The node may have accepted the transaction even when the broadcast went unanswered
        match tokio::time::timeout(self.receipt_timeout, self.wait_for_receipt(signed.hash)).await
        {
            Ok(receipt) if receipt.success => {
                tracing::info!(
                    "Transaction {} confirmed in block {:?}",
                    transaction,
                    receipt.block_number
                );
                Ok(SettlementOutcome::settled(
                    network,
                    Some(transaction),
                    Some(payer),
                ))
            }
            Ok(_) => Err(X402Error::settlement_failed(
                network,
                SettlementFailure::Reverted { transaction },
            )),
            Err(_) => match doubt {
                Some(reason) => Err(X402Error::SettlementUnconfirmed {
                    network,
                    transaction: Some(transaction),
                    reason,
                }),
                None => Err(X402Error::SettlementTimeout {
                    network,
                    transaction: Some(transaction),
                    elapsed: started.elapsed(),
                }),
            },
        }
    }
}

#[async_trait]
impl<C: ChainClient> Settler for DirectSettler<C> {
    fn mode(&self) -> &'static str {
        "direct"
    }

    async fn settle(
        &self,
        requirement: &PaymentRequirement,
        payment: &PaymentPayload,
    ) -> Result<SettlementOutcome> {
        let network = requirement.network.clone();
        let authorization = payment.payload.authorization.parse()?;
        let signature = SignatureParts::from_signature(&payment.payload.signature)?;
        let token = parse_address(&requirement.asset, "asset")?;
        let data = encode_transfer_with_authorization(&authorization, &signature);

        let started = Instant::now();
        // Signing only reads from the node, so any failure here is definite
        let signed =
            match tokio::time::timeout(self.submit_timeout, self.chain.sign_call(token, data)).await
            {
                Ok(Ok(signed)) => signed,
                Ok(Err(X402Error::Rpc(message))) => {
                    return Err(X402Error::settlement_failed(
                        network,
                        SettlementFailure::Rpc(message),
                    ))
                }
                Ok(Err(other)) => return Err(other),
                Err(_) => {
                    return Err(X402Error::settlement_failed(
                        network,
                        SettlementFailure::Transport(format!(
                            "transaction not signed within {:?}",
                            self.submit_timeout
                        )),
                    ))
                }
            };

        self.in_flight
            .lock()
            .await
            .insert(authorization.nonce, format!("{:?}", signed.hash));
        let result = self
            .broadcast_and_confirm(
                network,
                &signed,
                format!("{:?}", authorization.from),
                started,
            )
            .await;
        self.in_flight.lock().await.remove(&authorization.nonce);
        result
    }

    async fn interrupted_transaction(&self, payment: &PaymentPayload) -> Option<String> {
        let nonce = payment.payload.authorization.parse().ok()?.nonce;
        self.in_flight.lock().await.remove(&nonce)
    }
}
