//! Chain access for direct settlement
//!
//! [`ChainClient`] is the seam the direct settler depends on: sign a contract call,
//! broadcast it, look up its receipt. Signing and broadcasting are separate steps so the
//! transaction hash is known before anything leaves the process.
//!
//! [`BlockchainClient`] implements it on an alloy provider whose fillers pick nonce and
//! gas and whose wallet filler signs with the server's key.

use crate::{Result, X402Error};
use alloy::eips::eip2718::Encodable2718;
use alloy::network::{EthereumWallet, TransactionBuilder};
use alloy::primitives::{Address as ChainAddress, Bytes, B256};
use alloy::providers::{
    fillers::{
        BlobGasFiller, ChainIdFiller, FillProvider, GasFiller, JoinFill, NonceFiller, WalletFiller,
    },
    Identity, Provider, ProviderBuilder, RootProvider, SendableTx,
};
use alloy::rpc::types::TransactionRequest;
use alloy::signers::local::PrivateKeySigner;
use alloy::transports::{TransportError, TransportErrorKind};
use async_trait::async_trait;
use ethereum_types::{Address, H256};
use thiserror::Error;

/// Provider built by `ProviderBuilder::new().wallet(..).connect_http(..)`
pub type WalletProvider = FillProvider<
    JoinFill<
        JoinFill<
            Identity,
            JoinFill<GasFiller, JoinFill<BlobGasFiller, JoinFill<NonceFiller, ChainIdFiller>>>,
        >,
        WalletFiller<EthereumWallet>,
    >,
    RootProvider,
>;

/// Mined transaction as far as settlement cares
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionReceipt {
    pub transaction_hash: H256,
    /// `true` when the transaction executed without reverting
    pub success: bool,
    pub block_number: Option<u64>,
}

/// A transaction signed locally and not yet broadcast
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedCall {
    pub hash: H256,
    /// EIP-2718 encoding, as sent with `eth_sendRawTransaction`
    pub raw: Vec<u8>,
}

/// How a broadcast failed
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BroadcastError {
    /// The request never reached the node
    #[error("node unreachable: {0}")]
    NotSent(String),
    /// The node answered and refused the transaction
    #[error("{0}")]
    Rejected(String),
    /// The request was sent but no usable answer came back
    #[error("no usable answer: {0}")]
    Unconfirmed(String),
}

impl BroadcastError {
    /// Classify a failed `eth_sendRawTransaction`
    pub fn classify(error: &TransportError) -> Self {
        match error {
            TransportError::ErrorResp(payload) => {
                BroadcastError::Rejected(format!("{} (code {})", payload.message, payload.code))
            }
            TransportError::SerError(_)
            | TransportError::LocalUsageError(_)
            | TransportError::UnsupportedFeature(_) => BroadcastError::NotSent(error.to_string()),
            TransportError::Transport(TransportErrorKind::Custom(source))
                if source
                    .downcast_ref::<reqwest::Error>()
                    .is_some_and(crate::error::never_sent) =>
            {
                BroadcastError::NotSent(error.to_string())
            }
            _ => BroadcastError::Unconfirmed(error.to_string()),
        }
    }
}

/// Operations the direct settler needs from a chain
#[async_trait]
pub trait ChainClient: Send + Sync {
    /// Fill and sign a call to `to` with calldata `data`; nothing is broadcast
    async fn sign_call(&self, to: Address, data: Vec<u8>) -> Result<SignedCall>;

    /// Broadcast a signed call, returning the hash the node reports
    async fn broadcast(&self, call: &SignedCall) -> std::result::Result<H256, BroadcastError>;

    /// Receipt of `hash`, or `None` while the transaction is still pending
    async fn transaction_receipt(&self, hash: H256) -> Result<Option<TransactionReceipt>>;
}

/// [`ChainClient`] over an alloy HTTP provider
pub struct BlockchainClient {
    provider: WalletProvider,
    address: Address,
    chain_id: u64,
}

impl std::fmt::Debug for BlockchainClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlockchainClient")
            .field("address", &self.address)
            .field("chain_id", &self.chain_id)
            .finish()
    }
}

fn rpc_error(context: &str, error: TransportError) -> X402Error {
    X402Error::rpc(format!("{} failed: {}", context, error))
}

impl BlockchainClient {
    /// Client for `rpc_url` sending from the account of `private_key`
    pub fn new(rpc_url: &str, private_key: &str, chain_id: u64) -> Result<Self> {
        let signer: PrivateKeySigner = private_key
            .parse()
            .map_err(|e| X402Error::config(format!("Invalid settlement private key: {}", e)))?;
        let url: url::Url = rpc_url
            .parse()
            .map_err(|e| X402Error::config(format!("Invalid RPC URL: {}", e)))?;
        let address = Address::from(signer.address().0 .0);

        let provider = ProviderBuilder::new()
            .wallet(EthereumWallet::from(signer))
            .connect_http(url);

        Ok(Self {
            provider,
            address,
            chain_id,
        })
    }

    /// Account that pays for settlement transactions
    pub fn address(&self) -> Address {
        self.address
    }

    pub fn chain_id(&self) -> u64 {
        self.chain_id
    }
}

#[async_trait]
impl ChainClient for BlockchainClient {
    async fn sign_call(&self, to: Address, data: Vec<u8>) -> Result<SignedCall> {
        let request = TransactionRequest::default()
            .with_from(ChainAddress::from(self.address.0))
            .with_to(ChainAddress::from(to.0))
            .with_input(Bytes::from(data))
            .with_chain_id(self.chain_id);

        let envelope = match self
            .provider
            .fill(request)
            .await
            .map_err(|e| rpc_error("filling transaction", e))?
        {
            SendableTx::Envelope(envelope) => envelope,
            SendableTx::Builder(_) => {
                return Err(X402Error::config("wallet filler left the transaction unsigned"))
            }
        };

        let hash = H256(envelope.tx_hash().0);
        tracing::debug!("Signed transaction {:?} to {:?}", hash, to);
        Ok(SignedCall {
            hash,
            raw: envelope.encoded_2718(),
        })
    }

    async fn broadcast(&self, call: &SignedCall) -> std::result::Result<H256, BroadcastError> {
        let pending = self
            .provider
            .send_raw_transaction(&call.raw)
            .await
            .map_err(|e| BroadcastError::classify(&e))?;
        let hash = H256(pending.tx_hash().0);
        tracing::info!("Broadcast transaction {:?}", hash);
        Ok(hash)
    }

    async fn transaction_receipt(&self, hash: H256) -> Result<Option<TransactionReceipt>> {
        let receipt = self
            .provider
            .get_transaction_receipt(B256::from(hash.0))
            .await
            .map_err(|e| rpc_error("eth_getTransactionReceipt", e))?;

        Ok(receipt.map(|receipt| TransactionReceipt {
            transaction_hash: H256(receipt.transaction_hash.0),
            success: receipt.status(),
            block_number: receipt.block_number,
        }))
    }
}
