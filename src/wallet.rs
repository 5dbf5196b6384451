//! secp256k1 signing identity
//!
//! The server holds one [`Wallet`] in direct settlement mode: it pays gas and signs the
//! `transferWithAuthorization` transaction. Payers use the same type to sign
//! authorizations, which is how the tests build payments.

use crate::crypto::eip712::{self, keccak256, Domain};
use crate::crypto::signature::SignatureParts;
use crate::types::{
    AuthorizationSignature, ParsedAuthorization, PaymentPayload, SignedAuthorization,
};
use crate::{Result, X402Error};
use ethereum_types::{Address, H256};
use secp256k1::{Message, PublicKey, SecretKey, SECP256K1};

/// Private key and its Ethereum address
#[derive(Clone)]
pub struct Wallet {
    secret_key: SecretKey,
    address: Address,
}

impl std::fmt::Debug for Wallet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Wallet")
            .field("address", &self.address)
            .field("secret_key", &"<redacted>")
            .finish()
    }
}

impl Wallet {
    /// Load a wallet from a hex private key (with or without `0x`)
    pub fn from_private_key(private_key: &str) -> Result<Self> {
        let private_key_bytes = hex::decode(private_key.trim().trim_start_matches("0x"))
            .map_err(|_| X402Error::config("Invalid hex private key"))?;

        let secret_key = SecretKey::from_slice(&private_key_bytes)
            .map_err(|_| X402Error::config("Invalid private key"))?;

        Ok(Self::from_secret_key(secret_key))
    }

    /// Generate a fresh random wallet
    pub fn random() -> Self {
        use rand::RngCore;
        loop {
            let mut bytes = [0u8; 32];
            rand::thread_rng().fill_bytes(&mut bytes);
            if let Ok(secret_key) = SecretKey::from_slice(&bytes) {
                return Self::from_secret_key(secret_key);
            }
        }
    }

    fn from_secret_key(secret_key: SecretKey) -> Self {
        let public_key = PublicKey::from_secret_key(SECP256K1, &secret_key);
        let uncompressed = public_key.serialize_uncompressed();
        let hash = keccak256(&uncompressed[1..]);

        Self {
            secret_key,
            address: Address::from_slice(&hash[12..]),
        }
    }

    /// Address derived from the key
    pub fn address(&self) -> Address {
        self.address
    }

    /// Sign a 32-byte digest, returning `v` as 27/28
    pub fn sign_hash(&self, message_hash: H256) -> Result<SignatureParts> {
        let message = Message::from_digest_slice(message_hash.as_bytes())
            .map_err(|_| X402Error::config("Invalid message hash"))?;

        let signature = SECP256K1.sign_ecdsa_recoverable(&message, &self.secret_key);
        let (recovery_id, compact) = signature.serialize_compact();

        Ok(SignatureParts {
            r: H256::from_slice(&compact[0..32]),
            s: H256::from_slice(&compact[32..64]),
            v: 27 + recovery_id.to_i32() as u8,
        })
    }

    /// Sign an EIP-3009 authorization under `domain`
    pub fn sign_authorization(
        &self,
        domain: &Domain,
        authorization: &ParsedAuthorization,
    ) -> Result<SignatureParts> {
        let digest = eip712::transfer_with_authorization_digest(domain, authorization);
        self.sign_hash(digest)
    }

    /// Build a complete payment payload paying from this wallet
    pub fn create_payment(
        &self,
        network: &str,
        domain: &Domain,
        authorization: &ParsedAuthorization,
    ) -> Result<PaymentPayload> {
        if authorization.from != self.address {
            return Err(X402Error::config(format!(
                "authorization payer {:?} is not wallet {:?}",
                authorization.from, self.address
            )));
        }

        let signature = self.sign_authorization(domain, authorization)?;
        Ok(PaymentPayload::new(
            network,
            SignedAuthorization {
                signature: AuthorizationSignature::Packed(signature.to_hex()),
                authorization: authorization.to_wire(),
            },
        ))
    }
}
