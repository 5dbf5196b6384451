//! Signature utilities

use super::eip712::{self, keccak256, Domain};
use crate::types::{AuthorizationSignature, ParsedAuthorization};
use crate::{Result, X402Error};
use ethereum_types::{Address, H256};
use k256::ecdsa::{RecoveryId, Signature as K256Signature, VerifyingKey};

/// Recoverable ECDSA signature split into its on-chain components
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SignatureParts {
    pub r: H256,
    pub s: H256,
    /// Ethereum-style recovery byte (27 or 28)
    pub v: u8,
}

impl SignatureParts {
    /// Decode either accepted encoding
    pub fn from_signature(signature: &AuthorizationSignature) -> Result<Self> {
        match signature {
            AuthorizationSignature::Packed(hex_sig) => Self::from_packed(hex_sig),
            AuthorizationSignature::Split { v, r, s } => Ok(Self {
                r: decode_word(r, "r")?,
                s: decode_word(s, "s")?,
                v: normalize_v(*v)?,
            }),
        }
    }

    /// Decode a 65-byte `r || s || v` hex string
    pub fn from_packed(signature: &str) -> Result<Self> {
        let sig_bytes = hex::decode(signature.trim_start_matches("0x"))
            .map_err(|_| X402Error::malformed_signature("Invalid hex signature"))?;

        if sig_bytes.len() != 65 {
            return Err(X402Error::malformed_signature(format!(
                "Signature must be 65 bytes, got {}",
                sig_bytes.len()
            )));
        }

        Ok(Self {
            r: H256::from_slice(&sig_bytes[0..32]),
            s: H256::from_slice(&sig_bytes[32..64]),
            v: normalize_v(sig_bytes[64])?,
        })
    }

    /// Packed `r || s || v` bytes
    pub fn to_bytes(&self) -> [u8; 65] {
        let mut bytes = [0u8; 65];
        bytes[0..32].copy_from_slice(self.r.as_bytes());
        bytes[32..64].copy_from_slice(self.s.as_bytes());
        bytes[64] = self.v;
        bytes
    }

    /// Packed hex encoding with `0x` prefix
    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.to_bytes()))
    }

    /// Recovery id in 0/1 form; `v` may be built by hand in either form
    pub fn recovery_id(&self) -> u8 {
        if self.v >= 27 {
            self.v - 27
        } else {
            self.v
        }
    }
}

fn decode_word(value: &str, field: &str) -> Result<H256> {
    let bytes = hex::decode(value.trim_start_matches("0x"))
        .map_err(|_| X402Error::malformed_signature(format!("Invalid hex in {}", field)))?;
    if bytes.len() != 32 {
        return Err(X402Error::malformed_signature(format!(
            "{} must be 32 bytes, got {}",
            field,
            bytes.len()
        )));
    }
    Ok(H256::from_slice(&bytes))
}

fn normalize_v(v: u8) -> Result<u8> {
    match v {
        0 | 1 => Ok(v + 27),
        27 | 28 => Ok(v),
        other => Err(X402Error::malformed_signature(format!(
            "Invalid recovery byte {}",
            other
        ))),
    }
}

/// Recover the signer of a prehashed message.
///
/// `Ok(None)` means the signature is well-formed but no key recovers from it.
pub fn recover_signer(message_hash: H256, parts: &SignatureParts) -> Result<Option<Address>> {
    let recovery_id = RecoveryId::try_from(parts.recovery_id())
        .map_err(|_| X402Error::malformed_signature("Invalid recovery ID"))?;

    let mut sig_bytes = [0u8; 64];
    sig_bytes[0..32].copy_from_slice(parts.r.as_bytes());
    sig_bytes[32..64].copy_from_slice(parts.s.as_bytes());

    let k256_sig = match K256Signature::try_from(&sig_bytes[..]) {
        Ok(sig) => sig,
        Err(_) => return Ok(None),
    };

    match VerifyingKey::recover_from_prehash(message_hash.as_bytes(), &k256_sig, recovery_id) {
        Ok(verifying_key) => Ok(Some(ethereum_address_from_pubkey(&verifying_key)?)),
        Err(_) => Ok(None),
    }
}

/// Convert a public key to an Ethereum address
fn ethereum_address_from_pubkey(pubkey: &VerifyingKey) -> Result<Address> {
    let encoded = pubkey.to_encoded_point(false);
    let pubkey_bytes = encoded.as_bytes();
    if pubkey_bytes.len() != 65 {
        return Err(X402Error::malformed_signature("Invalid public key length"));
    }

    // Drop the 0x04 prefix, the address is the last 20 bytes of the hash
    let pubkey_hash = keccak256(&pubkey_bytes[1..]);
    Ok(Address::from_slice(&pubkey_hash[12..]))
}

/// Outcome of checking an authorization signature
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SignatureVerification {
    /// Recovered signer equals the claimed payer
    pub verified: bool,
    /// Recovered signer, if any
    pub recovered: Option<Address>,
}

/// Verify that `authorization.from` signed the authorization under `domain`
pub fn verify_authorization(
    domain: &Domain,
    authorization: &ParsedAuthorization,
    signature: &AuthorizationSignature,
) -> Result<SignatureVerification> {
    let parts = SignatureParts::from_signature(signature)?;
    let digest = eip712::transfer_with_authorization_digest(domain, authorization);
    let recovered = recover_signer(digest, &parts)?;

    let verified = recovered == Some(authorization.from);
    tracing::debug!(
        payer = ?authorization.from,
        recovered = ?recovered,
        verified,
        "Checked authorization signature"
    );

    Ok(SignatureVerification {
        verified,
        recovered,
    })
}

/// Generate a random nonce for EIP-3009 authorization
pub fn generate_nonce() -> H256 {
    use rand::RngCore;
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    H256::from_slice(&bytes)
}
