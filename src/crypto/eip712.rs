//! EIP-712 typed data hashing for EIP-3009 `TransferWithAuthorization`

use crate::types::ParsedAuthorization;
use ethereum_types::{Address, H256, U256};
use std::fmt;

/// EIP-712 domain separator fields
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Domain {
    pub name: String,
    pub version: String,
    pub chain_id: u64,
    pub verifying_contract: Address,
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{{name: \"{}\", version: \"{}\", chainId: {}, verifyingContract: {:?}}}",
            self.name, self.version, self.chain_id, self.verifying_contract
        )
    }
}

/// Fields of the EIP712Domain type, in encoding order
pub const DOMAIN_FIELDS: [(&str, &str); 4] = [
    ("string", "name"),
    ("string", "version"),
    ("uint256", "chainId"),
    ("address", "verifyingContract"),
];

/// Primary type signed by EIP-3009 payers
pub const TRANSFER_WITH_AUTHORIZATION: &str = "TransferWithAuthorization";

/// Fields of the TransferWithAuthorization type, in encoding order
pub const TRANSFER_WITH_AUTHORIZATION_FIELDS: [(&str, &str); 6] = [
    ("address", "from"),
    ("address", "to"),
    ("uint256", "value"),
    ("uint256", "validAfter"),
    ("uint256", "validBefore"),
    ("bytes32", "nonce"),
];

/// Canonical type string, e.g. `Mail(address from,string contents)`
pub fn encode_type(name: &str, fields: &[(&str, &str)]) -> String {
    let members: Vec<String> = fields
        .iter()
        .map(|(ty, field)| format!("{} {}", ty, field))
        .collect();
    format!("{}({})", name, members.join(","))
}

/// keccak256 of the EIP712Domain type string
pub fn domain_type_hash() -> H256 {
    H256(keccak256(encode_type("EIP712Domain", &DOMAIN_FIELDS).as_bytes()))
}

/// keccak256 of the TransferWithAuthorization type string
pub fn transfer_with_authorization_type_hash() -> H256 {
    H256(keccak256(
        encode_type(
            TRANSFER_WITH_AUTHORIZATION,
            &TRANSFER_WITH_AUTHORIZATION_FIELDS,
        )
        .as_bytes(),
    ))
}

/// Hash the domain separator
pub fn domain_separator(domain: &Domain) -> H256 {
    let mut data = Vec::with_capacity(32 * 5);
    data.extend_from_slice(domain_type_hash().as_bytes());
    data.extend_from_slice(&keccak256(domain.name.as_bytes()));
    data.extend_from_slice(&keccak256(domain.version.as_bytes()));
    data.extend_from_slice(&encode_uint(U256::from(domain.chain_id)));
    data.extend_from_slice(&encode_address(domain.verifying_contract));

    H256(keccak256(&data))
}

/// Hash the authorization struct
pub fn transfer_with_authorization_struct_hash(authorization: &ParsedAuthorization) -> H256 {
    let mut data = Vec::with_capacity(32 * 7);
    data.extend_from_slice(transfer_with_authorization_type_hash().as_bytes());
    data.extend_from_slice(&encode_address(authorization.from));
    data.extend_from_slice(&encode_address(authorization.to));
    data.extend_from_slice(&encode_uint(authorization.value));
    data.extend_from_slice(&encode_uint(U256::from(authorization.valid_after)));
    data.extend_from_slice(&encode_uint(U256::from(authorization.valid_before)));
    data.extend_from_slice(authorization.nonce.as_bytes());

    H256(keccak256(&data))
}

/// Digest a payer signs: `keccak256(0x19 0x01 || domainSeparator || structHash)`
pub fn transfer_with_authorization_digest(
    domain: &Domain,
    authorization: &ParsedAuthorization,
) -> H256 {
    let mut data = Vec::with_capacity(66);
    data.extend_from_slice(&[0x19, 0x01]);
    data.extend_from_slice(domain_separator(domain).as_bytes());
    data.extend_from_slice(transfer_with_authorization_struct_hash(authorization).as_bytes());

    H256(keccak256(&data))
}

fn encode_uint(value: U256) -> [u8; 32] {
    let mut word = [0u8; 32];
    value.to_big_endian(&mut word);
    word
}

fn encode_address(address: Address) -> [u8; 32] {
    let mut word = [0u8; 32];
    word[12..].copy_from_slice(address.as_bytes());
    word
}

/// Keccak-256 hash function
pub fn keccak256(data: &[u8]) -> [u8; 32] {
    use sha3::{Digest, Keccak256};
    Keccak256::digest(data).into()
}
