//! EIP-712 hashing primitives used by the forwarder.
//!
//! These helpers provide:
//! - Domain separator computation over `(name, version, chainId, verifyingContract)`
//! - Struct hashing for `ForwardRequest`
//! - Final digest computation (0x1901 || domainSeparator || structHash)
//! - A minimal ABI encoder for the static word types the schema uses
//!
//! Field order and types are part of the signed payload. Changing either
//! requires a new domain version.

use alloy_primitives::{keccak256, Address, B256, U256};

/// EIP-712 domain type string, including the version field.
pub const DOMAIN_TYPE: &str =
	"EIP712Domain(string name,string version,uint256 chainId,address verifyingContract)";

/// EIP-712 type string for the forward request.
pub const FORWARD_REQUEST_TYPE: &str =
	"ForwardRequest(address from,address to,uint256 value,uint256 gas,uint256 nonce,bytes data)";

/// Default domain name.
pub const DEFAULT_DOMAIN_NAME: &str = "MinimalForwarder";

/// Default domain version.
pub const DEFAULT_DOMAIN_VERSION: &str = "0.0.1";

/// Compute the EIP-712 domain separator:
/// keccak256(abi.encode(typeHash, keccak(name), keccak(version), chainId, verifyingContract)).
pub fn compute_domain_hash(
	name: &str,
	version: &str,
	chain_id: u64,
	verifying_contract: &Address,
) -> B256 {
	let mut enc = Eip712AbiEncoder::new();
	enc.push_b256(&keccak256(DOMAIN_TYPE.as_bytes()));
	enc.push_b256(&keccak256(name.as_bytes()));
	enc.push_b256(&keccak256(version.as_bytes()));
	enc.push_u256(U256::from(chain_id));
	enc.push_address(verifying_contract);
	keccak256(enc.finish())
}

/// Compute the struct hash of a forward request from its raw field values.
///
/// Dynamic `bytes` are encoded as the keccak256 of their contents.
pub fn compute_forward_request_hash(
	from: &Address,
	to: &Address,
	value: U256,
	gas: U256,
	nonce: U256,
	data: &[u8],
) -> B256 {
	let mut enc = Eip712AbiEncoder::new();
	enc.push_b256(&keccak256(FORWARD_REQUEST_TYPE.as_bytes()));
	enc.push_address(from);
	enc.push_address(to);
	enc.push_u256(value);
	enc.push_u256(gas);
	enc.push_u256(nonce);
	enc.push_bytes(data);
	keccak256(enc.finish())
}

/// Compute the final EIP-712 digest: keccak256(0x1901 || domainHash || structHash).
pub fn compute_final_digest(domain_hash: &B256, struct_hash: &B256) -> B256 {
	let mut out = Vec::with_capacity(2 + 32 + 32);
	out.push(0x19);
	out.push(0x01);
	out.extend_from_slice(domain_hash.as_slice());
	out.extend_from_slice(struct_hash.as_slice());
	keccak256(out)
}

/// Minimal ABI encoder for EIP-712 `encodeData`.
///
/// Every pushed value occupies exactly one 32-byte word.
pub struct Eip712AbiEncoder {
	buf: Vec<u8>,
}

impl Default for Eip712AbiEncoder {
	fn default() -> Self {
		Self::new()
	}
}

impl Eip712AbiEncoder {
	pub fn new() -> Self {
		Self {
			buf: Vec::with_capacity(7 * 32),
		}
	}

	pub fn push_b256(&mut self, v: &B256) {
		self.buf.extend_from_slice(v.as_slice());
	}

	/// Left-pads a 20-byte address into a word.
	pub fn push_address(&mut self, addr: &Address) {
		let mut word = [0u8; 32];
		word[12..].copy_from_slice(addr.as_slice());
		self.buf.extend_from_slice(&word);
	}

	pub fn push_u256(&mut self, v: U256) {
		let word: [u8; 32] = v.to_be_bytes::<32>();
		self.buf.extend_from_slice(&word);
	}

	/// Pushes `keccak256(bytes)` as the EIP-712 encoding of a dynamic `bytes` field.
	pub fn push_bytes(&mut self, bytes: &[u8]) {
		self.push_b256(&keccak256(bytes));
	}

	pub fn finish(self) -> Vec<u8> {
		self.buf
	}
}
