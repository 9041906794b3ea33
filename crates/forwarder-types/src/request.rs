//! Forward request and execution outcome types.

use crate::api::u256_serde;
use crate::domain::ForwarderDomain;
use crate::utils::{compute_final_digest, compute_forward_request_hash};
use alloy_primitives::{Address, Bytes, B256, U256};
use serde::{Deserialize, Serialize};

/// A signer's authorization to call `to` with `data`, consuming `nonce`.
///
/// Constructed and signed off-chain. The forwarder treats it as immutable:
/// every field is covered by the signature.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForwardRequest {
	/// The signer.
	pub from: Address,
	/// Target to call.
	pub to: Address,
	/// Native value forwarded with the call.
	#[serde(with = "u256_serde")]
	pub value: U256,
	/// Gas budget for the forwarded call.
	#[serde(with = "u256_serde")]
	pub gas: U256,
	/// Must equal the forwarder's stored nonce for `from`.
	#[serde(with = "u256_serde")]
	pub nonce: U256,
	/// Encoded call to perform on `to`.
	#[serde(default)]
	pub data: Bytes,
}

impl ForwardRequest {
	/// EIP-712 struct hash of this request.
	pub fn struct_hash(&self) -> B256 {
		compute_forward_request_hash(
			&self.from,
			&self.to,
			self.value,
			self.gas,
			self.nonce,
			&self.data,
		)
	}

	/// Digest the signer signs under `domain`.
	pub fn signing_hash(&self, domain: &ForwarderDomain) -> B256 {
		compute_final_digest(&domain.separator(), &self.struct_hash())
	}

	/// Calldata delivered to the target: `data` followed by the 20-byte signer.
	pub fn forwarded_calldata(&self) -> Bytes {
		let mut payload = Vec::with_capacity(self.data.len() + 20);
		payload.extend_from_slice(&self.data);
		payload.extend_from_slice(self.from.as_slice());
		payload.into()
	}
}

/// Outcome of a request that passed verification and was executed.
///
/// `success` reports the forwarded call only. The nonce is consumed either way.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionResult {
	pub success: bool,
	#[serde(rename = "returnData")]
	pub return_data: Bytes,
	/// The nonce this execution consumed.
	#[serde(with = "u256_serde")]
	pub nonce: U256,
	#[serde(rename = "gasUsed")]
	pub gas_used: u64,
}

/// Persisted record of an execution, kept for relayers to look up after the fact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionReceipt {
	pub from: Address,
	pub to: Address,
	#[serde(with = "u256_serde")]
	pub nonce: U256,
	pub digest: B256,
	pub success: bool,
	#[serde(rename = "returnData")]
	pub return_data: Bytes,
	#[serde(rename = "gasUsed")]
	pub gas_used: u64,
	#[serde(rename = "executedAt")]
	pub executed_at: u64,
}

/// Options a relayer attaches to an `execute` submission.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecuteOptions {
	/// Native value sent along with the submission, credited to the forwarder.
	pub attached_value: U256,
	/// Gas the relayer made available to the transaction. `None` means
	/// unconstrained.
	pub gas_available: Option<u64>,
}
