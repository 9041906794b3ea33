//! EIP-712 signing domain of a forwarder instance.

use crate::utils::{compute_domain_hash, DEFAULT_DOMAIN_NAME, DEFAULT_DOMAIN_VERSION};
use alloy_primitives::{Address, B256};
use serde::{Deserialize, Serialize};

/// Domain every forward request signature is scoped to.
///
/// Fixed when the forwarder is constructed. A signature produced under one
/// domain never verifies under another, which is what prevents replay across
/// forwarder instances, chains and protocol versions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForwarderDomain {
	pub name: String,
	pub version: String,
	#[serde(rename = "chainId")]
	pub chain_id: u64,
	#[serde(rename = "verifyingContract")]
	pub verifying_contract: Address,
}

impl ForwarderDomain {
	/// Creates a domain with the default `MinimalForwarder` name and version.
	pub fn new(chain_id: u64, verifying_contract: Address) -> Self {
		Self {
			name: DEFAULT_DOMAIN_NAME.to_string(),
			version: DEFAULT_DOMAIN_VERSION.to_string(),
			chain_id,
			verifying_contract,
		}
	}

	pub fn with_name(mut self, name: impl Into<String>) -> Self {
		self.name = name.into();
		self
	}

	pub fn with_version(mut self, version: impl Into<String>) -> Self {
		self.version = version.into();
		self
	}

	/// The EIP-712 domain separator.
	pub fn separator(&self) -> B256 {
		compute_domain_hash(
			&self.name,
			&self.version,
			self.chain_id,
			&self.verifying_contract,
		)
	}
}
