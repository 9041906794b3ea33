//! Account management for the minimal forwarder.
//!
//! Accounts sign EIP-712 digests on behalf of request signers. The service
//! uses them for the `sign` command and the demo scenarios; the forwarder
//! itself never needs a key.

use async_trait::async_trait;
use forwarder_types::{
	Address, Bytes, ConfigSchema, ForwardRequest, ForwarderDomain, ImplementationRegistry,
	SecretString, B256,
};
use thiserror::Error;

pub mod implementations {
	pub mod local;
}

/// Errors that can occur during account operations.
#[derive(Debug, Error)]
pub enum AccountError {
	#[error("Signing failed: {0}")]
	SigningFailed(String),
	#[error("Invalid key: {0}")]
	InvalidKey(String),
	#[error("Implementation error: {0}")]
	Implementation(String),
}

/// Interface for account implementations.
#[async_trait]
pub trait AccountInterface: Send + Sync {
	/// Returns the configuration schema for this account implementation.
	fn config_schema(&self) -> Box<dyn ConfigSchema>;

	/// Address controlled by this account.
	async fn address(&self) -> Result<Address, AccountError>;

	/// Signs a 32-byte prehash and returns the 65-byte `r || s || v`
	/// signature with `v` in {27, 28}.
	async fn sign_hash(&self, hash: &B256) -> Result<Bytes, AccountError>;

	/// Signs an arbitrary message with the EIP-191 personal-sign prefix.
	async fn sign_message(&self, message: &[u8]) -> Result<Bytes, AccountError>;

	/// Returns the private key as a SecretString with 0x prefix.
	fn get_private_key(&self) -> SecretString;
}

/// Factory signature every account implementation provides.
pub type AccountFactory = fn(&toml::Value) -> Result<Box<dyn AccountInterface>, AccountError>;

/// Registry trait for account implementations.
pub trait AccountRegistry: ImplementationRegistry<Factory = AccountFactory> {}

/// All built-in account implementations as `(name, factory)` pairs.
pub fn get_all_implementations() -> Vec<(&'static str, AccountFactory)> {
	use implementations::local;

	vec![(local::Registry::NAME, local::Registry::factory())]
}

/// High-level wrapper around an account implementation.
pub struct AccountService {
	implementation: Box<dyn AccountInterface>,
}

impl AccountService {
	pub fn new(implementation: Box<dyn AccountInterface>) -> Self {
		Self { implementation }
	}

	pub async fn get_address(&self) -> Result<Address, AccountError> {
		self.implementation.address().await
	}

	/// Signs the EIP-712 digest of `request` under `domain`.
	///
	/// Fails if `request.from` is not this account, since the forwarder would
	/// reject the signature anyway.
	pub async fn sign_forward_request(
		&self,
		request: &ForwardRequest,
		domain: &ForwarderDomain,
	) -> Result<Bytes, AccountError> {
		let address = self.get_address().await?;
		if address != request.from {
			return Err(AccountError::SigningFailed(format!(
				"request is from {} but this account is {}",
				request.from, address
			)));
		}

		self.implementation
			.sign_hash(&request.signing_hash(domain))
			.await
	}

	pub async fn sign_message(&self, message: &[u8]) -> Result<Bytes, AccountError> {
		self.implementation.sign_message(message).await
	}

	pub fn get_private_key(&self) -> SecretString {
		self.implementation.get_private_key()
	}
}
