//! Per-signer nonce bookkeeping.

use forwarder_storage::{StorageError, StorageService};
use forwarder_types::{address_key, Address, StorageKey, U256};
use std::sync::Arc;

/// Next expected nonce per signer, persisted under the `nonces` namespace.
///
/// Unseen signers start at zero. Nonces only move through [`increment`] and
/// the journal undoing one, both inside a locked transaction.
///
/// [`increment`]: NonceStore::increment
pub struct NonceStore {
	storage: Arc<StorageService>,
}

impl NonceStore {
	pub fn new(storage: Arc<StorageService>) -> Self {
		Self { storage }
	}

	pub async fn get(&self, signer: Address) -> Result<U256, StorageError> {
		let stored: Option<U256> = self
			.storage
			.retrieve_optional(StorageKey::Nonces.as_str(), &address_key(&signer))
			.await?;
		Ok(stored.unwrap_or(U256::ZERO))
	}

	/// Advances the signer's nonce by one and returns the value consumed.
	pub async fn increment(&self, signer: Address) -> Result<U256, StorageError> {
		let current = self.get(signer).await?;
		let next = current
			.checked_add(U256::from(1u64))
			.ok_or_else(|| StorageError::Backend(format!("nonce overflow for {}", signer)))?;

		self.storage
			.store(StorageKey::Nonces.as_str(), &address_key(&signer), &next)
			.await?;

		Ok(current)
	}

	/// Puts `consumed` back as the signer's next nonce.
	pub(crate) async fn restore(&self, signer: Address, consumed: U256) -> Result<(), StorageError> {
		self.storage
			.store(StorageKey::Nonces.as_str(), &address_key(&signer), &consumed)
			.await
	}
}
