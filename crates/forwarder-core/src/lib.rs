//! Core of the minimal forwarder.
//!
//! The [`Forwarder`] verifies EIP-712 signed [`ForwardRequest`]s and executes
//! each one exactly once against the [`Ledger`], appending the signer to the
//! forwarded calldata so targets can recover who authorized the call.
//!
//! Ordering is the whole game here. All pre-checks run before any state
//! changes, the nonce advances before the target runs, and every top-level
//! execution holds the transaction lock until the call returns. A call
//! that fails takes every nested execution it made down with it.

use crate::event_bus::EventBus;
use crate::journal::{Checkpoint, Journal, JournalEntry};
use crate::ledger::{CallFrame, CallOutcome, Ledger};
use crate::nonce::NonceStore;
use forwarder_storage::{StorageError, StorageService};
use forwarder_types::{
	address_key, recover_signer, truncate_id, Address, Bytes, ExecuteOptions, ExecutionReceipt,
	ExecutionResult, ForwardRequest, ForwarderDomain, ForwarderEvent, RejectionReason, StorageKey,
	B256, U256,
};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::instrument;

pub mod builder;
pub mod context;
pub mod event_bus;
mod journal;
pub mod ledger;
pub mod nonce;
pub mod targets;

pub use builder::{BuilderError, ForwarderBuilder, ForwarderFactories};
pub use context::TrustedForwarderContext;
pub use journal::Undo;
pub use ledger::{CallContext, CallFailure, CallTarget, ForwarderHandle};

/// Gas limit used for read-only queries.
pub const QUERY_GAS_LIMIT: u64 = 1_000_000;

/// Errors returned by forwarder operations.
///
/// Signature, nonce and gas errors are rejections: the request was turned
/// away before any state changed. A forwarded call that fails is not an
/// error.
#[derive(Debug, Error)]
pub enum ForwarderError {
	#[error("Invalid signature: {0}")]
	InvalidSignature(String),
	#[error("Nonce mismatch: expected {expected}, got {got}")]
	NonceMismatch { expected: U256, got: U256 },
	#[error("Insufficient gas: required {required}, available {available}")]
	InsufficientGas { required: U256, available: u64 },
	#[error("Cannot execute a request inside a static call")]
	StaticCall,
	#[error("Storage error: {0}")]
	Storage(String),
}

impl ForwarderError {
	/// The rejection category, or `None` for infrastructure failures.
	pub fn rejection_reason(&self) -> Option<RejectionReason> {
		match self {
			ForwarderError::InvalidSignature(_) => Some(RejectionReason::InvalidSignature),
			ForwarderError::NonceMismatch { .. } => Some(RejectionReason::NonceMismatch),
			ForwarderError::InsufficientGas { .. } => Some(RejectionReason::InsufficientGas),
			ForwarderError::StaticCall | ForwarderError::Storage(_) => None,
		}
	}
}

impl From<StorageError> for ForwarderError {
	fn from(err: StorageError) -> Self {
		ForwarderError::Storage(err.to_string())
	}
}

/// Verifies and executes signed forward requests.
pub struct Forwarder {
	domain: ForwarderDomain,
	separator: B256,
	nonces: NonceStore,
	storage: Arc<StorageService>,
	ledger: Arc<Ledger>,
	/// Serializes top-level executions.
	tx_lock: Mutex<()>,
	/// Changes made by the transaction holding `tx_lock`.
	journal: Journal,
	event_bus: EventBus,
	receipt_ttl: Option<Duration>,
}

impl Forwarder {
	pub fn new(
		domain: ForwarderDomain,
		storage: Arc<StorageService>,
		ledger: Arc<Ledger>,
		event_bus: EventBus,
	) -> Self {
		Self {
			separator: domain.separator(),
			domain,
			nonces: NonceStore::new(storage.clone()),
			storage,
			ledger,
			tx_lock: Mutex::new(()),
			journal: Journal::default(),
			event_bus,
			receipt_ttl: None,
		}
	}

	/// Expire stored receipts after `ttl`. Zero keeps them indefinitely.
	pub fn with_receipt_ttl(mut self, ttl: Duration) -> Self {
		self.receipt_ttl = (!ttl.is_zero()).then_some(ttl);
		self
	}

	pub fn domain(&self) -> &ForwarderDomain {
		&self.domain
	}

	pub fn domain_separator(&self) -> B256 {
		self.separator
	}

	/// The forwarder's own address: the caller targets observe.
	pub fn address(&self) -> Address {
		self.domain.verifying_contract
	}

	pub fn ledger(&self) -> &Arc<Ledger> {
		&self.ledger
	}

	pub fn event_bus(&self) -> &EventBus {
		&self.event_bus
	}

	/// The digest `request.from` must sign.
	pub fn digest(&self, request: &ForwardRequest) -> B256 {
		forwarder_types::utils::compute_final_digest(&self.separator, &request.struct_hash())
	}

	/// Next nonce `signer` must use. Zero for signers never seen.
	pub async fn get_nonce(&self, signer: Address) -> Result<U256, ForwarderError> {
		Ok(self.nonces.get(signer).await?)
	}

	/// Runs every pre-check `execute` runs and reports the first one that
	/// fails. Changes nothing.
	pub async fn check(
		&self,
		request: &ForwardRequest,
		signature: &[u8],
	) -> Result<(), ForwarderError> {
		let digest = self.digest(request);
		let signer = recover_signer(&digest, signature)
			.map_err(|e| ForwarderError::InvalidSignature(e.to_string()))?;

		if signer != request.from {
			return Err(ForwarderError::InvalidSignature(format!(
				"signed by {} but request is from {}",
				signer, request.from
			)));
		}

		let expected = self.nonces.get(request.from).await?;
		if expected != request.nonce {
			return Err(ForwarderError::NonceMismatch {
				expected,
				got: request.nonce,
			});
		}

		Ok(())
	}

	/// True iff `signature` is `request.from`'s signature over the request
	/// and the request carries the current nonce.
	pub async fn verify(&self, request: &ForwardRequest, signature: &[u8]) -> bool {
		match self.check(request, signature).await {
			Ok(()) => true,
			Err(ForwarderError::Storage(e)) => {
				tracing::warn!(from = %request.from, error = %e, "Nonce lookup failed during verify");
				false
			},
			Err(_) => false,
		}
	}

	/// Verifies and executes `request` with default options.
	pub async fn execute(
		&self,
		request: &ForwardRequest,
		signature: &[u8],
	) -> Result<ExecutionResult, ForwarderError> {
		self.execute_with(request, signature, ExecuteOptions::default())
			.await
	}

	/// Verifies and executes `request` as one serialized transaction.
	///
	/// Exactly one of any set of concurrent submissions of the same
	/// `(from, nonce)` succeeds; the others see `NonceMismatch`.
	pub async fn execute_with(
		&self,
		request: &ForwardRequest,
		signature: &[u8],
		options: ExecuteOptions,
	) -> Result<ExecutionResult, ForwarderError> {
		let _guard = self.tx_lock.lock().await;
		let result = self
			.execute_in_transaction(request, signature, options)
			.await;
		self.journal.commit().await;
		result
	}

	/// Execution body. Callers either hold `tx_lock` or are running inside a
	/// call made by a transaction that does.
	#[instrument(skip_all, fields(from = %request.from, nonce = %request.nonce, to = %request.to))]
	pub(crate) async fn execute_in_transaction(
		&self,
		request: &ForwardRequest,
		signature: &[u8],
		options: ExecuteOptions,
	) -> Result<ExecutionResult, ForwarderError> {
		if let Err(e) = self.pre_check(request, signature, &options).await {
			if let Some(reason) = e.rejection_reason() {
				tracing::info!(reason = reason.as_code(), error = %e, "Rejected request");
				self.event_bus
					.publish(ForwarderEvent::RequestRejected {
						from: request.from,
						nonce: request.nonce,
						reason,
					})
					.ok();
			}
			return Err(e);
		}

		// Consumed before the call so a re-entrant replay sees the new nonce.
		let nonce = self.nonces.increment(request.from).await?;
		self.journal
			.record(JournalEntry::NonceConsumed {
				signer: request.from,
				consumed: nonce,
			})
			.await;
		self.ledger
			.credit(self.address(), options.attached_value)
			.await;

		let outcome = self
			.ledger
			.call(
				self,
				CallFrame {
					caller: self.address(),
					to: request.to,
					value: request.value,
					gas_limit: request.gas.saturating_to::<u64>(),
					data: request.forwarded_calldata(),
					is_static: false,
				},
			)
			.await;

		tracing::info!(
			success = outcome.success,
			gas_used = outcome.gas_used,
			"Executed request"
		);

		self.store_receipt(request, nonce, &outcome).await;
		self.event_bus
			.publish(ForwarderEvent::RequestExecuted {
				from: request.from,
				to: request.to,
				nonce,
				success: outcome.success,
				gas_used: outcome.gas_used,
			})
			.ok();

		Ok(ExecutionResult {
			success: outcome.success,
			return_data: outcome.return_data,
			nonce,
			gas_used: outcome.gas_used,
		})
	}

	async fn pre_check(
		&self,
		request: &ForwardRequest,
		signature: &[u8],
		options: &ExecuteOptions,
	) -> Result<(), ForwarderError> {
		if let Some(available) = options.gas_available {
			// The call only receives 63/64 of what remains, so the relayer
			// must leave headroom above `gas`.
			let required = request
				.gas
				.saturating_add(request.gas / U256::from(63u64));
			if U256::from(available) < required {
				return Err(ForwarderError::InsufficientGas {
					required,
					available,
				});
			}
		}

		self.check(request, signature).await
	}

	async fn store_receipt(&self, request: &ForwardRequest, nonce: U256, outcome: &CallOutcome) {
		let receipt = ExecutionReceipt {
			from: request.from,
			to: request.to,
			nonce,
			digest: self.digest(request),
			success: outcome.success,
			return_data: outcome.return_data.clone(),
			gas_used: outcome.gas_used,
			executed_at: forwarder_types::utils::current_timestamp(),
		};

		let id = receipt_id(request.from, nonce);
		let stored = self
			.storage
			.store_with_ttl(
				StorageKey::Receipts.as_str(),
				&id,
				&receipt,
				self.receipt_ttl,
			)
			.await;
		match stored {
			Ok(()) => self.journal.record(JournalEntry::ReceiptStored { id }).await,
			Err(e) => tracing::warn!(
				digest = %truncate_id(&receipt.digest.to_string()),
				error = %e,
				"Failed to store execution receipt"
			),
		}
	}

	pub(crate) async fn checkpoint(&self) -> Checkpoint {
		self.journal.checkpoint().await
	}

	pub(crate) async fn record(&self, entry: JournalEntry) {
		self.journal.record(entry).await;
	}

	/// Undoes every change recorded after `checkpoint`.
	pub(crate) async fn revert_to(&self, checkpoint: Checkpoint) {
		for entry in self.journal.unwind(checkpoint).await {
			match entry {
				JournalEntry::NonceConsumed { signer, consumed } => {
					if let Err(e) = self.nonces.restore(signer, consumed).await {
						tracing::error!(%signer, %consumed, error = %e, "Failed to restore nonce");
					}
				},
				JournalEntry::ReceiptStored { id } => {
					if let Err(e) = self
						.storage
						.remove(StorageKey::Receipts.as_str(), &id)
						.await
					{
						tracing::warn!(%id, error = %e, "Failed to remove reverted receipt");
					}
				},
				JournalEntry::ValueTransferred { from, to, amount } => {
					self.ledger.revert_transfer(from, to, amount).await;
				},
				JournalEntry::Target(undo) => undo.undo().await,
			}
		}
	}

	/// Receipt of the execution that consumed `nonce` for `signer`, if kept.
	pub async fn receipt(
		&self,
		signer: Address,
		nonce: U256,
	) -> Result<Option<ExecutionReceipt>, ForwarderError> {
		Ok(self
			.storage
			.retrieve_optional(StorageKey::Receipts.as_str(), &receipt_id(signer, nonce))
			.await?)
	}

	/// Read-only call to `to`, outside any transaction. Targets reached this
	/// way cannot execute requests.
	pub async fn query(&self, to: Address, data: Bytes) -> CallOutcome {
		self.ledger
			.call(
				self,
				CallFrame {
					caller: Address::ZERO,
					to,
					value: U256::ZERO,
					gas_limit: QUERY_GAS_LIMIT,
					data,
					is_static: true,
				},
			)
			.await
	}

	/// Removes expired receipts.
	pub async fn cleanup_expired(&self) -> Result<usize, ForwarderError> {
		Ok(self.storage.cleanup_expired().await?)
	}
}

fn receipt_id(signer: Address, nonce: U256) -> String {
	format!("{}:{}", address_key(&signer), nonce)
}

#[cfg(test)]
mod tests {
	use super::*;
	use alloy_primitives::address;
	use forwarder_storage::implementations::memory::MemoryStorage;

	fn forwarder() -> Forwarder {
		Forwarder::new(
			ForwarderDomain::new(31337, address!("5FbDB2315678afecb367f032d93F642f64180aa3")),
			Arc::new(StorageService::new(Box::new(MemoryStorage::new()))),
			Arc::new(Ledger::new()),
			EventBus::default(),
		)
	}

	fn request() -> ForwardRequest {
		ForwardRequest {
			from: address!("70997970C51812dc3A010C7d01b50e0d17dc79C8"),
			to: address!("e7f1725E7734CE288F8367e1Bb143E90bb3F0512"),
			value: U256::ZERO,
			gas: U256::from(100_000u64),
			nonce: U256::ZERO,
			data: Bytes::new(),
		}
	}

	#[test]
	fn test_digest_uses_domain_separator() {
		let forwarder = forwarder();
		assert_eq!(forwarder.domain_separator(), forwarder.domain().separator());
		assert_eq!(
			forwarder.digest(&request()),
			request().signing_hash(forwarder.domain())
		);
	}

	#[tokio::test]
	async fn test_malformed_signature_is_rejected() {
		let forwarder = forwarder();

		let err = forwarder.check(&request(), &[0u8; 64]).await.unwrap_err();
		assert!(matches!(err, ForwarderError::InvalidSignature(_)));
		assert!(!forwarder.verify(&request(), &[0u8; 65]).await);
	}

	#[tokio::test]
	async fn test_griefing_check_runs_before_signature() {
		let forwarder = forwarder();
		let options = ExecuteOptions {
			attached_value: U256::ZERO,
			gas_available: Some(100_000),
		};

		let err = forwarder
			.execute_with(&request(), &[0u8; 65], options)
			.await
			.unwrap_err();
		match err {
			ForwarderError::InsufficientGas {
				required,
				available,
			} => {
				assert_eq!(required, U256::from(101_587u64));
				assert_eq!(available, 100_000);
			},
			other => panic!("unexpected error: {other}"),
		}
		assert_eq!(
			forwarder.get_nonce(request().from).await.unwrap(),
			U256::ZERO
		);
	}

	#[test]
	fn test_rejection_reasons() {
		assert_eq!(
			ForwarderError::InvalidSignature(String::new()).rejection_reason(),
			Some(RejectionReason::InvalidSignature)
		);
		assert_eq!(
			ForwarderError::Storage(String::new()).rejection_reason(),
			None
		);
		assert_eq!(ForwarderError::StaticCall.rejection_reason(), None);
	}
}
