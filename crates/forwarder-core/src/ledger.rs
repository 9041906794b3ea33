//! In-process execution environment for forwarded calls.
//!
//! The ledger maps addresses to [`CallTarget`] implementations and tracks
//! native balances. It stands in for the chain: a call transfers value,
//! runs the target under a gas limit, and when the target fails reverts
//! everything the call changed, nested executions included.

use crate::journal::{JournalEntry, Undo};
use crate::{Forwarder, ForwarderError};
use async_trait::async_trait;
use forwarder_types::{
	Address, Bytes, ExecuteOptions, ExecutionResult, ForwardRequest, ForwarderDomain, U256,
};
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Why a target call did not complete.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallFailure {
	/// The target rejected the call. Carries ABI revert data, possibly empty.
	Revert(Bytes),
	/// The gas limit was exhausted.
	OutOfGas,
}

impl CallFailure {
	/// A revert carrying a standard `Error(string)` reason.
	pub fn reason(message: impl Into<String>) -> Self {
		use alloy_sol_types::{Revert, SolError};

		let revert = Revert {
			reason: message.into(),
		};
		CallFailure::Revert(revert.abi_encode().into())
	}

	/// Revert data to surface to the caller.
	pub fn into_return_data(self) -> Bytes {
		match self {
			CallFailure::Revert(data) => data,
			CallFailure::OutOfGas => Bytes::new(),
		}
	}
}

/// Parameters of a single call as the target sees them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallFrame {
	/// Direct caller. For relayed requests this is the forwarder.
	pub caller: Address,
	/// Address being called.
	pub to: Address,
	pub value: U256,
	pub gas_limit: u64,
	pub data: Bytes,
	/// Read-only call; targets must not mutate state.
	pub is_static: bool,
}

/// What a ledger call produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallOutcome {
	pub success: bool,
	pub return_data: Bytes,
	pub gas_used: u64,
}

/// A contract reachable through the ledger.
///
/// Implementations must leave their own state unchanged when returning an
/// error. Changes they keep on success are registered with
/// [`CallContext::record_undo`] so that a failing enclosing call can revert
/// them.
#[async_trait]
pub trait CallTarget: Send + Sync {
	async fn call(&self, ctx: &mut CallContext<'_>) -> Result<Bytes, CallFailure>;
}

/// Execution context handed to a target for the duration of one call.
pub struct CallContext<'a> {
	frame: CallFrame,
	gas_used: u64,
	forwarder: &'a Forwarder,
}

impl<'a> CallContext<'a> {
	pub fn frame(&self) -> &CallFrame {
		&self.frame
	}

	/// Address of the executing target.
	pub fn address(&self) -> Address {
		self.frame.to
	}

	pub fn gas_used(&self) -> u64 {
		self.gas_used
	}

	pub fn gas_left(&self) -> u64 {
		self.frame.gas_limit.saturating_sub(self.gas_used)
	}

	/// Charges `amount` gas. Exceeding the limit fails the call.
	pub fn consume_gas(&mut self, amount: u64) -> Result<(), CallFailure> {
		if amount > self.gas_left() {
			self.gas_used = self.frame.gas_limit;
			return Err(CallFailure::OutOfGas);
		}
		self.gas_used += amount;
		Ok(())
	}

	/// Registers how to reverse a state change this call made. Ignored in
	/// static calls, which must not change state.
	pub async fn record_undo(&self, undo: impl Undo + 'static) {
		if self.frame.is_static {
			return;
		}
		self.forwarder
			.record(JournalEntry::Target(Box::new(undo)))
			.await;
	}

	/// Handle to the forwarder that owns this ledger.
	pub fn forwarder(&self) -> ForwarderHandle<'a> {
		ForwarderHandle {
			forwarder: self.forwarder,
			is_static: self.frame.is_static,
		}
	}
}

type HandleFuture<'b, T> = Pin<Box<dyn Future<Output = T> + Send + 'b>>;

/// Forwarder access from inside a call.
///
/// Calls made through the handle join the enclosing transaction instead of
/// taking the transaction lock, and observe its state: a request whose nonce
/// was consumed by the enclosing execution no longer verifies. Handles
/// given to static calls are read-only.
#[derive(Clone, Copy)]
pub struct ForwarderHandle<'a> {
	forwarder: &'a Forwarder,
	is_static: bool,
}

impl<'a> ForwarderHandle<'a> {
	pub fn address(&self) -> Address {
		self.forwarder.address()
	}

	pub fn domain(&self) -> &'a ForwarderDomain {
		self.forwarder.domain()
	}

	pub async fn get_nonce(&self, signer: Address) -> Result<U256, ForwarderError> {
		self.forwarder.get_nonce(signer).await
	}

	pub async fn verify(&self, request: &ForwardRequest, signature: &[u8]) -> bool {
		self.forwarder.verify(request, signature).await
	}

	/// Executes a request as part of the current transaction.
	///
	/// Fails with [`ForwarderError::StaticCall`] from a static call.
	pub fn execute<'b>(
		self,
		request: &'b ForwardRequest,
		signature: &'b [u8],
	) -> HandleFuture<'b, Result<ExecutionResult, ForwarderError>>
	where
		'a: 'b,
	{
		if self.is_static {
			return Box::pin(async { Err(ForwarderError::StaticCall) });
		}
		Box::pin(self.forwarder.execute_in_transaction(
			request,
			signature,
			ExecuteOptions::default(),
		))
	}
}

/// Targets and native balances.
#[derive(Default)]
pub struct Ledger {
	targets: RwLock<HashMap<Address, Arc<dyn CallTarget>>>,
	balances: RwLock<HashMap<Address, U256>>,
}

impl Ledger {
	pub fn new() -> Self {
		Self::default()
	}

	/// Registers `target` at `address`, replacing any previous target.
	pub async fn register(&self, address: Address, target: Arc<dyn CallTarget>) {
		self.targets.write().await.insert(address, target);
	}

	pub async fn has_target(&self, address: Address) -> bool {
		self.targets.read().await.contains_key(&address)
	}

	pub async fn balance_of(&self, address: Address) -> U256 {
		self.balances
			.read()
			.await
			.get(&address)
			.copied()
			.unwrap_or(U256::ZERO)
	}

	/// Adds native balance to `address`.
	pub async fn credit(&self, address: Address, amount: U256) {
		if amount.is_zero() {
			return;
		}
		let mut balances = self.balances.write().await;
		let entry = balances.entry(address).or_insert(U256::ZERO);
		*entry = entry.saturating_add(amount);
	}

	/// Moves `amount` from `from` to `to`. Returns false, changing nothing,
	/// when `from` cannot cover it.
	async fn transfer(&self, from: Address, to: Address, amount: U256) -> bool {
		if amount.is_zero() {
			return true;
		}

		let mut balances = self.balances.write().await;
		let available = balances.get(&from).copied().unwrap_or(U256::ZERO);
		if available < amount {
			return false;
		}

		balances.insert(from, available - amount);
		let entry = balances.entry(to).or_insert(U256::ZERO);
		*entry = entry.saturating_add(amount);
		true
	}

	/// Moves a journaled transfer back.
	pub(crate) async fn revert_transfer(&self, from: Address, to: Address, amount: U256) {
		if !self.transfer(to, from, amount).await {
			tracing::error!(%to, %from, %amount, "Failed to roll back value transfer");
		}
	}

	/// Performs a call described by `frame`.
	///
	/// Never fails outright: insufficient balance, reverts and gas exhaustion
	/// all come back as `success = false`. An address without a target
	/// behaves like an account with no code and succeeds with empty data.
	/// A failed non-static call reverts every change recorded while it ran.
	pub async fn call(&self, forwarder: &Forwarder, frame: CallFrame) -> CallOutcome {
		if frame.is_static && !frame.value.is_zero() {
			return CallOutcome {
				success: false,
				return_data: Bytes::new(),
				gas_used: 0,
			};
		}

		// Static calls change nothing and run outside the transaction lock,
		// so they must not touch the journal.
		let checkpoint = if frame.is_static {
			None
		} else {
			Some(forwarder.checkpoint().await)
		};

		if !self.transfer(frame.caller, frame.to, frame.value).await {
			tracing::debug!(
				caller = %frame.caller,
				to = %frame.to,
				value = %frame.value,
				"Insufficient balance for value transfer"
			);
			return CallOutcome {
				success: false,
				return_data: Bytes::new(),
				gas_used: 0,
			};
		}
		if checkpoint.is_some() && !frame.value.is_zero() {
			forwarder
				.record(JournalEntry::ValueTransferred {
					from: frame.caller,
					to: frame.to,
					amount: frame.value,
				})
				.await;
		}

		// Clone out of the registry so targets may re-enter the ledger.
		let target = self.targets.read().await.get(&frame.to).cloned();
		let Some(target) = target else {
			return CallOutcome {
				success: true,
				return_data: Bytes::new(),
				gas_used: 0,
			};
		};

		let mut ctx = CallContext {
			frame,
			gas_used: 0,
			forwarder,
		};

		match target.call(&mut ctx).await {
			Ok(return_data) => CallOutcome {
				success: true,
				return_data,
				gas_used: ctx.gas_used,
			},
			Err(failure) => {
				if let Some(checkpoint) = checkpoint {
					forwarder.revert_to(checkpoint).await;
				}
				CallOutcome {
					success: false,
					return_data: failure.into_return_data(),
					gas_used: ctx.gas_used,
				}
			},
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_reason_is_error_string_encoding() {
		let data = CallFailure::reason("nope").into_return_data();
		// Error(string) selector
		assert_eq!(&data[..4], &[0x08, 0xc3, 0x79, 0xa0]);
		assert!(CallFailure::OutOfGas.into_return_data().is_empty());
	}

	#[tokio::test]
	async fn test_transfer_requires_balance() {
		let ledger = Ledger::new();
		let a = Address::repeat_byte(0xaa);
		let b = Address::repeat_byte(0xbb);

		assert!(!ledger.transfer(a, b, U256::from(5u64)).await);
		ledger.credit(a, U256::from(10u64)).await;
		assert!(ledger.transfer(a, b, U256::from(5u64)).await);

		assert_eq!(ledger.balance_of(a).await, U256::from(5u64));
		assert_eq!(ledger.balance_of(b).await, U256::from(5u64));
		assert!(ledger.transfer(a, b, U256::ZERO).await);
	}
}
