//! Undo log for the running transaction.
//!
//! Every state change made inside a call frame is recorded here. When a
//! frame fails, everything recorded since the frame's checkpoint is undone
//! in reverse order, so nested executions a failing target triggered are
//! rolled back with it. The top-level transaction commits by clearing the
//! log.

use async_trait::async_trait;
use forwarder_types::{Address, U256};
use tokio::sync::Mutex;

/// Reverses one state change made by a call target.
#[async_trait]
pub trait Undo: Send + Sync {
	async fn undo(self: Box<Self>);
}

/// A state change recorded during a transaction.
pub(crate) enum JournalEntry {
	/// `signer`'s nonce advanced past `consumed`.
	NonceConsumed { signer: Address, consumed: U256 },
	/// A receipt was written under this id.
	ReceiptStored { id: String },
	/// Native value moved between ledger accounts.
	ValueTransferred {
		from: Address,
		to: Address,
		amount: U256,
	},
	/// A change inside a call target.
	Target(Box<dyn Undo>),
}

/// Position in the journal a frame can revert to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Checkpoint(usize);

#[derive(Default)]
pub(crate) struct Journal {
	entries: Mutex<Vec<JournalEntry>>,
}

impl Journal {
	pub async fn checkpoint(&self) -> Checkpoint {
		Checkpoint(self.entries.lock().await.len())
	}

	pub async fn record(&self, entry: JournalEntry) {
		self.entries.lock().await.push(entry);
	}

	/// Removes and returns everything recorded after `checkpoint`, newest
	/// first.
	pub async fn unwind(&self, checkpoint: Checkpoint) -> Vec<JournalEntry> {
		let mut entries = self.entries.lock().await;
		let mut unwound = if checkpoint.0 < entries.len() {
			entries.split_off(checkpoint.0)
		} else {
			Vec::new()
		};
		unwound.reverse();
		unwound
	}

	pub async fn commit(&self) {
		self.entries.lock().await.clear();
	}

	#[cfg(test)]
	async fn len(&self) -> usize {
		self.entries.lock().await.len()
	}
}
