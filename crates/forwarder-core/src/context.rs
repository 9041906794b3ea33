//! Effective-sender resolution for targets called through the forwarder.
//!
//! The forwarder appends the signer's 20-byte address to every payload it
//! delivers. A target that trusts a forwarder reads the real caller from that
//! suffix, and only when the direct caller is that forwarder: anyone else
//! could append an arbitrary address.

use crate::ledger::CallFrame;
use forwarder_types::Address;

const ADDRESS_LENGTH: usize = 20;

/// Resolves `msg.sender` and `msg.data` for calls that may be relayed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrustedForwarderContext {
	trusted_forwarder: Address,
}

impl TrustedForwarderContext {
	pub fn new(trusted_forwarder: Address) -> Self {
		Self { trusted_forwarder }
	}

	pub fn trusted_forwarder(&self) -> Address {
		self.trusted_forwarder
	}

	pub fn is_trusted_forwarder(&self, caller: Address) -> bool {
		caller == self.trusted_forwarder
	}

	fn is_relayed(&self, frame: &CallFrame) -> bool {
		self.is_trusted_forwarder(frame.caller) && frame.data.len() >= ADDRESS_LENGTH
	}

	/// The signer for relayed calls, otherwise the direct caller.
	pub fn msg_sender(&self, frame: &CallFrame) -> Address {
		if self.is_relayed(frame) {
			Address::from_slice(&frame.data[frame.data.len() - ADDRESS_LENGTH..])
		} else {
			frame.caller
		}
	}

	/// Calldata without the appended signer for relayed calls.
	pub fn msg_data<'f>(&self, frame: &'f CallFrame) -> &'f [u8] {
		if self.is_relayed(frame) {
			&frame.data[..frame.data.len() - ADDRESS_LENGTH]
		} else {
			&frame.data
		}
	}
}
