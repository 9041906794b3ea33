//! Event types published by the forwarder.
//!
//! Events are informational: they describe state transitions that already
//! happened and are never consulted by the forwarder itself.

use alloy_primitives::{Address, U256};
use serde::{Deserialize, Serialize};

/// Main event type for forwarder activity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ForwarderEvent {
	/// A request passed verification, consumed its nonce and was forwarded.
	RequestExecuted {
		from: Address,
		to: Address,
		nonce: U256,
		/// Whether the forwarded call itself succeeded.
		success: bool,
		gas_used: u64,
	},
	/// A request was rejected before any state change.
	RequestRejected {
		from: Address,
		nonce: U256,
		reason: RejectionReason,
	},
}

/// Why a request was turned away at the pre-check stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RejectionReason {
	InvalidSignature,
	NonceMismatch,
	InsufficientGas,
}

impl RejectionReason {
	/// Stable error code used in API responses.
	pub fn as_code(&self) -> &'static str {
		match self {
			RejectionReason::InvalidSignature => "INVALID_SIGNATURE",
			RejectionReason::NonceMismatch => "NONCE_MISMATCH",
			RejectionReason::InsufficientGas => "INSUFFICIENT_GAS",
		}
	}
}
