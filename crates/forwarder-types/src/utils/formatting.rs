//! String formatting utilities.
//!
//! Helpers for rendering addresses, digests and calldata in logs and
//! storage keys.

use alloy_primitives::{hex, Address};

/// Truncates a hex string for display purposes.
///
/// Shows only the first 10 characters (`0x` plus 4 bytes) followed by ".."
/// for longer strings.
pub fn truncate_id(id: &str) -> String {
	if id.len() <= 10 {
		id.to_string()
	} else {
		format!("{}..", &id[..10])
	}
}

/// Removes "0x" or "0X" prefix from a hex string if present.
pub fn without_0x_prefix(hex_str: &str) -> &str {
	hex_str
		.strip_prefix("0x")
		.or_else(|| hex_str.strip_prefix("0X"))
		.unwrap_or(hex_str)
}

/// Canonical storage key form of an address: lowercase with `0x` prefix.
///
/// Checksummed and lowercase spellings of the same address must map to the
/// same nonce slot.
pub fn address_key(address: &Address) -> String {
	format!("0x{}", hex::encode(address.as_slice()))
}

/// Renders calldata as `0x`-prefixed hex, keeping only the selector and the
/// length for long payloads.
pub fn calldata_summary(data: &[u8]) -> String {
	if data.len() <= 4 {
		format!("0x{}", hex::encode(data))
	} else {
		format!("0x{}..({} bytes)", hex::encode(&data[..4]), data.len())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use alloy_primitives::address;

	#[test]
	fn test_truncate_id() {
		assert_eq!(truncate_id("0x12345678"), "0x12345678");
		assert_eq!(truncate_id("0x1234567890abcdef"), "0x12345678..");
	}

	#[test]
	fn test_without_0x_prefix() {
		assert_eq!(without_0x_prefix("0xabcdef"), "abcdef");
		assert_eq!(without_0x_prefix("0Xabcdef"), "abcdef");
		assert_eq!(without_0x_prefix("abcdef"), "abcdef");
	}

	#[test]
	fn test_address_key_is_case_insensitive() {
		let checksummed = address!("70997970C51812dc3A010C7d01b50e0d17dc79C8");
		assert_eq!(
			address_key(&checksummed),
			"0x70997970c51812dc3a010c7d01b50e0d17dc79c8"
		);
	}

	#[test]
	fn test_calldata_summary() {
		assert_eq!(calldata_summary(&[0x12, 0x49, 0xc5, 0x8b]), "0x1249c58b");
		assert_eq!(
			calldata_summary(&[0xa0, 0x71, 0x2d, 0x68, 0, 0, 0]),
			"0xa0712d68..(7 bytes)"
		);
	}
}
