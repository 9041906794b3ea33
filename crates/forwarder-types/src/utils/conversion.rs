//! Conversion utilities for user-supplied hex input.

use super::formatting::without_0x_prefix;
use alloy_primitives::{hex, Address, Bytes};

/// Parses an address string, with or without the `0x` prefix.
///
/// Checksums are not enforced; mixed-case input is accepted as-is.
pub fn parse_address(input: &str) -> Result<Address, String> {
	let stripped = without_0x_prefix(input.trim());
	if stripped.len() != 40 {
		return Err(format!(
			"Address must be 40 hex characters, got {}",
			stripped.len()
		));
	}
	let bytes = hex::decode(stripped).map_err(|e| format!("Invalid address hex: {}", e))?;
	Ok(Address::from_slice(&bytes))
}

/// Parses a hex byte string, with or without the `0x` prefix. Empty input
/// yields empty bytes.
pub fn parse_bytes(input: &str) -> Result<Bytes, String> {
	let stripped = without_0x_prefix(input.trim());
	hex::decode(stripped)
		.map(Bytes::from)
		.map_err(|e| format!("Invalid hex: {}", e))
}
