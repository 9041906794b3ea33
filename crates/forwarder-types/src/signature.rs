//! ECDSA signature parsing and signer recovery for forward requests.

use alloy_primitives::{uint, Address, PrimitiveSignature, B256, U256};
use thiserror::Error;

/// Half of the secp256k1 group order. Signatures with `s` above this value
/// are the malleable twin of a canonical signature and are rejected.
pub const SECP256K1N_HALF: U256 =
	uint!(0x7FFFFFFFFFFFFFFFFFFFFFFFFFFFFFFF5D576E7357A4501DDFE92F46681B20A0_U256);

/// Length of a raw `r || s || v` signature.
pub const SIGNATURE_LENGTH: usize = 65;

/// Errors that can occur while recovering a signer.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SignatureError {
	#[error("Signature must be 65 bytes, got {0}")]
	InvalidLength(usize),
	#[error("Invalid recovery id: {0}")]
	InvalidRecoveryId(u8),
	#[error("Signature s value is in the upper half of the curve order")]
	MalleableS,
	#[error("Signer recovery failed: {0}")]
	Recovery(String),
}

/// Parses a raw 65-byte signature.
///
/// `v` is accepted as 27/28 or 0/1. Any other value, a wrong length, or a
/// non-canonical `s` is rejected.
pub fn parse_signature(raw: &[u8]) -> Result<PrimitiveSignature, SignatureError> {
	if raw.len() != SIGNATURE_LENGTH {
		return Err(SignatureError::InvalidLength(raw.len()));
	}

	let r = U256::from_be_slice(&raw[0..32]);
	let s = U256::from_be_slice(&raw[32..64]);
	let y_parity = match raw[64] {
		0 | 27 => false,
		1 | 28 => true,
		v => return Err(SignatureError::InvalidRecoveryId(v)),
	};

	if s > SECP256K1N_HALF {
		return Err(SignatureError::MalleableS);
	}

	Ok(PrimitiveSignature::new(r, s, y_parity))
}

/// Recovers the address that signed `digest`.
pub fn recover_signer(digest: &B256, raw: &[u8]) -> Result<Address, SignatureError> {
	let signature = parse_signature(raw)?;
	signature
		.recover_address_from_prehash(digest)
		.map_err(|e| SignatureError::Recovery(e.to_string()))
}

#[cfg(test)]
mod tests {
	use super::*;
	use alloy_primitives::{b256, keccak256};

	#[test]
	fn test_rejects_wrong_length() {
		let digest = keccak256(b"digest");
		assert_eq!(
			recover_signer(&digest, &[0u8; 64]),
			Err(SignatureError::InvalidLength(64))
		);
		assert_eq!(
			recover_signer(&digest, &[]),
			Err(SignatureError::InvalidLength(0))
		);
	}

	#[test]
	fn test_rejects_bad_recovery_id() {
		let mut raw = [1u8; 65];
		raw[64] = 29;
		assert_eq!(
			parse_signature(&raw).unwrap_err(),
			SignatureError::InvalidRecoveryId(29)
		);
	}

	#[test]
	fn test_rejects_high_s() {
		let mut raw = [0u8; 65];
		raw[31] = 1;
		let high_s = b256!("7FFFFFFFFFFFFFFFFFFFFFFFFFFFFFFF5D576E7357A4501DDFE92F46681B20A1");
		raw[32..64].copy_from_slice(high_s.as_slice());
		raw[64] = 27;
		assert_eq!(parse_signature(&raw).unwrap_err(), SignatureError::MalleableS);
	}

	#[test]
	fn test_zero_signature_does_not_recover() {
		let digest = keccak256(b"digest");
		let mut raw = [0u8; 65];
		raw[64] = 27;
		assert!(matches!(
			recover_signer(&digest, &raw),
			Err(SignatureError::Recovery(_))
		));
	}
}
