//! Relay endpoints.
//!
//! Thin wrappers around [`Forwarder`] that translate between the JSON API
//! types and forwarder calls. Pre-check rejections become `422` with a
//! machine-readable code; storage trouble becomes `500`.

use forwarder_core::{Forwarder, ForwarderError};
use forwarder_types::utils::parse_address;
use forwarder_types::{
	APIError, DigestResponse, DomainResponse, ExecuteOptions, ExecutionReceipt,
	ExecutionResult, ForwardRequest, NonceResponse, SignedForwardRequest, VerifyResponse, U256,
};
use serde_json::json;
use std::str::FromStr;
use tracing::{info, warn};

/// Maps a forwarder error onto the API error surface.
pub fn forwarder_error_to_api(err: ForwarderError) -> APIError {
	let Some(reason) = err.rejection_reason() else {
		return APIError::internal(err.to_string());
	};

	let details = match &err {
		ForwarderError::NonceMismatch { expected, got } => Some(json!({
			"expected": expected.to_string(),
			"got": got.to_string(),
		})),
		ForwarderError::InsufficientGas {
			required,
			available,
		} => Some(json!({
			"required": required.to_string(),
			"available": available,
		})),
		_ => None,
	};

	APIError::UnprocessableEntity {
		error_type: reason.as_code().to_string(),
		message: err.to_string(),
		details,
	}
}

pub fn get_domain(forwarder: &Forwarder) -> DomainResponse {
	let domain = forwarder.domain();
	DomainResponse {
		name: domain.name.clone(),
		version: domain.version.clone(),
		chain_id: domain.chain_id,
		verifying_contract: domain.verifying_contract,
		separator: forwarder.domain_separator(),
	}
}

pub async fn get_nonce(forwarder: &Forwarder, address: &str) -> Result<NonceResponse, APIError> {
	let address =
		parse_address(address).map_err(|e| APIError::bad_request("INVALID_ADDRESS", e))?;
	let nonce = forwarder
		.get_nonce(address)
		.await
		.map_err(forwarder_error_to_api)?;

	Ok(NonceResponse { address, nonce })
}

pub fn compute_digest(forwarder: &Forwarder, request: &ForwardRequest) -> DigestResponse {
	DigestResponse {
		digest: forwarder.digest(request),
	}
}

pub async fn verify_request(forwarder: &Forwarder, signed: &SignedForwardRequest) -> VerifyResponse {
	VerifyResponse {
		valid: forwarder
			.verify(&signed.request, &signed.signature)
			.await,
	}
}

/// Executes a signed request. A forwarded call that fails is still a `200`
/// with `success = false`: the nonce was consumed.
pub async fn execute_request(
	forwarder: &Forwarder,
	signed: &SignedForwardRequest,
	options: ExecuteOptions,
) -> Result<ExecutionResult, APIError> {
	match forwarder
		.execute_with(&signed.request, &signed.signature, options)
		.await
	{
		Ok(result) => {
			info!(
				from = %signed.request.from,
				nonce = %result.nonce,
				success = result.success,
				"Relayed request"
			);
			Ok(result)
		},
		Err(e) => {
			warn!(from = %signed.request.from, error = %e, "Execute request rejected");
			Err(forwarder_error_to_api(e))
		},
	}
}

pub async fn get_receipt(
	forwarder: &Forwarder,
	address: &str,
	nonce: &str,
) -> Result<ExecutionReceipt, APIError> {
	let address =
		parse_address(address).map_err(|e| APIError::bad_request("INVALID_ADDRESS", e))?;
	let nonce = U256::from_str(nonce)
		.map_err(|e| APIError::bad_request("INVALID_NONCE", e.to_string()))?;

	forwarder
		.receipt(address, nonce)
		.await
		.map_err(forwarder_error_to_api)?
		.ok_or_else(|| APIError::NotFound {
			error_type: "RECEIPT_NOT_FOUND".to_string(),
			message: format!("No receipt for {} at nonce {}", address, nonce),
		})
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_rejections_map_to_422() {
		let err = forwarder_error_to_api(ForwarderError::NonceMismatch {
			expected: U256::from(1u64),
			got: U256::ZERO,
		});
		assert_eq!(err.status_code(), 422);
		let body = err.to_error_response();
		assert_eq!(body.error, "NONCE_MISMATCH");
		assert_eq!(body.details.unwrap()["expected"], "1");

		let err = forwarder_error_to_api(ForwarderError::InvalidSignature("bad".into()));
		assert_eq!(err.to_error_response().error, "INVALID_SIGNATURE");

		let err = forwarder_error_to_api(ForwarderError::InsufficientGas {
			required: U256::from(64u64),
			available: 10,
		});
		assert_eq!(err.to_error_response().error, "INSUFFICIENT_GAS");
	}

	#[test]
	fn test_storage_errors_map_to_500() {
		let err = forwarder_error_to_api(ForwarderError::Storage("disk full".into()));
		assert_eq!(err.status_code(), 500);
	}
}
