//! Read-only target queries.

use alloy_sol_types::SolCall;
use forwarder_core::targets::gasless_token::IGaslessToken;
use forwarder_core::Forwarder;
use forwarder_types::utils::parse_address;
use forwarder_types::{APIError, BalanceResponse};

/// Queries `balanceOf(owner)` on a registered target.
pub async fn get_balance(
	forwarder: &Forwarder,
	target: &str,
	owner: &str,
) -> Result<BalanceResponse, APIError> {
	let target =
		parse_address(target).map_err(|e| APIError::bad_request("INVALID_ADDRESS", e))?;
	let owner = parse_address(owner).map_err(|e| APIError::bad_request("INVALID_ADDRESS", e))?;

	if !forwarder.ledger().has_target(target).await {
		return Err(APIError::NotFound {
			error_type: "TARGET_NOT_FOUND".to_string(),
			message: format!("No target registered at {}", target),
		});
	}

	let data = IGaslessToken::balanceOfCall { owner }.abi_encode();
	let outcome = forwarder.query(target, data.into()).await;
	let balance = IGaslessToken::balanceOfCall::abi_decode_returns(&outcome.return_data, true)
		.ok()
		.filter(|_| outcome.success)
		.map(|ret| ret._0)
		.ok_or_else(|| APIError::UnprocessableEntity {
			error_type: "UNSUPPORTED_QUERY".to_string(),
			message: format!("Target {} does not answer balanceOf", target),
			details: None,
		})?;

	Ok(BalanceResponse {
		target,
		owner,
		balance,
	})
}
