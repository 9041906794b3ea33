//! API types for the forwarder HTTP API.
//!
//! Request and response bodies for the relay endpoints, plus the structured
//! error type handlers return.

use crate::request::ForwardRequest;
use alloy_primitives::{Address, Bytes, B256, U256};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A signed request as handed to a relayer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignedForwardRequest {
	pub request: ForwardRequest,
	/// Raw 65-byte `r || s || v` signature.
	pub signature: Bytes,
}

/// Body of `POST /api/digest`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DigestRequest {
	pub request: ForwardRequest,
}

/// Response for `POST /api/digest`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DigestResponse {
	pub digest: B256,
}

/// Response for `GET /api/domain`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DomainResponse {
	pub name: String,
	pub version: String,
	#[serde(rename = "chainId")]
	pub chain_id: u64,
	#[serde(rename = "verifyingContract")]
	pub verifying_contract: Address,
	pub separator: B256,
}

/// Response for `GET /api/nonces/{address}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NonceResponse {
	pub address: Address,
	#[serde(with = "u256_serde")]
	pub nonce: U256,
}

/// Response for `POST /api/verify`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifyResponse {
	pub valid: bool,
}

/// Response for `GET /api/targets/{address}/balances/{owner}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BalanceResponse {
	pub target: Address,
	pub owner: Address,
	#[serde(with = "u256_serde")]
	pub balance: U256,
}

/// API error response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
	/// Error type/code
	pub error: String,
	/// Human-readable description
	pub message: String,
	/// Additional error context
	pub details: Option<serde_json::Value>,
}

/// Structured API error type with HTTP status mapping.
#[derive(Debug)]
pub enum APIError {
	/// Malformed input (400)
	BadRequest { error_type: String, message: String },
	/// Unknown resource (404)
	NotFound { error_type: String, message: String },
	/// Request understood but rejected by the forwarder (422)
	UnprocessableEntity {
		error_type: String,
		message: String,
		details: Option<serde_json::Value>,
	},
	/// Internal server error (500)
	InternalServerError { error_type: String, message: String },
}

impl APIError {
	pub fn bad_request(error_type: &str, message: impl Into<String>) -> Self {
		APIError::BadRequest {
			error_type: error_type.to_string(),
			message: message.into(),
		}
	}

	pub fn internal(message: impl Into<String>) -> Self {
		APIError::InternalServerError {
			error_type: "INTERNAL_ERROR".to_string(),
			message: message.into(),
		}
	}

	/// Get the HTTP status code for this error.
	pub fn status_code(&self) -> u16 {
		match self {
			APIError::BadRequest { .. } => 400,
			APIError::NotFound { .. } => 404,
			APIError::UnprocessableEntity { .. } => 422,
			APIError::InternalServerError { .. } => 500,
		}
	}

	/// Convert to ErrorResponse for JSON serialization.
	pub fn to_error_response(&self) -> ErrorResponse {
		match self {
			APIError::BadRequest { error_type, message }
			| APIError::NotFound { error_type, message }
			| APIError::InternalServerError { error_type, message } => ErrorResponse {
				error: error_type.clone(),
				message: message.clone(),
				details: None,
			},
			APIError::UnprocessableEntity {
				error_type,
				message,
				details,
			} => ErrorResponse {
				error: error_type.clone(),
				message: message.clone(),
				details: details.clone(),
			},
		}
	}
}

impl fmt::Display for APIError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			APIError::BadRequest { message, .. } => write!(f, "Bad Request: {}", message),
			APIError::NotFound { message, .. } => write!(f, "Not Found: {}", message),
			APIError::UnprocessableEntity { message, .. } => {
				write!(f, "Unprocessable Entity: {}", message)
			},
			APIError::InternalServerError { message, .. } => {
				write!(f, "Internal Server Error: {}", message)
			},
		}
	}
}

impl std::error::Error for APIError {}

impl axum::response::IntoResponse for APIError {
	fn into_response(self) -> axum::response::Response {
		use axum::{http::StatusCode, response::Json};

		let status =
			StatusCode::from_u16(self.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
		(status, Json(self.to_error_response())).into_response()
	}
}

/// Serde module for U256 fields.
///
/// Serializes as a decimal string. Deserializes from a decimal string, a
/// `0x` hex string, or a JSON number.
pub mod u256_serde {
	use alloy_primitives::U256;
	use serde::{de::Error, Deserialize, Deserializer, Serialize, Serializer};
	use std::str::FromStr;

	#[derive(Deserialize)]
	#[serde(untagged)]
	enum Repr {
		Text(String),
		Number(u64),
	}

	pub fn serialize<S>(value: &U256, serializer: S) -> Result<S::Ok, S::Error>
	where
		S: Serializer,
	{
		value.to_string().serialize(serializer)
	}

	pub fn deserialize<'de, D>(deserializer: D) -> Result<U256, D::Error>
	where
		D: Deserializer<'de>,
	{
		match Repr::deserialize(deserializer)? {
			Repr::Text(s) => U256::from_str(s.trim()).map_err(D::Error::custom),
			Repr::Number(n) => Ok(U256::from(n)),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_api_error_status_codes() {
		assert_eq!(APIError::bad_request("INVALID_INPUT", "x").status_code(), 400);
		assert_eq!(APIError::internal("x").status_code(), 500);
		let rejected = APIError::UnprocessableEntity {
			error_type: "NONCE_MISMATCH".into(),
			message: "stale".into(),
			details: Some(serde_json::json!({"expected": "1"})),
		};
		assert_eq!(rejected.status_code(), 422);
		let body = rejected.to_error_response();
		assert_eq!(body.error, "NONCE_MISMATCH");
		assert_eq!(body.details.unwrap()["expected"], "1");
	}

	#[test]
	fn test_nonce_response_serializes_decimal() {
		let response = NonceResponse {
			address: Address::ZERO,
			nonce: U256::from(42u64),
		};
		let json = serde_json::to_value(&response).unwrap();
		assert_eq!(json["nonce"], "42");
	}
}
