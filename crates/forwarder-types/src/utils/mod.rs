//! Utility functions for hashing, conversions and display formatting.

pub mod conversion;
pub mod eip712;
pub mod formatting;
pub mod helpers;

pub use conversion::{parse_address, parse_bytes};
pub use eip712::{
	compute_domain_hash, compute_final_digest, compute_forward_request_hash, Eip712AbiEncoder,
	DEFAULT_DOMAIN_NAME, DEFAULT_DOMAIN_VERSION, DOMAIN_TYPE, FORWARD_REQUEST_TYPE,
};
pub use formatting::{address_key, calldata_summary, truncate_id, without_0x_prefix};
pub use helpers::current_timestamp;
