//! Common types for the minimal forwarder.
//!
//! Shared data structures for the forwarder workspace: the signed request
//! and its EIP-712 hashing, the signing domain, signature recovery, API
//! bodies, events, storage namespaces and configuration validation.

/// API request/response bodies and the structured API error.
pub mod api;
/// EIP-712 signing domain.
pub mod domain;
/// Events published by the forwarder.
pub mod events;
/// Registry trait for pluggable implementations.
pub mod registry;
/// Forward request, execution result and receipt types.
pub mod request;
/// Zeroizing string for key material.
pub mod secret_string;
/// Signature parsing and signer recovery.
pub mod signature;
/// Storage namespaces.
pub mod storage;
/// Hashing, conversion and formatting helpers.
pub mod utils;
/// Configuration schema validation.
pub mod validation;

pub use alloy_primitives::{Address, Bytes, B256, U256};
pub use api::*;
pub use domain::ForwarderDomain;
pub use events::{ForwarderEvent, RejectionReason};
pub use registry::ImplementationRegistry;
pub use request::{ExecuteOptions, ExecutionReceipt, ExecutionResult, ForwardRequest};
pub use secret_string::SecretString;
pub use signature::{parse_signature, recover_signer, SignatureError};
pub use storage::StorageKey;
pub use utils::{address_key, truncate_id};
pub use validation::*;
