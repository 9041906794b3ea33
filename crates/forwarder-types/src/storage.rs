//! Storage namespaces used by the forwarder.

use std::str::FromStr;

/// Storage keys for the forwarder's data collections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StorageKey {
	/// Next expected nonce per signer. Never expires.
	Nonces,
	/// Execution receipts keyed by signer and nonce.
	Receipts,
}

impl StorageKey {
	/// Returns the string representation of the storage key.
	pub fn as_str(&self) -> &'static str {
		match self {
			StorageKey::Nonces => "nonces",
			StorageKey::Receipts => "receipts",
		}
	}

	/// Returns an iterator over all StorageKey variants.
	pub fn all() -> impl Iterator<Item = Self> {
		[Self::Nonces, Self::Receipts].into_iter()
	}

	/// Whether entries in this namespace may carry a TTL.
	///
	/// Nonces must outlive every signature ever produced for them, so they
	/// are excluded.
	pub fn allows_ttl(&self) -> bool {
		!matches!(self, StorageKey::Nonces)
	}
}

impl FromStr for StorageKey {
	type Err = ();

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"nonces" => Ok(Self::Nonces),
			"receipts" => Ok(Self::Receipts),
			_ => Err(()),
		}
	}
}

impl From<StorageKey> for &'static str {
	fn from(key: StorageKey) -> Self {
		key.as_str()
	}
}
