//! Factory registry for forwarder implementations.
//!
//! Every storage backend, account provider and call target the workspace
//! ships is registered here by name, so configuration can pick among them.

use forwarder_account::{AccountFactory, AccountService};
use forwarder_config::Config;
use forwarder_core::targets::TargetFactory;
use forwarder_core::{Forwarder, ForwarderBuilder, ForwarderFactories};
use forwarder_storage::StorageFactory;
use std::collections::HashMap;
use std::sync::OnceLock;

/// Global registry for all implementation factories
pub struct FactoryRegistry {
	pub storage: HashMap<String, StorageFactory>,
	pub account: HashMap<String, AccountFactory>,
	pub target: HashMap<String, TargetFactory>,
}

impl FactoryRegistry {
	pub fn new() -> Self {
		Self {
			storage: HashMap::new(),
			account: HashMap::new(),
			target: HashMap::new(),
		}
	}

	pub fn register_storage(&mut self, name: impl Into<String>, factory: StorageFactory) {
		self.storage.insert(name.into(), factory);
	}

	pub fn register_account(&mut self, name: impl Into<String>, factory: AccountFactory) {
		self.account.insert(name.into(), factory);
	}

	pub fn register_target(&mut self, name: impl Into<String>, factory: TargetFactory) {
		self.target.insert(name.into(), factory);
	}
}

static REGISTRY: OnceLock<FactoryRegistry> = OnceLock::new();

/// Initialize the global registry with all available implementations
pub fn initialize_registry() -> &'static FactoryRegistry {
	REGISTRY.get_or_init(|| {
		let mut registry = FactoryRegistry::new();

		for (name, factory) in forwarder_storage::get_all_implementations() {
			tracing::debug!("Registering storage implementation: {}", name);
			registry.register_storage(name, factory);
		}

		for (name, factory) in forwarder_account::get_all_implementations() {
			tracing::debug!("Registering account implementation: {}", name);
			registry.register_account(name, factory);
		}

		for (name, factory) in forwarder_core::targets::get_all_implementations() {
			tracing::debug!("Registering target implementation: {}", name);
			registry.register_target(name, factory);
		}

		registry
	})
}

pub fn get_registry() -> &'static FactoryRegistry {
	initialize_registry()
}

/// Picks the factories named in `$names` out of the registry, failing on the
/// first unknown name.
macro_rules! build_factories {
	($registry:expr, $names:expr, $registry_field:ident, $type_name:literal) => {{
		let mut factories = HashMap::new();
		for name in $names {
			if let Some(factory) = $registry.$registry_field.get(name.as_str()) {
				factories.insert(name.clone(), *factory);
			} else {
				let mut available: Vec<_> = $registry.$registry_field.keys().cloned().collect();
				available.sort();
				return Err(format!(
					"Unknown {} implementation '{}'. Available: [{}]",
					$type_name,
					name,
					available.join(", ")
				)
				.into());
			}
		}
		factories
	}};
}

/// Builds the forwarder described by `config`.
pub async fn build_forwarder_from_config(
	config: Config,
) -> Result<Forwarder, Box<dyn std::error::Error>> {
	let registry = get_registry();

	let storage_factories = build_factories!(
		registry,
		config.storage.implementations.keys(),
		storage,
		"storage"
	);
	let target_factories = build_factories!(
		registry,
		config.targets.iter().map(|t| &t.implementation),
		target,
		"target"
	);

	let factories = ForwarderFactories {
		storage_factories,
		target_factories,
	};

	Ok(ForwarderBuilder::new(config).build(factories).await?)
}

/// Builds the configured signing account, if any.
pub fn build_account_from_config(
	config: &Config,
) -> Result<Option<AccountService>, Box<dyn std::error::Error>> {
	let registry = get_registry();
	let Some(account) = &config.account else {
		return Ok(None);
	};

	let account_factories =
		build_factories!(registry, account.implementations.keys(), account, "account");

	Ok(ForwarderBuilder::new(config.clone()).build_account(&account_factories)?)
}

#[cfg(test)]
mod tests {
	use super::*;
	use forwarder_config::builders::config::ConfigBuilder;
	use forwarder_types::Address;

	#[test]
	fn test_registry_contains_builtin_implementations() {
		let registry = get_registry();
		assert!(registry.storage.contains_key("memory"));
		assert!(registry.storage.contains_key("file"));
		assert!(registry.account.contains_key("local"));
		assert!(registry.target.contains_key("gasless_token"));
	}

	#[tokio::test]
	async fn test_build_forwarder_from_config() {
		let config = ConfigBuilder::new()
			.target("gasless_token", Address::repeat_byte(0x42))
			.build();

		let forwarder = build_forwarder_from_config(config).await.unwrap();
		assert!(forwarder.ledger().has_target(Address::repeat_byte(0x42)).await);
	}

	#[tokio::test]
	async fn test_unknown_target_is_reported() {
		let config = ConfigBuilder::new()
			.target("erc721", Address::repeat_byte(0x42))
			.build();

		let err = build_forwarder_from_config(config).await.err().unwrap();
		assert!(err.to_string().contains("Unknown target implementation 'erc721'"));
	}

	#[test]
	fn test_account_from_config() {
		let config = ConfigBuilder::new()
			.local_account("0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80")
			.build();

		assert!(build_account_from_config(&config).unwrap().is_some());
		assert!(build_account_from_config(&ConfigBuilder::new().build())
			.unwrap()
			.is_none());
	}
}
