//! Configuration builder for tests and local development.

use crate::{
	AccountConfig, ApiConfig, Config, ForwarderConfig, StorageConfig, TargetConfig,
};
use forwarder_types::utils::{DEFAULT_DOMAIN_NAME, DEFAULT_DOMAIN_VERSION};
use forwarder_types::Address;
use std::collections::HashMap;

/// Address the builder places the forwarder at by default.
pub const DEFAULT_FORWARDER_ADDRESS: Address = Address::new([
	0x5f, 0xbd, 0xb2, 0x31, 0x56, 0x78, 0xaf, 0xec, 0xb3, 0x67, 0xf0, 0x32, 0xd9, 0x3f, 0x64,
	0x2f, 0x64, 0x18, 0x0a, 0xa3,
]);

/// Builder for `Config` with in-memory defaults.
#[derive(Debug, Clone)]
pub struct ConfigBuilder {
	forwarder_id: String,
	forwarder_address: Address,
	chain_id: u64,
	name: String,
	version: String,
	receipt_ttl_seconds: u64,
	storage_primary: String,
	storage_implementations: HashMap<String, toml::Value>,
	storage_cleanup_interval_seconds: u64,
	account: Option<AccountConfig>,
	targets: Vec<TargetConfig>,
	api: Option<ApiConfig>,
}

impl Default for ConfigBuilder {
	fn default() -> Self {
		Self::new()
	}
}

impl ConfigBuilder {
	pub fn new() -> Self {
		let mut storage_implementations = HashMap::new();
		storage_implementations.insert(
			"memory".to_string(),
			toml::Value::Table(toml::Table::new()),
		);

		Self {
			forwarder_id: "test-forwarder".to_string(),
			forwarder_address: DEFAULT_FORWARDER_ADDRESS,
			chain_id: 31337,
			name: DEFAULT_DOMAIN_NAME.to_string(),
			version: DEFAULT_DOMAIN_VERSION.to_string(),
			receipt_ttl_seconds: 0,
			storage_primary: "memory".to_string(),
			storage_implementations,
			storage_cleanup_interval_seconds: 60,
			account: None,
			targets: Vec::new(),
			api: None,
		}
	}

	pub fn forwarder_id(mut self, id: impl Into<String>) -> Self {
		self.forwarder_id = id.into();
		self
	}

	pub fn forwarder_address(mut self, address: Address) -> Self {
		self.forwarder_address = address;
		self
	}

	pub fn chain_id(mut self, chain_id: u64) -> Self {
		self.chain_id = chain_id;
		self
	}

	pub fn domain_name(mut self, name: impl Into<String>) -> Self {
		self.name = name.into();
		self
	}

	pub fn domain_version(mut self, version: impl Into<String>) -> Self {
		self.version = version.into();
		self
	}

	pub fn receipt_ttl_seconds(mut self, ttl: u64) -> Self {
		self.receipt_ttl_seconds = ttl;
		self
	}

	/// Uses the file backend rooted at `path` as primary storage.
	pub fn file_storage(mut self, path: impl Into<String>) -> Self {
		let mut table = toml::Table::new();
		table.insert("storage_path".to_string(), toml::Value::String(path.into()));
		self.storage_implementations
			.insert("file".to_string(), toml::Value::Table(table));
		self.storage_primary = "file".to_string();
		self
	}

	/// Configures the local account with `private_key`.
	pub fn local_account(mut self, private_key: impl Into<String>) -> Self {
		let mut table = toml::Table::new();
		table.insert(
			"private_key".to_string(),
			toml::Value::String(private_key.into()),
		);
		let mut implementations = HashMap::new();
		implementations.insert("local".to_string(), toml::Value::Table(table));
		self.account = Some(AccountConfig {
			primary: "local".to_string(),
			implementations,
		});
		self
	}

	/// Registers a target with no implementation-specific settings.
	pub fn target(mut self, implementation: impl Into<String>, address: Address) -> Self {
		self.targets.push(TargetConfig {
			implementation: implementation.into(),
			address,
			settings: toml::Table::new(),
		});
		self
	}

	pub fn api(mut self, api: Option<ApiConfig>) -> Self {
		self.api = api;
		self
	}

	pub fn build(self) -> Config {
		Config {
			forwarder: ForwarderConfig {
				id: self.forwarder_id,
				address: self.forwarder_address,
				chain_id: self.chain_id,
				name: self.name,
				version: self.version,
				receipt_ttl_seconds: self.receipt_ttl_seconds,
			},
			storage: StorageConfig {
				primary: self.storage_primary,
				implementations: self.storage_implementations,
				cleanup_interval_seconds: self.storage_cleanup_interval_seconds,
			},
			account: self.account,
			targets: self.targets,
			api: self.api,
		}
	}
}
