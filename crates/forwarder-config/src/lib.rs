//! Configuration for the minimal forwarder.
//!
//! Configuration is TOML, loaded with `${VAR}` and `${VAR:-default}`
//! environment substitution and validated before use.
//!
//! ## Modular Configuration Support
//!
//! Configurations can be split into multiple files:
//! - Use `include = ["file1.toml", "file2.toml"]` to include other config files
//! - Each top-level section must be unique across all files (no duplicates allowed)

mod loader;

#[cfg(any(test, feature = "testing"))]
pub mod builders {
	pub mod config;
}

use forwarder_types::utils::{DEFAULT_DOMAIN_NAME, DEFAULT_DOMAIN_VERSION};
use forwarder_types::{Address, ForwarderDomain};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;

pub use loader::ConfigLoader;

/// Errors that can occur during configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
	#[error("IO error: {0}")]
	Io(#[from] std::io::Error),
	#[error("Configuration error: {0}")]
	Parse(String),
	#[error("Validation error: {0}")]
	Validation(String),
}

impl From<toml::de::Error> for ConfigError {
	fn from(err: toml::de::Error) -> Self {
		// Keep the message, drop the echoed input.
		ConfigError::Parse(err.message().to_string())
	}
}

/// Top-level forwarder configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
	/// Forwarder identity and signing domain.
	pub forwarder: ForwarderConfig,
	/// Nonce and receipt storage.
	pub storage: StorageConfig,
	/// Local signing account used by `forwarder sign`.
	pub account: Option<AccountConfig>,
	/// Call targets registered on the ledger at startup.
	#[serde(default)]
	pub targets: Vec<TargetConfig>,
	/// HTTP API server.
	pub api: Option<ApiConfig>,
}

/// Forwarder identity. The domain fields are fixed for the lifetime of the
/// deployment: changing any of them invalidates every outstanding signature.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ForwarderConfig {
	/// Identifier used in logs.
	pub id: String,
	/// Address the forwarder runs at; the `verifyingContract` of the domain.
	pub address: Address,
	pub chain_id: u64,
	#[serde(default = "default_domain_name")]
	pub name: String,
	#[serde(default = "default_domain_version")]
	pub version: String,
	/// Receipt retention in seconds. 0 keeps receipts until removed.
	#[serde(default)]
	pub receipt_ttl_seconds: u64,
}

impl ForwarderConfig {
	/// The EIP-712 domain this configuration describes.
	pub fn domain(&self) -> ForwarderDomain {
		ForwarderDomain::new(self.chain_id, self.address)
			.with_name(self.name.clone())
			.with_version(self.version.clone())
	}
}

fn default_domain_name() -> String {
	DEFAULT_DOMAIN_NAME.to_string()
}

fn default_domain_version() -> String {
	DEFAULT_DOMAIN_VERSION.to_string()
}

/// Configuration for the storage backend.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
	/// Which implementation to use as primary.
	pub primary: String,
	/// Map of storage implementation names to their configurations.
	pub implementations: HashMap<String, toml::Value>,
	/// Interval in seconds for cleaning up expired storage entries.
	pub cleanup_interval_seconds: u64,
}

/// Configuration for account management.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AccountConfig {
	/// Which implementation to use as primary.
	pub primary: String,
	/// Map of account implementation names to their configurations.
	pub implementations: HashMap<String, toml::Value>,
}

/// A call target to register on the ledger.
///
/// Keys other than `implementation` and `address` are passed to the
/// implementation's factory untouched.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TargetConfig {
	/// Registered implementation name, e.g. `gasless_token`.
	pub implementation: String,
	/// Address the target is reachable at.
	pub address: Address,
	#[serde(flatten)]
	pub settings: toml::Table,
}

impl TargetConfig {
	/// Implementation-specific settings as a TOML value.
	pub fn settings_value(&self) -> toml::Value {
		toml::Value::Table(self.settings.clone())
	}
}

/// Configuration for the HTTP API server.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ApiConfig {
	#[serde(default)]
	pub enabled: bool,
	#[serde(default = "default_api_host")]
	pub host: String,
	#[serde(default = "default_api_port")]
	pub port: u16,
	/// Request timeout in seconds.
	#[serde(default = "default_api_timeout")]
	pub timeout_seconds: u64,
	/// Maximum request body size in bytes.
	#[serde(default = "default_max_request_size")]
	pub max_request_size: usize,
	pub cors: Option<CorsConfig>,
}

/// CORS configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CorsConfig {
	/// Allowed origins. `*` allows any.
	pub allowed_origins: Vec<String>,
}

fn default_api_host() -> String {
	"127.0.0.1".to_string()
}

fn default_api_port() -> u16 {
	3000
}

fn default_api_timeout() -> u64 {
	30
}

fn default_max_request_size() -> usize {
	1024 * 1024
}

/// Resolves environment variables in a string.
///
/// Replaces ${VAR_NAME} with the value of VAR_NAME and supports defaults with
/// ${VAR_NAME:-default_value}. Input is limited to 1MB.
pub(crate) fn resolve_env_vars(input: &str) -> Result<String, ConfigError> {
	const MAX_INPUT_SIZE: usize = 1024 * 1024;
	if input.len() > MAX_INPUT_SIZE {
		return Err(ConfigError::Validation(format!(
			"Configuration file too large: {} bytes (max: {} bytes)",
			input.len(),
			MAX_INPUT_SIZE
		)));
	}

	let re = Regex::new(r"\$\{([A-Z_][A-Z0-9_]{0,127})(?::-([^}]{0,256}))?\}")
		.map_err(|e| ConfigError::Parse(format!("Regex error: {}", e)))?;

	let mut result = String::with_capacity(input.len());
	let mut last_end = 0;

	for cap in re.captures_iter(input) {
		let (Some(full_match), Some(var_name)) = (cap.get(0), cap.get(1)) else {
			continue;
		};
		let default_value = cap.get(2).map(|m| m.as_str());

		let value = match (std::env::var(var_name.as_str()), default_value) {
			(Ok(v), _) => v,
			(Err(_), Some(default)) => default.to_string(),
			(Err(_), None) => {
				return Err(ConfigError::Validation(format!(
					"Environment variable '{}' not found",
					var_name.as_str()
				)))
			},
		};

		result.push_str(&input[last_end..full_match.start()]);
		result.push_str(&value);
		last_end = full_match.end();
	}
	result.push_str(&input[last_end..]);

	Ok(result)
}

impl Config {
	/// Loads configuration from a file, following `include` directives.
	pub async fn from_file(path: &str) -> Result<Self, ConfigError> {
		let path_buf = Path::new(path);
		let base_dir = path_buf.parent().unwrap_or_else(|| Path::new("."));

		let mut loader = loader::ConfigLoader::new(base_dir);
		let file_name = path_buf
			.file_name()
			.ok_or_else(|| ConfigError::Validation(format!("Invalid path: {}", path)))?;
		loader.load_config(file_name).await
	}

	/// Checks cross-field constraints serde cannot express.
	fn validate(&self) -> Result<(), ConfigError> {
		if self.forwarder.id.is_empty() {
			return Err(ConfigError::Validation("Forwarder ID cannot be empty".into()));
		}
		if self.forwarder.chain_id == 0 {
			return Err(ConfigError::Validation(
				"Forwarder chain_id must be greater than 0".into(),
			));
		}
		if self.forwarder.address == Address::ZERO {
			return Err(ConfigError::Validation(
				"Forwarder address cannot be the zero address".into(),
			));
		}
		if self.forwarder.name.is_empty() || self.forwarder.version.is_empty() {
			return Err(ConfigError::Validation(
				"Forwarder domain name and version cannot be empty".into(),
			));
		}

		if self.storage.implementations.is_empty() {
			return Err(ConfigError::Validation(
				"At least one storage implementation must be configured".into(),
			));
		}
		if !self
			.storage
			.implementations
			.contains_key(&self.storage.primary)
		{
			return Err(ConfigError::Validation(format!(
				"Primary storage '{}' not found in implementations",
				self.storage.primary
			)));
		}
		if self.storage.cleanup_interval_seconds == 0 {
			return Err(ConfigError::Validation(
				"Storage cleanup_interval_seconds must be greater than 0".into(),
			));
		}
		if self.storage.cleanup_interval_seconds > 86400 {
			return Err(ConfigError::Validation(
				"Storage cleanup_interval_seconds cannot exceed 86400 (24 hours)".into(),
			));
		}

		if let Some(account) = &self.account {
			if !account.implementations.contains_key(&account.primary) {
				return Err(ConfigError::Validation(format!(
					"Primary account '{}' not found in implementations",
					account.primary
				)));
			}
		}

		self.validate_targets()?;

		if let Some(api) = &self.api {
			if api.enabled && api.max_request_size == 0 {
				return Err(ConfigError::Validation(
					"API max_request_size must be greater than 0".into(),
				));
			}
		}

		Ok(())
	}

	/// Every target needs a distinct address that is not the forwarder's own.
	fn validate_targets(&self) -> Result<(), ConfigError> {
		let mut seen = HashSet::new();

		for target in &self.targets {
			if target.implementation.is_empty() {
				return Err(ConfigError::Validation(format!(
					"Target at {} has an empty implementation",
					target.address
				)));
			}
			if target.address == self.forwarder.address {
				return Err(ConfigError::Validation(format!(
					"Target '{}' cannot share the forwarder address {}",
					target.implementation, target.address
				)));
			}
			if !seen.insert(target.address) {
				return Err(ConfigError::Validation(format!(
					"Duplicate target address {}",
					target.address
				)));
			}
		}

		Ok(())
	}
}

/// Parses a TOML string, resolving environment variables and validating.
impl FromStr for Config {
	type Err = ConfigError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		let resolved = resolve_env_vars(s)?;
		let config: Config = toml::from_str(&resolved)?;
		config.validate()?;
		Ok(config)
	}
}
