//! Builder for assembling a forwarder from configuration.
//!
//! Storage backends and call targets are pluggable; the builder looks each
//! configured implementation up by name in the factory maps it is given.

use crate::event_bus::EventBus;
use crate::ledger::{CallTarget, Ledger};
use crate::targets::TargetError;
use crate::Forwarder;
use forwarder_account::{AccountError, AccountInterface, AccountService};
use forwarder_config::Config;
use forwarder_storage::{StorageError, StorageInterface, StorageService};
use forwarder_types::Address;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur while building a forwarder.
#[derive(Debug, Error)]
pub enum BuilderError {
	#[error("Configuration error: {0}")]
	Config(String),
	#[error("Missing required component: {0}")]
	MissingComponent(String),
}

/// Factory maps keyed by implementation name.
pub struct ForwarderFactories<SF, TF> {
	pub storage_factories: HashMap<String, SF>,
	pub target_factories: HashMap<String, TF>,
}

/// Builds a [`Forwarder`] and its ledger from a [`Config`].
pub struct ForwarderBuilder {
	config: Config,
}

impl ForwarderBuilder {
	pub fn new(config: Config) -> Self {
		Self { config }
	}

	pub async fn build<SF, TF>(
		self,
		factories: ForwarderFactories<SF, TF>,
	) -> Result<Forwarder, BuilderError>
	where
		SF: Fn(&toml::Value) -> Result<Box<dyn StorageInterface>, StorageError>,
		TF: Fn(&toml::Value, Address) -> Result<Arc<dyn CallTarget>, TargetError>,
	{
		// Only the primary backend is instantiated; the others are just config.
		let primary_storage = &self.config.storage.primary;
		let storage_config = self
			.config
			.storage
			.implementations
			.get(primary_storage)
			.ok_or_else(|| {
				BuilderError::Config(format!(
					"Primary storage '{}' has no configuration",
					primary_storage
				))
			})?;
		let storage_factory = factories
			.storage_factories
			.get(primary_storage)
			.ok_or_else(|| {
				BuilderError::MissingComponent(format!("storage '{}'", primary_storage))
			})?;

		let storage_backend = match storage_factory(storage_config) {
			Ok(backend) => {
				tracing::info!(component = "storage", implementation = %primary_storage, "Loaded");
				backend
			},
			Err(e) => {
				tracing::error!(
					component = "storage",
					implementation = %primary_storage,
					error = %e,
					"Failed to create storage implementation"
				);
				return Err(BuilderError::Config(format!(
					"Failed to create storage implementation '{}': {}",
					primary_storage, e
				)));
			},
		};
		let storage = Arc::new(StorageService::new(storage_backend));

		let forwarder_address = self.config.forwarder.address;
		let ledger = Arc::new(Ledger::new());
		for target in &self.config.targets {
			let factory = factories
				.target_factories
				.get(&target.implementation)
				.ok_or_else(|| {
					BuilderError::MissingComponent(format!("target '{}'", target.implementation))
				})?;

			match factory(&target.settings_value(), forwarder_address) {
				Ok(implementation) => {
					ledger.register(target.address, implementation).await;
					tracing::info!(
						component = "target",
						implementation = %target.implementation,
						address = %target.address,
						"Loaded"
					);
				},
				Err(e) => {
					tracing::error!(
						component = "target",
						implementation = %target.implementation,
						error = %e,
						"Failed to create target implementation"
					);
					return Err(BuilderError::Config(format!(
						"Failed to create target '{}' at {}: {}",
						target.implementation, target.address, e
					)));
				},
			}
		}

		if self.config.targets.is_empty() {
			tracing::warn!("No targets configured - every forwarded call will hit an empty account");
		}

		let forwarder = Forwarder::new(
			self.config.forwarder.domain(),
			storage,
			ledger,
			EventBus::default(),
		)
		.with_receipt_ttl(Duration::from_secs(
			self.config.forwarder.receipt_ttl_seconds,
		));

		tracing::info!(
			forwarder_id = %self.config.forwarder.id,
			address = %forwarder_address,
			chain_id = self.config.forwarder.chain_id,
			"Forwarder built"
		);

		Ok(forwarder)
	}

	/// Builds the primary signing account, if one is configured.
	pub fn build_account<AF>(
		&self,
		account_factories: &HashMap<String, AF>,
	) -> Result<Option<AccountService>, BuilderError>
	where
		AF: Fn(&toml::Value) -> Result<Box<dyn AccountInterface>, AccountError>,
	{
		let Some(account) = &self.config.account else {
			return Ok(None);
		};

		let config = account.implementations.get(&account.primary).ok_or_else(|| {
			BuilderError::Config(format!(
				"Primary account '{}' has no configuration",
				account.primary
			))
		})?;
		let factory = account_factories.get(&account.primary).ok_or_else(|| {
			BuilderError::MissingComponent(format!("account '{}'", account.primary))
		})?;

		match factory(config) {
			Ok(implementation) => {
				tracing::info!(component = "account", implementation = %account.primary, "Loaded");
				Ok(Some(AccountService::new(implementation)))
			},
			Err(e) => {
				tracing::error!(
					component = "account",
					implementation = %account.primary,
					error = %e,
					"Failed to create account implementation"
				);
				Err(BuilderError::Config(format!(
					"Failed to create account implementation '{}': {}",
					account.primary, e
				)))
			},
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::targets;
	use forwarder_config::builders::config::ConfigBuilder;

	fn factories() -> ForwarderFactories<forwarder_storage::StorageFactory, targets::TargetFactory>
	{
		ForwarderFactories {
			storage_factories: forwarder_storage::get_all_implementations()
				.into_iter()
				.map(|(name, f)| (name.to_string(), f))
				.collect(),
			target_factories: targets::get_all_implementations()
				.into_iter()
				.map(|(name, f)| (name.to_string(), f))
				.collect(),
		}
	}

	#[tokio::test]
	async fn test_build_registers_targets() {
		let token = Address::repeat_byte(0x42);
		let config = ConfigBuilder::new().target("gasless_token", token).build();

		let forwarder = ForwarderBuilder::new(config)
			.build(factories())
			.await
			.unwrap();
		assert!(forwarder.ledger().has_target(token).await);
		assert_eq!(forwarder.domain().chain_id, 31337);
	}

	#[tokio::test]
	async fn test_unknown_target_implementation_fails() {
		let config = ConfigBuilder::new()
			.target("nonexistent", Address::repeat_byte(0x42))
			.build();

		let result = ForwarderBuilder::new(config).build(factories()).await;
		assert!(matches!(result, Err(BuilderError::MissingComponent(_))));
	}

	#[test]
	fn test_account_is_optional() {
		let builder = ForwarderBuilder::new(ConfigBuilder::new().build());
		let factories: HashMap<String, forwarder_account::AccountFactory> =
			forwarder_account::get_all_implementations()
				.into_iter()
				.map(|(name, f)| (name.to_string(), f))
				.collect();

		assert!(builder.build_account(&factories).unwrap().is_none());
	}
}
