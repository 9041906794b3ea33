//! Call targets that can be registered on the ledger from configuration.

use crate::ledger::CallTarget;
use forwarder_types::{Address, ImplementationRegistry};
use std::sync::Arc;
use thiserror::Error;

pub mod gasless_token;

/// Errors raised while constructing a target.
#[derive(Debug, Error)]
pub enum TargetError {
	#[error("Configuration error: {0}")]
	Configuration(String),
}

/// Factory signature every target implementation provides. Receives the
/// target's implementation-specific settings and the forwarder address it
/// should trust.
pub type TargetFactory = fn(&toml::Value, Address) -> Result<Arc<dyn CallTarget>, TargetError>;

/// Registry trait for target implementations.
pub trait TargetRegistry: ImplementationRegistry<Factory = TargetFactory> {}

/// All built-in target implementations as `(name, factory)` pairs.
pub fn get_all_implementations() -> Vec<(&'static str, TargetFactory)> {
	vec![(
		gasless_token::Registry::NAME,
		gasless_token::Registry::factory(),
	)]
}
