//! Registry trait for self-registering implementations.

/// Base trait for implementation registries.
///
/// Each pluggable module (storage, account, targets) exposes a `Registry`
/// struct implementing this trait so the service can map configuration names
/// to factory functions:
/// - "memory" for `[storage.implementations.memory]`
/// - "local" for `[account.implementations.local]`
/// - "gasless_token" for a `[targets.<name>]` entry with `implementation = "gasless_token"`
pub trait ImplementationRegistry {
	/// The name used in configuration files to reference this implementation.
	const NAME: &'static str;

	/// The factory function type this implementation provides.
	type Factory;

	/// Get the factory function for this implementation.
	fn factory() -> Self::Factory;
}
