//! Mintable token that accepts calls relayed by a trusted forwarder.
//!
//! Anyone may mint. The recipient is the effective sender, so a relayed
//! `mint()` credits the signer and never the relayer that submitted it.

use super::TargetError;
use crate::context::TrustedForwarderContext;
use crate::ledger::{CallContext, CallFailure, CallTarget};
use crate::Undo;
use alloy_sol_types::{sol, SolCall, SolInterface};
use async_trait::async_trait;
use forwarder_types::{
	Address, Bytes, ConfigSchema, Field, FieldType, Schema, ValidationError, U256,
};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

sol! {
	interface IGaslessToken {
		function name() external view returns (string);
		function symbol() external view returns (string);
		function decimals() external view returns (uint8);
		function totalSupply() external view returns (uint256);
		function balanceOf(address owner) external view returns (uint256);
		function mint() external;
		function mint(uint256 amount) external;
	}
}

pub use IGaslessToken::IGaslessTokenCalls;

pub const DECIMALS: u8 = 18;

/// Amount minted by the argument-less `mint()`: ten times `decimals()`.
pub const DEFAULT_MINT_AMOUNT: u64 = 10 * DECIMALS as u64;

/// Charged on every call.
pub const BASE_GAS: u64 = 2_100;

/// Charged on top of [`BASE_GAS`] for a mint.
pub const MINT_GAS: u64 = 45_000;

pub const DEFAULT_NAME: &str = "GaslessToken";
pub const DEFAULT_SYMBOL: &str = "GLT";

#[derive(Debug, Default)]
struct TokenState {
	balances: HashMap<Address, U256>,
	total_supply: U256,
}

/// ERC-20 style balances with open minting.
pub struct GaslessToken {
	name: String,
	symbol: String,
	context: TrustedForwarderContext,
	state: Arc<RwLock<TokenState>>,
}

impl GaslessToken {
	pub fn new(name: impl Into<String>, symbol: impl Into<String>, trusted_forwarder: Address) -> Self {
		Self {
			name: name.into(),
			symbol: symbol.into(),
			context: TrustedForwarderContext::new(trusted_forwarder),
			state: Arc::new(RwLock::new(TokenState::default())),
		}
	}

	pub async fn balance_of(&self, owner: Address) -> U256 {
		self.state
			.read()
			.await
			.balances
			.get(&owner)
			.copied()
			.unwrap_or(U256::ZERO)
	}

	pub async fn total_supply(&self) -> U256 {
		self.state.read().await.total_supply
	}

	/// Credits `amount` to `to`. Fails without touching state on overflow.
	async fn mint_to(&self, to: Address, amount: U256) -> Result<(), CallFailure> {
		let mut state = self.state.write().await;
		let total_supply = state
			.total_supply
			.checked_add(amount)
			.ok_or_else(|| CallFailure::reason("total supply overflow"))?;

		let balance = state.balances.get(&to).copied().unwrap_or(U256::ZERO);
		// cannot overflow: balance <= total_supply
		state.balances.insert(to, balance + amount);
		state.total_supply = total_supply;
		Ok(())
	}

	/// Mints and registers the reversal with the running call.
	async fn mint(
		&self,
		ctx: &mut CallContext<'_>,
		to: Address,
		amount: U256,
	) -> Result<(), CallFailure> {
		ctx.consume_gas(MINT_GAS)?;
		self.mint_to(to, amount).await?;
		ctx.record_undo(Burn {
			state: self.state.clone(),
			from: to,
			amount,
		})
		.await;
		tracing::debug!(%to, %amount, "Minted");
		Ok(())
	}
}

/// Reverses a mint.
struct Burn {
	state: Arc<RwLock<TokenState>>,
	from: Address,
	amount: U256,
}

#[async_trait]
impl Undo for Burn {
	async fn undo(self: Box<Self>) {
		let mut state = self.state.write().await;
		let balance = state.balances.get(&self.from).copied().unwrap_or(U256::ZERO);
		state
			.balances
			.insert(self.from, balance.saturating_sub(self.amount));
		state.total_supply = state.total_supply.saturating_sub(self.amount);
	}
}

#[async_trait]
impl CallTarget for GaslessToken {
	async fn call(&self, ctx: &mut CallContext<'_>) -> Result<Bytes, CallFailure> {
		ctx.consume_gas(BASE_GAS)?;

		let frame = ctx.frame();
		if !frame.value.is_zero() {
			return Err(CallFailure::Revert(Bytes::new()));
		}

		let sender = self.context.msg_sender(frame);
		let is_static = frame.is_static;
		let call = IGaslessTokenCalls::abi_decode(self.context.msg_data(frame), true)
			.map_err(|_| CallFailure::Revert(Bytes::new()))?;

		let output = match call {
			IGaslessTokenCalls::name(_) => {
				IGaslessToken::nameCall::abi_encode_returns(&(self.name.clone(),))
			},
			IGaslessTokenCalls::symbol(_) => {
				IGaslessToken::symbolCall::abi_encode_returns(&(self.symbol.clone(),))
			},
			IGaslessTokenCalls::decimals(_) => {
				IGaslessToken::decimalsCall::abi_encode_returns(&(DECIMALS,))
			},
			IGaslessTokenCalls::totalSupply(_) => {
				IGaslessToken::totalSupplyCall::abi_encode_returns(&(self.total_supply().await,))
			},
			IGaslessTokenCalls::balanceOf(call) => {
				let balance = self.balance_of(call.owner).await;
				IGaslessToken::balanceOfCall::abi_encode_returns(&(balance,))
			},
			IGaslessTokenCalls::mint_0(_) | IGaslessTokenCalls::mint_1(_) if is_static => {
				return Err(CallFailure::reason("state change in static call"));
			},
			IGaslessTokenCalls::mint_0(_) => {
				self.mint(ctx, sender, U256::from(DEFAULT_MINT_AMOUNT)).await?;
				Vec::new()
			},
			IGaslessTokenCalls::mint_1(call) => {
				self.mint(ctx, sender, call.amount).await?;
				Vec::new()
			},
		};

		Ok(output.into())
	}
}

/// Configuration schema for GaslessToken.
pub struct GaslessTokenSchema;

impl ConfigSchema for GaslessTokenSchema {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		let non_empty = |value: &toml::Value| match value.as_str() {
			Some(s) if !s.trim().is_empty() => Ok(()),
			_ => Err("must not be empty".to_string()),
		};

		Schema::new(
			vec![],
			vec![
				Field::new("token_name", FieldType::String).with_validator(non_empty),
				Field::new("symbol", FieldType::String).with_validator(non_empty),
			],
		)
		.validate(config)
	}
}

/// Creates a token trusting `forwarder`.
///
/// Configuration parameters:
/// - `token_name`: ERC-20 name (default: "GaslessToken")
/// - `symbol`: ERC-20 symbol (default: "GLT")
pub fn create_target(
	config: &toml::Value,
	forwarder: Address,
) -> Result<Arc<dyn CallTarget>, TargetError> {
	GaslessTokenSchema
		.validate(config)
		.map_err(|e| TargetError::Configuration(e.to_string()))?;

	let name = config
		.get("token_name")
		.and_then(|v| v.as_str())
		.unwrap_or(DEFAULT_NAME);
	let symbol = config
		.get("symbol")
		.and_then(|v| v.as_str())
		.unwrap_or(DEFAULT_SYMBOL);

	Ok(Arc::new(GaslessToken::new(name, symbol, forwarder)))
}

/// Registry for the gasless token.
pub struct Registry;

impl forwarder_types::ImplementationRegistry for Registry {
	const NAME: &'static str = "gasless_token";
	type Factory = super::TargetFactory;

	fn factory() -> Self::Factory {
		create_target
	}
}

impl super::TargetRegistry for Registry {}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_selectors() {
		assert_eq!(IGaslessToken::mint_0Call::SELECTOR, [0x12, 0x49, 0xc5, 0x8b]);
		assert_eq!(IGaslessToken::mint_1Call::SELECTOR, [0xa0, 0x71, 0x2d, 0x68]);
		assert_eq!(IGaslessToken::balanceOfCall::SELECTOR, [0x70, 0xa0, 0x82, 0x31]);
	}

	#[test]
	fn test_default_mint_amount() {
		assert_eq!(DEFAULT_MINT_AMOUNT, 180);
	}

	#[test]
	fn test_schema() {
		let config: toml::Value = toml::from_str("token_name = \"T\"\nsymbol = \"TT\"").unwrap();
		assert!(GaslessTokenSchema.validate(&config).is_ok());

		let config: toml::Value = toml::from_str("symbol = \"\"").unwrap();
		assert!(GaslessTokenSchema.validate(&config).is_err());

		assert!(create_target(&config, Address::ZERO).is_err());
	}

	#[tokio::test]
	async fn test_mint_to_tracks_supply() {
		let token = GaslessToken::new(DEFAULT_NAME, DEFAULT_SYMBOL, Address::ZERO);
		let owner = Address::repeat_byte(0x11);

		token.mint_to(owner, U256::from(5u64)).await.unwrap();
		token.mint_to(owner, U256::from(7u64)).await.unwrap();

		assert_eq!(token.balance_of(owner).await, U256::from(12u64));
		assert_eq!(token.total_supply().await, U256::from(12u64));

		assert!(token.mint_to(owner, U256::MAX).await.is_err());
		assert_eq!(token.total_supply().await, U256::from(12u64));
	}

	#[tokio::test]
	async fn test_burn_reverses_mint() {
		let token = GaslessToken::new(DEFAULT_NAME, DEFAULT_SYMBOL, Address::ZERO);
		let owner = Address::repeat_byte(0x11);

		token.mint_to(owner, U256::from(5u64)).await.unwrap();
		token.mint_to(owner, U256::from(7u64)).await.unwrap();
		Box::new(Burn {
			state: token.state.clone(),
			from: owner,
			amount: U256::from(7u64),
		})
		.undo()
		.await;

		assert_eq!(token.balance_of(owner).await, U256::from(5u64));
		assert_eq!(token.total_supply().await, U256::from(5u64));
	}
}
