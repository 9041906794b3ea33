//! In-process relay walkthrough.
//!
//! Runs the classic gasless-mint scenarios against the configured token:
//! a relayed `mint()`, a relayed `mint(500)`, a replay, a forged sender and
//! a stale nonce. The configured account plays the user.

use alloy_sol_types::SolCall;
use forwarder_account::AccountService;
use forwarder_config::Config;
use forwarder_core::targets::gasless_token::{self, IGaslessToken};
use forwarder_core::{Forwarder, ForwarderError};
use forwarder_types::{Address, Bytes, ForwardRequest, ImplementationRegistry, U256};
use thiserror::Error;

/// Gas budget given to every demo request.
const DEMO_GAS: u64 = 100_000;

#[derive(Debug, Error)]
pub enum DemoError {
	#[error("Demo requires a configured account")]
	NoAccount,
	#[error("Demo requires a gasless_token target")]
	NoToken,
	#[error("Scenario '{scenario}' failed: {message}")]
	Scenario {
		scenario: &'static str,
		message: String,
	},
}

/// What happened in one scenario.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScenarioOutcome {
	pub name: &'static str,
	/// Whether the forwarder behaved as the scenario expects.
	pub passed: bool,
	pub detail: String,
}

/// Address of the first configured gasless token.
pub fn token_address(config: &Config) -> Option<Address> {
	config
		.targets
		.iter()
		.find(|t| t.implementation == gasless_token::Registry::NAME)
		.map(|t| t.address)
}

struct Demo<'a> {
	forwarder: &'a Forwarder,
	account: &'a AccountService,
	user: Address,
	token: Address,
}

impl Demo<'_> {
	fn scenario_error(scenario: &'static str, message: impl ToString) -> DemoError {
		DemoError::Scenario {
			scenario,
			message: message.to_string(),
		}
	}

	async fn request(&self, scenario: &'static str, data: Vec<u8>) -> Result<ForwardRequest, DemoError> {
		let nonce = self
			.forwarder
			.get_nonce(self.user)
			.await
			.map_err(|e| Self::scenario_error(scenario, e))?;

		Ok(ForwardRequest {
			from: self.user,
			to: self.token,
			value: U256::ZERO,
			gas: U256::from(DEMO_GAS),
			nonce,
			data: data.into(),
		})
	}

	async fn sign(&self, scenario: &'static str, request: &ForwardRequest) -> Result<Bytes, DemoError> {
		self.account
			.sign_forward_request(request, self.forwarder.domain())
			.await
			.map_err(|e| Self::scenario_error(scenario, e))
	}

	async fn balance(&self, owner: Address) -> U256 {
		let data = IGaslessToken::balanceOfCall { owner }.abi_encode();
		let outcome = self.forwarder.query(self.token, data.into()).await;
		if outcome.success && outcome.return_data.len() == 32 {
			U256::from_be_slice(&outcome.return_data)
		} else {
			U256::ZERO
		}
	}

	/// Relays `data` and checks the user gained exactly `expected`.
	async fn relayed_mint(
		&self,
		name: &'static str,
		data: Vec<u8>,
		expected: U256,
	) -> Result<(ScenarioOutcome, ForwardRequest, Bytes), DemoError> {
		let request = self.request(name, data).await?;
		let signature = self.sign(name, &request).await?;

		let before = self.balance(self.user).await;
		let relayer_before = self.balance(self.forwarder.address()).await;
		let result = self
			.forwarder
			.execute(&request, &signature)
			.await
			.map_err(|e| Self::scenario_error(name, e))?;
		let gained = self.balance(self.user).await.saturating_sub(before);
		let relayer_gained = self
			.balance(self.forwarder.address())
			.await
			.saturating_sub(relayer_before);

		let outcome = ScenarioOutcome {
			name,
			passed: result.success && gained == expected && relayer_gained.is_zero(),
			detail: format!(
				"success={} user +{} relayer +{} nonce {}",
				result.success, gained, relayer_gained, result.nonce
			),
		};
		Ok((outcome, request, signature))
	}

	/// Expects the forwarder to turn `request` away without changing state.
	async fn rejected(
		&self,
		name: &'static str,
		request: &ForwardRequest,
		signature: &[u8],
	) -> Result<ScenarioOutcome, DemoError> {
		let nonce_before = self
			.forwarder
			.get_nonce(request.from)
			.await
			.map_err(|e| Self::scenario_error(name, e))?;
		let verified = self.forwarder.verify(request, signature).await;
		let result = self.forwarder.execute(request, signature).await;
		let nonce_after = self
			.forwarder
			.get_nonce(request.from)
			.await
			.map_err(|e| Self::scenario_error(name, e))?;

		let (passed, detail) = match result {
			Err(e @ (ForwarderError::InvalidSignature(_) | ForwarderError::NonceMismatch { .. })) => {
				(!verified && nonce_before == nonce_after, format!("rejected: {}", e))
			},
			Err(e) => return Err(Self::scenario_error(name, e)),
			Ok(result) => (false, format!("unexpectedly executed, success={}", result.success)),
		};

		Ok(ScenarioOutcome {
			name,
			passed,
			detail,
		})
	}
}

/// Runs every scenario and returns their outcomes in order.
pub async fn run_demo(
	forwarder: &Forwarder,
	account: &AccountService,
	token: Address,
) -> Result<Vec<ScenarioOutcome>, DemoError> {
	let user = account
		.get_address()
		.await
		.map_err(|e| Demo::scenario_error("setup", e))?;
	let demo = Demo {
		forwarder,
		account,
		user,
		token,
	};

	tracing::info!(%user, %token, forwarder = %forwarder.address(), "Starting relay demo");

	let mut outcomes = Vec::new();

	let (outcome, minted, minted_signature) = demo
		.relayed_mint(
			"relayed mint()",
			IGaslessToken::mint_0Call {}.abi_encode(),
			U256::from(gasless_token::DEFAULT_MINT_AMOUNT),
		)
		.await?;
	outcomes.push(outcome);

	let (outcome, _, _) = demo
		.relayed_mint(
			"relayed mint(500)",
			IGaslessToken::mint_1Call {
				amount: U256::from(500u64),
			}
			.abi_encode(),
			U256::from(500u64),
		)
		.await?;
	outcomes.push(outcome);

	outcomes.push(
		demo.rejected("replay", &minted, &minted_signature)
			.await?,
	);

	// Signed by the user but claiming someone else sent it.
	let forged = ForwardRequest {
		from: Address::repeat_byte(0xf0),
		..demo.request("forged sender", IGaslessToken::mint_0Call {}.abi_encode()).await?
	};
	let forged_signature = demo
		.sign(
			"forged sender",
			&ForwardRequest {
				from: user,
				..forged.clone()
			},
		)
		.await?;
	outcomes.push(demo.rejected("forged sender", &forged, &forged_signature).await?);

	let stale = demo
		.request("stale nonce", IGaslessToken::mint_0Call {}.abi_encode())
		.await?;
	let stale = ForwardRequest {
		nonce: stale.nonce.saturating_add(U256::from(1u64)),
		..stale
	};
	let stale_signature = demo.sign("stale nonce", &stale).await?;
	outcomes.push(demo.rejected("stale nonce", &stale, &stale_signature).await?);

	for outcome in &outcomes {
		if outcome.passed {
			tracing::info!(scenario = outcome.name, detail = %outcome.detail, "Scenario passed");
		} else {
			tracing::warn!(scenario = outcome.name, detail = %outcome.detail, "Scenario failed");
		}
	}

	Ok(outcomes)
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::factory_registry::{build_account_from_config, build_forwarder_from_config};
	use forwarder_config::builders::config::ConfigBuilder;

	const KEY_1: &str = "59c6995e998f97a5a0044966f0945389dc9e86dae88c7a8412f4603b6b78690d";

	#[tokio::test]
	async fn test_demo_scenarios_pass() {
		let token = Address::repeat_byte(0x42);
		let config = ConfigBuilder::new()
			.local_account(KEY_1)
			.target("gasless_token", token)
			.build();

		assert_eq!(token_address(&config), Some(token));
		let account = build_account_from_config(&config).unwrap().unwrap();
		let forwarder = build_forwarder_from_config(config).await.unwrap();

		let outcomes = run_demo(&forwarder, &account, token).await.unwrap();
		assert_eq!(outcomes.len(), 5);
		for outcome in outcomes {
			assert!(outcome.passed, "{}: {}", outcome.name, outcome.detail);
		}
	}

	#[test]
	fn test_token_address_requires_token_target() {
		assert_eq!(token_address(&ConfigBuilder::new().build()), None);
	}
}
