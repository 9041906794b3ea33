//! Local private-key wallet backed by Alloy's signer.

use crate::{AccountError, AccountInterface};
use alloy_signer::Signer;
use alloy_signer_local::PrivateKeySigner;
use async_trait::async_trait;
use forwarder_types::{
	Address, Bytes, ConfigSchema, Field, FieldType, Schema, SecretString, ValidationError, B256,
};

/// Wallet holding a secp256k1 key in process memory.
pub struct LocalWallet {
	signer: PrivateKeySigner,
}

impl LocalWallet {
	/// Creates a wallet from a hex private key, with or without 0x prefix.
	pub fn new(private_key_hex: &str) -> Result<Self, AccountError> {
		let signer = private_key_hex
			.parse::<PrivateKeySigner>()
			.map_err(|e| AccountError::InvalidKey(format!("Invalid private key: {}", e)))?;

		Ok(Self { signer })
	}

	/// Address derived from the key. Infallible for a local key.
	pub fn address(&self) -> Address {
		self.signer.address()
	}
}

/// Configuration schema for LocalWallet.
pub struct LocalWalletSchema;

impl ConfigSchema for LocalWalletSchema {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		let schema = Schema::new(
			vec![
				Field::new("private_key", FieldType::String).with_validator(|value| {
					let key = value.as_str().unwrap_or_default();
					let key_without_prefix = key.strip_prefix("0x").unwrap_or(key);

					if key_without_prefix.len() != 64 {
						return Err("Private key must be 64 hex characters (32 bytes)".to_string());
					}

					if hex::decode(key_without_prefix).is_err() {
						return Err("Private key must be valid hexadecimal".to_string());
					}

					Ok(())
				}),
			],
			vec![],
		);

		schema.validate(config)
	}
}

#[async_trait]
impl AccountInterface for LocalWallet {
	fn config_schema(&self) -> Box<dyn ConfigSchema> {
		Box::new(LocalWalletSchema)
	}

	async fn address(&self) -> Result<Address, AccountError> {
		Ok(self.signer.address())
	}

	async fn sign_hash(&self, hash: &B256) -> Result<Bytes, AccountError> {
		let signature = self
			.signer
			.sign_hash(hash)
			.await
			.map_err(|e| AccountError::SigningFailed(format!("Failed to sign hash: {}", e)))?;

		Ok(Bytes::copy_from_slice(&signature.as_bytes()))
	}

	async fn sign_message(&self, message: &[u8]) -> Result<Bytes, AccountError> {
		let signature =
			self.signer.sign_message(message).await.map_err(|e| {
				AccountError::SigningFailed(format!("Failed to sign message: {}", e))
			})?;

		Ok(Bytes::copy_from_slice(&signature.as_bytes()))
	}

	fn get_private_key(&self) -> SecretString {
		SecretString::new(format!("0x{}", hex::encode(self.signer.to_bytes())))
	}
}

/// Creates a local wallet from `private_key`.
pub fn create_account(config: &toml::Value) -> Result<Box<dyn AccountInterface>, AccountError> {
	LocalWalletSchema
		.validate(config)
		.map_err(|e| AccountError::InvalidKey(e.to_string()))?;

	let private_key = config
		.get("private_key")
		.and_then(|v| v.as_str())
		.ok_or_else(|| AccountError::InvalidKey("private_key is required".to_string()))?;

	Ok(Box::new(LocalWallet::new(private_key)?))
}

/// Registry for the local wallet.
pub struct Registry;

impl forwarder_types::ImplementationRegistry for Registry {
	const NAME: &'static str = "local";
	type Factory = crate::AccountFactory;

	fn factory() -> Self::Factory {
		create_account
	}
}

impl crate::AccountRegistry for Registry {}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::AccountService;
	use alloy_primitives::{address, U256};
	use forwarder_types::{parse_signature, recover_signer, ForwardRequest, ForwarderDomain};

	// Well-known development keys.
	const KEY_0: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";
	const KEY_1: &str = "59c6995e998f97a5a0044966f0945389dc9e86dae88c7a8412f4603b6b78690d";

	fn config(key: &str) -> toml::Value {
		let mut table = toml::map::Map::new();
		table.insert("private_key".into(), toml::Value::String(key.into()));
		toml::Value::Table(table)
	}

	#[test]
	fn test_address_derivation() {
		let wallet = LocalWallet::new(KEY_0).unwrap();
		assert_eq!(
			wallet.address(),
			address!("f39Fd6e51aad88F6F4ce6aB8827279cffFb92266")
		);

		let wallet = LocalWallet::new(KEY_1).unwrap();
		assert_eq!(
			wallet.address(),
			address!("70997970C51812dc3A010C7d01b50e0d17dc79C8")
		);
	}

	#[test]
	fn test_schema_validation() {
		assert!(LocalWalletSchema.validate(&config(KEY_0)).is_ok());
		assert!(LocalWalletSchema.validate(&config("0x1234")).is_err());
		assert!(LocalWalletSchema
			.validate(&config(&"zz".repeat(32)))
			.is_err());
		assert!(LocalWalletSchema
			.validate(&toml::Value::Table(toml::map::Map::new()))
			.is_err());
	}

	#[test]
	fn test_factory_rejects_bad_key() {
		assert!(create_account(&config("not-a-key")).is_err());
		assert!(create_account(&config(KEY_1)).is_ok());
	}

	#[tokio::test]
	async fn test_signed_request_recovers_to_signer() {
		let service = AccountService::new(create_account(&config(KEY_1)).unwrap());
		let domain = ForwarderDomain::new(
			31337,
			address!("5FbDB2315678afecb367f032d93F642f64180aa3"),
		);
		let request = ForwardRequest {
			from: service.get_address().await.unwrap(),
			to: address!("e7f1725E7734CE288F8367e1Bb143E90bb3F0512"),
			value: U256::ZERO,
			gas: U256::from(100_000u64),
			nonce: U256::ZERO,
			data: Bytes::from(vec![0x12, 0x49, 0xc5, 0x8b]),
		};

		let signature = service.sign_forward_request(&request, &domain).await.unwrap();
		assert_eq!(signature.len(), 65);
		assert!(signature[64] == 27 || signature[64] == 28);

		let recovered = recover_signer(&request.signing_hash(&domain), &signature).unwrap();
		assert_eq!(recovered, request.from);
	}

	#[tokio::test]
	async fn test_refuses_to_sign_for_other_address() {
		let service = AccountService::new(create_account(&config(KEY_0)).unwrap());
		let domain = ForwarderDomain::new(1, Address::ZERO);
		let request = ForwardRequest {
			from: address!("70997970C51812dc3A010C7d01b50e0d17dc79C8"),
			to: Address::ZERO,
			value: U256::ZERO,
			gas: U256::ZERO,
			nonce: U256::ZERO,
			data: Bytes::new(),
		};

		assert!(matches!(
			service.sign_forward_request(&request, &domain).await,
			Err(AccountError::SigningFailed(_))
		));
	}

	#[tokio::test]
	async fn test_sign_message_uses_personal_prefix() {
		let wallet = LocalWallet::new(KEY_0).unwrap();
		let signature = AccountInterface::sign_message(&wallet, b"hello").await.unwrap();

		let parsed = parse_signature(&signature).unwrap();
		assert_eq!(
			parsed.recover_address_from_msg(b"hello").unwrap(),
			wallet.address()
		);
	}

	#[test]
	fn test_private_key_round_trip() {
		let wallet = LocalWallet::new(KEY_1).unwrap();
		let key = wallet.get_private_key();
		assert_eq!(key.expose_secret(), format!("0x{}", KEY_1));
		assert!(!format!("{:?}", key).contains(KEY_1));
	}
}
