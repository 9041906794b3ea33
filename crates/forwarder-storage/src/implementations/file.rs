//! File-based storage backend.
//!
//! Each key maps to one `.bin` file under the configured directory. Files
//! start with a fixed header carrying the expiry so cleanup can skip the
//! payload entirely. Writes go to a temp file and are renamed into place, so
//! a crash never leaves a half-written nonce behind.

use crate::{StorageError, StorageInterface};
use async_trait::async_trait;
use forwarder_types::utils::current_timestamp;
use forwarder_types::{ConfigSchema, Field, FieldType, Schema, StorageKey, ValidationError};
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;
use tokio::fs;

/// Default directory for the file backend.
pub const DEFAULT_STORAGE_PATH: &str = "./data/storage";

#[allow(clippy::doc_nested_refdefs)]
/// Fixed-size file header.
///
/// Binary layout (64 bytes total):
/// - [0-3]: Magic bytes "FWDS"
/// - [4-5]: Version (u16, little-endian)
/// - [6-13]: Expiration timestamp (u64, little-endian, Unix seconds, 0 = never)
/// - [14-63]: Reserved
#[derive(Debug, Clone, PartialEq, Eq)]
struct FileHeader {
	version: u16,
	expires_at: u64,
}

impl FileHeader {
	const MAGIC: &'static [u8; 4] = b"FWDS";
	const VERSION: u16 = 1;
	const SIZE: usize = 64;

	fn new(ttl: Duration) -> Self {
		let expires_at = if ttl.is_zero() {
			0
		} else {
			current_timestamp().saturating_add(ttl.as_secs().max(1))
		};

		Self {
			version: Self::VERSION,
			expires_at,
		}
	}

	fn serialize(&self) -> [u8; Self::SIZE] {
		let mut bytes = [0u8; Self::SIZE];
		bytes[0..4].copy_from_slice(Self::MAGIC);
		bytes[4..6].copy_from_slice(&self.version.to_le_bytes());
		bytes[6..14].copy_from_slice(&self.expires_at.to_le_bytes());
		bytes
	}

	fn deserialize(bytes: &[u8]) -> Result<Self, StorageError> {
		if bytes.len() < Self::SIZE {
			return Err(StorageError::Backend("File too small for header".into()));
		}
		if &bytes[0..4] != Self::MAGIC {
			return Err(StorageError::Backend("Unrecognized file format".into()));
		}

		let version = u16::from_le_bytes([bytes[4], bytes[5]]);
		if version > Self::VERSION {
			return Err(StorageError::Backend(format!(
				"Unsupported file version: {}",
				version
			)));
		}

		let mut expires_bytes = [0u8; 8];
		expires_bytes.copy_from_slice(&bytes[6..14]);

		Ok(Self {
			version,
			expires_at: u64::from_le_bytes(expires_bytes),
		})
	}

	fn is_expired(&self) -> bool {
		self.expires_at != 0 && current_timestamp() >= self.expires_at
	}
}

/// Per-namespace default TTLs, read from `ttl_<namespace>` keys.
///
/// Only namespaces whose [`StorageKey::allows_ttl`] is true are configurable.
#[derive(Debug, Clone, Default)]
pub struct TtlConfig {
	ttls: HashMap<StorageKey, Duration>,
}

impl TtlConfig {
	fn from_config(config: &toml::Value) -> Self {
		let mut ttls = HashMap::new();

		if let Some(table) = config.as_table() {
			for storage_key in StorageKey::all().filter(StorageKey::allows_ttl) {
				let config_key = format!("ttl_{}", storage_key.as_str());
				if let Some(secs) = table
					.get(&config_key)
					.and_then(|v| v.as_integer())
					.and_then(|v| u64::try_from(v).ok())
				{
					ttls.insert(storage_key, Duration::from_secs(secs));
				}
			}
		}

		Self { ttls }
	}

	fn get_ttl(&self, storage_key: StorageKey) -> Duration {
		self.ttls
			.get(&storage_key)
			.copied()
			.unwrap_or(Duration::ZERO)
	}
}

/// File-based storage implementation.
pub struct FileStorage {
	base_path: PathBuf,
	ttl_config: TtlConfig,
}

impl FileStorage {
	pub fn new(base_path: PathBuf, ttl_config: TtlConfig) -> Self {
		Self {
			base_path,
			ttl_config,
		}
	}

	fn get_file_path(&self, key: &str) -> PathBuf {
		let safe_key = key.replace(['/', ':', '\\'], "_");
		self.base_path.join(format!("{}.bin", safe_key))
	}

	/// Namespace default TTL for keys written without an explicit one.
	fn get_ttl_for_key(&self, key: &str) -> Duration {
		let namespace = key.split(':').next().unwrap_or("");

		match namespace.parse::<StorageKey>() {
			Ok(sk) if sk.allows_ttl() => self.ttl_config.get_ttl(sk),
			_ => Duration::ZERO,
		}
	}

	async fn cleanup_expired_files(&self) -> Result<usize, StorageError> {
		let mut entries = match fs::read_dir(&self.base_path).await {
			Ok(entries) => entries,
			Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
			Err(e) => return Err(StorageError::Backend(e.to_string())),
		};

		let mut removed = 0;
		while let Some(entry) = entries
			.next_entry()
			.await
			.map_err(|e| StorageError::Backend(e.to_string()))?
		{
			let path = entry.path();
			if path.extension() != Some(std::ffi::OsStr::new("bin")) {
				continue;
			}

			let data = match fs::read(&path).await {
				Ok(data) => data,
				Err(e) => {
					tracing::debug!("Skipping file {:?}: could not be read: {}", path, e);
					continue;
				},
			};

			match FileHeader::deserialize(&data) {
				Ok(header) if header.is_expired() => match fs::remove_file(&path).await {
					Ok(()) => removed += 1,
					Err(e) => tracing::warn!("Failed to remove expired file {:?}: {}", path, e),
				},
				Ok(_) => {},
				Err(e) => tracing::debug!("Skipping file {:?}: {}", path, e),
			}
		}

		Ok(removed)
	}
}

#[async_trait]
impl StorageInterface for FileStorage {
	async fn get_bytes(&self, key: &str) -> Result<Vec<u8>, StorageError> {
		let path = self.get_file_path(key);

		let data = match fs::read(&path).await {
			Ok(data) => data,
			Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
				return Err(StorageError::NotFound)
			},
			Err(e) => return Err(StorageError::Backend(e.to_string())),
		};

		let header = FileHeader::deserialize(&data)?;
		if header.is_expired() {
			return Err(StorageError::NotFound);
		}

		Ok(data[FileHeader::SIZE..].to_vec())
	}

	async fn set_bytes(
		&self,
		key: &str,
		value: Vec<u8>,
		ttl: Option<Duration>,
	) -> Result<(), StorageError> {
		fs::create_dir_all(&self.base_path)
			.await
			.map_err(|e| StorageError::Backend(e.to_string()))?;

		let path = self.get_file_path(key);
		let ttl = ttl.unwrap_or_else(|| self.get_ttl_for_key(key));

		let mut file_data = Vec::with_capacity(FileHeader::SIZE + value.len());
		file_data.extend_from_slice(&FileHeader::new(ttl).serialize());
		file_data.extend_from_slice(&value);

		let temp_path = path.with_extension("tmp");
		fs::write(&temp_path, file_data)
			.await
			.map_err(|e| StorageError::Backend(e.to_string()))?;
		fs::rename(&temp_path, &path)
			.await
			.map_err(|e| StorageError::Backend(e.to_string()))?;

		Ok(())
	}

	async fn delete(&self, key: &str) -> Result<(), StorageError> {
		match fs::remove_file(self.get_file_path(key)).await {
			Ok(()) => Ok(()),
			Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
			Err(e) => Err(StorageError::Backend(e.to_string())),
		}
	}

	async fn exists(&self, key: &str) -> Result<bool, StorageError> {
		match self.get_bytes(key).await {
			Ok(_) => Ok(true),
			Err(StorageError::NotFound) => Ok(false),
			Err(e) => Err(e),
		}
	}

	fn config_schema(&self) -> Box<dyn ConfigSchema> {
		Box::new(FileStorageSchema)
	}

	async fn cleanup_expired(&self) -> Result<usize, StorageError> {
		self.cleanup_expired_files().await
	}
}

/// Configuration schema for FileStorage.
pub struct FileStorageSchema;

impl ConfigSchema for FileStorageSchema {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		let mut optional_fields = vec![Field::new("storage_path", FieldType::String)];

		for storage_key in StorageKey::all().filter(StorageKey::allows_ttl) {
			optional_fields.push(Field::new(
				format!("ttl_{}", storage_key.as_str()),
				FieldType::Integer {
					min: Some(0),
					max: None,
				},
			));
		}

		Schema::new(vec![], optional_fields).validate(config)?;

		if config.get("ttl_nonces").is_some() {
			return Err(ValidationError::InvalidValue {
				field: "ttl_nonces".to_string(),
				message: "nonces cannot expire".to_string(),
			});
		}

		Ok(())
	}
}

/// Creates a file backend.
///
/// Configuration parameters:
/// - `storage_path`: base directory (default: "./data/storage")
/// - `ttl_receipts`: TTL in seconds for execution receipts (default: 0, never)
pub fn create_storage(config: &toml::Value) -> Result<Box<dyn StorageInterface>, StorageError> {
	FileStorageSchema
		.validate(config)
		.map_err(|e| StorageError::Configuration(e.to_string()))?;

	let storage_path = config
		.get("storage_path")
		.and_then(|v| v.as_str())
		.unwrap_or(DEFAULT_STORAGE_PATH);

	Ok(Box::new(FileStorage::new(
		PathBuf::from(storage_path),
		TtlConfig::from_config(config),
	)))
}

/// Registry for the file backend.
pub struct Registry;

impl forwarder_types::ImplementationRegistry for Registry {
	const NAME: &'static str = "file";
	type Factory = crate::StorageFactory;

	fn factory() -> Self::Factory {
		create_storage
	}
}

impl crate::StorageRegistry for Registry {}

#[cfg(test)]
mod tests {
	use super::*;
	use tempfile::TempDir;

	fn storage_in(dir: &TempDir, ttl_receipts: Option<i64>) -> Box<dyn StorageInterface> {
		let mut table = toml::map::Map::new();
		table.insert(
			"storage_path".into(),
			toml::Value::String(dir.path().to_string_lossy().into_owned()),
		);
		if let Some(ttl) = ttl_receipts {
			table.insert("ttl_receipts".into(), toml::Value::Integer(ttl));
		}
		create_storage(&toml::Value::Table(table)).unwrap()
	}

	#[test]
	fn test_header_layout() {
		let header = FileHeader {
			version: 1,
			expires_at: 0x0102,
		};
		let bytes = header.serialize();

		assert_eq!(&bytes[0..4], b"FWDS");
		assert_eq!(bytes[6], 0x02);
		assert_eq!(bytes[7], 0x01);
		assert_eq!(FileHeader::deserialize(&bytes).unwrap(), header);
	}

	#[test]
	fn test_header_rejects_foreign_files() {
		assert!(FileHeader::deserialize(b"short").is_err());
		assert!(FileHeader::deserialize(&[0u8; 64]).is_err());

		let mut future = FileHeader::new(Duration::ZERO).serialize();
		future[4] = 9;
		assert!(FileHeader::deserialize(&future).is_err());
	}

	#[tokio::test]
	async fn test_persists_across_instances() {
		let dir = TempDir::new().unwrap();

		let first = storage_in(&dir, None);
		first
			.set_bytes("nonces:0xabc", b"\"5\"".to_vec(), None)
			.await
			.unwrap();
		drop(first);

		let second = storage_in(&dir, None);
		assert_eq!(
			second.get_bytes("nonces:0xabc").await.unwrap(),
			b"\"5\"".to_vec()
		);
		assert!(second.exists("nonces:0xabc").await.unwrap());
	}

	#[tokio::test]
	async fn test_missing_key_and_delete() {
		let dir = TempDir::new().unwrap();
		let storage = storage_in(&dir, None);

		assert!(matches!(
			storage.get_bytes("nonces:missing").await,
			Err(StorageError::NotFound)
		));
		assert!(!storage.exists("nonces:missing").await.unwrap());
		storage.delete("nonces:missing").await.unwrap();
	}

	#[tokio::test]
	async fn test_expired_files_are_cleaned_up() {
		let dir = TempDir::new().unwrap();
		let storage = FileStorage::new(dir.path().to_path_buf(), TtlConfig::default());

		// Write an already-expired receipt directly.
		let header = FileHeader {
			version: 1,
			expires_at: 1,
		};
		let mut data = header.serialize().to_vec();
		data.extend_from_slice(b"{}");
		std::fs::write(storage.get_file_path("receipts:old"), data).unwrap();

		storage
			.set_bytes("nonces:keep", b"1".to_vec(), None)
			.await
			.unwrap();

		assert!(matches!(
			storage.get_bytes("receipts:old").await,
			Err(StorageError::NotFound)
		));
		assert_eq!(storage.cleanup_expired().await.unwrap(), 1);
		assert!(storage.exists("nonces:keep").await.unwrap());
	}

	#[test]
	fn test_namespace_ttls() {
		let dir = TempDir::new().unwrap();
		let mut table = toml::map::Map::new();
		table.insert("ttl_receipts".into(), toml::Value::Integer(3600));
		let storage = FileStorage::new(
			dir.path().to_path_buf(),
			TtlConfig::from_config(&toml::Value::Table(table)),
		);

		assert_eq!(
			storage.get_ttl_for_key("receipts:0xabc:0"),
			Duration::from_secs(3600)
		);
		assert_eq!(storage.get_ttl_for_key("nonces:0xabc"), Duration::ZERO);
	}

	#[test]
	fn test_schema_rejects_nonce_ttl() {
		let config: toml::Value = toml::from_str("ttl_nonces = 60").unwrap();
		assert!(FileStorageSchema.validate(&config).is_err());

		let config: toml::Value = toml::from_str("ttl_receipts = -1").unwrap();
		assert!(FileStorageSchema.validate(&config).is_err());

		let config: toml::Value =
			toml::from_str("storage_path = \"/tmp/x\"\nttl_receipts = 60").unwrap();
		assert!(FileStorageSchema.validate(&config).is_ok());
	}
}
