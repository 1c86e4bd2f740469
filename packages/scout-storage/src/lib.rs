//! Persisted cache store: JSON values addressed by namespace and key.

pub mod memory;
pub mod postgres;

mod error;

pub use error::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;

use serde_json::Value;
use time::OffsetDateTime;

use crate::{memory::MemoryStore, postgres::PgStore};

#[derive(Clone, Debug, PartialEq)]
pub struct CachedValue {
	pub value: Value,
	pub updated_at: OffsetDateTime,
}

#[derive(Clone, Debug)]
pub enum CacheStore {
	Memory(MemoryStore),
	Postgres(PgStore),
}
impl CacheStore {
	pub fn memory() -> Self {
		Self::Memory(MemoryStore::default())
	}

	/// Builds the backend named by `storage.backend`, creating the schema for Postgres.
	pub async fn from_config(cfg: &scout_config::Storage) -> Result<Self> {
		match cfg.backend.as_str() {
			"memory" => Ok(Self::memory()),
			"postgres" => {
				let postgres = cfg.postgres.as_ref().ok_or_else(|| {
					Error::InvalidArgument("storage.postgres is required for postgres.".to_string())
				})?;
				let store = PgStore::connect(postgres).await?;

				store.ensure_schema().await?;

				Ok(Self::Postgres(store))
			},
			other => Err(Error::InvalidArgument(format!("Unknown storage backend {other:?}."))),
		}
	}

	pub async fn get(&self, namespace: &str, key: &str) -> Result<Option<CachedValue>> {
		validate(namespace, key)?;

		match self {
			Self::Memory(store) => Ok(store.get(namespace, key)),
			Self::Postgres(store) => store.get(namespace, key).await,
		}
	}

	pub async fn put(&self, namespace: &str, key: &str, value: &Value) -> Result<()> {
		validate(namespace, key)?;

		match self {
			Self::Memory(store) => {
				store.put(namespace, key, value.clone(), OffsetDateTime::now_utc());

				Ok(())
			},
			Self::Postgres(store) => store.put(namespace, key, value).await,
		}
	}

	pub async fn delete(&self, namespace: &str, key: &str) -> Result<bool> {
		validate(namespace, key)?;

		match self {
			Self::Memory(store) => Ok(store.delete(namespace, key)),
			Self::Postgres(store) => store.delete(namespace, key).await,
		}
	}
}

fn validate(namespace: &str, key: &str) -> Result<()> {
	if namespace.trim().is_empty() {
		return Err(Error::InvalidArgument("Cache namespace must be non-empty.".to_string()));
	}
	if key.is_empty() {
		return Err(Error::InvalidArgument("Cache key must be non-empty.".to_string()));
	}

	Ok(())
}
