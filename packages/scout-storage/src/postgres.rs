use serde_json::Value;
use sqlx::{PgPool, postgres::PgPoolOptions, types::Json};
use time::OffsetDateTime;

use crate::{CachedValue, Result};

const SCHEMA_SQL: &str = include_str!("../sql/init.sql");
const SCHEMA_LOCK_ID: i64 = 5_210_118;

#[derive(Clone, Debug)]
pub struct PgStore {
	pub pool: PgPool,
}
impl PgStore {
	pub async fn connect(cfg: &scout_config::Postgres) -> Result<Self> {
		let pool =
			PgPoolOptions::new().max_connections(cfg.pool_max_conns).connect(&cfg.dsn).await?;

		Ok(Self { pool })
	}

	pub async fn ensure_schema(&self) -> Result<()> {
		// The advisory lock is transaction scoped so concurrent starts serialize on one connection.
		let mut tx = self.pool.begin().await?;

		sqlx::query("SELECT pg_advisory_xact_lock($1)").bind(SCHEMA_LOCK_ID).execute(&mut *tx).await?;

		for statement in SCHEMA_SQL.split(';') {
			let trimmed = statement.trim();

			if trimmed.is_empty() {
				continue;
			}

			sqlx::query(trimmed).execute(&mut *tx).await?;
		}

		tx.commit().await?;

		tracing::debug!("Cache schema ensured.");

		Ok(())
	}

	pub async fn get(&self, namespace: &str, key: &str) -> Result<Option<CachedValue>> {
		let row: Option<(Json<Value>, OffsetDateTime)> = sqlx::query_as(
			"\
SELECT value, updated_at
FROM cache_entries
WHERE namespace = $1 AND key = $2",
		)
		.bind(namespace)
		.bind(key)
		.fetch_optional(&self.pool)
		.await?;

		Ok(row.map(|(Json(value), updated_at)| CachedValue { value, updated_at }))
	}

	pub async fn put(&self, namespace: &str, key: &str, value: &Value) -> Result<()> {
		sqlx::query(
			"\
INSERT INTO cache_entries (namespace, key, value, updated_at)
VALUES ($1, $2, $3, now())
ON CONFLICT (namespace, key)
DO UPDATE SET value = EXCLUDED.value, updated_at = EXCLUDED.updated_at",
		)
		.bind(namespace)
		.bind(key)
		.bind(Json(value))
		.execute(&self.pool)
		.await?;

		Ok(())
	}

	pub async fn delete(&self, namespace: &str, key: &str) -> Result<bool> {
		let result = sqlx::query("DELETE FROM cache_entries WHERE namespace = $1 AND key = $2")
			.bind(namespace)
			.bind(key)
			.execute(&self.pool)
			.await?;

		Ok(result.rows_affected() > 0)
	}
}
