//! Typed views over the persisted cache store.

use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::Value;
use time::{Duration, OffsetDateTime};

use scout_domain::{geo::GeoPoint, profile::ProfileFingerprint};
use scout_storage::CacheStore;

use crate::{Error, Result};

pub const GEOCODE_NAMESPACE: &str = "geocode";
pub const AI_SCORE_NAMESPACE: &str = "ai_score";
pub const WEBHOOK_HEALTH_NAMESPACE: &str = "webhook_health";
pub const PROFILE_NAMESPACE: &str = "profile";

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct AiScoreEntry {
	pub score: u8,
	pub rationale: Option<String>,
	#[serde(with = "crate::time_serde")]
	pub scored_at: OffsetDateTime,
}
impl AiScoreEntry {
	pub fn is_fresh(&self, now: OffsetDateTime, ttl_days: i64) -> bool {
		now - self.scored_at < Duration::days(ttl_days)
	}
}

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct WebhookHealth {
	pub healthy: bool,
	#[serde(with = "crate::time_serde")]
	pub checked_at: OffsetDateTime,
}
impl WebhookHealth {
	pub fn suppresses(&self, now: OffsetDateTime, suppress_minutes: i64) -> bool {
		!self.healthy && now - self.checked_at < Duration::minutes(suppress_minutes)
	}
}

/// Cache handle shared by the resolver, the matcher and the overlay. Clones share the store.
#[derive(Clone, Debug)]
pub struct Caches {
	store: CacheStore,
}
impl Caches {
	pub fn new(store: CacheStore) -> Self {
		Self { store }
	}

	pub fn store(&self) -> &CacheStore {
		&self.store
	}

	pub async fn geocode(&self, key: &str) -> Result<Option<GeoPoint>> {
		self.get_json(GEOCODE_NAMESPACE, key, "geocode").await
	}

	pub async fn put_geocode(&self, key: &str, point: &GeoPoint) -> Result<()> {
		self.put_json(GEOCODE_NAMESPACE, key, point).await
	}

	/// Returns the cached oracle score only while it is younger than `ttl_days`. Stale entries stay
	/// in the store until overwritten.
	pub async fn fresh_ai_score(
		&self,
		fingerprint: &ProfileFingerprint,
		trial_id: &str,
		ttl_days: i64,
		now: OffsetDateTime,
	) -> Result<Option<AiScoreEntry>> {
		let entry: Option<AiScoreEntry> =
			self.get_json(AI_SCORE_NAMESPACE, &ai_score_key(fingerprint, trial_id), "ai score").await?;

		Ok(entry.filter(|entry| entry.is_fresh(now, ttl_days)))
	}

	pub async fn put_ai_score(
		&self,
		fingerprint: &ProfileFingerprint,
		trial_id: &str,
		entry: &AiScoreEntry,
	) -> Result<()> {
		self.put_json(AI_SCORE_NAMESPACE, &ai_score_key(fingerprint, trial_id), entry).await
	}

	pub async fn webhook_suppressed(
		&self,
		url: &str,
		suppress_minutes: i64,
		now: OffsetDateTime,
	) -> Result<bool> {
		let health: Option<WebhookHealth> =
			self.get_json(WEBHOOK_HEALTH_NAMESPACE, url, "webhook health").await?;

		Ok(health.is_some_and(|health| health.suppresses(now, suppress_minutes)))
	}

	pub async fn mark_webhook(&self, url: &str, healthy: bool, now: OffsetDateTime) -> Result<()> {
		self.put_json(WEBHOOK_HEALTH_NAMESPACE, url, &WebhookHealth { healthy, checked_at: now })
			.await
	}

	pub(crate) async fn get_json<T>(&self, namespace: &str, key: &str, label: &str) -> Result<Option<T>>
	where
		T: DeserializeOwned,
	{
		let Some(cached) = self.store.get(namespace, key).await? else {
			return Ok(None);
		};

		decode_json(cached.value, label).map(Some)
	}

	pub(crate) async fn put_json<T>(&self, namespace: &str, key: &str, value: &T) -> Result<()>
	where
		T: Serialize,
	{
		let value = serde_json::to_value(value).map_err(|err| Error::Storage {
			message: format!("Failed to encode {namespace} cache value: {err}"),
		})?;

		Ok(self.store.put(namespace, key, &value).await?)
	}
}

pub fn ai_score_key(fingerprint: &ProfileFingerprint, trial_id: &str) -> String {
	format!("{fingerprint}:{trial_id}")
}

pub fn decode_json<T>(value: Value, label: &str) -> Result<T>
where
	T: DeserializeOwned,
{
	serde_json::from_value(value)
		.map_err(|err| Error::Storage { message: format!("Invalid {label} value: {err}") })
}
