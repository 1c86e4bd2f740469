use std::{
	collections::HashMap,
	sync::{Arc, Mutex},
};

use serde_json::Value;
use time::OffsetDateTime;

use crate::CachedValue;

/// Process-local backend. Clones share the same map.
#[derive(Clone, Debug, Default)]
pub struct MemoryStore {
	entries: Arc<Mutex<HashMap<(String, String), CachedValue>>>,
}
impl MemoryStore {
	pub fn get(&self, namespace: &str, key: &str) -> Option<CachedValue> {
		let entries = self.entries.lock().unwrap_or_else(|err| err.into_inner());

		entries.get(&(namespace.to_string(), key.to_string())).cloned()
	}

	pub fn put(&self, namespace: &str, key: &str, value: Value, updated_at: OffsetDateTime) {
		let mut entries = self.entries.lock().unwrap_or_else(|err| err.into_inner());

		entries.insert((namespace.to_string(), key.to_string()), CachedValue { value, updated_at });
	}

	pub fn delete(&self, namespace: &str, key: &str) -> bool {
		let mut entries = self.entries.lock().unwrap_or_else(|err| err.into_inner());

		entries.remove(&(namespace.to_string(), key.to_string())).is_some()
	}

	pub fn len(&self) -> usize {
		self.entries.lock().unwrap_or_else(|err| err.into_inner()).len()
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}
}
