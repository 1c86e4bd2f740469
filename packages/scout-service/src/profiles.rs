use scout_domain::profile::RawProfile;
use scout_storage::CacheStore;

use crate::{
	BoxFuture, Caches, ProfileStore, Result,
	cache::PROFILE_NAMESPACE,
};

/// Profile store backed by the cache store, one JSON document per subject.
pub struct StoredProfiles {
	caches: Caches,
}
impl StoredProfiles {
	pub fn new(store: CacheStore) -> Self {
		Self { caches: Caches::new(store) }
	}
}
impl ProfileStore for StoredProfiles {
	fn current_profile<'a>(&'a self, subject: &'a str) -> BoxFuture<'a, Result<Option<RawProfile>>> {
		Box::pin(async move { self.caches.get_json(PROFILE_NAMESPACE, subject, "profile").await })
	}

	fn save_profile<'a>(
		&'a self,
		subject: &'a str,
		profile: &'a RawProfile,
	) -> BoxFuture<'a, Result<()>> {
		Box::pin(async move { self.caches.put_json(PROFILE_NAMESPACE, subject, profile).await })
	}
}
