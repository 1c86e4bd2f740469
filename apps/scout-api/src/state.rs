use std::sync::Arc;

use scout_service::ScoutService;
use scout_storage::CacheStore;

#[derive(Clone)]
pub struct AppState {
	pub service: Arc<ScoutService>,
}
impl AppState {
	pub async fn new(config: scout_config::Config) -> color_eyre::Result<Self> {
		let store = CacheStore::from_config(&config.storage).await?;
		let service = ScoutService::new(config, store)?;

		Ok(Self::from_service(service))
	}

	pub fn from_service(service: ScoutService) -> Self {
		Self { service: Arc::new(service) }
	}
}
