pub mod cache;
pub mod fallback;
pub mod geocode;
pub mod matching;
pub mod profiles;
pub mod rescoring;
pub mod time_serde;

mod error;

pub use cache::Caches;
pub use error::{Error, Result};
pub use fallback::{FallbackInput, FallbackOutcome, Strategy, StrategyAttempt};
pub use matching::{MatchReport, MatchRequest, MatchSource};
pub use profiles::StoredProfiles;
pub use rescoring::{RescoreEvent, RescoreHandle, RescoreSummary, RescoringOverlay};

use std::{future::Future, pin::Pin, sync::Arc};

use scout_config::{
	Config, GeocoderProviderConfig, LlmProviderConfig, OracleConfig, PostalProviderConfig,
	RegistryProviderConfig,
};
use scout_domain::{
	catalog::Catalog,
	geo::{GeoCandidate, PostalPlace},
	profile::RawProfile,
	query::SynonymTable,
	trial::{RegistryTrial, TrialDetail},
};
use scout_providers::{
	geocoder,
	oracle::{self, OracleRequest, OracleVerdict},
	postal,
	registry::{self, RegistryQuery},
};
use scout_storage::CacheStore;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

pub trait ProfileStore
where
	Self: Send + Sync,
{
	fn current_profile<'a>(&'a self, subject: &'a str) -> BoxFuture<'a, Result<Option<RawProfile>>>;

	fn save_profile<'a>(
		&'a self,
		subject: &'a str,
		profile: &'a RawProfile,
	) -> BoxFuture<'a, Result<()>>;
}

pub trait TrialRegistry
where
	Self: Send + Sync,
{
	fn search<'a>(
		&'a self,
		cfg: &'a RegistryProviderConfig,
		query: &'a RegistryQuery,
	) -> BoxFuture<'a, scout_providers::Result<Vec<RegistryTrial>>>;

	fn get_by_identifier<'a>(
		&'a self,
		cfg: &'a RegistryProviderConfig,
		nct_id: &'a str,
	) -> BoxFuture<'a, scout_providers::Result<Option<TrialDetail>>>;
}

pub trait Geocoder
where
	Self: Send + Sync,
{
	fn lookup_postal<'a>(
		&'a self,
		cfg: &'a PostalProviderConfig,
		zip: &'a str,
	) -> BoxFuture<'a, scout_providers::Result<Option<PostalPlace>>>;

	fn search<'a>(
		&'a self,
		cfg: &'a GeocoderProviderConfig,
		text: &'a str,
		limit: u32,
	) -> BoxFuture<'a, scout_providers::Result<Vec<GeoCandidate>>>;
}

pub trait ScoringOracle
where
	Self: Send + Sync,
{
	fn score_via_webhook<'a>(
		&'a self,
		cfg: &'a OracleConfig,
		url: &'a str,
		request: &'a OracleRequest,
	) -> BoxFuture<'a, scout_providers::Result<OracleVerdict>>;

	fn score_via_model<'a>(
		&'a self,
		cfg: &'a LlmProviderConfig,
		request: &'a OracleRequest,
	) -> BoxFuture<'a, scout_providers::Result<OracleVerdict>>;
}

#[derive(Clone)]
pub struct Providers {
	pub registry: Arc<dyn TrialRegistry>,
	pub geocoder: Arc<dyn Geocoder>,
	pub oracle: Arc<dyn ScoringOracle>,
}
impl Providers {
	pub fn new(
		registry: Arc<dyn TrialRegistry>,
		geocoder: Arc<dyn Geocoder>,
		oracle: Arc<dyn ScoringOracle>,
	) -> Self {
		Self { registry, geocoder, oracle }
	}
}
impl Default for Providers {
	fn default() -> Self {
		let provider = Arc::new(DefaultProviders);

		Self { registry: provider.clone(), geocoder: provider.clone(), oracle: provider }
	}
}

pub struct ScoutService {
	pub cfg: Arc<Config>,
	pub providers: Providers,
	pub caches: Caches,
	pub profiles: Arc<dyn ProfileStore>,
	pub catalog: Catalog,
	pub synonyms: SynonymTable,
	pub overlay: RescoringOverlay,
}
impl ScoutService {
	pub fn new(cfg: Config, store: CacheStore) -> Result<Self> {
		let profiles = Arc::new(StoredProfiles::new(store.clone()));

		Self::with_providers(cfg, store, Providers::default(), profiles)
	}

	pub fn with_providers(
		cfg: Config,
		store: CacheStore,
		providers: Providers,
		profiles: Arc<dyn ProfileStore>,
	) -> Result<Self> {
		let cfg = Arc::new(cfg);
		let caches = Caches::new(store);
		let synonyms = SynonymTable::new(&cfg.matching.synonyms)?;
		let catalog = Catalog::embedded()?;
		let overlay = RescoringOverlay::new(cfg.clone(), providers.clone(), caches.clone());

		Ok(Self { cfg, providers, caches, profiles, catalog, synonyms, overlay })
	}
}

struct DefaultProviders;
impl TrialRegistry for DefaultProviders {
	fn search<'a>(
		&'a self,
		cfg: &'a RegistryProviderConfig,
		query: &'a RegistryQuery,
	) -> BoxFuture<'a, scout_providers::Result<Vec<RegistryTrial>>> {
		Box::pin(registry::search(cfg, query))
	}

	fn get_by_identifier<'a>(
		&'a self,
		cfg: &'a RegistryProviderConfig,
		nct_id: &'a str,
	) -> BoxFuture<'a, scout_providers::Result<Option<TrialDetail>>> {
		Box::pin(registry::get_by_identifier(cfg, nct_id))
	}
}
impl Geocoder for DefaultProviders {
	fn lookup_postal<'a>(
		&'a self,
		cfg: &'a PostalProviderConfig,
		zip: &'a str,
	) -> BoxFuture<'a, scout_providers::Result<Option<PostalPlace>>> {
		Box::pin(postal::lookup(cfg, zip))
	}

	fn search<'a>(
		&'a self,
		cfg: &'a GeocoderProviderConfig,
		text: &'a str,
		limit: u32,
	) -> BoxFuture<'a, scout_providers::Result<Vec<GeoCandidate>>> {
		Box::pin(geocoder::search(cfg, text, limit))
	}
}
impl ScoringOracle for DefaultProviders {
	fn score_via_webhook<'a>(
		&'a self,
		cfg: &'a OracleConfig,
		url: &'a str,
		request: &'a OracleRequest,
	) -> BoxFuture<'a, scout_providers::Result<OracleVerdict>> {
		Box::pin(oracle::score_via_webhook(cfg, url, request))
	}

	fn score_via_model<'a>(
		&'a self,
		cfg: &'a LlmProviderConfig,
		request: &'a OracleRequest,
	) -> BoxFuture<'a, scout_providers::Result<OracleVerdict>> {
		Box::pin(oracle::score_via_model(cfg, request))
	}
}
