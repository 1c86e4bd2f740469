use scout_domain::geo::{self, GeoPoint};

use crate::{Result, ScoutService};

impl ScoutService {
	/// Resolves free text or a ZIP code to coordinates. Failures degrade to `None`, and cache
	/// failures never block a lookup.
	pub async fn resolve_location(&self, text: &str) -> Option<GeoPoint> {
		if text.trim().is_empty() {
			return None;
		}

		let key = geo::cache_key(text);

		match self.caches.geocode(&key).await {
			Ok(Some(point)) => return Some(point),
			Ok(None) => {},
			Err(err) => {
				tracing::warn!(error = %err, location = text, "Geocode cache read failed.");
			},
		}

		let point = match self.lookup_location(text).await {
			Ok(point) => point?,
			Err(err) => {
				tracing::warn!(error = %err, location = text, "Location resolution failed.");

				return None;
			},
		};

		if let Err(err) = self.caches.put_geocode(&key, &point).await {
			tracing::warn!(error = %err, location = text, "Geocode cache write failed.");
		}

		Some(point)
	}

	async fn lookup_location(&self, text: &str) -> Result<Option<GeoPoint>> {
		let normalized = geo::normalize_country_alias(text);

		let Some(zip) = geo::postal_code(&normalized) else {
			return self.resolve_free_text(&normalized, false).await;
		};

		match self.resolve_postal(zip).await {
			Some(point) => Ok(Some(point)),
			None => self.resolve_free_text(&normalized, true).await,
		}
	}

	async fn resolve_postal(&self, zip: &str) -> Option<GeoPoint> {
		let cfg = &self.cfg.providers.postal;

		match self.providers.geocoder.lookup_postal(cfg, zip).await {
			Ok(Some(place)) => {
				let accepted = geo::accept_postal(zip, &place);

				if accepted.is_none() {
					tracing::debug!(zip, lat = place.lat, lng = place.lng, "Postal answer rejected.");
				}

				accepted
			},
			Ok(None) => None,
			Err(err) => {
				tracing::warn!(error = %err, zip, "Postal lookup failed.");

				None
			},
		}
	}

	/// `postal_input` restricts the answer to continental bounds, the same rule postal answers
	/// follow.
	async fn resolve_free_text(&self, text: &str, postal_input: bool) -> Result<Option<GeoPoint>> {
		let cfg = &self.cfg.providers.geocoder;
		let candidates = self.providers.geocoder.search(cfg, text, cfg.candidate_limit).await?;
		let selected = if postal_input {
			geo::select_continental_candidate(&candidates)
		} else {
			geo::select_candidate(&candidates, geo::has_us_hint(text))
		};
		let point = selected.map(|candidate| GeoPoint {
			lat: candidate.lat,
			lng: candidate.lng,
			label: candidate.display_name.clone(),
		});

		Ok(point)
	}
}
