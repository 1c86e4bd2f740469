use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use scout_domain::{
	geo::GeoPoint,
	profile::{self, NormalizedProfile, ProfileFingerprint, RawProfile},
	query,
	ranking::{self, RankedMatch},
	scoring,
	trial::{Coordinates, ScorableTrial},
};

use crate::{
	Error, Result, ScoutService,
	fallback::{FallbackInput, Strategy, StrategyAttempt},
};

const COACHING_MESSAGE: &str =
	"No trials matched within your travel radius. Try a wider radius or a broader condition name.";

#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchSource {
	#[default]
	Registry,
	Catalog,
}

#[derive(Clone, Debug, Deserialize)]
pub struct MatchRequest {
	/// Used to supersede earlier background rescoring for the same person.
	pub subject: Option<String>,
	pub profile: RawProfile,
	#[serde(default)]
	pub source: MatchSource,
	pub limit: Option<u32>,
}

#[derive(Clone, Debug, Serialize)]
pub struct MatchReport {
	pub fingerprint: ProfileFingerprint,
	pub source: MatchSource,
	pub origin: Option<GeoPoint>,
	pub radius_miles: f64,
	pub strategy: Option<Strategy>,
	pub attempts: Vec<StrategyAttempt>,
	pub matches: Vec<RankedMatch>,
	pub outside_radius: Vec<RankedMatch>,
	pub coaching: Option<String>,
	pub rescoring_started: bool,
}

impl ScoutService {
	pub async fn match_profile(&self, req: MatchRequest) -> Result<MatchReport> {
		let limit = req.limit.unwrap_or(self.cfg.matching.results_limit);

		if limit == 0 {
			return Err(Error::InvalidRequest { message: "limit must be greater than zero.".to_string() });
		}
		if let Some(subject) = req.subject.as_deref()
			&& subject.trim().is_empty()
		{
			return Err(Error::InvalidRequest { message: "subject must not be blank.".to_string() });
		}

		let (profile, fingerprint) = profile::normalize(&req.profile);
		let origin = match profile.location_preference.as_deref() {
			Some(text) => self.resolve_location(text).await,
			None => None,
		};
		let radius_miles =
			profile.travel_radius_miles().unwrap_or(self.cfg.matching.default_radius_miles);
		let (mut matches, strategy, attempts) = match req.source {
			MatchSource::Catalog => {
				(self.rank_catalog(&profile, origin.as_ref(), radius_miles), None, Vec::new())
			},
			MatchSource::Registry => self.rank_registry(&profile, origin.as_ref(), radius_miles).await,
		};

		self.apply_cached_scores(&fingerprint, &mut matches).await;

		let split = ranking::split_by_radius(matches);
		let mut within = split.within;
		let mut outside_radius = split.outside_radius;

		within.truncate(limit as usize);
		outside_radius.truncate(limit as usize);

		let coaching = within.is_empty().then(|| COACHING_MESSAGE.to_string());
		let mut rescoring_started = false;

		if req.source == MatchSource::Registry && self.cfg.rescoring.enabled && !within.is_empty() {
			let subject = req.subject.clone().unwrap_or_else(|| fingerprint.to_string());
			let (immediate, handle) = self.overlay.refine_top_k(
				&subject,
				within,
				self.cfg.rescoring.top_k as usize,
				&profile,
				&fingerprint,
			);

			within = immediate;
			rescoring_started = handle.is_active();
		}

		tracing::info!(
			fingerprint = %fingerprint,
			source = ?req.source,
			strategy = strategy.map(Strategy::as_str),
			matches = within.len(),
			outside_radius = outside_radius.len(),
			"Match report built."
		);

		Ok(MatchReport {
			fingerprint,
			source: req.source,
			origin,
			radius_miles,
			strategy,
			attempts,
			matches: within,
			outside_radius,
			coaching,
			rescoring_started,
		})
	}

	/// Top matches for the subject's stored profile.
	pub async fn dashboard(&self, subject: &str) -> Result<MatchReport> {
		let Some(profile) = self.profiles.current_profile(subject).await? else {
			return Err(Error::NotFound { message: format!("No profile stored for {subject:?}.") });
		};

		self.match_profile(MatchRequest {
			subject: Some(subject.to_string()),
			profile,
			source: MatchSource::Registry,
			limit: Some(self.cfg.matching.dashboard_limit),
		})
		.await
	}

	pub async fn save_profile(&self, subject: &str, raw: &RawProfile) -> Result<ProfileFingerprint> {
		if subject.trim().is_empty() {
			return Err(Error::InvalidRequest { message: "subject must not be blank.".to_string() });
		}

		self.profiles.save_profile(subject, raw).await?;

		let (_, fingerprint) = profile::normalize(raw);

		Ok(fingerprint)
	}

	/// Replaces heuristic scores with fresh cached oracle scores, then re-sorts.
	pub async fn apply_cached_scores(
		&self,
		fingerprint: &ProfileFingerprint,
		matches: &mut [RankedMatch],
	) {
		let ttl_days = self.cfg.rescoring.cache_ttl_days;
		let now = OffsetDateTime::now_utc();

		for entry in matches.iter_mut() {
			match self.caches.fresh_ai_score(fingerprint, &entry.trial.id, ttl_days, now).await {
				Ok(Some(cached)) =>
					entry.apply_oracle_score(f64::from(cached.score), cached.rationale.as_deref()),
				Ok(None) => {},
				Err(err) => {
					tracing::warn!(error = %err, trial_id = %entry.trial.id, "Oracle score cache read failed.");
				},
			}
		}

		ranking::sort_matches(matches);
	}

	fn rank_catalog(
		&self,
		profile: &NormalizedProfile,
		origin: Option<&GeoPoint>,
		radius_miles: f64,
	) -> Vec<RankedMatch> {
		self.catalog
			.trials()
			.iter()
			.map(|trial| {
				RankedMatch::new(
					ScorableTrial::from(trial),
					scoring::score_catalog(profile, trial),
					origin.map(coordinates),
					Some(radius_miles),
				)
			})
			.collect()
	}

	async fn rank_registry(
		&self,
		profile: &NormalizedProfile,
		origin: Option<&GeoPoint>,
		radius_miles: f64,
	) -> (Vec<RankedMatch>, Option<Strategy>, Vec<StrategyAttempt>) {
		let plan = query::build_plan(
			&self.synonyms,
			profile.primary_condition.as_deref(),
			profile.additional_notes.as_deref(),
		);
		let outcome = self
			.find_candidates(&FallbackInput {
				plan: &plan,
				origin,
				location_text: profile.location_preference.as_deref(),
				radius_miles,
			})
			.await;
		let matches = outcome
			.trials
			.iter()
			.map(|trial| {
				RankedMatch::new(
					ScorableTrial::from(trial),
					scoring::score_registry(profile, trial),
					origin.map(coordinates),
					Some(radius_miles),
				)
			})
			.collect();

		(matches, outcome.strategy, outcome.attempts)
	}
}

fn coordinates(point: &GeoPoint) -> Coordinates {
	Coordinates { lat: point.lat, lng: point.lng }
}
