//! Progressive registry search: geography first, then location text, then wider nets.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use tokio::task::JoinSet;

use scout_domain::{
	geo::GeoPoint,
	query::QueryPlan,
	trial::{RegistryTrial, TrialStatus},
};
use scout_providers::registry::{GeoFilter, RegistryQuery};

use crate::ScoutService;

#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
	GeoRecruiting,
	GeoAnyStatus,
	LocationTextRecruiting,
	PrimaryConditionFallback,
	LocationTextAnyStatus,
	UnconstrainedNearby,
}
impl Strategy {
	pub fn as_str(self) -> &'static str {
		match self {
			Self::GeoRecruiting => "geo_recruiting",
			Self::GeoAnyStatus => "geo_any_status",
			Self::LocationTextRecruiting => "location_text_recruiting",
			Self::PrimaryConditionFallback => "primary_condition_fallback",
			Self::LocationTextAnyStatus => "location_text_any_status",
			Self::UnconstrainedNearby => "unconstrained_nearby",
		}
	}

	pub fn needs_coordinates(self) -> bool {
		matches!(self, Self::GeoRecruiting | Self::GeoAnyStatus | Self::PrimaryConditionFallback)
	}
}

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct StrategyAttempt {
	pub strategy: Strategy,
	pub radius_miles: Option<f64>,
	pub found: usize,
}

#[derive(Clone, Debug, Default)]
pub struct FallbackOutcome {
	pub trials: Vec<RegistryTrial>,
	/// `None` when every strategy came back short.
	pub strategy: Option<Strategy>,
	pub attempts: Vec<StrategyAttempt>,
	pub radius_miles: Option<f64>,
}

#[derive(Clone, Copy, Debug)]
pub struct FallbackInput<'a> {
	pub plan: &'a QueryPlan,
	pub origin: Option<&'a GeoPoint>,
	pub location_text: Option<&'a str>,
	pub radius_miles: f64,
}

impl ScoutService {
	pub async fn find_candidates(&self, input: &FallbackInput<'_>) -> FallbackOutcome {
		let mut attempts = Vec::new();
		let radii = radius_sequence(input.radius_miles, &self.cfg.matching.radius_escalation_miles);
		let widest = radii.last().copied().unwrap_or(input.radius_miles);
		let strict = input.plan.effective.strict();
		let loose = input.plan.effective.loose();
		let location_text =
			input.location_text.map(str::trim).filter(|text| !text.is_empty()).map(str::to_string);
		let mut geo_found = 0;

		if let Some(origin) = input.origin {
			for radius in &radii {
				let query = RegistryQuery {
					condition: strict.clone(),
					geo: Some(geo_filter(origin, *radius)),
					..Default::default()
				};
				let trials = self.search_recruiting(query).await;

				geo_found += trials.len();

				if let Some(outcome) =
					self.settle(Strategy::GeoRecruiting, Some(*radius), trials, &mut attempts)
				{
					return outcome;
				}
			}

			let query = RegistryQuery {
				condition: strict.clone(),
				geo: Some(geo_filter(origin, widest)),
				..Default::default()
			};
			let trials = self.search_once(query).await;

			geo_found += trials.len();

			if let Some(outcome) =
				self.settle(Strategy::GeoAnyStatus, Some(widest), trials, &mut attempts)
			{
				return outcome;
			}
		}

		if let Some(text) = location_text.as_ref() {
			let query = RegistryQuery {
				condition: strict.clone(),
				location_text: Some(text.clone()),
				..Default::default()
			};
			let trials = self.search_recruiting(query).await;

			if let Some(outcome) =
				self.settle(Strategy::LocationTextRecruiting, None, trials, &mut attempts)
			{
				return outcome;
			}
		}

		if let Some(origin) = input.origin
			&& input.plan.has_distinct_primary()
			&& geo_found == 0
		{
			let candidates = [input.plan.primary.strict(), input.plan.primary.loose()];
			let mut seen = Vec::new();

			for condition in candidates.into_iter().flatten() {
				if seen.contains(&condition) {
					continue;
				}

				seen.push(condition.clone());

				let query = RegistryQuery {
					condition: Some(condition),
					geo: Some(geo_filter(origin, widest)),
					..Default::default()
				};
				let trials = self.search_recruiting(query).await;

				if let Some(outcome) = self.settle(
					Strategy::PrimaryConditionFallback,
					Some(widest),
					trials,
					&mut attempts,
				) {
					return outcome;
				}
			}
		}

		if let Some(text) = location_text.as_ref() {
			let query = RegistryQuery {
				condition: loose.clone(),
				location_text: Some(text.clone()),
				..Default::default()
			};
			let trials = self.search_once(query).await;

			if let Some(outcome) =
				self.settle(Strategy::LocationTextAnyStatus, None, trials, &mut attempts)
			{
				return outcome;
			}
		}

		let (geo, radius_miles) = match input.origin {
			Some(origin) => (Some(geo_filter(origin, widest)), Some(widest)),
			None => (None, None),
		};
		let query = RegistryQuery {
			geo,
			location_text: if geo.is_none() { location_text } else { None },
			..Default::default()
		};
		let trials = self.search_recruiting(query).await;

		if let Some(outcome) =
			self.settle(Strategy::UnconstrainedNearby, radius_miles, trials, &mut attempts)
		{
			return outcome;
		}

		tracing::info!(attempts = attempts.len(), "Registry search exhausted every strategy.");

		FallbackOutcome { trials: Vec::new(), strategy: None, attempts, radius_miles: None }
	}

	fn settle(
		&self,
		strategy: Strategy,
		radius_miles: Option<f64>,
		trials: Vec<RegistryTrial>,
		attempts: &mut Vec<StrategyAttempt>,
	) -> Option<FallbackOutcome> {
		let found = trials.len();

		tracing::debug!(strategy = strategy.as_str(), ?radius_miles, found, "Registry strategy tried.");

		attempts.push(StrategyAttempt { strategy, radius_miles, found });

		if found == 0 || found < self.cfg.matching.min_results as usize {
			return None;
		}

		Some(FallbackOutcome {
			trials,
			strategy: Some(strategy),
			attempts: std::mem::take(attempts),
			radius_miles,
		})
	}

	/// One query per recruiting-like status, issued together and merged in status order.
	async fn search_recruiting(&self, base: RegistryQuery) -> Vec<RegistryTrial> {
		let mut set = JoinSet::new();

		for (index, status) in TrialStatus::RECRUITING_LIKE.into_iter().enumerate() {
			let registry = self.providers.registry.clone();
			let cfg = self.cfg.clone();
			let query = RegistryQuery { statuses: vec![status], ..base.clone() };

			set.spawn(async move {
				let result = registry.search(&cfg.providers.registry, &query).await;

				(index, result)
			});
		}

		let mut batches = Vec::with_capacity(TrialStatus::RECRUITING_LIKE.len());

		while let Some(joined) = set.join_next().await {
			match joined {
				Ok((index, Ok(trials))) => batches.push((index, trials)),
				Ok((index, Err(err))) => {
					tracing::warn!(error = %err, status_index = index, "Registry search failed.");
				},
				Err(err) => {
					tracing::warn!(error = %err, "Registry search task failed.");
				},
			}
		}

		batches.sort_by_key(|(index, _)| *index);

		merge_recruiting(batches.into_iter().flat_map(|(_, trials)| trials))
	}

	async fn search_once(&self, query: RegistryQuery) -> Vec<RegistryTrial> {
		match self.providers.registry.search(&self.cfg.providers.registry, &query).await {
			Ok(trials) => merge_recruiting(trials),
			Err(err) => {
				tracing::warn!(error = %err, "Registry search failed.");

				Vec::new()
			},
		}
	}
}

/// The requested radius followed by every configured escalation step beyond it.
pub fn radius_sequence(start: f64, escalation: &[f64]) -> Vec<f64> {
	let mut radii = vec![start];

	for radius in escalation {
		if let Some(last) = radii.last()
			&& *radius > *last
		{
			radii.push(*radius);
		}
	}

	radii
}

/// De-duplicates by identifier, keeping the first occurrence, and drops trials that are not
/// recruiting.
pub fn merge_recruiting(trials: impl IntoIterator<Item = RegistryTrial>) -> Vec<RegistryTrial> {
	let mut seen = HashSet::new();

	trials
		.into_iter()
		.filter(|trial| trial.status.is_recruiting_like())
		.filter(|trial| seen.insert(trial.nct_id.clone()))
		.collect()
}

fn geo_filter(origin: &GeoPoint, radius_miles: f64) -> GeoFilter {
	GeoFilter { lat: origin.lat, lng: origin.lng, radius_miles }
}

#[cfg(test)]
mod tests {
	use super::*;

	fn trial(id: &str, status: TrialStatus) -> RegistryTrial {
		RegistryTrial {
			nct_id: id.to_string(),
			title: id.to_string(),
			status,
			phases: Vec::new(),
			conditions: Vec::new(),
			sponsor: None,
			locations: Vec::new(),
		}
	}

	#[test]
	fn radius_sequence_skips_smaller_steps() {
		let escalation = [200.0, 300.0, 500.0, 1_000.0];

		assert_eq!(radius_sequence(50.0, &escalation), vec![50.0, 200.0, 300.0, 500.0, 1_000.0]);
		assert_eq!(radius_sequence(250.0, &escalation), vec![250.0, 300.0, 500.0, 1_000.0]);
		assert_eq!(radius_sequence(2_000.0, &escalation), vec![2_000.0]);
	}

	#[test]
	fn merge_keeps_first_occurrence_and_recruiting_only() {
		let merged = merge_recruiting([
			trial("NCT1", TrialStatus::Recruiting),
			trial("NCT2", TrialStatus::Completed),
			trial("NCT3", TrialStatus::EnrollingByInvitation),
			trial("NCT1", TrialStatus::EnrollingByInvitation),
		]);
		let ids: Vec<&str> = merged.iter().map(|trial| trial.nct_id.as_str()).collect();

		assert_eq!(ids, vec!["NCT1", "NCT3"]);
		assert_eq!(merged[0].status, TrialStatus::Recruiting);
	}
}
