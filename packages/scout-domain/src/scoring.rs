//! Heuristic compatibility scoring.
//!
//! Two policies coexist on purpose. The catalog policy weighs the condition at 40 points and adds
//! age and gender fit; the registry policy weighs the condition at 60 points and adds a location
//! component instead. Consumers pick the policy by the kind of record they score.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::{
	profile::NormalizedProfile,
	rationale::{self, RationaleParts},
	text,
	trial::{CatalogTrial, GenderRestriction, RegistryTrial, TrialRecord},
};

pub const MAX_SCORE: f64 = 100.0;

const CATALOG_STATUS_RECRUITING: f64 = 20.0;
const CATALOG_STATUS_ACTIVE: f64 = 12.0;
const CATALOG_STATUS_OTHER: f64 = 5.0;
const CATALOG_CONDITION_MAX: f64 = 40.0;

const AGE_INSIDE: f64 = 30.0;
const AGE_NEAR: f64 = 22.0;
const AGE_CLOSE: f64 = 15.0;
const AGE_UNKNOWN: f64 = 15.0;
const AGE_NEAR_YEARS: u32 = 2;
const AGE_CLOSE_YEARS: u32 = 5;

const GENDER_MATCH: f64 = 10.0;
const GENDER_UNKNOWN: f64 = 5.0;

const MEDICATION_STEP: f64 = 3.0;
const MEDICATION_CAP: f64 = 10.0;
const ALLERGY_STEP: f64 = -5.0;
const ALLERGY_FLOOR: f64 = -10.0;

const REGISTRY_STATUS_RECRUITING: f64 = 25.0;
const REGISTRY_STATUS_OTHER: f64 = 10.0;
const REGISTRY_CONDITION_MAX: f64 = 60.0;
const REGISTRY_LOCATION_MAX: f64 = 15.0;

const COMPLETENESS_MAX: f64 = 10.0;
const NOTES_WEIGHT: f64 = 0.5;

#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoringPolicy {
	Catalog,
	Registry,
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
pub struct ScoreBreakdown {
	pub status: f64,
	pub condition: f64,
	pub age: f64,
	pub gender: f64,
	pub medication: f64,
	pub allergy: f64,
	pub location: f64,
	pub completeness: f64,
}
impl ScoreBreakdown {
	pub fn total(&self) -> f64 {
		self.status
			+ self.condition
			+ self.age
			+ self.gender
			+ self.medication
			+ self.allergy
			+ self.location
			+ self.completeness
	}

	pub fn score(&self) -> u8 {
		clamp_score(self.total())
	}
}

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct ScoreResult {
	pub score: u8,
	pub policy: ScoringPolicy,
	pub breakdown: ScoreBreakdown,
	pub rationale: Option<String>,
}

pub fn score(profile: &NormalizedProfile, record: &TrialRecord) -> ScoreResult {
	match record {
		TrialRecord::Catalog(trial) => score_catalog(profile, trial),
		TrialRecord::Registry(trial) => score_registry(profile, trial),
	}
}

pub fn score_catalog(profile: &NormalizedProfile, trial: &CatalogTrial) -> ScoreResult {
	let corpus = text::token_set_of(
		[
			trial.title.as_str(),
			trial.description.as_str(),
			trial.purpose.as_str(),
			trial.benefits.as_str(),
			trial.location.as_deref().unwrap_or_default(),
		]
		.into_iter()
		.chain(trial.criteria.iter().map(String::as_str))
		.chain(trial.interventions.iter().map(String::as_str)),
	);
	let terms = ProfileTerms::from_profile(profile);
	let matched = terms.matched(&corpus);
	let medication_hits = terms.medications.iter().filter(|token| corpus.contains(*token)).count();
	let allergy_hits = terms.allergies.iter().filter(|token| corpus.contains(*token)).count();
	let breakdown = ScoreBreakdown {
		status: catalog_status_points(&trial.status),
		condition: matched.points(terms.condition.len(), CATALOG_CONDITION_MAX),
		age: age_fit(profile.age, trial.min_age, trial.max_age),
		gender: gender_fit(trial.gender, profile.gender.as_deref()),
		medication: (medication_hits as f64 * MEDICATION_STEP).min(MEDICATION_CAP),
		allergy: (allergy_hits as f64 * ALLERGY_STEP).max(ALLERGY_FLOOR),
		location: 0.0,
		completeness: completeness_bonus(profile.completeness_pct),
	};
	let rationale = rationale::compose(&RationaleParts {
		highlights: matched.highlights(),
		status: Some(&trial.status),
		site: trial.location.as_deref(),
		preference: profile.location_preference.as_deref(),
		radius_miles: profile.travel_radius_miles(),
	});

	ScoreResult { score: breakdown.score(), policy: ScoringPolicy::Catalog, breakdown, rationale }
}

pub fn score_registry(profile: &NormalizedProfile, trial: &RegistryTrial) -> ScoreResult {
	let corpus = text::token_set_of(
		std::iter::once(trial.title.as_str()).chain(trial.conditions.iter().map(String::as_str)),
	);
	let terms = ProfileTerms::from_profile(profile);
	let matched = terms.matched(&corpus);
	let site_labels = trial.site_labels();
	let site_tokens = text::token_set_of(site_labels.iter().map(String::as_str));
	let mut preference = text::token_set(profile.location_preference.as_deref().unwrap_or_default());

	preference.extend(terms.notes_all.iter().cloned());

	let found = preference.iter().filter(|token| site_tokens.contains(*token)).count();
	let location = if preference.is_empty() {
		0.0
	} else {
		REGISTRY_LOCATION_MAX * found as f64 / preference.len() as f64
	};
	let breakdown = ScoreBreakdown {
		status: if trial.status.is_recruiting_like() {
			REGISTRY_STATUS_RECRUITING
		} else {
			REGISTRY_STATUS_OTHER
		},
		condition: matched.points(terms.condition.len(), REGISTRY_CONDITION_MAX),
		location,
		completeness: completeness_bonus(profile.completeness_pct),
		..Default::default()
	};
	let rationale = rationale::compose(&RationaleParts {
		highlights: matched.highlights(),
		status: Some(trial.status.label()),
		site: site_labels.first().map(String::as_str),
		preference: profile.location_preference.as_deref(),
		radius_miles: profile.travel_radius_miles(),
	});

	ScoreResult { score: breakdown.score(), policy: ScoringPolicy::Registry, breakdown, rationale }
}

/// Step function around the trial's age range. Missing bounds are open.
pub fn age_fit(age: Option<u32>, min_age: Option<u32>, max_age: Option<u32>) -> f64 {
	let Some(age) = age else {
		return AGE_UNKNOWN;
	};
	let below = min_age.map(|min| min.saturating_sub(age)).unwrap_or(0);
	let above = max_age.map(|max| age.saturating_sub(max)).unwrap_or(0);

	match below.max(above) {
		0 => AGE_INSIDE,
		gap if gap <= AGE_NEAR_YEARS => AGE_NEAR,
		gap if gap <= AGE_CLOSE_YEARS => AGE_CLOSE,
		_ => 0.0,
	}
}

pub fn gender_fit(restriction: GenderRestriction, gender: Option<&str>) -> f64 {
	match restriction.accepts(gender) {
		Some(true) => GENDER_MATCH,
		Some(false) => 0.0,
		None => GENDER_UNKNOWN,
	}
}

pub fn completeness_bonus(completeness_pct: u8) -> f64 {
	COMPLETENESS_MAX * f64::from(completeness_pct.min(100)) / 100.0
}

pub fn clamp_score(total: f64) -> u8 {
	if total.is_nan() {
		return 0;
	}

	total.clamp(0.0, MAX_SCORE).round() as u8
}

fn catalog_status_points(status: &str) -> f64 {
	match status.trim().to_lowercase().as_str() {
		"now recruiting" => CATALOG_STATUS_RECRUITING,
		"active" => CATALOG_STATUS_ACTIVE,
		_ => CATALOG_STATUS_OTHER,
	}
}

struct ProfileTerms {
	condition: BTreeSet<String>,
	/// Notes tokens not already present in the condition.
	notes_only: BTreeSet<String>,
	notes_all: BTreeSet<String>,
	medications: BTreeSet<String>,
	allergies: BTreeSet<String>,
}
impl ProfileTerms {
	fn from_profile(profile: &NormalizedProfile) -> Self {
		let condition = text::token_set(profile.primary_condition.as_deref().unwrap_or_default());
		let notes_all = text::token_set(profile.additional_notes.as_deref().unwrap_or_default());
		let notes_only = notes_all.difference(&condition).cloned().collect();

		Self {
			condition,
			notes_only,
			notes_all,
			medications: text::token_set_of(profile.medications.iter().map(String::as_str)),
			allergies: text::token_set_of(profile.allergies.iter().map(String::as_str)),
		}
	}

	fn matched<'a>(&'a self, corpus: &BTreeSet<String>) -> ConditionMatch<'a> {
		ConditionMatch {
			condition: text::overlap(&self.condition, corpus),
			notes: text::overlap(&self.notes_only, corpus),
		}
	}
}

struct ConditionMatch<'a> {
	condition: Vec<&'a str>,
	notes: Vec<&'a str>,
}
impl<'a> ConditionMatch<'a> {
	fn points(&self, condition_tokens: usize, max: f64) -> f64 {
		if condition_tokens == 0 {
			return 0.0;
		}

		let matched = self.condition.len() as f64 + NOTES_WEIGHT * self.notes.len() as f64;

		(max * matched / condition_tokens as f64).min(max)
	}

	fn highlights(&self) -> Vec<&'a str> {
		self.condition.iter().chain(self.notes.iter()).copied().collect()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn age_fit_steps_at_documented_gaps() {
		assert_eq!(age_fit(Some(30), Some(18), Some(40)), 30.0);
		assert_eq!(age_fit(Some(42), Some(18), Some(40)), 22.0);
		assert_eq!(age_fit(Some(43), Some(18), Some(40)), 15.0);
		assert_eq!(age_fit(Some(45), Some(18), Some(40)), 15.0);
		assert_eq!(age_fit(Some(46), Some(18), Some(40)), 0.0);
		assert_eq!(age_fit(Some(16), Some(18), Some(40)), 22.0);
		assert_eq!(age_fit(None, Some(18), Some(40)), 15.0);
		assert_eq!(age_fit(Some(99), None, None), 30.0);
	}

	#[test]
	fn catalog_status_points_follow_labels() {
		assert_eq!(catalog_status_points("Now Recruiting"), 20.0);
		assert_eq!(catalog_status_points("active"), 12.0);
		assert_eq!(catalog_status_points("Completed"), 5.0);
	}

	#[test]
	fn clamp_score_bounds_total() {
		assert_eq!(clamp_score(-12.0), 0);
		assert_eq!(clamp_score(104.4), 100);
		assert_eq!(clamp_score(71.5), 72);
		assert_eq!(clamp_score(f64::NAN), 0);
	}
}
