use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::{
	rationale,
	scoring::{self, ScoreResult},
	trial::{Coordinates, ScorableTrial},
};

#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreSource {
	#[default]
	Heuristic,
	Oracle,
}

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct RankedMatch {
	pub trial: ScorableTrial,
	pub result: ScoreResult,
	pub distance_miles: Option<f64>,
	pub within_radius: Option<bool>,
	pub score_source: ScoreSource,
}
impl RankedMatch {
	pub fn new(
		trial: ScorableTrial,
		result: ScoreResult,
		origin: Option<Coordinates>,
		radius_miles: Option<f64>,
	) -> Self {
		let distance_miles = origin.and_then(|origin| trial.nearest_site_miles(origin));
		let within_radius = distance_miles.zip(radius_miles).map(|(distance, radius)| distance <= radius);

		Self { trial, result, distance_miles, within_radius, score_source: ScoreSource::Heuristic }
	}

	pub fn score(&self) -> u8 {
		self.result.score
	}

	/// Replaces the heuristic score with an oracle verdict. The breakdown is kept for reference.
	pub fn apply_oracle_score(&mut self, score: f64, rationale: Option<&str>) {
		self.result.score = scoring::clamp_score(score);
		self.score_source = ScoreSource::Oracle;

		if let Some(text) = rationale.map(str::trim).filter(|text| !text.is_empty()) {
			self.result.rationale =
				Some(rationale::truncate(text, rationale::MAX_RATIONALE_GRAPHEMES));
		}
	}
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
pub struct RadiusSplit {
	pub within: Vec<RankedMatch>,
	pub outside_radius: Vec<RankedMatch>,
}

/// Score descending, then known distance ascending with unknown distance last, then identifier.
pub fn compare(left: &RankedMatch, right: &RankedMatch) -> Ordering {
	right
		.score()
		.cmp(&left.score())
		.then_with(|| match (left.distance_miles, right.distance_miles) {
			(Some(a), Some(b)) => a.total_cmp(&b),
			(Some(_), None) => Ordering::Less,
			(None, Some(_)) => Ordering::Greater,
			(None, None) => Ordering::Equal,
		})
		.then_with(|| left.trial.id.cmp(&right.trial.id))
}

pub fn sort_matches(matches: &mut [RankedMatch]) {
	matches.sort_by(compare);
}

/// Moves matches known to lie beyond the radius aside. Unknown distances stay in the main list.
pub fn split_by_radius(matches: Vec<RankedMatch>) -> RadiusSplit {
	let (outside_radius, within) =
		matches.into_iter().partition(|entry| entry.within_radius == Some(false));

	RadiusSplit { within, outside_radius }
}
