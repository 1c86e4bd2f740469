use serde::{Deserialize, Serialize};

use crate::distance;

/// Registry vocabulary for overall recruitment status.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TrialStatus {
	Recruiting,
	EnrollingByInvitation,
	NotYetRecruiting,
	ActiveNotRecruiting,
	Completed,
	Suspended,
	Terminated,
	Withdrawn,
	#[serde(other)]
	Unknown,
}
impl TrialStatus {
	pub const RECRUITING_LIKE: [Self; 2] = [Self::Recruiting, Self::EnrollingByInvitation];

	/// Accepts both the registry form (`ENROLLING_BY_INVITATION`) and the display form
	/// ("Enrolling by invitation").
	pub fn parse(text: &str) -> Self {
		let key: String = text
			.trim()
			.chars()
			.map(|ch| if ch.is_ascii_alphanumeric() { ch.to_ascii_uppercase() } else { '_' })
			.collect();

		match key.as_str() {
			"RECRUITING" => Self::Recruiting,
			"ENROLLING_BY_INVITATION" => Self::EnrollingByInvitation,
			"NOT_YET_RECRUITING" => Self::NotYetRecruiting,
			"ACTIVE_NOT_RECRUITING" | "ACTIVE__NOT_RECRUITING" => Self::ActiveNotRecruiting,
			"COMPLETED" => Self::Completed,
			"SUSPENDED" => Self::Suspended,
			"TERMINATED" => Self::Terminated,
			"WITHDRAWN" => Self::Withdrawn,
			_ => Self::Unknown,
		}
	}

	pub fn as_api_value(self) -> &'static str {
		match self {
			Self::Recruiting => "RECRUITING",
			Self::EnrollingByInvitation => "ENROLLING_BY_INVITATION",
			Self::NotYetRecruiting => "NOT_YET_RECRUITING",
			Self::ActiveNotRecruiting => "ACTIVE_NOT_RECRUITING",
			Self::Completed => "COMPLETED",
			Self::Suspended => "SUSPENDED",
			Self::Terminated => "TERMINATED",
			Self::Withdrawn => "WITHDRAWN",
			Self::Unknown => "UNKNOWN",
		}
	}

	pub fn label(self) -> &'static str {
		match self {
			Self::Recruiting => "Recruiting",
			Self::EnrollingByInvitation => "Enrolling by invitation",
			Self::NotYetRecruiting => "Not yet recruiting",
			Self::ActiveNotRecruiting => "Active, not recruiting",
			Self::Completed => "Completed",
			Self::Suspended => "Suspended",
			Self::Terminated => "Terminated",
			Self::Withdrawn => "Withdrawn",
			Self::Unknown => "Unknown status",
		}
	}

	pub fn is_recruiting_like(self) -> bool {
		Self::RECRUITING_LIKE.contains(&self)
	}
}

#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GenderRestriction {
	#[default]
	All,
	Female,
	Male,
}
impl GenderRestriction {
	pub fn parse(text: &str) -> Self {
		match canonical_gender(text) {
			Some(Self::Female) => Self::Female,
			Some(Self::Male) => Self::Male,
			_ => Self::All,
		}
	}

	/// `None` when the patient's gender is unknown.
	pub fn accepts(self, gender: Option<&str>) -> Option<bool> {
		if self == Self::All {
			return Some(true);
		}

		let gender = gender.map(str::trim).filter(|gender| !gender.is_empty())?;

		Some(canonical_gender(gender) == Some(self))
	}
}

#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Serialize)]
pub struct Coordinates {
	pub lat: f64,
	pub lng: f64,
}

/// Curated entry of the static catalog.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct CatalogTrial {
	pub id: String,
	pub title: String,
	#[serde(default)]
	pub description: String,
	#[serde(default)]
	pub purpose: String,
	#[serde(default)]
	pub benefits: String,
	pub phase: Option<String>,
	pub min_age: Option<u32>,
	pub max_age: Option<u32>,
	#[serde(default)]
	pub gender: GenderRestriction,
	#[serde(default)]
	pub interventions: Vec<String>,
	#[serde(default)]
	pub criteria: Vec<String>,
	pub location: Option<String>,
	pub coordinates: Option<Coordinates>,
	/// Free-form catalog label such as "Now Recruiting" or "Active".
	pub status: String,
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
pub struct TrialLocation {
	pub facility: Option<String>,
	pub city: Option<String>,
	pub state: Option<String>,
	pub country: Option<String>,
	pub coordinates: Option<Coordinates>,
}
impl TrialLocation {
	pub fn label(&self) -> Option<String> {
		let parts: Vec<&str> = [&self.facility, &self.city, &self.state, &self.country]
			.into_iter()
			.filter_map(|part| part.as_deref().map(str::trim).filter(|part| !part.is_empty()))
			.collect();

		if parts.is_empty() { None } else { Some(parts.join(", ")) }
	}
}

/// Search hit from the external registry.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct RegistryTrial {
	pub nct_id: String,
	pub title: String,
	pub status: TrialStatus,
	#[serde(default)]
	pub phases: Vec<String>,
	#[serde(default)]
	pub conditions: Vec<String>,
	pub sponsor: Option<String>,
	#[serde(default)]
	pub locations: Vec<TrialLocation>,
}
impl RegistryTrial {
	pub fn site_labels(&self) -> Vec<String> {
		self.locations.iter().filter_map(TrialLocation::label).collect()
	}
}

/// Full record fetched for oracle prompts.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct TrialDetail {
	pub nct_id: String,
	pub title: String,
	pub summary: Option<String>,
	pub eligibility_criteria: Option<String>,
	pub minimum_age: Option<String>,
	pub maximum_age: Option<String>,
	pub sex: Option<String>,
	#[serde(default)]
	pub conditions: Vec<String>,
	#[serde(default)]
	pub interventions: Vec<String>,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum TrialRecord {
	Catalog(CatalogTrial),
	Registry(RegistryTrial),
}

/// Common view over both record kinds used for ranking and display.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct ScorableTrial {
	pub id: String,
	pub title: String,
	pub status: String,
	pub phase: Option<String>,
	pub location_label: Option<String>,
	#[serde(default)]
	pub sites: Vec<Coordinates>,
}
impl ScorableTrial {
	/// Miles to the nearest site with known coordinates.
	pub fn nearest_site_miles(&self, origin: Coordinates) -> Option<f64> {
		self.sites
			.iter()
			.map(|site| distance::haversine_miles(origin.lat, origin.lng, site.lat, site.lng))
			.min_by(f64::total_cmp)
	}
}
impl From<&CatalogTrial> for ScorableTrial {
	fn from(trial: &CatalogTrial) -> Self {
		Self {
			id: trial.id.clone(),
			title: trial.title.clone(),
			status: trial.status.clone(),
			phase: trial.phase.clone(),
			location_label: trial.location.clone(),
			sites: trial.coordinates.into_iter().collect(),
		}
	}
}
impl From<&RegistryTrial> for ScorableTrial {
	fn from(trial: &RegistryTrial) -> Self {
		Self {
			id: trial.nct_id.clone(),
			title: trial.title.clone(),
			status: trial.status.label().to_string(),
			phase: if trial.phases.is_empty() { None } else { Some(trial.phases.join(", ")) },
			location_label: trial.site_labels().into_iter().next(),
			sites: trial.locations.iter().filter_map(|location| location.coordinates).collect(),
		}
	}
}
impl From<&TrialRecord> for ScorableTrial {
	fn from(record: &TrialRecord) -> Self {
		match record {
			TrialRecord::Catalog(trial) => trial.into(),
			TrialRecord::Registry(trial) => trial.into(),
		}
	}
}

fn canonical_gender(text: &str) -> Option<GenderRestriction> {
	match text.trim().to_lowercase().as_str() {
		"f" | "female" | "woman" | "women" => Some(GenderRestriction::Female),
		"m" | "male" | "man" | "men" => Some(GenderRestriction::Male),
		_ => None,
	}
}
