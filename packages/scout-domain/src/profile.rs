use std::{
	collections::{BTreeMap, BTreeSet},
	fmt,
};

use serde::{Deserialize, Serialize};
use time::{Date, OffsetDateTime, macros::format_description};

use crate::distance::{self, Distance};

const FINGERPRINT_SCHEMA_VERSION: u32 = 1;
const MAX_PLAUSIBLE_AGE: i64 = 130;

/// Profile as the profile store hands it over. Every field is optional; anything missing or
/// unparseable is treated as unknown.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct RawProfile {
	pub age: Option<i64>,
	/// ISO `YYYY-MM-DD`.
	pub date_of_birth: Option<String>,
	pub gender: Option<String>,
	pub primary_condition: Option<String>,
	pub medications: Vec<NamedEntry>,
	pub allergies: Vec<NamedEntry>,
	pub additional_notes: Option<String>,
	pub location_preference: Option<String>,
	/// Free text such as "50mi" or "80km".
	pub travel_radius: Option<String>,
	pub clinical: ClinicalDetails,
	pub account: AccountSignals,
}

/// Medications and allergies arrive either as bare names or as records with a name field.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(untagged)]
pub enum NamedEntry {
	Name(String),
	Record { name: Option<String> },
}
impl NamedEntry {
	pub fn name(&self) -> Option<&str> {
		match self {
			Self::Name(name) => Some(name.as_str()),
			Self::Record { name } => name.as_deref(),
		}
	}
}
impl From<&str> for NamedEntry {
	fn from(value: &str) -> Self {
		Self::Name(value.to_string())
	}
}

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct ClinicalDetails {
	pub ecog: Option<String>,
	pub cancer_stage: Option<String>,
	pub biomarkers: Vec<String>,
	pub prior_therapies: Vec<String>,
	pub comorbidities: BTreeMap<String, bool>,
	pub infections: BTreeMap<String, bool>,
}

/// Account-setup signals behind the completeness bonus. Unrelated to medical content.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct AccountSignals {
	pub email_verified: bool,
	pub phone_verified: bool,
	pub display_name: Option<String>,
	pub contact_consent: bool,
	pub records_uploaded: bool,
	pub emergency_contact: bool,
}
impl AccountSignals {
	pub fn completeness_pct(&self) -> u8 {
		let signals = [
			self.email_verified,
			self.phone_verified,
			self.display_name.as_deref().map(|name| !name.trim().is_empty()).unwrap_or(false),
			self.contact_consent,
			self.records_uploaded,
			self.emergency_contact,
		];
		let satisfied = signals.iter().filter(|signal| **signal).count();

		((satisfied * 100) as f64 / signals.len() as f64).round() as u8
	}
}

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct NormalizedProfile {
	pub age: Option<u32>,
	pub gender: Option<String>,
	pub primary_condition: Option<String>,
	pub medications: BTreeSet<String>,
	pub allergies: BTreeSet<String>,
	pub additional_notes: Option<String>,
	pub location_preference: Option<String>,
	pub travel_radius: Option<Distance>,
	pub completeness_pct: u8,
}
impl NormalizedProfile {
	pub fn travel_radius_miles(&self) -> Option<f64> {
		self.travel_radius.map(Distance::miles)
	}
}

#[derive(Clone, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
#[serde(transparent)]
pub struct ProfileFingerprint(String);
impl ProfileFingerprint {
	pub fn as_str(&self) -> &str {
		&self.0
	}
}
impl fmt::Display for ProfileFingerprint {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.0)
	}
}
impl From<String> for ProfileFingerprint {
	fn from(value: String) -> Self {
		Self(value)
	}
}

#[derive(Serialize)]
struct CanonicalProfile<'a> {
	schema_version: u32,
	age: Option<u32>,
	gender: Option<String>,
	primary_condition: Option<String>,
	medications: &'a BTreeSet<String>,
	allergies: &'a BTreeSet<String>,
	additional_notes: Option<String>,
	location_preference: Option<String>,
	travel_radius_miles: Option<f64>,
	completeness_pct: u8,
}

pub fn normalize(raw: &RawProfile) -> (NormalizedProfile, ProfileFingerprint) {
	normalize_at(raw, OffsetDateTime::now_utc().date())
}

pub fn normalize_at(raw: &RawProfile, today: Date) -> (NormalizedProfile, ProfileFingerprint) {
	let profile = NormalizedProfile {
		age: resolve_age(raw, today),
		gender: clean(raw.gender.as_deref()).map(|gender| gender.to_lowercase()),
		primary_condition: clean(raw.primary_condition.as_deref()),
		medications: name_set(&raw.medications),
		allergies: name_set(&raw.allergies),
		additional_notes: compose_notes(raw),
		location_preference: clean(raw.location_preference.as_deref()),
		travel_radius: raw.travel_radius.as_deref().and_then(distance::parse_distance),
		completeness_pct: raw.account.completeness_pct(),
	};
	let fingerprint = fingerprint(&profile);

	(profile, fingerprint)
}

pub fn fingerprint(profile: &NormalizedProfile) -> ProfileFingerprint {
	let canonical = CanonicalProfile {
		schema_version: FINGERPRINT_SCHEMA_VERSION,
		age: profile.age,
		gender: canonical_text(profile.gender.as_deref()),
		primary_condition: canonical_text(profile.primary_condition.as_deref()),
		medications: &profile.medications,
		allergies: &profile.allergies,
		additional_notes: canonical_text(profile.additional_notes.as_deref()),
		location_preference: canonical_text(profile.location_preference.as_deref()),
		travel_radius_miles: profile.travel_radius_miles(),
		completeness_pct: profile.completeness_pct,
	};
	// Serializing a plain struct of strings, integers and sets cannot fail.
	let raw = serde_json::to_vec(&canonical).unwrap_or_default();

	ProfileFingerprint(blake3::hash(&raw).to_hex().to_string())
}

/// Whole years between `dob` and `today`, counting a birthday only once it has passed.
pub fn age_on(dob: Date, today: Date) -> Option<u32> {
	if dob > today {
		return None;
	}

	let mut years = today.year() - dob.year();

	if (today.month() as u8, today.day()) < (dob.month() as u8, dob.day()) {
		years -= 1;
	}

	u32::try_from(years).ok()
}

fn resolve_age(raw: &RawProfile, today: Date) -> Option<u32> {
	if let Some(age) = raw.age
		&& (0..=MAX_PLAUSIBLE_AGE).contains(&age)
	{
		return u32::try_from(age).ok();
	}

	let dob = raw.date_of_birth.as_deref().map(str::trim).filter(|value| !value.is_empty())?;
	let dob = Date::parse(dob, format_description!("[year]-[month]-[day]")).ok()?;

	age_on(dob, today)
}

fn compose_notes(raw: &RawProfile) -> Option<String> {
	let clinical = &raw.clinical;
	let mut parts = Vec::new();

	if let Some(ecog) = clean(clinical.ecog.as_deref()) {
		parts.push(format!("Performance status: ECOG {ecog}"));
	}
	if let Some(stage) = clean(clinical.cancer_stage.as_deref()) {
		parts.push(format!("Stage: {stage}"));
	}

	for (label, values) in
		[("Biomarkers", &clinical.biomarkers), ("Prior therapies", &clinical.prior_therapies)]
	{
		let values: Vec<String> = values.iter().filter_map(|value| clean(Some(value))).collect();

		if !values.is_empty() {
			parts.push(format!("{label}: {}", values.join(", ")));
		}
	}
	for (label, flags) in [("Comorbidities", &clinical.comorbidities), ("Infections", &clinical.infections)]
	{
		let set: Vec<String> = flags
			.iter()
			.filter(|(_, present)| **present)
			.map(|(name, _)| name.replace('_', " ").trim().to_string())
			.filter(|name| !name.is_empty())
			.collect();

		if !set.is_empty() {
			parts.push(format!("{label}: {}", set.join(", ")));
		}
	}

	if let Some(notes) = clean(raw.additional_notes.as_deref()) {
		parts.push(notes);
	}
	if parts.is_empty() {
		return None;
	}

	Some(parts.join("; "))
}

fn name_set(entries: &[NamedEntry]) -> BTreeSet<String> {
	entries
		.iter()
		.filter_map(NamedEntry::name)
		.map(|name| name.trim().to_lowercase())
		.filter(|name| !name.is_empty())
		.collect()
}

fn clean(value: Option<&str>) -> Option<String> {
	value.map(str::trim).filter(|value| !value.is_empty()).map(str::to_string)
}

fn canonical_text(value: Option<&str>) -> Option<String> {
	value.map(|value| value.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase())
}
