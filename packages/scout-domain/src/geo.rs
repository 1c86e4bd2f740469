//! Pure helpers behind geocode resolution: alias folding, U.S. hint detection, and the bounds
//! checks applied to provider answers.

use serde::{Deserialize, Serialize};

pub const CANONICAL_US_LABEL: &str = "United States";

pub const CONTINENTAL_LAT_MIN: f64 = 24.0;
pub const CONTINENTAL_LAT_MAX: f64 = 50.0;
pub const CONTINENTAL_LNG_MIN: f64 = -130.0;
pub const CONTINENTAL_LNG_MAX: f64 = -65.0;

const US_ALIASES: &[&str] = &[
	"us",
	"u.s.",
	"u.s",
	"usa",
	"u.s.a.",
	"u.s.a",
	"america",
	"united states",
	"united states of america",
	"the united states",
];

const US_LABEL_FORMS: &[&str] = &["United States", "USA", "US"];

const STATE_ABBREVIATIONS: &[&str] = &[
	"AK", "AL", "AR", "AZ", "CA", "CO", "CT", "DC", "DE", "FL", "GA", "HI", "IA", "ID", "IL", "IN",
	"KS", "KY", "LA", "MA", "MD", "ME", "MI", "MN", "MO", "MS", "MT", "NC", "ND", "NE", "NH", "NJ",
	"NM", "NV", "NY", "OH", "OK", "OR", "PA", "RI", "SC", "SD", "TN", "TX", "UT", "VA", "VT", "WA",
	"WI", "WV", "WY",
];

const STATE_NAMES: &[&str] = &[
	"alabama",
	"alaska",
	"arizona",
	"arkansas",
	"california",
	"colorado",
	"connecticut",
	"delaware",
	"district of columbia",
	"florida",
	"georgia",
	"hawaii",
	"idaho",
	"illinois",
	"indiana",
	"iowa",
	"kansas",
	"kentucky",
	"louisiana",
	"maine",
	"maryland",
	"massachusetts",
	"michigan",
	"minnesota",
	"mississippi",
	"missouri",
	"montana",
	"nebraska",
	"nevada",
	"new hampshire",
	"new jersey",
	"new mexico",
	"new york",
	"north carolina",
	"north dakota",
	"ohio",
	"oklahoma",
	"oregon",
	"pennsylvania",
	"rhode island",
	"south carolina",
	"south dakota",
	"tennessee",
	"texas",
	"utah",
	"vermont",
	"virginia",
	"washington",
	"west virginia",
	"wisconsin",
	"wyoming",
];

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct GeoPoint {
	pub lat: f64,
	pub lng: f64,
	pub label: String,
}

#[derive(Clone, Debug, PartialEq)]
pub struct PostalPlace {
	pub lat: f64,
	pub lng: f64,
	pub city: Option<String>,
	pub state: Option<String>,
	pub state_abbreviation: Option<String>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct GeoCandidate {
	pub lat: f64,
	pub lng: f64,
	pub display_name: String,
}

pub fn within_continental_us(lat: f64, lng: f64) -> bool {
	(CONTINENTAL_LAT_MIN..=CONTINENTAL_LAT_MAX).contains(&lat)
		&& (CONTINENTAL_LNG_MIN..=CONTINENTAL_LNG_MAX).contains(&lng)
}

/// Cache key for a free-text location.
pub fn cache_key(text: &str) -> String {
	text.trim().to_lowercase()
}

/// Rewrites country aliases to one canonical label, both for the whole input and for its last
/// comma-separated part ("Austin, TX, usa").
pub fn normalize_country_alias(text: &str) -> String {
	let trimmed = text.trim();

	if is_us_alias(trimmed) {
		return CANONICAL_US_LABEL.to_string();
	}

	let mut parts: Vec<&str> = trimmed.split(',').map(str::trim).collect();

	if parts.len() > 1
		&& let Some(last) = parts.last_mut()
		&& is_us_alias(*last)
	{
		*last = CANONICAL_US_LABEL;

		return parts.join(", ");
	}

	trimmed.to_string()
}

/// Returns the five digit code when the whole input is a ZIP or ZIP+4.
pub fn postal_code(text: &str) -> Option<&str> {
	let trimmed = text.trim();
	let (zip, plus_four) = match trimmed.split_once('-') {
		Some((zip, rest)) => (zip, Some(rest)),
		None => (trimmed, None),
	};

	if !is_digits(zip, 5) {
		return None;
	}
	if let Some(rest) = plus_four
		&& !is_digits(rest, 4)
	{
		return None;
	}

	Some(zip)
}

/// True when the text names a U.S. state, carries a state abbreviation or a ZIP-like token, or
/// mentions the country itself.
pub fn has_us_hint(text: &str) -> bool {
	let normalized = normalize_country_alias(text);

	if normalized.contains(CANONICAL_US_LABEL) {
		return true;
	}

	for token in text.split(|ch: char| !ch.is_ascii_alphanumeric()) {
		if is_digits(token, 5) {
			return true;
		}
		if token.len() == 2 && STATE_ABBREVIATIONS.binary_search(&token).is_ok() {
			return true;
		}
	}

	let folded = crate::text::fold(text);
	let padded = format!(" {} ", folded.split_whitespace().collect::<Vec<_>>().join(" "));

	STATE_NAMES.iter().any(|name| padded.contains(&format!(" {name} ")))
}

/// Accepts a postal answer only inside continental bounds and with a state abbreviation.
pub fn accept_postal(zip: &str, place: &PostalPlace) -> Option<GeoPoint> {
	if !within_continental_us(place.lat, place.lng) {
		return None;
	}

	let state = place.state_abbreviation.as_deref().map(str::trim).filter(|s| !s.is_empty())?;
	let label = match place.city.as_deref().map(str::trim).filter(|c| !c.is_empty()) {
		Some(city) => format!("{city}, {state} {zip}"),
		None => format!("{state} {zip}"),
	};

	Some(GeoPoint { lat: place.lat, lng: place.lng, label })
}

/// Picks the geocoder candidate to trust. With a U.S. hint, candidates labelled as U.S. win,
/// then candidates inside continental bounds, then the first one.
pub fn select_candidate(candidates: &[GeoCandidate], us_hint: bool) -> Option<&GeoCandidate> {
	if !us_hint {
		return candidates.first();
	}

	candidates
		.iter()
		.find(|candidate| is_us_label(&candidate.display_name))
		.or_else(|| {
			candidates.iter().find(|candidate| within_continental_us(candidate.lat, candidate.lng))
		})
		.or_else(|| candidates.first())
}

/// Keeps only candidates inside continental bounds. Used once a postal answer was rejected, so
/// the free-text path cannot bring an out-of-bounds place back.
pub fn select_continental_candidate(candidates: &[GeoCandidate]) -> Option<&GeoCandidate> {
	candidates.iter().find(|candidate| within_continental_us(candidate.lat, candidate.lng))
}

/// True when any comma-separated part of the label names the country, optionally followed by a
/// postal code ("Buffalo, NY, US 14203").
fn is_us_label(label: &str) -> bool {
	label.split(',').map(str::trim).any(|part| {
		US_LABEL_FORMS.iter().any(|form| {
			part.strip_prefix(form).is_some_and(|rest| rest.is_empty() || rest.starts_with(' '))
		})
	})
}

fn is_us_alias(text: &str) -> bool {
	let lowered = text.trim().to_lowercase();

	US_ALIASES.contains(&lowered.as_str())
}

fn is_digits(text: &str, len: usize) -> bool {
	text.len() == len && text.bytes().all(|b| b.is_ascii_digit())
}
