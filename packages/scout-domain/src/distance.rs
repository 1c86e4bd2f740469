use serde::{Deserialize, Serialize};

pub const EARTH_RADIUS_MILES: f64 = 3_958.8;
pub const MILES_PER_KILOMETER: f64 = 0.621_371;

#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DistanceUnit {
	Miles,
	Kilometers,
}

#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Serialize)]
pub struct Distance {
	pub value: f64,
	pub unit: DistanceUnit,
}
impl Distance {
	pub fn miles(self) -> f64 {
		match self.unit {
			DistanceUnit::Miles => self.value,
			DistanceUnit::Kilometers => self.value * MILES_PER_KILOMETER,
		}
	}
}

pub fn haversine_miles(lat1: f64, lng1: f64, lat2: f64, lng2: f64) -> f64 {
	let d_lat = (lat2 - lat1).to_radians();
	let d_lng = (lng2 - lng1).to_radians();
	let a = (d_lat / 2.0).sin().powi(2)
		+ lat1.to_radians().cos() * lat2.to_radians().cos() * (d_lng / 2.0).sin().powi(2);
	let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

	EARTH_RADIUS_MILES * c
}

/// Parses "50", "50mi", "50 miles", "80km" or "80 kilometers". Unitless values are miles.
pub fn parse_distance(text: &str) -> Option<Distance> {
	let trimmed = text.trim().to_ascii_lowercase();
	let split = trimmed
		.find(|ch: char| !(ch.is_ascii_digit() || ch == '.'))
		.unwrap_or(trimmed.len());
	let (number, unit) = trimmed.split_at(split);
	let value: f64 = number.parse().ok()?;

	if !value.is_finite() || value <= 0.0 {
		return None;
	}

	let unit = match unit.trim() {
		"" | "mi" | "mile" | "miles" => DistanceUnit::Miles,
		"km" | "kms" | "kilometer" | "kilometers" | "kilometre" | "kilometres" =>
			DistanceUnit::Kilometers,
		_ => return None,
	};

	Some(Distance { value, unit })
}

pub fn parse_radius(text: &str) -> Option<f64> {
	parse_distance(text).map(Distance::miles)
}
