use unicode_segmentation::UnicodeSegmentation;

pub const MAX_RATIONALE_GRAPHEMES: usize = 160;
const MAX_HIGHLIGHTS: usize = 5;
const SEPARATOR: &str = " · ";
const ELLIPSIS: &str = "…";

#[derive(Debug, Default)]
pub struct RationaleParts<'a> {
	pub highlights: Vec<&'a str>,
	pub status: Option<&'a str>,
	pub site: Option<&'a str>,
	pub preference: Option<&'a str>,
	pub radius_miles: Option<f64>,
}

pub fn compose(parts: &RationaleParts<'_>) -> Option<String> {
	let mut segments = Vec::new();

	if !parts.highlights.is_empty() {
		let shown: Vec<&str> = parts.highlights.iter().take(MAX_HIGHLIGHTS).copied().collect();

		segments.push(format!("Matches: {}", shown.join(", ")));
	}
	if let Some(status) = non_blank(parts.status) {
		segments.push(status.to_string());
	}
	if let Some(site) = non_blank(parts.site) {
		segments.push(format!("Site: {site}"));
	}
	if let Some(preference) = non_blank(parts.preference) {
		segments.push(format!("Near: {preference}"));
	}
	if let Some(radius) = parts.radius_miles.filter(|radius| radius.is_finite() && *radius > 0.0) {
		segments.push(format!("Within {} mi", radius.round() as u64));
	}
	if segments.is_empty() {
		return None;
	}

	Some(truncate(&segments.join(SEPARATOR), MAX_RATIONALE_GRAPHEMES))
}

/// Cuts `text` to at most `max` grapheme clusters, the last being an ellipsis when cut.
pub fn truncate(text: &str, max: usize) -> String {
	if text.graphemes(true).count() <= max {
		return text.to_string();
	}

	let mut out: String = text.graphemes(true).take(max.saturating_sub(1)).collect();

	out.truncate(out.trim_end().len());
	out.push_str(ELLIPSIS);

	out
}

fn non_blank(value: Option<&str>) -> Option<&str> {
	value.map(str::trim).filter(|value| !value.is_empty())
}
