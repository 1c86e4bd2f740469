use reqwest::header::{HeaderValue, USER_AGENT};
use serde_json::Value;

use scout_config::GeocoderProviderConfig;
use scout_domain::geo::GeoCandidate;

use crate::{Error, Result};

pub async fn search(
	cfg: &GeocoderProviderConfig,
	text: &str,
	limit: u32,
) -> Result<Vec<GeoCandidate>> {
	let client = crate::client(cfg.timeout_ms)?;
	let url = crate::endpoint(&cfg.api_base, &cfg.path);
	let mut headers = crate::default_headers(&cfg.default_headers)?;

	headers.insert(USER_AGENT, HeaderValue::from_str(&cfg.user_agent)?);

	let limit = limit.to_string();

	crate::bounded("geocoder", cfg.timeout_ms, async move {
		let res = client
			.get(url)
			.headers(headers)
			.query(&[("q", text), ("format", "json"), ("limit", limit.as_str())])
			.send()
			.await?;
		let json: Value = res.error_for_status()?.json().await?;

		parse_search_response(&json)
	})
	.await
}

fn parse_search_response(json: &Value) -> Result<Vec<GeoCandidate>> {
	let items = json.as_array().ok_or_else(|| Error::InvalidResponse {
		message: "Geocoder response must be a JSON array.".to_string(),
	})?;

	Ok(items
		.iter()
		.filter_map(|item| {
			Some(GeoCandidate {
				lat: crate::coordinate(item.get("lat"))?,
				lng: crate::coordinate(item.get("lon"))?,
				display_name: item.get("display_name").and_then(Value::as_str)?.trim().to_string(),
			})
		})
		.collect())
}
