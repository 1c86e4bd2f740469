use reqwest::StatusCode;
use serde_json::Value;

use scout_config::PostalProviderConfig;
use scout_domain::geo::PostalPlace;

use crate::Result;

/// Looks up a five digit code. Unknown codes yield `Ok(None)`.
pub async fn lookup(cfg: &PostalProviderConfig, zip: &str) -> Result<Option<PostalPlace>> {
	let client = crate::client(cfg.timeout_ms)?;
	let url = crate::endpoint(&cfg.api_base, &cfg.path.replace("{zip}", zip));
	let headers = crate::default_headers(&cfg.default_headers)?;

	crate::bounded("postal", cfg.timeout_ms, async move {
		let res = client.get(url).headers(headers).send().await?;

		if res.status() == StatusCode::NOT_FOUND {
			return Ok(None);
		}

		let json: Value = res.error_for_status()?.json().await?;

		Ok::<_, crate::Error>(parse_postal_response(&json))
	})
	.await
}

fn parse_postal_response(json: &Value) -> Option<PostalPlace> {
	let place = json.get("places").and_then(Value::as_array).and_then(|places| places.first())?;
	let text = |key: &str| {
		place
			.get(key)
			.and_then(Value::as_str)
			.map(str::trim)
			.filter(|value| !value.is_empty())
			.map(str::to_string)
	};

	Some(PostalPlace {
		lat: crate::coordinate(place.get("latitude"))?,
		lng: crate::coordinate(place.get("longitude"))?,
		city: text("place name"),
		state: text("state"),
		state_abbreviation: text("state abbreviation"),
	})
}
