//! External scoring oracle: a JSON webhook and a direct chat-completion call.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use scout_config::{LlmProviderConfig, OracleConfig};

use crate::{Error, Result};

const SYSTEM_PROMPT: &str = "You rate how well a patient fits a clinical trial. Reply with a JSON \
object {\"score\": <integer 0-100>, \"rationale\": <one sentence>} and nothing else.";

#[derive(Clone, Debug, Serialize)]
pub struct OracleRequest {
	pub fingerprint: String,
	pub trial_id: String,
	pub prompt: String,
}

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct OracleVerdict {
	/// Rounded and clamped to [0, 100].
	pub score: f64,
	pub rationale: Option<String>,
}

pub async fn score_via_webhook(
	cfg: &OracleConfig,
	url: &str,
	request: &OracleRequest,
) -> Result<OracleVerdict> {
	let client = crate::client(cfg.webhook_timeout_ms)?;
	let headers = crate::default_headers(&cfg.default_headers)?;

	crate::bounded("oracle webhook", cfg.webhook_timeout_ms, async move {
		let res = client.post(url).headers(headers).json(request).send().await?;
		let json: Value = res.error_for_status()?.json().await?;

		parse_verdict(&json)
	})
	.await
}

pub async fn score_via_model(cfg: &LlmProviderConfig, request: &OracleRequest) -> Result<OracleVerdict> {
	let client = crate::client(cfg.timeout_ms)?;
	let url = crate::endpoint(&cfg.api_base, &cfg.path);
	let headers = crate::auth_headers(&cfg.api_key, &cfg.default_headers)?;
	let body = serde_json::json!({
		"model": cfg.model,
		"temperature": cfg.temperature,
		"messages": [
			{ "role": "system", "content": SYSTEM_PROMPT },
			{ "role": "user", "content": request.prompt },
		],
	});

	crate::bounded("oracle model", cfg.timeout_ms, async move {
		let res = client.post(url).headers(headers).json(&body).send().await?;
		let json: Value = res.error_for_status()?.json().await?;

		parse_chat_verdict(&json)
	})
	.await
}

/// Accepts `{"score": 72, "rationale": "..."}` with the score as a number or numeric string.
pub fn parse_verdict(json: &Value) -> Result<OracleVerdict> {
	let score = match json.get("score") {
		Some(Value::Number(number)) => number.as_f64(),
		Some(Value::String(text)) => text.trim().parse::<f64>().ok(),
		_ => None,
	}
	.filter(|score| score.is_finite())
	.ok_or_else(|| Error::InvalidResponse {
		message: "Oracle response is missing a numeric score.".to_string(),
	})?;
	let rationale = json
		.get("rationale")
		.and_then(Value::as_str)
		.map(str::trim)
		.filter(|text| !text.is_empty())
		.map(str::to_string);

	Ok(OracleVerdict { score: score.clamp(0.0, 100.0).round(), rationale })
}

fn parse_chat_verdict(json: &Value) -> Result<OracleVerdict> {
	let content = json
		.get("choices")
		.and_then(Value::as_array)
		.and_then(|choices| choices.first())
		.and_then(|choice| choice.get("message"))
		.and_then(|message| message.get("content"))
		.and_then(Value::as_str)
		.ok_or_else(|| Error::InvalidResponse {
			message: "Model response is missing message content.".to_string(),
		})?;
	let parsed: Value = serde_json::from_str(strip_code_fence(content))?;

	parse_verdict(&parsed)
}

fn strip_code_fence(content: &str) -> &str {
	let trimmed = content.trim();
	let Some(inner) = trimmed.strip_prefix("```") else {
		return trimmed;
	};
	let inner = inner.strip_prefix("json").unwrap_or(inner);

	inner.strip_suffix("```").unwrap_or(inner).trim()
}
