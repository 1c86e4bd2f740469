pub mod geocoder;
pub mod oracle;
pub mod postal;
pub mod registry;

mod error;

pub use error::{Error, Result};

use std::{future::Future, time::Duration};

use reqwest::{
	Client,
	header::{AUTHORIZATION, HeaderMap, HeaderName},
};
use serde_json::{Map, Value};

pub fn default_headers(defaults: &Map<String, Value>) -> Result<HeaderMap> {
	let mut headers = HeaderMap::new();

	for (key, value) in defaults {
		let Some(raw) = value.as_str() else {
			return Err(Error::InvalidConfig {
				message: "Default header values must be strings.".to_string(),
			});
		};

		headers.insert(HeaderName::from_bytes(key.as_bytes())?, raw.parse()?);
	}

	Ok(headers)
}

pub fn auth_headers(api_key: &str, defaults: &Map<String, Value>) -> Result<HeaderMap> {
	let mut headers = default_headers(defaults)?;

	headers.insert(AUTHORIZATION, format!("Bearer {api_key}").parse()?);

	Ok(headers)
}

fn client(timeout_ms: u64) -> Result<Client> {
	Ok(Client::builder().timeout(Duration::from_millis(timeout_ms)).build()?)
}

/// Bounds `fut` by `timeout_ms` on top of the client timeout, which does not cover body reads
/// on every transport.
async fn bounded<T, F>(target: &str, timeout_ms: u64, fut: F) -> Result<T>
where
	F: Future<Output = Result<T>>,
{
	match tokio::time::timeout(Duration::from_millis(timeout_ms), fut).await {
		Ok(result) => result,
		Err(_) => Err(Error::Timeout { target: target.to_string(), timeout_ms }),
	}
}

fn endpoint(api_base: &str, path: &str) -> String {
	format!("{}{}", api_base.trim_end_matches('/'), path)
}

/// Reads a coordinate that providers send either as a JSON number or as a decimal string.
fn coordinate(value: Option<&Value>) -> Option<f64> {
	match value? {
		Value::Number(number) => number.as_f64(),
		Value::String(text) => text.trim().parse().ok(),
		_ => None,
	}
	.filter(|value: &f64| value.is_finite())
}
