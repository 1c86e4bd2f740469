use serde::Deserialize;
use serde_json::{Map, Value};

#[derive(Clone, Debug, Deserialize)]
pub struct Config {
	pub service: Service,
	pub storage: Storage,
	pub providers: Providers,
	#[serde(default)]
	pub matching: Matching,
	#[serde(default)]
	pub rescoring: Rescoring,
}

#[derive(Clone, Debug, Deserialize)]
pub struct Service {
	pub http_bind: String,
	pub log_level: String,
}

#[derive(Clone, Debug, Deserialize)]
pub struct Storage {
	/// One of "memory" or "postgres".
	pub backend: String,
	pub postgres: Option<Postgres>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct Postgres {
	pub dsn: String,
	pub pool_max_conns: u32,
}

#[derive(Clone, Debug, Deserialize)]
pub struct Providers {
	pub postal: PostalProviderConfig,
	pub geocoder: GeocoderProviderConfig,
	pub registry: RegistryProviderConfig,
	#[serde(default)]
	pub oracle: OracleConfig,
}

#[derive(Clone, Debug, Deserialize)]
pub struct PostalProviderConfig {
	pub api_base: String,
	/// Request path; `{zip}` is replaced with the five digit code.
	pub path: String,
	pub timeout_ms: u64,
	#[serde(default)]
	pub default_headers: Map<String, Value>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct GeocoderProviderConfig {
	pub api_base: String,
	pub path: String,
	pub user_agent: String,
	#[serde(default = "default_candidate_limit")]
	pub candidate_limit: u32,
	pub timeout_ms: u64,
	#[serde(default)]
	pub default_headers: Map<String, Value>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct RegistryProviderConfig {
	pub api_base: String,
	pub path: String,
	#[serde(default = "default_page_size")]
	pub page_size: u32,
	pub timeout_ms: u64,
	#[serde(default)]
	pub default_headers: Map<String, Value>,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct OracleConfig {
	pub webhook_url: Option<String>,
	pub webhook_timeout_ms: u64,
	pub retry_backoff_ms: u64,
	pub health_suppress_minutes: i64,
	pub default_headers: Map<String, Value>,
	/// Direct model call used when the webhook fails. Only consulted in a trusted context.
	pub model: Option<LlmProviderConfig>,
}
impl Default for OracleConfig {
	fn default() -> Self {
		Self {
			webhook_url: None,
			webhook_timeout_ms: 20_000,
			retry_backoff_ms: 500,
			health_suppress_minutes: 10,
			default_headers: Map::new(),
			model: None,
		}
	}
}

#[derive(Clone, Debug, Deserialize)]
pub struct LlmProviderConfig {
	pub provider_id: String,
	pub api_base: String,
	pub api_key: String,
	pub path: String,
	pub model: String,
	pub temperature: f32,
	pub timeout_ms: u64,
	#[serde(default)]
	pub default_headers: Map<String, Value>,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Matching {
	pub default_radius_miles: f64,
	pub radius_escalation_miles: Vec<f64>,
	pub dashboard_limit: u32,
	pub results_limit: u32,
	pub min_results: u32,
	pub synonyms: Vec<SynonymRule>,
}
impl Default for Matching {
	fn default() -> Self {
		Self {
			default_radius_miles: 50.0,
			radius_escalation_miles: vec![200.0, 300.0, 500.0, 1_000.0],
			dashboard_limit: 3,
			results_limit: 50,
			min_results: 1,
			synonyms: default_synonyms(),
		}
	}
}

/// A condition abbreviation or phrase and the synonym group it expands into.
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct SynonymRule {
	pub pattern: String,
	pub synonyms: Vec<String>,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Rescoring {
	pub enabled: bool,
	pub top_k: u32,
	pub workers: u32,
	pub cache_ttl_days: i64,
	/// Direct model calls are only allowed when the engine runs server side.
	pub trusted_context: bool,
}
impl Default for Rescoring {
	fn default() -> Self {
		Self { enabled: true, top_k: 15, workers: 3, cache_ttl_days: 7, trusted_context: true }
	}
}

pub fn default_synonyms() -> Vec<SynonymRule> {
	[
		("nsclc", &["non-small cell lung cancer", "nsclc", "lung cancer"][..]),
		("sclc", &["small cell lung cancer", "sclc"][..]),
		("crc", &["colorectal cancer", "colon cancer", "rectal cancer"][..]),
		("hcc", &["hepatocellular carcinoma", "liver cancer"][..]),
		("aml", &["acute myeloid leukemia", "aml"][..]),
		("cll", &["chronic lymphocytic leukemia", "cll"][..]),
		("copd", &["chronic obstructive pulmonary disease", "copd"][..]),
		("chf", &["congestive heart failure", "heart failure"][..]),
		("ckd", &["chronic kidney disease", "renal insufficiency"][..]),
		("t2d", &["type 2 diabetes", "diabetes mellitus type 2"][..]),
		("type 2 diabetes", &["type 2 diabetes", "diabetes mellitus type 2", "t2d"][..]),
		("mdd", &["major depressive disorder", "depression"][..]),
		("ptsd", &["post-traumatic stress disorder", "ptsd"][..]),
		("ibd", &["inflammatory bowel disease", "crohn disease", "ulcerative colitis"][..]),
		("ra", &["rheumatoid arthritis"][..]),
		("egfr", &["egfr mutation", "egfr"][..]),
		("her2", &["her2-positive", "her2"][..]),
	]
	.into_iter()
	.map(|(pattern, synonyms)| SynonymRule {
		pattern: pattern.to_string(),
		synonyms: synonyms.iter().map(|value| value.to_string()).collect(),
	})
	.collect()
}

fn default_candidate_limit() -> u32 {
	10
}

fn default_page_size() -> u32 {
	50
}
