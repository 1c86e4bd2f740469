mod error;
mod types;

pub use error::{Error, Result};
pub use types::{
	Config, GeocoderProviderConfig, LlmProviderConfig, Matching, OracleConfig,
	PostalProviderConfig, Postgres, Providers, RegistryProviderConfig, Rescoring, Service,
	Storage, SynonymRule, default_synonyms,
};

use std::{fs, path::Path};

pub fn load(path: &Path) -> Result<Config> {
	let raw = fs::read_to_string(path)
		.map_err(|err| Error::ReadConfig { path: path.to_path_buf(), source: err })?;

	let mut cfg: Config = toml::from_str(&raw)
		.map_err(|err| Error::ParseConfig { path: path.to_path_buf(), source: err })?;

	normalize(&mut cfg);

	validate(&cfg)?;

	Ok(cfg)
}

pub fn validate(cfg: &Config) -> Result<()> {
	if cfg.service.http_bind.trim().is_empty() {
		return Err(Error::Validation {
			message: "service.http_bind must be non-empty.".to_string(),
		});
	}

	match cfg.storage.backend.as_str() {
		"memory" => {},
		"postgres" => {
			let Some(postgres) = cfg.storage.postgres.as_ref() else {
				return Err(Error::Validation {
					message: "storage.postgres is required when storage.backend is postgres."
						.to_string(),
				});
			};

			if postgres.dsn.trim().is_empty() {
				return Err(Error::Validation {
					message: "storage.postgres.dsn must be non-empty.".to_string(),
				});
			}
			if postgres.pool_max_conns == 0 {
				return Err(Error::Validation {
					message: "storage.postgres.pool_max_conns must be greater than zero."
						.to_string(),
				});
			}
		},
		_ =>
			return Err(Error::Validation {
				message: "storage.backend must be one of memory or postgres.".to_string(),
			}),
	}

	for (label, timeout_ms) in [
		("providers.postal.timeout_ms", cfg.providers.postal.timeout_ms),
		("providers.geocoder.timeout_ms", cfg.providers.geocoder.timeout_ms),
		("providers.registry.timeout_ms", cfg.providers.registry.timeout_ms),
		("providers.oracle.webhook_timeout_ms", cfg.providers.oracle.webhook_timeout_ms),
	] {
		if timeout_ms == 0 {
			return Err(Error::Validation { message: format!("{label} must be greater than zero.") });
		}
	}

	if !cfg.providers.postal.path.contains("{zip}") {
		return Err(Error::Validation {
			message: "providers.postal.path must contain the {zip} placeholder.".to_string(),
		});
	}
	if cfg.providers.geocoder.user_agent.trim().is_empty() {
		return Err(Error::Validation {
			message: "providers.geocoder.user_agent must be non-empty.".to_string(),
		});
	}
	if cfg.providers.geocoder.candidate_limit == 0 {
		return Err(Error::Validation {
			message: "providers.geocoder.candidate_limit must be greater than zero.".to_string(),
		});
	}
	if !(1..=1_000).contains(&cfg.providers.registry.page_size) {
		return Err(Error::Validation {
			message: "providers.registry.page_size must be in the range 1-1000.".to_string(),
		});
	}

	validate_oracle(cfg)?;
	validate_matching(cfg)?;

	if cfg.rescoring.top_k == 0 {
		return Err(Error::Validation {
			message: "rescoring.top_k must be greater than zero.".to_string(),
		});
	}
	if cfg.rescoring.workers == 0 {
		return Err(Error::Validation {
			message: "rescoring.workers must be greater than zero.".to_string(),
		});
	}
	if cfg.rescoring.cache_ttl_days <= 0 {
		return Err(Error::Validation {
			message: "rescoring.cache_ttl_days must be greater than zero.".to_string(),
		});
	}

	Ok(())
}

fn validate_oracle(cfg: &Config) -> Result<()> {
	let oracle = &cfg.providers.oracle;

	if let Some(url) = oracle.webhook_url.as_deref()
		&& !(url.starts_with("http://") || url.starts_with("https://"))
	{
		return Err(Error::Validation {
			message: "providers.oracle.webhook_url must be an http or https URL.".to_string(),
		});
	}
	if oracle.health_suppress_minutes <= 0 {
		return Err(Error::Validation {
			message: "providers.oracle.health_suppress_minutes must be greater than zero."
				.to_string(),
		});
	}

	if let Some(model) = oracle.model.as_ref() {
		if model.api_key.trim().is_empty() {
			return Err(Error::Validation {
				message: "providers.oracle.model.api_key must be non-empty.".to_string(),
			});
		}
		if model.timeout_ms == 0 {
			return Err(Error::Validation {
				message: "providers.oracle.model.timeout_ms must be greater than zero."
					.to_string(),
			});
		}
		if !model.temperature.is_finite() || model.temperature < 0.0 {
			return Err(Error::Validation {
				message: "providers.oracle.model.temperature must be a finite, non-negative number."
					.to_string(),
			});
		}
	}

	Ok(())
}

fn validate_matching(cfg: &Config) -> Result<()> {
	let matching = &cfg.matching;

	if !matching.default_radius_miles.is_finite() || matching.default_radius_miles <= 0.0 {
		return Err(Error::Validation {
			message: "matching.default_radius_miles must be a finite number greater than zero."
				.to_string(),
		});
	}

	let mut previous = 0.0_f64;

	for radius in &matching.radius_escalation_miles {
		if !radius.is_finite() || *radius <= previous {
			return Err(Error::Validation {
				message: "matching.radius_escalation_miles must be finite and strictly increasing."
					.to_string(),
			});
		}

		previous = *radius;
	}

	if matching.dashboard_limit == 0 {
		return Err(Error::Validation {
			message: "matching.dashboard_limit must be greater than zero.".to_string(),
		});
	}
	if matching.results_limit < matching.dashboard_limit {
		return Err(Error::Validation {
			message: "matching.results_limit must be at least matching.dashboard_limit."
				.to_string(),
		});
	}
	if matching.min_results == 0 {
		return Err(Error::Validation {
			message: "matching.min_results must be greater than zero.".to_string(),
		});
	}

	for rule in &matching.synonyms {
		if rule.pattern.trim().is_empty() {
			return Err(Error::Validation {
				message: "matching.synonyms.pattern must be non-empty.".to_string(),
			});
		}
		if rule.synonyms.iter().all(|synonym| synonym.trim().is_empty()) {
			return Err(Error::Validation {
				message: format!(
					"matching.synonyms entry {:?} must list at least one synonym.",
					rule.pattern
				),
			});
		}
	}

	Ok(())
}

fn normalize(cfg: &mut Config) {
	if cfg.providers.oracle.webhook_url.as_deref().map(|url| url.trim().is_empty()).unwrap_or(false)
	{
		cfg.providers.oracle.webhook_url = None;
	}

	for rule in &mut cfg.matching.synonyms {
		rule.pattern = rule.pattern.trim().to_lowercase();
		rule.synonyms.retain(|synonym| !synonym.trim().is_empty());
	}
}
