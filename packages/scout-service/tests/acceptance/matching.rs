use std::sync::Arc;

use time::OffsetDateTime;

use scout_domain::{
	geo::PostalPlace,
	profile::{self, NamedEntry, RawProfile},
	ranking::ScoreSource,
	trial::TrialStatus,
};
use scout_providers::registry::RegistryQuery;
use scout_service::{Error, MatchRequest, MatchSource, ScoutService, Strategy, cache::AiScoreEntry};

use super::{StubGeocoder, StubOracle, StubRegistry, WebhookReply};

const BUFFALO_SITE: (f64, f64) = (42.8864, -78.8784);
const LOS_ANGELES_SITE: (f64, f64) = (34.0522, -118.2437);

fn buffalo_geocoder() -> StubGeocoder {
	StubGeocoder {
		postal: [(
			"14203".to_string(),
			PostalPlace {
				lat: 42.8864,
				lng: -78.8784,
				city: Some("Buffalo".to_string()),
				state: Some("New York".to_string()),
				state_abbreviation: Some("NY".to_string()),
			},
		)]
		.into_iter()
		.collect(),
		..Default::default()
	}
}

fn service_with(registry: StubRegistry, rescoring: bool) -> ScoutService {
	let mut cfg = super::test_config();

	cfg.rescoring.enabled = rescoring;

	let providers = super::providers(
		Arc::new(registry),
		Arc::new(buffalo_geocoder()),
		Arc::new(StubOracle::new(WebhookReply::Fail)),
	);

	super::test_service(cfg, providers)
}

fn neuropathy_patient() -> RawProfile {
	RawProfile {
		age: Some(45),
		gender: Some("Female".to_string()),
		primary_condition: Some("chronic neuropathy pain".to_string()),
		medications: vec![NamedEntry::Name("Gabapentin".to_string())],
		location_preference: Some("14203".to_string()),
		travel_radius: Some("50mi".to_string()),
		..Default::default()
	}
}

#[tokio::test]
async fn catalog_matches_rank_the_neuropathy_trial_first() {
	let service = service_with(StubRegistry::empty(), true);
	let report = service
		.match_profile(MatchRequest {
			subject: None,
			profile: neuropathy_patient(),
			source: MatchSource::Catalog,
			limit: None,
		})
		.await
		.expect("Match failed.");
	let top = report.matches.first().expect("Expected catalog matches.");

	assert_eq!(top.trial.id, "agorain-neuropathy");
	assert!(top.score() >= 70);
	assert!(top.distance_miles.is_some_and(|miles| miles < 50.0));
	assert!(!report.rescoring_started);
	assert_eq!(report.strategy, None);
	assert_eq!(report.origin.map(|origin| origin.label), Some("Buffalo, NY 14203".to_string()));
	assert!(
		report
			.matches
			.windows(2)
			.all(|pair| pair[0].score() >= pair[1].score())
	);
}

#[tokio::test]
async fn registry_matches_split_by_radius() {
	let registry = StubRegistry::new(Box::new(|query: &RegistryQuery| {
		if query.statuses.is_empty() {
			return Ok(Vec::new());
		}

		Ok(vec![
			super::registry_trial("NCT-NEAR", query.statuses[0], Some(BUFFALO_SITE)),
			super::registry_trial("NCT-FAR", query.statuses[0], Some(LOS_ANGELES_SITE)),
			super::registry_trial("NCT-UNKNOWN", query.statuses[0], None),
		])
	}));
	let service = service_with(registry, false);
	let report = service
		.match_profile(MatchRequest {
			subject: Some("patient-7".to_string()),
			profile: neuropathy_patient(),
			source: MatchSource::Registry,
			limit: None,
		})
		.await
		.expect("Match failed.");
	let within: Vec<&str> = report.matches.iter().map(|entry| entry.trial.id.as_str()).collect();
	let outside: Vec<&str> =
		report.outside_radius.iter().map(|entry| entry.trial.id.as_str()).collect();

	assert_eq!(report.strategy, Some(Strategy::GeoRecruiting));
	assert_eq!(report.radius_miles, 50.0);
	assert_eq!(within, vec!["NCT-NEAR", "NCT-UNKNOWN"]);
	assert_eq!(outside, vec!["NCT-FAR"]);
	assert_eq!(report.coaching, None);
}

#[tokio::test]
async fn empty_registry_yields_coaching_not_fabricated_matches() {
	let service = service_with(StubRegistry::empty(), true);
	let report = service
		.match_profile(MatchRequest {
			subject: None,
			profile: neuropathy_patient(),
			source: MatchSource::Registry,
			limit: None,
		})
		.await
		.expect("Match failed.");

	assert!(report.matches.is_empty());
	assert!(report.outside_radius.is_empty());
	assert_eq!(report.strategy, None);
	assert!(report.coaching.is_some());
	assert!(!report.rescoring_started);
}

#[tokio::test]
async fn cached_oracle_scores_overlay_heuristic_ranking() {
	let registry = StubRegistry::new(Box::new(|query: &RegistryQuery| {
		if query.statuses.is_empty() {
			return Ok(Vec::new());
		}

		Ok(vec![
			super::registry_trial("NCT-A", query.statuses[0], Some(BUFFALO_SITE)),
			super::registry_trial("NCT-B", query.statuses[0], Some(BUFFALO_SITE)),
		])
	}));
	let service = service_with(registry, false);
	let raw = neuropathy_patient();
	let (_, fingerprint) = profile::normalize(&raw);

	service
		.caches
		.put_ai_score(
			&fingerprint,
			"NCT-B",
			&AiScoreEntry {
				score: 99,
				rationale: Some("Ideal candidate.".to_string()),
				scored_at: OffsetDateTime::now_utc(),
			},
		)
		.await
		.expect("Cache write failed.");

	let report = service
		.match_profile(MatchRequest {
			subject: None,
			profile: raw,
			source: MatchSource::Registry,
			limit: Some(1),
		})
		.await
		.expect("Match failed.");

	assert_eq!(report.fingerprint, fingerprint);
	assert_eq!(report.matches.len(), 1);
	assert_eq!(report.matches[0].trial.id, "NCT-B");
	assert_eq!(report.matches[0].score(), 99);
	assert_eq!(report.matches[0].score_source, ScoreSource::Oracle);
}

#[tokio::test]
async fn dashboard_uses_the_stored_profile() {
	let registry = StubRegistry::new(Box::new(|query: &RegistryQuery| {
		if query.statuses.is_empty() {
			return Ok(Vec::new());
		}

		Ok((1..=5)
			.map(|n| super::registry_trial(&format!("NCT{n}"), TrialStatus::Recruiting, None))
			.collect())
	}));
	let service = service_with(registry, false);
	let err = service.dashboard("patient-9").await.expect_err("Expected a missing profile.");

	assert!(matches!(err, Error::NotFound { .. }));

	let fingerprint = service
		.save_profile("patient-9", &neuropathy_patient())
		.await
		.expect("Save failed.");
	let report = service.dashboard("patient-9").await.expect("Dashboard failed.");

	assert_eq!(report.fingerprint, fingerprint);
	assert_eq!(report.matches.len(), 3);
}

#[tokio::test]
async fn zero_limit_is_rejected() {
	let service = service_with(StubRegistry::empty(), false);
	let err = service
		.match_profile(MatchRequest {
			subject: None,
			profile: RawProfile::default(),
			source: MatchSource::Catalog,
			limit: Some(0),
		})
		.await
		.expect_err("Expected a rejected limit.");

	assert!(matches!(err, Error::InvalidRequest { .. }));
}
