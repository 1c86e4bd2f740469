use std::{
	collections::BTreeSet,
	sync::{Arc, atomic::Ordering},
};

use scout_config::default_synonyms;
use scout_domain::{
	geo::GeoPoint,
	query::{self, QueryPlan, SynonymTable},
	trial::TrialStatus,
};
use scout_providers::{Error as ProviderError, registry::RegistryQuery};
use scout_service::{FallbackInput, Strategy};

use super::{RegistryResponder, StubGeocoder, StubOracle, StubRegistry, WebhookReply};

fn service_with(respond: RegistryResponder) -> (scout_service::ScoutService, Arc<StubRegistry>) {
	let registry = Arc::new(StubRegistry::new(respond));
	let providers = super::providers(
		registry.clone(),
		Arc::new(StubGeocoder::default()),
		Arc::new(StubOracle::new(WebhookReply::Fail)),
	);

	(super::test_service(super::test_config(), providers), registry)
}

fn plan(condition: &str, notes: Option<&str>) -> QueryPlan {
	let table = SynonymTable::new(&default_synonyms()).expect("Failed to compile synonyms.");

	query::build_plan(&table, Some(condition), notes)
}

fn buffalo() -> GeoPoint {
	GeoPoint { lat: 42.8864, lng: -78.8784, label: "Buffalo, NY".to_string() }
}

fn strategies(attempts: &[scout_service::StrategyAttempt]) -> Vec<Strategy> {
	attempts.iter().map(|attempt| attempt.strategy).collect()
}

#[tokio::test]
async fn unresolved_location_skips_geo_strategies_before_exhaustion() {
	let (service, registry) = service_with(Box::new(|_: &RegistryQuery| Ok(Vec::new())));
	let plan = plan("chronic neuropathy pain", None);
	let outcome = service
		.find_candidates(&FallbackInput {
			plan: &plan,
			origin: None,
			location_text: Some("Atlantis Deep"),
			radius_miles: 50.0,
		})
		.await;

	assert!(outcome.trials.is_empty());
	assert_eq!(outcome.strategy, None);
	assert_eq!(
		strategies(&outcome.attempts),
		vec![
			Strategy::LocationTextRecruiting,
			Strategy::LocationTextAnyStatus,
			Strategy::UnconstrainedNearby,
		]
	);
	assert!(outcome.attempts.iter().all(|attempt| !attempt.strategy.needs_coordinates()));
	assert!(registry.recorded().iter().all(|query| query.geo.is_none()));
	assert_eq!(registry.calls.load(Ordering::SeqCst), 5);

	let unconstrained = registry.recorded().pop().expect("Missing query.");

	assert_eq!(unconstrained.condition, None);
	assert_eq!(unconstrained.location_text.as_deref(), Some("Atlantis Deep"));
}

#[tokio::test]
async fn radius_escalates_until_trials_appear() {
	let (service, _) = service_with(Box::new(|query: &RegistryQuery| {
		let wide_enough = query.geo.is_some_and(|geo| geo.radius_miles >= 300.0);

		if wide_enough && !query.statuses.is_empty() {
			Ok(vec![super::registry_trial("NCT100", query.statuses[0], None)])
		} else {
			Ok(Vec::new())
		}
	}));
	let plan = plan("chronic neuropathy pain", None);
	let origin = buffalo();
	let outcome = service
		.find_candidates(&FallbackInput {
			plan: &plan,
			origin: Some(&origin),
			location_text: Some("Buffalo, NY"),
			radius_miles: 50.0,
		})
		.await;
	let radii: Vec<Option<f64>> =
		outcome.attempts.iter().map(|attempt| attempt.radius_miles).collect();

	assert_eq!(outcome.strategy, Some(Strategy::GeoRecruiting));
	assert_eq!(outcome.radius_miles, Some(300.0));
	assert_eq!(radii, vec![Some(50.0), Some(200.0), Some(300.0)]);
	assert_eq!(outcome.trials.len(), 1);
	assert_eq!(outcome.trials[0].status, TrialStatus::Recruiting);
}

#[tokio::test]
async fn merged_status_queries_hold_no_duplicates() {
	let (service, _) = service_with(Box::new(|_: &RegistryQuery| {
		Ok(vec![
			super::registry_trial("NCT1", TrialStatus::Recruiting, None),
			super::registry_trial("NCT2", TrialStatus::EnrollingByInvitation, None),
		])
	}));
	let plan = plan("chronic neuropathy pain", None);
	let origin = buffalo();
	let outcome = service
		.find_candidates(&FallbackInput {
			plan: &plan,
			origin: Some(&origin),
			location_text: None,
			radius_miles: 50.0,
		})
		.await;
	let ids: Vec<&str> = outcome.trials.iter().map(|trial| trial.nct_id.as_str()).collect();
	let unique: BTreeSet<&str> = ids.iter().copied().collect();

	assert_eq!(ids, vec!["NCT1", "NCT2"]);
	assert_eq!(unique.len(), ids.len());
}

#[tokio::test]
async fn any_status_results_are_filtered_to_recruiting() {
	let (service, _) = service_with(Box::new(|query: &RegistryQuery| {
		if query.statuses.is_empty() && query.geo.is_some() {
			Ok(vec![
				super::registry_trial("NCT7", TrialStatus::Completed, None),
				super::registry_trial("NCT8", TrialStatus::Recruiting, None),
			])
		} else {
			Ok(Vec::new())
		}
	}));
	let plan = plan("chronic neuropathy pain", None);
	let origin = buffalo();
	let outcome = service
		.find_candidates(&FallbackInput {
			plan: &plan,
			origin: Some(&origin),
			location_text: None,
			radius_miles: 50.0,
		})
		.await;

	assert_eq!(outcome.strategy, Some(Strategy::GeoAnyStatus));
	assert_eq!(outcome.radius_miles, Some(1_000.0));
	assert_eq!(outcome.trials.len(), 1);
	assert_eq!(outcome.trials[0].nct_id, "NCT8");
}

#[tokio::test]
async fn primary_condition_retried_when_notes_narrow_too_far() {
	let plan = plan("nsclc", Some("History of COPD."));
	let primary = plan.primary.strict().expect("Missing primary query.");

	assert!(plan.has_distinct_primary());

	let (service, _) = service_with(Box::new(move |query: &RegistryQuery| {
		if query.condition.as_deref() == Some(primary.as_str()) && query.geo.is_some() {
			Ok(vec![super::registry_trial("NCT9", TrialStatus::Recruiting, None)])
		} else {
			Ok(Vec::new())
		}
	}));
	let origin = buffalo();
	let outcome = service
		.find_candidates(&FallbackInput {
			plan: &plan,
			origin: Some(&origin),
			location_text: Some("Buffalo, NY"),
			radius_miles: 50.0,
		})
		.await;

	assert_eq!(outcome.strategy, Some(Strategy::PrimaryConditionFallback));
	assert_eq!(outcome.trials.len(), 1);
	assert_eq!(
		outcome.attempts.last().map(|attempt| attempt.strategy),
		Some(Strategy::PrimaryConditionFallback)
	);
}

#[tokio::test]
async fn registry_errors_count_as_empty() {
	let (service, _) = service_with(Box::new(|query: &RegistryQuery| {
		if query.geo.is_some() {
			Err(ProviderError::InvalidResponse { message: "Registry returned 503.".to_string() })
		} else if query.location_text.is_some() && !query.statuses.is_empty() {
			Ok(vec![super::registry_trial("NCT3", query.statuses[0], None)])
		} else {
			Ok(Vec::new())
		}
	}));
	let plan = plan("chronic neuropathy pain", None);
	let origin = buffalo();
	let outcome = service
		.find_candidates(&FallbackInput {
			plan: &plan,
			origin: Some(&origin),
			location_text: Some("Buffalo, NY"),
			radius_miles: 50.0,
		})
		.await;

	assert_eq!(outcome.strategy, Some(Strategy::LocationTextRecruiting));
	assert_eq!(outcome.trials.len(), 1);
	assert!(outcome.attempts.iter().any(|attempt| attempt.strategy == Strategy::GeoAnyStatus));
}
