use std::{
	sync::{Arc, atomic::Ordering},
	time::Duration,
};

use serde_json::json;
use time::OffsetDateTime;

use scout_config::Config;
use scout_domain::{
	profile::{self, NormalizedProfile, ProfileFingerprint, RawProfile},
	ranking::{RankedMatch, ScoreSource},
	scoring,
	trial::{ScorableTrial, TrialStatus},
};
use scout_service::{RescoreSummary, ScoutService};

use super::{StubGeocoder, StubOracle, StubRegistry, WebhookReply};

const WEBHOOK_URL: &str = "http://oracle.test/score";

struct Fixture {
	service: ScoutService,
	registry: Arc<StubRegistry>,
	oracle: Arc<StubOracle>,
}

fn fixture(cfg: Config, oracle: StubOracle) -> Fixture {
	let registry = Arc::new(
		StubRegistry::empty()
			.with_details([super::trial_detail("NCT1"), super::trial_detail("NCT2")]),
	);
	let oracle = Arc::new(oracle);
	let providers =
		super::providers(registry.clone(), Arc::new(StubGeocoder::default()), oracle.clone());

	Fixture { service: super::test_service(cfg, providers), registry, oracle }
}

fn patient(condition: &str) -> (NormalizedProfile, ProfileFingerprint) {
	profile::normalize(&RawProfile {
		age: Some(54),
		gender: Some("male".to_string()),
		primary_condition: Some(condition.to_string()),
		..Default::default()
	})
}

fn ranked(profile: &NormalizedProfile, ids: &[&str]) -> Vec<RankedMatch> {
	ids.iter()
		.map(|id| {
			let trial = super::registry_trial(id, TrialStatus::Recruiting, None);

			RankedMatch::new(
				ScorableTrial::from(&trial),
				scoring::score_registry(profile, &trial),
				None,
				None,
			)
		})
		.collect()
}

#[tokio::test]
async fn cached_oracle_score_prevents_second_call() {
	let fx = fixture(
		super::test_config(),
		StubOracle::new(WebhookReply::Json(json!({ "score": 82, "rationale": "Strong fit." }))),
	);
	let (profile, fingerprint) = patient("chronic neuropathy pain");
	let list = ranked(&profile, &["NCT1"]);
	let mut events = fx.service.overlay.subscribe();
	let (immediate, handle) =
		fx.service.overlay.refine_top_k("subject-1", list.clone(), 15, &profile, &fingerprint);

	assert_eq!(immediate, list);
	assert_eq!(
		handle.wait().await,
		Some(RescoreSummary { cache_hits: 0, scored: 1, misses: 0 })
	);

	let event = events.try_recv().expect("Expected a rescore event.");

	assert_eq!(event.fingerprint, fingerprint);
	assert_eq!(event.trial_id, "NCT1");
	assert_eq!(event.score, 82);

	let (_, handle) =
		fx.service.overlay.refine_top_k("subject-1", list.clone(), 15, &profile, &fingerprint);

	assert_eq!(
		handle.wait().await,
		Some(RescoreSummary { cache_hits: 1, scored: 0, misses: 0 })
	);
	assert_eq!(fx.oracle.webhook_calls.load(Ordering::SeqCst), 1);
	assert_eq!(fx.registry.detail_calls.load(Ordering::SeqCst), 1);

	let mut overlaid = list;

	fx.service.apply_cached_scores(&fingerprint, &mut overlaid).await;

	assert_eq!(overlaid[0].score(), 82);
	assert_eq!(overlaid[0].score_source, ScoreSource::Oracle);
	assert_eq!(overlaid[0].result.rationale.as_deref(), Some("Strong fit."));
}

#[tokio::test]
async fn failing_webhook_is_retried_once_then_suppressed() {
	let fx = fixture(super::test_config(), StubOracle::new(WebhookReply::Fail));
	let (profile, fingerprint) = patient("chronic neuropathy pain");
	let list = ranked(&profile, &["NCT1"]);
	let (_, handle) =
		fx.service.overlay.refine_top_k("subject-2", list.clone(), 15, &profile, &fingerprint);

	assert_eq!(
		handle.wait().await,
		Some(RescoreSummary { cache_hits: 0, scored: 0, misses: 1 })
	);
	assert_eq!(fx.oracle.webhook_calls.load(Ordering::SeqCst), 2);
	assert!(
		fx.service
			.caches
			.webhook_suppressed(WEBHOOK_URL, 10, OffsetDateTime::now_utc())
			.await
			.expect("Health read failed.")
	);

	let (_, handle) =
		fx.service.overlay.refine_top_k("subject-2", list, 15, &profile, &fingerprint);

	assert_eq!(
		handle.wait().await,
		Some(RescoreSummary { cache_hits: 0, scored: 0, misses: 1 })
	);
	assert_eq!(fx.oracle.webhook_calls.load(Ordering::SeqCst), 2);
	assert_eq!(fx.oracle.model_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn malformed_verdict_is_a_miss() {
	let fx = fixture(
		super::test_config(),
		StubOracle::new(WebhookReply::Json(json!({ "score": "high", "rationale": "?" }))),
	);
	let (profile, fingerprint) = patient("chronic neuropathy pain");
	let (_, handle) = fx.service.overlay.refine_top_k(
		"subject-3",
		ranked(&profile, &["NCT1"]),
		15,
		&profile,
		&fingerprint,
	);

	assert_eq!(
		handle.wait().await,
		Some(RescoreSummary { cache_hits: 0, scored: 0, misses: 1 })
	);
	assert_eq!(fx.oracle.webhook_calls.load(Ordering::SeqCst), 1);
	assert!(
		!fx.service
			.caches
			.webhook_suppressed(WEBHOOK_URL, 10, OffsetDateTime::now_utc())
			.await
			.expect("Health read failed.")
	);

	let cached = fx
		.service
		.caches
		.fresh_ai_score(&fingerprint, "NCT1", 7, OffsetDateTime::now_utc())
		.await
		.expect("Cache read failed.");

	assert_eq!(cached, None);
}

#[tokio::test]
async fn no_configured_oracle_skips_rescoring() {
	let mut cfg = super::test_config();

	cfg.providers.oracle.webhook_url = None;
	cfg.providers.oracle.model = Some(super::model_config());
	cfg.rescoring.trusted_context = false;

	let fx = fixture(cfg, StubOracle::new(WebhookReply::Json(json!({ "score": 90 }))));
	let (profile, fingerprint) = patient("chronic neuropathy pain");
	let list = ranked(&profile, &["NCT1", "NCT2"]);
	let (immediate, handle) =
		fx.service.overlay.refine_top_k("subject-7", list.clone(), 15, &profile, &fingerprint);

	assert_eq!(immediate, list);
	assert!(!handle.is_active());
	assert_eq!(handle.wait().await, None);
	assert_eq!(fx.registry.detail_calls.load(Ordering::SeqCst), 0);
	assert_eq!(fx.oracle.webhook_calls.load(Ordering::SeqCst), 0);
	assert_eq!(fx.oracle.model_calls.load(Ordering::SeqCst), 0);
	assert_eq!(fx.service.overlay.tracked_subjects(), 0);
}

#[tokio::test]
async fn model_fallback_runs_only_in_trusted_context() {
	let mut cfg = super::test_config();

	cfg.rescoring.trusted_context = true;
	cfg.providers.oracle.model = Some(super::model_config());

	let mut oracle = StubOracle::new(WebhookReply::Fail);

	oracle.model = Some(json!({ "score": 63.6, "rationale": "Partial fit." }));

	let fx = fixture(cfg, oracle);
	let (profile, fingerprint) = patient("chronic neuropathy pain");
	let (_, handle) = fx.service.overlay.refine_top_k(
		"subject-4",
		ranked(&profile, &["NCT1", "NCT2", "NCT404"]),
		15,
		&profile,
		&fingerprint,
	);

	assert_eq!(
		handle.wait().await,
		Some(RescoreSummary { cache_hits: 0, scored: 2, misses: 1 })
	);
	assert_eq!(fx.oracle.model_calls.load(Ordering::SeqCst), 2);

	let cached = fx
		.service
		.caches
		.fresh_ai_score(&fingerprint, "NCT2", 7, OffsetDateTime::now_utc())
		.await
		.expect("Cache read failed.")
		.expect("Missing oracle score.");

	assert_eq!(cached.score, 64);
}

#[tokio::test]
async fn only_top_k_entries_are_rescored() {
	let fx = fixture(
		super::test_config(),
		StubOracle::new(WebhookReply::Json(json!({ "score": 70 }))),
	);
	let (profile, fingerprint) = patient("chronic neuropathy pain");
	let (immediate, handle) = fx.service.overlay.refine_top_k(
		"subject-5",
		ranked(&profile, &["NCT1", "NCT2"]),
		1,
		&profile,
		&fingerprint,
	);

	assert_eq!(immediate.len(), 2);
	assert_eq!(
		handle.wait().await,
		Some(RescoreSummary { cache_hits: 0, scored: 1, misses: 0 })
	);
	assert_eq!(fx.registry.detail_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn newer_fingerprint_aborts_running_overlay() {
	let fx = fixture(
		super::test_config(),
		StubOracle::new(WebhookReply::Slow(Duration::from_secs(30))),
	);
	let (first_profile, first) = patient("chronic neuropathy pain");
	let (second_profile, second) = patient("type 2 diabetes");

	assert_ne!(first, second);

	let (_, first_handle) = fx.service.overlay.refine_top_k(
		"subject-6",
		ranked(&first_profile, &["NCT1"]),
		15,
		&first_profile,
		&first,
	);
	let (_, second_handle) = fx.service.overlay.refine_top_k(
		"subject-6",
		ranked(&second_profile, &["NCT1"]),
		15,
		&second_profile,
		&second,
	);

	assert_eq!(first_handle.wait().await, None);

	let (_, joined) = fx.service.overlay.refine_top_k(
		"subject-6",
		ranked(&second_profile, &["NCT1"]),
		15,
		&second_profile,
		&second,
	);

	assert!(joined.is_active());
	assert_eq!(joined.wait().await, None);

	second_handle.abort();

	assert_eq!(second_handle.wait().await, None);
}

#[tokio::test]
async fn finished_runs_release_their_subject() {
	let fx = fixture(
		super::test_config(),
		StubOracle::new(WebhookReply::Json(json!({ "score": 55 }))),
	);

	for age in 20..70 {
		let (profile, fingerprint) = profile::normalize(&RawProfile {
			age: Some(age),
			primary_condition: Some("chronic neuropathy pain".to_string()),
			..Default::default()
		});
		let subject = fingerprint.to_string();
		let (_, handle) = fx.service.overlay.refine_top_k(
			&subject,
			ranked(&profile, &["NCT1"]),
			15,
			&profile,
			&fingerprint,
		);

		assert!(handle.wait().await.is_some());
	}

	assert_eq!(fx.service.overlay.tracked_subjects(), 0);
}

#[tokio::test]
async fn aborted_runs_are_dropped_on_the_next_start() {
	let fx = fixture(
		super::test_config(),
		StubOracle::new(WebhookReply::Slow(Duration::from_secs(30))),
	);
	let (first_profile, first) = patient("chronic neuropathy pain");
	let (_, handle) = fx.service.overlay.refine_top_k(
		"subject-8",
		ranked(&first_profile, &["NCT1"]),
		15,
		&first_profile,
		&first,
	);

	handle.abort();

	assert_eq!(handle.wait().await, None);

	let (second_profile, second) = patient("type 2 diabetes");
	let (_, other) = fx.service.overlay.refine_top_k(
		"subject-9",
		ranked(&second_profile, &["NCT1"]),
		15,
		&second_profile,
		&second,
	);

	assert_eq!(fx.service.overlay.tracked_subjects(), 1);

	other.abort();
}
