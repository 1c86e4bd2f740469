//! Background oracle rescoring of the top of a ranked list.

use std::{
	collections::HashMap,
	fmt::Write as _,
	sync::{
		Arc, Mutex, PoisonError,
		atomic::{AtomicU64, AtomicUsize, Ordering},
	},
	time::Duration,
};

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use tokio::{
	sync::broadcast,
	task::{AbortHandle, JoinHandle, JoinSet},
};

use scout_config::Config;
use scout_domain::{
	profile::{NormalizedProfile, ProfileFingerprint},
	ranking::RankedMatch,
	rationale, scoring,
	trial::TrialDetail,
};
use scout_providers::oracle::{OracleRequest, OracleVerdict};

use crate::{Caches, Providers, cache::AiScoreEntry};

const EVENT_CAPACITY: usize = 256;
const MAX_ELIGIBILITY_GRAPHEMES: usize = 2_000;
const MAX_SUMMARY_GRAPHEMES: usize = 600;
const PROMPT_GUIDANCE: &str = "Rate from 0 to 100 how well this patient fits the trial. Weigh the \
condition match and the stated eligibility criteria most. Treat any clear exclusion as a score \
below 20. Unknown facts are neutral. Reply with JSON {\"score\": <integer>, \"rationale\": <one \
short sentence>}.";

/// Published once per trial whose oracle score became available.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct RescoreEvent {
	pub fingerprint: ProfileFingerprint,
	pub trial_id: String,
	pub score: u8,
	pub rationale: Option<String>,
}

#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct RescoreSummary {
	pub cache_hits: usize,
	pub scored: usize,
	pub misses: usize,
}
impl RescoreSummary {
	fn absorb(&mut self, other: Self) {
		self.cache_hits += other.cache_hits;
		self.scored += other.scored;
		self.misses += other.misses;
	}
}

/// Handle to one background run. Dropping it leaves the run going.
#[derive(Debug)]
pub struct RescoreHandle {
	task: Option<JoinHandle<RescoreSummary>>,
	in_flight: bool,
}
impl RescoreHandle {
	fn idle() -> Self {
		Self { task: None, in_flight: false }
	}

	/// True when a run for this fingerprint is going, whether started here or earlier.
	pub fn is_active(&self) -> bool {
		self.in_flight
	}

	/// Waits for the run started by this call. `None` when nothing was started or the run was
	/// aborted.
	pub async fn wait(self) -> Option<RescoreSummary> {
		self.task?.await.ok()
	}

	pub fn abort(&self) {
		if let Some(task) = self.task.as_ref() {
			task.abort();
		}
	}
}

struct ActiveRun {
	run_id: u64,
	fingerprint: ProfileFingerprint,
	abort: AbortHandle,
}

type ActiveRuns = Arc<Mutex<HashMap<String, ActiveRun>>>;

#[derive(Clone)]
pub struct RescoringOverlay {
	cfg: Arc<Config>,
	providers: Providers,
	caches: Caches,
	events: broadcast::Sender<RescoreEvent>,
	active: ActiveRuns,
	next_run_id: Arc<AtomicU64>,
}
impl RescoringOverlay {
	pub fn new(cfg: Arc<Config>, providers: Providers, caches: Caches) -> Self {
		let (events, _) = broadcast::channel(EVENT_CAPACITY);

		Self {
			cfg,
			providers,
			caches,
			events,
			active: Arc::new(Mutex::new(HashMap::new())),
			next_run_id: Arc::new(AtomicU64::new(0)),
		}
	}

	pub fn subscribe(&self) -> broadcast::Receiver<RescoreEvent> {
		self.events.subscribe()
	}

	/// Subjects with a tracked run. Finished runs release their entry.
	pub fn tracked_subjects(&self) -> usize {
		self.active.lock().unwrap_or_else(PoisonError::into_inner).len()
	}

	/// A webhook, or a model in a trusted context, is configured.
	pub fn oracle_configured(&self) -> bool {
		let oracle = &self.cfg.providers.oracle;

		oracle.webhook_url.is_some() || (self.cfg.rescoring.trusted_context && oracle.model.is_some())
	}

	/// Returns `ranked` untouched and starts rescoring its first `k` entries in the background.
	///
	/// A newer fingerprint for the same subject aborts the older run. A repeated request for the
	/// fingerprint already being rescored joins it instead of starting another.
	pub fn refine_top_k(
		&self,
		subject: &str,
		ranked: Vec<RankedMatch>,
		k: usize,
		profile: &NormalizedProfile,
		fingerprint: &ProfileFingerprint,
	) -> (Vec<RankedMatch>, RescoreHandle) {
		let top: Vec<RankedMatch> = ranked.iter().take(k).cloned().collect();

		if top.is_empty() {
			return (ranked, RescoreHandle::idle());
		}
		if !self.oracle_configured() {
			tracing::debug!(subject, "No oracle configured. Skipping rescoring.");

			return (ranked, RescoreHandle::idle());
		}

		let mut active = self.active.lock().unwrap_or_else(PoisonError::into_inner);

		if let Some(run) = active.get(subject)
			&& !run.abort.is_finished()
		{
			if run.fingerprint == *fingerprint {
				return (ranked, RescoreHandle { task: None, in_flight: true });
			}

			tracing::debug!(subject, superseded = %run.fingerprint, "Aborting superseded rescoring run.");

			run.abort.abort();
		}

		let run = RescoreRun {
			cfg: self.cfg.clone(),
			providers: self.providers.clone(),
			caches: self.caches.clone(),
			events: self.events.clone(),
			profile: Arc::new(profile.clone()),
			fingerprint: fingerprint.clone(),
		};
		let run_id = self.next_run_id.fetch_add(1, Ordering::Relaxed);
		let registry = self.active.clone();
		let key = subject.to_string();
		let task = tokio::spawn(async move {
			let summary = run.execute(top).await;

			release(&registry, &key, run_id);

			summary
		});

		// Aborted runs never reach `release`.
		active.retain(|_, run| !run.abort.is_finished());
		active.insert(
			subject.to_string(),
			ActiveRun { run_id, fingerprint: fingerprint.clone(), abort: task.abort_handle() },
		);

		(ranked, RescoreHandle { task: Some(task), in_flight: true })
	}
}

fn release(active: &ActiveRuns, subject: &str, run_id: u64) {
	let mut active = active.lock().unwrap_or_else(PoisonError::into_inner);

	if active.get(subject).is_some_and(|run| run.run_id == run_id) {
		active.remove(subject);
	}
}

#[derive(Clone)]
struct RescoreRun {
	cfg: Arc<Config>,
	providers: Providers,
	caches: Caches,
	events: broadcast::Sender<RescoreEvent>,
	profile: Arc<NormalizedProfile>,
	fingerprint: ProfileFingerprint,
}
impl RescoreRun {
	async fn execute(self, items: Vec<RankedMatch>) -> RescoreSummary {
		let items = Arc::new(items);
		let cursor = Arc::new(AtomicUsize::new(0));
		let workers = (self.cfg.rescoring.workers as usize).clamp(1, items.len());
		let mut set = JoinSet::new();

		for _ in 0..workers {
			let run = self.clone();
			let items = items.clone();
			let cursor = cursor.clone();

			set.spawn(async move {
				let mut summary = RescoreSummary::default();

				loop {
					let index = cursor.fetch_add(1, Ordering::Relaxed);
					let Some(item) = items.get(index) else {
						break;
					};

					match run.rescore(item).await {
						Outcome::CacheHit => summary.cache_hits += 1,
						Outcome::Scored => summary.scored += 1,
						Outcome::Miss => summary.misses += 1,
					}
				}

				summary
			});
		}

		let mut summary = RescoreSummary::default();

		while let Some(joined) = set.join_next().await {
			match joined {
				Ok(worker) => summary.absorb(worker),
				Err(err) => tracing::warn!(error = %err, "Rescoring worker failed."),
			}
		}

		tracing::info!(
			fingerprint = %self.fingerprint,
			cache_hits = summary.cache_hits,
			scored = summary.scored,
			misses = summary.misses,
			"Rescoring run finished."
		);

		summary
	}

	async fn rescore(&self, item: &RankedMatch) -> Outcome {
		let trial_id = item.trial.id.as_str();
		let now = OffsetDateTime::now_utc();

		match self
			.caches
			.fresh_ai_score(&self.fingerprint, trial_id, self.cfg.rescoring.cache_ttl_days, now)
			.await
		{
			Ok(Some(entry)) => {
				self.publish(trial_id, entry.score, entry.rationale);

				return Outcome::CacheHit;
			},
			Ok(None) => {},
			Err(err) => {
				tracing::warn!(error = %err, trial_id, "Oracle score cache read failed.");
			},
		}

		let detail = match self
			.providers
			.registry
			.get_by_identifier(&self.cfg.providers.registry, trial_id)
			.await
		{
			Ok(Some(detail)) => detail,
			Ok(None) => {
				tracing::debug!(trial_id, "Trial detail not found.");

				return Outcome::Miss;
			},
			Err(err) => {
				tracing::warn!(error = %err, trial_id, "Trial detail fetch failed.");

				return Outcome::Miss;
			},
		};
		let request = OracleRequest {
			fingerprint: self.fingerprint.to_string(),
			trial_id: trial_id.to_string(),
			prompt: build_prompt(&self.profile, &detail),
		};
		let Some(verdict) = self.ask_oracle(&request).await else {
			return Outcome::Miss;
		};
		let entry = AiScoreEntry {
			score: scoring::clamp_score(verdict.score),
			rationale: verdict
				.rationale
				.as_deref()
				.map(str::trim)
				.filter(|text| !text.is_empty())
				.map(|text| rationale::truncate(text, rationale::MAX_RATIONALE_GRAPHEMES)),
			scored_at: OffsetDateTime::now_utc(),
		};

		if let Err(err) = self.caches.put_ai_score(&self.fingerprint, trial_id, &entry).await {
			tracing::warn!(error = %err, trial_id, "Oracle score cache write failed.");
		}

		self.publish(trial_id, entry.score, entry.rationale);

		Outcome::Scored
	}

	async fn ask_oracle(&self, request: &OracleRequest) -> Option<OracleVerdict> {
		let oracle_cfg = &self.cfg.providers.oracle;

		if let Some(url) = oracle_cfg.webhook_url.as_deref() {
			match self.ask_webhook(url, request).await {
				WebhookOutcome::Verdict(verdict) => return Some(verdict),
				WebhookOutcome::Malformed => return None,
				WebhookOutcome::Unavailable => {},
			}
		}

		let model = oracle_cfg.model.as_ref().filter(|_| self.cfg.rescoring.trusted_context)?;

		match self.providers.oracle.score_via_model(model, request).await {
			Ok(verdict) => Some(verdict),
			Err(err) => {
				tracing::warn!(error = %err, trial_id = %request.trial_id, "Oracle model call failed.");

				None
			},
		}
	}

	/// One retry after a fixed backoff. Two transport failures mark the endpoint unhealthy. A
	/// malformed answer is not retried and keeps the endpoint healthy.
	async fn ask_webhook(&self, url: &str, request: &OracleRequest) -> WebhookOutcome {
		let oracle_cfg = &self.cfg.providers.oracle;

		match self
			.caches
			.webhook_suppressed(url, oracle_cfg.health_suppress_minutes, OffsetDateTime::now_utc())
			.await
		{
			Ok(true) => {
				tracing::debug!(url, "Oracle webhook suppressed after a recent failure.");

				return WebhookOutcome::Unavailable;
			},
			Ok(false) => {},
			Err(err) => tracing::warn!(error = %err, url, "Webhook health read failed."),
		}

		for attempt in 0..2 {
			if attempt > 0 {
				tokio::time::sleep(Duration::from_millis(oracle_cfg.retry_backoff_ms)).await;
			}

			match self.providers.oracle.score_via_webhook(oracle_cfg, url, request).await {
				Ok(verdict) => {
					self.mark_webhook(url, true).await;

					return WebhookOutcome::Verdict(verdict);
				},
				Err(err) if err.is_malformed_response() => {
					tracing::warn!(
						error = %err,
						url,
						trial_id = %request.trial_id,
						"Oracle webhook returned a malformed verdict."
					);

					self.mark_webhook(url, true).await;

					return WebhookOutcome::Malformed;
				},
				Err(err) => {
					tracing::warn!(
						error = %err,
						url,
						attempt,
						trial_id = %request.trial_id,
						"Oracle webhook call failed."
					);
				},
			}
		}

		self.mark_webhook(url, false).await;

		WebhookOutcome::Unavailable
	}

	async fn mark_webhook(&self, url: &str, healthy: bool) {
		if let Err(err) = self.caches.mark_webhook(url, healthy, OffsetDateTime::now_utc()).await {
			tracing::warn!(error = %err, url, "Webhook health write failed.");
		}
	}

	fn publish(&self, trial_id: &str, score: u8, rationale: Option<String>) {
		// Sending only fails when nobody is listening.
		let _ = self.events.send(RescoreEvent {
			fingerprint: self.fingerprint.clone(),
			trial_id: trial_id.to_string(),
			score,
			rationale,
		});
	}
}

enum Outcome {
	CacheHit,
	Scored,
	Miss,
}

enum WebhookOutcome {
	Verdict(OracleVerdict),
	Malformed,
	Unavailable,
}

/// Patient facts, trial facts, then scoring guidance.
pub fn build_prompt(profile: &NormalizedProfile, detail: &TrialDetail) -> String {
	let mut prompt = String::from("Patient:\n");

	push_fact(&mut prompt, "Age", profile.age.map(|age| age.to_string()));
	push_fact(&mut prompt, "Gender", profile.gender.clone());
	push_fact(&mut prompt, "Primary condition", profile.primary_condition.clone());
	push_fact(&mut prompt, "Medications", joined(profile.medications.iter()));
	push_fact(&mut prompt, "Allergies", joined(profile.allergies.iter()));
	push_fact(&mut prompt, "Additional notes", profile.additional_notes.clone());
	push_fact(&mut prompt, "Location preference", profile.location_preference.clone());

	prompt.push_str("\nTrial:\n");

	push_fact(&mut prompt, "Identifier", Some(detail.nct_id.clone()));
	push_fact(&mut prompt, "Title", Some(detail.title.clone()));
	push_fact(&mut prompt, "Conditions", joined(detail.conditions.iter()));
	push_fact(&mut prompt, "Interventions", joined(detail.interventions.iter()));
	push_fact(&mut prompt, "Minimum age", detail.minimum_age.clone());
	push_fact(&mut prompt, "Maximum age", detail.maximum_age.clone());
	push_fact(&mut prompt, "Sex", detail.sex.clone());
	push_fact(
		&mut prompt,
		"Summary",
		detail.summary.as_deref().map(|text| rationale::truncate(text, MAX_SUMMARY_GRAPHEMES)),
	);
	push_fact(
		&mut prompt,
		"Eligibility criteria",
		detail
			.eligibility_criteria
			.as_deref()
			.map(|text| rationale::truncate(text, MAX_ELIGIBILITY_GRAPHEMES)),
	);

	prompt.push('\n');
	prompt.push_str(PROMPT_GUIDANCE);

	prompt
}

fn push_fact(prompt: &mut String, label: &str, value: Option<String>) {
	let value = value.as_deref().map(str::trim).filter(|value| !value.is_empty());

	let _ = writeln!(prompt, "- {label}: {}", value.unwrap_or("unknown"));
}

fn joined<'a>(values: impl Iterator<Item = &'a String>) -> Option<String> {
	let values: Vec<&str> = values.map(String::as_str).collect();

	if values.is_empty() { None } else { Some(values.join(", ")) }
}
