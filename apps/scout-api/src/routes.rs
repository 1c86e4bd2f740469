use axum::{
	Json, Router,
	extract::{Path, Query, State},
	http::StatusCode,
	response::{IntoResponse, Response},
	routing::{get, post, put},
};
use serde::{Deserialize, Serialize};

use scout_domain::{
	geo::GeoPoint,
	profile::{ProfileFingerprint, RawProfile},
};
use scout_service::{Error as ServiceError, MatchReport, MatchRequest};

use crate::state::AppState;

pub fn router(state: AppState) -> Router {
	Router::new()
		.route("/health", get(health))
		.route("/v1/matches", post(matches))
		.route("/v1/dashboard/{subject}", get(dashboard))
		.route("/v1/profiles/{subject}", put(save_profile))
		.route("/v1/geocode", get(geocode))
		.with_state(state)
}

async fn health() -> StatusCode {
	StatusCode::OK
}

async fn matches(
	State(state): State<AppState>,
	Json(payload): Json<MatchRequest>,
) -> Result<Json<MatchReport>, ApiError> {
	let report = state.service.match_profile(payload).await?;

	Ok(Json(report))
}

async fn dashboard(
	State(state): State<AppState>,
	Path(subject): Path<String>,
) -> Result<Json<MatchReport>, ApiError> {
	let report = state.service.dashboard(&subject).await?;

	Ok(Json(report))
}

#[derive(Debug, Serialize)]
pub struct SaveProfileResponse {
	pub subject: String,
	pub fingerprint: ProfileFingerprint,
}

async fn save_profile(
	State(state): State<AppState>,
	Path(subject): Path<String>,
	Json(profile): Json<RawProfile>,
) -> Result<Json<SaveProfileResponse>, ApiError> {
	let fingerprint = state.service.save_profile(&subject, &profile).await?;

	Ok(Json(SaveProfileResponse { subject, fingerprint }))
}

#[derive(Debug, Deserialize)]
pub struct GeocodeParams {
	pub q: String,
}

#[derive(Debug, Serialize)]
pub struct GeocodeResponse {
	pub query: String,
	pub point: Option<GeoPoint>,
}

async fn geocode(
	State(state): State<AppState>,
	Query(params): Query<GeocodeParams>,
) -> Result<Json<GeocodeResponse>, ApiError> {
	if params.q.trim().is_empty() {
		return Err(json_error(StatusCode::BAD_REQUEST, "invalid_request", "q must not be blank."));
	}

	let point = state.service.resolve_location(&params.q).await;

	Ok(Json(GeocodeResponse { query: params.q, point }))
}

#[derive(Debug, Serialize)]
struct ErrorBody {
	error_code: String,
	message: String,
}

#[derive(Debug)]
pub struct ApiError {
	status: StatusCode,
	error_code: String,
	message: String,
}
impl ApiError {
	fn new(status: StatusCode, error_code: impl Into<String>, message: impl Into<String>) -> Self {
		Self { status, error_code: error_code.into(), message: message.into() }
	}
}
impl From<ServiceError> for ApiError {
	fn from(err: ServiceError) -> Self {
		match err {
			ServiceError::InvalidRequest { message } =>
				json_error(StatusCode::BAD_REQUEST, "invalid_request", message),
			ServiceError::NotFound { message } =>
				json_error(StatusCode::NOT_FOUND, "not_found", message),
			ServiceError::Provider { message } => {
				tracing::error!(error = %message, "Provider failure surfaced to a request.");

				json_error(StatusCode::BAD_GATEWAY, "provider_error", message)
			},
			ServiceError::Storage { message } => {
				tracing::error!(error = %message, "Storage failure surfaced to a request.");

				json_error(StatusCode::INTERNAL_SERVER_ERROR, "storage_error", "Storage is unavailable.")
			},
		}
	}
}
impl IntoResponse for ApiError {
	fn into_response(self) -> Response {
		let body = ErrorBody { error_code: self.error_code, message: self.message };

		(self.status, Json(body)).into_response()
	}
}

pub fn json_error(status: StatusCode, code: &str, message: impl Into<String>) -> ApiError {
	ApiError::new(status, code, message)
}
