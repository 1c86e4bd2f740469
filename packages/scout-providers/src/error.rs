pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error(transparent)]
	Reqwest(#[from] reqwest::Error),
	#[error(transparent)]
	SerdeJson(#[from] serde_json::Error),
	#[error(transparent)]
	InvalidHeaderName(#[from] reqwest::header::InvalidHeaderName),
	#[error(transparent)]
	InvalidHeaderValue(#[from] reqwest::header::InvalidHeaderValue),
	#[error("{message}")]
	InvalidConfig { message: String },
	#[error("{message}")]
	InvalidResponse { message: String },
	#[error("Request to {target} timed out after {timeout_ms} ms.")]
	Timeout { target: String, timeout_ms: u64 },
}
impl Error {
	/// The endpoint answered, but the body could not be read as a verdict.
	pub fn is_malformed_response(&self) -> bool {
		match self {
			Self::InvalidResponse { .. } | Self::SerdeJson(_) => true,
			Self::Reqwest(err) => err.is_decode(),
			_ => false,
		}
	}
}
