pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("Invalid request: {message}")]
	InvalidRequest { message: String },
	#[error("Not found: {message}")]
	NotFound { message: String },
	#[error("Provider error: {message}")]
	Provider { message: String },
	#[error("Storage error: {message}")]
	Storage { message: String },
}
impl From<scout_storage::Error> for Error {
	fn from(err: scout_storage::Error) -> Self {
		match err {
			scout_storage::Error::InvalidArgument(message) => Self::InvalidRequest { message },
			other => Self::Storage { message: other.to_string() },
		}
	}
}
impl From<scout_providers::Error> for Error {
	fn from(err: scout_providers::Error) -> Self {
		Self::Provider { message: err.to_string() }
	}
}
impl From<scout_domain::Error> for Error {
	fn from(err: scout_domain::Error) -> Self {
		match err {
			scout_domain::Error::InvalidSynonym { .. } =>
				Self::InvalidRequest { message: err.to_string() },
			scout_domain::Error::Catalog(inner) =>
				Self::Storage { message: format!("Invalid catalog data: {inner}") },
		}
	}
}
