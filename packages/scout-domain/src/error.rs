pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("Invalid synonym pattern {pattern:?}.")]
	InvalidSynonym { pattern: String, source: regex::Error },
	#[error("Catalog data is malformed.")]
	Catalog(#[from] serde_json::Error),
}
