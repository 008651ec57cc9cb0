//! Crate-wide error types and `Result` alias.

// std
use std::sync::Arc;

/// Library-wide result type.
pub type Result<T> = std::result::Result<T, Error>;

/// Unified error type for the JWK set resolution pipeline.
///
/// [`Error::Unavailable`] is the transient kind: the leaf raises it for network, HTTP status, and
/// parse failures, and the retry and outage layers key their recovery off it. Every other variant
/// surfaces to the application unchanged.
#[allow(missing_docs)]
#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error(transparent)]
	Io(#[from] std::io::Error),

	#[error(transparent)]
	Http(#[from] reqwest::Error),
	#[error(transparent)]
	Json(#[from] serde_json::Error),
	#[error(transparent)]
	Url(#[from] url::ParseError),

	#[error("Upstream HTTP status {status} from {url}.")]
	HttpStatus { status: http::StatusCode, url: url::Url },
	#[error("JWK set unavailable: {0}")]
	Unavailable(String),
	#[error("Rate limit exceeded; next window opens in {retry_in_ms} ms.")]
	RateLimited { retry_in_ms: i64 },
	#[error("Validation failed for {field}: {reason}")]
	Validation { field: &'static str, reason: String },
}
impl Error {
	/// Whether the retry and outage layers may recover from this failure.
	pub fn is_transient(&self) -> bool {
		matches!(self, Self::Unavailable(_))
	}

	/// Recover ownership of an error that was shared with a listener.
	///
	/// Falls back to a transient rendering when the listener retained a clone.
	pub(crate) fn reclaim(shared: Arc<Error>) -> Error {
		Arc::try_unwrap(shared).unwrap_or_else(|shared| Error::Unavailable(shared.to_string()))
	}
}
