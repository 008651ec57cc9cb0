//! Resource retrieval contract and the bundled HTTP/file implementation.

// std
use std::time::Duration;
// crates.io
use async_trait::async_trait;
use reqwest::Client;
use url::Url;
// self
use crate::_prelude::*;

/// Default connect timeout for the bundled retriever.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_millis(500);
/// Default read timeout for the bundled retriever.
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_millis(500);
/// Default response size guard (50 KiB).
pub const DEFAULT_SIZE_LIMIT: u64 = 50 * 1024;

/// Fetches raw JWKS documents on behalf of the leaf source.
#[async_trait]
pub trait ResourceRetriever: Send + Sync {
	/// Retrieve the document at `url`.
	async fn retrieve(&self, url: &Url) -> Result<Vec<u8>>;
}

/// Retriever backed by `reqwest` for HTTP(S) URLs and `tokio::fs` for `file://` URLs.
#[derive(Clone, Debug)]
pub struct DefaultResourceRetriever {
	client: Client,
	read_timeout: Duration,
	size_limit: u64,
}
impl DefaultResourceRetriever {
	/// Build a retriever with the default timeouts and size guard.
	pub fn new() -> Result<Self> {
		Self::with_limits(DEFAULT_CONNECT_TIMEOUT, DEFAULT_READ_TIMEOUT, DEFAULT_SIZE_LIMIT)
	}

	/// Build a retriever with explicit connect/read timeouts and response size guard.
	pub fn with_limits(
		connect_timeout: Duration,
		read_timeout: Duration,
		size_limit: u64,
	) -> Result<Self> {
		let client = Client::builder()
			.connect_timeout(connect_timeout)
			.user_agent(format!("jwks-source/{}", env!("CARGO_PKG_VERSION")))
			.build()?;

		Ok(Self { client, read_timeout, size_limit })
	}

	async fn retrieve_http(&self, url: &Url) -> Result<Vec<u8>> {
		let response = self
			.client
			.get(url.clone())
			.header("accept", "application/json")
			.timeout(self.read_timeout)
			.send()
			.await?;
		let status = response.status();

		if !status.is_success() {
			return Err(Error::HttpStatus { status, url: url.clone() });
		}
		if let Some(length) = response.content_length()
			&& length > self.size_limit
		{
			return Err(self.size_exceeded(length));
		}

		let bytes = response.bytes().await?;

		// The declared length is advisory; enforce the guard on the body actually received.
		if bytes.len() as u64 > self.size_limit {
			return Err(self.size_exceeded(bytes.len() as u64));
		}

		tracing::debug!(url = %url, status = %status, bytes = bytes.len(), "retrieved resource");

		Ok(bytes.to_vec())
	}

	async fn retrieve_file(&self, url: &Url) -> Result<Vec<u8>> {
		let path = url.to_file_path().map_err(|()| Error::Validation {
			field: "url",
			reason: format!("'{url}' is not a valid file path."),
		})?;
		let bytes = tokio::fs::read(&path).await?;

		if bytes.len() as u64 > self.size_limit {
			return Err(self.size_exceeded(bytes.len() as u64));
		}

		Ok(bytes)
	}

	fn size_exceeded(&self, size: u64) -> Error {
		Error::Validation {
			field: "size_limit",
			reason: format!(
				"Response size {size} bytes exceeds the configured guard of {limit} bytes.",
				limit = self.size_limit
			),
		}
	}
}
#[async_trait]
impl ResourceRetriever for DefaultResourceRetriever {
	async fn retrieve(&self, url: &Url) -> Result<Vec<u8>> {
		match url.scheme() {
			"file" => self.retrieve_file(url).await,
			_ => self.retrieve_http(url).await,
		}
	}
}
