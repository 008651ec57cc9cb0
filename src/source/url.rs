//! Leaf source: fetches and parses the JWK set from a URL or file.

// crates.io
use async_trait::async_trait;
use url::Url;
// self
use crate::{
	_prelude::*,
	evaluator::RefreshEvaluator,
	retriever::{DefaultResourceRetriever, ResourceRetriever},
	source::JwkSetSource,
};

/// Leaf of the pipeline: retrieves the JWKS document and parses it.
///
/// Every retrieval or parse failure is transient by contract and surfaces as
/// [`Error::Unavailable`], which is what the retry and outage layers key their recovery off.
#[derive(Debug)]
pub struct UrlSource<R> {
	retriever: R,
	url: Url,
}
impl UrlSource<DefaultResourceRetriever> {
	/// Fetch from `url` with the bundled retriever and its default limits.
	pub fn new(url: Url) -> Result<Self> {
		Ok(Self::with_retriever(url, DefaultResourceRetriever::new()?))
	}
}
impl<R> UrlSource<R>
where
	R: ResourceRetriever,
{
	/// Fetch from `url` with the supplied retriever.
	pub fn with_retriever(url: Url, retriever: R) -> Self {
		Self { retriever, url }
	}
}
#[async_trait]
impl<R> JwkSetSource for UrlSource<R>
where
	R: ResourceRetriever,
{
	async fn jwk_set(
		&self,
		_evaluator: &RefreshEvaluator,
		_now: i64,
		_context: &SecurityContext,
	) -> Result<Arc<JwkSet>> {
		let bytes = self
			.retriever
			.retrieve(&self.url)
			.await
			.map_err(|error| Error::Unavailable(format!("Failed to retrieve {}: {error}", self.url)))?;
		let jwk_set: JwkSet = serde_json::from_slice(&bytes).map_err(|error| {
			Error::Unavailable(format!("Failed to parse JWK set from {}: {error}", self.url))
		})?;

		tracing::debug!(url = %self.url, keys = jwk_set.keys.len(), "fetched JWK set");

		Ok(Arc::new(jwk_set))
	}
}
