//! Failover between two key sources.

// crates.io
use async_trait::async_trait;
// self
use crate::{
	_prelude::*,
	selector::JwkSelector,
	source::JwkSource,
};

/// Delegates to a secondary key source whenever the primary fails.
///
/// The secondary is invoked with the same selector and context; its result, or its failure,
/// becomes the call's result.
pub struct FailoverSource<P, F> {
	primary: P,
	secondary: F,
}
impl<P, F> FailoverSource<P, F>
where
	P: JwkSource,
	F: JwkSource,
{
	/// Wrap `primary`, failing over to `secondary`.
	pub fn new(primary: P, secondary: F) -> Self {
		Self { primary, secondary }
	}
}
#[async_trait]
impl<P, F> JwkSource for FailoverSource<P, F>
where
	P: JwkSource,
	F: JwkSource,
{
	async fn select(&self, selector: &JwkSelector, context: &SecurityContext) -> Result<Vec<Jwk>> {
		match self.primary.select(selector, context).await {
			Ok(keys) => Ok(keys),
			Err(error) => {
				tracing::warn!(error = %error, "primary key source failed; failing over");

				self.secondary.select(selector, context).await
			},
		}
	}

	async fn close(&self) {
		self.primary.close().await;
		self.secondary.close().await;
	}
}
