//! Per-call health reporting.

// crates.io
use async_trait::async_trait;
// self
use crate::{
	_prelude::*,
	evaluator::RefreshEvaluator,
	health::{HealthListener, HealthReport},
	source::JwkSetSource,
};

/// Reports every call's outcome to a health listener and passes the result through unchanged.
pub struct HealthReportingSource<S> {
	inner: S,
	listener: HealthListener,
}
impl<S> HealthReportingSource<S>
where
	S: JwkSetSource,
{
	/// Wrap `inner`, reporting to `listener`.
	pub fn new(inner: S, listener: HealthListener) -> Self {
		Self { inner, listener }
	}
}
#[async_trait]
impl<S> JwkSetSource for HealthReportingSource<S>
where
	S: JwkSetSource,
{
	async fn jwk_set(
		&self,
		evaluator: &RefreshEvaluator,
		now: i64,
		context: &SecurityContext,
	) -> Result<Arc<JwkSet>> {
		match self.inner.jwk_set(evaluator, now, context).await {
			Ok(set) => {
				(self.listener)(&HealthReport::healthy(now, context));

				Ok(set)
			},
			Err(error) => {
				let shared = Arc::new(error);

				(self.listener)(&HealthReport::unhealthy(shared.clone(), now, context));

				Err(Error::reclaim(shared))
			},
		}
	}

	async fn close(&self) {
		self.inner.close().await
	}
}
