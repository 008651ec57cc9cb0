//! Single retry on transient failure.

// crates.io
use async_trait::async_trait;
// self
use crate::{
	_prelude::*,
	evaluator::RefreshEvaluator,
	events::{EventKind, Events},
	source::JwkSetSource,
};

/// Retries the inner source exactly once, with identical arguments, when it fails with the
/// transient kind. Any other failure, and a second transient one, propagates.
#[derive(Debug)]
pub struct RetryingSource<S> {
	inner: S,
	events: Events,
}
impl<S> RetryingSource<S>
where
	S: JwkSetSource,
{
	/// Wrap `inner`.
	pub fn new(inner: S, events: Events) -> Self {
		Self { inner, events }
	}
}
#[async_trait]
impl<S> JwkSetSource for RetryingSource<S>
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
			Err(error) if error.is_transient() => {
				self.events.emit(EventKind::Retrial { error: Arc::new(error) }, context);

				self.inner.jwk_set(evaluator, now, context).await
			},
			result => result,
		}
	}

	async fn close(&self) {
		self.inner.close().await
	}
}
