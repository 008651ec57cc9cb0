//! Application-facing key selection over a JWK set source.

// crates.io
use async_trait::async_trait;
// self
use crate::{
	_prelude::*,
	cache,
	evaluator::RefreshEvaluator,
	selector::JwkSelector,
	source::{JwkSetSource, JwkSource},
};

/// Converts a [`JwkSetSource`] into a [`JwkSource`] with the miss-driven refresh protocol.
///
/// A lookup first accepts whatever the stack serves (`NoRefresh`). When nothing matches, which
/// is the typical signature of a freshly rotated key-id, the stack is asked once more with a
/// `ReferenceComparison` pin on the set just observed, so the caching layer refreshes exactly
/// that instance and a concurrent refresh is reused for free. The rate limiter bounds how often
/// unknown key-ids can drive this second query upstream.
pub struct SelectingSource<S> {
	source: S,
}
impl<S> SelectingSource<S>
where
	S: JwkSetSource,
{
	/// Wrap `source`.
	pub fn new(source: S) -> Self {
		Self { source }
	}
}
#[async_trait]
impl<S> JwkSource for SelectingSource<S>
where
	S: JwkSetSource,
{
	async fn select(&self, selector: &JwkSelector, context: &SecurityContext) -> Result<Vec<Jwk>> {
		let now = cache::now_millis();
		let set = self.source.jwk_set(&RefreshEvaluator::NoRefresh, now, context).await?;
		let matches = selector.select(&set);

		if !matches.is_empty() {
			return Ok(matches);
		}

		tracing::debug!("no key matched the cached set; requesting an invalidating refresh");

		let set = match self.source.jwk_set(&RefreshEvaluator::reference(set), now, context).await {
			Ok(set) => set,
			// The re-query budget for this interval is spent. The key is unknown as far as this
			// window is concerned; report "no match" rather than an error.
			Err(Error::RateLimited { .. }) => return Ok(Vec::new()),
			Err(error) => return Err(error),
		};

		Ok(selector.select(&set))
	}

	async fn close(&self) {
		self.source.close().await
	}
}

#[cfg(test)]
mod tests {
	// std
	use std::sync::atomic::Ordering;
	// self
	use super::*;
	use crate::{
		events::{Events, SourceKind},
		source::{
			caching::CachingSource,
			rate_limit::RateLimitedSource,
			support::{ScriptedSource, Step, jwk_set},
		},
	};

	#[tokio::test]
	async fn a_match_against_the_first_answer_needs_no_second_query() {
		let source = SelectingSource::new(ScriptedSource::new([Step::Set(jwk_set(&["a"]))]));
		let keys = source
			.select(&JwkSelector::by_key_id("a"), &SecurityContext::empty())
			.await
			.expect("select");

		assert_eq!(keys.len(), 1);
		assert_eq!(source.source.calls(), 1);
	}

	#[tokio::test]
	async fn a_miss_requeries_with_a_pin_on_the_observed_set() {
		let observed = jwk_set(&["a"]);
		let rotated = jwk_set(&["b"]);
		let source = SelectingSource::new(ScriptedSource::new([
			Step::Set(observed.clone()),
			Step::Set(rotated),
		]));
		let keys = source
			.select(&JwkSelector::by_key_id("b"), &SecurityContext::empty())
			.await
			.expect("select");

		assert_eq!(keys.len(), 1);
		assert_eq!(keys[0].common.key_id.as_deref(), Some("b"));
		assert_eq!(source.source.calls(), 2);

		match source.source.last_evaluator() {
			Some(RefreshEvaluator::ReferenceComparison(pinned)) =>
				assert!(Arc::ptr_eq(&pinned, &observed)),
			other => panic!("expected reference comparison, got {other:?}"),
		}
	}

	#[tokio::test]
	async fn a_rate_limited_requery_reports_no_match() {
		// Cache + rate limiter, as assembled by the builder: two upstream calls are admitted per
		// interval, so repeated lookups for an unknown key-id drain the bucket and then resolve
		// to "no match" without touching the upstream again.
		let scripted = ScriptedSource::new([Step::Set(jwk_set(&["a"]))]);
		let upstream_calls = scripted.counter();
		let inner =
			RateLimitedSource::new(scripted, 30_000, Events::new(SourceKind::RateLimit, None));
		let source = SelectingSource::new(CachingSource::new(
			inner,
			300_000,
			15_000,
			Events::new(SourceKind::Caching, None),
		));
		let context = SecurityContext::empty();

		for _ in 0..5 {
			let keys = source
				.select(&JwkSelector::by_key_id("unknown"), &context)
				.await
				.expect("select resolves to no match");

			assert!(keys.is_empty());
		}

		// Initial load plus one miss-driven refresh; the storm never amplified further.
		assert_eq!(upstream_calls.load(Ordering::SeqCst), 2);

		let keys = source.select(&JwkSelector::by_key_id("a"), &context).await.expect("select");

		assert_eq!(keys.len(), 1);
	}

	#[tokio::test]
	async fn a_rate_limited_first_query_surfaces_the_refusal() {
		struct RefusingSource;
		#[async_trait]
		impl JwkSetSource for RefusingSource {
			async fn jwk_set(
				&self,
				_evaluator: &RefreshEvaluator,
				_now: i64,
				_context: &SecurityContext,
			) -> Result<Arc<JwkSet>> {
				Err(Error::RateLimited { retry_in_ms: 1_000 })
			}
		}

		let source = SelectingSource::new(RefusingSource);
		let error = source
			.select(&JwkSelector::by_key_id("a"), &SecurityContext::empty())
			.await
			.expect_err("refusal on the first query must surface");

		assert!(matches!(error, Error::RateLimited { .. }));
	}

	#[tokio::test]
	async fn close_forwards_to_the_stack() {
		let source = SelectingSource::new(ScriptedSource::new([Step::Set(jwk_set(&["a"]))]));

		source.close().await;

		assert!(source.source.is_closed());
	}
}
