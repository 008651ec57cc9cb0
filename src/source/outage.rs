//! Outage tolerance: serve the last known good set while the upstream is failing.

// crates.io
use async_trait::async_trait;
use tokio::sync::RwLock;
// self
use crate::{
	_prelude::*,
	cache::CachedObject,
	evaluator::RefreshEvaluator,
	events::{EventKind, Events},
	source::JwkSetSource,
};

/// Keeps every successfully fetched set for a configured outage TTL and serves it when the inner
/// source fails transiently.
///
/// The served set is a clone (a fresh `Arc` over the same keys), never the stored instance. An
/// upstream evaluator may pin a set by identity; handing back the stored instance would make a
/// `ReferenceComparison` pin match and falsely report the outage serve as stale. After cloning,
/// the evaluator is re-checked against the clone: only `ForceRefresh` still demands a refresh,
/// and in that case the original failure propagates.
#[derive(Debug)]
pub struct OutageTolerantSource<S> {
	inner: S,
	outage_ttl: i64,
	cached: RwLock<Option<CachedObject<Arc<JwkSet>>>>,
	events: Events,
}
impl<S> OutageTolerantSource<S>
where
	S: JwkSetSource,
{
	/// Wrap `inner`, keeping successful fetches for `outage_ttl` milliseconds.
	pub fn new(inner: S, outage_ttl: i64, events: Events) -> Self {
		Self { inner, outage_ttl, cached: RwLock::new(None), events }
	}
}
#[async_trait]
impl<S> JwkSetSource for OutageTolerantSource<S>
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
				*self.cached.write().await =
					Some(CachedObject::new(set.clone(), now, self.outage_ttl));

				Ok(set)
			},
			Err(error) if error.is_transient() => {
				let entry = self.cached.read().await.clone();

				if let Some(entry) = entry
					&& entry.is_valid(now)
				{
					let clone = Arc::new(JwkSet { keys: entry.value.keys.clone() });

					if evaluator.requires_refresh(&clone) {
						return Err(error);
					}

					let remaining_millis = entry.remaining(now);

					tracing::warn!(
						remaining_millis,
						error = %error,
						"upstream failing; serving cached JWK set"
					);
					self.events.emit(
						EventKind::Outage { error: Arc::new(error), remaining_millis },
						context,
					);

					return Ok(clone);
				}

				Err(error)
			},
			Err(error) => Err(error),
		}
	}

	async fn close(&self) {
		self.inner.close().await
	}
}
