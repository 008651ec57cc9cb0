//! Time-to-live cache with blocking single-flight refresh.

// std
use std::sync::atomic::{AtomicUsize, Ordering};
// crates.io
use async_trait::async_trait;
use tokio::{
	sync::{Mutex, RwLock},
	time,
};
// self
use crate::{
	_prelude::*,
	cache::{self, CachedObject},
	evaluator::RefreshEvaluator,
	events::{EventKind, Events},
	source::JwkSetSource,
};

/// Caches the JWK set for a configured TTL and serialises refreshes so that concurrent callers
/// share a single upstream fetch.
///
/// Refresh admission is driven by the caller's [`RefreshEvaluator`]: an empty slot always loads,
/// an evaluator that rejects the cached instance loads, and an expired entry loads pinned by
/// `ReferenceComparison`, so a caller that waited on the refresh mutex re-checks against the
/// current cache and reuses a refresh that another caller completed in the meantime.
pub struct CachingSource<S> {
	inner: S,
	slot: RwLock<Option<CachedObject<Arc<JwkSet>>>>,
	refresh_lock: Mutex<()>,
	waiting: AtomicUsize,
	ttl: i64,
	refresh_timeout: i64,
	events: Events,
}
impl<S> CachingSource<S>
where
	S: JwkSetSource,
{
	/// Wrap `inner`, caching for `ttl` milliseconds and bounding contended refresh waits by
	/// `refresh_timeout` milliseconds.
	pub fn new(inner: S, ttl: i64, refresh_timeout: i64, events: Events) -> Self {
		Self {
			inner,
			slot: RwLock::new(None),
			refresh_lock: Mutex::new(()),
			waiting: AtomicUsize::new(0),
			ttl,
			refresh_timeout,
			events,
		}
	}

	/// The current cache entry, if any.
	pub(crate) async fn cached(&self) -> Option<CachedObject<Arc<JwkSet>>> {
		self.slot.read().await.clone()
	}

	/// Acquire the refresh mutex, immediately or within the refresh timeout, and refresh the
	/// cache if the evaluator still rejects what the holder left behind.
	pub(crate) async fn load(
		&self,
		evaluator: &RefreshEvaluator,
		now: i64,
		context: &SecurityContext,
	) -> Result<Arc<JwkSet>> {
		let _guard = match self.refresh_lock.try_lock() {
			Ok(guard) => guard,
			Err(_) => {
				self.events.emit(EventKind::WaitingForRefresh { queued: self.queued() }, context);
				self.waiting.fetch_add(1, Ordering::SeqCst);

				let acquired =
					time::timeout(cache::to_duration(self.refresh_timeout), self.refresh_lock.lock())
						.await;

				self.waiting.fetch_sub(1, Ordering::SeqCst);

				match acquired {
					Ok(guard) => guard,
					Err(_) => {
						self.events
							.emit(EventKind::RefreshTimedOut { queued: self.queued() }, context);

						return Err(Error::Unavailable(
							"Timeout while waiting for cache refresh".into(),
						));
					},
				}
			},
		};
		let entry = self.cached().await;
		let requires_refresh = match &entry {
			None => true,
			Some(entry) => evaluator.requires_refresh(&entry.value),
		};

		if !requires_refresh {
			// Another caller refreshed while this one waited; its result satisfies this
			// evaluator.
			return entry
				.map(|entry| entry.value)
				.ok_or_else(|| Error::Unavailable("Cache empty after refresh".into()));
		}

		self.events.emit(EventKind::RefreshInitiated { queued: self.queued() }, context);

		let set = match self.inner.jwk_set(evaluator, now, context).await {
			Ok(set) => set,
			Err(error) => {
				self.events.emit(EventKind::UnableToRefresh, context);

				return Err(error);
			},
		};

		*self.slot.write().await = Some(CachedObject::new(set.clone(), now, self.ttl));
		self.events
			.emit(EventKind::RefreshCompleted { jwk_set: set.clone(), queued: self.queued() }, context);

		Ok(set)
	}

	fn queued(&self) -> usize {
		self.waiting.load(Ordering::SeqCst)
	}
}
#[cfg(test)]
impl CachingSource<crate::source::support::ScriptedSource> {
	pub(crate) fn inner_calls(&self) -> usize {
		self.inner.calls()
	}

	pub(crate) fn inner_closed(&self) -> bool {
		self.inner.is_closed()
	}
}
#[async_trait]
impl<S> JwkSetSource for CachingSource<S>
where
	S: JwkSetSource,
{
	async fn jwk_set(
		&self,
		evaluator: &RefreshEvaluator,
		now: i64,
		context: &SecurityContext,
	) -> Result<Arc<JwkSet>> {
		let entry = self.cached().await;

		match entry {
			None => self.load(&RefreshEvaluator::NoRefresh, now, context).await,
			Some(entry) if evaluator.requires_refresh(&entry.value) =>
				self.load(evaluator, now, context).await,
			Some(entry) if entry.is_expired(now) =>
				self.load(&RefreshEvaluator::reference(entry.value), now, context).await,
			Some(entry) => Ok(entry.value),
		}
	}

	async fn close(&self) {
		self.inner.close().await
	}
}
