//! Caching source that proactively refreshes ahead of expiry.

// std
use std::{
	future::Future,
	pin::Pin,
	sync::{
		Mutex as StdMutex,
		atomic::{AtomicI64, Ordering},
	},
};
// crates.io
use async_trait::async_trait;
use tokio::{sync::Mutex, task::JoinHandle, time};
// self
use crate::{
	_prelude::*,
	cache::{self, CachedObject},
	evaluator::RefreshEvaluator,
	events::{EventKind, Events},
	source::{JwkSetSource, caching::CachingSource},
};

/// Extends [`CachingSource`] with proactive refresh: when a served entry is close to expiry, a
/// background task replaces it so foreground requests never pay the fetch latency.
///
/// The foreground request always returns the current entry immediately. One background refresh is
/// dispatched per cache generation, gated by an expiration marker under a non-blocking lock;
/// failures reset the marker so a later request can try again. With `scheduled` enabled a
/// one-shot task is additionally armed ahead of each generation's refresh window, keeping the
/// cache warm without foreground traffic.
pub struct RefreshAheadSource<S> {
	shared: Arc<Shared<S>>,
}
struct Shared<S> {
	caching: CachingSource<S>,
	refresh_ahead_time: i64,
	refresh_timeout: i64,
	scheduled: bool,
	/// Highest cache expiration a background refresh has been dispatched for.
	expiration_marker: AtomicI64,
	/// Cache expiration the current one-shot task is armed for.
	armed_for: AtomicI64,
	lazy_lock: StdMutex<()>,
	refresh_task: Mutex<Option<JoinHandle<()>>>,
	scheduled_task: Mutex<Option<JoinHandle<()>>>,
	events: Events,
}
impl<S> RefreshAheadSource<S>
where
	S: JwkSetSource + 'static,
{
	/// Wrap `inner`, caching for `ttl` milliseconds and refreshing `refresh_ahead_time`
	/// milliseconds ahead of expiry.
	///
	/// Fails when `refresh_ahead_time + refresh_timeout` exceeds `ttl`: the refresh window must
	/// fit inside a generation's lifetime, or the background refresh could not complete before
	/// the entry it replaces has already expired.
	pub fn new(
		inner: S,
		ttl: i64,
		refresh_timeout: i64,
		refresh_ahead_time: i64,
		scheduled: bool,
		events: Events,
	) -> Result<Self> {
		if refresh_ahead_time.saturating_add(refresh_timeout) > ttl {
			return Err(Error::Validation {
				field: "refresh_ahead_time",
				reason: format!(
					"Refresh-ahead time plus cache refresh timeout ({} ms) must not exceed the \
					 cache time-to-live ({ttl} ms).",
					refresh_ahead_time.saturating_add(refresh_timeout)
				),
			});
		}

		Ok(Self {
			shared: Arc::new(Shared {
				caching: CachingSource::new(inner, ttl, refresh_timeout, events.clone()),
				refresh_ahead_time,
				refresh_timeout,
				scheduled,
				expiration_marker: AtomicI64::new(i64::MIN),
				armed_for: AtomicI64::new(i64::MIN),
				lazy_lock: StdMutex::new(()),
				refresh_task: Mutex::new(None),
				scheduled_task: Mutex::new(None),
				events,
			}),
		})
	}
}
impl<S> Shared<S>
where
	S: JwkSetSource + 'static,
{
	/// Dispatch at most one background refresh per cache generation.
	fn refresh_ahead_of_expiration(
		self: Arc<Self>,
		entry: &CachedObject<Arc<JwkSet>>,
		scheduled_run: bool,
		context: &SecurityContext,
	) -> Pin<Box<dyn Future<Output = ()> + Send>> {
		let entry = entry.clone();
		let context = context.clone();

		Box::pin(async move {
			if self.expiration_marker.load(Ordering::SeqCst) >= entry.expiration {
				return;
			}

			// The guard covers the marker check and the dispatch decision only; it is released
			// before any await.
			let handle = {
				// Non-blocking: a concurrent caller is already making this decision.
				let Ok(_guard) = self.lazy_lock.try_lock() else { return };

				if self.expiration_marker.load(Ordering::SeqCst) >= entry.expiration {
					return;
				}

				self.expiration_marker.store(entry.expiration, Ordering::SeqCst);

				let shared = self.clone();
				let task_context = context.clone();
				let fut: Pin<Box<dyn Future<Output = ()> + Send>> = Box::pin(async move {
					shared.run_background_refresh(task_context, scheduled_run).await;
				});

				tokio::spawn(fut)
			};

			*self.refresh_task.lock().await = Some(handle);
		})
	}

	async fn run_background_refresh(self: Arc<Self>, context: SecurityContext, scheduled_run: bool) {
		self.events.emit(EventKind::ScheduledRefreshInitiated, &context);

		// Background work cannot be driven by a caller's synthetic clock.
		let now = cache::now_millis();

		match self.caching.load(&RefreshEvaluator::ForceRefresh, now, &context).await {
			Ok(set) => {
				self.events.emit(EventKind::ScheduledRefreshCompleted { jwk_set: set }, &context);

				if self.scheduled
					&& let Some(entry) = self.caching.cached().await
				{
					self.clone().arm_scheduled_refresh(&entry, &context).await;
				}
			},
			Err(error) => {
				// Let a later request dispatch another attempt for this generation.
				self.expiration_marker.store(i64::MIN, Ordering::SeqCst);

				if scheduled_run {
					self.armed_for.store(i64::MIN, Ordering::SeqCst);
					self.events
						.emit(EventKind::ScheduledRefreshFailed { error: Arc::new(error) }, &context);
				} else {
					self.events.emit(EventKind::UnableToRefreshAheadOfExpiration, &context);
				}
			},
		}
	}

	/// Arm a one-shot refresh ahead of the generation's refresh window, cancelling the previous
	/// one. The fired task funnels through the same per-generation gate as the lazy path.
	async fn arm_scheduled_refresh(
		self: Arc<Self>,
		entry: &CachedObject<Arc<JwkSet>>,
		context: &SecurityContext,
	) {
		if self.armed_for.load(Ordering::SeqCst) >= entry.expiration {
			return;
		}

		self.armed_for.store(entry.expiration, Ordering::SeqCst);

		let fire_at = entry
			.expiration
			.saturating_sub(self.refresh_ahead_time)
			.saturating_sub(self.refresh_timeout);
		let delay = fire_at.saturating_sub(cache::now_millis());

		if delay < 0 {
			// The window has already passed; the lazy path picks up the slack.
			self.events.emit(EventKind::RefreshNotScheduled, context);

			return;
		}

		self.events.emit(EventKind::RefreshScheduled { at: fire_at }, context);

		let shared = self.clone();
		let task_context = context.clone();
		let fut: Pin<Box<dyn Future<Output = ()> + Send>> = Box::pin(async move {
			time::sleep(cache::to_duration(delay)).await;

			if let Some(entry) = shared.caching.cached().await {
				shared.clone().refresh_ahead_of_expiration(&entry, true, &task_context).await;
			}
		});
		let handle = tokio::spawn(fut);
		let mut slot = self.scheduled_task.lock().await;

		if let Some(previous) = slot.replace(handle) {
			previous.abort();
		}
	}
}
#[async_trait]
impl<S> JwkSetSource for RefreshAheadSource<S>
where
	S: JwkSetSource + 'static,
{
	async fn jwk_set(
		&self,
		evaluator: &RefreshEvaluator,
		now: i64,
		context: &SecurityContext,
	) -> Result<Arc<JwkSet>> {
		let set = self.shared.caching.jwk_set(evaluator, now, context).await?;

		if let Some(entry) = self.shared.caching.cached().await {
			if !entry.is_expired(now) && entry.remaining(now) <= self.shared.refresh_ahead_time {
				self.shared.clone().refresh_ahead_of_expiration(&entry, false, context).await;
			}
			if self.shared.scheduled {
				self.shared.clone().arm_scheduled_refresh(&entry, context).await;
			}
		}

		Ok(set)
	}

	async fn close(&self) {
		for slot in [&self.shared.scheduled_task, &self.shared.refresh_task] {
			if let Some(task) = slot.lock().await.take() {
				task.abort();

				let _ = time::timeout(cache::to_duration(self.shared.refresh_timeout), task).await;
			}
		}

		self.shared.caching.close().await;
	}
}
