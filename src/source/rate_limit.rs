//! Token-bucket rate limiting of upstream queries.

// std
use std::sync::Mutex;
// crates.io
use async_trait::async_trait;
// self
use crate::{
	_prelude::*,
	evaluator::RefreshEvaluator,
	events::{EventKind, Events},
	source::JwkSetSource,
};

/// Admits at most two calls per `min_interval` to the inner source.
///
/// Under steady-state operation the time-based cache triggers at most one refresh per interval;
/// the second token accommodates one rotation-driven re-query (or a concurrent refresh-ahead
/// task) without penalty. A third call within the interval indicates pathological behaviour,
/// typically a storm of lookups for an unknown key-id, and is refused with the distinct
/// [`Error::RateLimited`] kind so callers can tell the refusal apart from an outage.
#[derive(Debug)]
pub struct RateLimitedSource<S> {
	inner: S,
	min_interval: i64,
	state: Mutex<RateLimitState>,
	events: Events,
}
#[derive(Debug)]
struct RateLimitState {
	next_opening: i64,
	counter: u32,
}
impl<S> RateLimitedSource<S>
where
	S: JwkSetSource,
{
	/// Wrap `inner`, admitting two calls per `min_interval` milliseconds.
	pub fn new(inner: S, min_interval: i64, events: Events) -> Self {
		Self {
			inner,
			min_interval,
			state: Mutex::new(RateLimitState { next_opening: i64::MIN, counter: 0 }),
			events,
		}
	}
}
#[async_trait]
impl<S> JwkSetSource for RateLimitedSource<S>
where
	S: JwkSetSource,
{
	async fn jwk_set(
		&self,
		evaluator: &RefreshEvaluator,
		now: i64,
		context: &SecurityContext,
	) -> Result<Arc<JwkSet>> {
		{
			let mut state = self.state.lock().expect("lock");

			if now >= state.next_opening {
				state.next_opening = now.saturating_add(self.min_interval);
				// One token consumed by this call; one left for the interval.
				state.counter = 1;
			} else if state.counter > 0 {
				state.counter -= 1;
			} else {
				let retry_in_ms = state.next_opening.saturating_sub(now);

				drop(state);
				self.events.emit(EventKind::RateLimited { retry_in_ms }, context);

				return Err(Error::RateLimited { retry_in_ms });
			}
		}

		self.inner.jwk_set(evaluator, now, context).await
	}

	async fn close(&self) {
		self.inner.close().await
	}
}
