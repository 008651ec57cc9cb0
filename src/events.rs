//! Event taxonomy and listener dispatch for the source stack.

// std
use std::fmt::{Debug, Display, Formatter, Result as FmtResult};
// self
use crate::_prelude::*;

/// Callback invoked for every event emitted by the stack.
pub type EventListener = Arc<dyn Fn(&Event) + Send + Sync>;

/// Stack layer that emitted an event.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SourceKind {
	/// Blocking cache with single-flight refresh.
	Caching,
	/// Caching source with proactive background refresh.
	RefreshAhead,
	/// Token-bucket rate limiter.
	RateLimit,
	/// Single-retry wrapper.
	Retry,
	/// Outage-tolerant fallback cache.
	Outage,
}
impl SourceKind {
	/// Stable name used in log fields.
	pub fn as_str(&self) -> &'static str {
		match self {
			Self::Caching => "caching",
			Self::RefreshAhead => "refresh-ahead",
			Self::RateLimit => "rate-limit",
			Self::Retry => "retry",
			Self::Outage => "outage",
		}
	}
}
impl Display for SourceKind {
	fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Event payloads, one variant per observable stack transition.
///
/// `queued` fields carry an estimate of the callers parked on the caching layer's refresh mutex
/// at the time of the event.
#[derive(Clone, Debug)]
pub enum EventKind {
	/// A refresh of the cached set has begun.
	RefreshInitiated {
		/// Estimate of callers queued on the refresh mutex.
		queued: usize,
	},
	/// A refresh completed and the cache now holds `jwk_set`.
	RefreshCompleted {
		/// The set just stored in the cache.
		jwk_set: Arc<JwkSet>,
		/// Estimate of callers queued on the refresh mutex.
		queued: usize,
	},
	/// A caller found the refresh mutex taken and is waiting for the holder's result.
	WaitingForRefresh {
		/// Estimate of callers queued on the refresh mutex.
		queued: usize,
	},
	/// A waiting caller gave up after the cache refresh timeout.
	RefreshTimedOut {
		/// Estimate of callers queued on the refresh mutex.
		queued: usize,
	},
	/// A foreground refresh failed; the cache is unchanged and the failure propagates.
	UnableToRefresh,
	/// A one-shot background refresh was armed.
	RefreshScheduled {
		/// Epoch-millisecond time the refresh fires.
		at: i64,
	},
	/// A one-shot background refresh was not armed because its window has already passed.
	RefreshNotScheduled,
	/// A background refresh task started.
	ScheduledRefreshInitiated,
	/// A background refresh task replaced the cache with `jwk_set`.
	ScheduledRefreshCompleted {
		/// The set just stored in the cache.
		jwk_set: Arc<JwkSet>,
	},
	/// A scheduled background refresh failed; the cache is unchanged.
	ScheduledRefreshFailed {
		/// The failure, shared with every listener.
		error: Arc<Error>,
	},
	/// A lazily triggered ahead-of-expiry refresh failed; a later request may retry.
	UnableToRefreshAheadOfExpiration,
	/// A call was refused because the token bucket is empty.
	RateLimited {
		/// Milliseconds until the next window opens.
		retry_in_ms: i64,
	},
	/// A transient failure is about to be retried.
	Retrial {
		/// The failure that triggered the retry.
		error: Arc<Error>,
	},
	/// The upstream is failing and the last known good set is being served.
	Outage {
		/// The upstream failure being masked.
		error: Arc<Error>,
		/// Milliseconds of outage-cache validity left.
		remaining_millis: i64,
	},
}
impl EventKind {
	/// Stable name used in log fields.
	pub fn name(&self) -> &'static str {
		match self {
			Self::RefreshInitiated { .. } => "refresh_initiated",
			Self::RefreshCompleted { .. } => "refresh_completed",
			Self::WaitingForRefresh { .. } => "waiting_for_refresh",
			Self::RefreshTimedOut { .. } => "refresh_timed_out",
			Self::UnableToRefresh => "unable_to_refresh",
			Self::RefreshScheduled { .. } => "refresh_scheduled",
			Self::RefreshNotScheduled => "refresh_not_scheduled",
			Self::ScheduledRefreshInitiated => "scheduled_refresh_initiated",
			Self::ScheduledRefreshCompleted { .. } => "scheduled_refresh_completed",
			Self::ScheduledRefreshFailed { .. } => "scheduled_refresh_failed",
			Self::UnableToRefreshAheadOfExpiration => "unable_to_refresh_ahead_of_expiration",
			Self::RateLimited { .. } => "rate_limited",
			Self::Retrial { .. } => "retrial",
			Self::Outage { .. } => "outage",
		}
	}
}

/// An event together with its originating layer and the caller's context.
#[derive(Clone, Debug)]
pub struct Event {
	/// Layer that emitted the event.
	pub source: SourceKind,
	/// Context supplied by the call that triggered the event.
	pub context: SecurityContext,
	/// Event payload.
	pub kind: EventKind,
}

/// Per-layer emitter owning the optional listener.
#[derive(Clone)]
pub struct Events {
	source: SourceKind,
	listener: Option<EventListener>,
}
impl Events {
	/// Create an emitter for the given layer.
	pub fn new(source: SourceKind, listener: Option<EventListener>) -> Self {
		Self { source, listener }
	}

	/// Emit an event: log it and dispatch it to the listener when one is attached.
	pub fn emit(&self, kind: EventKind, context: &SecurityContext) {
		tracing::debug!(source = %self.source, event = kind.name(), "source event");

		if let Some(listener) = &self.listener {
			listener(&Event { source: self.source, context: context.clone(), kind });
		}
	}
}
impl Debug for Events {
	fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
		f.debug_struct("Events")
			.field("source", &self.source)
			.field("listener", &self.listener.is_some())
			.finish()
	}
}
