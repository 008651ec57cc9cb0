//! Validated assembly of the JWK source decorator stack.

// std
use std::time::Duration;
// crates.io
use url::Url;
// self
use crate::{
	_prelude::*,
	events::{EventListener, Events, SourceKind},
	health::HealthListener,
	retriever::{DEFAULT_CONNECT_TIMEOUT, DEFAULT_READ_TIMEOUT, DEFAULT_SIZE_LIMIT, DefaultResourceRetriever},
	source::{
		JwkSetSource, JwkSource, caching::CachingSource, failover::FailoverSource,
		health::HealthReportingSource, outage::OutageTolerantSource,
		rate_limit::RateLimitedSource, refresh_ahead::RefreshAheadSource, retry::RetryingSource,
		select::SelectingSource, url::UrlSource,
	},
};

/// Default cache time-to-live (5 minutes).
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(5 * 60);
/// Default budget for waiting on a contended cache refresh (15 seconds).
pub const DEFAULT_CACHE_REFRESH_TIMEOUT: Duration = Duration::from_secs(15);
/// Default refresh-ahead lead time (30 seconds).
pub const DEFAULT_REFRESH_AHEAD_TIME: Duration = Duration::from_secs(30);
/// Default rate-limit interval (30 seconds).
pub const DEFAULT_MIN_TIME_INTERVAL: Duration = Duration::from_secs(30);

/// Sentinel for a never-expiring cache.
const FOREVER: i64 = i64::MAX;

enum Leaf {
	Url(Url),
	Custom(Box<dyn JwkSetSource>),
}

/// Builds a [`JwkSource`] stack, validating that the requested combination of layers is legal.
///
/// The canonical order, outermost first: failover → selector → (refresh-ahead or caching) →
/// rate-limiter → health-reporter → outage → retry → leaf. Layers whose toggles are off are
/// omitted. Caching and rate limiting are enabled by default; retrying, outage tolerance,
/// refresh-ahead, health reporting, and failover are opt-in.
pub struct JwkSourceBuilder {
	leaf: Leaf,
	connect_timeout: Duration,
	read_timeout: Duration,
	size_limit: u64,
	caching: bool,
	cache_ttl: i64,
	cache_refresh_timeout: i64,
	refresh_ahead: bool,
	refresh_ahead_time: i64,
	scheduled: bool,
	rate_limited: bool,
	min_time_interval: i64,
	retrying: bool,
	outage_tolerant: bool,
	outage_ttl: i64,
	health_listener: Option<HealthListener>,
	event_listener: Option<EventListener>,
	failover: Option<Box<dyn JwkSource>>,
}
impl JwkSourceBuilder {
	/// Start from a JWKS endpoint URL (`http`, `https`, or `file`).
	pub fn from_url(url: Url) -> Self {
		Self::with_leaf(Leaf::Url(url))
	}

	/// Start from a user-supplied leaf source.
	pub fn from_source(source: impl JwkSetSource + 'static) -> Self {
		Self::with_leaf(Leaf::Custom(Box::new(source)))
	}

	fn with_leaf(leaf: Leaf) -> Self {
		Self {
			leaf,
			connect_timeout: DEFAULT_CONNECT_TIMEOUT,
			read_timeout: DEFAULT_READ_TIMEOUT,
			size_limit: DEFAULT_SIZE_LIMIT,
			caching: true,
			cache_ttl: saturating_millis(DEFAULT_CACHE_TTL),
			cache_refresh_timeout: saturating_millis(DEFAULT_CACHE_REFRESH_TIMEOUT),
			refresh_ahead: false,
			refresh_ahead_time: saturating_millis(DEFAULT_REFRESH_AHEAD_TIME),
			scheduled: false,
			rate_limited: true,
			min_time_interval: saturating_millis(DEFAULT_MIN_TIME_INTERVAL),
			retrying: false,
			outage_tolerant: false,
			outage_ttl: FOREVER,
			health_listener: None,
			event_listener: None,
			failover: None,
		}
	}

	/// Override the HTTP connect timeout of the bundled retriever.
	pub fn connect_timeout(mut self, timeout: Duration) -> Self {
		self.connect_timeout = timeout;

		self
	}

	/// Override the HTTP read timeout of the bundled retriever.
	pub fn read_timeout(mut self, timeout: Duration) -> Self {
		self.read_timeout = timeout;

		self
	}

	/// Override the HTTP response size guard of the bundled retriever.
	pub fn size_limit(mut self, bytes: u64) -> Self {
		self.size_limit = bytes;

		self
	}

	/// Toggle caching.
	pub fn cache(mut self, enabled: bool) -> Self {
		self.caching = enabled;

		self
	}

	/// Override the cache time-to-live.
	pub fn cache_ttl(mut self, ttl: Duration) -> Self {
		self.cache_ttl = saturating_millis(ttl);

		self
	}

	/// Override the budget for waiting on a contended cache refresh.
	pub fn cache_refresh_timeout(mut self, timeout: Duration) -> Self {
		self.cache_refresh_timeout = saturating_millis(timeout);

		self
	}

	/// Cache the first successful fetch forever. Implies no refresh-ahead.
	pub fn cache_forever(mut self) -> Self {
		self.caching = true;
		self.cache_ttl = FOREVER;
		self.refresh_ahead = false;

		self
	}

	/// Enable refresh-ahead caching; with `scheduled`, a one-shot task is armed ahead of each
	/// generation's refresh window instead of relying on foreground traffic alone.
	pub fn refresh_ahead(mut self, scheduled: bool) -> Self {
		self.refresh_ahead = true;
		self.scheduled = scheduled;

		self
	}

	/// Override the refresh-ahead lead time.
	pub fn refresh_ahead_time(mut self, time: Duration) -> Self {
		self.refresh_ahead_time = saturating_millis(time);

		self
	}

	/// Toggle rate limiting.
	pub fn rate_limited(mut self, enabled: bool) -> Self {
		self.rate_limited = enabled;

		self
	}

	/// Override the rate-limit interval (two upstream calls are admitted per interval).
	pub fn min_time_interval(mut self, interval: Duration) -> Self {
		self.min_time_interval = saturating_millis(interval);

		self
	}

	/// Toggle the single-retry layer.
	pub fn retrying(mut self, enabled: bool) -> Self {
		self.retrying = enabled;

		self
	}

	/// Enable outage tolerance: keep each successful fetch for `ttl` and serve it while the
	/// upstream fails.
	pub fn outage_tolerant(mut self, ttl: Duration) -> Self {
		self.outage_tolerant = true;
		self.outage_ttl = saturating_millis(ttl);

		self
	}

	/// Enable outage tolerance with an unbounded TTL.
	pub fn outage_tolerant_forever(mut self) -> Self {
		self.outage_tolerant = true;
		self.outage_ttl = FOREVER;

		self
	}

	/// Report per-call health to `listener`.
	pub fn health_listener(mut self, listener: HealthListener) -> Self {
		self.health_listener = Some(listener);

		self
	}

	/// Dispatch stack events to `listener`.
	pub fn event_listener(mut self, listener: EventListener) -> Self {
		self.event_listener = Some(listener);

		self
	}

	/// Fail over to `secondary` when the assembled stack fails a selection.
	pub fn failover(mut self, secondary: impl JwkSource + 'static) -> Self {
		self.failover = Some(Box::new(secondary));

		self
	}

	fn validate(&self) -> Result<()> {
		if self.rate_limited && !self.caching {
			return Err(Error::Validation {
				field: "rate_limited",
				reason: "Rate limiting requires caching.".into(),
			});
		}
		if self.refresh_ahead && !self.caching {
			return Err(Error::Validation {
				field: "refresh_ahead",
				reason: "Refresh-ahead caching requires general caching.".into(),
			});
		}
		if self.caching && self.rate_limited && self.cache_ttl <= self.min_time_interval {
			return Err(Error::Validation {
				field: "cache_ttl",
				reason: "Cache time-to-live must exceed the rate-limit minimum interval.".into(),
			});
		}
		if self.outage_tolerant && self.cache_ttl == FOREVER && self.outage_ttl == FOREVER {
			return Err(Error::Validation {
				field: "outage_tolerant",
				reason: "Outage tolerance is unnecessary with a non-expiring cache.".into(),
			});
		}
		if self.refresh_ahead && self.cache_ttl == FOREVER {
			return Err(Error::Validation {
				field: "refresh_ahead",
				reason: "Refresh-ahead caching cannot be combined with a non-expiring cache.".into(),
			});
		}

		Ok(())
	}

	/// Validate the configuration and assemble the stack.
	pub fn build(self) -> Result<Box<dyn JwkSource>> {
		self.validate()?;

		let listener = self.event_listener;
		let events = |source: SourceKind| Events::new(source, listener.clone());
		let mut source: Box<dyn JwkSetSource> = match self.leaf {
			Leaf::Url(url) => Box::new(UrlSource::with_retriever(
				url,
				DefaultResourceRetriever::with_limits(
					self.connect_timeout,
					self.read_timeout,
					self.size_limit,
				)?,
			)),
			Leaf::Custom(source) => source,
		};

		if self.retrying {
			source = Box::new(RetryingSource::new(source, events(SourceKind::Retry)));
		}
		if self.outage_tolerant {
			source = Box::new(OutageTolerantSource::new(
				source,
				self.outage_ttl,
				events(SourceKind::Outage),
			));
		}
		if let Some(listener) = self.health_listener {
			source = Box::new(HealthReportingSource::new(source, listener));
		}
		if self.rate_limited {
			source = Box::new(RateLimitedSource::new(
				source,
				self.min_time_interval,
				events(SourceKind::RateLimit),
			));
		}
		if self.refresh_ahead {
			source = Box::new(RefreshAheadSource::new(
				source,
				self.cache_ttl,
				self.cache_refresh_timeout,
				self.refresh_ahead_time,
				self.scheduled,
				events(SourceKind::RefreshAhead),
			)?);
		} else if self.caching {
			source = Box::new(CachingSource::new(
				source,
				self.cache_ttl,
				self.cache_refresh_timeout,
				events(SourceKind::Caching),
			));
		}

		let selecting = SelectingSource::new(source);

		Ok(match self.failover {
			Some(secondary) => Box::new(FailoverSource::new(selecting, secondary)),
			None => Box::new(selecting),
		})
	}
}

fn saturating_millis(duration: Duration) -> i64 {
	i64::try_from(duration.as_millis()).unwrap_or(FOREVER)
}
