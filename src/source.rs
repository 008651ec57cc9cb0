//! JWK set source contract and the decorator stack built on it.
//!
//! Sources form a linear chain assembled by the builder: failover → selector → (refresh-ahead or
//! caching) → rate-limiter → health-reporter → outage → retry → leaf. Each decorator owns its
//! direct inner source and closes it on close.

pub mod caching;
pub mod failover;
pub mod health;
pub mod outage;
pub mod rate_limit;
pub mod refresh_ahead;
pub mod retry;
pub mod select;
pub mod url;

// crates.io
use async_trait::async_trait;
// self
use crate::{_prelude::*, evaluator::RefreshEvaluator, selector::JwkSelector};

/// Contract implemented by every layer of the JWK set pipeline.
///
/// `now` is the caller-supplied epoch-millisecond clock; no foreground path reads any other
/// clock, which keeps every expiry code path testable with a synthetic time.
#[async_trait]
pub trait JwkSetSource: Send + Sync {
	/// Return the JWK set, refreshing according to `evaluator`.
	async fn jwk_set(
		&self,
		evaluator: &RefreshEvaluator,
		now: i64,
		context: &SecurityContext,
	) -> Result<Arc<JwkSet>>;

	/// Release owned resources; the behaviour of subsequent calls is undefined.
	async fn close(&self) {}
}

#[async_trait]
impl JwkSetSource for Box<dyn JwkSetSource> {
	async fn jwk_set(
		&self,
		evaluator: &RefreshEvaluator,
		now: i64,
		context: &SecurityContext,
	) -> Result<Arc<JwkSet>> {
		(**self).jwk_set(evaluator, now, context).await
	}

	async fn close(&self) {
		(**self).close().await
	}
}

/// Application-facing contract: select the keys matching a selector.
#[async_trait]
pub trait JwkSource: Send + Sync {
	/// Return the keys matching `selector`.
	async fn select(&self, selector: &JwkSelector, context: &SecurityContext) -> Result<Vec<Jwk>>;

	/// Release owned resources; the behaviour of subsequent calls is undefined.
	async fn close(&self) {}
}

#[async_trait]
impl JwkSource for Box<dyn JwkSource> {
	async fn select(&self, selector: &JwkSelector, context: &SecurityContext) -> Result<Vec<Jwk>> {
		(**self).select(selector, context).await
	}

	async fn close(&self) {
		(**self).close().await
	}
}
