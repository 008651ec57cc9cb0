//! Composable JWK set resolution pipeline — caching with single-flight refresh, refresh-ahead,
//! rate limiting, outage tolerance, and health reporting between an application and a remote
//! JWKS endpoint.
//!
//! The pipeline is a stack of decorators over a single contract, [`source::JwkSetSource`]. Each
//! layer adds one concern: the leaf fetches and parses the document, the retry layer absorbs one
//! transient failure, the outage layer serves the last known good set while the endpoint is down,
//! the rate limiter protects the endpoint from request storms, and the caching layers serialise
//! refreshes so concurrent callers share a single upstream fetch. On top, [`source::JwkSource`]
//! exposes key selection with a bounded, rotation-aware re-query protocol.
//!
//! ```no_run
//! use jwks_source::{JwkSelector, JwkSource, JwkSourceBuilder, SecurityContext};
//!
//! # async fn demo() -> jwks_source::Result<()> {
//! let source = JwkSourceBuilder::from_url("https://idp.example.com/.well-known/jwks.json".parse()?)
//! 	.retrying(true)
//! 	.build()?;
//! let keys = source.select(&JwkSelector::by_key_id("primary"), &SecurityContext::empty()).await?;
//! # Ok(())
//! # }
//! ```

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod builder;
pub mod cache;
pub mod evaluator;
pub mod events;
pub mod health;
pub mod retriever;
pub mod selector;
pub mod source;

mod error;
mod security;
mod _prelude {
	pub use std::sync::Arc;

	pub use jsonwebtoken::jwk::{Jwk, JwkSet};

	pub use crate::{
		error::{Error, Result},
		security::SecurityContext,
	};
}
pub use crate::{
	builder::JwkSourceBuilder,
	error::{Error, Result},
	evaluator::RefreshEvaluator,
	security::SecurityContext,
	selector::JwkSelector,
	source::{JwkSetSource, JwkSource},
};
