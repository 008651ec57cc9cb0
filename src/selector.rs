//! Key selection: a matcher applied to a JWK set returns the matching subset.

// crates.io
use jsonwebtoken::jwk::{KeyAlgorithm, PublicKeyUse};
use serde::{Deserialize, Serialize};
// self
use crate::_prelude::*;

/// Matcher over JWK attributes.
///
/// Every populated field must match for a key to be selected; an all-default selector matches
/// every key. The pipeline itself only relies on empty-versus-non-empty results: the miss-driven
/// refresh protocol re-queries whenever a selection comes back empty.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct JwkSelector {
	/// Match keys carrying this key-id.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub key_id: Option<String>,
	/// Match keys published for this use.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub key_use: Option<PublicKeyUse>,
	/// Match keys bound to this algorithm.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub algorithm: Option<KeyAlgorithm>,
}
impl JwkSelector {
	/// Match solely on the key-id.
	pub fn by_key_id(key_id: impl Into<String>) -> Self {
		Self { key_id: Some(key_id.into()), ..Self::default() }
	}

	/// Apply the selector, returning the matching subset of `set`.
	pub fn select(&self, set: &JwkSet) -> Vec<Jwk> {
		set.keys.iter().filter(|jwk| self.matches(jwk)).cloned().collect()
	}

	fn matches(&self, jwk: &Jwk) -> bool {
		if let Some(key_id) = &self.key_id
			&& jwk.common.key_id.as_deref() != Some(key_id.as_str())
		{
			return false;
		}
		if let Some(key_use) = &self.key_use
			&& jwk.common.public_key_use.as_ref() != Some(key_use)
		{
			return false;
		}
		if let Some(algorithm) = &self.algorithm
			&& jwk.common.key_algorithm.as_ref() != Some(algorithm)
		{
			return false;
		}

		true
	}
}
