//! Caching, rotation, and rate-limiting behaviour of the assembled stack.

// std
use std::{sync::atomic::Ordering, time::Duration};
// crates.io
use jwks_source::{JwkSelector, JwkSource, JwkSourceBuilder, Result, SecurityContext};
use wiremock::MockServer;
// self
use crate::common::{JWKS_PATH, jwks_body, mount_sequence, ok_response};

#[tokio::test]
async fn caches_the_first_fetch_and_reuses_it() -> Result<()> {
	let _ = tracing_subscriber::fmt::try_init();

	let server = MockServer::start().await;
	let requests = mount_sequence(&server, vec![ok_response("primary")]).await;
	let source =
		JwkSourceBuilder::from_url(format!("{}{JWKS_PATH}", server.uri()).parse()?).build()?;
	let context = SecurityContext::empty();
	let selector = JwkSelector::by_key_id("primary");
	let first = source.select(&selector, &context).await?;
	let second = source.select(&selector, &context).await?;

	assert_eq!(first.len(), 1);
	assert_eq!(second.len(), 1);
	assert_eq!(requests.load(Ordering::SeqCst), 1);

	source.close().await;
	Ok(())
}

#[tokio::test]
async fn a_rotated_key_id_drives_one_refresh() -> Result<()> {
	let _ = tracing_subscriber::fmt::try_init();

	let server = MockServer::start().await;
	let requests =
		mount_sequence(&server, vec![ok_response("primary"), ok_response("rotated")]).await;
	let source =
		JwkSourceBuilder::from_url(format!("{}{JWKS_PATH}", server.uri()).parse()?).build()?;
	let context = SecurityContext::empty();
	let before = source.select(&JwkSelector::by_key_id("primary"), &context).await?;

	assert_eq!(before.len(), 1);

	// The rotated key-id misses against the cached set; the selector re-queries with a pin on
	// the observed instance and the cache refreshes to the new document.
	let after = source.select(&JwkSelector::by_key_id("rotated"), &context).await?;

	assert_eq!(after.len(), 1);
	assert_eq!(after[0].common.key_id.as_deref(), Some("rotated"));
	assert_eq!(requests.load(Ordering::SeqCst), 2);

	source.close().await;
	Ok(())
}

#[tokio::test]
async fn an_expired_cache_is_refreshed_on_the_next_lookup() -> Result<()> {
	let _ = tracing_subscriber::fmt::try_init();

	let server = MockServer::start().await;
	let requests =
		mount_sequence(&server, vec![ok_response("primary"), ok_response("rotated")]).await;
	let source = JwkSourceBuilder::from_url(format!("{}{JWKS_PATH}", server.uri()).parse()?)
		.cache_ttl(Duration::from_secs(1))
		.min_time_interval(Duration::from_millis(500))
		.build()?;
	let context = SecurityContext::empty();
	let before = source.select(&JwkSelector::by_key_id("primary"), &context).await?;

	assert_eq!(before.len(), 1);

	tokio::time::sleep(Duration::from_millis(1_200)).await;

	let after = source.select(&JwkSelector::by_key_id("rotated"), &context).await?;

	assert_eq!(after.len(), 1);
	assert_eq!(requests.load(Ordering::SeqCst), 2);

	source.close().await;
	Ok(())
}

#[tokio::test]
async fn a_file_backed_jwks_document_resolves_keys() -> Result<()> {
	let _ = tracing_subscriber::fmt::try_init();

	let path = std::env::temp_dir().join(format!("jwks-source-e2e-{}.json", std::process::id()));

	tokio::fs::write(&path, jwks_body("primary")).await?;

	let url = url::Url::from_file_path(&path).expect("file url");
	let source = JwkSourceBuilder::from_url(url).build()?;
	let keys = source
		.select(&JwkSelector::by_key_id("primary"), &SecurityContext::empty())
		.await?;

	assert_eq!(keys.len(), 1);

	source.close().await;
	Ok(())
}

#[tokio::test]
async fn unknown_key_id_storms_are_bounded_by_the_rate_limit() -> Result<()> {
	let _ = tracing_subscriber::fmt::try_init();

	let server = MockServer::start().await;
	let requests = mount_sequence(&server, vec![ok_response("primary")]).await;
	let source =
		JwkSourceBuilder::from_url(format!("{}{JWKS_PATH}", server.uri()).parse()?).build()?;
	let context = SecurityContext::empty();
	let unknown = JwkSelector::by_key_id("no-such-key");

	for _ in 0..20 {
		let keys = source.select(&unknown, &context).await?;

		assert!(keys.is_empty());
	}

	// Two upstream calls per rate-limit interval: the initial load and one miss-driven refresh.
	assert_eq!(requests.load(Ordering::SeqCst), 2);

	// Known keys keep resolving from the cache throughout the storm.
	let known = source.select(&JwkSelector::by_key_id("primary"), &context).await?;

	assert_eq!(known.len(), 1);

	source.close().await;
	Ok(())
}
