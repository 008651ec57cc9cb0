//! Retry, outage, and refresh-ahead behaviour of the assembled stack.

// std
use std::{
	sync::{Arc, Mutex, atomic::Ordering},
	time::Duration,
};
// crates.io
use jwks_source::{
	JwkSelector, JwkSource, JwkSourceBuilder, Result, SecurityContext,
	events::{Event, EventListener},
};
use wiremock::{MockServer, ResponseTemplate};
// self
use crate::common::{JWKS_PATH, mount_sequence, ok_response};

#[tokio::test]
async fn a_transient_failure_is_absorbed_by_the_retry_layer() -> Result<()> {
	let _ = tracing_subscriber::fmt::try_init();

	let server = MockServer::start().await;
	let requests =
		mount_sequence(&server, vec![ResponseTemplate::new(502), ok_response("primary")]).await;
	let source = JwkSourceBuilder::from_url(format!("{}{JWKS_PATH}", server.uri()).parse()?)
		.retrying(true)
		.build()?;
	let keys = source
		.select(&JwkSelector::by_key_id("primary"), &SecurityContext::empty())
		.await?;

	assert_eq!(keys.len(), 1);
	assert_eq!(requests.load(Ordering::SeqCst), 2);

	source.close().await;
	Ok(())
}

#[tokio::test]
async fn an_outage_is_masked_by_the_last_known_good_set() -> Result<()> {
	let _ = tracing_subscriber::fmt::try_init();

	let server = MockServer::start().await;
	let requests =
		mount_sequence(&server, vec![ok_response("primary"), ResponseTemplate::new(500)]).await;
	let source = JwkSourceBuilder::from_url(format!("{}{JWKS_PATH}", server.uri()).parse()?)
		.cache_ttl(Duration::from_secs(1))
		.min_time_interval(Duration::from_millis(500))
		.outage_tolerant(Duration::from_secs(60))
		.build()?;
	let context = SecurityContext::empty();
	let selector = JwkSelector::by_key_id("primary");
	let before = source.select(&selector, &context).await?;

	assert_eq!(before.len(), 1);

	// Let the cache expire; the refresh fails against the now-broken endpoint and the outage
	// layer serves the stale set instead.
	tokio::time::sleep(Duration::from_millis(1_200)).await;

	let during = source.select(&selector, &context).await?;

	assert_eq!(during.len(), 1);
	assert!(requests.load(Ordering::SeqCst) >= 2);

	source.close().await;
	Ok(())
}

#[tokio::test]
async fn refresh_ahead_hides_the_fetch_from_foreground_requests() -> Result<()> {
	let _ = tracing_subscriber::fmt::try_init();

	let server = MockServer::start().await;
	let requests =
		mount_sequence(&server, vec![ok_response("primary"), ok_response("rotated")]).await;
	let seen = Arc::new(Mutex::new(Vec::new()));
	let sink = seen.clone();
	let listener: EventListener = Arc::new(move |event: &Event| {
		sink.lock().expect("lock").push(event.kind.name());
	});
	let source = JwkSourceBuilder::from_url(format!("{}{JWKS_PATH}", server.uri()).parse()?)
		.cache_ttl(Duration::from_secs(3))
		.cache_refresh_timeout(Duration::from_millis(500))
		.refresh_ahead(false)
		.refresh_ahead_time(Duration::from_secs(1))
		.min_time_interval(Duration::from_secs(1))
		.event_listener(listener)
		.build()?;
	let context = SecurityContext::empty();
	let before = source.select(&JwkSelector::by_key_id("primary"), &context).await?;

	assert_eq!(before.len(), 1);

	// Step into the refresh-ahead window: the foreground call still answers from the cache and
	// the replacement document is fetched in the background.
	tokio::time::sleep(Duration::from_millis(2_200)).await;

	let windowed = source.select(&JwkSelector::by_key_id("primary"), &context).await?;

	assert_eq!(windowed.len(), 1);

	for _ in 0..100 {
		if requests.load(Ordering::SeqCst) >= 2 {
			break;
		}

		tokio::time::sleep(Duration::from_millis(10)).await;
	}
	tokio::time::sleep(Duration::from_millis(50)).await;

	let rotated = source.select(&JwkSelector::by_key_id("rotated"), &context).await?;

	assert_eq!(rotated.len(), 1);
	assert_eq!(requests.load(Ordering::SeqCst), 2);
	assert!(seen.lock().expect("lock").contains(&"scheduled_refresh_completed"));

	source.close().await;
	Ok(())
}
