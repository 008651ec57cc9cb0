//! Shared fixtures for the end-to-end scenarios.

// std
use std::sync::{
	Arc,
	atomic::{AtomicUsize, Ordering},
};
// crates.io
use wiremock::{
	Mock, MockServer, Request, ResponseTemplate,
	matchers::{method, path},
};

pub const JWKS_PATH: &str = "/.well-known/jwks.json";

/// A minimal RSA JWKS document carrying a single key-id.
pub fn jwks_body(kid: &str) -> String {
	format!(
		r#"{{
    "keys": [
        {{
            "kty": "RSA",
            "alg": "RS256",
            "use": "sig",
            "kid": "{kid}",
            "n": "AQIDBAUGBwgJCgsMDQ4PEBESExQVFhcYGRobHB0eHyAhIiMkJSYnKCkqKywtLi8wMTIzNDU2Nzg5Ojs8PT4_QEFCQ0RFRkdISUpLTE1OT1BRUlNUVVZXWFlaW1xdXl9gYWJjZGVmZ2hpamtsbW5vcHFyc3R1dnd4eXp7fH1-f4A",
            "e": "AQAB"
        }}
    ]
}}"#
	)
}

/// Mount a mock that answers call `n` with `responses[min(n, len - 1)]` and counts requests.
pub async fn mount_sequence(
	server: &MockServer,
	responses: Vec<ResponseTemplate>,
) -> Arc<AtomicUsize> {
	let counter = Arc::new(AtomicUsize::new(0));
	let handle = counter.clone();

	Mock::given(method("GET"))
		.and(path(JWKS_PATH))
		.respond_with(move |_request: &Request| {
			let index = handle.fetch_add(1, Ordering::SeqCst);

			responses[index.min(responses.len() - 1)].clone()
		})
		.mount(server)
		.await;

	counter
}

/// 200 response with the given JWKS body.
pub fn ok_response(kid: &str) -> ResponseTemplate {
	ResponseTemplate::new(200)
		.set_body_string(jwks_body(kid))
		.insert_header("content-type", "application/json")
}
