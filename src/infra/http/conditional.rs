//! Conditional JSON responses with a weak ETag validator.

use axum::http::{HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use sha1::{Digest, Sha1};

/// Clients may reuse a validated representation for five minutes before
/// revalidating.
pub const CACHE_CONTROL_VALUE: &str = "public, max-age=300";

/// Weak validator over the serialized payload bytes. Semantically equal
/// representations with different bytes get different tags, which is what
/// the `W/` prefix licenses.
pub fn weak_etag(serialized: &[u8]) -> String {
    format!("W/\"{}\"", hex::encode(Sha1::digest(serialized)))
}

/// Serialize `payload` and answer 304 when `If-None-Match` equals the
/// computed ETag byte-for-byte (weak prefix included), 200 with the body
/// otherwise. Both responses carry `ETag` and `Cache-Control`.
pub fn conditional_json<T: Serialize>(
    payload: &T,
    if_none_match: Option<&HeaderValue>,
) -> Result<Response, serde_json::Error> {
    let body = serde_json::to_vec(payload)?;
    let etag = weak_etag(&body);

    let revalidated = if_none_match.and_then(|value| value.to_str().ok()) == Some(etag.as_str());

    let mut response = if revalidated {
        StatusCode::NOT_MODIFIED.into_response()
    } else {
        (
            StatusCode::OK,
            [(header::CONTENT_TYPE, HeaderValue::from_static("application/json"))],
            body,
        )
            .into_response()
    };

    let headers = response.headers_mut();
    if let Ok(value) = HeaderValue::from_str(&etag) {
        headers.insert(header::ETAG, value);
    }
    headers.insert(
        header::CACHE_CONTROL,
        HeaderValue::from_static(CACHE_CONTROL_VALUE),
    );

    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn etag_is_a_weak_sha1_hex() {
        let etag = weak_etag(b"[]");
        assert!(etag.starts_with("W/\""));
        assert!(etag.ends_with('"'));
        // W/" + 40 hex digits + "
        assert_eq!(etag.len(), 4 + 40);
    }

    #[test]
    fn identical_payloads_produce_identical_etags() {
        assert_eq!(weak_etag(b"[1,2,3]"), weak_etag(b"[1,2,3]"));
        assert_ne!(weak_etag(b"[1,2,3]"), weak_etag(b"[1,2,4]"));
    }

    #[test]
    fn matching_if_none_match_short_circuits_to_304() {
        let payload = vec!["alpha", "beta"];
        let etag = weak_etag(&serde_json::to_vec(&payload).expect("serialized"));

        let header = HeaderValue::from_str(&etag).expect("header value");
        let response = conditional_json(&payload, Some(&header)).expect("response");

        assert_eq!(response.status(), StatusCode::NOT_MODIFIED);
        assert_eq!(
            response.headers().get(header::ETAG).expect("etag header"),
            &header
        );
        assert_eq!(
            response
                .headers()
                .get(header::CACHE_CONTROL)
                .expect("cache-control header"),
            CACHE_CONTROL_VALUE
        );
    }

    #[test]
    fn mismatched_validator_returns_full_response() {
        let payload = vec!["alpha"];
        let stale = HeaderValue::from_static("W/\"0000000000000000000000000000000000000000\"");

        let response = conditional_json(&payload, Some(&stale)).expect("response");
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[test]
    fn comparison_is_byte_exact_including_weak_prefix() {
        let payload = vec!["alpha"];
        let etag = weak_etag(&serde_json::to_vec(&payload).expect("serialized"));

        // Strip the weak prefix: a strong-form validator must not match.
        let strong = etag.trim_start_matches("W/").to_string();
        let header = HeaderValue::from_str(&strong).expect("header value");

        let response = conditional_json(&payload, Some(&header)).expect("response");
        assert_eq!(response.status(), StatusCode::OK);
    }
}
