use std::time::Instant;

use axum::{
    body::Body,
    http::{HeaderValue, Request, header},
    middleware::Next,
    response::Response,
};
use metrics::counter;
use once_cell::sync::Lazy;
use regex::RegexSet;
use tracing::{error, warn};

use crate::application::error::ErrorReport;

/// Patterns a best-effort log filter flags in request parameters. This is a
/// diagnostic aid, not a security boundary: queries are parameterized at the
/// repository layer regardless.
static SQL_PATTERNS: Lazy<RegexSet> = Lazy::new(|| {
    RegexSet::new([
        r"(?i)\bUNION\b.*\bSELECT\b",
        r"(?i)\bOR\b.*=",
        r"(?i)\bAND\b.*=",
        r"(?i);.*\bDROP\b",
        r"(?i);.*\bDELETE\b",
        r"(?i);.*\bUPDATE\b",
        r"(?i);.*\bINSERT\b",
        r"(?i)\b(?:EXEC|EXECUTE)\b",
        r"--",
        r"(?s)/\*.*\*/",
    ])
    .expect("static pattern set compiles")
});

const CONTENT_SECURITY_POLICY: &str = "default-src 'self'; script-src 'self' 'unsafe-inline'; \
     style-src 'self' 'unsafe-inline'; img-src 'self' data: https:;";

/// Flag suspicious query parameters, then stamp the security headers onto
/// the response.
pub async fn security_headers(request: Request<Body>, next: Next) -> Response {
    log_suspicious_parameters(&request);

    let mut response = next.run(request).await;

    let headers = response.headers_mut();
    headers.insert(
        header::X_CONTENT_TYPE_OPTIONS,
        HeaderValue::from_static("nosniff"),
    );
    headers.insert(header::X_FRAME_OPTIONS, HeaderValue::from_static("DENY"));
    headers.insert(
        header::X_XSS_PROTECTION,
        HeaderValue::from_static("1; mode=block"),
    );
    headers.insert(
        header::REFERRER_POLICY,
        HeaderValue::from_static("strict-origin-when-cross-origin"),
    );
    headers.insert(
        header::CONTENT_SECURITY_POLICY,
        HeaderValue::from_static(CONTENT_SECURITY_POLICY),
    );

    response
}

fn log_suspicious_parameters(request: &Request<Body>) {
    let Some(query) = request.uri().query() else {
        return;
    };

    for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
        if SQL_PATTERNS.is_match(&value) {
            counter!("gazzetta_sql_pattern_match_total").increment(1);
            warn!(
                target: "gazzetta::http::security",
                path = %request.uri().path(),
                parameter = %key,
                value = %value,
                "request parameter matched a suspicious SQL pattern"
            );
        }
    }
}

pub async fn log_responses(request: Request<Body>, next: Next) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let start = Instant::now();

    let mut response = next.run(request).await;
    let status = response.status();

    if status.is_client_error() || status.is_server_error() {
        let elapsed_ms = start.elapsed().as_millis();
        let report = response.extensions_mut().remove::<ErrorReport>();
        let (source, messages) = match report {
            Some(report) => (report.source, report.messages),
            None => ("unknown", Vec::new()),
        };
        let detail = messages
            .first()
            .cloned()
            .unwrap_or_else(|| "no diagnostic available".to_string());

        if status.is_server_error() {
            error!(
                target = "gazzetta::http::response",
                status = status.as_u16(),
                method = %method,
                path = %uri.path(),
                query = uri.query().unwrap_or(""),
                elapsed_ms = elapsed_ms,
                source = source,
                detail = %detail,
                chain = ?messages,
                "request failed",
            );
        } else {
            warn!(
                target = "gazzetta::http::response",
                status = status.as_u16(),
                method = %method,
                path = %uri.path(),
                query = uri.query().unwrap_or(""),
                elapsed_ms = elapsed_ms,
                source = source,
                detail = %detail,
                chain = ?messages,
                "client request error",
            );
        }
    }

    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_classic_injection_shapes() {
        assert!(SQL_PATTERNS.is_match("1 UNION SELECT password FROM users"));
        assert!(SQL_PATTERNS.is_match("x' OR 1=1"));
        assert!(SQL_PATTERNS.is_match("1; DROP TABLE articles"));
        assert!(SQL_PATTERNS.is_match("value -- trailing comment"));
        assert!(SQL_PATTERNS.is_match("a /* hidden */ b"));
    }

    #[test]
    fn leaves_ordinary_text_alone() {
        assert!(!SQL_PATTERNS.is_match("rust async runtimes"));
        assert!(!SQL_PATTERNS.is_match("l'union européenne"));
    }
}
