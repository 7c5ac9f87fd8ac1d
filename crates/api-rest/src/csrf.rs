//! Cross-site request refusal.
//!
//! Browsers resend cached Basic credentials on any request to the locker, including ones
//! triggered by another site's form. State-changing requests are therefore refused when the
//! browser reports that they come from elsewhere:
//!
//! - `Sec-Fetch-Site` other than `same-origin` or `none`, or
//! - with no `Sec-Fetch-Site`, an `Origin` whose host and port differ from the request's.
//!
//! Requests with neither header (curl, scripts) are left alone.

use crate::error::ApiError;
use axum::extract::Request;
use axum::http::{header, HeaderMap, HeaderName, Uri};
use axum::middleware::Next;
use axum::response::Response;

const SEC_FETCH_SITE: HeaderName = HeaderName::from_static("sec-fetch-site");

/// Middleware that answers 403 to cross-site state-changing requests.
pub(crate) async fn reject_cross_site(
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    if !request.method().is_safe() && is_cross_site(request.headers(), request.uri()) {
        tracing::warn!(
            method = %request.method(),
            uri = %request.uri(),
            "refused cross-site request"
        );
        return Err(ApiError::CrossSite);
    }

    Ok(next.run(request).await)
}

fn is_cross_site(headers: &HeaderMap, uri: &Uri) -> bool {
    if let Some(site) = headers.get(SEC_FETCH_SITE) {
        return !matches!(site.as_bytes(), b"same-origin" | b"none");
    }

    let Some(origin) = headers.get(header::ORIGIN) else {
        return false;
    };

    let host = headers
        .get(header::HOST)
        .and_then(|h| h.to_str().ok())
        .or_else(|| uri.authority().map(|a| a.as_str()));

    match (origin.to_str().ok().and_then(origin_authority), host) {
        (Some(origin), Some(host)) => !origin.eq_ignore_ascii_case(host),
        // `Origin: null` or no host to compare against.
        _ => true,
    }
}

/// `host[:port]` part of an `Origin` value such as `https://example.org:8443`.
fn origin_authority(origin: &str) -> Option<&str> {
    let (_scheme, authority) = origin.split_once("://")?;
    let authority = authority.trim_end_matches('/');
    (!authority.is_empty()).then_some(authority)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(pairs: &[(&'static str, &'static str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.insert(*name, HeaderValue::from_static(value));
        }
        map
    }

    #[test]
    fn test_fetch_metadata_decides_when_present() {
        let uri = Uri::from_static("/delete/notes.txt");

        for site in ["cross-site", "same-site"] {
            let map = headers(&[("sec-fetch-site", site), ("host", "attic.local")]);
            assert!(is_cross_site(&map, &uri), "{site}");
        }
        for site in ["same-origin", "none"] {
            let map = headers(&[
                ("sec-fetch-site", site),
                ("origin", "https://elsewhere.example"),
                ("host", "attic.local"),
            ]);
            assert!(!is_cross_site(&map, &uri), "{site}");
        }
    }

    #[test]
    fn test_origin_must_match_host() {
        let uri = Uri::from_static("/upload");

        let same = headers(&[
            ("origin", "http://attic.local:5000"),
            ("host", "attic.local:5000"),
        ]);
        assert!(!is_cross_site(&same, &uri));

        let other_port = headers(&[
            ("origin", "http://attic.local:8080"),
            ("host", "attic.local:5000"),
        ]);
        assert!(is_cross_site(&other_port, &uri));

        let opaque = headers(&[("origin", "null"), ("host", "attic.local")]);
        assert!(is_cross_site(&opaque, &uri));
    }

    #[test]
    fn test_requests_without_browser_headers_pass() {
        let map = headers(&[("host", "attic.local")]);
        assert!(!is_cross_site(&map, &Uri::from_static("/upload")));
    }
}
