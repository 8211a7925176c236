use axum::extract::{Request, State};
use axum::http::{HeaderMap, HeaderName, HeaderValue};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use heroforge_shared::rate_limit::RATE_LIMIT_REMAINING_HEADER;
use tracing::warn;

use crate::error::ApiError;
use crate::AppState;

/// Key used when a request carries no client address headers.
pub const FALLBACK_CLIENT_KEY: &str = "127.0.0.1";

/// Rate limit key for a request: first `x-forwarded-for` hop, then
/// `x-real-ip`, then the loopback fallback.
pub fn client_key(headers: &HeaderMap) -> String {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|value| !value.is_empty())
    };

    if let Some(first) = header("x-forwarded-for")
        .and_then(|forwarded| forwarded.split(',').next())
        .map(str::trim)
        .filter(|hop| !hop.is_empty())
    {
        return first.to_string();
    }

    header("x-real-ip")
        .unwrap_or(FALLBACK_CLIENT_KEY)
        .to_string()
}

pub async fn rate_limit_middleware(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let key = client_key(request.headers());
    let remaining = match state.limiter.check(&key).into_result() {
        Ok(remaining) => remaining,
        Err(err) => {
            warn!("Rate limit exceeded for {} on {}", key, request.uri().path());
            return ApiError::from(err).into_response();
        }
    };

    let mut response = next.run(request).await;
    response.headers_mut().insert(
        HeaderName::from_static(RATE_LIMIT_REMAINING_HEADER),
        HeaderValue::from(remaining),
    );
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(pairs: &[(&'static str, &'static str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.insert(*name, HeaderValue::from_static(*value));
        }
        map
    }

    #[test]
    fn test_forwarded_for_first_hop_wins() {
        let map = headers(&[
            ("x-forwarded-for", " 203.0.113.7 , 10.0.0.1"),
            ("x-real-ip", "198.51.100.2"),
        ]);
        assert_eq!(client_key(&map), "203.0.113.7");
    }

    #[test]
    fn test_real_ip_fallback() {
        let map = headers(&[("x-real-ip", "198.51.100.2")]);
        assert_eq!(client_key(&map), "198.51.100.2");

        let blank_forwarded = headers(&[("x-forwarded-for", " , 10.0.0.1"), ("x-real-ip", "198.51.100.2")]);
        assert_eq!(client_key(&blank_forwarded), "198.51.100.2");
    }

    #[test]
    fn test_loopback_when_no_headers() {
        assert_eq!(client_key(&HeaderMap::new()), FALLBACK_CLIENT_KEY);
    }
}
