use regex::Regex;
use warp::http::header::{
    HeaderValue, ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS,
    ACCESS_CONTROL_ALLOW_ORIGIN, ACCESS_CONTROL_MAX_AGE, VARY,
};
use warp::http::StatusCode;
use warp::Reply;

const ALLOWED_METHODS: &str = "GET, POST";

/// Origin-pattern CORS. warp's built-in `cors()` only knows exact origins, so
/// origins are matched against a regex and echoed back when allowed.
pub struct CorsPolicy {
    origin_pattern: Regex,
    allow_private_network: bool,
}

impl CorsPolicy {
    pub fn new(origin_pattern: &str, allow_private_network: bool) -> Result<Self, regex::Error> {
        Ok(Self {
            origin_pattern: Regex::new(origin_pattern)?,
            allow_private_network,
        })
    }

    pub fn allows(&self, origin: &str) -> bool {
        self.origin_pattern.is_match(origin)
    }

    pub fn decorate(&self, reply: impl Reply, origin: Option<String>) -> warp::reply::Response {
        let mut response = reply.into_response();
        let headers = response.headers_mut();

        if let Some(origin) = origin.filter(|o| self.allows(o)) {
            if let Ok(value) = HeaderValue::from_str(&origin) {
                headers.insert(ACCESS_CONTROL_ALLOW_ORIGIN, value);
                headers.append(VARY, HeaderValue::from_static("Origin"));
            }
        }

        // Chrome private network access preflight, dev only
        if self.allow_private_network {
            headers.insert(
                "access-control-allow-private-network",
                HeaderValue::from_static("true"),
            );
        }

        response
    }
}

/// Answers an OPTIONS preflight. The allow-origin header is added later by
/// [`CorsPolicy::decorate`].
pub fn preflight(requested_headers: Option<String>) -> warp::reply::Response {
    let mut response = warp::reply::with_status(warp::reply(), StatusCode::NO_CONTENT).into_response();
    let headers = response.headers_mut();

    headers.insert(
        ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static(ALLOWED_METHODS),
    );
    // Any header is allowed: echo back whatever the browser asked for.
    let allow_headers = requested_headers
        .and_then(|h| HeaderValue::from_str(&h).ok())
        .unwrap_or_else(|| HeaderValue::from_static("*"));
    headers.insert(ACCESS_CONTROL_ALLOW_HEADERS, allow_headers);
    headers.insert(ACCESS_CONTROL_MAX_AGE, HeaderValue::from_static("600"));

    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_CORS_ORIGIN_PATTERN;

    fn policy() -> CorsPolicy {
        CorsPolicy::new(DEFAULT_CORS_ORIGIN_PATTERN, false).unwrap()
    }

    #[test]
    fn default_pattern_accepts_localhost_and_renci() {
        let policy = policy();
        assert!(policy.allows("http://localhost"));
        assert!(policy.allows("http://localhost:3000"));
        assert!(policy.allows("https://renci.org"));
        assert!(policy.allows("https://ui.kg.renci.org:8443"));
    }

    #[test]
    fn default_pattern_rejects_other_origins() {
        let policy = policy();
        assert!(!policy.allows("https://example.com"));
        assert!(!policy.allows("https://renci.org.evil.com"));
        assert!(!policy.allows("ftp://localhost"));
    }

    #[test]
    fn allowed_origin_is_echoed() {
        let response = policy().decorate(warp::reply(), Some("http://localhost:8080".to_string()));
        assert_eq!(
            response.headers()[ACCESS_CONTROL_ALLOW_ORIGIN],
            "http://localhost:8080"
        );
        assert!(response
            .headers()
            .get("access-control-allow-private-network")
            .is_none());
    }

    #[test]
    fn disallowed_origin_gets_no_cors_headers() {
        let response = policy().decorate(warp::reply(), Some("https://example.com".to_string()));
        assert!(response.headers().get(ACCESS_CONTROL_ALLOW_ORIGIN).is_none());
    }

    #[test]
    fn dev_mode_adds_private_network_header() {
        let policy = CorsPolicy::new(DEFAULT_CORS_ORIGIN_PATTERN, true).unwrap();
        let response = policy.decorate(warp::reply(), None);
        assert_eq!(response.headers()["access-control-allow-private-network"], "true");
    }

    #[test]
    fn preflight_echoes_requested_headers() {
        let response = preflight(Some("content-type, x-trace".to_string()));
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        assert_eq!(response.headers()[ACCESS_CONTROL_ALLOW_METHODS], "GET, POST");
        assert_eq!(
            response.headers()[ACCESS_CONTROL_ALLOW_HEADERS],
            "content-type, x-trace"
        );
    }
}
