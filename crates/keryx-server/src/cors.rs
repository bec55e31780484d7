//! CORS handling.
//!
//! The demo backend is called from a browser frontend served on a different
//! origin, so the server answers preflight OPTIONS requests and decorates
//! responses with CORS headers. The default policy used by the demo is
//! [`CorsPolicy::permissive`] — any origin, method, and header — which is
//! appropriate for a local demo only.

use std::collections::HashSet;
use std::time::Duration;

use bytes::Bytes;
use http::{HeaderValue, Method, Request, Response, StatusCode};
use http_body_util::Full;

/// Lower-case CORS header names.
mod headers {
    pub const ALLOW_ORIGIN: &str = "access-control-allow-origin";
    pub const ALLOW_METHODS: &str = "access-control-allow-methods";
    pub const ALLOW_HEADERS: &str = "access-control-allow-headers";
    pub const MAX_AGE: &str = "access-control-max-age";
    pub const REQUEST_METHOD: &str = "access-control-request-method";
    pub const ORIGIN: &str = "origin";
    pub const VARY: &str = "vary";
}

/// The set of origins a policy accepts.
#[derive(Debug, Clone)]
pub enum AllowedOrigins {
    /// Any origin (wildcard `*`).
    Any,
    /// An explicit list of origins.
    List(HashSet<String>),
}

impl AllowedOrigins {
    fn is_allowed(&self, origin: &str) -> bool {
        match self {
            Self::Any => true,
            Self::List(origins) => origins.contains(origin),
        }
    }

    fn header_value(&self, origin: &str) -> Option<HeaderValue> {
        match self {
            Self::Any => Some(HeaderValue::from_static("*")),
            Self::List(origins) => origins
                .contains(origin)
                .then(|| HeaderValue::from_str(origin).ok())
                .flatten(),
        }
    }
}

/// A CORS policy applied by the server to every request.
#[derive(Debug, Clone)]
pub struct CorsPolicy {
    allowed_origins: AllowedOrigins,
    allowed_methods: HashSet<Method>,
    allowed_headers: HashSet<String>,
    max_age: Option<Duration>,
}

impl CorsPolicy {
    /// A policy allowing any origin, method, and header.
    ///
    /// For local demos only; do not ship this to production.
    #[must_use]
    pub fn permissive() -> Self {
        Self {
            allowed_origins: AllowedOrigins::Any,
            allowed_methods: HashSet::from([
                Method::GET,
                Method::HEAD,
                Method::POST,
                Method::PUT,
                Method::DELETE,
                Method::PATCH,
                Method::OPTIONS,
            ]),
            allowed_headers: HashSet::from(["*".to_string()]),
            max_age: Some(Duration::from_secs(86400)),
        }
    }

    /// A policy restricted to an explicit list of origins, with the default
    /// method and header sets.
    #[must_use]
    pub fn for_origins<I, S>(origins: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            allowed_origins: AllowedOrigins::List(
                origins.into_iter().map(Into::into).collect(),
            ),
            allowed_methods: HashSet::from([Method::GET, Method::POST, Method::OPTIONS]),
            allowed_headers: HashSet::from(["content-type".to_string()]),
            max_age: Some(Duration::from_secs(86400)),
        }
    }

    /// Whether this request is a CORS preflight.
    #[must_use]
    pub fn is_preflight<B>(&self, request: &Request<B>) -> bool {
        request.method() == Method::OPTIONS
            && request.headers().contains_key(headers::ORIGIN)
            && request.headers().contains_key(headers::REQUEST_METHOD)
    }

    /// Answers a preflight request without touching any handler.
    #[must_use]
    pub fn preflight_response<B>(&self, request: &Request<B>) -> Response<Full<Bytes>> {
        let origin = request
            .headers()
            .get(headers::ORIGIN)
            .and_then(|v| v.to_str().ok());

        let Some(origin) = origin else {
            return forbidden("missing Origin header");
        };
        if !self.allowed_origins.is_allowed(origin) {
            return forbidden("origin not allowed");
        }

        if let Some(requested) = request.headers().get(headers::REQUEST_METHOD) {
            let allowed = requested
                .to_str()
                .ok()
                .and_then(|s| s.parse::<Method>().ok())
                .is_some_and(|m| self.allowed_methods.contains(&m));
            if !allowed {
                return forbidden("method not allowed");
            }
        }

        let mut builder = Response::builder().status(StatusCode::NO_CONTENT);

        if let Some(value) = self.allowed_origins.header_value(origin) {
            builder = builder.header(headers::ALLOW_ORIGIN, value);
        }

        let methods: Vec<_> = self.allowed_methods.iter().map(Method::as_str).collect();
        builder = builder.header(headers::ALLOW_METHODS, methods.join(", "));

        let header_list: Vec<_> = self.allowed_headers.iter().cloned().collect();
        builder = builder.header(headers::ALLOW_HEADERS, header_list.join(", "));

        if let Some(max_age) = self.max_age {
            builder = builder.header(headers::MAX_AGE, max_age.as_secs().to_string());
        }

        builder = builder.header(
            headers::VARY,
            "Origin, Access-Control-Request-Method, Access-Control-Request-Headers",
        );

        builder
            .body(Full::new(Bytes::new()))
            .expect("static preflight response")
    }

    /// Adds CORS headers to a non-preflight response.
    pub fn decorate<B>(&self, response: &mut Response<B>, origin: Option<&str>) {
        let Some(origin) = origin else { return };
        if !self.allowed_origins.is_allowed(origin) {
            return;
        }

        if let Some(value) = self.allowed_origins.header_value(origin) {
            response.headers_mut().insert(headers::ALLOW_ORIGIN, value);
        }
        response
            .headers_mut()
            .insert(headers::VARY, HeaderValue::from_static("Origin"));
    }
}

fn forbidden(message: &str) -> Response<Full<Bytes>> {
    Response::builder()
        .status(StatusCode::FORBIDDEN)
        .header(http::header::CONTENT_TYPE, "text/plain")
        .body(Full::new(Bytes::from(message.to_string())))
        .expect("static forbidden response")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn preflight(origin: &str, method: &str) -> Request<Full<Bytes>> {
        Request::builder()
            .method(Method::OPTIONS)
            .uri("/api/user")
            .header(headers::ORIGIN, origin)
            .header(headers::REQUEST_METHOD, method)
            .body(Full::new(Bytes::new()))
            .unwrap()
    }

    #[test]
    fn permissive_accepts_any_preflight() {
        let cors = CorsPolicy::permissive();
        let request = preflight("http://localhost:3000", "POST");

        assert!(cors.is_preflight(&request));
        let response = cors.preflight_response(&request);

        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        assert_eq!(response.headers().get(headers::ALLOW_ORIGIN).unwrap(), "*");
    }

    #[test]
    fn options_without_request_method_is_not_preflight() {
        let cors = CorsPolicy::permissive();
        let request = Request::builder()
            .method(Method::OPTIONS)
            .uri("/api/user")
            .header(headers::ORIGIN, "http://localhost:3000")
            .body(Full::new(Bytes::new()))
            .unwrap();

        assert!(!cors.is_preflight(&request));
    }

    #[test]
    fn listed_origins_reject_strangers() {
        let cors = CorsPolicy::for_origins(["http://localhost:3000"]);

        let ok = cors.preflight_response(&preflight("http://localhost:3000", "POST"));
        assert_eq!(ok.status(), StatusCode::NO_CONTENT);

        let bad = cors.preflight_response(&preflight("http://evil.example", "POST"));
        assert_eq!(bad.status(), StatusCode::FORBIDDEN);
    }

    #[test]
    fn disallowed_method_is_rejected() {
        let cors = CorsPolicy::for_origins(["http://localhost:3000"]);

        let response = cors.preflight_response(&preflight("http://localhost:3000", "DELETE"));
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[test]
    fn decorate_adds_origin_header() {
        let cors = CorsPolicy::permissive();
        let mut response = Response::builder()
            .status(StatusCode::OK)
            .body(Full::new(Bytes::new()))
            .unwrap();

        cors.decorate(&mut response, Some("http://localhost:3000"));
        assert_eq!(response.headers().get(headers::ALLOW_ORIGIN).unwrap(), "*");
    }

    #[test]
    fn decorate_without_origin_is_a_no_op() {
        let cors = CorsPolicy::permissive();
        let mut response = Response::builder()
            .status(StatusCode::OK)
            .body(Full::new(Bytes::new()))
            .unwrap();

        cors.decorate(&mut response, None);
        assert!(!response.headers().contains_key(headers::ALLOW_ORIGIN));
    }
}
