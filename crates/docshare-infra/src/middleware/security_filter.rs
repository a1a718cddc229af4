//! Request security filter
//!
//! Every request passes through the same stages: query and form parameters are
//! run through the HTML sanitizer, non-exempt header values are cleaned, the
//! request is forwarded, and the fixed set of defensive headers is written onto
//! whatever response comes back.

use std::collections::HashSet;
use std::sync::Arc;

use axum::body::Body;
use axum::http::header::{CONTENT_LENGTH, CONTENT_TYPE};
use axum::http::uri::PathAndQuery;
use axum::http::{HeaderMap, HeaderName, HeaderValue, StatusCode, Uri};
use axum::response::IntoResponse;
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use docshare_core::config::SecurityConfig;
use docshare_core::validation::normalize_mime_type;
use docshare_core::{AppError, HtmlSanitizer};
use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};

const FORM_URLENCODED: &str = "application/x-www-form-urlencoded";

/// Everything except RFC 3986 unreserved characters.
const COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

/// Sanitizes inbound parameters and headers and stamps defensive response headers.
#[derive(Debug, Clone)]
pub struct RequestSecurityFilter {
    exempt_headers: HashSet<HeaderName>,
    max_form_body_bytes: usize,
    response_headers: Vec<(HeaderName, HeaderValue)>,
    sanitizer: HtmlSanitizer,
}

impl RequestSecurityFilter {
    pub fn new<I, S>(
        content_security_policy: &str,
        exempt_headers: I,
        max_form_body_bytes: usize,
    ) -> Result<Self, AppError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let csp = content_security_policy.trim();
        if csp.is_empty() {
            return Err(AppError::Configuration(
                "Content-Security-Policy cannot be empty".to_string(),
            ));
        }
        let csp = HeaderValue::from_str(csp).map_err(|_| {
            AppError::Configuration("Content-Security-Policy is not a valid header value".to_string())
        })?;

        let mut exempt = HashSet::new();
        for name in exempt_headers {
            let name = name.as_ref().trim();
            if name.is_empty() {
                continue;
            }
            let parsed = HeaderName::from_bytes(name.to_ascii_lowercase().as_bytes())
                .map_err(|_| {
                    AppError::Configuration(format!("Invalid exempt header name: {}", name))
                })?;
            exempt.insert(parsed);
        }

        let response_headers = vec![
            (HeaderName::from_static("content-security-policy"), csp),
            (
                HeaderName::from_static("x-frame-options"),
                HeaderValue::from_static("DENY"),
            ),
            (
                HeaderName::from_static("x-content-type-options"),
                HeaderValue::from_static("nosniff"),
            ),
            (
                HeaderName::from_static("x-xss-protection"),
                HeaderValue::from_static("1; mode=block"),
            ),
            (
                HeaderName::from_static("referrer-policy"),
                HeaderValue::from_static("strict-origin-when-cross-origin"),
            ),
        ];

        Ok(Self {
            exempt_headers: exempt,
            max_form_body_bytes,
            response_headers,
            sanitizer: HtmlSanitizer::new(),
        })
    }

    pub fn from_config(config: &SecurityConfig) -> Result<Self, AppError> {
        Self::new(
            &config.content_security_policy,
            &config.sanitize_exempt_headers,
            config.max_form_body_bytes,
        )
    }

    /// The defensive headers written onto every response.
    pub fn response_headers(&self) -> &[(HeaderName, HeaderValue)] {
        &self.response_headers
    }

    pub fn is_exempt(&self, name: &HeaderName) -> bool {
        self.exempt_headers.contains(name)
    }

    /// Insert the defensive headers, replacing anything set downstream.
    pub fn apply_response_headers(&self, headers: &mut HeaderMap) {
        for (name, value) in &self.response_headers {
            headers.insert(name.clone(), value.clone());
        }
    }

    /// Sanitize one `application/x-www-form-urlencoded` component.
    ///
    /// Clean components are returned byte-for-byte; modified ones are re-encoded.
    fn sanitize_component(&self, raw: &str) -> String {
        let plus_as_space = raw.replace('+', " ");
        let decoded = percent_decode_str(&plus_as_space).decode_utf8_lossy();
        let cleaned = self.sanitizer.sanitize_html(&decoded);
        if cleaned == decoded {
            raw.to_string()
        } else {
            utf8_percent_encode(&cleaned, COMPONENT).to_string()
        }
    }

    /// Sanitize every `key=value` pair, keeping repeated keys in order.
    pub fn sanitize_query(&self, query: &str) -> String {
        query
            .split('&')
            .map(|pair| match pair.split_once('=') {
                Some((key, value)) => format!(
                    "{}={}",
                    self.sanitize_component(key),
                    self.sanitize_component(value)
                ),
                None if pair.is_empty() => String::new(),
                None => self.sanitize_component(pair),
            })
            .collect::<Vec<_>>()
            .join("&")
    }

    /// Clean every non-exempt header value. Exempt headers are left untouched.
    pub fn sanitize_headers(&self, headers: &mut HeaderMap) {
        let original = std::mem::take(headers);
        for (name, value) in original.iter() {
            if self.is_exempt(name) {
                headers.append(name.clone(), value.clone());
                continue;
            }

            let text = String::from_utf8_lossy(value.as_bytes());
            let cleaned = self.sanitizer.sanitize_html(&text);
            if cleaned == text {
                headers.append(name.clone(), value.clone());
                continue;
            }

            tracing::debug!(header = %name, "Sanitized request header value");
            match HeaderValue::from_str(&cleaned) {
                Ok(cleaned_value) => {
                    headers.append(name.clone(), cleaned_value);
                }
                Err(_) => {
                    tracing::warn!(header = %name, "Dropped header that could not be re-encoded");
                }
            }
        }
    }

    fn sanitize_uri(&self, uri: &Uri) -> Result<Option<Uri>, StatusCode> {
        let Some(query) = uri.query() else {
            return Ok(None);
        };

        let cleaned = self.sanitize_query(query);
        if cleaned == query {
            return Ok(None);
        }

        tracing::debug!(path = %uri.path(), "Sanitized query parameters");
        let path_and_query = PathAndQuery::try_from(format!("{}?{}", uri.path(), cleaned))
            .map_err(|_| StatusCode::BAD_REQUEST)?;
        let mut parts = uri.clone().into_parts();
        parts.path_and_query = Some(path_and_query);
        Uri::from_parts(parts)
            .map(Some)
            .map_err(|_| StatusCode::BAD_REQUEST)
    }

    fn is_form(headers: &HeaderMap) -> bool {
        headers
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| normalize_mime_type(v) == FORM_URLENCODED)
            .unwrap_or(false)
    }

    /// Rewrite the request in place; a failure is the status to answer with.
    pub async fn wrap_request(&self, request: Request) -> Result<Request, StatusCode> {
        let (mut parts, body) = request.into_parts();

        if let Some(uri) = self.sanitize_uri(&parts.uri)? {
            parts.uri = uri;
        }

        self.sanitize_headers(&mut parts.headers);

        let body = if Self::is_form(&parts.headers) {
            let bytes = axum::body::to_bytes(body, self.max_form_body_bytes)
                .await
                .map_err(|err| {
                    tracing::debug!(error = %err, "Form body could not be read");
                    StatusCode::PAYLOAD_TOO_LARGE
                })?;
            let form = String::from_utf8_lossy(&bytes);
            let cleaned = self.sanitize_query(&form);
            if cleaned == form {
                Body::from(bytes)
            } else {
                tracing::debug!("Sanitized form body parameters");
                parts
                    .headers
                    .insert(CONTENT_LENGTH, HeaderValue::from(cleaned.len()));
                Body::from(cleaned)
            }
        } else {
            body
        };

        Ok(Request::from_parts(parts, body))
    }
}

/// Request security filter middleware
///
/// Install with `axum::middleware::from_fn_with_state`. Anything that can panic
/// must sit inside this layer (behind a catch-panic layer) so that the headers
/// are also present on 500 responses.
pub async fn security_filter_middleware(
    State(filter): State<Arc<RequestSecurityFilter>>,
    request: Request,
    next: Next,
) -> Response {
    let mut response = match filter.wrap_request(request).await {
        Ok(request) => next.run(request).await,
        Err(status) => status.into_response(),
    };

    filter.apply_response_headers(response.headers_mut());
    response
}
