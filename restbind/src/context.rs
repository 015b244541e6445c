//! Per-request context handed to every typed handler and CRUD hook

use std::sync::Arc;

use axum::http::{HeaderMap, Method, Uri};

/// Header carrying the request id
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Read-only view of the current request
///
/// Always the first argument of a typed handler. Cloning is cheap; hooks
/// receive their own clone.
///
/// ```rust
/// use restbind::context::RequestContext;
/// use axum::http::{HeaderMap, Method, Uri};
///
/// let mut headers = HeaderMap::new();
/// headers.insert("x-request-id", "req-1".parse().unwrap());
///
/// let ctx = RequestContext::new(
///     Method::GET,
///     Uri::from_static("/todos/3?verbose=1"),
///     headers,
///     vec![("id".to_string(), "3".to_string())],
/// );
/// assert_eq!(ctx.request_id(), "req-1");
/// assert_eq!(ctx.path_param("id"), Some("3"));
/// assert_eq!(ctx.query(), Some("verbose=1"));
/// ```
#[derive(Debug, Clone)]
pub struct RequestContext {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    params: Vec<(String, String)>,
    request_id: String,
}

impl RequestContext {
    /// Build a context; the request id is taken from `x-request-id` or generated
    pub fn new(
        method: Method,
        uri: Uri,
        headers: HeaderMap,
        params: Vec<(String, String)>,
    ) -> Self {
        let request_id = headers
            .get(REQUEST_ID_HEADER)
            .and_then(|value| value.to_str().ok())
            .filter(|value| !value.is_empty())
            .map(str::to_owned)
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

        Self {
            inner: Arc::new(Inner {
                method,
                uri,
                headers,
                params,
                request_id,
            }),
        }
    }

    pub fn method(&self) -> &Method {
        &self.inner.method
    }

    pub fn uri(&self) -> &Uri {
        &self.inner.uri
    }

    pub fn path(&self) -> &str {
        self.inner.uri.path()
    }

    /// Raw query string, if any
    pub fn query(&self) -> Option<&str> {
        self.inner.uri.query()
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.inner.headers
    }

    /// A header value, if present and valid UTF-8
    pub fn header(&self, name: &str) -> Option<&str> {
        self.inner
            .headers
            .get(name)
            .and_then(|value| value.to_str().ok())
    }

    /// Matched path parameters in route order
    pub fn path_params(&self) -> &[(String, String)] {
        &self.inner.params
    }

    pub fn path_param(&self, name: &str) -> Option<&str> {
        self.inner
            .params
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn request_id(&self) -> &str {
        &self.inner.request_id
    }
}

impl Default for RequestContext {
    /// A detached `GET /` context, for calling pipelines outside a request
    fn default() -> Self {
        Self::new(Method::GET, Uri::from_static("/"), HeaderMap::new(), Vec::new())
    }
}
