//! Router facade for typed handlers
//!
//! [`Routes`] wraps an axum [`Router`] and only accepts [`TypedHandler`]s.
//! Registration validates the route before any traffic: the handler shape is
//! checked by the compiler, and the path and method by [`Routes::register`],
//! which returns a [`SignatureError`] instead of letting axum panic.
//!
//! Paths accept both `/items/:id` and `/items/{id}`; the colon form is
//! rewritten to axum's brace syntax.
//!
//! # Example
//!
//! ```rust
//! use restbind::prelude::*;
//!
//! async fn health(_ctx: RequestContext) -> anyhow::Result<&'static str> {
//!     Ok("ok")
//! }
//!
//! let mut routes = Routes::new();
//! routes.get("/health", health).unwrap();
//! let router: axum::Router = routes.into_router();
//! ```

use std::collections::{BTreeMap, BTreeSet};

use axum::{
    extract::Request,
    http::Method,
    routing::{on, MethodFilter},
    Router,
};

use crate::adapter::{dispatch, TypedHandler};

/// Request body limit applied when none is configured (2 MiB)
pub const DEFAULT_BODY_LIMIT: usize = 2 * 1024 * 1024;

/// A route could not be registered
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SignatureError {
    #[error("route path must not be empty")]
    EmptyPath,

    #[error("route path `{path}` must start with `/`")]
    MissingLeadingSlash { path: String },

    #[error("route path `{path}` has a malformed segment `{segment}`")]
    MalformedSegment { path: String, segment: String },

    #[error("method `{method}` cannot be routed")]
    UnsupportedMethod { method: String },

    #[error("a handler is already registered for {method} {path}")]
    DuplicateRoute { method: String, path: String },

    #[error("route path `{path}` conflicts with `{existing}`")]
    ConflictingRoute { path: String, existing: String },
}

fn is_param_name(name: &str) -> bool {
    !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Validate a route path and rewrite `:name` / `*name` segments to braces
///
/// ```rust
/// use restbind::routes::normalize_path;
///
/// assert_eq!(normalize_path("/todos/:id").unwrap(), "/todos/{id}");
/// assert_eq!(normalize_path("/files/*rest").unwrap(), "/files/{*rest}");
/// assert!(normalize_path("todos").is_err());
/// ```
pub fn normalize_path(path: &str) -> Result<String, SignatureError> {
    if path.is_empty() {
        return Err(SignatureError::EmptyPath);
    }
    if !path.starts_with('/') {
        return Err(SignatureError::MissingLeadingSlash {
            path: path.to_string(),
        });
    }

    let malformed = |segment: &str| SignatureError::MalformedSegment {
        path: path.to_string(),
        segment: segment.to_string(),
    };

    let segments: Vec<&str> = path.split('/').collect();
    let last = segments.len() - 1;
    let mut normalized = Vec::with_capacity(segments.len());

    for (i, segment) in segments.iter().enumerate() {
        let rewritten = if let Some(name) = segment.strip_prefix(':') {
            if !is_param_name(name) {
                return Err(malformed(segment));
            }
            format!("{{{}}}", name)
        } else if let Some(name) = segment.strip_prefix('*') {
            if !is_param_name(name) || i != last {
                return Err(malformed(segment));
            }
            format!("{{*{}}}", name)
        } else if let Some(inner) = segment.strip_prefix('{') {
            let name = inner.strip_suffix('}').ok_or_else(|| malformed(segment))?;
            let (wildcard, name) = match name.strip_prefix('*') {
                Some(rest) => (true, rest),
                None => (false, name),
            };
            if !is_param_name(name) || (wildcard && i != last) {
                return Err(malformed(segment));
            }
            segment.to_string()
        } else if segment.contains(['{', '}']) {
            return Err(malformed(segment));
        } else {
            segment.to_string()
        };
        normalized.push(rewritten);
    }

    Ok(normalized.join("/"))
}

/// The path with parameter names erased; two paths with one shape must agree
fn shape_of(path: &str) -> String {
    path.split('/')
        .map(|segment| {
            if segment.starts_with("{*") {
                "{*}"
            } else if segment.starts_with('{') {
                "{}"
            } else {
                segment
            }
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// Typed-handler router
///
/// Build with [`Routes::new`], register handlers, then hand the result of
/// [`Routes::into_router`] to the server.
#[derive(Debug)]
pub struct Routes<S = ()> {
    router: Router<S>,
    registered: BTreeSet<(String, String)>,
    shapes: BTreeMap<String, String>,
    body_limit: usize,
}

impl Routes<()> {
    /// An empty stateless router
    pub fn new() -> Self {
        Self::from_router(Router::new())
    }
}

impl Default for Routes<()> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S> Routes<S>
where
    S: Clone + Send + Sync + 'static,
{
    /// Register typed handlers on top of an existing router
    pub fn from_router(router: Router<S>) -> Self {
        Self {
            router,
            registered: BTreeSet::new(),
            shapes: BTreeMap::new(),
            body_limit: DEFAULT_BODY_LIMIT,
        }
    }

    /// Maximum request body size read by handlers registered afterwards
    #[must_use]
    pub fn with_body_limit(mut self, bytes: usize) -> Self {
        self.body_limit = bytes;
        self
    }

    /// Register `handler` for `method` on `path`
    ///
    /// Fails without touching the router when the path is malformed, the
    /// method is not routable, or the route is already taken.
    pub fn register<H, M>(
        &mut self,
        method: Method,
        path: &str,
        handler: H,
    ) -> Result<&mut Self, SignatureError>
    where
        H: TypedHandler<M>,
        M: 'static,
    {
        let path = normalize_path(path)?;
        let filter = MethodFilter::try_from(method.clone()).map_err(|_| {
            SignatureError::UnsupportedMethod {
                method: method.to_string(),
            }
        })?;

        let key = (method.to_string(), path.clone());
        if self.registered.contains(&key) {
            return Err(SignatureError::DuplicateRoute {
                method: key.0,
                path: key.1,
            });
        }
        let shape = shape_of(&path);
        if let Some(existing) = self.shapes.get(&shape) {
            if *existing != path {
                return Err(SignatureError::ConflictingRoute {
                    path,
                    existing: existing.clone(),
                });
            }
        }

        tracing::debug!(
            method = %method,
            path = %path,
            handler = %H::descriptor(),
            "registering typed handler"
        );

        let limit = self.body_limit;
        let method_router = on(filter, move |request: Request| {
            dispatch::<H, M>(handler.clone(), request, limit)
        });
        let router = std::mem::replace(&mut self.router, Router::new());
        self.router = router.route(&path, method_router);

        self.shapes.insert(shape, path);
        self.registered.insert(key);
        Ok(self)
    }

    pub fn get<H, M>(&mut self, path: &str, handler: H) -> Result<&mut Self, SignatureError>
    where
        H: TypedHandler<M>,
        M: 'static,
    {
        self.register(Method::GET, path, handler)
    }

    pub fn post<H, M>(&mut self, path: &str, handler: H) -> Result<&mut Self, SignatureError>
    where
        H: TypedHandler<M>,
        M: 'static,
    {
        self.register(Method::POST, path, handler)
    }

    pub fn put<H, M>(&mut self, path: &str, handler: H) -> Result<&mut Self, SignatureError>
    where
        H: TypedHandler<M>,
        M: 'static,
    {
        self.register(Method::PUT, path, handler)
    }

    pub fn patch<H, M>(&mut self, path: &str, handler: H) -> Result<&mut Self, SignatureError>
    where
        H: TypedHandler<M>,
        M: 'static,
    {
        self.register(Method::PATCH, path, handler)
    }

    pub fn delete<H, M>(&mut self, path: &str, handler: H) -> Result<&mut Self, SignatureError>
    where
        H: TypedHandler<M>,
        M: 'static,
    {
        self.register(Method::DELETE, path, handler)
    }

    /// Registered `(method, path)` pairs in sorted order
    pub fn registered(&self) -> impl Iterator<Item = (&str, &str)> {
        self.registered
            .iter()
            .map(|(method, path)| (method.as_str(), path.as_str()))
    }

    /// Finish registration and return the axum router
    pub fn into_router(self) -> Router<S> {
        self.router
    }
}
