//! Typed handler adaptation
//!
//! A typed handler is any async function (or closure) whose first parameter is
//! a [`RequestContext`], optionally followed by one [`Bindable`] input, and
//! whose future resolves to `Result<O, E>`:
//!
//! ```rust
//! use restbind::prelude::*;
//! # use serde::{Deserialize, Serialize};
//! # #[derive(Default, Serialize, Deserialize)]
//! # struct Greeting { name: String }
//! # impl FieldTags for Greeting {}
//!
//! async fn ping(_ctx: RequestContext) -> anyhow::Result<&'static str> {
//!     Ok("pong")
//! }
//!
//! async fn greet(_ctx: RequestContext, input: Greeting) -> anyhow::Result<String> {
//!     Ok(format!("hello {}", input.name))
//! }
//!
//! let mut routes = Routes::new();
//! routes.get("/ping", ping).unwrap();
//! routes.get("/greet", greet).unwrap();
//! ```
//!
//! The shape is checked by the compiler. A plain value is not a handler:
//!
//! ```rust,compile_fail
//! use restbind::prelude::*;
//!
//! let mut routes = Routes::new();
//! routes.get("/x", 42).unwrap();
//! ```
//!
//! The first parameter must be the request context:
//!
//! ```rust,compile_fail
//! use restbind::prelude::*;
//!
//! async fn wrong(name: String) -> anyhow::Result<String> {
//!     Ok(name)
//! }
//!
//! let mut routes = Routes::new();
//! routes.get("/x", wrong).unwrap();
//! ```
//!
//! And the result must be a `Result`:
//!
//! ```rust,compile_fail
//! use restbind::prelude::*;
//!
//! async fn bare(_ctx: RequestContext) -> String {
//!     String::new()
//! }
//!
//! let mut routes = Routes::new();
//! routes.get("/x", bare).unwrap();
//! ```

use std::any::type_name;
use std::fmt;
use std::future::Future;

use axum::{
    body::to_bytes,
    extract::{rejection::RawPathParamsRejection, FromRequestParts, RawPathParams, Request},
    http::header::CONTENT_TYPE,
    response::{IntoResponse, Response},
};
use futures::future::BoxFuture;
use serde::Serialize;

use crate::bind::{BindError, BindPhase, BindSources, Bindable};
use crate::context::RequestContext;
use crate::envelope::Envelope;

/// Static description of a typed handler
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HandlerDescriptor {
    /// Whether the handler declares an input after the context
    pub takes_input: bool,
    /// Input type name, `()` when there is none
    pub input: &'static str,
    /// Payload type name
    pub output: &'static str,
    /// Error type name
    pub error: &'static str,
}

impl fmt::Display for HandlerDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "fn(RequestContext{}{}) -> Result<{}, {}>",
            if self.takes_input { ", " } else { "" },
            if self.takes_input { self.input } else { "" },
            self.output,
            self.error
        )
    }
}

/// The handler's own error, reported to the client as envelope status 500
#[derive(Debug)]
pub struct TargetError(anyhow::Error);

impl TargetError {
    pub fn new(error: impl Into<anyhow::Error>) -> Self {
        Self(error.into())
    }

    pub fn into_inner(self) -> anyhow::Error {
        self.0
    }
}

impl fmt::Display for TargetError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl std::error::Error for TargetError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.0.source()
    }
}

/// Why a dispatched call produced no payload
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error(transparent)]
    Bind(#[from] BindError),
    #[error(transparent)]
    Target(TargetError),
}

/// An async function usable as a route handler
///
/// Implemented for `Fn(RequestContext) -> Fut` and
/// `Fn(RequestContext, I) -> Fut` where `Fut: Future<Output = Result<O, E>>`,
/// `I: Bindable`, `O: Serialize`, and `E: Into<anyhow::Error>`. The `M` marker
/// only tells the two shapes apart; callers never name it.
pub trait TypedHandler<M>: Clone + Send + Sync + 'static {
    /// The success payload
    type Output: Serialize + Send + 'static;

    /// Whether requests must be bound before the call
    const TAKES_INPUT: bool;

    /// Static description of this handler
    fn descriptor() -> HandlerDescriptor;

    /// Bind the input (if any) and invoke the function
    fn invoke(
        self,
        ctx: RequestContext,
        sources: BindSources,
    ) -> BoxFuture<'static, Result<Self::Output, DispatchError>>;
}

impl<F, Fut, O, E> TypedHandler<(RequestContext, Result<O, E>)> for F
where
    F: Fn(RequestContext) -> Fut + Clone + Send + Sync + 'static,
    Fut: Future<Output = Result<O, E>> + Send + 'static,
    O: Serialize + Send + 'static,
    E: Into<anyhow::Error> + 'static,
{
    type Output = O;

    const TAKES_INPUT: bool = false;

    fn descriptor() -> HandlerDescriptor {
        HandlerDescriptor {
            takes_input: false,
            input: "()",
            output: type_name::<O>(),
            error: type_name::<E>(),
        }
    }

    fn invoke(
        self,
        ctx: RequestContext,
        _sources: BindSources,
    ) -> BoxFuture<'static, Result<O, DispatchError>> {
        Box::pin(async move {
            (self)(ctx)
                .await
                .map_err(|e| DispatchError::Target(TargetError::new(e)))
        })
    }
}

impl<F, Fut, I, O, E> TypedHandler<(RequestContext, I, Result<O, E>)> for F
where
    F: Fn(RequestContext, I) -> Fut + Clone + Send + Sync + 'static,
    Fut: Future<Output = Result<O, E>> + Send + 'static,
    I: Bindable,
    O: Serialize + Send + 'static,
    E: Into<anyhow::Error> + 'static,
{
    type Output = O;

    const TAKES_INPUT: bool = true;

    fn descriptor() -> HandlerDescriptor {
        HandlerDescriptor {
            takes_input: true,
            input: type_name::<I>(),
            output: type_name::<O>(),
            error: type_name::<E>(),
        }
    }

    fn invoke(
        self,
        ctx: RequestContext,
        sources: BindSources,
    ) -> BoxFuture<'static, Result<O, DispatchError>> {
        Box::pin(async move {
            let input = I::bind(&sources)?;
            (self)(ctx, input)
                .await
                .map_err(|e| DispatchError::Target(TargetError::new(e)))
        })
    }
}

/// Run one request through a typed handler and write the envelope
///
/// Every outcome, including unreadable bodies and serialization failures,
/// ends as an envelope with HTTP 200.
pub(crate) async fn dispatch<H, M>(handler: H, request: Request, body_limit: usize) -> Response
where
    H: TypedHandler<M>,
{
    let (mut parts, body) = request.into_parts();

    let params: Vec<(String, String)> =
        match RawPathParams::from_request_parts(&mut parts, &()).await {
            Ok(raw) => raw
                .iter()
                .map(|(key, value)| (key.to_owned(), value.to_owned()))
                .collect(),
            Err(RawPathParamsRejection::MissingPathParams(_)) => Vec::new(),
            Err(rejection) => {
                return bind_failure(BindError::new(BindPhase::Uri, rejection.body_text()));
            }
        };

    let mut sources = BindSources::new().with_uri_params(params.iter().cloned());
    if H::TAKES_INPUT {
        if let Some(query) = parts.uri.query() {
            sources = sources.with_query(query);
        }
        if let Some(content_type) = parts
            .headers
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
        {
            sources = sources.with_content_type(content_type);
        }
        match to_bytes(body, body_limit).await {
            Ok(bytes) => sources = sources.with_body(bytes),
            Err(e) => {
                return bind_failure(BindError::new(
                    BindPhase::Body,
                    format!("failed to read request body: {}", e),
                ));
            }
        }
    }

    let ctx = RequestContext::new(parts.method, parts.uri, parts.headers, params);
    let request_id = ctx.request_id().to_owned();

    match handler.invoke(ctx, sources).await {
        Ok(payload) => match serde_json::to_value(&payload) {
            Ok(data) => Envelope::success(data).into_response(),
            Err(e) => {
                tracing::warn!(%request_id, error = %e, "handler payload could not be serialized");
                Envelope::internal(format!("failed to serialize response: {}", e)).into_response()
            }
        },
        Err(DispatchError::Bind(e)) => {
            tracing::debug!(%request_id, phase = %e.phase, error = %e, "request binding failed");
            bind_failure(e)
        }
        Err(DispatchError::Target(e)) => {
            tracing::warn!(%request_id, error = %e, "handler returned an error");
            Envelope::internal(e.to_string()).into_response()
        }
    }
}

fn bind_failure(error: BindError) -> Response {
    Envelope::bad_request(error.to_string()).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bind::FieldTags;
    use serde::Deserialize;

    #[derive(Debug, Default, Serialize, Deserialize)]
    struct Add {
        a: i64,
        b: i64,
    }

    impl FieldTags for Add {}

    async fn sum(_ctx: RequestContext, input: Add) -> anyhow::Result<i64> {
        Ok(input.a + input.b)
    }

    async fn fail(_ctx: RequestContext) -> Result<(), std::io::Error> {
        Err(std::io::Error::other("disk on fire"))
    }

    fn descriptor_of<H: TypedHandler<M>, M>(_handler: &H) -> HandlerDescriptor {
        H::descriptor()
    }

    #[test]
    fn test_descriptor() {
        let with_input = descriptor_of(&sum);
        assert!(with_input.takes_input);
        assert!(with_input.input.ends_with("Add"));
        assert_eq!(with_input.output, "i64");

        let without = descriptor_of(&fail);
        assert!(!without.takes_input);
        assert_eq!(without.output, "()");
        assert!(without.to_string().starts_with("fn(RequestContext) -> Result<()"));
    }

    #[tokio::test]
    async fn test_call_binds_input() {
        let sources = BindSources::new().with_query("a=2&b=40");
        let result = sum.invoke(RequestContext::default(), sources).await.unwrap();
        assert_eq!(result, 42);
    }

    #[tokio::test]
    async fn test_call_reports_bind_error() {
        let sources = BindSources::new().with_query("a=two");
        let err = sum.invoke(RequestContext::default(), sources).await.unwrap_err();
        assert!(matches!(err, DispatchError::Bind(ref e) if e.phase == BindPhase::Query));
    }

    #[tokio::test]
    async fn test_call_reports_target_error() {
        let err = fail
            .invoke(RequestContext::default(), BindSources::new())
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "disk on fire");
    }

    #[tokio::test]
    async fn test_closures_are_handlers() {
        let offset = 10;
        let handler = move |_ctx: RequestContext, input: Add| async move {
            Ok::<_, anyhow::Error>(input.a + offset)
        };
        let sources = BindSources::new().with_query("a=5");
        assert_eq!(handler.invoke(RequestContext::default(), sources).await.unwrap(), 15);
    }
}
