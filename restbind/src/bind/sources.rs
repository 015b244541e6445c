//! Raw request data the binder reads from

use axum::body::Bytes;
use serde_json::{Map, Value};

/// The three request sources a typed input is bound from
///
/// Built by the dispatcher for every request; tests and custom
/// [`Bindable`](super::Bindable) impls can build one directly.
///
/// ```rust
/// use restbind::bind::BindSources;
///
/// let sources = BindSources::new()
///     .with_query("page=2&tag=a&tag=b")
///     .with_uri_params([("id", "7")])
///     .with_body(r#"{"title":"milk"}"#);
///
/// assert_eq!(sources.uri_param("id"), Some("7"));
/// assert_eq!(sources.query_pairs().len(), 3);
/// ```
#[derive(Debug, Clone, Default)]
pub struct BindSources {
    query: Vec<(String, String)>,
    uri: Vec<(String, String)>,
    body: Bytes,
    content_type: Option<String>,
}

impl BindSources {
    /// Empty sources: no query, no path parameters, no body
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a raw (still percent-encoded) query string
    #[must_use]
    pub fn with_query(mut self, raw: &str) -> Self {
        self.query = url::form_urlencoded::parse(raw.as_bytes())
            .into_owned()
            .collect();
        self
    }

    /// Set the matched path parameters
    #[must_use]
    pub fn with_uri_params<I, K, V>(mut self, params: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.uri = params
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        self
    }

    /// Set the request body
    #[must_use]
    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    /// Set the body's media type
    #[must_use]
    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    /// Decoded query pairs in request order, repeated keys included
    pub fn query_pairs(&self) -> &[(String, String)] {
        &self.query
    }

    /// Path parameters in route order
    pub fn uri_params(&self) -> &[(String, String)] {
        &self.uri
    }

    /// A single path parameter by name
    pub fn uri_param(&self, name: &str) -> Option<&str> {
        self.uri
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// The raw body
    pub fn body(&self) -> &Bytes {
        &self.body
    }

    pub(crate) fn is_form_body(&self) -> bool {
        self.content_type
            .as_deref()
            .and_then(|ct| ct.split(';').next())
            .is_some_and(|mime| {
                mime.trim()
                    .eq_ignore_ascii_case("application/x-www-form-urlencoded")
            })
    }
}

/// Group string pairs by key: one value stays a string, repeats become an array
pub(crate) fn group_pairs<'a>(
    pairs: impl IntoIterator<Item = (&'a str, &'a str)>,
) -> Map<String, Value> {
    let mut grouped = Map::new();
    for (key, value) in pairs {
        match grouped.get_mut(key) {
            Some(Value::Array(items)) => items.push(Value::from(value)),
            Some(existing) => {
                let first = existing.take();
                *existing = Value::Array(vec![first, Value::from(value)]);
            }
            None => {
                grouped.insert(key.to_string(), Value::from(value));
            }
        }
    }
    grouped
}
