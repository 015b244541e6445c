//! Request binding: query, path parameters, and body into one typed value
//!
//! Binding runs in a fixed order and each phase may overwrite what an earlier
//! phase set:
//!
//! 1. **query** - the decoded query string, keys mapped through
//!    [`FieldTags::query_field`]
//! 2. **uri** - matched path parameters, keys mapped through
//!    [`FieldTags::uri_field`]
//! 3. **body** - only when the body is non-empty; JSON, or form fields for
//!    `application/x-www-form-urlencoded`
//!
//! Binding starts from `T::default()`, so fields no source mentions keep their
//! zero value. Strings from the query, path and form bodies are coerced weakly
//! into the field types (`"10"` into an integer, `"true"` into a bool, a single
//! value into a one-element `Vec`). JSON bodies are decoded strictly: a body of
//! `{"age":"10"}` fails when `age` is an integer.
//!
//! Fields that are skipped on serialization never appear in the starting value,
//! so they need `#[serde(default)]` (see [`FieldTags`]).
//!
//! # Example
//!
//! ```rust
//! use restbind::bind::{BindSources, Bindable, FieldTags};
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Debug, Default, Serialize, Deserialize)]
//! struct Search {
//!     name: String,
//!     age: u32,
//!     id: u64,
//! }
//!
//! impl FieldTags for Search {}
//!
//! let sources = BindSources::new()
//!     .with_query("name=ann&age=10")
//!     .with_uri_params([("id", "7")])
//!     .with_body(r#"{"name":"bob"}"#);
//!
//! let search = Search::bind(&sources).unwrap();
//! assert_eq!(search.name, "bob"); // body wins over query
//! assert_eq!(search.age, 10);
//! assert_eq!(search.id, 7);
//! ```

mod params;
mod sources;
pub(crate) mod weak;

use std::fmt;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

pub use params::{IdParam, WithId};
pub use sources::BindSources;

/// Which binding phase failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BindPhase {
    /// Query string
    Query,
    /// Path parameters
    Uri,
    /// Request body
    Body,
}

impl fmt::Display for BindPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Query => write!(f, "query"),
            Self::Uri => write!(f, "uri"),
            Self::Body => write!(f, "body"),
        }
    }
}

/// A request could not be bound into the handler's input type
///
/// Reported to the client as an envelope with status 400.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("bind {phase} params failed: {message}")]
pub struct BindError {
    /// The phase that failed
    pub phase: BindPhase,
    /// Decoder message
    pub message: String,
}

impl BindError {
    /// Create a bind error for `phase`
    pub fn new(phase: BindPhase, message: impl Into<String>) -> Self {
        Self {
            phase,
            message: message.into(),
        }
    }
}

/// Per-type key mapping for the query and uri namespaces
///
/// Implementing this trait (usually with an empty body) makes a serde type
/// bindable. Override the mapping to accept external names that differ from
/// the serde field names, or return `None` to ignore a key in that namespace.
/// Body keys always use the serde field names.
///
/// Binding starts from the serialized `T::default()`. A field marked
/// `#[serde(skip_serializing)]` is missing from that value, so it must also
/// carry `#[serde(default)]` (or the container must); otherwise any request
/// that sets a query or path key fails with "missing field".
///
/// ```rust
/// use restbind::bind::FieldTags;
/// # use serde::{Deserialize, Serialize};
/// # #[derive(Default, Serialize, Deserialize)]
/// # struct Listing { per_page: u32 }
///
/// impl FieldTags for Listing {
///     fn query_field(key: &str) -> Option<&str> {
///         match key {
///             "perPage" => Some("per_page"),
///             other => Some(other),
///         }
///     }
/// }
/// ```
pub trait FieldTags: Default + Serialize + DeserializeOwned + Send + 'static {
    /// Field name for a query key
    fn query_field(key: &str) -> Option<&str> {
        Some(key)
    }

    /// Field name for a path parameter
    fn uri_field(key: &str) -> Option<&str> {
        Some(key)
    }
}

impl<T: FieldTags> FieldTags for Box<T> {
    fn query_field(key: &str) -> Option<&str> {
        T::query_field(key)
    }

    fn uri_field(key: &str) -> Option<&str> {
        T::uri_field(key)
    }
}

/// A handler input that can be produced from request sources
///
/// Every [`FieldTags`] type is bindable through the three-phase algorithm;
/// [`WithId`] and [`IdParam`] bind their id from the path only.
pub trait Bindable: Sized + Send + 'static {
    /// Build the input from one request's sources
    fn bind(sources: &BindSources) -> Result<Self, BindError>;
}

impl<T: FieldTags> Bindable for T {
    fn bind(sources: &BindSources) -> Result<Self, BindError> {
        bind_fields(sources)
    }
}

fn decode<T: DeserializeOwned>(value: &Value, phase: BindPhase) -> Result<T, BindError> {
    weak::decode(value).map_err(|e| BindError::new(phase, e.to_string()))
}

fn decode_strict<T: DeserializeOwned>(value: Value) -> Result<T, BindError> {
    serde_json::from_value(value).map_err(|e| BindError::new(BindPhase::Body, e.to_string()))
}

/// Replace raw query and path strings with their typed form
fn normalize<T: Serialize>(acc: &mut Value, bound: &T) -> Result<(), BindError> {
    let typed =
        serde_json::to_value(bound).map_err(|e| BindError::new(BindPhase::Body, e.to_string()))?;
    if let (Value::Object(target), Value::Object(fields)) = (acc, typed) {
        target.extend(fields);
    }
    Ok(())
}

/// Overlay mapped entries onto the accumulator; false when nothing applied
fn overlay(
    acc: &mut Value,
    entries: serde_json::Map<String, Value>,
    field: impl Fn(&str) -> Option<&str>,
) -> bool {
    let Value::Object(target) = acc else {
        return false;
    };
    let mut applied = false;
    for (key, value) in entries {
        if let Some(name) = field(&key) {
            target.insert(name.to_string(), value);
            applied = true;
        }
    }
    applied
}

fn parse_body(sources: &BindSources) -> Result<Value, BindError> {
    if sources.is_form_body() {
        let pairs: Vec<(String, String)> = url::form_urlencoded::parse(sources.body())
            .into_owned()
            .collect();
        let grouped = sources::group_pairs(pairs.iter().map(|(k, v)| (k.as_str(), v.as_str())));
        return Ok(Value::Object(grouped));
    }
    serde_json::from_slice(sources.body())
        .map_err(|e| BindError::new(BindPhase::Body, e.to_string()))
}

/// Run the query, uri, body phases for a [`FieldTags`] type
pub fn bind_fields<T: FieldTags>(sources: &BindSources) -> Result<T, BindError> {
    let mut acc = serde_json::to_value(T::default())
        .map_err(|e| BindError::new(BindPhase::Query, e.to_string()))?;
    let mut bound = None;

    let query = sources::group_pairs(
        sources
            .query_pairs()
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str())),
    );
    if overlay(&mut acc, query, T::query_field) {
        bound = Some(decode::<T>(&acc, BindPhase::Query)?);
    }

    let uri = sources::group_pairs(
        sources
            .uri_params()
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str())),
    );
    if overlay(&mut acc, uri, T::uri_field) {
        bound = Some(decode::<T>(&acc, BindPhase::Uri)?);
    }

    if !sources.body().is_empty() {
        let form = sources.is_form_body();
        let body = parse_body(sources)?;
        if !form {
            if let Some(earlier) = &bound {
                normalize(&mut acc, earlier)?;
            }
        }
        acc = match (acc, body) {
            (Value::Object(mut target), Value::Object(fields)) => {
                target.extend(fields);
                Value::Object(target)
            }
            (_, replacement) => replacement,
        };
        bound = Some(if form {
            decode::<T>(&acc, BindPhase::Body)?
        } else {
            decode_strict::<T>(acc)?
        });
    }

    Ok(bound.unwrap_or_default())
}
