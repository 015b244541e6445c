//! The uniform response envelope
//!
//! Every dispatched request is answered with HTTP 200 and a JSON body
//! `{"status": <int>, "msg": <string>, "data": <payload|null>}`. The envelope
//! status tells the outcomes apart:
//!
//! | status | meaning                                   |
//! |--------|-------------------------------------------|
//! | `0`    | success, `data` holds the payload         |
//! | `400`  | the request could not be bound            |
//! | `500`  | the handler returned an error             |
//!
//! # Example
//!
//! ```rust
//! use restbind::envelope::{Envelope, Status};
//!
//! let ok = Envelope::success(vec![1, 2, 3]);
//! assert_eq!(
//!     serde_json::to_string(&ok).unwrap(),
//!     r#"{"status":0,"msg":"","data":[1,2,3]}"#
//! );
//!
//! let failed = Envelope::failure(Status::BadRequest, "bind query params failed: ...");
//! assert_eq!(failed.status.code(), 400);
//! ```

use std::fmt;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

/// Outcome code carried in the envelope
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Status {
    /// The handler succeeded
    Ok,
    /// The request could not be bound into the handler input
    BadRequest,
    /// The handler (or a CRUD stage) failed
    InternalError,
}

impl Status {
    /// Numeric wire code
    pub const fn code(self) -> u16 {
        match self {
            Self::Ok => 0,
            Self::BadRequest => 400,
            Self::InternalError => 500,
        }
    }

    /// Parse a wire code
    pub const fn from_code(code: u16) -> Option<Self> {
        match code {
            0 => Some(Self::Ok),
            400 => Some(Self::BadRequest),
            500 => Some(Self::InternalError),
            _ => None,
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

impl Serialize for Status {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u16(self.code())
    }
}

impl<'de> Deserialize<'de> for Status {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let code = u16::deserialize(deserializer)?;
        Self::from_code(code)
            .ok_or_else(|| serde::de::Error::custom(format!("unknown envelope status {}", code)))
    }
}

/// Response envelope written once per request
///
/// `data` is always present on the wire; it is `null` for failures and for
/// handlers whose payload is `()`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope<T = Value> {
    pub status: Status,
    pub msg: String,
    pub data: Option<T>,
}

impl<T> Envelope<T> {
    /// A successful envelope carrying `data`
    pub fn success(data: T) -> Self {
        Self {
            status: Status::Ok,
            msg: String::new(),
            data: Some(data),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == Status::Ok
    }
}

impl Envelope<Value> {
    /// A failed envelope with `data: null`
    pub fn failure(status: Status, msg: impl Into<String>) -> Self {
        Self {
            status,
            msg: msg.into(),
            data: None,
        }
    }

    /// Status 400 with `msg`
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::failure(Status::BadRequest, msg)
    }

    /// Status 500 with `msg`
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::failure(Status::InternalError, msg)
    }
}

impl<T: Serialize> IntoResponse for Envelope<T> {
    fn into_response(self) -> Response {
        (StatusCode::OK, Json(self)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_success_shape() {
        let value = serde_json::to_value(Envelope::success(json!({"id": 1}))).unwrap();
        assert_eq!(value, json!({"status": 0, "msg": "", "data": {"id": 1}}));
    }

    #[test]
    fn test_unit_payload_is_null() {
        let value = serde_json::to_value(Envelope::success(())).unwrap();
        assert_eq!(value, json!({"status": 0, "msg": "", "data": null}));
    }

    #[test]
    fn test_failure_shapes() {
        let value = serde_json::to_value(Envelope::bad_request("bad")).unwrap();
        assert_eq!(value, json!({"status": 400, "msg": "bad", "data": null}));

        let value = serde_json::to_value(Envelope::internal("boom")).unwrap();
        assert_eq!(value, json!({"status": 500, "msg": "boom", "data": null}));
    }

    #[test]
    fn test_status_round_trip_and_rejects_unknown() {
        let parsed: Envelope = serde_json::from_str(r#"{"status":500,"msg":"x","data":null}"#).unwrap();
        assert_eq!(parsed.status, Status::InternalError);
        assert!(!parsed.is_success());
        assert!(serde_json::from_str::<Envelope>(r#"{"status":201,"msg":"","data":null}"#).is_err());
    }

    #[tokio::test]
    async fn test_transport_status_is_always_ok() {
        let response = Envelope::internal("boom").into_response();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
