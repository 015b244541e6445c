//! Inputs whose id comes from the `{id}` path parameter

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{weak, BindError, BindPhase, BindSources, Bindable};

const ID_PARAM: &str = "id";

fn path_id<Id: DeserializeOwned>(sources: &BindSources) -> Result<Id, BindError> {
    let raw = sources.uri_param(ID_PARAM).ok_or_else(|| {
        BindError::new(
            BindPhase::Uri,
            format!("missing path parameter `{}`", ID_PARAM),
        )
    })?;
    weak::decode(&Value::from(raw)).map_err(|e| BindError::new(BindPhase::Uri, e.to_string()))
}

/// Input carrying only the `{id}` path parameter
///
/// Query and body are ignored.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IdParam<Id> {
    /// The decoded path id
    pub id: Id,
}

impl<Id> Bindable for IdParam<Id>
where
    Id: DeserializeOwned + Send + 'static,
{
    fn bind(sources: &BindSources) -> Result<Self, BindError> {
        Ok(Self {
            id: path_id(sources)?,
        })
    }
}

/// An item bound normally, paired with the `{id}` path parameter
///
/// The item goes through the full query, uri, body binding first; the id is
/// then read from the path alone, so a body cannot redirect the target row.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WithId<Id, T> {
    /// The decoded path id
    pub id: Id,
    /// The bound item
    pub item: T,
}

impl<Id, T> WithId<Id, T> {
    /// Split into id and item
    pub fn into_parts(self) -> (Id, T) {
        (self.id, self.item)
    }
}

impl<Id, T> Bindable for WithId<Id, T>
where
    Id: DeserializeOwned + Send + 'static,
    T: Bindable,
{
    fn bind(sources: &BindSources) -> Result<Self, BindError> {
        let item = T::bind(sources)?;
        let id = path_id(sources)?;
        Ok(Self { id, item })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bind::FieldTags;

    #[derive(Debug, Default, PartialEq, Serialize, Deserialize)]
    struct Rename {
        title: String,
    }

    impl FieldTags for Rename {}

    #[test]
    fn test_id_param_from_path() {
        let sources = BindSources::new()
            .with_uri_params([("id", "12")])
            .with_query("id=99")
            .with_body(r#"{"id":77}"#);
        let param = IdParam::<i64>::bind(&sources).unwrap();
        assert_eq!(param.id, 12);
    }

    #[test]
    fn test_id_param_missing() {
        let err = IdParam::<i64>::bind(&BindSources::new()).unwrap_err();
        assert_eq!(err.phase, BindPhase::Uri);
        assert!(err.message.contains("missing path parameter"));
    }

    #[test]
    fn test_id_param_not_numeric() {
        let sources = BindSources::new().with_uri_params([("id", "abc")]);
        assert_eq!(IdParam::<u32>::bind(&sources).unwrap_err().phase, BindPhase::Uri);
    }

    #[test]
    fn test_string_ids() {
        let sources = BindSources::new().with_uri_params([("id", "usr_1")]);
        assert_eq!(IdParam::<String>::bind(&sources).unwrap().id, "usr_1");
    }

    #[test]
    fn test_with_id_binds_both() {
        let sources = BindSources::new()
            .with_uri_params([("id", "4")])
            .with_body(r#"{"title":"renamed"}"#);
        let (id, item) = WithId::<u64, Rename>::bind(&sources).unwrap().into_parts();
        assert_eq!(id, 4);
        assert_eq!(item.title, "renamed");
    }

    #[test]
    fn test_with_id_reports_item_errors_first() {
        let sources = BindSources::new().with_body("[");
        let err = WithId::<u64, Rename>::bind(&sources).unwrap_err();
        assert_eq!(err.phase, BindPhase::Body);
    }
}
