//! Weakly-typed decoding from `serde_json::Value`
//!
//! Query strings and path parameters only ever carry strings, so decoding them
//! into typed fields needs lenient conversions: `"10"` into an integer, `"true"`
//! into a bool, a lone value into a one-element sequence. [`decode`] walks a
//! JSON value with those conversions enabled and otherwise behaves like
//! `serde_json::from_value`.

use serde::de::{
    self, value::BorrowedStrDeserializer, DeserializeOwned, DeserializeSeed, Deserializer,
    IntoDeserializer, MapAccess, SeqAccess, Unexpected, Visitor,
};
use serde_json::{Map, Value};

/// Decode `value` into `T`, coercing strings and numbers where the target asks for it
pub fn decode<T: DeserializeOwned>(value: &Value) -> Result<T, serde_json::Error> {
    T::deserialize(Weak(value))
}

#[derive(Clone, Copy)]
struct Weak<'de>(&'de Value);

fn parse_bool(s: &str) -> Option<bool> {
    match s.trim() {
        "" | "0" | "f" | "F" | "false" | "FALSE" | "False" => Some(false),
        "1" | "t" | "T" | "true" | "TRUE" | "True" => Some(true),
        _ => None,
    }
}

macro_rules! weak_signed {
    ($method:ident) => {
        fn $method<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
            match self.0 {
                Value::String(s) if s.trim().is_empty() => visitor.visit_i64(0),
                Value::String(s) => match s.trim().parse::<i64>() {
                    Ok(n) => visitor.visit_i64(n),
                    Err(_) => Err(de::Error::invalid_value(Unexpected::Str(s), &visitor)),
                },
                Value::Bool(b) => visitor.visit_i64(i64::from(*b)),
                other => other.$method(visitor),
            }
        }
    };
}

macro_rules! weak_unsigned {
    ($method:ident) => {
        fn $method<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
            match self.0 {
                Value::String(s) if s.trim().is_empty() => visitor.visit_u64(0),
                Value::String(s) => match s.trim().parse::<u64>() {
                    Ok(n) => visitor.visit_u64(n),
                    Err(_) => Err(de::Error::invalid_value(Unexpected::Str(s), &visitor)),
                },
                Value::Bool(b) => visitor.visit_u64(u64::from(*b)),
                other => other.$method(visitor),
            }
        }
    };
}

macro_rules! weak_float {
    ($method:ident) => {
        fn $method<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
            match self.0 {
                Value::String(s) if s.trim().is_empty() => visitor.visit_f64(0.0),
                Value::String(s) => match s.trim().parse::<f64>() {
                    Ok(n) => visitor.visit_f64(n),
                    Err(_) => Err(de::Error::invalid_value(Unexpected::Str(s), &visitor)),
                },
                other => other.$method(visitor),
            }
        }
    };
}

impl<'de> Deserializer<'de> for Weak<'de> {
    type Error = serde_json::Error;

    fn deserialize_any<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        match self.0 {
            Value::Array(items) => visitor.visit_seq(WeakSeq::new(items.iter())),
            Value::Object(map) => visitor.visit_map(WeakMap::new(map)),
            other => other.deserialize_any(visitor),
        }
    }

    fn deserialize_bool<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        match self.0 {
            Value::Bool(b) => visitor.visit_bool(*b),
            Value::String(s) => match parse_bool(s) {
                Some(b) => visitor.visit_bool(b),
                None => Err(de::Error::invalid_value(Unexpected::Str(s), &visitor)),
            },
            Value::Number(n) => visitor.visit_bool(n.as_f64().is_some_and(|f| f != 0.0)),
            other => other.deserialize_bool(visitor),
        }
    }

    weak_signed!(deserialize_i8);
    weak_signed!(deserialize_i16);
    weak_signed!(deserialize_i32);
    weak_signed!(deserialize_i64);
    weak_unsigned!(deserialize_u8);
    weak_unsigned!(deserialize_u16);
    weak_unsigned!(deserialize_u32);
    weak_unsigned!(deserialize_u64);
    weak_float!(deserialize_f32);
    weak_float!(deserialize_f64);

    fn deserialize_char<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        self.deserialize_str(visitor)
    }

    fn deserialize_str<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        match self.0 {
            Value::String(s) => visitor.visit_borrowed_str(s),
            Value::Number(n) => visitor.visit_string(n.to_string()),
            Value::Bool(b) => visitor.visit_string(b.to_string()),
            other => other.deserialize_str(visitor),
        }
    }

    fn deserialize_string<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        self.deserialize_str(visitor)
    }

    fn deserialize_bytes<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        self.0.deserialize_bytes(visitor)
    }

    fn deserialize_byte_buf<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        self.0.deserialize_byte_buf(visitor)
    }

    fn deserialize_option<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        match self.0 {
            Value::Null => visitor.visit_none(),
            Value::String(s) if s.is_empty() => visitor.visit_none(),
            _ => visitor.visit_some(self),
        }
    }

    fn deserialize_unit<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        self.0.deserialize_unit(visitor)
    }

    fn deserialize_unit_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        visitor: V,
    ) -> Result<V::Value, Self::Error> {
        self.deserialize_unit(visitor)
    }

    fn deserialize_newtype_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        visitor: V,
    ) -> Result<V::Value, Self::Error> {
        visitor.visit_newtype_struct(self)
    }

    fn deserialize_seq<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        match self.0 {
            Value::Array(items) => visitor.visit_seq(WeakSeq::new(items.iter())),
            Value::Null => visitor.visit_seq(WeakSeq::new(std::iter::empty())),
            // A lone value where a sequence is expected becomes a one-element sequence
            single => visitor.visit_seq(WeakSeq::new(std::iter::once(single))),
        }
    }

    fn deserialize_tuple<V: Visitor<'de>>(
        self,
        _len: usize,
        visitor: V,
    ) -> Result<V::Value, Self::Error> {
        self.deserialize_seq(visitor)
    }

    fn deserialize_tuple_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        _len: usize,
        visitor: V,
    ) -> Result<V::Value, Self::Error> {
        self.deserialize_seq(visitor)
    }

    fn deserialize_map<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        match self.0 {
            Value::Object(map) => visitor.visit_map(WeakMap::new(map)),
            other => other.deserialize_map(visitor),
        }
    }

    fn deserialize_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        _fields: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value, Self::Error> {
        self.deserialize_map(visitor)
    }

    fn deserialize_enum<V: Visitor<'de>>(
        self,
        name: &'static str,
        variants: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value, Self::Error> {
        match self.0 {
            Value::String(s) => visitor.visit_enum(s.as_str().into_deserializer()),
            other => other.deserialize_enum(name, variants, visitor),
        }
    }

    fn deserialize_identifier<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        self.deserialize_str(visitor)
    }

    fn deserialize_ignored_any<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        visitor.visit_unit()
    }
}

struct WeakSeq<I> {
    items: I,
}

impl<I> WeakSeq<I> {
    fn new(items: I) -> Self {
        Self { items }
    }
}

impl<'de, I> SeqAccess<'de> for WeakSeq<I>
where
    I: Iterator<Item = &'de Value>,
{
    type Error = serde_json::Error;

    fn next_element_seed<S: DeserializeSeed<'de>>(
        &mut self,
        seed: S,
    ) -> Result<Option<S::Value>, Self::Error> {
        match self.items.next() {
            Some(value) => seed.deserialize(Weak(value)).map(Some),
            None => Ok(None),
        }
    }
}

struct WeakMap<'de> {
    entries: serde_json::map::Iter<'de>,
    pending: Option<&'de Value>,
}

impl<'de> WeakMap<'de> {
    fn new(map: &'de Map<String, Value>) -> Self {
        Self {
            entries: map.iter(),
            pending: None,
        }
    }
}

impl<'de> MapAccess<'de> for WeakMap<'de> {
    type Error = serde_json::Error;

    fn next_key_seed<K: DeserializeSeed<'de>>(
        &mut self,
        seed: K,
    ) -> Result<Option<K::Value>, Self::Error> {
        match self.entries.next() {
            Some((key, value)) => {
                self.pending = Some(value);
                seed.deserialize(BorrowedStrDeserializer::new(key)).map(Some)
            }
            None => Ok(None),
        }
    }

    fn next_value_seed<S: DeserializeSeed<'de>>(&mut self, seed: S) -> Result<S::Value, Self::Error> {
        match self.pending.take() {
            Some(value) => seed.deserialize(Weak(value)),
            None => Err(de::Error::custom("value requested before key")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Sample {
        age: i32,
        active: bool,
        score: f64,
        name: String,
        tags: Vec<String>,
        limit: Option<u32>,
    }

    #[test]
    fn test_strings_coerce_into_scalars() {
        let value = json!({
            "age": "10",
            "active": "true",
            "score": "2.5",
            "name": "alice",
            "tags": "solo",
            "limit": "5",
        });
        let sample: Sample = decode(&value).unwrap();
        assert_eq!(
            sample,
            Sample {
                age: 10,
                active: true,
                score: 2.5,
                name: "alice".to_string(),
                tags: vec!["solo".to_string()],
                limit: Some(5),
            }
        );
    }

    #[test]
    fn test_typed_json_still_decodes() {
        let value = json!({
            "age": 7,
            "active": false,
            "score": 1,
            "name": "bob",
            "tags": ["a", "b"],
            "limit": null,
        });
        let sample: Sample = decode(&value).unwrap();
        assert_eq!(sample.age, 7);
        assert_eq!(sample.tags, vec!["a", "b"]);
        assert_eq!(sample.limit, None);
    }

    #[test]
    fn test_non_numeric_string_into_integer_fails() {
        let err = decode::<i32>(&json!("ten")).unwrap_err();
        assert!(err.to_string().contains("ten"));
    }

    #[test]
    fn test_out_of_range_integer_fails() {
        assert!(decode::<u8>(&json!("300")).is_err());
    }

    #[test]
    fn test_number_into_bool_and_string() {
        assert!(decode::<bool>(&json!(1)).unwrap());
        assert!(!decode::<bool>(&json!(0)).unwrap());
        assert_eq!(decode::<String>(&json!(42)).unwrap(), "42");
    }

    #[test]
    fn test_unit_enum_from_string() {
        #[derive(Debug, Deserialize, PartialEq)]
        #[serde(rename_all = "lowercase")]
        enum Dir {
            Asc,
            Desc,
        }
        assert_eq!(decode::<Dir>(&json!("desc")).unwrap(), Dir::Desc);
        assert_eq!(decode::<Dir>(&json!("asc")).unwrap(), Dir::Asc);
    }
}
