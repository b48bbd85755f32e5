//! A depth-bounded `serde::Serializer` that builds a `serde_json::Value`.
//!
//! Containers nested deeper than the configured bound are replaced with
//! [`TRUNCATED`] without visiting their children, so self-referential graphs
//! terminate as long as each type's `Serialize` impl returns. That holds for
//! `Rc<RefCell<_>>` and `Arc<RwLock<_>>` cycles but not for `Arc<Mutex<_>>`
//! cycles: serde's `Mutex` impl locks before the bound is consulted, so the
//! second visit blocks. Named types whose serde name is sensitive are
//! replaced with [`REDACTED`] at any depth.

use std::fmt;

use serde::ser::{self, Impossible, Serialize};
use serde_json::{Map, Number, Value};

use crate::sensitivity::{is_sensitive_type_name, REDACTED};

/// Placeholder emitted for a container beyond the depth bound.
pub const TRUNCATED: &str = "[...]";

/// Consecutive transparent wrappers (newtypes, `Some`) allowed before
/// truncation. Guards against cycles made only of newtypes.
const MAX_TRANSPARENT_HOPS: usize = 32;

/// Structural serialization failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoundError(String);

impl BoundError {
    pub(crate) fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

impl fmt::Display for BoundError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "structural serialization failed: {}", self.0)
    }
}

impl std::error::Error for BoundError {}

impl ser::Error for BoundError {
    fn custom<T: fmt::Display>(msg: T) -> Self {
        Self(msg.to_string())
    }
}

/// Serializes `value` into a JSON tree, truncating containers nested more
/// than `max_depth` levels deep. The root container is level 1.
pub fn to_bounded_value<T>(value: &T, max_depth: usize) -> Result<Value, BoundError>
where
    T: ?Sized + Serialize,
{
    value.serialize(BoundedSerializer {
        level: 0,
        max_depth,
        hops: 0,
    })
}

fn truncated() -> Value {
    Value::String(TRUNCATED.to_string())
}

fn redacted() -> Value {
    Value::String(REDACTED.to_string())
}

#[derive(Debug, Clone, Copy)]
struct BoundedSerializer {
    level: usize,
    max_depth: usize,
    hops: usize,
}

impl BoundedSerializer {
    /// Serializer for the children of a container, or `None` if the
    /// container itself lies beyond the bound.
    fn enter(self) -> Option<Self> {
        let level = self.level + 1;
        (level <= self.max_depth).then_some(Self {
            level,
            max_depth: self.max_depth,
            hops: 0,
        })
    }

    fn transparent(self) -> Option<Self> {
        (self.hops < MAX_TRANSPARENT_HOPS).then_some(Self {
            hops: self.hops + 1,
            ..self
        })
    }

    /// Resolves the child serializer and placeholder for a container,
    /// applying redaction by type name before depth.
    fn open(self, name: Option<&str>) -> (Option<Self>, Value) {
        if name.is_some_and(is_sensitive_type_name) {
            return (None, redacted());
        }
        (self.enter(), truncated())
    }
}

impl ser::Serializer for BoundedSerializer {
    type Ok = Value;
    type Error = BoundError;

    type SerializeSeq = Elements;
    type SerializeTuple = Elements;
    type SerializeTupleStruct = Elements;
    type SerializeTupleVariant = Elements;
    type SerializeMap = Fields;
    type SerializeStruct = Fields;
    type SerializeStructVariant = Fields;

    fn serialize_bool(self, v: bool) -> Result<Value, BoundError> {
        Ok(Value::Bool(v))
    }

    fn serialize_i8(self, v: i8) -> Result<Value, BoundError> {
        self.serialize_i64(i64::from(v))
    }

    fn serialize_i16(self, v: i16) -> Result<Value, BoundError> {
        self.serialize_i64(i64::from(v))
    }

    fn serialize_i32(self, v: i32) -> Result<Value, BoundError> {
        self.serialize_i64(i64::from(v))
    }

    fn serialize_i64(self, v: i64) -> Result<Value, BoundError> {
        Ok(Value::Number(v.into()))
    }

    fn serialize_i128(self, v: i128) -> Result<Value, BoundError> {
        Ok(match i64::try_from(v) {
            Ok(v) => Value::Number(v.into()),
            Err(_) => Value::String(v.to_string()),
        })
    }

    fn serialize_u8(self, v: u8) -> Result<Value, BoundError> {
        self.serialize_u64(u64::from(v))
    }

    fn serialize_u16(self, v: u16) -> Result<Value, BoundError> {
        self.serialize_u64(u64::from(v))
    }

    fn serialize_u32(self, v: u32) -> Result<Value, BoundError> {
        self.serialize_u64(u64::from(v))
    }

    fn serialize_u64(self, v: u64) -> Result<Value, BoundError> {
        Ok(Value::Number(v.into()))
    }

    fn serialize_u128(self, v: u128) -> Result<Value, BoundError> {
        Ok(match u64::try_from(v) {
            Ok(v) => Value::Number(v.into()),
            Err(_) => Value::String(v.to_string()),
        })
    }

    fn serialize_f32(self, v: f32) -> Result<Value, BoundError> {
        self.serialize_f64(f64::from(v))
    }

    fn serialize_f64(self, v: f64) -> Result<Value, BoundError> {
        Ok(Number::from_f64(v).map_or(Value::Null, Value::Number))
    }

    fn serialize_char(self, v: char) -> Result<Value, BoundError> {
        Ok(Value::String(v.to_string()))
    }

    fn serialize_str(self, v: &str) -> Result<Value, BoundError> {
        Ok(Value::String(v.to_string()))
    }

    fn serialize_bytes(self, v: &[u8]) -> Result<Value, BoundError> {
        if self.enter().is_none() {
            return Ok(truncated());
        }
        Ok(Value::Array(v.iter().map(|b| Value::from(*b)).collect()))
    }

    fn serialize_none(self) -> Result<Value, BoundError> {
        Ok(Value::Null)
    }

    fn serialize_some<T>(self, value: &T) -> Result<Value, BoundError>
    where
        T: ?Sized + Serialize,
    {
        match self.transparent() {
            Some(inner) => value.serialize(inner),
            None => Ok(truncated()),
        }
    }

    fn serialize_unit(self) -> Result<Value, BoundError> {
        Ok(Value::Null)
    }

    fn serialize_unit_struct(self, name: &'static str) -> Result<Value, BoundError> {
        if is_sensitive_type_name(name) {
            return Ok(redacted());
        }
        Ok(Value::Null)
    }

    fn serialize_unit_variant(
        self,
        name: &'static str,
        _variant_index: u32,
        variant: &'static str,
    ) -> Result<Value, BoundError> {
        if is_sensitive_type_name(name) {
            return Ok(redacted());
        }
        Ok(Value::String(variant.to_string()))
    }

    fn serialize_newtype_struct<T>(self, name: &'static str, value: &T) -> Result<Value, BoundError>
    where
        T: ?Sized + Serialize,
    {
        if is_sensitive_type_name(name) {
            return Ok(redacted());
        }
        match self.transparent() {
            Some(inner) => value.serialize(inner),
            None => Ok(truncated()),
        }
    }

    fn serialize_newtype_variant<T>(
        self,
        name: &'static str,
        _variant_index: u32,
        variant: &'static str,
        value: &T,
    ) -> Result<Value, BoundError>
    where
        T: ?Sized + Serialize,
    {
        let (inner, placeholder) = self.open(Some(name));
        let Some(inner) = inner else {
            return Ok(placeholder);
        };
        let mut object = Map::new();
        object.insert(variant.to_string(), value.serialize(inner)?);
        Ok(Value::Object(object))
    }

    fn serialize_seq(self, len: Option<usize>) -> Result<Elements, BoundError> {
        Ok(Elements::open(self, None, None, len.unwrap_or(0)))
    }

    fn serialize_tuple(self, len: usize) -> Result<Elements, BoundError> {
        Ok(Elements::open(self, None, None, len))
    }

    fn serialize_tuple_struct(self, name: &'static str, len: usize) -> Result<Elements, BoundError> {
        Ok(Elements::open(self, Some(name), None, len))
    }

    fn serialize_tuple_variant(
        self,
        name: &'static str,
        _variant_index: u32,
        variant: &'static str,
        len: usize,
    ) -> Result<Elements, BoundError> {
        Ok(Elements::open(self, Some(name), Some(variant), len))
    }

    fn serialize_map(self, _len: Option<usize>) -> Result<Fields, BoundError> {
        Ok(Fields::open(self, None, None))
    }

    fn serialize_struct(self, name: &'static str, _len: usize) -> Result<Fields, BoundError> {
        Ok(Fields::open(self, Some(name), None))
    }

    fn serialize_struct_variant(
        self,
        name: &'static str,
        _variant_index: u32,
        variant: &'static str,
        _len: usize,
    ) -> Result<Fields, BoundError> {
        Ok(Fields::open(self, Some(name), Some(variant)))
    }
}

/// Collector for sequences, tuples and tuple structs/variants.
struct Elements {
    inner: Option<BoundedSerializer>,
    placeholder: Value,
    variant: Option<&'static str>,
    items: Vec<Value>,
}

impl Elements {
    fn open(
        ser: BoundedSerializer,
        name: Option<&'static str>,
        variant: Option<&'static str>,
        len: usize,
    ) -> Self {
        let (inner, placeholder) = ser.open(name);
        let capacity = if inner.is_some() { len.min(1024) } else { 0 };
        Self {
            inner,
            placeholder,
            variant,
            items: Vec::with_capacity(capacity),
        }
    }

    fn push<T>(&mut self, value: &T) -> Result<(), BoundError>
    where
        T: ?Sized + Serialize,
    {
        if let Some(inner) = self.inner {
            self.items.push(value.serialize(inner)?);
        }
        Ok(())
    }

    fn finish(self) -> Result<Value, BoundError> {
        if self.inner.is_none() {
            return Ok(self.placeholder);
        }
        let array = Value::Array(self.items);
        Ok(match self.variant {
            Some(variant) => {
                let mut object = Map::new();
                object.insert(variant.to_string(), array);
                Value::Object(object)
            }
            None => array,
        })
    }
}

impl ser::SerializeSeq for Elements {
    type Ok = Value;
    type Error = BoundError;

    fn serialize_element<T>(&mut self, value: &T) -> Result<(), BoundError>
    where
        T: ?Sized + Serialize,
    {
        self.push(value)
    }

    fn end(self) -> Result<Value, BoundError> {
        self.finish()
    }
}

impl ser::SerializeTuple for Elements {
    type Ok = Value;
    type Error = BoundError;

    fn serialize_element<T>(&mut self, value: &T) -> Result<(), BoundError>
    where
        T: ?Sized + Serialize,
    {
        self.push(value)
    }

    fn end(self) -> Result<Value, BoundError> {
        self.finish()
    }
}

impl ser::SerializeTupleStruct for Elements {
    type Ok = Value;
    type Error = BoundError;

    fn serialize_field<T>(&mut self, value: &T) -> Result<(), BoundError>
    where
        T: ?Sized + Serialize,
    {
        self.push(value)
    }

    fn end(self) -> Result<Value, BoundError> {
        self.finish()
    }
}

impl ser::SerializeTupleVariant for Elements {
    type Ok = Value;
    type Error = BoundError;

    fn serialize_field<T>(&mut self, value: &T) -> Result<(), BoundError>
    where
        T: ?Sized + Serialize,
    {
        self.push(value)
    }

    fn end(self) -> Result<Value, BoundError> {
        self.finish()
    }
}

/// Collector for maps, structs and struct variants.
struct Fields {
    inner: Option<BoundedSerializer>,
    placeholder: Value,
    variant: Option<&'static str>,
    object: Map<String, Value>,
    pending_key: Option<String>,
}

impl Fields {
    fn open(ser: BoundedSerializer, name: Option<&'static str>, variant: Option<&'static str>) -> Self {
        let (inner, placeholder) = ser.open(name);
        Self {
            inner,
            placeholder,
            variant,
            object: Map::new(),
            pending_key: None,
        }
    }

    fn insert<T>(&mut self, key: String, value: &T) -> Result<(), BoundError>
    where
        T: ?Sized + Serialize,
    {
        if let Some(inner) = self.inner {
            self.object.insert(key, value.serialize(inner)?);
        }
        Ok(())
    }

    fn finish(self) -> Result<Value, BoundError> {
        if self.inner.is_none() {
            return Ok(self.placeholder);
        }
        let object = Value::Object(self.object);
        Ok(match self.variant {
            Some(variant) => {
                let mut outer = Map::new();
                outer.insert(variant.to_string(), object);
                Value::Object(outer)
            }
            None => object,
        })
    }
}

impl ser::SerializeMap for Fields {
    type Ok = Value;
    type Error = BoundError;

    fn serialize_key<T>(&mut self, key: &T) -> Result<(), BoundError>
    where
        T: ?Sized + Serialize,
    {
        if self.inner.is_some() {
            self.pending_key = Some(key.serialize(KeySerializer)?);
        }
        Ok(())
    }

    fn serialize_value<T>(&mut self, value: &T) -> Result<(), BoundError>
    where
        T: ?Sized + Serialize,
    {
        if self.inner.is_none() {
            return Ok(());
        }
        let key = self
            .pending_key
            .take()
            .ok_or_else(|| BoundError::new("map value serialized before its key"))?;
        self.insert(key, value)
    }

    fn end(self) -> Result<Value, BoundError> {
        self.finish()
    }
}

impl ser::SerializeStruct for Fields {
    type Ok = Value;
    type Error = BoundError;

    fn serialize_field<T>(&mut self, key: &'static str, value: &T) -> Result<(), BoundError>
    where
        T: ?Sized + Serialize,
    {
        self.insert(key.to_string(), value)
    }

    fn end(self) -> Result<Value, BoundError> {
        self.finish()
    }
}

impl ser::SerializeStructVariant for Fields {
    type Ok = Value;
    type Error = BoundError;

    fn serialize_field<T>(&mut self, key: &'static str, value: &T) -> Result<(), BoundError>
    where
        T: ?Sized + Serialize,
    {
        self.insert(key.to_string(), value)
    }

    fn end(self) -> Result<Value, BoundError> {
        self.finish()
    }
}

/// Renders map keys. Only scalar keys are representable as JSON object keys.
struct KeySerializer;

fn key_must_be_scalar() -> BoundError {
    BoundError::new("map key must be a scalar")
}

impl ser::Serializer for KeySerializer {
    type Ok = String;
    type Error = BoundError;

    type SerializeSeq = Impossible<String, BoundError>;
    type SerializeTuple = Impossible<String, BoundError>;
    type SerializeTupleStruct = Impossible<String, BoundError>;
    type SerializeTupleVariant = Impossible<String, BoundError>;
    type SerializeMap = Impossible<String, BoundError>;
    type SerializeStruct = Impossible<String, BoundError>;
    type SerializeStructVariant = Impossible<String, BoundError>;

    fn serialize_bool(self, v: bool) -> Result<String, BoundError> {
        Ok(v.to_string())
    }

    fn serialize_i8(self, v: i8) -> Result<String, BoundError> {
        Ok(v.to_string())
    }

    fn serialize_i16(self, v: i16) -> Result<String, BoundError> {
        Ok(v.to_string())
    }

    fn serialize_i32(self, v: i32) -> Result<String, BoundError> {
        Ok(v.to_string())
    }

    fn serialize_i64(self, v: i64) -> Result<String, BoundError> {
        Ok(v.to_string())
    }

    fn serialize_i128(self, v: i128) -> Result<String, BoundError> {
        Ok(v.to_string())
    }

    fn serialize_u8(self, v: u8) -> Result<String, BoundError> {
        Ok(v.to_string())
    }

    fn serialize_u16(self, v: u16) -> Result<String, BoundError> {
        Ok(v.to_string())
    }

    fn serialize_u32(self, v: u32) -> Result<String, BoundError> {
        Ok(v.to_string())
    }

    fn serialize_u64(self, v: u64) -> Result<String, BoundError> {
        Ok(v.to_string())
    }

    fn serialize_u128(self, v: u128) -> Result<String, BoundError> {
        Ok(v.to_string())
    }

    fn serialize_f32(self, v: f32) -> Result<String, BoundError> {
        Ok(v.to_string())
    }

    fn serialize_f64(self, v: f64) -> Result<String, BoundError> {
        Ok(v.to_string())
    }

    fn serialize_char(self, v: char) -> Result<String, BoundError> {
        Ok(v.to_string())
    }

    fn serialize_str(self, v: &str) -> Result<String, BoundError> {
        Ok(v.to_string())
    }

    fn serialize_bytes(self, _v: &[u8]) -> Result<String, BoundError> {
        Err(key_must_be_scalar())
    }

    fn serialize_none(self) -> Result<String, BoundError> {
        Err(key_must_be_scalar())
    }

    fn serialize_some<T>(self, _value: &T) -> Result<String, BoundError>
    where
        T: ?Sized + Serialize,
    {
        Err(key_must_be_scalar())
    }

    fn serialize_unit(self) -> Result<String, BoundError> {
        Err(key_must_be_scalar())
    }

    fn serialize_unit_struct(self, _name: &'static str) -> Result<String, BoundError> {
        Err(key_must_be_scalar())
    }

    fn serialize_unit_variant(
        self,
        name: &'static str,
        _variant_index: u32,
        variant: &'static str,
    ) -> Result<String, BoundError> {
        if is_sensitive_type_name(name) {
            return Ok(REDACTED.to_string());
        }
        Ok(variant.to_string())
    }

    fn serialize_newtype_struct<T>(self, name: &'static str, value: &T) -> Result<String, BoundError>
    where
        T: ?Sized + Serialize,
    {
        if is_sensitive_type_name(name) {
            return Ok(REDACTED.to_string());
        }
        value.serialize(self)
    }

    fn serialize_newtype_variant<T>(
        self,
        _name: &'static str,
        _variant_index: u32,
        _variant: &'static str,
        _value: &T,
    ) -> Result<String, BoundError>
    where
        T: ?Sized + Serialize,
    {
        Err(key_must_be_scalar())
    }

    fn serialize_seq(self, _len: Option<usize>) -> Result<Self::SerializeSeq, BoundError> {
        Err(key_must_be_scalar())
    }

    fn serialize_tuple(self, _len: usize) -> Result<Self::SerializeTuple, BoundError> {
        Err(key_must_be_scalar())
    }

    fn serialize_tuple_struct(
        self,
        _name: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeTupleStruct, BoundError> {
        Err(key_must_be_scalar())
    }

    fn serialize_tuple_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        _variant: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeTupleVariant, BoundError> {
        Err(key_must_be_scalar())
    }

    fn serialize_map(self, _len: Option<usize>) -> Result<Self::SerializeMap, BoundError> {
        Err(key_must_be_scalar())
    }

    fn serialize_struct(
        self,
        _name: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeStruct, BoundError> {
        Err(key_must_be_scalar())
    }

    fn serialize_struct_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        _variant: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeStructVariant, BoundError> {
        Err(key_must_be_scalar())
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::collections::BTreeMap;
    use std::rc::Rc;

    use serde::Serialize;
    use serde_json::json;

    use super::*;

    #[derive(Serialize)]
    struct Translation {
        title: String,
        language_key: String,
    }

    #[derive(Serialize)]
    struct Article {
        id: i64,
        translation: Translation,
        tags: Vec<String>,
    }

    fn article() -> Article {
        Article {
            id: 7,
            translation: Translation {
                title: "A".to_string(),
                language_key: "en".to_string(),
            },
            tags: vec!["rust".to_string()],
        }
    }

    #[test]
    fn scalars_ignore_depth() {
        assert_eq!(to_bounded_value(&42_i32, 0).unwrap(), json!(42));
        assert_eq!(to_bounded_value("en", 0).unwrap(), json!("en"));
        assert_eq!(to_bounded_value(&None::<i32>, 0).unwrap(), Value::Null);
        assert_eq!(to_bounded_value(&f64::NAN, 0).unwrap(), Value::Null);
        assert_eq!(to_bounded_value(&u128::MAX, 0).unwrap(), json!(u128::MAX.to_string()));
    }

    #[test]
    fn within_bound_renders_fully() {
        let value = to_bounded_value(&article(), 2).unwrap();
        assert_eq!(
            value,
            json!({
                "id": 7,
                "translation": { "title": "A", "language_key": "en" },
                "tags": ["rust"],
            })
        );
    }

    #[test]
    fn beyond_bound_is_truncated() {
        let value = to_bounded_value(&article(), 1).unwrap();
        assert_eq!(
            value,
            json!({ "id": 7, "translation": TRUNCATED, "tags": TRUNCATED })
        );

        assert_eq!(to_bounded_value(&article(), 0).unwrap(), json!(TRUNCATED));
    }

    #[test]
    fn enum_variants_count_as_containers() {
        #[derive(Serialize)]
        enum Shape {
            Circle { radius: u32 },
            Pair(u32, u32),
            Wrapped(Vec<u32>),
            Empty,
        }

        assert_eq!(
            to_bounded_value(&Shape::Circle { radius: 3 }, 2).unwrap(),
            json!({ "Circle": { "radius": 3 } })
        );
        assert_eq!(
            to_bounded_value(&Shape::Pair(1, 2), 2).unwrap(),
            json!({ "Pair": [1, 2] })
        );
        assert_eq!(
            to_bounded_value(&Shape::Wrapped(vec![1]), 1).unwrap(),
            json!({ "Wrapped": TRUNCATED })
        );
        assert_eq!(to_bounded_value(&Shape::Empty, 0).unwrap(), json!("Empty"));
    }

    #[test]
    fn sensitive_nested_types_are_redacted() {
        #[derive(Serialize)]
        struct AccessToken(String);

        #[derive(Serialize)]
        struct ApiKeyPair {
            public: String,
            private: String,
        }

        #[derive(Serialize)]
        struct Response {
            user: String,
            token: AccessToken,
            keys: ApiKeyPair,
        }

        let response = Response {
            user: "alice".to_string(),
            token: AccessToken("eyJhbGci".to_string()),
            keys: ApiKeyPair {
                public: "pk".to_string(),
                private: "sk".to_string(),
            },
        };

        let value = to_bounded_value(&response, 5).unwrap();
        assert_eq!(
            value,
            json!({ "user": "alice", "token": REDACTED, "keys": REDACTED })
        );
    }

    #[test]
    fn self_referential_graph_terminates() {
        #[derive(Serialize)]
        struct Node {
            name: String,
            next: Option<Rc<RefCell<Node>>>,
        }

        let node = Rc::new(RefCell::new(Node {
            name: "loop".to_string(),
            next: None,
        }));
        node.borrow_mut().next = Some(Rc::clone(&node));

        let value = to_bounded_value(&node, 2).unwrap();
        assert_eq!(
            value,
            json!({ "name": "loop", "next": { "name": "loop", "next": TRUNCATED } })
        );

        node.borrow_mut().next = None;
    }

    #[test]
    fn newtype_cycles_terminate() {
        #[derive(Serialize)]
        struct Link(Option<Rc<RefCell<Link>>>);

        let link = Rc::new(RefCell::new(Link(None)));
        link.borrow_mut().0 = Some(Rc::clone(&link));

        let value = to_bounded_value(&link, 2).unwrap();
        assert_eq!(value, json!(TRUNCATED));

        link.borrow_mut().0 = None;
    }

    #[test]
    fn compound_map_keys_fail() {
        let mut map = BTreeMap::new();
        map.insert((1, 2), "pair");

        let err = to_bounded_value(&map, 3).unwrap_err();
        assert!(err.to_string().contains("map key must be a scalar"));
    }

    #[test]
    fn scalar_map_keys_render() {
        let mut map = BTreeMap::new();
        map.insert(1, "one");
        map.insert(2, "two");

        assert_eq!(
            to_bounded_value(&map, 1).unwrap(),
            json!({ "1": "one", "2": "two" })
        );
    }

    #[test]
    fn borrow_failures_surface_as_errors() {
        let cell = RefCell::new(vec![1, 2, 3]);
        let _guard = cell.borrow_mut();

        assert!(to_bounded_value(&cell, 2).is_err());
    }
}
