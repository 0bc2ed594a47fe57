//! Records materialized from `core/get` results.
//!
//! iTop classes are open-ended: the field set of a `Server`, a `Person` or a
//! custom class is only known once a payload arrives. A [`RecordShape`] is
//! derived from the first record of each class and shared by every record of
//! that class through an `Arc`. A [`Record`] itself is a structural map from
//! field name to JSON value, tagged with its class.
//!
//! # Heterogeneous records
//!
//! Within one response, the shape of a class comes from the first record of
//! that class. A later record that lacks some shape fields gets `null` for
//! them. A later record that carries fields unknown to the shape keeps them;
//! the extra names are logged at debug level. Shapes never carry over field
//! names from an earlier response: the [`ShapeCache`] only hands back a
//! cached shape whose field names match the record exactly.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::ItopError;

/// Name of the synthesized identifier field.
pub const ID_FIELD: &str = "id";

/// The field-name set inferred for one iTop class.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecordShape {
    class_name: String,
    field_names: Vec<String>,
}

impl RecordShape {
    /// Derives a shape from the `fields` of a payload record, plus `id`.
    pub fn derive(class_name: impl Into<String>, fields: &Map<String, Value>) -> Self {
        let mut field_names: Vec<String> = fields
            .keys()
            .filter(|name| name.as_str() != ID_FIELD)
            .cloned()
            .collect();
        field_names.push(ID_FIELD.to_string());

        Self {
            class_name: class_name.into(),
            field_names,
        }
    }

    /// Returns the iTop class name.
    pub fn class_name(&self) -> &str {
        &self.class_name
    }

    /// Returns the field names, `id` last.
    pub fn field_names(&self) -> &[String] {
        &self.field_names
    }

    /// Returns true if the shape declares the field.
    pub fn contains(&self, name: &str) -> bool {
        self.field_names.iter().any(|n| n == name)
    }
}

/// Cache of record shapes keyed by class name.
///
/// A `Connection` owns one so responses with the same field set share one
/// `Arc` per class. A record whose field names differ from the cached shape
/// replaces it. The lock makes the cache usable from a connection shared
/// between threads.
#[derive(Debug, Default)]
pub struct ShapeCache {
    shapes: RwLock<HashMap<String, Arc<RecordShape>>>,
}

impl ShapeCache {
    /// Creates an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the shape of a record of `class_name` carrying `fields`.
    ///
    /// The cached shape is reused when its field names match; otherwise a
    /// new shape is derived and replaces it.
    pub fn shape_for(&self, class_name: &str, fields: &Map<String, Value>) -> Arc<RecordShape> {
        let derived = RecordShape::derive(class_name, fields);
        if let Some(shape) = self.get(class_name) {
            if *shape == derived {
                return shape;
            }
        }

        let mut shapes = self.shapes.write().unwrap_or_else(PoisonError::into_inner);
        match shapes.get(class_name) {
            Some(shape) if **shape == derived => Arc::clone(shape),
            _ => {
                tracing::debug!(class = %class_name, fields = fields.len(), "Derived record shape");
                let shape = Arc::new(derived);
                shapes.insert(class_name.to_string(), Arc::clone(&shape));
                shape
            }
        }
    }

    /// Returns the cached shape for `class_name`, if any.
    pub fn get(&self, class_name: &str) -> Option<Arc<RecordShape>> {
        self.shapes
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(class_name)
            .cloned()
    }

    /// Number of cached shapes.
    pub fn len(&self) -> usize {
        self.shapes.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Returns true if no shape has been derived yet.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drops every cached shape, e.g. after the iTop data model changed.
    pub fn clear(&self) {
        self.shapes
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

/// One object entry of a `core/get` payload.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct RawObject {
    /// iTop class name.
    pub class: String,

    /// Object identifier (string or integer in the payload).
    #[serde(deserialize_with = "deserialize_string_or_int")]
    pub key: String,

    /// Requested output fields.
    pub fields: Map<String, Value>,
}

/// A single iTop object.
///
/// Immutable once built. Field access is structural; use
/// [`Record::deserialize`] for classes whose fields are known ahead of time.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    shape: Arc<RecordShape>,
    id: String,
    fields: Map<String, Value>,
}

impl Record {
    /// Builds a record of `shape` from a payload's `key` and `fields`.
    pub fn materialize(shape: Arc<RecordShape>, id: String, mut fields: Map<String, Value>) -> Self {
        let extra: Vec<&str> = fields
            .keys()
            .map(String::as_str)
            .filter(|name| !shape.contains(name))
            .collect();
        if !extra.is_empty() {
            tracing::debug!(
                class = %shape.class_name(),
                id = %id,
                extra = ?extra,
                "Record carries fields outside its class shape"
            );
        }

        for name in shape.field_names() {
            if !fields.contains_key(name) {
                fields.insert(name.clone(), Value::Null);
            }
        }
        fields.insert(ID_FIELD.to_string(), Value::String(id.clone()));

        Self { shape, id, fields }
    }

    /// Returns the iTop class name.
    pub fn class_name(&self) -> &str {
        self.shape.class_name()
    }

    /// Returns the shape shared by all records of this class.
    pub fn shape(&self) -> &Arc<RecordShape> {
        &self.shape
    }

    /// Returns the object identifier.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Returns a field value, `id` included.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    /// Returns a field as a string slice when it holds a JSON string.
    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(Value::as_str)
    }

    /// Returns a field as an integer, accepting numeric strings.
    ///
    /// iTop serializes most scalar attributes as strings, so `"42"` and `42`
    /// both yield `Some(42)`.
    pub fn get_i64(&self, name: &str) -> Option<i64> {
        match self.get(name)? {
            Value::Number(n) => n.as_i64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Returns true if the record has the field.
    pub fn has_field(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    /// Returns all fields, `id` included.
    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    /// Converts the record into a caller-defined type.
    ///
    /// # Errors
    ///
    /// Returns `ItopError::Serialization` when the fields do not match `T`.
    ///
    /// # Example
    ///
    /// ```ignore
    /// #[derive(serde::Deserialize)]
    /// struct Server { id: String, name: String }
    ///
    /// let server: Server = record.deserialize()?;
    /// ```
    pub fn deserialize<T: DeserializeOwned>(&self) -> Result<T, ItopError> {
        Ok(serde_json::from_value(Value::Object(self.fields.clone()))?)
    }
}

/// Deserializes a value that can be either a string or an integer into a String.
fn deserialize_string_or_int<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use serde::de::{self, Visitor};

    struct StringOrIntVisitor;

    impl<'de> Visitor<'de> for StringOrIntVisitor {
        type Value = String;

        fn expecting(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
            formatter.write_str("a string or an integer")
        }

        fn visit_str<E>(self, value: &str) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(value.to_string())
        }

        fn visit_string<E>(self, value: String) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(value)
        }

        fn visit_i64<E>(self, value: i64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(value.to_string())
        }

        fn visit_u64<E>(self, value: u64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(value.to_string())
        }
    }

    deserializer.deserialize_any(StringOrIntVisitor)
}
