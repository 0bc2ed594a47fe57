//! Classification of iTop response envelopes.
//!
//! Every iTop answer carries a numeric `code`. A zero code with an `objects`
//! map is a [`SuccessfulResponse`], a zero code without objects is an
//! [`EmptyResponse`], anything else an [`UnsuccessfulResponse`].

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::{Map, Value};

use super::record::{RawObject, Record, RecordShape, ShapeCache};
use super::status::StatusCode;
use crate::error::ItopError;

/// A parsed iTop response.
#[derive(Debug, Clone, PartialEq)]
pub enum Response {
    /// Code 0 with an object collection.
    Successful(SuccessfulResponse),
    /// Code 0 without an object collection.
    Empty(EmptyResponse),
    /// Non-zero code.
    Unsuccessful(UnsuccessfulResponse),
}

impl Response {
    /// Parses a raw response, deriving record shapes into a fresh cache.
    ///
    /// # Errors
    ///
    /// - `ItopError::InvalidResponse` if `code` is missing or the object
    ///   collection is malformed
    /// - `ItopError::UnknownStatusCode` if a non-zero code is undocumented
    pub fn parse(raw: &Value) -> Result<Self, ItopError> {
        Self::parse_with(raw, &ShapeCache::new())
    }

    /// Parses a raw response, reusing shapes from `shapes`.
    pub fn parse_with(raw: &Value, shapes: &ShapeCache) -> Result<Self, ItopError> {
        let status = status_of(raw)?;
        let message = message_of(raw).to_string();

        if !status.is_ok() {
            return Ok(Response::Unsuccessful(UnsuccessfulResponse {
                code: status,
                message,
                data: raw.to_string(),
            }));
        }

        match raw.get("objects") {
            None | Some(Value::Null) => Ok(Response::Empty(EmptyResponse {
                code: status,
                message,
            })),
            Some(Value::Object(objects)) => {
                let records = materialize(objects, shapes)?;
                Ok(Response::Successful(SuccessfulResponse::new(
                    message,
                    records,
                    page_value(raw, "page"),
                    page_value(raw, "limit"),
                )))
            }
            Some(other) => Err(ItopError::invalid_response(format!(
                "objects must be a map, got: {}",
                other
            ))),
        }
    }

    /// Returns the status code.
    pub fn code(&self) -> StatusCode {
        match self {
            Response::Successful(r) => r.code,
            Response::Empty(r) => r.code,
            Response::Unsuccessful(r) => r.code,
        }
    }

    /// Returns the human message.
    pub fn message(&self) -> &str {
        match self {
            Response::Successful(r) => &r.message,
            Response::Empty(r) => &r.message,
            Response::Unsuccessful(r) => &r.message,
        }
    }

    /// Returns the materialized records; empty unless successful.
    pub fn records(&self) -> &[Record] {
        match self {
            Response::Successful(r) => r.get_all(),
            _ => &[],
        }
    }

    /// Returns true for `Successful` and `Empty`.
    pub fn is_success(&self) -> bool {
        !matches!(self, Response::Unsuccessful(_))
    }
}

/// Reads and maps the `code` field of a response envelope.
pub(crate) fn status_of(raw: &Value) -> Result<StatusCode, ItopError> {
    let code = raw
        .get("code")
        .ok_or_else(|| ItopError::invalid_response(format!("missing code: {}", raw)))?;
    let code = code
        .as_i64()
        .ok_or_else(|| ItopError::invalid_response(format!("non-integer code: {}", code)))?;
    StatusCode::from_code(code)
}

/// Reads the `message` field, empty when absent.
pub(crate) fn message_of(raw: &Value) -> &str {
    raw.get("message").and_then(Value::as_str).unwrap_or_default()
}

/// Builds records in payload order, one shape per class.
///
/// The first record of each class in this response fixes the shape for the
/// rest of the response; `shapes` only supplies a matching cached `Arc`.
fn materialize(objects: &Map<String, Value>, shapes: &ShapeCache) -> Result<Vec<Record>, ItopError> {
    let mut seen: HashMap<String, Arc<RecordShape>> = HashMap::new();
    objects
        .iter()
        .map(|(key, entry)| {
            let raw: RawObject = serde_json::from_value(entry.clone()).map_err(|e| {
                ItopError::invalid_response(format!("malformed object {}: {}", key, e))
            })?;
            let shape = match seen.get(&raw.class) {
                Some(shape) => Arc::clone(shape),
                None => {
                    let shape = shapes.shape_for(&raw.class, &raw.fields);
                    seen.insert(raw.class.clone(), Arc::clone(&shape));
                    shape
                }
            };
            Ok(Record::materialize(shape, raw.key, raw.fields))
        })
        .collect()
}

/// Reads a pagination echo, accepting numbers or numeric strings.
fn page_value(raw: &Value, name: &str) -> Option<u64> {
    match raw.get(name)? {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Position of the single-use record producer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct Cursor {
    position: usize,
}

/// A `core/get` result with materialized records.
#[derive(Debug, Clone, PartialEq)]
pub struct SuccessfulResponse {
    /// Always `StatusCode::Ok`.
    pub code: StatusCode,

    /// Human message from iTop.
    pub message: String,

    /// Number of materialized records.
    ///
    /// Recomputed locally; any count reported by the server is ignored.
    pub num_results: usize,

    /// Page echoed by the server, if any.
    pub page: Option<u64>,

    /// Limit echoed by the server, if any.
    pub limit: Option<u64>,

    objects: Vec<Record>,
    cursor: Cursor,
}

impl SuccessfulResponse {
    /// Creates a successful response over `objects`.
    pub fn new(
        message: impl Into<String>,
        objects: Vec<Record>,
        page: Option<u64>,
        limit: Option<u64>,
    ) -> Self {
        Self {
            code: StatusCode::Ok,
            message: message.into(),
            num_results: objects.len(),
            page,
            limit,
            objects,
            cursor: Cursor::default(),
        }
    }

    /// Returns the next record, or `None` once every record was produced.
    pub fn get_one(&mut self) -> Option<&Record> {
        let record = self.objects.get(self.cursor.position)?;
        self.cursor.position += 1;
        Some(record)
    }

    /// Returns every record in payload order, regardless of `get_one` calls.
    pub fn get_all(&self) -> &[Record] {
        &self.objects
    }

    /// Rewinds `get_one` to the first record.
    pub fn reset_cursor(&mut self) {
        self.cursor = Cursor::default();
    }

    /// Returns true if the response holds no record.
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Consumes the response and returns its records.
    pub fn into_records(self) -> Vec<Record> {
        self.objects
    }
}

impl<'a> IntoIterator for &'a SuccessfulResponse {
    type Item = &'a Record;
    type IntoIter = std::slice::Iter<'a, Record>;

    fn into_iter(self) -> Self::IntoIter {
        self.objects.iter()
    }
}

/// A code 0 response without objects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmptyResponse {
    /// Always `StatusCode::Ok`.
    pub code: StatusCode,
    /// Human message from iTop.
    pub message: String,
}

/// A response with a non-zero code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnsuccessfulResponse {
    /// Mapped status code.
    pub code: StatusCode,
    /// Human message from iTop.
    pub message: String,
    /// Raw response body, for diagnostics.
    pub data: String,
}
