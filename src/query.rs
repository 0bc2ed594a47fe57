//! Translation of filters into iTop OQL.
//!
//! A [`Filter`] is one of three forms:
//!
//! - a field equality map, rendered as `SELECT <class> WHERE a = 'x' AND b = 1`
//! - a raw OQL string, passed through unchanged
//! - an [`OqlBuilder`], rendered as `SELECT <class> <cond> AND <cond> ...`
//!
//! Text values are wrapped in single quotes and numbers are written literally.
//! Embedded quotes are NOT escaped; callers passing untrusted text must
//! sanitize it first.

use std::fmt;

/// A scalar compared in an OQL condition.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryValue {
    /// Rendered single-quoted.
    Text(String),
    /// Rendered literally.
    Integer(i64),
    /// Rendered literally.
    Float(f64),
}

impl fmt::Display for QueryValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueryValue::Text(s) => write!(f, "'{}'", s),
            QueryValue::Integer(n) => write!(f, "{}", n),
            QueryValue::Float(n) => write!(f, "{}", n),
        }
    }
}

impl From<&str> for QueryValue {
    fn from(value: &str) -> Self {
        QueryValue::Text(value.to_string())
    }
}

impl From<String> for QueryValue {
    fn from(value: String) -> Self {
        QueryValue::Text(value)
    }
}

impl From<&String> for QueryValue {
    fn from(value: &String) -> Self {
        QueryValue::Text(value.clone())
    }
}

impl From<i64> for QueryValue {
    fn from(value: i64) -> Self {
        QueryValue::Integer(value)
    }
}

impl From<i32> for QueryValue {
    fn from(value: i32) -> Self {
        QueryValue::Integer(value.into())
    }
}

impl From<u32> for QueryValue {
    fn from(value: u32) -> Self {
        QueryValue::Integer(value.into())
    }
}

impl From<f64> for QueryValue {
    fn from(value: f64) -> Self {
        QueryValue::Float(value)
    }
}

/// One `<attribute> <operator> <value>` condition.
#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    /// Attribute code, e.g. `name` or `org_id`.
    pub attribute: String,
    /// Comparison operator, e.g. `=`, `>`, `LIKE`.
    pub operator: String,
    /// Compared value.
    pub value: QueryValue,
}

impl Condition {
    /// Creates a condition.
    pub fn new(
        attribute: impl Into<String>,
        operator: impl Into<String>,
        value: impl Into<QueryValue>,
    ) -> Self {
        Self {
            attribute: attribute.into(),
            operator: operator.into(),
            value: value.into(),
        }
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.attribute, self.operator, self.value)
    }
}

/// Minimal OQL query builder.
///
/// Conditions are rendered in insertion order and joined with ` AND `;
/// nothing is reordered or deduplicated. The rendering has no `WHERE`
/// keyword between the class and the first condition.
///
/// # Example
///
/// ```
/// use itop_client::query::OqlBuilder;
///
/// let mut builder = OqlBuilder::new("C");
/// builder.add_condition("a", 1, "=");
/// builder.add_condition("b", "x", ">");
/// assert_eq!(builder.to_string(), "SELECT C a = 1 AND b > 'x'");
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct OqlBuilder {
    class_name: String,
    conditions: Vec<Condition>,
}

impl OqlBuilder {
    /// Creates a builder selecting from `class_name`.
    pub fn new(class_name: impl Into<String>) -> Self {
        Self {
            class_name: class_name.into(),
            conditions: Vec::new(),
        }
    }

    /// Appends `<attribute> <operator> <value>`.
    pub fn add_condition(
        &mut self,
        attribute: impl Into<String>,
        value: impl Into<QueryValue>,
        operator: impl Into<String>,
    ) -> &mut Self {
        self.conditions
            .push(Condition::new(attribute, operator, value));
        self
    }

    /// Appends `<attribute> = <value>`.
    pub fn add_equals(
        &mut self,
        attribute: impl Into<String>,
        value: impl Into<QueryValue>,
    ) -> &mut Self {
        self.add_condition(attribute, value, "=")
    }

    /// Consuming form of [`add_condition`](Self::add_condition).
    pub fn with_condition(
        mut self,
        attribute: impl Into<String>,
        value: impl Into<QueryValue>,
        operator: impl Into<String>,
    ) -> Self {
        self.add_condition(attribute, value, operator);
        self
    }

    /// Returns the selected class.
    pub fn class_name(&self) -> &str {
        &self.class_name
    }

    /// Returns the conditions in insertion order.
    pub fn conditions(&self) -> &[Condition] {
        &self.conditions
    }
}

impl fmt::Display for OqlBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SELECT {}", self.class_name)?;
        if !self.conditions.is_empty() {
            write!(f, " {}", join_conditions(&self.conditions))?;
        }
        Ok(())
    }
}

/// A filter for `core/get`.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    /// AND-ed equality on each field. Keys are unique; first-insertion
    /// order is kept.
    Fields(Vec<(String, QueryValue)>),
    /// A pre-built OQL string.
    Raw(String),
    /// A query builder.
    Builder(OqlBuilder),
}

impl Filter {
    /// Creates an equality filter; a repeated key keeps its first position
    /// and takes the last value.
    pub fn fields<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<QueryValue>,
    {
        let mut fields: Vec<(String, QueryValue)> = Vec::new();
        for (key, value) in pairs {
            let key = key.into();
            let value = value.into();
            match fields.iter_mut().find(|(existing, _)| *existing == key) {
                Some(slot) => slot.1 = value,
                None => fields.push((key, value)),
            }
        }
        Filter::Fields(fields)
    }

    /// Creates a raw OQL filter.
    pub fn raw(oql: impl Into<String>) -> Self {
        Filter::Raw(oql.into())
    }

    /// Renders the filter as OQL for `class_name`.
    ///
    /// Builders carry their own class, so `class_name` only applies to
    /// field filters.
    pub fn to_oql(&self, class_name: &str) -> String {
        match self {
            Filter::Raw(oql) => oql.clone(),
            Filter::Builder(builder) => builder.to_string(),
            Filter::Fields(fields) => {
                let conditions: Vec<Condition> = fields
                    .iter()
                    .map(|(attribute, value)| Condition::new(attribute.as_str(), "=", value.clone()))
                    .collect();
                if conditions.is_empty() {
                    format!("SELECT {}", class_name)
                } else {
                    format!("SELECT {} WHERE {}", class_name, join_conditions(&conditions))
                }
            }
        }
    }
}

impl From<OqlBuilder> for Filter {
    fn from(builder: OqlBuilder) -> Self {
        Filter::Builder(builder)
    }
}

impl From<&str> for Filter {
    fn from(oql: &str) -> Self {
        Filter::Raw(oql.to_string())
    }
}

impl From<String> for Filter {
    fn from(oql: String) -> Self {
        Filter::Raw(oql)
    }
}

/// Renders `filter` as the OQL `key` of a `core/get` on `class_name`.
pub fn build_query(class_name: &str, filter: &Filter) -> String {
    filter.to_oql(class_name)
}

fn join_conditions(conditions: &[Condition]) -> String {
    conditions
        .iter()
        .map(Condition::to_string)
        .collect::<Vec<_>>()
        .join(" AND ")
}
