//! Column and row layout metadata.
//!
//! A [`RowMeta`] names and types every position of a row. The group-by
//! engine resolves group keys and aggregate subjects against it once at
//! setup, and derives the output layout from it.

use std::cmp::Ordering;
use std::fmt;

use grpby_error::{GroupByError, Result};
use serde::{Deserialize, Serialize};

use crate::value::Value;

/// Declared type of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueType {
    Integer,
    Number,
    String,
    Binary,
}

impl ValueType {
    /// INTEGER and NUMBER columns are numeric.
    pub const fn is_numeric(self) -> bool {
        matches!(self, Self::Integer | Self::Number)
    }

    /// The type-appropriate zero, substituted for NULL aggregate results
    /// when the nulls-are-zero policy is on.
    pub fn zero(self) -> Value {
        match self {
            Self::Integer => Value::Integer(0),
            Self::Number => Value::Number(0.0),
            Self::String => Value::Text(String::new()),
            Self::Binary => Value::Binary(Vec::new()),
        }
    }

    /// Convert `value` into this type. NULL stays NULL.
    pub fn convert(self, value: &Value) -> Result<Value> {
        if value.is_null() {
            return Ok(Value::Null);
        }
        match self {
            Self::Integer => value.to_integer().map(Value::Integer),
            Self::Number => value.to_number().map(Value::Number),
            Self::String => Ok(Value::Text(value.to_text())),
            Self::Binary => match value {
                Value::Binary(b) => Ok(Value::Binary(b.clone())),
                other => Ok(Value::Binary(other.to_text().into_bytes())),
            },
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Integer => "Integer",
            Self::Number => "Number",
            Self::String => "String",
            Self::Binary => "Binary",
        };
        f.write_str(s)
    }
}

/// Metadata for a single column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValueMeta {
    pub name: String,
    pub value_type: ValueType,
    /// The upstream sort on this column was descending.
    #[serde(default)]
    pub sort_descending: bool,
}

impl ValueMeta {
    pub fn new(name: impl Into<String>, value_type: ValueType) -> Self {
        Self {
            name: name.into(),
            value_type,
            sort_descending: false,
        }
    }

    /// Mark the column as sorted descending.
    #[must_use]
    pub fn descending(mut self) -> Self {
        self.sort_descending = true;
        self
    }

    /// Same column under a different name.
    #[must_use]
    pub fn renamed(&self, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..self.clone()
        }
    }

    /// Compare two values of this column.
    ///
    /// NULL sorts before everything else. The result is inverted for a
    /// descending column, so it agrees with the order rows arrive in.
    pub fn compare(&self, a: &Value, b: &Value) -> Ordering {
        let ord = a.total_cmp(b);
        if self.sort_descending {
            ord.reverse()
        } else {
            ord
        }
    }

    /// Whether two values of this column are equal for grouping purposes.
    /// Sort direction does not matter; NULL equals NULL.
    pub fn same(&self, a: &Value, b: &Value) -> bool {
        a.total_cmp(b) == Ordering::Equal
    }
}

/// Ordered list of column metadata describing a row.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RowMeta {
    fields: Vec<ValueMeta>,
}

impl RowMeta {
    pub fn new(fields: Vec<ValueMeta>) -> Self {
        Self { fields }
    }

    pub fn push(&mut self, meta: ValueMeta) {
        self.fields.push(meta);
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&ValueMeta> {
        self.fields.get(index)
    }

    pub fn fields(&self) -> &[ValueMeta] {
        &self.fields
    }

    /// Position of the field called `name`, if any.
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name == name)
    }

    /// Position of `name`, or a configuration error built by `missing`.
    pub fn require(&self, name: &str, missing: impl FnOnce() -> GroupByError) -> Result<usize> {
        self.index_of(name).ok_or_else(missing)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|f| f.name.as_str())
    }
}

impl FromIterator<ValueMeta> for RowMeta {
    fn from_iter<I: IntoIterator<Item = ValueMeta>>(iter: I) -> Self {
        Self {
            fields: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
#[allow(clippy::float_cmp)]
mod tests {
    use super::*;

    #[test]
    fn zero_per_type() {
        assert_eq!(ValueType::Integer.zero(), Value::Integer(0));
        assert!(matches!(ValueType::Number.zero(), Value::Number(f) if f == 0.0));
        assert_eq!(ValueType::String.zero(), Value::Text(String::new()));
    }

    #[test]
    fn convert_between_types() {
        assert_eq!(
            ValueType::Number.convert(&Value::Integer(3)).unwrap(),
            Value::Number(3.0)
        );
        assert_eq!(
            ValueType::Integer.convert(&Value::Number(2.4)).unwrap(),
            Value::Integer(2)
        );
        assert_eq!(
            ValueType::String.convert(&Value::Integer(9)).unwrap(),
            Value::Text("9".to_owned())
        );
        assert!(ValueType::Number.convert(&Value::Null).unwrap().is_null());
        assert!(ValueType::Integer.convert(&Value::from("x")).is_err());
    }

    #[test]
    fn descending_compare_is_inverted() {
        let asc = ValueMeta::new("v", ValueType::Integer);
        let desc = asc.clone().descending();
        let (one, two) = (Value::Integer(1), Value::Integer(2));
        assert_eq!(asc.compare(&one, &two), Ordering::Less);
        assert_eq!(desc.compare(&one, &two), Ordering::Greater);
        assert!(desc.same(&one, &Value::Integer(1)));
    }

    #[test]
    fn nulls_sort_first() {
        let meta = ValueMeta::new("v", ValueType::Integer);
        assert_eq!(
            meta.compare(&Value::Null, &Value::Integer(i64::MIN)),
            Ordering::Less
        );
        assert!(meta.same(&Value::Null, &Value::Null));
    }

    #[test]
    fn row_meta_json_form() {
        let json = r#"[
            {"name": "region", "value_type": "string"},
            {"name": "amount", "value_type": "number", "sort_descending": true}
        ]"#;
        let meta: RowMeta = serde_json::from_str(json).unwrap();
        assert_eq!(meta.len(), 2);
        assert_eq!(meta.get(1).unwrap().value_type, ValueType::Number);
        assert!(meta.get(1).unwrap().sort_descending);
        assert!(!meta.get(0).unwrap().sort_descending);
    }

    #[test]
    fn index_lookup() {
        let meta: RowMeta = [
            ValueMeta::new("a", ValueType::String),
            ValueMeta::new("b", ValueType::Integer),
        ]
        .into_iter()
        .collect();
        assert_eq!(meta.index_of("b"), Some(1));
        assert_eq!(meta.index_of("c"), None);
        let err = meta
            .require("c", || GroupByError::GroupFieldNotFound {
                name: "c".to_owned(),
            })
            .unwrap_err();
        assert!(matches!(err, GroupByError::GroupFieldNotFound { .. }));
        assert_eq!(meta.names().collect::<Vec<_>>(), vec!["a", "b"]);
    }
}
