mod lex;

#[cfg(test)]
mod tests;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display};
use ulid::Ulid;
use uuid::Uuid;

///
/// Value
///
/// Type-erased scalar carried by index declarations and query statements.
///
/// Variant order is the untagged deserialization order: typed string forms
/// (datetime, date, uuid, ulid, decimal) are tried before the plain string
/// fallback, so round-tripped rows keep their scalar kind where the text
/// form is unambiguous.
///

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    DateTime(DateTime<Utc>),
    Date(NaiveDate),
    Uuid(Uuid),
    Ulid(Ulid),
    Decimal(Decimal),
    String(String),
    /// An enum-typed field, carried as its canonical string form.
    Enum(String),
    /// Fallback for scalars outside the supported set; encodes as its
    /// display text, which may not order meaningfully.
    Other(String),
}

impl Value {
    /// Wrap an unsupported scalar as its textual fallback.
    pub fn other(value: impl Display) -> Self {
        let text = value.to_string();
        tracing::warn!(
            value = %text,
            "unsupported scalar type serialized into an index; queries may be inconsistent"
        );
        Self::Other(text)
    }

    /// Encode for key use. `lexicographic` selects the ordered sort-key form
    /// for numeric scalars; every other scalar has a single text form.
    #[must_use]
    pub fn encode(&self, lexicographic: bool) -> String {
        match self {
            Self::Null => "null".to_string(),
            Self::Bool(b) => if *b { "true" } else { "false" }.to_string(),
            Self::Int(n) => {
                if lexicographic {
                    lex::lex_int(*n)
                } else {
                    n.to_string()
                }
            }
            Self::Float(f) => {
                if lexicographic {
                    lex::lex_float(*f)
                } else {
                    f.to_string()
                }
            }
            Self::Decimal(d) => {
                if lexicographic {
                    lex::lex_decimal(*d)
                } else {
                    d.to_string()
                }
            }
            Self::DateTime(dt) => dt.to_rfc3339(),
            Self::Date(d) => d.to_string(),
            Self::Uuid(u) => u.to_string(),
            Self::Ulid(u) => u.to_string(),
            Self::String(s) | Self::Enum(s) | Self::Other(s) => s.clone(),
        }
    }

    /// Equality-use text form (partition keys, unique keys).
    #[must_use]
    pub fn plain(&self) -> String {
        self.encode(false)
    }

    /// Ordered text form (sort keys).
    #[must_use]
    pub fn lex(&self) -> String {
        self.encode(true)
    }

    #[must_use]
    pub const fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(n) => Some(*n),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) | Self::Enum(s) => Some(s),
            _ => None,
        }
    }
}

impl Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.plain())
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Self::Int(i64::from(value))
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<Decimal> for Value {
    fn from(value: Decimal) -> Self {
        Self::Decimal(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<NaiveDate> for Value {
    fn from(value: NaiveDate) -> Self {
        Self::Date(value)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(value: DateTime<Utc>) -> Self {
        Self::DateTime(value)
    }
}

impl From<NaiveDateTime> for Value {
    /// Naive datetimes are assumed to be in UTC.
    fn from(value: NaiveDateTime) -> Self {
        Self::DateTime(value.and_utc())
    }
}

impl From<Uuid> for Value {
    fn from(value: Uuid) -> Self {
        Self::Uuid(value)
    }
}

impl From<Ulid> for Value {
    fn from(value: Ulid) -> Self {
        Self::Ulid(value)
    }
}

impl<V: Into<Self>> From<Option<V>> for Value {
    fn from(value: Option<V>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}

///
/// FieldValue
///
/// A named scalar plucked off a record. Persists as a `[name, value]` pair
/// on unique and query node rows.
///

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(from = "(String, Value)", into = "(String, Value)")]
pub struct FieldValue {
    pub name: String,
    pub value: Value,
}

impl FieldValue {
    pub fn new(name: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

impl From<(String, Value)> for FieldValue {
    fn from((name, value): (String, Value)) -> Self {
        Self { name, value }
    }
}

impl From<FieldValue> for (String, Value) {
    fn from(field: FieldValue) -> Self {
        (field.name, field.value)
    }
}
