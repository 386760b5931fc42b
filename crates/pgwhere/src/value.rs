//! Owned filter values carried by bindings and literal operands.
//!
//! Unlike a `dyn ToSql` parameter, a [`FilterValue`] is structurally comparable,
//! which the clause algebra needs for equality checks and column-map extraction.
//! It still implements [`ToSql`] so bind values can be handed straight to
//! tokio-postgres at execution time.

use bytes::BytesMut;
use chrono::{DateTime, Utc};
use tokio_postgres::types::{IsNull, ToSql, Type, to_sql_checked};
use uuid::Uuid;

/// A filter value: scalar, JSON document, or array of values.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterValue {
    /// SQL NULL.
    Null,
    /// Boolean value.
    Bool(bool),
    /// 64-bit signed integer.
    Int(i64),
    /// 64-bit float.
    Float(f64),
    /// Text value.
    Text(String),
    /// UUID value.
    Uuid(Uuid),
    /// UTC timestamp.
    Timestamp(DateTime<Utc>),
    /// JSON document.
    Json(serde_json::Value),
    /// List of values (IN lists, array binds).
    Array(Vec<FilterValue>),
}

impl FilterValue {
    /// Check if this is a null value.
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Runtime type name, used in error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Int(_) => "integer",
            Self::Float(_) => "float",
            Self::Text(_) => "text",
            Self::Uuid(_) => "uuid",
            Self::Timestamp(_) => "timestamp",
            Self::Json(_) => "json",
            Self::Array(_) => "array",
        }
    }

    /// Render the value as an inline SQL literal.
    ///
    /// Text is single-quoted with `'` doubled. Arrays render as a comma-joined
    /// element list (the caller supplies surrounding parentheses).
    pub fn to_sql_literal(&self) -> String {
        let mut out = String::new();
        self.write_sql_literal(&mut out);
        out
    }

    pub(crate) fn write_sql_literal(&self, out: &mut String) {
        match self {
            Self::Null => out.push_str("NULL"),
            Self::Bool(v) => out.push_str(if *v { "TRUE" } else { "FALSE" }),
            Self::Int(v) => {
                out.push_str(&v.to_string());
            }
            Self::Float(v) => {
                out.push_str(&v.to_string());
            }
            Self::Text(v) => write_quoted(out, v),
            Self::Uuid(v) => write_quoted(out, &v.to_string()),
            Self::Timestamp(v) => write_quoted(out, &v.to_rfc3339()),
            Self::Json(v) => write_quoted(out, &v.to_string()),
            Self::Array(vals) => {
                for (i, v) in vals.iter().enumerate() {
                    if i > 0 {
                        out.push_str(", ");
                    }
                    v.write_sql_literal(out);
                }
            }
        }
    }
}

fn write_quoted(out: &mut String, s: &str) {
    out.push('\'');
    for ch in s.chars() {
        if ch == '\'' {
            out.push('\'');
        }
        out.push(ch);
    }
    out.push('\'');
}

impl std::fmt::Display for FilterValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_sql_literal())
    }
}

impl ToSql for FilterValue {
    fn to_sql(
        &self,
        ty: &Type,
        out: &mut BytesMut,
    ) -> Result<IsNull, Box<dyn std::error::Error + Sync + Send>> {
        match self {
            Self::Null => Ok(IsNull::Yes),
            Self::Bool(v) => v.to_sql(ty, out),
            Self::Int(v) => v.to_sql(ty, out),
            Self::Float(v) => v.to_sql(ty, out),
            Self::Text(v) => v.to_sql(ty, out),
            Self::Uuid(v) => v.to_sql(ty, out),
            Self::Timestamp(v) => v.to_sql(ty, out),
            Self::Json(v) => v.to_sql(ty, out),
            Self::Array(_) => {
                Err("array bind must be expanded by the executor before encoding".into())
            }
        }
    }

    fn accepts(_ty: &Type) -> bool {
        true
    }

    to_sql_checked!();
}

impl From<bool> for FilterValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i16> for FilterValue {
    fn from(v: i16) -> Self {
        Self::Int(i64::from(v))
    }
}

impl From<i32> for FilterValue {
    fn from(v: i32) -> Self {
        Self::Int(i64::from(v))
    }
}

impl From<i64> for FilterValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<f32> for FilterValue {
    fn from(v: f32) -> Self {
        Self::Float(f64::from(v))
    }
}

impl From<f64> for FilterValue {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<&str> for FilterValue {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

impl From<String> for FilterValue {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

impl From<Uuid> for FilterValue {
    fn from(v: Uuid) -> Self {
        Self::Uuid(v)
    }
}

impl From<DateTime<Utc>> for FilterValue {
    fn from(v: DateTime<Utc>) -> Self {
        Self::Timestamp(v)
    }
}

impl From<serde_json::Value> for FilterValue {
    fn from(v: serde_json::Value) -> Self {
        Self::Json(v)
    }
}

impl<T: Into<FilterValue>> From<Option<T>> for FilterValue {
    fn from(v: Option<T>) -> Self {
        match v {
            Some(v) => v.into(),
            None => Self::Null,
        }
    }
}

impl<T: Into<FilterValue>> From<Vec<T>> for FilterValue {
    fn from(vals: Vec<T>) -> Self {
        Self::Array(vals.into_iter().map(Into::into).collect())
    }
}
