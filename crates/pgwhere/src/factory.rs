//! Translates heterogeneous caller-supplied filter arguments into a
//! [`WhereClause`].
//!
//! The factory dispatches on the shape of the argument: raw SQL templates are
//! sanitized inline, key/value maps become one structured unit per resolved
//! key, and pre-built predicate nodes are wrapped with their explicit binds.
//! Schema knowledge (column aliases, composite pseudo-columns) lives behind
//! the [`SchemaResolver`] seam so the factory itself stays schema-agnostic.

use std::sync::Arc;

use crate::clause::{Binding, PredicateWithBinds, WhereClause};
use crate::error::{ClauseError, ClauseResult};
use crate::ident::Ident;
use crate::predicate::{CompareOp, Operand, Predicate};
use crate::value::FilterValue;

/// Schema collaborator: alias resolution and composite-column expansion.
pub trait SchemaResolver {
    /// Substitute the true column name for an aliased key.
    fn resolve_alias(&self, _key: &str) -> Option<String> {
        None
    }

    /// Expand a composite pseudo-column into its constituent column
    /// constraints. Expanded pairs are not re-resolved.
    fn expand_composite(
        &self,
        _key: &str,
        _value: &FilterValue,
    ) -> Option<Vec<(String, FilterValue)>> {
        None
    }
}

/// Default resolver: no aliases, no composites.
pub struct NoSchema;

impl SchemaResolver for NoSchema {}

/// A caller-supplied filter argument, before normalization.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterArg {
    /// Raw SQL text, optionally with `?` placeholders interpolated from the
    /// positional arguments.
    Sql(String),
    /// Column constraints in insertion order.
    Map(Vec<(String, FilterValue)>),
    /// A pre-built predicate node; positional arguments become its binds.
    Node(Predicate),
    /// A bare value. No translation rule exists; always rejected.
    Value(FilterValue),
}

impl From<&str> for FilterArg {
    fn from(sql: &str) -> Self {
        Self::Sql(sql.to_string())
    }
}

impl From<String> for FilterArg {
    fn from(sql: String) -> Self {
        Self::Sql(sql)
    }
}

impl From<Predicate> for FilterArg {
    fn from(predicate: Predicate) -> Self {
        Self::Node(predicate)
    }
}

impl From<Vec<(String, FilterValue)>> for FilterArg {
    fn from(pairs: Vec<(String, FilterValue)>) -> Self {
        Self::Map(pairs)
    }
}

impl From<Vec<(&str, FilterValue)>> for FilterArg {
    fn from(pairs: Vec<(&str, FilterValue)>) -> Self {
        Self::Map(
            pairs
                .into_iter()
                .map(|(k, v)| (k.to_string(), v))
                .collect(),
        )
    }
}

impl From<FilterValue> for FilterArg {
    fn from(value: FilterValue) -> Self {
        Self::Value(value)
    }
}

/// Builds [`WhereClause`] values from raw filter arguments.
pub struct WhereClauseFactory {
    schema: Arc<dyn SchemaResolver + Send + Sync>,
}

impl WhereClauseFactory {
    /// Create a factory with no schema knowledge.
    pub fn new() -> Self {
        Self {
            schema: Arc::new(NoSchema),
        }
    }

    /// Create a factory backed by a schema resolver.
    pub fn with_schema(schema: Arc<dyn SchemaResolver + Send + Sync>) -> Self {
        Self { schema }
    }

    /// Normalize a filter argument and its positional values into a clause.
    ///
    /// Inputs are never mutated; every call produces a fresh [`WhereClause`].
    pub fn build(
        &self,
        arg: impl Into<FilterArg>,
        args: Vec<FilterValue>,
    ) -> ClauseResult<WhereClause> {
        let units = match arg.into() {
            FilterArg::Sql(template) => {
                // Interpolation happens inline; the fragment carries no binds.
                let fragment = sanitize_sql(&template, &args)?;
                vec![PredicateWithBinds::new(Predicate::raw(fragment), vec![])]
            }
            FilterArg::Map(pairs) => self.units_from_map(pairs)?,
            FilterArg::Node(predicate) => {
                // Binds take the node's column name when it has one; nodes
                // without a single column (raw fragments, logical groups)
                // leave the name empty.
                let column = predicate
                    .comparison_column()
                    .map(|c| c.column_name().to_string())
                    .unwrap_or_default();
                let binds = args
                    .into_iter()
                    .map(|v| Binding::new(column.clone(), v))
                    .collect();
                vec![PredicateWithBinds::new(predicate, binds)]
            }
            FilterArg::Value(value) => {
                return Err(ClauseError::unsupported(&value, value.type_name()));
            }
        };

        #[cfg(feature = "tracing")]
        tracing::debug!(units = units.len(), "built WHERE clause");

        Ok(WhereClause::new(units))
    }

    fn units_from_map(
        &self,
        pairs: Vec<(String, FilterValue)>,
    ) -> ClauseResult<Vec<PredicateWithBinds>> {
        let mut units = Vec::with_capacity(pairs.len());
        for (key, value) in pairs {
            let key = self.schema.resolve_alias(&key).unwrap_or(key);
            match self.schema.expand_composite(&key, &value) {
                Some(expanded) => {
                    for (key, value) in expanded {
                        units.push(unit_for_pair(&key, value)?);
                    }
                }
                None => units.push(unit_for_pair(&key, value)?),
            }
        }
        Ok(units)
    }
}

impl Default for WhereClauseFactory {
    fn default() -> Self {
        Self::new()
    }
}

/// Build one clause unit from a resolved key/value pair.
///
/// Scalars become equality comparisons with one bind; arrays become membership
/// tests with one array-valued bind (empty arrays use the constant-false empty
/// IN list); NULL becomes an IS NULL check with no bind.
fn unit_for_pair(key: &str, value: FilterValue) -> ClauseResult<PredicateWithBinds> {
    let column = Ident::parse(key)?;
    let unit = match value {
        FilterValue::Null => PredicateWithBinds::new(
            Predicate::NullCheck {
                column,
                negated: false,
            },
            vec![],
        ),
        FilterValue::Array(vals) if vals.is_empty() => PredicateWithBinds::new(
            Predicate::InList {
                column,
                values: vec![],
                negated: false,
            },
            vec![],
        ),
        value @ FilterValue::Array(_) => PredicateWithBinds::new(
            Predicate::InList {
                column,
                values: vec![Operand::Bind],
                negated: false,
            },
            vec![Binding::new(key, value)],
        ),
        value => PredicateWithBinds::new(
            Predicate::Compare {
                column,
                op: CompareOp::Eq,
                value: Operand::Bind,
            },
            vec![Binding::new(key, value)],
        ),
    };
    Ok(unit)
}

/// Interpolate positional values into a `?` template as inline SQL literals.
///
/// This is the explicit lower-safety raw path: values are escaped and bound
/// directly into the text rather than parameterized. Placeholder and argument
/// counts must match.
pub fn sanitize_sql(template: &str, args: &[FilterValue]) -> ClauseResult<String> {
    let mut out = String::with_capacity(template.len());
    let mut remaining = args.iter();
    let mut used = 0usize;

    for ch in template.chars() {
        if ch == '?' {
            let Some(value) = remaining.next() else {
                return Err(ClauseError::validation(format!(
                    "Wrong number of bind values: template has more placeholders than the {} given",
                    args.len()
                )));
            };
            used += 1;
            value.write_sql_literal(&mut out);
        } else {
            out.push(ch);
        }
    }

    if used < args.len() {
        return Err(ClauseError::validation(format!(
            "Wrong number of bind values: template used {used} of {} given",
            args.len()
        )));
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sql_template_interpolates_literals() {
        let factory = WhereClauseFactory::new();
        let clause = factory
            .build("name = ? OR nick = ?", vec!["Ann".into(), "O'Brien".into()])
            .unwrap();

        assert_eq!(clause.units().len(), 1);
        assert!(clause.binds().is_empty());
        let (sql, _) = clause.build();
        assert_eq!(sql, "(name = 'Ann' OR nick = 'O''Brien')");
    }

    #[test]
    fn sql_template_rejects_bind_count_mismatch() {
        let factory = WhereClauseFactory::new();
        assert!(factory.build("a = ? AND b = ?", vec![1i64.into()]).is_err());
        assert!(
            factory
                .build("a = ?", vec![1i64.into(), 2i64.into()])
                .is_err()
        );
    }

    #[test]
    fn map_builds_one_unit_per_key() {
        let factory = WhereClauseFactory::new();
        let clause = factory
            .build(
                vec![("name", "Ann".into()), ("status", vec!["a", "b"].into())],
                vec![],
            )
            .unwrap();

        assert_eq!(clause.units().len(), 2);
        let binds = clause.binds();
        assert_eq!(binds.len(), 2);
        assert_eq!(binds[0], Binding::new("name", "Ann"));
        assert_eq!(binds[1], Binding::new("status", vec!["a", "b"]));

        let (sql, _) = clause.build();
        assert_eq!(sql, "name = $1 AND (status IN ($2))");
    }

    #[test]
    fn map_null_becomes_null_check() {
        let factory = WhereClauseFactory::new();
        let clause = factory
            .build(vec![("deleted_at", FilterValue::Null)], vec![])
            .unwrap();

        assert!(clause.binds().is_empty());
        let (sql, _) = clause.build();
        assert_eq!(sql, "(deleted_at IS NULL)");
    }

    #[test]
    fn map_empty_array_is_constant_false() {
        let factory = WhereClauseFactory::new();
        let clause = factory
            .build(vec![("id", FilterValue::Array(vec![]))], vec![])
            .unwrap();

        assert!(clause.binds().is_empty());
        let (sql, _) = clause.build();
        assert_eq!(sql, "(1=0)");
    }

    #[test]
    fn map_rejects_invalid_column_key() {
        let factory = WhereClauseFactory::new();
        let err = factory
            .build(vec![("1; DROP TABLE users", 1i64.into())], vec![])
            .unwrap_err();
        assert!(matches!(err, ClauseError::Validation(_)));
    }

    struct TestSchema;

    impl SchemaResolver for TestSchema {
        fn resolve_alias(&self, key: &str) -> Option<String> {
            (key == "login").then(|| "username".to_string())
        }

        fn expand_composite(
            &self,
            key: &str,
            value: &FilterValue,
        ) -> Option<Vec<(String, FilterValue)>> {
            if key != "period" {
                return None;
            }
            let FilterValue::Array(vals) = value else {
                return None;
            };
            Some(vec![
                ("period_start".to_string(), vals[0].clone()),
                ("period_end".to_string(), vals[1].clone()),
            ])
        }
    }

    #[test]
    fn map_resolves_aliases() {
        let factory = WhereClauseFactory::with_schema(Arc::new(TestSchema));
        let clause = factory
            .build(vec![("login", "ann".into())], vec![])
            .unwrap();

        let (sql, binds) = clause.build();
        assert_eq!(sql, "username = $1");
        assert_eq!(binds[0].column, "username");
    }

    #[test]
    fn map_expands_composite_columns() {
        let factory = WhereClauseFactory::with_schema(Arc::new(TestSchema));
        let clause = factory
            .build(
                vec![("period", vec![2020i64, 2024i64].into())],
                vec![],
            )
            .unwrap();

        assert_eq!(clause.units().len(), 2);
        let (sql, binds) = clause.build();
        assert_eq!(sql, "period_start = $1 AND period_end = $2");
        assert_eq!(binds[0].column, "period_start");
        assert_eq!(binds[1].column, "period_end");
    }

    #[test]
    fn node_wraps_with_explicit_binds() {
        let factory = WhereClauseFactory::new();
        let node = Predicate::gt("price", Operand::bind()).unwrap();
        let clause = factory.build(node, vec![100i64.into()]).unwrap();

        assert_eq!(clause.units().len(), 1);
        let (sql, binds) = clause.build();
        assert_eq!(sql, "(price > $1)");
        assert_eq!(binds, vec![Binding::new("price", 100i64)]);
    }

    #[test]
    fn node_without_single_column_leaves_bind_name_empty() {
        let factory = WhereClauseFactory::new();
        let node = Predicate::or(vec![
            Predicate::eq("a", Operand::bind()).unwrap(),
            Predicate::eq("b", Operand::bind()).unwrap(),
        ]);
        let clause = factory
            .build(node, vec![1i64.into(), 2i64.into()])
            .unwrap();

        let binds = clause.binds();
        assert_eq!(binds.len(), 2);
        assert!(binds.iter().all(|b| b.column.is_empty()));

        // Alignment is positional, never name-driven.
        let (sql, _) = clause.build();
        assert_eq!(sql, "(a = $1 OR b = $2)");
    }

    #[test]
    fn bare_value_is_unsupported() {
        let factory = WhereClauseFactory::new();
        let err = factory.build(FilterValue::Int(42), vec![]).unwrap_err();

        assert!(err.is_unsupported_argument());
        let message = err.to_string();
        assert!(message.contains("42"));
        assert!(message.contains("integer"));
    }
}
