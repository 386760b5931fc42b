//! Predicate expression tree for WHERE clause composition.
//!
//! [`Predicate`] is a closed sum type over the shapes the clause algebra needs
//! to inspect: raw fragments, structured comparisons, range and membership
//! tests, NULL checks, and AND/OR/NOT/grouping combinators. Exhaustive pattern
//! matching on the variants drives merge, invert, exclude, and conjunction
//! logic.
//!
//! Rendering produces SQL with `$n` placeholders computed at build time; the
//! running counter is threaded through so a clause can be rendered after an
//! arbitrary parameter offset.

use crate::error::ClauseResult;
use crate::ident::{Ident, IntoIdent};
use crate::value::FilterValue;

/// Comparison operator for [`Predicate::Compare`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    /// Equal: column = value
    Eq,
    /// Not equal: column != value
    Ne,
    /// Greater than: column > value
    Gt,
    /// Greater than or equal: column >= value
    Gte,
    /// Less than: column < value
    Lt,
    /// Less than or equal: column <= value
    Lte,
}

impl CompareOp {
    /// SQL spelling of the operator.
    pub fn sql(self) -> &'static str {
        match self {
            Self::Eq => "=",
            Self::Ne => "!=",
            Self::Gt => ">",
            Self::Gte => ">=",
            Self::Lt => "<",
            Self::Lte => "<=",
        }
    }
}

/// Right-hand operand of a structured predicate.
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    /// Positional placeholder; the value lives in the owning unit's bind list.
    Bind,
    /// Inline literal rendered directly into the SQL text.
    Literal(FilterValue),
}

impl Operand {
    /// A positional bind placeholder.
    pub fn bind() -> Self {
        Self::Bind
    }

    /// An inline literal operand.
    pub fn literal(value: impl Into<FilterValue>) -> Self {
        Self::Literal(value.into())
    }

    /// The literal value, if this operand carries one.
    pub fn literal_value(&self) -> Option<&FilterValue> {
        match self {
            Self::Literal(v) => Some(v),
            Self::Bind => None,
        }
    }
}

impl From<FilterValue> for Operand {
    fn from(v: FilterValue) -> Self {
        Self::Literal(v)
    }
}

/// A single boolean test node in a filter expression tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    /// Raw SQL fragment (escape hatch; interpolation happens in the factory).
    Raw(String),

    /// Structured comparison: column op operand
    Compare {
        column: Ident,
        op: CompareOp,
        value: Operand,
    },

    /// Range test: column BETWEEN from AND to
    Between {
        column: Ident,
        from: Operand,
        to: Operand,
        negated: bool,
    },

    /// Membership test: column IN (...) or column NOT IN (...)
    InList {
        column: Ident,
        values: Vec<Operand>,
        negated: bool,
    },

    /// NULL check: column IS NULL or column IS NOT NULL
    NullCheck { column: Ident, negated: bool },

    /// AND group: all members must be true.
    And(Vec<Predicate>),

    /// OR group: at least one member must be true.
    Or(Vec<Predicate>),

    /// NOT: negate the inner predicate.
    Not(Box<Predicate>),

    /// Parenthesized grouping, for precedence protection.
    Grouping(Box<Predicate>),
}

impl Predicate {
    /// Create an equality predicate: column = operand
    pub fn eq(column: impl IntoIdent, value: impl Into<Operand>) -> ClauseResult<Self> {
        Self::compare(column, CompareOp::Eq, value)
    }

    /// Create an inequality predicate: column != operand
    pub fn ne(column: impl IntoIdent, value: impl Into<Operand>) -> ClauseResult<Self> {
        Self::compare(column, CompareOp::Ne, value)
    }

    /// Create a greater-than predicate: column > operand
    pub fn gt(column: impl IntoIdent, value: impl Into<Operand>) -> ClauseResult<Self> {
        Self::compare(column, CompareOp::Gt, value)
    }

    /// Create a greater-than-or-equal predicate: column >= operand
    pub fn gte(column: impl IntoIdent, value: impl Into<Operand>) -> ClauseResult<Self> {
        Self::compare(column, CompareOp::Gte, value)
    }

    /// Create a less-than predicate: column < operand
    pub fn lt(column: impl IntoIdent, value: impl Into<Operand>) -> ClauseResult<Self> {
        Self::compare(column, CompareOp::Lt, value)
    }

    /// Create a less-than-or-equal predicate: column <= operand
    pub fn lte(column: impl IntoIdent, value: impl Into<Operand>) -> ClauseResult<Self> {
        Self::compare(column, CompareOp::Lte, value)
    }

    /// Create a comparison predicate with an explicit operator.
    pub fn compare(
        column: impl IntoIdent,
        op: CompareOp,
        value: impl Into<Operand>,
    ) -> ClauseResult<Self> {
        Ok(Self::Compare {
            column: column.into_ident()?,
            op,
            value: value.into(),
        })
    }

    /// Create a membership predicate: column IN (operands...)
    pub fn in_list(column: impl IntoIdent, values: Vec<Operand>) -> ClauseResult<Self> {
        Ok(Self::InList {
            column: column.into_ident()?,
            values,
            negated: false,
        })
    }

    /// Create a non-membership predicate: column NOT IN (operands...)
    pub fn not_in(column: impl IntoIdent, values: Vec<Operand>) -> ClauseResult<Self> {
        Ok(Self::InList {
            column: column.into_ident()?,
            values,
            negated: true,
        })
    }

    /// Create a range predicate: column BETWEEN from AND to
    pub fn between(
        column: impl IntoIdent,
        from: impl Into<Operand>,
        to: impl Into<Operand>,
    ) -> ClauseResult<Self> {
        Ok(Self::Between {
            column: column.into_ident()?,
            from: from.into(),
            to: to.into(),
            negated: false,
        })
    }

    /// Create a negated range predicate: column NOT BETWEEN from AND to
    pub fn not_between(
        column: impl IntoIdent,
        from: impl Into<Operand>,
        to: impl Into<Operand>,
    ) -> ClauseResult<Self> {
        Ok(Self::Between {
            column: column.into_ident()?,
            from: from.into(),
            to: to.into(),
            negated: true,
        })
    }

    /// Create a NULL check: column IS NULL
    pub fn is_null(column: impl IntoIdent) -> ClauseResult<Self> {
        Ok(Self::NullCheck {
            column: column.into_ident()?,
            negated: false,
        })
    }

    /// Create a NULL check: column IS NOT NULL
    pub fn is_not_null(column: impl IntoIdent) -> ClauseResult<Self> {
        Ok(Self::NullCheck {
            column: column.into_ident()?,
            negated: true,
        })
    }

    /// Create a raw SQL fragment.
    pub fn raw(sql: impl Into<String>) -> Self {
        Self::Raw(sql.into())
    }

    /// Create an AND group.
    pub fn and(members: Vec<Predicate>) -> Self {
        Self::And(members)
    }

    /// Create an OR group.
    pub fn or(members: Vec<Predicate>) -> Self {
        Self::Or(members)
    }

    /// Create a NOT wrapper.
    pub fn not(inner: Predicate) -> Self {
        Self::Not(Box::new(inner))
    }

    /// Create a parenthesized grouping.
    pub fn grouping(inner: Predicate) -> Self {
        Self::Grouping(Box::new(inner))
    }

    /// Check if this predicate renders to nothing.
    pub fn is_empty(&self) -> bool {
        match self {
            Self::And(members) | Self::Or(members) => {
                members.is_empty() || members.iter().all(Self::is_empty)
            }
            Self::Not(inner) | Self::Grouping(inner) => inner.is_empty(),
            Self::Raw(sql) => sql.is_empty(),
            _ => false,
        }
    }

    /// Check if this is a direct equality comparison.
    pub fn is_equality(&self) -> bool {
        matches!(
            self,
            Self::Compare {
                op: CompareOp::Eq,
                ..
            }
        )
    }

    /// Left-hand column of a direct equality comparison.
    pub fn equality_column(&self) -> Option<&Ident> {
        match self {
            Self::Compare {
                column,
                op: CompareOp::Eq,
                ..
            } => Some(column),
            _ => None,
        }
    }

    /// Left-hand column of an exclusion-eligible comparison.
    ///
    /// Only comparisons, ranges, and membership tests qualify; raw fragments,
    /// NULL checks, and logical groups are never eligible.
    pub fn comparison_column(&self) -> Option<&Ident> {
        match self {
            Self::Compare { column, .. }
            | Self::Between { column, .. }
            | Self::InList { column, .. } => Some(column),
            _ => None,
        }
    }

    /// Logically negate this predicate.
    ///
    /// Membership flips to non-membership and equality flips to inequality;
    /// raw fragments are grouped before wrapping; every other shape gets a
    /// generic NOT wrapper. Double negation therefore does not round-trip to
    /// the original node shape.
    pub fn inverted(self) -> Self {
        match self {
            Self::InList {
                column,
                values,
                negated: false,
            } => Self::InList {
                column,
                values,
                negated: true,
            },
            Self::Compare {
                column,
                op: CompareOp::Eq,
                value,
            } => Self::Compare {
                column,
                op: CompareOp::Ne,
                value,
            },
            Self::Raw(sql) => Self::not(Self::grouping(Self::Raw(sql))),
            other => Self::not(other),
        }
    }

    /// Render the SQL fragment, consuming `$n` indices from `next_param`.
    ///
    /// `next_param` holds the next unused 1-based placeholder index and is
    /// advanced once per bind operand, left to right.
    pub fn to_sql(&self, next_param: &mut usize) -> String {
        match self {
            Self::Raw(sql) => sql.clone(),
            Self::Compare { column, op, value } => {
                format!(
                    "{} {} {}",
                    column.to_sql(),
                    op.sql(),
                    render_operand(value, next_param)
                )
            }
            Self::Between {
                column,
                from,
                to,
                negated,
            } => {
                let op = if *negated { "NOT BETWEEN" } else { "BETWEEN" };
                let from = render_operand(from, next_param);
                let to = render_operand(to, next_param);
                format!("{} {} {} AND {}", column.to_sql(), op, from, to)
            }
            Self::InList {
                column,
                values,
                negated,
            } => {
                if values.is_empty() {
                    // Empty IN list - always false / true
                    return if *negated { "1=1" } else { "1=0" }.to_string();
                }
                let rendered: Vec<String> = values
                    .iter()
                    .map(|v| render_operand(v, next_param))
                    .collect();
                let op = if *negated { "NOT IN" } else { "IN" };
                format!("{} {} ({})", column.to_sql(), op, rendered.join(", "))
            }
            Self::NullCheck { column, negated } => {
                if *negated {
                    format!("{} IS NOT NULL", column.to_sql())
                } else {
                    format!("{} IS NULL", column.to_sql())
                }
            }
            Self::And(members) => {
                let parts: Vec<String> = members
                    .iter()
                    .filter(|m| !m.is_empty())
                    .map(|m| {
                        let sql = m.to_sql(next_param);
                        // Wrap OR groups in parentheses
                        if matches!(m, Self::Or(_)) && !sql.is_empty() {
                            format!("({sql})")
                        } else {
                            sql
                        }
                    })
                    .filter(|s| !s.is_empty())
                    .collect();
                parts.join(" AND ")
            }
            Self::Or(members) => {
                let parts: Vec<String> = members
                    .iter()
                    .filter(|m| !m.is_empty())
                    .map(|m| {
                        let sql = m.to_sql(next_param);
                        // Wrap AND groups in parentheses
                        if matches!(m, Self::And(_)) && !sql.is_empty() {
                            format!("({sql})")
                        } else {
                            sql
                        }
                    })
                    .filter(|s| !s.is_empty())
                    .collect();
                parts.join(" OR ")
            }
            Self::Not(inner) => {
                let sql = inner.to_sql(next_param);
                if sql.is_empty() {
                    String::new()
                } else {
                    format!("NOT ({sql})")
                }
            }
            Self::Grouping(inner) => {
                let sql = inner.to_sql(next_param);
                if sql.is_empty() {
                    String::new()
                } else {
                    format!("({sql})")
                }
            }
        }
    }
}

fn render_operand(operand: &Operand, next_param: &mut usize) -> String {
    match operand {
        Operand::Bind => {
            let idx = *next_param;
            *next_param += 1;
            format!("${idx}")
        }
        Operand::Literal(v) => v.to_sql_literal(),
    }
}
