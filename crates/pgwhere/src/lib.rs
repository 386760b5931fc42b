//! # pgwhere
//!
//! A composable, immutable WHERE clause algebra for PostgreSQL query builders.
//!
//! ## Features
//!
//! - **Immutable value semantics**: every operation returns a new clause;
//!   clauses built on different code paths compare structurally
//! - **Predicate algebra**: concatenation, merge-with-override, exclusion by
//!   column, logical OR, and negation
//! - **Bind alignment**: `$n` placeholder indices are computed at render time
//!   and always match the flattened bind list left to right
//! - **Safe identifiers**: column references are validated [`Ident`]s, never
//!   raw strings
//!
//! ## Example
//!
//! ```ignore
//! use pgwhere::{FilterValue, WhereClauseFactory};
//!
//! let factory = WhereClauseFactory::new();
//!
//! let base = factory.build(vec![("status", "active".into())], vec![])?;
//! let scoped = factory.build(vec![("status", "archived".into())], vec![])?;
//!
//! // Re-scoping: the later equality on `status` wins.
//! let clause = base.merge(&scoped);
//! let (sql, binds) = clause.build();
//! assert_eq!(sql, "status = $1");
//! assert_eq!(binds.len(), 1);
//! # Ok::<(), pgwhere::ClauseError>(())
//! ```

pub mod clause;
pub mod error;
pub mod factory;
pub mod ident;
pub mod predicate;
pub mod value;

pub use clause::{Binding, PredicateWithBinds, WhereClause};
pub use error::{ClauseError, ClauseResult};
pub use factory::{FilterArg, NoSchema, SchemaResolver, WhereClauseFactory, sanitize_sql};
pub use ident::{Ident, IdentPart, IntoIdent};
pub use predicate::{CompareOp, Operand, Predicate};
pub use value::FilterValue;
