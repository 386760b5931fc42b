//! WHERE clause composition: an immutable algebra over predicate/bind units.
//!
//! A [`WhereClause`] is an ordered collection of [`PredicateWithBinds`] units.
//! Unit order carries no logical meaning (the conjunction is commutative) but
//! is preserved so binds line up positionally with the `$n` placeholders of
//! the rendered conjunction. Every operation returns a new clause; nothing is
//! mutated in place.

use std::collections::{HashMap, HashSet};
use std::ops::Add;
use std::sync::OnceLock;

use crate::error::{ClauseError, ClauseResult};
use crate::ident::Ident;
use crate::predicate::{CompareOp, Predicate};
use crate::value::FilterValue;

/// A value positionally associated with one placeholder in rendered SQL,
/// tagged with its originating column name.
///
/// `column` is empty when the bind has no single originating column, e.g.
/// binds attached to a raw fragment or a logical group node. Positional
/// alignment never depends on the name.
#[derive(Debug, Clone, PartialEq)]
pub struct Binding {
    pub column: String,
    pub value: FilterValue,
}

impl Binding {
    /// Create a binding for a column.
    pub fn new(column: impl Into<String>, value: impl Into<FilterValue>) -> Self {
        Self {
            column: column.into(),
            value: value.into(),
        }
    }
}

/// One clause unit: a predicate (or the empty sentinel) plus its ordered binds.
#[derive(Debug, Clone, PartialEq)]
pub struct PredicateWithBinds {
    predicate: Option<Predicate>,
    binds: Vec<Binding>,
}

impl PredicateWithBinds {
    /// Create a unit from a predicate and its binds.
    pub fn new(predicate: Predicate, binds: Vec<Binding>) -> Self {
        Self {
            predicate: Some(predicate),
            binds,
        }
    }

    /// The empty sentinel unit, the structural identity for clause addition.
    pub fn empty() -> Self {
        Self {
            predicate: None,
            binds: Vec::new(),
        }
    }

    /// Check if this is the empty sentinel.
    pub fn is_empty(&self) -> bool {
        self.predicate.is_none() && self.binds.is_empty()
    }

    /// The predicate, if present.
    pub fn predicate(&self) -> Option<&Predicate> {
        self.predicate.as_ref()
    }

    /// The unit's binds, in placeholder order.
    pub fn binds(&self) -> &[Binding] {
        &self.binds
    }
}

/// An immutable, composable set of WHERE predicates with positional binds.
#[derive(Debug)]
pub struct WhereClause {
    units: Vec<PredicateWithBinds>,
    // Per-instance cache of equality-referenced columns, for merge override
    // checks. Never shared across instances.
    referenced: OnceLock<HashSet<Ident>>,
}

impl Clone for WhereClause {
    fn clone(&self) -> Self {
        Self {
            units: self.units.clone(),
            referenced: OnceLock::new(),
        }
    }
}

impl PartialEq for WhereClause {
    fn eq(&self, other: &Self) -> bool {
        self.predicates() == other.predicates() && self.binds() == other.binds()
    }
}

impl WhereClause {
    /// Create a clause from a list of units.
    pub fn new(units: Vec<PredicateWithBinds>) -> Self {
        Self {
            units,
            referenced: OnceLock::new(),
        }
    }

    /// The canonical empty clause, holding one empty sentinel unit.
    ///
    /// Lazily built once and shared process-wide; construction is pure, so a
    /// first-access race is harmless.
    pub fn empty() -> &'static WhereClause {
        static EMPTY: OnceLock<WhereClause> = OnceLock::new();
        EMPTY.get_or_init(|| WhereClause::new(vec![PredicateWithBinds::empty()]))
    }

    /// The raw unit list, empty sentinels included.
    pub fn units(&self) -> &[PredicateWithBinds] {
        &self.units
    }

    /// Check if the clause holds no predicates.
    pub fn is_empty(&self) -> bool {
        self.predicates().is_empty()
    }

    /// Concatenate: both sides are simply ANDed, with no override semantics.
    pub fn and(&self, other: &WhereClause) -> WhereClause {
        let mut units: Vec<_> = self.non_empty_units().cloned().collect();
        units.extend(other.units.iter().cloned());
        WhereClause::new(units)
    }

    /// Merge with override: `other`'s equality constraints replace this
    /// clause's equality constraints on the same column reference.
    ///
    /// Column conflicts are decided by structural [`Ident`] identity, so a
    /// qualified `users.id` does not override a bare `id`. Non-equality
    /// predicates on the overridden column are always retained.
    pub fn merge(&self, other: &WhereClause) -> WhereClause {
        let referenced = other.referenced_columns();
        let mut units: Vec<_> = self
            .non_empty_units()
            .filter(|u| {
                match u.predicate().and_then(Predicate::equality_column) {
                    Some(column) => !referenced.contains(column),
                    None => true,
                }
            })
            .cloned()
            .collect();
        units.extend(other.units.iter().cloned());
        WhereClause::new(units)
    }

    /// Drop comparison predicates on the named columns.
    ///
    /// Only comparisons, ranges, and membership tests are exclusion-eligible;
    /// raw fragments, NULL checks, and logical groups pass through untouched.
    /// This is an intentional scope limit, not an oversight.
    pub fn except(&self, columns: &[&str]) -> WhereClause {
        let units = self
            .non_empty_units()
            .filter(|u| {
                match u.predicate().and_then(Predicate::comparison_column) {
                    Some(column) => !columns.contains(&column.column_name()),
                    None => true,
                }
            })
            .cloned()
            .collect();
        WhereClause::new(units)
    }

    /// Logical OR combination.
    ///
    /// The empty clause is the identity on either side. Otherwise both sides
    /// collapse into a single opaque unit, so the result can no longer be
    /// selectively `except`ed by column.
    pub fn or(&self, other: &WhereClause) -> WhereClause {
        if self.is_empty() {
            return other.clone();
        }
        if other.is_empty() {
            return self.clone();
        }
        let predicate = Predicate::or(vec![self.ast(), other.ast()]);
        let mut binds = self.binds();
        binds.extend(other.binds());
        WhereClause::new(vec![PredicateWithBinds::new(predicate, binds)])
    }

    /// Logically negate every unit, keeping its binds.
    ///
    /// A unit without a predicate is a caller error: a well-formed clause
    /// never carries a bare `None` predicate into negation.
    pub fn invert(&self) -> ClauseResult<WhereClause> {
        let mut units = Vec::with_capacity(self.units.len());
        for unit in &self.units {
            let predicate = unit
                .predicate()
                .cloned()
                .ok_or(ClauseError::InvalidNegation)?
                .inverted();
            units.push(PredicateWithBinds::new(predicate, unit.binds().to_vec()));
        }
        Ok(WhereClause::new(units))
    }

    /// The AND-conjunction tree over all predicates.
    ///
    /// Empty-string raw fragments (the historical "always true" idiom) are
    /// dropped. Raw fragments and non-equality nodes are wrapped in a grouping
    /// for precedence protection; equality nodes pass through unwrapped so
    /// call sites can still pattern-match on them.
    pub fn ast(&self) -> Predicate {
        let members = self
            .predicates()
            .into_iter()
            .filter(|p| !matches!(p, Predicate::Raw(sql) if sql.is_empty()))
            .map(|p| {
                if p.is_equality() {
                    p.clone()
                } else {
                    Predicate::grouping(p.clone())
                }
            })
            .collect();
        Predicate::And(members)
    }

    /// All binds of non-empty units, flattened in unit order.
    ///
    /// This is the sequence to substitute into the conjunction's placeholders
    /// left to right.
    pub fn binds(&self) -> Vec<Binding> {
        self.non_empty_units()
            .flat_map(|u| u.binds().iter().cloned())
            .collect()
    }

    /// Render the conjunction with `$n` numbering starting at 1.
    pub fn build(&self) -> (String, Vec<Binding>) {
        self.build_with_offset(0)
    }

    /// Render with placeholder numbering starting after `offset`.
    ///
    /// For example, `build_with_offset(2)` numbers the first bind `$3`. Useful
    /// when SET parameters precede the WHERE clause in an UPDATE.
    pub fn build_with_offset(&self, offset: usize) -> (String, Vec<Binding>) {
        let mut next_param = offset + 1;
        let sql = self.ast().to_sql(&mut next_param);
        (sql, self.binds())
    }

    /// Extract direct equality constraints as a column → value map.
    ///
    /// Only equality comparisons participate; inequalities, ranges, and
    /// membership tests are skipped. With `table` given, only equalities whose
    /// left column is qualified by that table are kept. Values come from the
    /// unit's first bind when present, else from a literal right-hand operand.
    pub fn to_column_map(&self, table: Option<&str>) -> HashMap<String, FilterValue> {
        let mut map = HashMap::new();
        for unit in self.non_empty_units() {
            let Some(Predicate::Compare {
                column,
                op: CompareOp::Eq,
                value,
            }) = unit.predicate()
            else {
                continue;
            };
            if let Some(table) = table {
                if column.table_name() != Some(table) {
                    continue;
                }
            }
            let resolved = unit
                .binds()
                .first()
                .map(|b| b.value.clone())
                .or_else(|| value.literal_value().cloned())
                .unwrap_or(FilterValue::Null);
            map.insert(column.column_name().to_string(), resolved);
        }
        map
    }

    /// Columns referenced as the left operand of equality predicates.
    ///
    /// Lazily computed and cached per instance; clones start with a fresh
    /// cache so distinct unit lists never share one.
    pub(crate) fn referenced_columns(&self) -> &HashSet<Ident> {
        self.referenced.get_or_init(|| {
            self.predicates()
                .into_iter()
                .filter_map(Predicate::equality_column)
                .cloned()
                .collect()
        })
    }

    fn non_empty_units(&self) -> impl Iterator<Item = &PredicateWithBinds> {
        self.units.iter().filter(|u| !u.is_empty())
    }

    fn predicates(&self) -> Vec<&Predicate> {
        self.non_empty_units()
            .filter_map(PredicateWithBinds::predicate)
            .collect()
    }
}

impl Add for WhereClause {
    type Output = WhereClause;

    fn add(self, rhs: WhereClause) -> WhereClause {
        self.and(&rhs)
    }
}

impl Add<&WhereClause> for &WhereClause {
    type Output = WhereClause;

    fn add(self, rhs: &WhereClause) -> WhereClause {
        self.and(rhs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::predicate::Operand;

    fn eq_bind(column: &str, value: impl Into<FilterValue>) -> PredicateWithBinds {
        let value = value.into();
        PredicateWithBinds::new(
            Predicate::eq(column, Operand::bind()).unwrap(),
            vec![Binding::new(column, value)],
        )
    }

    fn clause(units: Vec<PredicateWithBinds>) -> WhereClause {
        WhereClause::new(units)
    }

    #[test]
    fn empty_is_idempotent() {
        assert!(WhereClause::empty().is_empty());
        assert_eq!(WhereClause::empty(), WhereClause::empty());
        assert!(WhereClause::empty().binds().is_empty());
        let (sql, binds) = WhereClause::empty().build();
        assert_eq!(sql, "");
        assert!(binds.is_empty());
    }

    #[test]
    fn and_with_empty_is_structural_noop() {
        let a = clause(vec![eq_bind("id", 1i64)]);
        assert_eq!(a.and(WhereClause::empty()), a);
        assert_eq!(WhereClause::empty().and(&a), a);
        assert_eq!(&a + WhereClause::empty(), a);
    }

    #[test]
    fn and_preserves_unit_order() {
        let a = clause(vec![eq_bind("id", 1i64)]);
        let b = clause(vec![eq_bind("name", "Ann")]);
        let combined = a.and(&b);
        let binds = combined.binds();
        assert_eq!(binds[0].column, "id");
        assert_eq!(binds[1].column, "name");
    }

    #[test]
    fn merge_overrides_same_column_equality() {
        let a = clause(vec![eq_bind("x", 1i64), eq_bind("y", 9i64)]);
        let b = clause(vec![eq_bind("x", 2i64)]);
        let merged = a.merge(&b);

        let map = merged.to_column_map(None);
        assert_eq!(map.get("x"), Some(&FilterValue::Int(2)));
        assert_eq!(map.get("y"), Some(&FilterValue::Int(9)));
    }

    #[test]
    fn merge_keeps_non_equality_on_conflicting_column() {
        let range = PredicateWithBinds::new(
            Predicate::gt("x", Operand::bind()).unwrap(),
            vec![Binding::new("x", 0i64)],
        );
        let a = clause(vec![eq_bind("x", 1i64), range.clone()]);
        let b = clause(vec![eq_bind("x", 2i64)]);
        let merged = a.merge(&b);

        // The gt predicate survives; only the equality was overridden.
        assert_eq!(merged.binds().len(), 2);
        assert!(merged.units().contains(&range));
    }

    #[test]
    fn merge_override_uses_column_identity_not_name() {
        let a = clause(vec![eq_bind("users.id", 1i64)]);
        let b = clause(vec![eq_bind("id", 2i64)]);
        let merged = a.merge(&b);

        // Bare `id` does not override qualified `users.id`.
        assert_eq!(merged.binds().len(), 2);
    }

    #[test]
    fn except_drops_only_comparison_kinds() {
        let raw = PredicateWithBinds::new(Predicate::raw("x > random()"), vec![]);
        let a = clause(vec![eq_bind("x", 1i64), raw.clone()]);
        let remaining = a.except(&["x"]);

        assert_eq!(remaining.units().len(), 1);
        assert!(remaining.units().contains(&raw));
    }

    #[test]
    fn except_covers_range_and_membership() {
        let between = PredicateWithBinds::new(
            Predicate::between("age", Operand::bind(), Operand::bind()).unwrap(),
            vec![Binding::new("age", 1i64), Binding::new("age", 9i64)],
        );
        let membership = PredicateWithBinds::new(
            Predicate::in_list("status", vec![Operand::bind()]).unwrap(),
            vec![Binding::new("status", vec!["a", "b"])],
        );
        let a = clause(vec![between, membership, eq_bind("id", 1i64)]);
        let remaining = a.except(&["age", "status"]);

        assert_eq!(remaining.units().len(), 1);
        assert_eq!(remaining.binds()[0].column, "id");
    }

    #[test]
    fn or_with_empty_is_identity_on_both_sides() {
        let a = clause(vec![eq_bind("id", 1i64)]);
        assert_eq!(WhereClause::empty().or(&a), a);
        assert_eq!(a.or(WhereClause::empty()), a);
    }

    #[test]
    fn or_collapses_into_a_single_unit() {
        let a = clause(vec![eq_bind("id", 1i64)]);
        let b = clause(vec![eq_bind("name", "Ann")]);
        let combined = a.or(&b);

        assert_eq!(combined.units().len(), 1);
        let binds = combined.binds();
        assert_eq!(binds.len(), 2);
        assert_eq!(binds[0].column, "id");
        assert_eq!(binds[1].column, "name");

        // Collapsed units are opaque to except().
        assert_eq!(combined.except(&["id"]).units().len(), 1);
    }

    #[test]
    fn or_renders_both_sides() {
        let a = clause(vec![eq_bind("id", 1i64)]);
        let b = clause(vec![eq_bind("name", "Ann")]);
        let (sql, binds) = a.or(&b).build();
        assert_eq!(sql, "((id = $1) OR (name = $2))");
        assert_eq!(binds.len(), 2);
    }

    #[test]
    fn invert_maps_shapes_and_keeps_binds() {
        let membership = PredicateWithBinds::new(
            Predicate::in_list("status", vec![Operand::bind()]).unwrap(),
            vec![Binding::new("status", vec!["a"])],
        );
        let a = clause(vec![eq_bind("id", 5i64), membership]);
        let inverted = a.invert().unwrap();

        let (sql, binds) = inverted.build();
        assert_eq!(sql, "(id != $1) AND (status NOT IN ($2))");
        assert_eq!(binds, a.binds());
    }

    #[test]
    fn invert_rejects_missing_predicate() {
        let err = WhereClause::empty().invert().unwrap_err();
        assert!(err.is_invalid_negation());
    }

    #[test]
    fn ast_drops_empty_string_fragment() {
        let a = clause(vec![
            PredicateWithBinds::new(Predicate::raw(""), vec![]),
            eq_bind("id", 1i64),
        ]);
        let (sql, _) = a.build();
        assert_eq!(sql, "id = $1");
    }

    #[test]
    fn ast_wraps_raw_fragments_but_not_equalities() {
        let a = clause(vec![
            eq_bind("id", 1i64),
            PredicateWithBinds::new(Predicate::raw("score > 10 OR score < 2"), vec![]),
        ]);
        let (sql, _) = a.build();
        assert_eq!(sql, "id = $1 AND (score > 10 OR score < 2)");
    }

    #[test]
    fn binds_align_with_placeholders() {
        let u1 = eq_bind("id", 1i64);
        let u2 = PredicateWithBinds::new(
            Predicate::between("age", Operand::bind(), Operand::bind()).unwrap(),
            vec![Binding::new("age", 18i64), Binding::new("age", 65i64)],
        );
        let a = clause(vec![u1]).and(&clause(vec![u2]));

        let (sql, binds) = a.build();
        assert_eq!(sql, "id = $1 AND (age BETWEEN $2 AND $3)");
        assert_eq!(
            binds,
            vec![
                Binding::new("id", 1i64),
                Binding::new("age", 18i64),
                Binding::new("age", 65i64),
            ]
        );
    }

    #[test]
    fn build_with_offset_shifts_numbering() {
        let a = clause(vec![eq_bind("id", 1i64), eq_bind("name", "Ann")]);
        let (sql, _) = a.build_with_offset(3);
        assert_eq!(sql, "id = $4 AND name = $5");
    }

    #[test]
    fn column_map_excludes_inequalities() {
        let ne = PredicateWithBinds::new(
            Predicate::ne("age", Operand::bind()).unwrap(),
            vec![Binding::new("age", 10i64)],
        );
        let a = clause(vec![eq_bind("id", 5i64), ne]);
        let map = a.to_column_map(None);

        assert_eq!(map.len(), 1);
        assert_eq!(map.get("id"), Some(&FilterValue::Int(5)));
    }

    #[test]
    fn column_map_restricted_to_table() {
        let a = clause(vec![eq_bind("users.id", 5i64), eq_bind("posts.id", 7i64)]);
        let map = a.to_column_map(Some("users"));

        assert_eq!(map.len(), 1);
        assert_eq!(map.get("id"), Some(&FilterValue::Int(5)));
    }

    #[test]
    fn column_map_falls_back_to_literal_operand() {
        let literal = PredicateWithBinds::new(
            Predicate::eq("kind", Operand::literal("draft")).unwrap(),
            vec![],
        );
        let array_literal = PredicateWithBinds::new(
            Predicate::eq("tags", Operand::literal(vec!["a", "b"])).unwrap(),
            vec![],
        );
        let a = clause(vec![literal, array_literal]);
        let map = a.to_column_map(None);

        assert_eq!(map.get("kind"), Some(&FilterValue::Text("draft".into())));
        assert_eq!(
            map.get("tags"),
            Some(&FilterValue::Array(vec![
                FilterValue::Text("a".into()),
                FilterValue::Text("b".into()),
            ]))
        );
    }

    #[test]
    fn equality_is_structural() {
        let a = clause(vec![eq_bind("id", 1i64)]);
        let mut units = vec![PredicateWithBinds::empty()];
        units.push(eq_bind("id", 1i64));
        let b = clause(units);

        // Sentinel units are invisible to equality.
        assert_eq!(a, b);

        let c = clause(vec![eq_bind("id", 2i64)]);
        assert_ne!(a, c);
    }

    #[test]
    fn clone_recomputes_referenced_columns() {
        let a = clause(vec![eq_bind("x", 1i64)]);
        assert_eq!(a.referenced_columns().len(), 1);

        let cloned = a.clone();
        assert_eq!(cloned.referenced_columns().len(), 1);
    }
}
