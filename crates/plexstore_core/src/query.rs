//! Filter, sorting and pagination descriptors.
//!
//! These types describe *what* a caller asked for. Evaluating them is up to
//! each data store.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Comparison operator of a [`Predicate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Operator {
    /// Value is one of the operands.
    In,
    /// Value is none of the operands.
    NotIn,
    /// String value starts with the operand.
    Prefix,
    /// String value contains the operand.
    Infix,
    /// String value ends with the operand.
    Postfix,
    /// Value is absent or null.
    IsNull,
    /// Value is present and not null.
    NotNull,
    /// Value is less than the operand.
    Lt,
    /// Value is less than or equal to the operand.
    Le,
    /// Value is greater than the operand.
    Gt,
    /// Value is greater than or equal to the operand.
    Ge,
}

/// A single filter condition on an attribute path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Predicate {
    /// Attribute path the condition applies to.
    pub path: String,
    /// Comparison operator.
    pub operator: Operator,
    /// Operands.
    pub values: Vec<Value>,
}

impl Predicate {
    /// Creates a predicate.
    pub fn new(path: impl Into<String>, operator: Operator, values: Vec<Value>) -> Self {
        Self {
            path: path.into(),
            operator,
            values,
        }
    }

    /// Creates an `In` predicate with a single operand.
    pub fn equals(path: impl Into<String>, value: Value) -> Self {
        Self::new(path, Operator::In, vec![value])
    }
}

/// A boolean combination of predicates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FilterExpression {
    /// A single predicate.
    Predicate(Predicate),
    /// Both sides must hold.
    And(Box<FilterExpression>, Box<FilterExpression>),
    /// Either side must hold.
    Or(Box<FilterExpression>, Box<FilterExpression>),
    /// The inner expression must not hold.
    Not(Box<FilterExpression>),
}

impl FilterExpression {
    /// Combines two expressions with `And`.
    #[must_use]
    pub fn and(self, other: FilterExpression) -> Self {
        Self::And(Box::new(self), Box::new(other))
    }

    /// Combines two expressions with `Or`.
    #[must_use]
    pub fn or(self, other: FilterExpression) -> Self {
        Self::Or(Box::new(self), Box::new(other))
    }

    /// Negates the expression.
    #[must_use]
    pub fn negate(self) -> Self {
        Self::Not(Box::new(self))
    }

    /// Collects every predicate in the expression, left to right.
    #[must_use]
    pub fn predicates(&self) -> Vec<&Predicate> {
        let mut out = Vec::new();
        self.collect_predicates(&mut out);
        out
    }

    fn collect_predicates<'a>(&'a self, out: &mut Vec<&'a Predicate>) {
        match self {
            Self::Predicate(p) => out.push(p),
            Self::And(l, r) | Self::Or(l, r) => {
                l.collect_predicates(out);
                r.collect_predicates(out);
            }
            Self::Not(inner) => inner.collect_predicates(out),
        }
    }
}

impl From<Predicate> for FilterExpression {
    fn from(predicate: Predicate) -> Self {
        Self::Predicate(predicate)
    }
}

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SortOrder {
    /// Smallest first.
    Asc,
    /// Largest first.
    Desc,
}

/// Ordered list of sort keys.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sorting {
    /// Sort keys, most significant first.
    pub fields: Vec<(String, SortOrder)>,
}

impl Sorting {
    /// Creates an empty sorting.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a sort key.
    #[must_use]
    pub fn by(mut self, path: impl Into<String>, order: SortOrder) -> Self {
        self.fields.push((path.into(), order));
        self
    }

    /// Returns true if there are no sort keys.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// Offset/limit window over a collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    /// Number of entities to skip.
    pub offset: usize,
    /// Maximum number of entities to return.
    pub limit: usize,
    /// Whether the caller wants the total record count.
    pub generate_total: bool,
}

impl Pagination {
    /// Default page size.
    pub const DEFAULT_LIMIT: usize = 500;

    /// Creates a page window.
    #[must_use]
    pub const fn new(offset: usize, limit: usize) -> Self {
        Self {
            offset,
            limit,
            generate_total: false,
        }
    }

    /// Requests the total record count.
    #[must_use]
    pub const fn with_total(mut self) -> Self {
        self.generate_total = true;
        self
    }
}

impl Default for Pagination {
    fn default() -> Self {
        Self::new(0, Self::DEFAULT_LIMIT)
    }
}

/// Filter, sorting and pagination requested for one collection load.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FilterScope {
    /// Filter to apply.
    pub filter: Option<FilterExpression>,
    /// Sort order to apply.
    pub sorting: Option<Sorting>,
    /// Page window to apply.
    pub pagination: Option<Pagination>,
}

impl FilterScope {
    /// Creates an empty scope.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the filter.
    #[must_use]
    pub fn with_filter(mut self, filter: impl Into<FilterExpression>) -> Self {
        self.filter = Some(filter.into());
        self
    }

    /// Sets the sorting.
    #[must_use]
    pub fn with_sorting(mut self, sorting: Sorting) -> Self {
        self.sorting = Some(sorting);
        self
    }

    /// Sets the pagination.
    #[must_use]
    pub fn with_pagination(mut self, pagination: Pagination) -> Self {
        self.pagination = Some(pagination);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn predicates_are_collected_left_to_right() {
        let expr = FilterExpression::from(Predicate::equals("a", json!(1)))
            .and(Predicate::equals("b", json!(2)).into())
            .or(FilterExpression::from(Predicate::new("c", Operator::IsNull, vec![])).negate());

        let paths: Vec<_> = expr.predicates().iter().map(|p| p.path.as_str()).collect();
        assert_eq!(paths, ["a", "b", "c"]);
    }

    #[test]
    fn default_pagination() {
        let page = Pagination::default();
        assert_eq!(page.offset, 0);
        assert_eq!(page.limit, Pagination::DEFAULT_LIMIT);
        assert!(!page.generate_total);
        assert!(Pagination::new(10, 5).with_total().generate_total);
    }

    #[test]
    fn scope_builder() {
        let scope = FilterScope::new()
            .with_filter(Predicate::equals("title", json!("Dune")))
            .with_sorting(Sorting::new().by("title", SortOrder::Desc))
            .with_pagination(Pagination::new(0, 10));

        assert!(scope.filter.is_some());
        assert_eq!(scope.sorting.as_ref().map(Sorting::is_empty), Some(false));
        assert_eq!(scope.pagination.map(|p| p.limit), Some(10));
    }
}
