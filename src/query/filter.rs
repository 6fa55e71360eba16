//! Optional-predicate accumulator.
//!
//! Every builder method owns the presence check for its value type and adds
//! nothing when the caller left the filter out. Accumulated clauses are ANDed;
//! OR only ever appears inside a single parenthesized clause.

use sqlx::{Postgres, QueryBuilder};

use super::nullable;

/// Columns a predicate or an ordering may reference.
///
/// SQL text is only ever produced from these names, never from caller input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Column {
    Id,
    Username,
    Email,
    EmailVerified,
    Points,
    CreatedAt,
    UpdatedAt,
}

impl Column {
    pub const fn name(self) -> &'static str {
        match self {
            Column::Id => "id",
            Column::Username => "username",
            Column::Email => "email",
            Column::EmailVerified => "email_verified",
            Column::Points => "points",
            Column::CreatedAt => "created_at",
            Column::UpdatedAt => "updated_at",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "id" => Some(Column::Id),
            "username" => Some(Column::Username),
            "email" => Some(Column::Email),
            "email_verified" => Some(Column::EmailVerified),
            "points" => Some(Column::Points),
            "created_at" => Some(Column::CreatedAt),
            "updated_at" => Some(Column::UpdatedAt),
            _ => None,
        }
    }
}

/// A stored column value as seen by in-process evaluation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Text(String),
}

impl From<Option<i64>> for Value {
    fn from(v: Option<i64>) -> Self {
        v.map_or(Value::Null, Value::Int)
    }
}

/// Records that can be matched against clauses without a database.
pub trait Filterable {
    fn value(&self, column: Column) -> Value;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Clause {
    Eq(Column, Value),
    NotEq(Column, Value),
    /// Substring containment; the needle is matched literally.
    Like(Column, String),
    Gte(Column, i64),
    Lte(Column, i64),
    /// `(col IS NULL OR col = 0)`
    NullOrZero(Column),
    /// `(col IS NULL OR col >= n)`
    NullOrGte(Column, i64),
    /// `(col IS NULL OR col <= n)`
    NullOrLte(Column, i64),
    Or(Vec<Clause>),
}

impl Clause {
    pub fn push_sql(&self, qb: &mut QueryBuilder<'_, Postgres>) {
        match self {
            Clause::Eq(column, value) => push_comparison(qb, *column, "=", value),
            Clause::NotEq(column, value) => push_comparison(qb, *column, "<>", value),
            Clause::Like(column, needle) => {
                qb.push(column.name())
                    .push(" LIKE ")
                    .push_bind(like_pattern(needle));
            }
            Clause::Gte(column, n) => {
                qb.push(column.name()).push(" >= ").push_bind(*n);
            }
            Clause::Lte(column, n) => {
                qb.push(column.name()).push(" <= ").push_bind(*n);
            }
            Clause::NullOrZero(column) => {
                let name = column.name();
                qb.push("(")
                    .push(name)
                    .push(" IS NULL OR ")
                    .push(name)
                    .push(" = 0)");
            }
            Clause::NullOrGte(column, n) => {
                let name = column.name();
                qb.push("(")
                    .push(name)
                    .push(" IS NULL OR ")
                    .push(name)
                    .push(" >= ")
                    .push_bind(*n)
                    .push(")");
            }
            Clause::NullOrLte(column, n) => {
                let name = column.name();
                qb.push("(")
                    .push(name)
                    .push(" IS NULL OR ")
                    .push(name)
                    .push(" <= ")
                    .push_bind(*n)
                    .push(")");
            }
            Clause::Or(parts) if parts.is_empty() => {
                qb.push("FALSE");
            }
            Clause::Or(parts) => {
                qb.push("(");
                for (i, part) in parts.iter().enumerate() {
                    if i > 0 {
                        qb.push(" OR ");
                    }
                    part.push_sql(qb);
                }
                qb.push(")");
            }
        }
    }

    /// Evaluates the clause the way Postgres would, NULL comparisons included.
    pub fn matches<R: Filterable + ?Sized>(&self, row: &R) -> bool {
        match self {
            Clause::Eq(column, expected) => row.value(*column) == *expected,
            Clause::NotEq(column, expected) => match (row.value(*column), expected) {
                (Value::Null, Value::Null) => false,
                (actual, Value::Null) => actual != Value::Null,
                (Value::Null, _) => false,
                (actual, expected) => actual != *expected,
            },
            Clause::Like(column, needle) => {
                matches!(row.value(*column), Value::Text(text) if text.contains(needle.as_str()))
            }
            Clause::Gte(column, n) => matches!(row.value(*column), Value::Int(v) if v >= *n),
            Clause::Lte(column, n) => matches!(row.value(*column), Value::Int(v) if v <= *n),
            Clause::NullOrZero(column) => {
                matches!(row.value(*column), Value::Null | Value::Int(0))
            }
            Clause::NullOrGte(column, n) => match row.value(*column) {
                Value::Null => true,
                Value::Int(v) => v >= *n,
                _ => false,
            },
            Clause::NullOrLte(column, n) => match row.value(*column) {
                Value::Null => true,
                Value::Int(v) => v <= *n,
                _ => false,
            },
            Clause::Or(parts) => parts.iter().any(|part| part.matches(row)),
        }
    }
}

fn push_comparison(qb: &mut QueryBuilder<'_, Postgres>, column: Column, op: &str, value: &Value) {
    qb.push(column.name());
    match value {
        Value::Null if op == "=" => {
            qb.push(" IS NULL");
        }
        Value::Null => {
            qb.push(" IS NOT NULL");
        }
        Value::Bool(b) => {
            qb.push(" ").push(op).push(" ").push_bind(*b);
        }
        Value::Int(n) => {
            qb.push(" ").push(op).push(" ").push_bind(*n);
        }
        Value::Text(s) => {
            qb.push(" ").push(op).push(" ").push_bind(s.clone());
        }
    }
}

/// `%needle%` with LIKE metacharacters in the needle escaped.
pub fn like_pattern(needle: &str) -> String {
    let mut pattern = String::with_capacity(needle.len() + 2);
    pattern.push('%');
    for ch in needle.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(ch);
    }
    pattern.push('%');
    pattern
}

/// Ordered conjunction of clauses, built per request and never reused.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Filter {
    clauses: Vec<Clause>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Exact string match. `None` and `""` both mean "not filtered".
    pub fn eq_str(mut self, column: Column, value: Option<&str>) -> Self {
        if let Some(v) = value.filter(|v| !v.is_empty()) {
            self.clauses
                .push(Clause::Eq(column, Value::Text(v.to_string())));
        }
        self
    }

    /// Exact integer match. Zero is a real value, only `None` is skipped.
    pub fn eq_int(mut self, column: Column, value: Option<i64>) -> Self {
        if let Some(v) = value {
            self.clauses.push(Clause::Eq(column, Value::Int(v)));
        }
        self
    }

    /// Tri-state boolean match.
    pub fn eq_bool(mut self, column: Column, value: Option<bool>) -> Self {
        if let Some(v) = value {
            self.clauses.push(Clause::Eq(column, Value::Bool(v)));
        }
        self
    }

    pub fn not_eq_int(mut self, column: Column, value: Option<i64>) -> Self {
        if let Some(v) = value {
            self.clauses.push(Clause::NotEq(column, Value::Int(v)));
        }
        self
    }

    /// Substring match; the store's collation decides case sensitivity.
    pub fn like(mut self, column: Column, value: Option<&str>) -> Self {
        if let Some(v) = value.filter(|v| !v.is_empty()) {
            self.clauses.push(Clause::Like(column, v.to_string()));
        }
        self
    }

    /// Inclusive lower bound.
    pub fn gte(mut self, column: Column, value: Option<i64>) -> Self {
        if let Some(v) = value {
            self.clauses.push(Clause::Gte(column, v));
        }
        self
    }

    /// Inclusive upper bound.
    pub fn lte(mut self, column: Column, value: Option<i64>) -> Self {
        if let Some(v) = value {
            self.clauses.push(Clause::Lte(column, v));
        }
        self
    }

    /// Range over a column whose NULL means zero. See [`nullable::bounds`].
    pub fn null_as_zero_range(mut self, column: Column, min: Option<i64>, max: Option<i64>) -> Self {
        self.clauses.extend(nullable::bounds(column, min, max));
        self
    }

    /// Appends a clause built at the call site, e.g. an OR group.
    pub fn with(mut self, clause: Clause) -> Self {
        self.clauses.push(clause);
        self
    }

    #[cfg(test)]
    pub fn clauses(&self) -> &[Clause] {
        &self.clauses
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }

    /// Appends ` WHERE a AND b ...`, or nothing for an empty filter.
    pub fn push_where(&self, qb: &mut QueryBuilder<'_, Postgres>) {
        for (i, clause) in self.clauses.iter().enumerate() {
            qb.push(if i == 0 { " WHERE " } else { " AND " });
            clause.push_sql(qb);
        }
    }

    pub fn matches<R: Filterable + ?Sized>(&self, row: &R) -> bool {
        self.clauses.iter().all(|clause| clause.matches(row))
    }
}
