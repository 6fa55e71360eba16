use std::cmp::Ordering;

use sqlx::{Postgres, QueryBuilder};

use super::filter::{Column, Filterable, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Asc,
    Desc,
}

impl Direction {
    /// Only a case-insensitive "asc" sorts ascending; anything else is descending.
    pub fn parse(token: Option<&str>) -> Self {
        match token {
            Some(t) if t.eq_ignore_ascii_case("asc") => Direction::Asc,
            _ => Direction::Desc,
        }
    }

    pub const fn keyword(self) -> &'static str {
        match self {
            Direction::Asc => "ASC",
            Direction::Desc => "DESC",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sort {
    pub column: Column,
    pub direction: Direction,
}

impl Sort {
    /// Resolves a caller-supplied field against an allow-list.
    ///
    /// Unknown fields yield `None` and the store's default order applies.
    pub fn resolve(field: Option<&str>, direction: Option<&str>, allowed: &[Column]) -> Option<Self> {
        let column = Column::from_name(field?)?;
        if !allowed.contains(&column) {
            return None;
        }
        Some(Self {
            column,
            direction: Direction::parse(direction),
        })
    }

    pub fn push_order_by(&self, qb: &mut QueryBuilder<'_, Postgres>) {
        qb.push(" ORDER BY ")
            .push(self.column.name())
            .push(" ")
            .push(self.direction.keyword());
    }

    /// Postgres ordering: NULL sorts after every value ascending.
    pub fn compare<R: Filterable + ?Sized>(&self, a: &R, b: &R) -> Ordering {
        let ordering = compare_values(&a.value(self.column), &b.value(self.column));
        match self.direction {
            Direction::Asc => ordering,
            Direction::Desc => ordering.reverse(),
        }
    }
}

fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Null, Value::Null) => Ordering::Equal,
        (Value::Null, _) => Ordering::Greater,
        (_, Value::Null) => Ordering::Less,
        (Value::Int(x), Value::Int(y)) => x.cmp(y),
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::Text(x), Value::Text(y)) => x.cmp(y),
        _ => Ordering::Equal,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALLOWED: &[Column] = &[Column::Id, Column::Username, Column::Points];

    #[test]
    fn unknown_or_disallowed_fields_are_skipped() {
        assert_eq!(Sort::resolve(Some("hacked; DROP TABLE"), Some("asc"), ALLOWED), None);
        assert_eq!(Sort::resolve(Some("email"), Some("asc"), ALLOWED), None);
        assert_eq!(Sort::resolve(None, Some("asc"), ALLOWED), None);
        assert_eq!(Sort::resolve(Some(""), None, ALLOWED), None);
    }

    #[test]
    fn direction_defaults_to_descending() {
        let asc = Sort::resolve(Some("points"), Some("ASC"), ALLOWED).unwrap();
        assert_eq!(asc.direction, Direction::Asc);

        for token in [None, Some(""), Some("xyz"), Some("ascending")] {
            let sort = Sort::resolve(Some("points"), token, ALLOWED).unwrap();
            assert_eq!(sort.direction, Direction::Desc);
        }
    }

    #[test]
    fn renders_order_by_from_column_name() {
        let sort = Sort::resolve(Some("username"), Some("asc"), ALLOWED).unwrap();
        let mut qb = QueryBuilder::<Postgres>::new("SELECT id FROM users");
        sort.push_order_by(&mut qb);
        assert_eq!(qb.sql(), "SELECT id FROM users ORDER BY username ASC");
    }

    #[test]
    fn nulls_sort_last_ascending_and_first_descending() {
        struct P(Option<i64>);
        impl Filterable for P {
            fn value(&self, _: Column) -> Value {
                self.0.into()
            }
        }

        let mut rows = vec![P(Some(2)), P(None), P(Some(1))];
        let asc = Sort::resolve(Some("points"), Some("asc"), ALLOWED).unwrap();
        rows.sort_by(|a, b| asc.compare(a, b));
        assert_eq!(rows.iter().map(|p| p.0).collect::<Vec<_>>(), vec![Some(1), Some(2), None]);

        let desc = Sort::resolve(Some("points"), None, ALLOWED).unwrap();
        rows.sort_by(|a, b| desc.compare(a, b));
        assert_eq!(rows.iter().map(|p| p.0).collect::<Vec<_>>(), vec![None, Some(2), Some(1)]);
    }
}
