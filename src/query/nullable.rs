//! Range bounds over a column where a stored NULL means zero.
//!
//! The store cannot order NULL against a number, so each bound is rewritten
//! into a clause that places NULL on the side zero would land on. Each
//! NULL-admitting fragment is its own parenthesized group, so a min and a max
//! can be ANDed safely.

use super::filter::{Clause, Column};

pub fn bounds(column: Column, min: Option<i64>, max: Option<i64>) -> Vec<Clause> {
    let mut clauses = Vec::with_capacity(2);
    if let Some(min) = min {
        clauses.push(lower(column, min));
    }
    if let Some(max) = max {
        clauses.push(upper(column, max));
    }
    clauses
}

fn lower(column: Column, min: i64) -> Clause {
    match min {
        // Collapses to "nothing assigned", not a true `>= 0` range.
        0 => Clause::NullOrZero(column),
        n if n > 0 => Clause::Gte(column, n),
        n => Clause::NullOrGte(column, n),
    }
}

fn upper(column: Column, max: i64) -> Clause {
    match max {
        0 => Clause::NullOrZero(column),
        n if n > 0 => Clause::NullOrLte(column, n),
        n => Clause::Lte(column, n),
    }
}
