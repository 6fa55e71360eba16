//! Dynamic listing: optional predicates, allow-listed sort, page window.

pub mod filter;
pub mod list;
pub mod nullable;
pub mod page;
pub mod sort;

pub use filter::{Clause, Column, Filter, Filterable, Value};
pub use list::ListQuery;
pub use page::{page_count, PageRequest};
pub use sort::Sort;
