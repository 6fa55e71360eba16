use sqlx::{postgres::PgRow, FromRow, PgPool, Postgres, QueryBuilder};

use super::filter::{Filter, Filterable};
use super::page::PageRequest;
use super::sort::Sort;

/// One filtered, sorted, paginated listing.
///
/// Rows without an explicit sort come back in id order, which is insertion
/// order for both account tables. An explicit sort breaks ties on id as well.
#[derive(Debug, Clone, Default)]
pub struct ListQuery {
    pub filter: Filter,
    pub sort: Option<Sort>,
    pub page: PageRequest,
}

impl ListQuery {
    pub fn new(filter: Filter, sort: Option<Sort>, page: PageRequest) -> Self {
        Self { filter, sort, page }
    }

    pub fn select_sql(&self, table: &str, columns: &str) -> QueryBuilder<'static, Postgres> {
        let mut qb = QueryBuilder::new(format!("SELECT {columns} FROM {table}"));
        self.filter.push_where(&mut qb);
        match &self.sort {
            Some(sort) => {
                sort.push_order_by(&mut qb);
                qb.push(", id ASC");
            }
            None => {
                qb.push(" ORDER BY id ASC");
            }
        }
        qb.push(" LIMIT ")
            .push_bind(self.page.limit())
            .push(" OFFSET ")
            .push_bind(self.page.offset());
        qb
    }

    pub fn count_sql(&self, table: &str) -> QueryBuilder<'static, Postgres> {
        let mut qb = QueryBuilder::new(format!("SELECT COUNT(*) FROM {table}"));
        self.filter.push_where(&mut qb);
        qb
    }

    /// Runs the count and the bounded fetch; returns `(page, total)`.
    pub async fn fetch<R>(&self, db: &PgPool, table: &str, columns: &str) -> anyhow::Result<(Vec<R>, i64)>
    where
        R: for<'r> FromRow<'r, PgRow> + Send + Unpin,
    {
        let mut count = self.count_sql(table);
        let (total,) = count.build_query_as::<(i64,)>().fetch_one(db).await?;

        let mut select = self.select_sql(table, columns);
        let rows = select.build_query_as::<R>().fetch_all(db).await?;

        Ok((rows, total))
    }

    /// Same semantics as [`ListQuery::fetch`] over rows held in id order.
    pub fn evaluate<R: Filterable + Clone>(&self, rows: &[R]) -> (Vec<R>, i64) {
        let mut matched: Vec<R> = rows
            .iter()
            .filter(|row| self.filter.matches(*row))
            .cloned()
            .collect();
        if let Some(sort) = &self.sort {
            matched.sort_by(|a, b| sort.compare(a, b));
        }
        let total = matched.len() as i64;
        let page = matched
            .into_iter()
            .skip(self.page.offset() as usize)
            .take(self.page.limit() as usize)
            .collect();
        (page, total)
    }
}
