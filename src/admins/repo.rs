use axum::async_trait;
use sqlx::{PgPool, Postgres, QueryBuilder};

use super::repo_types::{Admin, NewAdmin};
use crate::db::{map_write_error, unix_now};
use crate::query::{Filter, ListQuery};

#[async_trait]
pub trait AdminStore: Send + Sync {
    async fn list(&self, query: &ListQuery) -> anyhow::Result<(Vec<Admin>, i64)>;
    async fn find_one(&self, filter: &Filter) -> anyhow::Result<Option<Admin>>;
    async fn insert(&self, admin: NewAdmin) -> anyhow::Result<Admin>;
}

#[derive(Clone)]
pub struct PgAdminStore {
    db: PgPool,
}

impl PgAdminStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl AdminStore for PgAdminStore {
    async fn list(&self, query: &ListQuery) -> anyhow::Result<(Vec<Admin>, i64)> {
        query.fetch(&self.db, Admin::TABLE, Admin::COLUMNS).await
    }

    async fn find_one(&self, filter: &Filter) -> anyhow::Result<Option<Admin>> {
        let mut qb = QueryBuilder::<Postgres>::new(format!(
            "SELECT {} FROM {}",
            Admin::COLUMNS,
            Admin::TABLE
        ));
        filter.push_where(&mut qb);
        qb.push(" ORDER BY id ASC LIMIT 1");
        let admin = qb.build_query_as::<Admin>().fetch_optional(&self.db).await?;
        Ok(admin)
    }

    async fn insert(&self, admin: NewAdmin) -> anyhow::Result<Admin> {
        sqlx::query_as::<_, Admin>(
            r#"
            INSERT INTO admins (username, password_hash, created_at, updated_at)
            VALUES ($1, $2, $3, $3)
            RETURNING id, username, password_hash, created_at, updated_at
            "#,
        )
        .bind(admin.username)
        .bind(admin.password_hash)
        .bind(unix_now())
        .fetch_one(&self.db)
        .await
        .map_err(|e| map_write_error(e, "insert admin"))
    }
}

#[cfg(test)]
pub use memory::MemoryAdminStore;
