use axum::async_trait;
use sqlx::{PgPool, Postgres, QueryBuilder};

use super::repo_types::{NewUser, User, UserChanges};
use crate::db::{map_write_error, unix_now};
use crate::query::{Filter, ListQuery};

#[async_trait]
pub trait UserStore: Send + Sync {
    /// One page of matching users and the total match count.
    async fn list(&self, query: &ListQuery) -> anyhow::Result<(Vec<User>, i64)>;
    /// First match in id order.
    async fn find_one(&self, filter: &Filter) -> anyhow::Result<Option<User>>;
    /// Fails with [`crate::db::UniqueViolation`] on a taken username or email.
    async fn insert(&self, user: NewUser) -> anyhow::Result<User>;
    async fn update(&self, id: i64, changes: UserChanges) -> anyhow::Result<Option<User>>;
    async fn delete(&self, id: i64) -> anyhow::Result<bool>;
    /// Takes one point if the balance allows it; returns the new balance.
    async fn deduct_point(&self, id: i64) -> anyhow::Result<Option<i64>>;
}

/// Check and decrement happen in one statement, so concurrent calls cannot
/// both pass on a balance of 1. NULL >= 1 is never true.
const DEDUCT_POINT_SQL: &str = r#"
UPDATE users
SET points = points - 1, updated_at = $2
WHERE id = $1 AND points >= 1
RETURNING points
"#;

#[derive(Clone)]
pub struct PgUserStore {
    db: PgPool,
}

impl PgUserStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn list(&self, query: &ListQuery) -> anyhow::Result<(Vec<User>, i64)> {
        query.fetch(&self.db, User::TABLE, User::COLUMNS).await
    }

    async fn find_one(&self, filter: &Filter) -> anyhow::Result<Option<User>> {
        let mut qb = QueryBuilder::<Postgres>::new(format!(
            "SELECT {} FROM {}",
            User::COLUMNS,
            User::TABLE
        ));
        filter.push_where(&mut qb);
        qb.push(" ORDER BY id ASC LIMIT 1");
        let user = qb.build_query_as::<User>().fetch_optional(&self.db).await?;
        Ok(user)
    }

    async fn insert(&self, user: NewUser) -> anyhow::Result<User> {
        let now = unix_now();
        sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (username, email, password_hash, email_verified, points, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $6)
            RETURNING id, username, email, password_hash, email_verified, points, created_at, updated_at
            "#,
        )
        .bind(user.username)
        .bind(user.email)
        .bind(user.password_hash)
        .bind(user.email_verified)
        .bind(user.points)
        .bind(now)
        .fetch_one(&self.db)
        .await
        .map_err(|e| map_write_error(e, "insert user"))
    }

    async fn update(&self, id: i64, changes: UserChanges) -> anyhow::Result<Option<User>> {
        let mut qb = QueryBuilder::<Postgres>::new("UPDATE users SET ");
        {
            let mut set = qb.separated(", ");
            if let Some(username) = changes.username {
                set.push("username = ").push_bind_unseparated(username);
            }
            if let Some(email) = changes.email {
                set.push("email = ").push_bind_unseparated(email);
            }
            if let Some(hash) = changes.password_hash {
                set.push("password_hash = ").push_bind_unseparated(hash);
            }
            if let Some(verified) = changes.email_verified {
                set.push("email_verified = ").push_bind_unseparated(verified);
            }
            if let Some(points) = changes.points {
                set.push("points = ").push_bind_unseparated(points);
            }
            set.push("updated_at = ").push_bind_unseparated(unix_now());
        }
        qb.push(" WHERE id = ")
            .push_bind(id)
            .push(" RETURNING ")
            .push(User::COLUMNS);

        qb.build_query_as::<User>()
            .fetch_optional(&self.db)
            .await
            .map_err(|e| map_write_error(e, "update user"))
    }

    async fn delete(&self, id: i64) -> anyhow::Result<bool> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&self.db)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn deduct_point(&self, id: i64) -> anyhow::Result<Option<i64>> {
        let remaining = sqlx::query_scalar::<_, i64>(DEDUCT_POINT_SQL)
            .bind(id)
            .bind(unix_now())
            .fetch_optional(&self.db)
            .await?;
        Ok(remaining)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deduction_is_a_single_conditional_update() {
        let sql = DEDUCT_POINT_SQL.split_whitespace().collect::<Vec<_>>().join(" ");
        assert!(sql.starts_with("UPDATE users SET points = points - 1"));
        assert!(sql.contains("WHERE id = $1 AND points >= 1"));
        assert!(sql.ends_with("RETURNING points"));
        assert_eq!(sql.matches(';').count(), 0);
        assert!(!sql.contains("SELECT"));
    }
}
