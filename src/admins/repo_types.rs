use sqlx::FromRow;

use crate::query::{Column, Filterable, Value};

#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct Admin {
    pub id: i64,
    pub username: String,
    pub password_hash: String,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Admin {
    pub const TABLE: &'static str = "admins";
    pub const COLUMNS: &'static str = "id, username, password_hash, created_at, updated_at";
    pub const SORTABLE: &'static [Column] = &[
        Column::Id,
        Column::Username,
        Column::CreatedAt,
        Column::UpdatedAt,
    ];
}

impl Filterable for Admin {
    fn value(&self, column: Column) -> Value {
        match column {
            Column::Id => Value::Int(self.id),
            Column::Username => Value::Text(self.username.clone()),
            Column::CreatedAt => Value::Int(self.created_at),
            Column::UpdatedAt => Value::Int(self.updated_at),
            Column::Email | Column::EmailVerified | Column::Points => Value::Null,
        }
    }
}

#[derive(Debug, Clone)]
pub struct NewAdmin {
    pub username: String,
    pub password_hash: String,
}
