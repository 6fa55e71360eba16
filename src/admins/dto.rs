use serde::{Deserialize, Serialize};

use super::repo_types::Admin;
use crate::error::{AppError, AppResult};
use crate::query::page::MAX_PAGE_SIZE;
use crate::query::{Column, Filter, ListQuery, PageRequest, Sort};

/// Query string of `GET /admin/admins`. Unknown keys are ignored.
#[derive(Debug, Default, Deserialize)]
pub struct AdminListQuery {
    pub page: Option<u32>,
    pub page_size: Option<u32>,
    pub id: Option<i64>,
    pub username: Option<String>,
    pub username_like: Option<String>,
    pub created_at_min: Option<i64>,
    pub created_at_max: Option<i64>,
    pub order_by: Option<String>,
    pub order: Option<String>,
}

impl AdminListQuery {
    pub fn into_list_query(self) -> AppResult<ListQuery> {
        if matches!(self.page_size, Some(size) if size > MAX_PAGE_SIZE) {
            return Err(AppError::bad_request("page_size must be at most 100"));
        }

        let filter = Filter::new()
            .eq_int(Column::Id, self.id)
            .eq_str(Column::Username, self.username.as_deref())
            .like(Column::Username, self.username_like.as_deref())
            .gte(Column::CreatedAt, self.created_at_min)
            .lte(Column::CreatedAt, self.created_at_max);
        let sort = Sort::resolve(self.order_by.as_deref(), self.order.as_deref(), Admin::SORTABLE);

        Ok(ListQuery::new(filter, sort, PageRequest::new(self.page, self.page_size)))
    }
}

#[derive(Debug, Serialize)]
pub struct AdminView {
    pub id: i64,
    pub username: String,
    pub created_at: i64,
    pub updated_at: i64,
}

impl From<Admin> for AdminView {
    fn from(a: Admin) -> Self {
        Self {
            id: a.id,
            username: a.username,
            created_at: a.created_at,
            updated_at: a.updated_at,
        }
    }
}
