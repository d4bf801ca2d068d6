use std::marker::PhantomData;

use anyhow::Context;
use async_trait::async_trait;
use serde::Deserialize;
use sqlx::PgPool;
use uuid::Uuid;

use super::Resource;

#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct Page {
    pub limit: Option<i64>,
    #[serde(default)]
    pub offset: i64,
}

impl Page {
    /// Negative values clamp to zero.
    pub fn clamped(self) -> Self {
        Self {
            limit: self.limit.map(|l| l.max(0)),
            offset: self.offset.max(0),
        }
    }
}

/// Persistence for one resource type. Only `list` is owner-scoped here;
/// detail access goes through [`super::ownership::OwnedCollection`].
#[async_trait]
pub trait Repository<R: Resource>: Send + Sync {
    async fn list(&self, owner: Uuid, page: Page) -> anyhow::Result<Vec<R>>;
    async fn find(&self, id: Uuid) -> anyhow::Result<Option<R>>;
    async fn insert(&self, record: &R) -> anyhow::Result<R>;
    /// `None` when no row with this id and owner exists any more.
    async fn update(&self, record: &R) -> anyhow::Result<Option<R>>;
    async fn delete(&self, owner: Uuid, id: Uuid) -> anyhow::Result<bool>;
}

pub struct PgRepository<R> {
    db: PgPool,
    _marker: PhantomData<fn() -> R>,
}

impl<R> PgRepository<R> {
    pub fn new(db: PgPool) -> Self {
        Self {
            db,
            _marker: PhantomData,
        }
    }
}

fn select_columns<R: Resource>() -> String {
    let mut cols = vec!["id", "user_id"];
    cols.extend_from_slice(R::COLUMNS);
    cols.join(", ")
}

#[async_trait]
impl<R: Resource> Repository<R> for PgRepository<R> {
    async fn list(&self, owner: Uuid, page: Page) -> anyhow::Result<Vec<R>> {
        let page = page.clamped();
        let sql = format!(
            "SELECT {} FROM {} WHERE user_id = $1 ORDER BY {} DESC, id DESC LIMIT $2 OFFSET $3",
            select_columns::<R>(),
            R::TABLE,
            R::ORDER_BY,
        );
        let rows = sqlx::query_as::<_, R>(&sql)
            .bind(owner)
            .bind(page.limit)
            .bind(page.offset)
            .fetch_all(&self.db)
            .await
            .with_context(|| format!("list {}", R::TABLE))?;
        Ok(rows)
    }

    async fn find(&self, id: Uuid) -> anyhow::Result<Option<R>> {
        let sql = format!(
            "SELECT {} FROM {} WHERE id = $1",
            select_columns::<R>(),
            R::TABLE
        );
        let row = sqlx::query_as::<_, R>(&sql)
            .bind(id)
            .fetch_optional(&self.db)
            .await
            .with_context(|| format!("find {}", R::NAME))?;
        Ok(row)
    }

    async fn insert(&self, record: &R) -> anyhow::Result<R> {
        let placeholders: Vec<String> = (1..=R::COLUMNS.len() + 2).map(|i| format!("${i}")).collect();
        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({}) RETURNING {}",
            R::TABLE,
            select_columns::<R>(),
            placeholders.join(", "),
            select_columns::<R>(),
        );
        let query = sqlx::query_as::<_, R>(&sql)
            .bind(record.id())
            .bind(record.owner_id());
        let row = record
            .bind_columns(query)
            .fetch_one(&self.db)
            .await
            .with_context(|| format!("insert {}", R::NAME))?;
        Ok(row)
    }

    async fn update(&self, record: &R) -> anyhow::Result<Option<R>> {
        let n = R::COLUMNS.len();
        let assignments: Vec<String> = R::COLUMNS
            .iter()
            .enumerate()
            .map(|(i, col)| format!("{col} = ${}", i + 1))
            .collect();
        let sql = format!(
            "UPDATE {} SET {} WHERE id = ${} AND user_id = ${} RETURNING {}",
            R::TABLE,
            assignments.join(", "),
            n + 1,
            n + 2,
            select_columns::<R>(),
        );
        let query = record.bind_columns(sqlx::query_as::<_, R>(&sql));
        let row = query
            .bind(record.id())
            .bind(record.owner_id())
            .fetch_optional(&self.db)
            .await
            .with_context(|| format!("update {}", R::NAME))?;
        Ok(row)
    }

    async fn delete(&self, owner: Uuid, id: Uuid) -> anyhow::Result<bool> {
        let sql = format!("DELETE FROM {} WHERE id = $1 AND user_id = $2", R::TABLE);
        let result = sqlx::query(&sql)
            .bind(id)
            .bind(owner)
            .execute(&self.db)
            .await
            .with_context(|| format!("delete {}", R::NAME))?;
        Ok(result.rows_affected() > 0)
    }
}
