//! Owner-scoped CRUD shared by metrics, meals and goals.
//!
//! A resource type describes its table and how a payload is applied to a
//! record; persistence ([`repo`]), the ownership filter ([`ownership`]) and the
//! HTTP mapping ([`handlers`]) are written once against [`Resource`].

use std::sync::Arc;

use serde::{de::DeserializeOwned, Serialize};
use sqlx::{
    postgres::{PgArguments, PgRow},
    query::QueryAs,
    FromRow, Postgres,
};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{error::FieldErrors, state::AppState};

pub mod fields;
pub mod handlers;
pub mod ownership;
pub mod repo;

use repo::Repository;

pub type PgQueryAs<'q, R> = QueryAs<'q, Postgres, R, PgArguments>;

pub trait Resource:
    Serialize + Clone + Send + Sync + Unpin + for<'r> FromRow<'r, PgRow> + 'static
{
    /// Create/update body. Unknown keys such as `user` are ignored.
    type Payload: DeserializeOwned + Send + 'static;

    /// Singular name for logs.
    const NAME: &'static str;
    /// URL segment, e.g. `meals`.
    const PATH: &'static str;
    const TABLE: &'static str;
    /// Columns besides `id` and `user_id`, in the order [`Resource::bind_columns`] binds them.
    const COLUMNS: &'static [&'static str];
    /// Timestamp column lists are sorted on, newest first.
    const ORDER_BY: &'static str;

    fn id(&self) -> Uuid;
    fn owner_id(&self) -> Uuid;

    /// A record with every field at its default, owned by `owner`.
    fn blank(id: Uuid, owner: Uuid, now: OffsetDateTime) -> Self;

    /// Validates `payload` and writes it into `self`. With `partial` unset,
    /// every required field must be present.
    fn apply(&mut self, payload: Self::Payload, partial: bool, now: OffsetDateTime) -> Result<(), FieldErrors>;

    fn bind_columns<'q>(&self, query: PgQueryAs<'q, Self>) -> PgQueryAs<'q, Self>;

    fn repository(state: &AppState) -> &Arc<dyn Repository<Self>>;

    /// Value of the [`Resource::ORDER_BY`] column.
    fn ordered_at(&self) -> OffsetDateTime;
}
