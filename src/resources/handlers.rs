use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection, QueryRejection},
        Path, Query, State,
    },
    http::{header, HeaderName, StatusCode},
    routing::get,
    Json, Router,
};
use serde::Serialize;
use tracing::instrument;
use uuid::Uuid;

use super::{ownership::OwnedCollection, repo::Page, Resource};
use crate::{
    auth::{extractors::AuthUser, repo_types::Account},
    error::AppResult,
    state::AppState,
};

/// A record as sent to its owner: its own fields plus the owner's username.
#[derive(Debug, Serialize)]
pub struct ResourceView<R> {
    #[serde(flatten)]
    pub record: R,
    pub user: String,
}

impl<R> ResourceView<R> {
    fn owned_by(record: R, owner: &Account) -> Self {
        Self {
            record,
            user: owner.username.clone(),
        }
    }
}

type Created<R> = (StatusCode, [(HeaderName, String); 1], Json<ResourceView<R>>);

pub fn router<R: Resource>() -> Router<AppState> {
    Router::new()
        .route(&format!("/{}", R::PATH), get(list::<R>).post(create::<R>))
        .route(
            &format!("/{}/:id", R::PATH),
            get(retrieve::<R>)
                .put(replace::<R>)
                .patch(modify::<R>)
                .delete(destroy::<R>),
        )
}

#[instrument(skip_all, fields(resource = R::NAME))]
async fn list<R: Resource>(
    State(state): State<AppState>,
    AuthUser(account): AuthUser,
    page: Result<Query<Page>, QueryRejection>,
) -> AppResult<Json<Vec<ResourceView<R>>>> {
    let Query(page) = page?;
    let records = OwnedCollection::<R>::new(&state, &account).list(page).await?;
    Ok(Json(
        records
            .into_iter()
            .map(|r| ResourceView::owned_by(r, &account))
            .collect(),
    ))
}

#[instrument(skip_all, fields(resource = R::NAME))]
async fn create<R: Resource>(
    State(state): State<AppState>,
    AuthUser(account): AuthUser,
    payload: Result<Json<R::Payload>, JsonRejection>,
) -> AppResult<Created<R>> {
    let Json(payload) = payload?;
    let record = OwnedCollection::<R>::new(&state, &account)
        .create(payload)
        .await?;
    let location = format!("/{}/{}", R::PATH, record.id());
    Ok((
        StatusCode::CREATED,
        [(header::LOCATION, location)],
        Json(ResourceView::owned_by(record, &account)),
    ))
}

#[instrument(skip_all, fields(resource = R::NAME))]
async fn retrieve<R: Resource>(
    State(state): State<AppState>,
    AuthUser(account): AuthUser,
    id: Result<Path<Uuid>, PathRejection>,
) -> AppResult<Json<ResourceView<R>>> {
    let Path(id) = id?;
    let record = OwnedCollection::<R>::new(&state, &account).get(id).await?;
    Ok(Json(ResourceView::owned_by(record, &account)))
}

#[instrument(skip_all, fields(resource = R::NAME))]
async fn replace<R: Resource>(
    State(state): State<AppState>,
    AuthUser(account): AuthUser,
    id: Result<Path<Uuid>, PathRejection>,
    payload: Result<Json<R::Payload>, JsonRejection>,
) -> AppResult<Json<ResourceView<R>>> {
    update::<R>(state, account, id, payload, false).await
}

#[instrument(skip_all, fields(resource = R::NAME))]
async fn modify<R: Resource>(
    State(state): State<AppState>,
    AuthUser(account): AuthUser,
    id: Result<Path<Uuid>, PathRejection>,
    payload: Result<Json<R::Payload>, JsonRejection>,
) -> AppResult<Json<ResourceView<R>>> {
    update::<R>(state, account, id, payload, true).await
}

async fn update<R: Resource>(
    state: AppState,
    account: Account,
    id: Result<Path<Uuid>, PathRejection>,
    payload: Result<Json<R::Payload>, JsonRejection>,
    partial: bool,
) -> AppResult<Json<ResourceView<R>>> {
    let Path(id) = id?;
    let Json(payload) = payload?;
    let record = OwnedCollection::<R>::new(&state, &account)
        .update(id, payload, partial)
        .await?;
    Ok(Json(ResourceView::owned_by(record, &account)))
}

#[instrument(skip_all, fields(resource = R::NAME))]
async fn destroy<R: Resource>(
    State(state): State<AppState>,
    AuthUser(account): AuthUser,
    id: Result<Path<Uuid>, PathRejection>,
) -> AppResult<StatusCode> {
    let Path(id) = id?;
    OwnedCollection::<R>::new(&state, &account).delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
