use time::OffsetDateTime;
use tracing::{info, warn};
use uuid::Uuid;

use super::{
    repo::{Page, Repository},
    Resource,
};
use crate::{
    auth::repo_types::Account,
    config::OwnershipPolicy,
    error::{AppError, AppResult},
    state::AppState,
};

/// One caller's view of a resource collection. Every operation is confined
/// to records the caller owns, and created records are stamped with the
/// caller as owner.
pub struct OwnedCollection<'a, R: Resource> {
    repo: &'a dyn Repository<R>,
    owner: Uuid,
    policy: OwnershipPolicy,
}

impl<'a, R: Resource> OwnedCollection<'a, R> {
    pub fn new(state: &'a AppState, caller: &Account) -> Self {
        Self {
            repo: R::repository(state).as_ref(),
            owner: caller.id,
            policy: state.config.ownership,
        }
    }

    pub async fn list(&self, page: Page) -> AppResult<Vec<R>> {
        Ok(self.repo.list(self.owner, page).await?)
    }

    pub async fn get(&self, id: Uuid) -> AppResult<R> {
        let record = self.repo.find(id).await?.ok_or(AppError::NotFound)?;
        self.authorize(&record)?;
        Ok(record)
    }

    pub async fn create(&self, payload: R::Payload) -> AppResult<R> {
        let now = OffsetDateTime::now_utc();
        let mut record = R::blank(Uuid::new_v4(), self.owner, now);
        record.apply(payload, false, now)?;
        let record = self.repo.insert(&record).await?;
        info!(resource = R::NAME, id = %record.id(), owner = %self.owner, at = %record.ordered_at(), "created");
        Ok(record)
    }

    pub async fn update(&self, id: Uuid, payload: R::Payload, partial: bool) -> AppResult<R> {
        let mut record = self.get(id).await?;
        record.apply(payload, partial, OffsetDateTime::now_utc())?;
        let record = self
            .repo
            .update(&record)
            .await?
            .ok_or(AppError::NotFound)?;
        info!(resource = R::NAME, id = %id, owner = %self.owner, partial, "updated");
        Ok(record)
    }

    pub async fn delete(&self, id: Uuid) -> AppResult<()> {
        let record = self.get(id).await?;
        if !self.repo.delete(self.owner, record.id()).await? {
            return Err(AppError::NotFound);
        }
        info!(resource = R::NAME, id = %id, owner = %self.owner, "deleted");
        Ok(())
    }

    fn authorize(&self, record: &R) -> AppResult<()> {
        if record.owner_id() == self.owner {
            return Ok(());
        }
        warn!(resource = R::NAME, id = %record.id(), caller = %self.owner, "ownership check failed");
        Err(match self.policy {
            OwnershipPolicy::Conceal => AppError::NotFound,
            OwnershipPolicy::Forbid => AppError::Forbidden,
        })
    }
}
