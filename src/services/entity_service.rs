use std::fmt::Debug;

use futures::TryStreamExt;
use serde::Serialize;

use crate::db::DatabaseRef;
use crate::error::RepoError;
use crate::executor::Executor;
use crate::infrastructure::generic_repository::GenericRepository;
use crate::mapping::{Entity, HasRelation, Validatable};
use crate::query::{EntityStream, Pageable};
use crate::repository::{Crud, EagerRepository, QueryExecutor};
use crate::services::merge::Merge;

/// One page of results plus the total row count.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: i64,
    pub page: u64,
    pub size: u64,
}

impl<T> Page<T> {
    pub fn total_pages(&self) -> u64 {
        if self.size == 0 {
            return 0;
        }
        let total = u64::try_from(self.total).unwrap_or(0);
        total.div_ceil(self.size)
    }
}

/// Service layer over a [`GenericRepository`].
///
/// Each call is one unit of async work; ordering between the statements of a
/// call is fixed (fetch before overlay, overlay before persist).
pub struct EntityService<T, E = DatabaseRef>
where
    T: Entity + Validatable,
    E: Executor,
{
    repo: GenericRepository<T, E>,
}

impl<T, E> EntityService<T, E>
where
    T: Entity + Validatable + Debug,
    E: Executor,
{
    pub fn new(repo: GenericRepository<T, E>) -> Self {
        Self { repo }
    }

    pub fn repository(&self) -> &GenericRepository<T, E> {
        &self.repo
    }

    pub async fn save(&self, entity: T) -> Result<T, RepoError> {
        tracing::debug!(?entity, "Request to save {}", T::table().name);
        self.repo.save(entity).await
    }

    /// Full update. The id must already exist.
    pub async fn update(&self, entity: T) -> Result<T, RepoError> {
        tracing::debug!(?entity, "Request to update {}", T::table().name);
        if entity.id().is_none() {
            return Err(RepoError::ConstraintViolation(format!(
                "update of {} requires an id",
                T::table().name
            )));
        }
        self.repo.save(entity).await
    }

    pub async fn find_all(&self, pageable: Option<&Pageable>) -> Result<EntityStream<T>, RepoError> {
        tracing::debug!(?pageable, "Request to get all {}", T::table().name);
        self.repo.find_all(pageable).await
    }

    /// Count and page contents, as needed for pagination metadata.
    pub async fn find_page(&self, pageable: &Pageable) -> Result<Page<T>, RepoError> {
        let total = self.count_all().await?;
        let items = self.find_all(Some(pageable)).await?.try_collect().await?;
        Ok(Page {
            items,
            total,
            page: pageable.page,
            size: pageable.size,
        })
    }

    pub async fn count_all(&self) -> Result<i64, RepoError> {
        self.repo.count().await
    }

    pub async fn find_one(&self, id: i64) -> Result<Option<T>, RepoError> {
        tracing::debug!(id, "Request to get {}", T::table().name);
        self.repo.find_by_id(id).await
    }

    pub async fn delete(&self, id: i64) -> Result<(), RepoError> {
        tracing::debug!(id, "Request to delete {}", T::table().name);
        self.repo.delete_by_id(id).await
    }
}

impl<T, E> EntityService<T, E>
where
    T: Merge + Validatable + Debug,
    T::Patch: Debug,
    E: Executor,
{
    /// Merge-patch update: fetch, overlay the present fields, persist.
    pub async fn partial_update(&self, patch: T::Patch) -> Result<T, RepoError> {
        tracing::debug!(?patch, "Request to partially update {}", T::table().name);
        let id = T::patch_id(&patch).ok_or_else(|| {
            RepoError::ConstraintViolation(format!(
                "partial update of {} requires an id",
                T::table().name
            ))
        })?;
        let mut existing = self
            .repo
            .find_by_id(id)
            .await?
            .ok_or(RepoError::NotFound {
                entity: T::table().name,
                id,
            })?;
        existing.merge(patch);
        self.repo.save(existing).await
    }
}

impl<T, E> EntityService<T, E>
where
    T: HasRelation + Validatable + Debug,
    E: Executor,
{
    pub async fn find_all_with_eager_relationships(
        &self,
        pageable: Option<&Pageable>,
    ) -> Result<EntityStream<T>, RepoError> {
        tracing::debug!(?pageable, "Request to get all {} with eager relationships", T::table().name);
        self.repo.find_all_with_eager_relationships(pageable).await
    }

    pub async fn find_one_with_eager_relationships(&self, id: i64) -> Result<Option<T>, RepoError> {
        tracing::debug!(id, "Request to get {}", T::table().name);
        self.repo.find_one_with_eager_relationships(id).await
    }
}
