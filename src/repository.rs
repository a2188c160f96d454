use async_trait::async_trait;

use crate::error::RepoError;
use crate::executor::Executor;
use crate::mapping::{Entity, HasRelation, Validatable};
use crate::query::{EntityStream, Expr, Pageable, Query};

#[allow(non_snake_case)]
#[async_trait]
pub trait QueryExecutor<T, E>
where
    T: Entity + Validatable,
    E: Executor,
{
    fn Select(&self) -> Query<T, E>;

    /// At most one row; an absent id is `Ok(None)`.
    async fn find_by_id(&self, id: i64) -> Result<Option<T>, RepoError>;

    /// Every call runs the query again.
    async fn find_all(&self, pageable: Option<&Pageable>) -> Result<EntityStream<T>, RepoError>;

    async fn find_by(&self, condition: Expr) -> Result<EntityStream<T>, RepoError>;

    async fn exists_by_id(&self, id: i64) -> Result<bool, RepoError>;

    async fn count(&self) -> Result<i64, RepoError>;
}

#[async_trait]
pub trait Crud<T, E>
where
    T: Entity + Validatable,
    E: Executor,
{
    /// Inserts when the id is absent, otherwise updates the existing row.
    /// An update addressing a missing id fails with `NotFound`.
    async fn save(&self, entity: T) -> Result<T, RepoError>;

    /// Deleting an absent id is not an error.
    async fn delete_by_id(&self, id: i64) -> Result<(), RepoError>;
}

pub trait Repository<T, E>: QueryExecutor<T, E> + Crud<T, E>
where
    T: Entity + Validatable,
    E: Executor,
{
}

/// Reads that resolve the many-to-many association before yielding.
#[async_trait]
pub trait EagerRepository<T, E>: Repository<T, E>
where
    T: HasRelation + Validatable,
    E: Executor,
{
    async fn find_all_with_eager_relationships(
        &self,
        pageable: Option<&Pageable>,
    ) -> Result<EntityStream<T>, RepoError>;

    async fn find_one_with_eager_relationships(&self, id: i64) -> Result<Option<T>, RepoError>;
}
