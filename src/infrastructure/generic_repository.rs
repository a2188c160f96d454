use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;
use futures::TryStreamExt;

use crate::config::RepositoryConfig;
use crate::convert::{convert, required};
use crate::db::DatabaseRef;
use crate::error::RepoError;
use crate::executor::Executor;
use crate::mapping::{Entity, Validatable};
use crate::query::{EntityStream, Expr, Pageable, Query, SqlValue};
use crate::repository::{Crud, QueryExecutor, Repository};
use crate::sql::{self, TableRef};

pub struct GenericRepository<T, E = DatabaseRef>
where
    T: Entity + Validatable,
    E: Executor,
{
    db: Arc<E>,
    config: RepositoryConfig,
    _t: PhantomData<T>,
}

impl<T, E> GenericRepository<T, E>
where
    T: Entity + Validatable,
    E: Executor,
{
    pub fn new(db: E) -> Self {
        Self::shared(Arc::new(db))
    }

    /// Builds a repository over a connection shared with other repositories.
    pub fn shared(db: Arc<E>) -> Self {
        Self::with_config(db, RepositoryConfig::default())
    }

    pub fn with_config(db: Arc<E>, config: RepositoryConfig) -> Self {
        Self {
            db,
            config,
            _t: PhantomData,
        }
    }

    pub fn db(&self) -> &Arc<E> {
        &self.db
    }

    pub fn table_ref(&self) -> TableRef {
        TableRef::aliased(T::table().name, self.config.entity_alias.as_str())
    }

    /// Qualified key column of the entity table, e.g. `e.id`.
    pub fn key_column(&self) -> String {
        self.table_ref().column(T::table().key)
    }

    async fn count_with(&self, sql: &str, params: &[SqlValue]) -> Result<i64, RepoError> {
        tracing::trace!(%sql, "count");
        let mut rows = self.db.fetch(sql, params).await?;
        match rows.try_next().await? {
            Some(row) => required(convert::<i64>(row.as_ref(), "total")?, "total"),
            None => Ok(0),
        }
    }

    async fn returned_key(&self, sql: &str, params: &[SqlValue]) -> Result<Option<i64>, RepoError> {
        tracing::trace!(%sql, params = params.len(), "write");
        let key = T::table().key;
        let mut rows = self.db.fetch(sql, params).await?;
        match rows.try_next().await? {
            Some(row) => Ok(Some(required(convert::<i64>(row.as_ref(), key)?, key)?)),
            None => Ok(None),
        }
    }

    async fn insert(&self, mut entity: T) -> Result<T, RepoError> {
        let meta = T::table();
        let sql = sql::build_insert(meta, self.db.style());
        let id = self
            .returned_key(&sql, &entity.values())
            .await?
            .ok_or_else(|| RepoError::ConstraintViolation(format!("insert into {} returned no key", meta.name)))?;
        entity.set_id(id);
        Ok(entity)
    }

    async fn update(&self, id: i64, entity: T) -> Result<T, RepoError> {
        let meta = T::table();
        let sql = sql::build_update(meta, self.db.style());
        let mut params = entity.values();
        params.push(SqlValue::I64(id));
        match self.returned_key(&sql, &params).await? {
            Some(_) => Ok(entity),
            None => Err(RepoError::NotFound {
                entity: meta.name,
                id,
            }),
        }
    }

    /// Replaces the join rows of `id` when the association is resolved.
    async fn sync_relation(&self, id: i64, entity: &T) -> Result<(), RepoError> {
        let (relation, targets) = match (T::table().relation, entity.related_ids()) {
            (Some(relation), Some(targets)) => (relation, targets),
            _ => return Ok(()),
        };
        let style = self.db.style();
        self.db
            .execute(&sql::build_unlink(relation, style), &[SqlValue::I64(id)])
            .await?;
        let link = sql::build_link(relation, style);
        for target in targets {
            self.db
                .execute(&link, &[SqlValue::I64(id), SqlValue::I64(target)])
                .await?;
        }
        Ok(())
    }
}

impl<T, E> Clone for GenericRepository<T, E>
where
    T: Entity + Validatable,
    E: Executor,
{
    fn clone(&self) -> Self {
        Self {
            db: self.db.clone(),
            config: self.config.clone(),
            _t: PhantomData,
        }
    }
}

#[async_trait]
impl<T, E> QueryExecutor<T, E> for GenericRepository<T, E>
where
    T: Entity + Validatable,
    E: Executor,
{
    fn Select(&self) -> Query<T, E> {
        Query::new(self.table_ref(), self.db.style()).with_db(self.db.clone())
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<T>, RepoError> {
        let expr = Expr::Col(self.key_column()).eq(Expr::Param(SqlValue::I64(id)));
        self.Select().Where(expr).to_single_async().await
    }

    async fn find_all(&self, pageable: Option<&Pageable>) -> Result<EntityStream<T>, RepoError> {
        let query = match pageable {
            Some(p) => self.Select().Paginate(p)?,
            None => self.Select(),
        };
        query.to_stream().await
    }

    async fn find_by(&self, condition: Expr) -> Result<EntityStream<T>, RepoError> {
        self.Select().Where(condition).to_stream().await
    }

    async fn exists_by_id(&self, id: i64) -> Result<bool, RepoError> {
        let sql = sql::build_count(T::table(), self.db.style(), true);
        Ok(self.count_with(&sql, &[SqlValue::I64(id)]).await? > 0)
    }

    async fn count(&self) -> Result<i64, RepoError> {
        let sql = sql::build_count(T::table(), self.db.style(), false);
        self.count_with(&sql, &[]).await
    }
}

#[async_trait]
impl<T, E> Crud<T, E> for GenericRepository<T, E>
where
    T: Entity + Validatable,
    E: Executor,
{
    async fn save(&self, entity: T) -> Result<T, RepoError> {
        entity
            .validate()
            .map_err(|e| RepoError::ConstraintViolation(e.join(", ")))?;
        let saved = match entity.id() {
            None => self.insert(entity).await?,
            Some(id) => self.update(id, entity).await?,
        };
        if let Some(id) = saved.id() {
            self.sync_relation(id, &saved).await?;
        }
        Ok(saved)
    }

    async fn delete_by_id(&self, id: i64) -> Result<(), RepoError> {
        let meta = T::table();
        let style = self.db.style();
        if let Some(relation) = meta.relation {
            self.db
                .execute(&sql::build_unlink(relation, style), &[SqlValue::I64(id)])
                .await?;
        }
        let sql = sql::build_delete_by_key(meta, style);
        tracing::trace!(%sql, id, "delete");
        let affected = self.db.execute(&sql, &[SqlValue::I64(id)]).await?;
        if affected == 0 {
            tracing::debug!(table = meta.name, id, "delete addressed an absent id");
        }
        Ok(())
    }
}

impl<T, E> Repository<T, E> for GenericRepository<T, E>
where
    T: Entity + Validatable,
    E: Executor,
{
}
