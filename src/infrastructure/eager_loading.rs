use std::collections::HashMap;

use async_trait::async_trait;
use futures::stream::{self, StreamExt, TryStreamExt};

use crate::convert::{convert, required};
use crate::error::RepoError;
use crate::executor::Executor;
use crate::infrastructure::generic_repository::GenericRepository;
use crate::mapping::{Entity, HasRelation, Related, Validatable};
use crate::query::{EntityStream, Expr, JoinType, Pageable, Query, SqlValue};
use crate::repository::{EagerRepository, QueryExecutor};
use crate::sql::{AliasedColumn, TableRef, JOIN_ALIAS, TARGET_ALIAS};

/// Owner ids bound per join query. SQL Server caps a statement at 2100 parameters.
pub const OWNER_IDS_PER_QUERY: usize = 1000;

type Linked<X> = Result<Vec<X>, RepoError>;

impl<T, E> GenericRepository<T, E>
where
    T: HasRelation + Validatable,
    E: Executor,
{
    /// Resolves the association of every owner, one join query per
    /// [`OWNER_IDS_PER_QUERY`] owners.
    ///
    /// Items keep their order. An `Err` item passes through untouched, and an
    /// owner whose linked row fails to decode becomes that error. Owners without
    /// links end up with an empty `Loaded` list, never `Unloaded`.
    pub async fn hydrate(
        &self,
        items: Vec<Result<T, RepoError>>,
    ) -> Result<Vec<Result<T, RepoError>>, RepoError> {
        let ids: Vec<SqlValue> = items
            .iter()
            .filter_map(|item| item.as_ref().ok().and_then(Entity::id))
            .map(SqlValue::I64)
            .collect();

        let mut by_owner: HashMap<i64, Linked<T::Target>> = HashMap::new();
        for chunk in ids.chunks(OWNER_IDS_PER_QUERY) {
            self.load_links(chunk.to_vec(), &mut by_owner).await?;
        }

        Ok(items
            .into_iter()
            .map(|item| {
                let mut owner = item?;
                let linked = owner.id().and_then(|id| by_owner.remove(&id));
                *owner.related_mut() = Related::Loaded(linked.transpose()?.unwrap_or_default());
                Ok(owner)
            })
            .collect())
    }

    async fn load_links(
        &self,
        ids: Vec<SqlValue>,
        by_owner: &mut HashMap<i64, Linked<T::Target>>,
    ) -> Result<(), RepoError> {
        let relation = T::relation();
        let target_meta = <T::Target as Entity>::table();
        let target = TableRef::aliased(target_meta.name, TARGET_ALIAS);
        let join = TableRef::aliased(relation.join_table, JOIN_ALIAS);
        let owner_col = AliasedColumn::new(&join, relation.owner_column, JOIN_ALIAS);

        let query = Query::<T::Target, E>::new(target.clone(), self.db().style())
            .with_db(self.db().clone())
            .Column(owner_col.clone())
            .Join(
                JoinType::Inner,
                &join.to_sql(),
                Expr::Col(target.column(target_meta.key))
                    .eq(Expr::Col(join.column(relation.target_column))),
            )
            .Where(Expr::Col(join.column(relation.owner_column)).in_list(ids))
            .OrderBy(&target.column(target_meta.key));

        let mut rows = query.to_rows().await?;
        while let Some(row) = rows.try_next().await? {
            let owner = required(convert::<i64>(row.as_ref(), &owner_col.alias)?, &owner_col.alias)?;
            let item = <T::Target as Entity>::from_row(row.as_ref(), TARGET_ALIAS);
            let slot = by_owner.entry(owner).or_insert_with(|| Ok(Vec::new()));
            match item {
                Ok(item) => {
                    if let Ok(list) = slot {
                        list.push(item);
                    }
                }
                Err(e) => {
                    tracing::debug!(owner, error = %e, "linked row failed to decode");
                    if slot.is_ok() {
                        *slot = Err(e);
                    }
                }
            }
        }
        Ok(())
    }
}

#[async_trait]
impl<T, E> EagerRepository<T, E> for GenericRepository<T, E>
where
    T: HasRelation + Validatable,
    E: Executor,
{
    async fn find_all_with_eager_relationships(
        &self,
        pageable: Option<&Pageable>,
    ) -> Result<EntityStream<T>, RepoError> {
        // the page is materialised so one join query can serve all owners
        let page: Vec<Result<T, RepoError>> = self.find_all(pageable).await?.collect().await;
        let items = self.hydrate(page).await?;
        Ok(stream::iter(items).boxed())
    }

    async fn find_one_with_eager_relationships(&self, id: i64) -> Result<Option<T>, RepoError> {
        match self.find_by_id(id).await? {
            Some(owner) => self.hydrate(vec![Ok(owner)]).await?.pop().transpose(),
            None => Ok(None),
        }
    }
}
