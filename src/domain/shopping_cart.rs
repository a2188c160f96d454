use serde::{Deserialize, Serialize};

use crate::error::RepoError;
use crate::executor::Executor;
use crate::infrastructure::generic_repository::GenericRepository;
use crate::query::{EntityStream, Expr, SqlValue};
use crate::repository::QueryExecutor;
use crate::services::merge::{overlay_nullable, Merge};
use crate::Entity;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Entity)]
#[serde(rename_all = "camelCase")]
#[table(name = "shopping_cart")]
pub struct ShoppingCart {
    #[key]
    pub id: Option<i64>,
    /// A cart may exist without a customer.
    pub customer_details_id: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ShoppingCartPatch {
    pub id: Option<i64>,
    pub customer_details_id: Option<i64>,
}

impl Merge for ShoppingCart {
    type Patch = ShoppingCartPatch;

    fn patch_id(patch: &Self::Patch) -> Option<i64> {
        patch.id
    }

    fn merge(&mut self, patch: Self::Patch) {
        overlay_nullable(&mut self.customer_details_id, patch.customer_details_id);
    }
}

impl<E: Executor> GenericRepository<ShoppingCart, E> {
    /// Carts referencing the given customer details.
    pub async fn find_by_customer_details(
        &self,
        customer_details_id: i64,
    ) -> Result<EntityStream<ShoppingCart>, RepoError> {
        let column = self.table_ref().column(ShoppingCart::CUSTOMER_DETAILS_ID);
        self.find_by(Expr::Col(column).eq(Expr::Param(SqlValue::I64(customer_details_id))))
            .await
    }

    pub async fn find_all_where_customer_details_is_null(
        &self,
    ) -> Result<EntityStream<ShoppingCart>, RepoError> {
        let column = self.table_ref().column(ShoppingCart::CUSTOMER_DETAILS_ID);
        self.find_by(Expr::Col(column).is_null()).await
    }
}
