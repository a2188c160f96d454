use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::enumeration::OrderStatus;
use crate::domain::product::Product;
use crate::mapping::Related;
use crate::services::merge::{overlay, Merge};
use crate::Entity;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Entity)]
#[serde(rename_all = "camelCase")]
#[table(name = "product_order")]
pub struct ProductOrder {
    #[key]
    pub id: Option<i64>,
    #[column(positive)]
    pub quantity: i32,
    #[column(non_negative)]
    pub total_price: Decimal,
    pub status: OrderStatus,
    #[serde(default)]
    #[relation(
        join_table = "rel_product_order__product",
        owner_column = "product_order_id",
        target_column = "product_id"
    )]
    pub products: Related<Product>,
}

/// Merge-patch body for [`ProductOrder`]. The product association is not patchable.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProductOrderPatch {
    pub id: Option<i64>,
    pub quantity: Option<i32>,
    pub total_price: Option<Decimal>,
    pub status: Option<OrderStatus>,
}

impl Merge for ProductOrder {
    type Patch = ProductOrderPatch;

    fn patch_id(patch: &Self::Patch) -> Option<i64> {
        patch.id
    }

    fn merge(&mut self, patch: Self::Patch) {
        overlay(&mut self.quantity, patch.quantity);
        overlay(&mut self.total_price, patch.total_price);
        overlay(&mut self.status, patch.status);
    }
}
