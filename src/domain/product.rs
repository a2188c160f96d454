use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::Entity;

/// Catalogue item referenced by product orders.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Entity)]
#[serde(rename_all = "camelCase")]
#[table(name = "product")]
pub struct Product {
    #[key]
    pub id: Option<i64>,
    #[column(required, max_length = 255)]
    pub name: String,
    #[column(non_negative)]
    pub price: Decimal,
}
