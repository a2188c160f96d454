use serde::{Deserialize, Serialize};

use crate::domain::enumeration::Gender;
use crate::services::merge::{overlay, overlay_nullable, Merge};
use crate::Entity;

/// Contact and address details of a customer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Entity)]
#[serde(rename_all = "camelCase")]
#[table(name = "customer_details")]
pub struct CustomerDetails {
    #[key]
    pub id: Option<i64>,
    pub gender: Gender,
    #[column(required, max_length = 32)]
    pub phone: String,
    #[column(name = "address_line_1", max_length = 255)]
    pub address_line1: String,
    #[column(name = "address_line_2", max_length = 255)]
    pub address_line2: Option<String>,
    #[column(required, max_length = 100)]
    pub city: String,
    #[column(required, max_length = 100)]
    pub country: String,
}

/// Merge-patch body for [`CustomerDetails`]. Absent or null fields keep their stored value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CustomerDetailsPatch {
    pub id: Option<i64>,
    pub gender: Option<Gender>,
    pub phone: Option<String>,
    pub address_line1: Option<String>,
    pub address_line2: Option<String>,
    pub city: Option<String>,
    pub country: Option<String>,
}

impl Merge for CustomerDetails {
    type Patch = CustomerDetailsPatch;

    fn patch_id(patch: &Self::Patch) -> Option<i64> {
        patch.id
    }

    fn merge(&mut self, patch: Self::Patch) {
        overlay(&mut self.gender, patch.gender);
        overlay(&mut self.phone, patch.phone);
        overlay(&mut self.address_line1, patch.address_line1);
        overlay_nullable(&mut self.address_line2, patch.address_line2);
        overlay(&mut self.city, patch.city);
        overlay(&mut self.country, patch.country);
    }
}
