use crate::db_enum;

db_enum! {
    pub enum Gender {
        Male => "MALE",
        Female => "FEMALE",
        Other => "OTHER",
    }
}

db_enum! {
    /// Lifecycle of a product order.
    pub enum OrderStatus {
        Completed => "COMPLETED",
        Paid => "PAID",
        Pending => "PENDING",
        Cancelled => "CANCELLED",
        Refunded => "REFUNDED",
    }
}
